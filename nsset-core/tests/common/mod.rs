//! Shared helpers for the integration tests.
//!
//! Most namespace operations need CAP_SYS_ADMIN; tests probe for it at
//! runtime and skip themselves when it is missing, so the suite stays
//! useful (if thinner) for unprivileged runs.
#![allow(dead_code)]

use nix::sched::CloneFlags;

/// Probes for namespace privileges by unsharing an IPC namespace on a
/// scratch thread (the thread is discarded, so the caller is unaffected).
pub fn have_ns_caps() -> bool {
    std::thread::spawn(|| nix::sched::unshare(CloneFlags::CLONE_NEWIPC).is_ok())
        .join()
        .unwrap_or(false)
}

/// Reads the calling thread's namespace id for `name`, e.g. `"net"`.
pub fn thread_ns_id(name: &str) -> String {
    std::fs::read_link(format!("/proc/thread-self/ns/{name}"))
        .expect("readlink thread-self ns")
        .to_string_lossy()
        .into_owned()
}
