//! Concurrency test: many unshare+run sequences in flight at once must
//! yield pairwise distinct namespaces and leave no stray children behind.

mod common;

use std::collections::HashSet;

use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitPidFlag};
use nix::unistd::Pid;
use nsset_core::{CloneFlags, Namespace};

const WORKERS: usize = 64;

#[test]
fn parallel_unshares_are_pairwise_distinct() {
    if !common::have_ns_caps() {
        eprintln!("skipping parallel_unshares_are_pairwise_distinct: requires CAP_SYS_ADMIN");
        return;
    }

    let mut handles = Vec::with_capacity(WORKERS);
    for _ in 0..WORKERS {
        handles.push(std::thread::spawn(|| {
            let set = nsset_core::unshare(CloneFlags::CLONE_NEWNET).unwrap();
            let seen = set.run(|| common::thread_ns_id("net")).unwrap();
            assert_eq!(seen, set.id(Namespace::Net).unwrap());
            set.close();
            seen
        }));
    }

    let ids: HashSet<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(ids.len(), WORKERS);

    // every holder child is reaped inside the call that spawned it
    assert_eq!(
        waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)),
        Err(Errno::ECHILD)
    );
}
