//! Error types for everything that can go wrong while capturing, entering,
//! and creating namespaces.

use std::path::PathBuf;
use std::time::Duration;

use nix::sched::CloneFlags;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by namespace set operations.
///
/// `EINTR` never appears here; every syscall shim retries it internally. A
/// failed `setns` whose current and target namespace IDs read back equal is
/// treated as a no-op rather than an error.
#[derive(Error, Debug)]
pub enum Error {
    /// Opening a namespace magic link (or a bind-mounted copy of one) failed.
    #[error("failed to open namespace file {path:?}")]
    OpenNamespace {
        /// The magic link or file that was being opened.
        path: PathBuf,
        /// The underlying errno.
        #[source]
        source: nix::Error,
    },

    /// Duplicating a namespace handle failed.
    #[error("failed to duplicate {name} namespace handle")]
    DupFailed {
        /// The namespace kind whose handle was being duplicated.
        name: &'static str,
        /// The underlying errno.
        #[source]
        source: nix::Error,
    },

    /// `unshare(2)` failed.
    #[error("unshare({flags:?}) failed")]
    UnshareFailed {
        /// The flags that were passed to `unshare`.
        flags: CloneFlags,
        /// The underlying errno.
        #[source]
        source: nix::Error,
    },

    /// `setns(2)` failed and the current and target namespaces are not the
    /// same.
    #[error("setns {name} failed")]
    SetnsFailed {
        /// The namespace kind that was being entered.
        name: &'static str,
        /// The underlying errno.
        #[source]
        source: nix::Error,
    },

    /// Returning a worker thread to its captured namespaces failed. The
    /// worker is retired.
    #[error("failed to restore worker namespaces")]
    RestoreFailed {
        /// The entry failure that occurred while restoring.
        #[source]
        source: Box<Error>,
    },

    /// The set contains a user namespace, which cannot be entered from a
    /// multi-threaded process.
    ///
    /// Raised before any state changes; the caller's closure is never
    /// invoked. Duplicate the set without `CLONE_NEWUSER` to run in its
    /// remaining namespaces.
    #[error("set contains a user namespace, which cannot be entered from a multi-threaded process")]
    UserNamespaceHeld,

    /// A kind was requested from a set that does not contain it.
    #[error("{name} namespace not in set")]
    NotInSet {
        /// The missing namespace kind.
        name: &'static str,
    },

    /// Reading the kernel namespace identifier behind a handle failed.
    #[error("failed to read namespace id of {path:?}")]
    ReadNsId {
        /// The `/proc/self/fd/<n>` link that was being read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Creating the regular file a namespace gets bind-mounted onto failed.
    #[error("failed to create mount target {path:?}")]
    CreateMountTarget {
        /// The file that was being created.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The target file for a single-namespace mount does not exist.
    #[error("mount target {path:?} does not exist")]
    MountTargetMissing {
        /// The missing target file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Bind-mounting a namespace onto its target file failed.
    #[error("failed to mount {name} namespace on {path:?}")]
    MountFailed {
        /// The namespace kind being mounted.
        name: &'static str,
        /// The mount target.
        path: PathBuf,
        /// The underlying errno.
        #[source]
        source: nix::Error,
    },

    /// Creating the synchronization pipe for a namespace holder child
    /// failed.
    #[error("failed to create sync pipe")]
    PipeFailed {
        /// The underlying errno.
        #[source]
        source: nix::Error,
    },

    /// `clone(2)` of a namespace holder child failed.
    #[error("clone failed")]
    CloneFailed {
        /// The underlying errno.
        #[source]
        source: nix::Error,
    },

    /// Writing `uid_map`, `gid_map`, or `setgroups` for a new user
    /// namespace failed.
    #[error("failed to write id mapping to {path:?}")]
    WriteIdMap {
        /// The `/proc/<pid>/...` file being written.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Waiting for a namespace holder child failed.
    #[error("failed to wait for namespace holder child")]
    WaitFailed {
        /// The underlying errno.
        #[source]
        source: nix::Error,
    },

    /// The namespace holder child exited with a non-zero status. The status
    /// carries the errno the child ran into.
    #[error("namespace holder child exited with code {code}")]
    ChildExited {
        /// The child's exit code.
        code: i32,
        /// The exit code interpreted as an errno.
        #[source]
        source: nix::Error,
    },

    /// The namespace holder child was killed by a signal.
    #[error("namespace holder child killed by signal {signal:?}")]
    ChildSignaled {
        /// The terminating signal.
        signal: nix::sys::signal::Signal,
    },

    /// The namespace holder child did not exit within the configured
    /// timeout. It has been sent `SIGKILL` and reaped.
    #[error("timed out after {timeout:?} waiting for namespace holder child")]
    ChildWaitTimeout {
        /// The configured wait timeout.
        timeout: Duration,
    },
}
