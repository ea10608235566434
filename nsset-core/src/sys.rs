//! Thin syscall shims.
//!
//! Every wrapper retries `EINTR` and otherwise surfaces the errno verbatim;
//! callers attach context when converting to [`crate::Error`]. `close` and
//! `kill` are best-effort and only log.

use std::ffi::CString;
use std::os::fd::{AsRawFd, BorrowedFd, FromRawFd, IntoRawFd, OwnedFd};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use log::warn;
use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::mount::{MntFlags, MsFlags};
use nix::sched::CloneFlags;
use nix::sys::signal::{self, Signal};
use nix::sys::wait::{waitid, Id, WaitPidFlag, WaitStatus};
use nix::unistd::{pipe2, Pid};

/// Opens `path` read-only with `O_CLOEXEC`.
pub(crate) fn open(path: &Path) -> Result<OwnedFd, Errno> {
    let cpath = CString::new(path.as_os_str().as_bytes()).map_err(|_| Errno::EINVAL)?;
    loop {
        // SAFETY: cpath is a valid NUL-terminated string and the returned
        // descriptor is immediately wrapped into an OwnedFd.
        let fd = unsafe { libc::open(cpath.as_ptr(), libc::O_RDONLY | libc::O_CLOEXEC) };
        if fd >= 0 {
            return Ok(unsafe { OwnedFd::from_raw_fd(fd) });
        }
        let errno = Errno::last();
        if errno != Errno::EINTR {
            return Err(errno);
        }
    }
}

fn memfd() -> Result<OwnedFd, Errno> {
    loop {
        // SAFETY: the name is a valid NUL-terminated string; the descriptor
        // is owned by the caller.
        let fd = unsafe { libc::memfd_create(c"nsset".as_ptr(), libc::MFD_CLOEXEC) };
        if fd >= 0 {
            return Ok(unsafe { OwnedFd::from_raw_fd(fd) });
        }
        let errno = Errno::last();
        if errno != Errno::EINTR {
            return Err(errno);
        }
    }
}

/// Duplicates `fd` onto a fresh `memfd` descriptor with `O_CLOEXEC`.
///
/// Allocating the target number from a memfd keeps duplicated handles away
/// from the low descriptor slots, so a set handed to a child can never
/// shadow standard I/O.
pub(crate) fn dup(fd: BorrowedFd<'_>) -> Result<OwnedFd, Errno> {
    let target = memfd()?;
    loop {
        // SAFETY: both descriptors are open; dup3 atomically replaces the
        // memfd with a duplicate of `fd`.
        let rc = unsafe { libc::dup3(fd.as_raw_fd(), target.as_raw_fd(), libc::O_CLOEXEC) };
        if rc >= 0 {
            return Ok(target);
        }
        let errno = Errno::last();
        if errno != Errno::EINTR {
            return Err(errno);
        }
    }
}

/// Creates a `O_CLOEXEC` pipe, `(read, write)`.
pub(crate) fn pipe() -> Result<(OwnedFd, OwnedFd), Errno> {
    loop {
        match pipe2(OFlag::O_CLOEXEC) {
            Ok(p) => return Ok(p),
            Err(Errno::EINTR) => continue,
            Err(e) => return Err(e),
        }
    }
}

pub(crate) fn unshare(flags: CloneFlags) -> Result<(), Errno> {
    loop {
        match nix::sched::unshare(flags) {
            Ok(()) => return Ok(()),
            Err(Errno::EINTR) => continue,
            Err(e) => return Err(e),
        }
    }
}

pub(crate) fn setns(fd: BorrowedFd<'_>, nstype: CloneFlags) -> Result<(), Errno> {
    loop {
        match nix::sched::setns(fd, nstype) {
            Ok(()) => return Ok(()),
            Err(Errno::EINTR) => continue,
            Err(e) => return Err(e),
        }
    }
}

/// Bind-mounts `source` onto `target`.
pub(crate) fn bind_mount(source: &Path, target: &Path, recursive: bool) -> Result<(), Errno> {
    let mut flags = MsFlags::MS_BIND;
    if recursive {
        flags |= MsFlags::MS_REC;
    }
    loop {
        match nix::mount::mount(Some(source), target, Some("none"), flags, None::<&str>) {
            Ok(()) => return Ok(()),
            Err(Errno::EINTR) => continue,
            Err(e) => return Err(e),
        }
    }
}

/// Lazily detaches the mount at `target`, logging failures.
pub(crate) fn unmount_detach(target: &Path) {
    loop {
        match nix::mount::umount2(target, MntFlags::MNT_DETACH) {
            Ok(()) => return,
            Err(Errno::EINTR) => continue,
            Err(errno) => {
                warn!("failed to unmount {target:?}: {errno}");
                return;
            }
        }
    }
}

/// Sends `SIGKILL` to `pid`, ignoring a child that is already gone.
pub(crate) fn kill(pid: Pid) {
    if let Err(errno) = signal::kill(pid, Signal::SIGKILL) {
        if errno != Errno::ESRCH {
            warn!("failed to kill namespace holder child {pid}: {errno}");
        }
    }
}

/// Blocks until `pid` exits and reaps it.
pub(crate) fn wait_exited(pid: Pid) -> Result<WaitStatus, Errno> {
    loop {
        match waitid(Id::Pid(pid), WaitPidFlag::WEXITED) {
            Ok(status) => return Ok(status),
            Err(Errno::EINTR) => continue,
            Err(e) => return Err(e),
        }
    }
}

/// Closes `fd`, logging failures instead of returning them.
///
/// On Linux the descriptor is gone even when `close(2)` reports `EINTR`, so
/// the call is never retried.
pub(crate) fn close(fd: OwnedFd, what: &'static str) {
    let raw = fd.into_raw_fd();
    // SAFETY: ownership of the descriptor was just released by into_raw_fd.
    let rc = unsafe { libc::close(raw) };
    if rc != 0 {
        let errno = Errno::last();
        if errno != Errno::EINTR {
            warn!("failed to close {what} fd {raw}: {errno}");
        }
    }
}
