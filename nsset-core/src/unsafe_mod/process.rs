//! Raw `clone(2)` of a namespace holder child.
//!
//! The child exists only to hold freshly created namespaces open until the
//! parent has captured handles to them. It never execs: it optionally joins
//! a preset user namespace, parks on a pipe read, and exits when the parent
//! closes the pipe.

use std::os::fd::RawFd;

use nix::errno::Errno;
use nix::sched::CloneFlags;
use nix::unistd::Pid;

/// `CLONE_CLEAR_SIGHAND` resets all signal handlers in the child so an
/// inherited handler can never run between `clone` and `exit_group`. The
/// constant is defined for `clone3(2)` and accepted by `clone(2)` on 64-bit
/// ABIs; `nix`'s 32-bit `CloneFlags` cannot carry it.
const CLONE_CLEAR_SIGHAND: u64 = 0x1_0000_0000;

/// Creates a child process holding freshly created namespaces for every bit
/// in `mask`, plus `SIGCHLD | CLONE_CLEAR_SIGHAND | CLONE_FILES`.
///
/// `CLONE_FILES` shares the descriptor table with the parent so that
/// closing both pipe ends in the parent is what delivers EOF to the child's
/// blocked `read`; the child must therefore not touch the table at all.
///
/// In the child: if `preset_user` is given, join that user namespace first
/// (any failure exits with the errno as the status); then block reading one
/// byte from `sync_fd`; then `_exit(0)`.
///
/// Returns the child's pid in the parent.
///
/// # Safety
///
/// The calling thread forks a copy of the whole address space while other
/// threads may hold arbitrary locks, so the child must not allocate, lock,
/// or run any other language-runtime code. The child path below is raw
/// syscalls only, and any change to it must preserve that. `preset_user`
/// and `sync_fd` must be descriptors that stay open across the call.
pub(crate) unsafe fn spawn_holder(
    mask: CloneFlags,
    preset_user: Option<RawFd>,
    sync_fd: RawFd,
) -> Result<Pid, Errno> {
    let mut buf = [0u8; 1];
    let flags: u64 = libc::SIGCHLD as u64
        | CLONE_CLEAR_SIGHAND
        | libc::CLONE_FILES as u64
        | mask.bits() as u32 as u64;

    let pid = unsafe { libc::syscall(libc::SYS_clone, flags, 0usize, 0usize, 0usize, 0usize) };
    if pid < 0 {
        return Err(Errno::last());
    }

    if pid == 0 {
        // Child. Raw syscalls only from here to _exit.
        if let Some(fd) = preset_user {
            let rc = unsafe { libc::syscall(libc::SYS_setns, fd, libc::CLONE_NEWUSER) };
            if rc != 0 {
                unsafe { libc::_exit(Errno::last_raw()) };
            }
        }

        // Parks until the parent closes the write end; a zero-length read
        // (EOF) or an error both mean it is time to go.
        unsafe { libc::syscall(libc::SYS_read, sync_fd, buf.as_mut_ptr(), 1usize) };
        unsafe { libc::_exit(0) };
    }

    Ok(Pid::from_raw(pid as libc::pid_t))
}
