//! Handing a namespace set to a child process across exec.
//!
//! `std::process::Command`'s pre-exec hooks are `unsafe` to register, so
//! the registration lives here and callers get a safe wrapper: the hook
//! itself only enters the set in the forked child, which is exactly the
//! context [`Set::enter`] is specified for.

use std::io;
use std::os::unix::process::CommandExt;
use std::process::Command;

use crate::set::Set;

/// Arranges for `command`'s child to enter every namespace in `set`
/// before it execs.
///
/// The set is applied in the forked child while it is still
/// single-threaded, so this route can join the whole set, a user
/// namespace included. The set is moved into the command and stays open
/// for as long as the command exists; spawn the command as usual
/// afterwards.
pub fn enter_on_exec(command: &mut Command, set: Set) {
    // SAFETY: the hook runs between fork and exec in the child. Entering
    // the set is a sequence of setns/unshare syscalls; only its error path
    // touches the allocator, the same regime the namespace holder child's
    // parent-side code runs in after clone.
    unsafe {
        command.pre_exec(move || set.enter().map_err(io::Error::other));
    }
}
