//! # Creating Fresh Namespaces
//!
//! Two strategies produce a set with newly created namespaces. When no user
//! namespace is involved, a worker thread calls `unshare(2)` and captures
//! the result. When one is involved (either being created, or already held
//! by the source set) the new namespaces must be created by a child
//! process instead: joining a user namespace is forbidden for
//! multi-threaded processes, and namespaces created inside one must be
//! owned by it. The child holds the namespaces open just long enough for
//! the parent to capture handles, then exits.

use std::os::fd::AsRawFd;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use log::debug;
use nix::errno::Errno;
use nix::sched::CloneFlags;
use nix::sys::wait::WaitStatus;
use nix::unistd::Pid;

use crate::errors::{Error, Result};
use crate::namespace::{reversible, Namespace};
use crate::set::Set;
use crate::sys;
use crate::unsafe_mod;
use crate::users::{self, IdMap};

/// Options for creating namespaces.
#[derive(Debug, Clone)]
pub struct UnshareOpts {
    /// Uid ranges to write to the new user namespace's `uid_map`, in order.
    /// Only consulted when the unshare mask includes `CLONE_NEWUSER`.
    pub uid_maps: Vec<IdMap>,
    /// Gid ranges to write to the new user namespace's `gid_map`, in order.
    /// `setgroups` is denied first for unprivileged callers.
    pub gid_maps: Vec<IdMap>,
    /// How long to wait for the namespace holder child to exit after its
    /// sync pipe closes before sending `SIGKILL`.
    pub child_wait_timeout: Duration,
}

impl Default for UnshareOpts {
    fn default() -> Self {
        Self {
            uid_maps: Vec::new(),
            gid_maps: Vec::new(),
            child_wait_timeout: Duration::from_secs(5),
        }
    }
}

/// Creates a set whose kinds in `mask` are freshly unshared, starting from
/// the calling thread's namespaces. Same as
/// `Set::current(mask)?.unshare(mask)`.
pub fn unshare(mask: CloneFlags) -> Result<Set> {
    unshare_with(mask, &UnshareOpts::default())
}

/// Like [`unshare`], with options.
pub fn unshare_with(mask: CloneFlags, opts: &UnshareOpts) -> Result<Set> {
    let current = Set::current(mask)?;
    let result = current.unshare_with(mask, opts);
    current.close();
    result
}

impl Set {
    /// Creates a new set whose kinds in `mask` are freshly created
    /// namespaces; kinds this set has beyond `mask` are carried over as
    /// duplicates. This set and the calling thread are unchanged.
    ///
    /// If `mask` includes `CLONE_NEWUSER` the returned set cannot be used
    /// with [`Set::run`] (see [`Error::UserNamespaceHeld`]); duplicate it
    /// without the user bit for that, or hand it to a forked child via
    /// [`Set::enter`].
    pub fn unshare(&self, mask: CloneFlags) -> Result<Set> {
        self.unshare_with(mask, &UnshareOpts::default())
    }

    /// Like [`Set::unshare`], with options.
    pub fn unshare_with(&self, mask: CloneFlags, opts: &UnshareOpts) -> Result<Set> {
        // A new user namespace can only come from clone(2), and creating
        // namespaces while this set holds a user namespace must happen
        // inside it, which again means a child process.
        let needs_clone =
            mask.contains(CloneFlags::CLONE_NEWUSER) || self.contains(Namespace::User);

        let result = thread::scope(|scope| {
            scope
                .spawn(|| {
                    if needs_clone {
                        self.unshare_via_clone(mask, opts)
                    } else {
                        self.unshare_in_thread(mask)
                    }
                })
                .join()
        });
        match result {
            Ok(r) => r,
            Err(payload) => std::panic::resume_unwind(payload),
        }
    }

    /// Runs on a dedicated worker thread: unshare, capture, then put the
    /// worker back if that is still possible.
    fn unshare_in_thread(&self, mask: CloneFlags) -> Result<Set> {
        sys::unshare(mask).map_err(|e| Error::UnshareFailed {
            flags: mask,
            source: e,
        })?;

        let mut new_set = Set::capture_unshared(mask)?;

        if reversible(mask) && !self.fds.is_empty() {
            self.apply(false).map_err(|e| Error::RestoreFailed {
                source: Box::new(e),
            })?;
        }

        new_set.merge_from(self)?;
        Ok(new_set)
    }

    /// Runs on a dedicated worker thread: enter this set's namespaces (user
    /// excluded), clone a holder child that creates the new ones, capture
    /// its namespaces, and reap it.
    fn unshare_via_clone(&self, mask: CloneFlags, opts: &UnshareOpts) -> Result<Set> {
        // When this set holds a user namespace that is not being replaced,
        // the child joins it before parking, so the new namespaces are
        // owned by it.
        let preset_user = if self.contains(Namespace::User)
            && !mask.contains(CloneFlags::CLONE_NEWUSER)
        {
            self.fds.get(&Namespace::User).map(|fd| fd.as_raw_fd())
        } else {
            None
        };

        self.apply(true)?;

        let (read_end, write_end) = sys::pipe().map_err(|e| Error::PipeFailed { source: e })?;

        // SAFETY: the child path inside spawn_holder runs raw syscalls
        // only; both descriptors stay open until after the child is reaped,
        // and this worker thread is discarded when the call returns.
        let child = unsafe { unsafe_mod::spawn_holder(mask, preset_user, read_end.as_raw_fd()) }
            .map_err(|e| Error::CloneFailed { source: e })?;

        // The child is parked on the pipe; every path from here reaps it.
        let built = build_child_set(self, child, mask, opts);

        // The child shares this process's descriptor table, so closing both
        // ends here is what delivers EOF to its blocked read.
        drop(write_end);
        drop(read_end);

        let waited = wait_child(child, opts.child_wait_timeout);

        match (built, waited) {
            (Err(e), _) => Err(e),
            (Ok(set), Err(e)) => {
                set.close();
                Err(e)
            }
            (Ok(set), Ok(())) => Ok(set),
        }
    }
}

fn build_child_set(source: &Set, child: Pid, mask: CloneFlags, opts: &UnshareOpts) -> Result<Set> {
    if mask.contains(CloneFlags::CLONE_NEWUSER) {
        users::write_id_maps(child, &opts.uid_maps, &opts.gid_maps)?;
    }
    let mut set = Set::from_dir(format!("/proc/{child}/ns"), mask)?;
    set.merge_from(source)?;
    Ok(set)
}

fn wait_child(child: Pid, timeout: Duration) -> Result<()> {
    // The reap is a genuine blocking waitid on a dedicated thread, raced
    // against the timeout through the channel.
    let (tx, rx) = mpsc::channel();
    let reaper = thread::spawn(move || {
        let _ = tx.send(sys::wait_exited(child));
    });

    match rx.recv_timeout(timeout) {
        Ok(result) => {
            let _ = reaper.join();
            check_exit(result.map_err(|e| Error::WaitFailed { source: e })?)
        }
        Err(_) => {
            debug!("namespace holder child {child} did not exit in {timeout:?}, killing");
            sys::kill(child);
            // The kill lets the blocked waitid return, so the child is
            // still reaped and no zombie outlives the call.
            let _ = reaper.join();
            Err(Error::ChildWaitTimeout { timeout })
        }
    }
}

fn check_exit(status: WaitStatus) -> Result<()> {
    match status {
        WaitStatus::Exited(_, 0) => Ok(()),
        // The child exits with the errno it ran into.
        WaitStatus::Exited(_, code) => Err(Error::ChildExited {
            code,
            source: Errno::from_raw(code),
        }),
        WaitStatus::Signaled(_, signal, _) => Err(Error::ChildSignaled { signal }),
        _ => Ok(()),
    }
}
