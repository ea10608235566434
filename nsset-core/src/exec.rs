//! # Running Code Inside a Set
//!
//! Namespace membership is thread state, so executing a closure "inside" a
//! set means dispatching it to a worker that is pinned to one OS thread for
//! the whole operation. Each call gets a dedicated thread: a worker that
//! entered a non-reversible state, or failed to restore, simply exits and
//! is never reused.

use std::thread;

use log::warn;

use crate::errors::{Error, Result};
use crate::namespace::{reversible, Namespace};
use crate::set::Set;

impl Set {
    /// Runs `f` in the context of this set's namespaces and returns its
    /// value. The worker thread is thrown away afterwards.
    ///
    /// The calling thread is unaffected: it blocks until the worker is
    /// done, and its own namespaces never change. Threads spawned by `f`
    /// start in the process's default state, not in the set's namespaces;
    /// fan-out inside `f` must re-enter with [`Set::run`] per thread. If
    /// the set contains a pid namespace, children forked by `f` land in it
    /// while `f` itself does not.
    ///
    /// Fails with [`Error::UserNamespaceHeld`], without invoking `f`, if
    /// the set contains a user namespace; duplicate the set without
    /// `CLONE_NEWUSER` first.
    pub fn run<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> T + Send,
        T: Send,
    {
        self.run_raw(|| (f(), false), false)
    }

    /// Runs `f` like [`Set::run`], with control over restoring the worker.
    ///
    /// With `restore` set, the worker's original namespaces are captured
    /// before it transitions and re-applied after `f` returns, but only
    /// when `f`'s second return value also asks for it, and only when the
    /// set's mask is reversible at all. A restore failure is reported as
    /// [`Error::RestoreFailed`] and retires the worker. When the capture of
    /// the pre-call state itself fails, restoration is disabled for that
    /// call rather than failing it.
    ///
    /// Restoring costs one `setns` per kind; skipping it is always safe
    /// here because workers are per-call threads, so `false` is the right
    /// default unless the caller specifically wants re-entry verified.
    pub fn run_raw<T, F>(&self, f: F, restore: bool) -> Result<T>
    where
        F: FnOnce() -> (T, bool) + Send,
        T: Send,
    {
        if self.contains(Namespace::User) {
            return Err(Error::UserNamespaceHeld);
        }

        let mut effective_restore = restore && reversible(self.flags);
        let current = if effective_restore {
            match Set::capture(self.flags) {
                Ok(set) => Some(set),
                Err(e) => {
                    warn!("disabling restore, failed to capture current namespaces: {e}");
                    effective_restore = false;
                    None
                }
            }
        } else {
            None
        };

        let result = thread::scope(|scope| {
            scope
                .spawn(|| -> Result<T> {
                    self.apply(false)?;

                    let (value, wants_restore) = f();

                    if wants_restore && effective_restore {
                        if let Some(cur) = &current {
                            cur.apply(false).map_err(|e| Error::RestoreFailed {
                                source: Box::new(e),
                            })?;
                        }
                    }
                    Ok(value)
                })
                .join()
        });

        match result {
            Ok(r) => r,
            // A panic in `f` unwound the worker; the thread is gone, so
            // surface the panic to the caller unchanged.
            Err(payload) => std::panic::resume_unwind(payload),
        }
    }
}
