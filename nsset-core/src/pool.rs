//! # Pre-unshared Set Pool
//!
//! Creating namespaces is not free; the clone strategy in particular costs
//! a child process per call. A [`Pool`] keeps a small number of
//! ready-to-use sets for a fixed mask, produced by background threads, so
//! consumers can grab one with low latency.
//!
//! Every set is owned by exactly one place at a time: a producer building
//! it, the queue, or the caller that [`Pool::get`] handed it to.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::warn;
use nix::sched::CloneFlags;

use crate::errors::Result;
use crate::set::Set;
use crate::unshare::{unshare_with, UnshareOpts};

/// Pause after a failed production attempt, so a persistent error (say,
/// missing privileges) cannot spin a producer hot.
const PRODUCER_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// A pool of pre-unshared namespace sets for one mask.
pub struct Pool {
    mask: CloneFlags,
    opts: UnshareOpts,
    shared: Arc<Shared>,
}

struct Shared {
    state: Mutex<State>,
    cvar: Condvar,
}

#[derive(Default)]
struct State {
    sets: VecDeque<Set>,
    depth: usize,
    producers: usize,
    shutting_down: bool,
}

fn lock(shared: &Shared) -> MutexGuard<'_, State> {
    // A poisoned lock only means a producer panicked mid-push; the queue
    // itself is still consistent.
    shared.state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn wait<'a>(shared: &'a Shared, guard: MutexGuard<'a, State>) -> MutexGuard<'a, State> {
    shared
        .cvar
        .wait(guard)
        .unwrap_or_else(PoisonError::into_inner)
}

impl Pool {
    /// Creates an empty pool bound to `mask` and `opts`.
    pub fn new(mask: CloneFlags, opts: UnshareOpts) -> Pool {
        Pool {
            mask,
            opts,
            shared: Arc::new(Shared {
                state: Mutex::new(State::default()),
                cvar: Condvar::new(),
            }),
        }
    }

    /// Starts `depth` producers that keep the queue filled to `depth` sets.
    ///
    /// The returned [`PoolRunner`] owns the producers: dropping it (or
    /// calling [`PoolRunner::shutdown`]) stops them, waits for in-flight
    /// production to finish, and closes every queued set. Run one producer
    /// group at a time.
    pub fn run(&self, depth: usize) -> PoolRunner {
        {
            let mut st = lock(&self.shared);
            st.depth = depth;
            st.shutting_down = false;
            st.producers += depth;
        }
        let mut handles = Vec::with_capacity(depth);
        for _ in 0..depth {
            let shared = Arc::clone(&self.shared);
            let mask = self.mask;
            let opts = self.opts.clone();
            handles.push(thread::spawn(move || producer(&shared, mask, &opts)));
        }
        PoolRunner {
            shared: Arc::clone(&self.shared),
            handles,
        }
    }

    /// Takes a set out of the pool, waking a producer to replace it.
    ///
    /// Blocks while the queue is empty and producers are running. With no
    /// producers the set is created directly instead, so `get` works on an
    /// idle pool too.
    pub fn get(&self) -> Result<Set> {
        let mut st = lock(&self.shared);
        loop {
            if let Some(set) = st.sets.pop_front() {
                self.shared.cvar.notify_all();
                return Ok(set);
            }
            if st.producers == 0 || st.shutting_down {
                drop(st);
                return unshare_with(self.mask, &self.opts);
            }
            st = wait(&self.shared, st);
        }
    }

    /// Returns a set to the pool.
    ///
    /// Meant for sets borrowed via [`Pool::get`] that were used without
    /// non-reversible effects and can be handed to the next consumer.
    pub fn put(&self, set: Set) {
        let mut st = lock(&self.shared);
        if st.shutting_down {
            drop(st);
            set.close();
            return;
        }
        st.sets.push_back(set);
        self.shared.cvar.notify_all();
    }

    /// Current number of queued sets.
    pub fn len(&self) -> usize {
        lock(&self.shared).sets.len()
    }

    /// Whether the queue is currently empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn producer(shared: &Shared, mask: CloneFlags, opts: &UnshareOpts) {
    loop {
        {
            let mut st = lock(shared);
            loop {
                if st.shutting_down {
                    st.producers -= 1;
                    drop(st);
                    shared.cvar.notify_all();
                    return;
                }
                if st.sets.len() < st.depth {
                    break;
                }
                st = wait(shared, st);
            }
        }

        match unshare_with(mask, opts) {
            Ok(set) => {
                let mut st = lock(shared);
                // Another producer may have filled the queue meanwhile; the
                // in-flight set stays owned here until there is room again.
                loop {
                    if st.shutting_down {
                        st.producers -= 1;
                        drop(st);
                        shared.cvar.notify_all();
                        set.close();
                        return;
                    }
                    if st.sets.len() < st.depth {
                        break;
                    }
                    st = wait(shared, st);
                }
                st.sets.push_back(set);
                shared.cvar.notify_all();
            }
            Err(e) => {
                warn!("pool producer failed to create namespaces: {e}");
                thread::sleep(PRODUCER_ERROR_BACKOFF);
            }
        }
    }
}

/// Handle to a running producer group. See [`Pool::run`].
pub struct PoolRunner {
    shared: Arc<Shared>,
    handles: Vec<JoinHandle<()>>,
}

impl PoolRunner {
    /// Stops the producers, joins them, and closes every queued set.
    ///
    /// After this returns the pool is empty and idle; [`Pool::get`] falls
    /// back to creating sets directly, and [`Pool::run`] may be called
    /// again.
    pub fn shutdown(mut self) {
        self.shutdown_inner();
    }

    fn shutdown_inner(&mut self) {
        if self.handles.is_empty() {
            return;
        }
        {
            let mut st = lock(&self.shared);
            st.shutting_down = true;
        }
        self.shared.cvar.notify_all();
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                warn!("pool producer panicked");
            }
        }
        let drained: Vec<Set> = {
            let mut st = lock(&self.shared);
            let sets = st.sets.drain(..).collect();
            st.shutting_down = false;
            st.depth = 0;
            sets
        };
        for set in drained {
            set.close();
        }
        self.shared.cvar.notify_all();
    }
}

impl Drop for PoolRunner {
    fn drop(&mut self) {
        self.shutdown_inner();
    }
}
