//! nsset-core - Linux namespaces as first-class values
//!
//! This crate treats the namespaces a thread belongs to as an owned value,
//! a [`Set`]: capture the current thread's namespaces, rebuild a set from a
//! directory of bind mounts or a live process, create a set with freshly
//! unshared namespaces, execute closures in the context of a set on a
//! pinned worker thread, persist a set to the filesystem, and keep a pool
//! of pre-created sets ready for use.
//!
//! ```no_run
//! use nsset_core::{unshare, CloneFlags};
//!
//! let set = unshare(CloneFlags::CLONE_NEWNET)?;
//! set.run(|| {
//!     // this closure observes the fresh network namespace
//! })?;
//! set.close();
//! # Ok::<(), nsset_core::Error>(())
//! ```
//!
//! Namespace membership is per-thread kernel state and several transitions
//! are one-way, so everything that mutates it runs on a worker thread
//! dedicated to that one operation; the calling thread never changes
//! namespaces behind the caller's back.

mod exec;
mod set;
mod sys;
mod unsafe_mod;
mod unshare;

pub mod errors;
pub mod namespace;
pub mod pool;
pub mod users;

pub use errors::{Error, Result};
pub use namespace::{reversible, Namespace, CLONE_NEWTIME};
pub use pool::{Pool, PoolRunner};
pub use set::{unmount, FdSet, Set};
pub use unsafe_mod::command::enter_on_exec;
pub use unshare::{unshare, unshare_with, UnshareOpts};
pub use users::IdMap;

/// Re-export of the flag-mask type used throughout the API. Namespace
/// masks combine the `CLONE_NEW*` bits (plus [`CLONE_NEWTIME`], which the
/// table in `nix` does not carry).
pub use nix::sched::CloneFlags;
