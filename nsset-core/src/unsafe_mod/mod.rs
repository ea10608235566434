#![deny(missing_docs)]
//! Low-level, `unsafe` process bindings.
//!
//! This module owns the raw `clone(2)` call that creates a namespace holder
//! child. The child's execution regime is intentionally ambiguous between
//! parent and child until it exits, so everything it runs must be a raw
//! syscall.

pub mod command;
pub mod process;

pub(crate) use process::spawn_holder;
