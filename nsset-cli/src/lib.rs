#![forbid(unsafe_code)]
#![deny(missing_docs)]
//! # nsrun
//!
//! This crate provides the CLI application over the namespace machinery in
//! the `nsset-core` crate. It is responsible for parsing command-line
//! arguments, validating them, and orchestrating the core operations.
//!
//! ## Architecture
//!
//! - **CLI logic**: argument parsing and validation live here.
//! - **Namespace machinery**: all heavy lifting is delegated to
//!   `nsset-core`.

pub mod adapter;
pub mod parser;
pub mod runner;

pub use adapter::{adapt_and_validate, Config, Source};
pub use parser::Cli;
