#![forbid(unsafe_code)]
//! Kuri Compiler Core
//!
//! Semantic validation and C lowering for the Kuri language. Parsing happens upstream: this crate
//! receives parsed modules as [`ast::SourceFile`] values (directly or as JSON documents), validates
//! them concurrently under the `Ok | Error | Wait` suspension protocol, and lowers the validated
//! program to one C translation unit.
//!
//! ## Panic Policy
//!
//! This codebase follows explicit error handling:
//!
//! - **Production code**: Use `Result` or `Option` with `?` / `ok_or` / `map_err`. The `cli` and `backend` modules
//!   enforce `#![deny(clippy::unwrap_used)]`.
//!
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.
//!
//! - **User errors**: Problems in the input program are [`diagnostics::Diagnostic`] values, never panics or
//!   `Err`s. `Err` is reserved for internal faults such as a [`backend::CodegenFault`].

pub mod backend;
pub mod cli;
pub mod config;
pub mod frontend;

pub use frontend::ast;
pub use frontend::diagnostics;
pub use frontend::scheduler::{ValidatedProgram, validate};

pub use backend::generate;
pub use config::CompileConfig;
