//! Kuri compiler frontend
//!
//! This module contains the semantic half of the compiler; parsing happens elsewhere and hands over
//! an [`ast::SourceFile`] per module.
//! - `types`: structural type registry, coercion rules and layout
//! - `ast`: tree model with resolution slots
//! - `module`: per-file symbol sets (functions, compounds, globals, imports, exports)
//! - `suspension`: the `Ok | Error | Wait` protocol
//! - `validator`: name, type, overload and control-flow resolution
//! - `scheduler`: runs validation units across workers, parking those that wait
//! - `diagnostics`: source-anchored error reports
//! - `mangle`: linkage names

pub mod ast;
pub mod diagnostics;
pub mod mangle;
pub mod module;
pub mod scheduler;
pub mod scope;
pub mod suspension;
pub mod types;
pub mod validator;
