//! Provide the canonical vocabulary shared by the Kuri validator and the C lowering backend.
//!
//! This crate is intentionally small and dependency-free. It holds registries (stable ids plus
//! spelling/metadata tables) so the compiler never scatters string comparisons for primitive type
//! names, operator spellings or runtime symbol names.
//!
//! ## Notes
//!
//! - **No IO**, no global state, and no compiler-specific types (no AST, no type indices).
//! - The [`runtime`] module names the structures and symbols the generated C relies on. The backend
//!   and the reflection tables must agree on them, so they live in one place.

pub mod lang;
pub mod runtime;
