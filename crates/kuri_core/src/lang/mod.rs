//! Kuri language vocabulary registries.
//!
//! Callers work with **stable IDs** (e.g. [`primitives::PrimitiveId`], [`operators::BinaryOpId`]) and
//! look up spellings and metadata via registry tables.
//!
//! ## Notes
//! - Registries are **pure**: no AST types, no IO, no side effects.
//! - Every table is ordered by its id's discriminant, so `info_for` is a direct index.
//!
//! ## Examples
//! ```rust
//! use kuri_core::lang::primitives::{self, PrimitiveId};
//!
//! assert_eq!(primitives::from_str("z32"), Some(PrimitiveId::Z32));
//! assert_eq!(primitives::info_for(PrimitiveId::Z32).size, 4);
//! ```

pub mod c_keywords;
pub mod operators;
pub mod primitives;
