//! Primitive type vocabulary.
//!
//! Covers the builtin scalar types (`n8`..`n64`, `z8`..`z64`, `r32`, `r64`, `bool`, `octet`), the
//! unit type `rien`, and the two runtime-backed builtins `chaine` (string view) and `eini` (boxed any).
//!
//! ## Notes
//! - Lookup via [`from_str`] is **case-sensitive**: Kuri type names are lowercase.
//! - Sizes and alignments are the target layout used both by the type registry and by the reflection
//!   tables emitted into the generated C. `chaine` and `eini` are two-word structures.
//!
//! ## Examples
//! ```rust
//! use kuri_core::lang::primitives::{self, PrimitiveCategory, PrimitiveId};
//!
//! assert_eq!(primitives::from_str("r64"), Some(PrimitiveId::R64));
//! assert_eq!(primitives::info_for(PrimitiveId::N16).alignment, 2);
//! assert_eq!(primitives::info_for(PrimitiveId::Chaine).category, PrimitiveCategory::String);
//! ```

/// Stable identifier for every primitive type.
///
/// The discriminants are dense and start at zero; [`PRIMITIVES`] is ordered by them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimitiveId {
    N8,
    N16,
    N32,
    N64,
    Z8,
    Z16,
    Z32,
    Z64,
    R32,
    R64,
    Bool,
    Octet,
    Rien,
    Chaine,
    Eini,
}

/// Broad classification used by coercion and operator rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveCategory {
    Unsigned,
    Signed,
    Real,
    Bool,
    Byte,
    Nothing,
    String,
    Any,
}

/// Metadata for a primitive type.
#[derive(Debug, Clone, Copy)]
pub struct PrimitiveInfo {
    pub id: PrimitiveId,
    /// Source spelling.
    pub spelling: &'static str,
    /// Spelling in the generated C.
    pub c_spelling: &'static str,
    /// Short code used when encoding signatures into linkage names.
    pub mangle_code: &'static str,
    pub size: u64,
    pub alignment: u64,
    pub category: PrimitiveCategory,
    pub description: &'static str,
}

impl PrimitiveInfo {
    pub fn is_integer(&self) -> bool {
        matches!(self.category, PrimitiveCategory::Unsigned | PrimitiveCategory::Signed)
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.category == PrimitiveCategory::Real
    }
}

/// Every primitive id, in registry order.
pub const ALL: [PrimitiveId; 15] = [
    PrimitiveId::N8,
    PrimitiveId::N16,
    PrimitiveId::N32,
    PrimitiveId::N64,
    PrimitiveId::Z8,
    PrimitiveId::Z16,
    PrimitiveId::Z32,
    PrimitiveId::Z64,
    PrimitiveId::R32,
    PrimitiveId::R64,
    PrimitiveId::Bool,
    PrimitiveId::Octet,
    PrimitiveId::Rien,
    PrimitiveId::Chaine,
    PrimitiveId::Eini,
];

/// Registry of primitive types.
pub const PRIMITIVES: &[PrimitiveInfo] = &[
    info(PrimitiveId::N8, "n8", "uint8_t", "n8", 1, PrimitiveCategory::Unsigned, "Unsigned 8-bit integer."),
    info(PrimitiveId::N16, "n16", "uint16_t", "n16", 2, PrimitiveCategory::Unsigned, "Unsigned 16-bit integer."),
    info(PrimitiveId::N32, "n32", "uint32_t", "n32", 4, PrimitiveCategory::Unsigned, "Unsigned 32-bit integer."),
    info(PrimitiveId::N64, "n64", "uint64_t", "n64", 8, PrimitiveCategory::Unsigned, "Unsigned 64-bit integer."),
    info(PrimitiveId::Z8, "z8", "int8_t", "z8", 1, PrimitiveCategory::Signed, "Signed 8-bit integer."),
    info(PrimitiveId::Z16, "z16", "int16_t", "z16", 2, PrimitiveCategory::Signed, "Signed 16-bit integer."),
    info(PrimitiveId::Z32, "z32", "int32_t", "z32", 4, PrimitiveCategory::Signed, "Signed 32-bit integer."),
    info(PrimitiveId::Z64, "z64", "int64_t", "z64", 8, PrimitiveCategory::Signed, "Signed 64-bit integer."),
    info(PrimitiveId::R32, "r32", "float", "r32", 4, PrimitiveCategory::Real, "32-bit floating point."),
    info(PrimitiveId::R64, "r64", "double", "r64", 8, PrimitiveCategory::Real, "64-bit floating point."),
    info(PrimitiveId::Bool, "bool", "bool", "b", 1, PrimitiveCategory::Bool, "Boolean."),
    info(PrimitiveId::Octet, "octet", "uint8_t", "o", 1, PrimitiveCategory::Byte, "Raw byte."),
    PrimitiveInfo {
        id: PrimitiveId::Rien,
        spelling: "rien",
        c_spelling: "void",
        mangle_code: "v",
        size: 0,
        alignment: 1,
        category: PrimitiveCategory::Nothing,
        description: "Absence of a value.",
    },
    PrimitiveInfo {
        id: PrimitiveId::Chaine,
        spelling: "chaine",
        c_spelling: crate::runtime::STRING_STRUCT,
        mangle_code: "Kc",
        size: 16,
        alignment: 8,
        category: PrimitiveCategory::String,
        description: "String view: byte pointer plus length.",
    },
    PrimitiveInfo {
        id: PrimitiveId::Eini,
        spelling: "eini",
        c_spelling: crate::runtime::ANY_STRUCT,
        mangle_code: "Ke",
        size: 16,
        alignment: 8,
        category: PrimitiveCategory::Any,
        description: "Boxed value: data pointer plus type-info pointer.",
    },
];

/// Return the full metadata entry for a primitive.
pub fn info_for(id: PrimitiveId) -> &'static PrimitiveInfo {
    &PRIMITIVES[id as usize]
}

/// Resolve a source spelling to its primitive id.
///
/// ## Returns
/// - `Some(PrimitiveId)` if the spelling names a primitive.
/// - `None` otherwise (the name may still be a compound type).
pub fn from_str(spelling: &str) -> Option<PrimitiveId> {
    PRIMITIVES.iter().find(|p| p.spelling == spelling).map(|p| p.id)
}

/// Return the source spelling for a primitive.
pub fn as_str(id: PrimitiveId) -> &'static str {
    info_for(id).spelling
}

// --- helpers -----------------------------------------------------------------

const fn info(
    id: PrimitiveId,
    spelling: &'static str,
    c_spelling: &'static str,
    mangle_code: &'static str,
    size: u64,
    category: PrimitiveCategory,
    description: &'static str,
) -> PrimitiveInfo {
    PrimitiveInfo {
        id,
        spelling,
        c_spelling,
        mangle_code,
        size,
        alignment: size,
        category,
        description,
    }
}
