//! Operator vocabulary.
//!
//! Binary and unary operators with their source spelling, their C spelling and the category the
//! validator uses to pick typing rules.
//!
//! ## Notes
//! - Lookup via [`binary_from_str`] / [`unary_from_str`] is **case-sensitive**.
//! - Address-of is spelled `@` and dereference is spelled `mémoire` in source; both map onto the
//!   usual C prefix operators.
//!
//! ## Examples
//! ```rust
//! use kuri_core::lang::operators::{self, BinaryOpId, OperatorCategory};
//!
//! assert_eq!(operators::binary_from_str("<="), Some(BinaryOpId::Le));
//! assert_eq!(operators::binary_info(BinaryOpId::Le).category, OperatorCategory::Comparison);
//! ```

/// Typing family of an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorCategory {
    Arithmetic,
    Comparison,
    Logical,
    Bitwise,
}

/// Stable identifier for binary operators. Ordered like [`BINARY_OPERATORS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOpId {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

/// Stable identifier for unary operators. Ordered like [`UNARY_OPERATORS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOpId {
    Neg,
    Not,
    BitNot,
    AddressOf,
    Deref,
}

/// Metadata for a binary operator.
#[derive(Debug, Clone, Copy)]
pub struct BinaryOpInfo {
    pub id: BinaryOpId,
    pub spelling: &'static str,
    pub c_spelling: &'static str,
    pub category: OperatorCategory,
}

/// Metadata for a unary operator.
#[derive(Debug, Clone, Copy)]
pub struct UnaryOpInfo {
    pub id: UnaryOpId,
    pub spelling: &'static str,
    pub c_spelling: &'static str,
}

/// Registry of binary operators.
pub const BINARY_OPERATORS: &[BinaryOpInfo] = &[
    binary(BinaryOpId::Add, "+", "+", OperatorCategory::Arithmetic),
    binary(BinaryOpId::Sub, "-", "-", OperatorCategory::Arithmetic),
    binary(BinaryOpId::Mul, "*", "*", OperatorCategory::Arithmetic),
    binary(BinaryOpId::Div, "/", "/", OperatorCategory::Arithmetic),
    binary(BinaryOpId::Rem, "%", "%", OperatorCategory::Arithmetic),
    binary(BinaryOpId::Eq, "==", "==", OperatorCategory::Comparison),
    binary(BinaryOpId::Ne, "!=", "!=", OperatorCategory::Comparison),
    binary(BinaryOpId::Lt, "<", "<", OperatorCategory::Comparison),
    binary(BinaryOpId::Le, "<=", "<=", OperatorCategory::Comparison),
    binary(BinaryOpId::Gt, ">", ">", OperatorCategory::Comparison),
    binary(BinaryOpId::Ge, ">=", ">=", OperatorCategory::Comparison),
    binary(BinaryOpId::And, "&&", "&&", OperatorCategory::Logical),
    binary(BinaryOpId::Or, "||", "||", OperatorCategory::Logical),
    binary(BinaryOpId::BitAnd, "&", "&", OperatorCategory::Bitwise),
    binary(BinaryOpId::BitOr, "|", "|", OperatorCategory::Bitwise),
    binary(BinaryOpId::BitXor, "^", "^", OperatorCategory::Bitwise),
    binary(BinaryOpId::Shl, "<<", "<<", OperatorCategory::Bitwise),
    binary(BinaryOpId::Shr, ">>", ">>", OperatorCategory::Bitwise),
];

/// Registry of unary operators.
pub const UNARY_OPERATORS: &[UnaryOpInfo] = &[
    UnaryOpInfo { id: UnaryOpId::Neg, spelling: "-", c_spelling: "-" },
    UnaryOpInfo { id: UnaryOpId::Not, spelling: "!", c_spelling: "!" },
    UnaryOpInfo { id: UnaryOpId::BitNot, spelling: "~", c_spelling: "~" },
    UnaryOpInfo { id: UnaryOpId::AddressOf, spelling: "@", c_spelling: "&" },
    UnaryOpInfo { id: UnaryOpId::Deref, spelling: "mémoire", c_spelling: "*" },
];

pub fn binary_info(id: BinaryOpId) -> &'static BinaryOpInfo {
    &BINARY_OPERATORS[id as usize]
}

pub fn unary_info(id: UnaryOpId) -> &'static UnaryOpInfo {
    &UNARY_OPERATORS[id as usize]
}

/// Resolve a binary operator spelling.
pub fn binary_from_str(spelling: &str) -> Option<BinaryOpId> {
    BINARY_OPERATORS.iter().find(|o| o.spelling == spelling).map(|o| o.id)
}

/// Resolve a unary operator spelling.
pub fn unary_from_str(spelling: &str) -> Option<UnaryOpId> {
    UNARY_OPERATORS.iter().find(|o| o.spelling == spelling).map(|o| o.id)
}

// --- helpers -----------------------------------------------------------------

const fn binary(
    id: BinaryOpId,
    spelling: &'static str,
    c_spelling: &'static str,
    category: OperatorCategory,
) -> BinaryOpInfo {
    BinaryOpInfo {
        id,
        spelling,
        c_spelling,
        category,
    }
}
