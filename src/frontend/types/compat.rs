//! Implicit conversion rules.
//!
//! [`TypeRegistry::compatibility`] decides whether a value of one type may be used where another is
//! expected, and which conversion makes it work. The same function backs assignment, argument
//! matching and return checking; overload resolution ranks candidates by [`Coercion::penalty`].

use kuri_core::lang::primitives::PrimitiveId;

use super::{TypeIndex, TypeRegistry, TypeToken};

/// How the source value was written, for the literal widening rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Expression,
    IntegerLiteral,
    RealLiteral,
}

/// Outcome of a compatibility check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Coercion {
    Identical,
    IntegerLiteralWiden,
    RealLiteralWiden,
    BoxToAny,
    UnboxFromAny,
    ArrayDecay,
    ByteReinterpret,
    ExtractCString,
    BindByReference,
    Incompatible,
}

impl Coercion {
    /// Cost used to rank overload candidates; `None` when incompatible.
    pub fn penalty(self) -> Option<u32> {
        match self {
            Coercion::Identical => Some(0),
            Coercion::IntegerLiteralWiden | Coercion::RealLiteralWiden | Coercion::BindByReference => Some(1),
            Coercion::ArrayDecay => Some(2),
            Coercion::ExtractCString | Coercion::ByteReinterpret => Some(3),
            Coercion::BoxToAny => Some(4),
            Coercion::UnboxFromAny => Some(5),
            Coercion::Incompatible => None,
        }
    }

    pub fn is_compatible(self) -> bool {
        self != Coercion::Incompatible
    }

    /// Whether the literal node must be retyped to the target type.
    pub fn retypes_literal(self) -> bool {
        matches!(self, Coercion::IntegerLiteralWiden | Coercion::RealLiteralWiden)
    }

    /// Conversion flags to record on the converted node.
    pub fn flags(self) -> CoercionSet {
        match self {
            Coercion::BoxToAny => CoercionSet::BOX_TO_ANY,
            Coercion::UnboxFromAny => CoercionSet::UNBOX_FROM_ANY,
            Coercion::ArrayDecay => CoercionSet::ARRAY_DECAY,
            Coercion::ByteReinterpret => CoercionSet::BYTE_REINTERPRET,
            Coercion::ExtractCString => CoercionSet::EXTRACT_C_STRING,
            Coercion::BindByReference => CoercionSet::BIND_BY_REFERENCE,
            Coercion::Identical
            | Coercion::IntegerLiteralWiden
            | Coercion::RealLiteralWiden
            | Coercion::Incompatible => CoercionSet::NONE,
        }
    }
}

/// Bitset of conversions applied to a node, consumed by the C lowering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CoercionSet(u8);

impl CoercionSet {
    pub const NONE: CoercionSet = CoercionSet(0);
    pub const BOX_TO_ANY: CoercionSet = CoercionSet(1);
    pub const UNBOX_FROM_ANY: CoercionSet = CoercionSet(1 << 1);
    pub const ARRAY_DECAY: CoercionSet = CoercionSet(1 << 2);
    pub const BYTE_REINTERPRET: CoercionSet = CoercionSet(1 << 3);
    pub const EXTRACT_C_STRING: CoercionSet = CoercionSet(1 << 4);
    pub const BIND_BY_REFERENCE: CoercionSet = CoercionSet(1 << 5);

    pub fn contains(self, other: CoercionSet) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: CoercionSet) {
        self.0 |= other.0;
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl TypeRegistry {
    /// Decide how a `source` value can be used as a `target`.
    ///
    /// ## Parameters
    /// - `target`: the expected type (parameter, variable, return slot).
    /// - `source`: the type of the value.
    /// - `kind`: whether the value is a bare literal, which unlocks literal widening.
    ///
    /// ## Returns
    /// - [`Coercion::Identical`] for equal types and for the pointer rules (`nul` to any pointer,
    ///   any pointer to `*rien`).
    /// - The single conversion that applies, or [`Coercion::Incompatible`].
    pub fn compatibility(&self, target: TypeIndex, source: TypeIndex, kind: SourceKind) -> Coercion {
        if target == source {
            return Coercion::Identical;
        }
        let inner = self.inner.read();
        let (Ok(target_desc), Ok(source_desc)) = (inner.descriptor(target), inner.descriptor(source)) else {
            return Coercion::Incompatible;
        };
        let target_tokens = target_desc.tokens();
        let source_tokens = source_desc.tokens();

        let target_prim = primitive(target_tokens);
        let source_prim = primitive(source_tokens);

        match kind {
            SourceKind::IntegerLiteral if source_prim.is_some_and(is_integer) => {
                if target_prim.is_some_and(|p| is_integer(p) || p == PrimitiveId::Octet) {
                    return Coercion::IntegerLiteralWiden;
                }
                if target_prim.is_some_and(is_real) {
                    return Coercion::RealLiteralWiden;
                }
            }
            SourceKind::RealLiteral if source_prim.is_some_and(is_real) && target_prim.is_some_and(is_real) => {
                return Coercion::RealLiteralWiden;
            }
            _ => {}
        }

        if target_prim == Some(PrimitiveId::Eini) {
            if source_prim == Some(PrimitiveId::Rien) || source_tokens.first() == Some(&TypeToken::Null) {
                return Coercion::Incompatible;
            }
            return Coercion::BoxToAny;
        }
        if source_prim == Some(PrimitiveId::Eini) {
            if target_prim == Some(PrimitiveId::Rien) {
                return Coercion::Incompatible;
            }
            return Coercion::UnboxFromAny;
        }

        match (target_tokens, source_tokens) {
            ([TypeToken::Pointer, ..] | [TypeToken::Function(_)], [TypeToken::Null]) => Coercion::Identical,
            ([TypeToken::Pointer, TypeToken::Primitive(PrimitiveId::Rien)], [TypeToken::Pointer, ..]) => {
                Coercion::Identical
            }
            ([TypeToken::Slice, target_elem @ ..], [TypeToken::Array(_), source_elem @ ..])
                if target_elem == source_elem =>
            {
                Coercion::ArrayDecay
            }
            ([TypeToken::Slice, TypeToken::Primitive(PrimitiveId::Octet)], _)
                if source_prim != Some(PrimitiveId::Rien) =>
            {
                Coercion::ByteReinterpret
            }
            (
                [TypeToken::Pointer, TypeToken::Primitive(PrimitiveId::Z8)],
                [TypeToken::Primitive(PrimitiveId::Chaine)],
            ) => Coercion::ExtractCString,
            ([TypeToken::Reference, referenced @ ..], _) if referenced == source_tokens => Coercion::BindByReference,
            _ => Coercion::Incompatible,
        }
    }
}

fn primitive(tokens: &[TypeToken]) -> Option<PrimitiveId> {
    match tokens {
        [TypeToken::Primitive(id)] => Some(*id),
        _ => None,
    }
}

fn is_integer(id: PrimitiveId) -> bool {
    kuri_core::lang::primitives::info_for(id).is_integer()
}

fn is_real(id: PrimitiveId) -> bool {
    matches!(id, PrimitiveId::R32 | PrimitiveId::R64)
}
