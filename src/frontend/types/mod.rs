//! Structural type registry.
//!
//! Types are described by a [`TypeDescriptor`], a token sequence read outer-to-inner (`*[4]z32` is
//! `[Pointer, Array(4), Primitive(z32)]`). Descriptors are hash-consed: interning the same descriptor
//! twice yields the same [`TypeIndex`], so type equality everywhere else is index equality.
//!
//! ## Notes
//!
//! - **Recursive interning**: interning a wrapper (pointer, reference, array, slice) first interns the
//!   descriptor it wraps, so [`TypeRegistry::pointee`] never allocates.
//! - **Validity**: a descriptor whose last token is a wrapper has no base type and is rejected; it is
//!   never stored.
//! - **Compounds** (structs, enums, opaque externals) are declared first and populated later. A struct
//!   containing itself by value, directly or through fixed-size arrays, is refused when its fields are
//!   set.
//! - The registry is shared by every validation worker: reads take a shared lock, inserts serialize.
//!
//! ## See also
//!
//! - [`compat`] – coercion rules shared by assignment, argument and return checking
//! - [`layout`] – size and alignment computation

mod compat;
mod layout;

pub use compat::{Coercion, CoercionSet, SourceKind};
pub use layout::Layout;

use std::collections::HashMap;

use kuri_core::lang::primitives::{self, PrimitiveId};
use kuri_core::runtime;
use parking_lot::RwLock;

/// Stable handle of an interned [`TypeDescriptor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeIndex(pub u32);

impl TypeIndex {
    pub const N8: TypeIndex = TypeIndex(PrimitiveId::N8 as u32);
    pub const N16: TypeIndex = TypeIndex(PrimitiveId::N16 as u32);
    pub const N32: TypeIndex = TypeIndex(PrimitiveId::N32 as u32);
    pub const N64: TypeIndex = TypeIndex(PrimitiveId::N64 as u32);
    pub const Z8: TypeIndex = TypeIndex(PrimitiveId::Z8 as u32);
    pub const Z16: TypeIndex = TypeIndex(PrimitiveId::Z16 as u32);
    pub const Z32: TypeIndex = TypeIndex(PrimitiveId::Z32 as u32);
    pub const Z64: TypeIndex = TypeIndex(PrimitiveId::Z64 as u32);
    pub const R32: TypeIndex = TypeIndex(PrimitiveId::R32 as u32);
    pub const R64: TypeIndex = TypeIndex(PrimitiveId::R64 as u32);
    pub const BOOL: TypeIndex = TypeIndex(PrimitiveId::Bool as u32);
    pub const OCTET: TypeIndex = TypeIndex(PrimitiveId::Octet as u32);
    pub const RIEN: TypeIndex = TypeIndex(PrimitiveId::Rien as u32);
    pub const CHAINE: TypeIndex = TypeIndex(PrimitiveId::Chaine as u32);
    pub const EINI: TypeIndex = TypeIndex(PrimitiveId::Eini as u32);
    /// Type of the `nul` literal.
    pub const NULL: TypeIndex = TypeIndex(primitives::ALL.len() as u32);
    /// The runtime type-info record, as an opaque compound.
    pub const TYPE_INFO: TypeIndex = TypeIndex(primitives::ALL.len() as u32 + 1);
    /// `*InfoType`.
    pub const TYPE_INFO_PTR: TypeIndex = TypeIndex(primitives::ALL.len() as u32 + 2);
    /// Sentinel stored in nodes that have not been validated yet.
    pub const UNRESOLVED: TypeIndex = TypeIndex(u32::MAX);

    pub const fn primitive(id: PrimitiveId) -> TypeIndex {
        TypeIndex(id as u32)
    }

    pub fn is_resolved(self) -> bool {
        self != TypeIndex::UNRESOLVED
    }
}

impl Default for TypeIndex {
    fn default() -> Self {
        TypeIndex::UNRESOLVED
    }
}

/// Handle of a struct, enum or opaque declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompoundId(pub u32);

impl CompoundId {
    /// The built-in opaque `InfoType` compound.
    pub const TYPE_INFO: CompoundId = CompoundId(0);
}

/// Parameter and return lists of a function or coroutine type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    pub params: Vec<TypeIndex>,
    pub returns: Vec<TypeIndex>,
    pub coroutine: bool,
}

/// One element of a [`TypeDescriptor`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeToken {
    Primitive(PrimitiveId),
    Null,
    Pointer,
    Reference,
    /// Fixed-size array carrying its length.
    Array(u64),
    /// Dynamic array view.
    Slice,
    Function(Signature),
    Compound(CompoundId),
}

impl TypeToken {
    /// Wrappers must be followed by the descriptor they wrap.
    pub fn is_wrapper(&self) -> bool {
        matches!(self, TypeToken::Pointer | TypeToken::Reference | TypeToken::Array(_) | TypeToken::Slice)
    }
}

/// Ordered token sequence describing a type, outer-to-inner.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeDescriptor {
    tokens: Vec<TypeToken>,
}

impl TypeDescriptor {
    pub fn new(tokens: Vec<TypeToken>) -> Self {
        Self { tokens }
    }

    pub fn primitive(id: PrimitiveId) -> Self {
        Self::new(vec![TypeToken::Primitive(id)])
    }

    pub fn compound(id: CompoundId) -> Self {
        Self::new(vec![TypeToken::Compound(id)])
    }

    pub fn function(signature: Signature) -> Self {
        Self::new(vec![TypeToken::Function(signature)])
    }

    /// Prepend `token` to `inner`, e.g. `wrap(Pointer, z32)` is `*z32`.
    pub fn wrap(token: TypeToken, inner: &TypeDescriptor) -> Self {
        let mut tokens = Vec::with_capacity(inner.tokens.len() + 1);
        tokens.push(token);
        tokens.extend(inner.tokens.iter().cloned());
        Self { tokens }
    }

    pub fn tokens(&self) -> &[TypeToken] {
        &self.tokens
    }

    /// Outermost token (the "base token" of the type).
    pub fn outer(&self) -> Option<&TypeToken> {
        self.tokens.first()
    }

    /// Exactly one base token, in last position, preceded only by wrappers.
    pub fn is_valid(&self) -> bool {
        match self.tokens.split_last() {
            Some((last, rest)) => !last.is_wrapper() && rest.iter().all(TypeToken::is_wrapper),
            None => false,
        }
    }

    fn inner(&self) -> Option<TypeDescriptor> {
        match self.tokens.first() {
            Some(token) if token.is_wrapper() => Some(TypeDescriptor::new(self.tokens[1..].to_vec())),
            _ => None,
        }
    }
}

/// A named field with its byte offset inside the owning struct.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: TypeIndex,
    pub offset: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CompoundKind {
    Struct,
    Enum { backing: TypeIndex, variants: Vec<(String, i64)> },
    /// Declared by external code; fields unknown.
    Opaque,
}

/// Population progress of a compound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompoundState {
    Declared,
    Populated,
    Finalized,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompoundDescriptor {
    pub id: CompoundId,
    pub name: String,
    /// Name of the declaring module.
    pub module: String,
    pub kind: CompoundKind,
    pub fields: Vec<Field>,
    pub size: u64,
    pub alignment: u64,
    pub state: CompoundState,
    /// Interned `[Compound(id)]` descriptor.
    pub index: TypeIndex,
}

impl CompoundDescriptor {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn variant(&self, name: &str) -> Option<i64> {
        match &self.kind {
            CompoundKind::Enum { variants, .. } => variants.iter().find(|(n, _)| n == name).map(|(_, v)| *v),
            _ => None,
        }
    }

    pub fn is_enum(&self) -> bool {
        matches!(self.kind, CompoundKind::Enum { .. })
    }
}

/// Registry failures. Validation turns these into diagnostics; the backend treats them as faults.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypeError {
    #[error("type `{0}` has nothing to dereference")]
    InvalidDereference(String),
    #[error("malformed type descriptor {0}")]
    InvalidDescriptor(String),
    #[error("`{structure}` cannot contain itself by value (field `{field}`)")]
    StructureCycle { structure: String, field: String },
    #[error("unknown compound #{0}")]
    UnknownCompound(u32),
    #[error("duplicate field `{field}` in `{structure}`")]
    DuplicateField { structure: String, field: String },
    #[error("unknown type index #{0}")]
    UnknownType(u32),
    #[error("layout of `{0}` is not known yet")]
    Incomplete(String),
    #[error("type `{0}` is too large")]
    TooLarge(String),
}

/// Hash-consed store of every type used by a compilation.
#[derive(Debug)]
pub struct TypeRegistry {
    inner: RwLock<RegistryInner>,
}

#[derive(Debug, Default)]
pub(crate) struct RegistryInner {
    descriptors: Vec<TypeDescriptor>,
    lookup: HashMap<TypeDescriptor, TypeIndex>,
    compounds: Vec<CompoundDescriptor>,
    layouts: HashMap<TypeIndex, Layout>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    /// Create a registry with every primitive, `nul` and the `InfoType` record pre-interned at the
    /// fixed indices exposed as [`TypeIndex`] constants.
    pub fn new() -> Self {
        let mut inner = RegistryInner::default();
        for id in primitives::ALL {
            inner.push(TypeDescriptor::primitive(id));
        }
        inner.push(TypeDescriptor::new(vec![TypeToken::Null]));
        let info = inner.declare_compound(runtime::TYPE_INFO_COMPOUND, "", CompoundKind::Opaque);
        inner.compounds[info.0 as usize].state = CompoundState::Finalized;
        inner.push(TypeDescriptor::wrap(TypeToken::Pointer, &TypeDescriptor::compound(info)));
        Self {
            inner: RwLock::new(inner),
        }
    }

    /// Intern `descriptor`, returning its stable index.
    ///
    /// ## Errors
    /// - [`TypeError::InvalidDescriptor`] if the descriptor has no base token.
    /// - [`TypeError::UnknownCompound`] / [`TypeError::UnknownType`] for dangling references.
    pub fn intern(&self, descriptor: TypeDescriptor) -> Result<TypeIndex, TypeError> {
        if let Some(index) = self.inner.read().lookup.get(&descriptor) {
            return Ok(*index);
        }
        self.inner.write().intern(descriptor)
    }

    pub fn pointer_to(&self, ty: TypeIndex) -> Result<TypeIndex, TypeError> {
        self.wrap(TypeToken::Pointer, ty)
    }

    pub fn reference_to(&self, ty: TypeIndex) -> Result<TypeIndex, TypeError> {
        self.wrap(TypeToken::Reference, ty)
    }

    pub fn array_of(&self, ty: TypeIndex, len: u64) -> Result<TypeIndex, TypeError> {
        self.wrap(TypeToken::Array(len), ty)
    }

    pub fn slice_of(&self, ty: TypeIndex) -> Result<TypeIndex, TypeError> {
        self.wrap(TypeToken::Slice, ty)
    }

    pub fn function(&self, signature: Signature) -> Result<TypeIndex, TypeError> {
        self.intern(TypeDescriptor::function(signature))
    }

    fn wrap(&self, token: TypeToken, ty: TypeIndex) -> Result<TypeIndex, TypeError> {
        let inner = self.descriptor(ty)?;
        self.intern(TypeDescriptor::wrap(token, &inner))
    }

    pub fn descriptor(&self, index: TypeIndex) -> Result<TypeDescriptor, TypeError> {
        self.inner.read().descriptor(index).cloned()
    }

    /// Outermost token of an interned type.
    pub fn base_token(&self, index: TypeIndex) -> Result<TypeToken, TypeError> {
        let inner = self.inner.read();
        let descriptor = inner.descriptor(index)?;
        descriptor
            .outer()
            .cloned()
            .ok_or_else(|| TypeError::InvalidDescriptor(format!("#{}", index.0)))
    }

    /// `true` for the unresolved sentinel and for anything the registry never handed out.
    pub fn is_invalid(&self, index: TypeIndex) -> bool {
        self.inner.read().descriptor(index).is_err()
    }

    /// Strip the outermost wrapper.
    ///
    /// ## Errors
    /// - [`TypeError::InvalidDereference`] if the outermost token is not a wrapper.
    pub fn dereference(&self, index: TypeIndex) -> Result<TypeDescriptor, TypeError> {
        let inner = self.inner.read();
        let descriptor = inner.descriptor(index)?;
        descriptor
            .inner()
            .ok_or_else(|| TypeError::InvalidDereference(inner.display(index)))
    }

    /// Index of the dereferenced type. Always interned thanks to recursive interning.
    pub fn pointee(&self, index: TypeIndex) -> Result<TypeIndex, TypeError> {
        let inner_descriptor = self.dereference(index)?;
        let inner = self.inner.read();
        inner
            .lookup
            .get(&inner_descriptor)
            .copied()
            .ok_or_else(|| TypeError::InvalidDereference(inner.display(index)))
    }

    pub fn primitive_of(&self, index: TypeIndex) -> Option<PrimitiveId> {
        match self.base_token(index) {
            Ok(TypeToken::Primitive(id)) => Some(id),
            _ => None,
        }
    }

    pub fn signature_of(&self, index: TypeIndex) -> Option<Signature> {
        match self.base_token(index) {
            Ok(TypeToken::Function(signature)) => Some(signature),
            _ => None,
        }
    }

    pub fn compound_of(&self, index: TypeIndex) -> Option<CompoundId> {
        match self.base_token(index) {
            Ok(TypeToken::Compound(id)) => Some(id),
            _ => None,
        }
    }

    pub fn is_integer(&self, index: TypeIndex) -> bool {
        self.primitive_of(index)
            .is_some_and(|id| primitives::info_for(id).is_integer())
    }

    pub fn is_real(&self, index: TypeIndex) -> bool {
        matches!(self.primitive_of(index), Some(PrimitiveId::R32 | PrimitiveId::R64))
    }

    pub fn is_pointer(&self, index: TypeIndex) -> bool {
        matches!(self.base_token(index), Ok(TypeToken::Pointer))
    }

    /// Integer-like for arithmetic and casts: integers, `octet` and enums.
    pub fn is_integral(&self, index: TypeIndex) -> bool {
        if self.is_integer(index) || index == TypeIndex::OCTET {
            return true;
        }
        self.compound_of(index)
            .and_then(|id| self.compound(id).ok())
            .is_some_and(|c| c.is_enum())
    }

    /// Number of interned descriptors.
    pub fn len(&self) -> usize {
        self.inner.read().descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ------------------------------------------------------------------------
    // Compounds
    // ------------------------------------------------------------------------

    /// Declare a struct (or an opaque external struct) with no fields yet.
    pub fn declare_struct(&self, name: &str, module: &str, opaque: bool) -> (CompoundId, TypeIndex) {
        let kind = if opaque { CompoundKind::Opaque } else { CompoundKind::Struct };
        let mut inner = self.inner.write();
        let id = inner.declare_compound(name, module, kind);
        if opaque {
            inner.compounds[id.0 as usize].state = CompoundState::Finalized;
        }
        (id, inner.compounds[id.0 as usize].index)
    }

    /// Declare an enum; its variants are set by [`TypeRegistry::set_enum`].
    pub fn declare_enum(&self, name: &str, module: &str) -> (CompoundId, TypeIndex) {
        let kind = CompoundKind::Enum {
            backing: TypeIndex::Z32,
            variants: Vec::new(),
        };
        let mut inner = self.inner.write();
        let id = inner.declare_compound(name, module, kind);
        (id, inner.compounds[id.0 as usize].index)
    }

    pub fn compound(&self, id: CompoundId) -> Result<CompoundDescriptor, TypeError> {
        self.inner.read().compound(id).cloned()
    }

    /// Set the fields of a declared struct.
    ///
    /// ## Errors
    /// - [`TypeError::DuplicateField`] if two fields share a name.
    /// - [`TypeError::StructureCycle`] if a field embeds the struct by value, directly or through other
    ///   structs and fixed-size arrays whose fields are already known.
    pub fn set_fields(&self, id: CompoundId, fields: Vec<(String, TypeIndex)>) -> Result<(), TypeError> {
        let mut inner = self.inner.write();
        let name = inner.compound(id)?.name.clone();
        let mut seen: Vec<&str> = Vec::with_capacity(fields.len());
        for (field, ty) in &fields {
            if seen.contains(&field.as_str()) {
                return Err(TypeError::DuplicateField {
                    structure: name,
                    field: field.clone(),
                });
            }
            seen.push(field);
            if inner.reaches_by_value(*ty, id) {
                return Err(TypeError::StructureCycle {
                    structure: name,
                    field: field.clone(),
                });
            }
        }
        let compound = &mut inner.compounds[id.0 as usize];
        compound.fields = fields
            .into_iter()
            .map(|(name, ty)| Field { name, ty, offset: 0 })
            .collect();
        compound.state = CompoundState::Populated;
        Ok(())
    }

    /// Set the backing type and variants of a declared enum; enums are finalized immediately.
    pub fn set_enum(&self, id: CompoundId, backing: TypeIndex, variants: Vec<(String, i64)>) -> Result<(), TypeError> {
        let mut inner = self.inner.write();
        let backing_layout = inner.layout_of(backing)?;
        let compound = inner.compound_mut(id)?;
        compound.kind = CompoundKind::Enum { backing, variants };
        compound.size = backing_layout.size;
        compound.alignment = backing_layout.alignment;
        compound.state = CompoundState::Finalized;
        Ok(())
    }

    /// Compute field offsets, size and alignment of a populated struct.
    ///
    /// Every compound embedded by value must already be finalized. Fails with
    /// [`TypeError::TooLarge`] when the size does not fit an `int64_t`.
    pub fn finalize(&self, id: CompoundId) -> Result<Layout, TypeError> {
        self.inner.write().finalize(id)
    }

    /// Compounds embedded by value in `index` (through fixed-size arrays), outermost first.
    pub fn by_value_compounds(&self, index: TypeIndex) -> Vec<CompoundId> {
        self.inner.read().by_value_compounds(index)
    }

    /// Size and alignment of a type, memoized per index.
    pub fn layout(&self, index: TypeIndex) -> Result<Layout, TypeError> {
        if let Some(layout) = self.inner.read().layouts.get(&index) {
            return Ok(*layout);
        }
        self.inner.write().layout_of(index)
    }

    /// Human-readable spelling used in diagnostics (`*z32`, `[4]r64`, `fonc(z32)(bool)`).
    pub fn display(&self, index: TypeIndex) -> String {
        self.inner.read().display(index)
    }
}

impl RegistryInner {
    fn push(&mut self, descriptor: TypeDescriptor) -> TypeIndex {
        let index = TypeIndex(self.descriptors.len() as u32);
        self.lookup.insert(descriptor.clone(), index);
        self.descriptors.push(descriptor);
        index
    }

    fn intern(&mut self, descriptor: TypeDescriptor) -> Result<TypeIndex, TypeError> {
        if let Some(index) = self.lookup.get(&descriptor) {
            return Ok(*index);
        }
        if !descriptor.is_valid() {
            return Err(TypeError::InvalidDescriptor(format!("{:?}", descriptor.tokens())));
        }
        for token in descriptor.tokens() {
            match token {
                TypeToken::Compound(id) => {
                    self.compound(*id)?;
                }
                TypeToken::Function(signature) => {
                    for ty in signature.params.iter().chain(&signature.returns) {
                        self.descriptor(*ty)?;
                    }
                }
                _ => {}
            }
        }
        if let Some(inner) = descriptor.inner() {
            self.intern(inner)?;
        }
        Ok(self.push(descriptor))
    }

    pub(crate) fn descriptor(&self, index: TypeIndex) -> Result<&TypeDescriptor, TypeError> {
        self.descriptors
            .get(index.0 as usize)
            .ok_or(TypeError::UnknownType(index.0))
    }

    pub(crate) fn compound(&self, id: CompoundId) -> Result<&CompoundDescriptor, TypeError> {
        self.compounds.get(id.0 as usize).ok_or(TypeError::UnknownCompound(id.0))
    }

    fn compound_mut(&mut self, id: CompoundId) -> Result<&mut CompoundDescriptor, TypeError> {
        self.compounds
            .get_mut(id.0 as usize)
            .ok_or(TypeError::UnknownCompound(id.0))
    }

    fn declare_compound(&mut self, name: &str, module: &str, kind: CompoundKind) -> CompoundId {
        let id = CompoundId(self.compounds.len() as u32);
        self.compounds.push(CompoundDescriptor {
            id,
            name: name.to_string(),
            module: module.to_string(),
            kind,
            fields: Vec::new(),
            size: 0,
            alignment: 1,
            state: CompoundState::Declared,
            index: TypeIndex::UNRESOLVED,
        });
        let index = self.push(TypeDescriptor::compound(id));
        self.compounds[id.0 as usize].index = index;
        id
    }

    fn by_value_compounds(&self, index: TypeIndex) -> Vec<CompoundId> {
        let Ok(descriptor) = self.descriptor(index) else {
            return Vec::new();
        };
        let mut found = Vec::new();
        for token in descriptor.tokens() {
            match token {
                TypeToken::Array(_) => continue,
                TypeToken::Compound(id) => found.push(*id),
                _ => {}
            }
            break;
        }
        found
    }

    /// Does a value of type `index` contain `target` by value?
    fn reaches_by_value(&self, index: TypeIndex, target: CompoundId) -> bool {
        let mut stack = self.by_value_compounds(index);
        let mut visited = Vec::new();
        while let Some(id) = stack.pop() {
            if id == target {
                return true;
            }
            if visited.contains(&id) {
                continue;
            }
            visited.push(id);
            if let Ok(compound) = self.compound(id) {
                for field in &compound.fields {
                    stack.extend(self.by_value_compounds(field.ty));
                }
            }
        }
        false
    }

    pub(crate) fn display(&self, index: TypeIndex) -> String {
        match self.descriptor(index) {
            Ok(descriptor) => self.display_tokens(descriptor.tokens()),
            Err(_) => "<unresolved>".to_string(),
        }
    }

    fn display_tokens(&self, tokens: &[TypeToken]) -> String {
        let Some((first, rest)) = tokens.split_first() else {
            return String::new();
        };
        match first {
            TypeToken::Primitive(id) => primitives::as_str(*id).to_string(),
            TypeToken::Null => "nul".to_string(),
            TypeToken::Pointer => format!("*{}", self.display_tokens(rest)),
            TypeToken::Reference => format!("&{}", self.display_tokens(rest)),
            TypeToken::Array(len) => format!("[{len}]{}", self.display_tokens(rest)),
            TypeToken::Slice => format!("[]{}", self.display_tokens(rest)),
            TypeToken::Function(signature) => {
                let keyword = if signature.coroutine { "corout" } else { "fonc" };
                let params: Vec<String> = signature.params.iter().map(|t| self.display(*t)).collect();
                let returns: Vec<String> = signature.returns.iter().map(|t| self.display(*t)).collect();
                format!("{keyword}({})({})", params.join(", "), returns.join(", "))
            }
            TypeToken::Compound(id) => match self.compound(*id) {
                Ok(compound) => compound.name.clone(),
                Err(_) => format!("<compound #{}>", id.0),
            },
        }
    }
}

#[cfg(test)]
mod tests;
