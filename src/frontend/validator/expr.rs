//! Expression validation.

use std::num::{IntErrorKind, ParseIntError};

use kuri_core::lang::operators::{self, BinaryOpId, OperatorCategory, UnaryOpId};
use kuri_core::runtime;

use super::calls::CallSite;
use super::{Validator, retype_literal, source_kind};
use crate::frontend::ast::{Access, Lowering, MemberLowering, Node, NodeKind, NodeValue, Span};
use crate::frontend::diagnostics::errors;
use crate::frontend::module::{FunctionDescriptor, ModuleId};
use crate::frontend::suspension::{Validation, WaitReason};
use crate::frontend::types::{
    Coercion, CoercionSet, CompoundDescriptor, CompoundId, CompoundKind, Signature, SourceKind, TypeIndex, TypeToken,
};

impl Validator<'_> {
    /// Validate an expression producing exactly one value.
    pub(crate) fn expr(&mut self, node: &mut Node) -> Validation<()> {
        match node.kind {
            NodeKind::IntegerLiteral
            | NodeKind::RealLiteral
            | NodeKind::BoolLiteral
            | NodeKind::StringLiteral
            | NodeKind::CharLiteral
            | NodeKind::NullLiteral => self.literal(node),
            NodeKind::Identifier => self.identifier(node),
            NodeKind::Call => self.call(node, CallSite::Value),
            NodeKind::MemberAccess => self.member(node, CallSite::Value),
            NodeKind::Index => self.index(node),
            NodeKind::Binary(op) => self.binary(node, op),
            NodeKind::Unary(op) => self.unary(node, op),
            NodeKind::Cast => self.cast(node),
            NodeKind::SizeOf => {
                let operand = self.type_operand(node)?;
                node.value = NodeValue::Type(operand);
                node.ty = TypeIndex::Z64;
                Ok(())
            }
            NodeKind::TypeInfoOf => {
                let operand = self.type_operand(node)?;
                node.value = NodeValue::Type(operand);
                node.ty = TypeIndex::TYPE_INFO_PTR;
                Ok(())
            }
            NodeKind::ArrayLiteral => self.array_literal(node),
            NodeKind::NamedArgument => Err(errors::type_mismatch(
                format!("named argument `{}` outside of a call", node.name()),
                node.span(),
            )
            .into()),
            NodeKind::Range => Err(errors::type_mismatch("a range can only be iterated by `pour`", node.span()).into()),
            NodeKind::ExprList => Err(errors::type_mismatch(
                "a list of values is only allowed in assignments, returns and yields",
                node.span(),
            )
            .into()),
            _ => Err(errors::type_mismatch("expected an expression, found a statement", node.span()).into()),
        }
    }

    /// Validate an expression that may produce several values (a multi-return call).
    pub(crate) fn expr_multi(&mut self, node: &mut Node) -> Validation<Vec<TypeIndex>> {
        match self.callable(node, CallSite::MultiValue)? {
            Some(function) => Ok(function.returns),
            None if node.ty == TypeIndex::RIEN => Ok(Vec::new()),
            None => Ok(vec![node.ty]),
        }
    }

    /// Validate `node` at `site`, returning the bound function when it is a direct call.
    pub(crate) fn callable(&mut self, node: &mut Node, site: CallSite) -> Validation<Option<FunctionDescriptor>> {
        let callee = match node.kind {
            NodeKind::Call => {
                self.call(node, site)?;
                node.callee
            }
            NodeKind::MemberAccess => {
                self.member(node, site)?;
                match node.lowering {
                    Lowering::Member(MemberLowering::Module(_)) => node.child(1).and_then(|m| m.callee),
                    _ => None,
                }
            }
            _ => {
                self.expr(node)?;
                None
            }
        };
        Ok(callee.and_then(|id| self.modules.function(id)))
    }

    // ------------------------------------------------------------------------
    // Literals and names
    // ------------------------------------------------------------------------

    fn literal(&mut self, node: &mut Node) -> Validation<()> {
        let span = node.span();
        match node.kind {
            NodeKind::IntegerLiteral => {
                let value = match parse_integer(node.name()) {
                    Ok(value) => value,
                    Err(e) if *e.kind() == IntErrorKind::PosOverflow => {
                        return Err(errors::type_mismatch(
                            format!("integer literal `{}` does not fit in 64 bits", node.name()),
                            span,
                        )
                        .into());
                    }
                    Err(_) => {
                        return Err(
                            errors::type_mismatch(format!("invalid integer literal `{}`", node.name()), span).into()
                        );
                    }
                };
                node.ty = if i32::try_from(value).is_ok() {
                    TypeIndex::Z32
                } else if i64::try_from(value).is_ok() {
                    TypeIndex::Z64
                } else {
                    TypeIndex::N64
                };
                node.value = NodeValue::Integer(i128::from(value));
            }
            NodeKind::RealLiteral => {
                let Ok(value) = node.name().replace('_', "").parse::<f64>() else {
                    return Err(errors::type_mismatch(format!("invalid real literal `{}`", node.name()), span).into());
                };
                if !value.is_finite() {
                    return Err(errors::type_mismatch(
                        format!("real literal `{}` is out of range for r64", node.name()),
                        span,
                    )
                    .into());
                }
                node.ty = TypeIndex::R64;
                node.value = NodeValue::Real(value);
            }
            NodeKind::BoolLiteral => {
                node.ty = TypeIndex::BOOL;
                node.value = NodeValue::Bool(node.name() == "vrai");
            }
            NodeKind::StringLiteral => {
                node.ty = TypeIndex::CHAINE;
                node.value = NodeValue::Str(decode_escapes(node.name()));
            }
            NodeKind::CharLiteral => {
                let bytes = decode_escapes(node.name());
                let [byte] = bytes.as_slice() else {
                    return Err(errors::type_mismatch(
                        format!("character literal `{}` is not a single byte", node.name()),
                        span,
                    )
                    .into());
                };
                node.ty = TypeIndex::Z8;
                node.value = NodeValue::Integer(i128::from(*byte));
            }
            _ => node.ty = TypeIndex::NULL,
        }
        Ok(())
    }

    fn identifier(&mut self, node: &mut Node) -> Validation<()> {
        if node.flags.declaration {
            return Err(errors::type_mismatch(
                format!("the declaration of `{}` is not a value", node.name()),
                node.span(),
            )
            .into());
        }
        if let Some(binding) = self.scope.lookup(node.name()) {
            node.ty = binding.ty;
            node.lowering = Lowering::Access(binding.access.clone());
            return Ok(());
        }
        let name = node.name().to_string();
        for module in self.visible_modules() {
            if module != self.module && !self.modules.is_exported(module, &name) {
                continue;
            }
            if let Some((ty, access)) = self.module_symbol(module, &name, node.span())? {
                node.ty = ty;
                node.lowering = Lowering::Access(access);
                return Ok(());
            }
        }
        Err(errors::unknown_symbol("variable", &name, node.span()).into())
    }

    /// A global or a (non-overloaded) function of `module` used as a value.
    pub(crate) fn module_symbol(
        &self,
        module: ModuleId,
        name: &str,
        span: Span,
    ) -> Validation<Option<(TypeIndex, Access)>> {
        if let Some(global) = self.modules.global_named(module, name) {
            self.require(WaitReason::Global {
                module,
                name: name.to_string(),
            })?;
            let ty = self.modules.global(global.id).map(|g| g.ty).unwrap_or(global.ty);
            return Ok(Some((ty, Access::Global(global.id))));
        }
        let overloads = self.modules.overloads(module, name);
        match overloads.as_slice() {
            [] => Ok(None),
            [id] => {
                self.require(WaitReason::Functions {
                    module,
                    name: name.to_string(),
                })?;
                let Some(function) = self.modules.function(*id) else {
                    return Ok(None);
                };
                let signature = Signature {
                    params: function.params.iter().map(|p| p.ty).collect(),
                    returns: function.returns.clone(),
                    coroutine: function.coroutine,
                };
                let ty = self.intern(self.registry.function(signature), span)?;
                self.modules.mark_used(*id);
                Ok(Some((ty, Access::Function(*id))))
            }
            _ => Err(errors::type_mismatch(
                format!("`{name}` is overloaded and cannot be used as a value"),
                span,
            )
            .into()),
        }
    }

    // ------------------------------------------------------------------------
    // Operators
    // ------------------------------------------------------------------------

    fn unary(&mut self, node: &mut Node, op: UnaryOpId) -> Validation<()> {
        let span = node.span();
        let Some(operand) = node.children.first_mut() else {
            return Err(errors::type_mismatch("missing operand", span).into());
        };
        self.expr(operand)?;
        let ty = operand.ty;
        node.ty = match op {
            UnaryOpId::Neg if self.registry.is_integer(ty) || self.registry.is_real(ty) => ty,
            UnaryOpId::Not if ty == TypeIndex::BOOL => ty,
            UnaryOpId::BitNot if self.registry.is_integral(ty) => ty,
            UnaryOpId::AddressOf if is_addressable(operand) => self.intern(self.registry.pointer_to(ty), span)?,
            UnaryOpId::AddressOf => {
                return Err(errors::type_mismatch("cannot take the address of a temporary value", span).into());
            }
            UnaryOpId::Deref if self.registry.is_pointer(ty) => {
                let pointee = self.intern(self.registry.pointee(ty), span)?;
                if pointee == TypeIndex::RIEN {
                    return Err(errors::type_mismatch("cannot dereference `*rien`", span).into());
                }
                pointee
            }
            _ => {
                return Err(errors::type_mismatch(
                    format!(
                        "operator `{}` cannot be applied to `{}`",
                        operators::unary_info(op).spelling,
                        self.display(ty)
                    ),
                    span,
                )
                .into());
            }
        };
        Ok(())
    }

    fn binary(&mut self, node: &mut Node, op: BinaryOpId) -> Validation<()> {
        let span = node.span();
        let [lhs, rhs] = node.children.as_mut_slice() else {
            return Err(errors::type_mismatch("binary operator needs two operands", span).into());
        };
        self.expr(lhs)?;
        self.expr(rhs)?;
        let info = operators::binary_info(op);
        let mismatch = |validator: &Self, lhs: TypeIndex, rhs: TypeIndex| {
            errors::type_mismatch(
                format!(
                    "operator `{}` cannot combine `{}` and `{}`",
                    info.spelling,
                    validator.display(lhs),
                    validator.display(rhs)
                ),
                span,
            )
        };

        // Pointer arithmetic.
        if matches!(op, BinaryOpId::Add | BinaryOpId::Sub) && self.registry.is_pointer(lhs.ty) {
            if self.registry.is_pointer(rhs.ty) && op == BinaryOpId::Sub && lhs.ty == rhs.ty {
                node.ty = TypeIndex::Z64;
                return Ok(());
            }
            if source_kind(rhs) == SourceKind::IntegerLiteral {
                retype_literal(rhs, TypeIndex::Z64);
            }
            if !self.registry.is_integral(rhs.ty) {
                return Err(mismatch(self, lhs.ty, rhs.ty).into());
            }
            node.ty = lhs.ty;
            return Ok(());
        }

        if matches!(op, BinaryOpId::Shl | BinaryOpId::Shr) {
            if !self.registry.is_integral(lhs.ty) || !self.registry.is_integral(rhs.ty) {
                return Err(mismatch(self, lhs.ty, rhs.ty).into());
            }
            node.ty = lhs.ty;
            return Ok(());
        }

        let Some(ty) = self.unify(lhs, rhs) else {
            return Err(mismatch(self, lhs.ty, rhs.ty).into());
        };
        let numeric = self.registry.is_integral(ty) || self.registry.is_real(ty);
        node.ty = match info.category {
            OperatorCategory::Arithmetic if numeric && !self.is_enum(ty) => ty,
            OperatorCategory::Bitwise if self.registry.is_integral(ty) || ty == TypeIndex::BOOL => ty,
            OperatorCategory::Logical if ty == TypeIndex::BOOL => TypeIndex::BOOL,
            OperatorCategory::Comparison if self.is_comparable(ty, op) => TypeIndex::BOOL,
            _ => return Err(mismatch(self, lhs.ty, rhs.ty).into()),
        };
        Ok(())
    }

    /// Bring both operands to one type, widening a literal side when needed.
    fn unify(&self, lhs: &mut Node, rhs: &mut Node) -> Option<TypeIndex> {
        if lhs.ty == rhs.ty {
            return Some(lhs.ty);
        }
        if self.widen_into(lhs.ty, rhs) {
            return Some(lhs.ty);
        }
        if self.widen_into(rhs.ty, lhs) {
            return Some(rhs.ty);
        }
        None
    }

    fn widen_into(&self, target: TypeIndex, source: &mut Node) -> bool {
        let coercion = self.registry.compatibility(target, source.ty, source_kind(source));
        if coercion.retypes_literal() {
            retype_literal(source, target);
            return true;
        }
        source.ty == TypeIndex::NULL && coercion == Coercion::Identical
    }

    fn is_comparable(&self, ty: TypeIndex, op: BinaryOpId) -> bool {
        let equality = matches!(op, BinaryOpId::Eq | BinaryOpId::Ne);
        if self.registry.is_integral(ty) || self.registry.is_real(ty) {
            return true;
        }
        if !equality {
            return self.registry.is_pointer(ty);
        }
        ty == TypeIndex::BOOL
            || ty == TypeIndex::NULL
            || self.registry.is_pointer(ty)
            || self.registry.signature_of(ty).is_some()
    }

    pub(crate) fn is_enum(&self, ty: TypeIndex) -> bool {
        self.registry
            .compound_of(ty)
            .and_then(|id| self.registry.compound(id).ok())
            .is_some_and(|c| c.is_enum())
    }

    // ------------------------------------------------------------------------
    // Member access and indexing
    // ------------------------------------------------------------------------

    /// `objet.membre`: module-qualified symbols, enum variants, struct fields and built-in members.
    pub(crate) fn member(&mut self, node: &mut Node, site: CallSite) -> Validation<()> {
        let span = node.span();
        let [object, member] = node.children.as_mut_slice() else {
            return Err(errors::type_mismatch("malformed member access", span).into());
        };

        if object.kind == NodeKind::Identifier && !self.names_value(object.name()) {
            if self.modules.module_id(object.name()).is_some() {
                let module = self.qualified_module(object.name(), member.name(), member.span())?;
                object.ty = TypeIndex::RIEN;
                match member.kind {
                    NodeKind::Call => self.call_in(member, Some(module), site)?,
                    NodeKind::Identifier => {
                        let Some((ty, access)) = self.module_symbol(module, member.name(), member.span())? else {
                            return Err(errors::unknown_symbol(
                                "symbol",
                                &format!("{}.{}", object.name(), member.name()),
                                member.span(),
                            )
                            .into());
                        };
                        member.ty = ty;
                        member.lowering = Lowering::Access(access);
                    }
                    _ => return Err(errors::type_mismatch("expected a name after the module", member.span()).into()),
                }
                node.ty = member.ty;
                node.lowering = Lowering::Member(MemberLowering::Module(module));
                return Ok(());
            }
            if let Some(enum_ty) = self.enum_type_named(object.name(), object.span())? {
                let compound = self
                    .registry
                    .compound_of(enum_ty)
                    .and_then(|id| self.registry.compound(id).ok());
                let Some(value) = compound.as_ref().and_then(|c| c.variant(member.name())) else {
                    return Err(errors::unknown_symbol(
                        "variant",
                        &format!("{}.{}", object.name(), member.name()),
                        member.span(),
                    )
                    .into());
                };
                object.ty = enum_ty;
                member.ty = enum_ty;
                node.ty = enum_ty;
                node.value = NodeValue::Integer(i128::from(value));
                node.lowering = Lowering::Member(MemberLowering::EnumVariant(value));
                return Ok(());
            }
        }

        self.expr(object)?;
        let member_name = member.name().to_string();
        let member_span = member.span();
        if member.kind != NodeKind::Identifier {
            return Err(errors::type_mismatch("expected a member name", member_span).into());
        }
        let object_ty = object.ty;
        let (ty, lowering) = self.member_of(object_ty, &member_name, member_span)?;
        member.ty = ty;
        node.ty = ty;
        node.lowering = Lowering::Member(lowering);
        Ok(())
    }

    fn member_of(&self, object_ty: TypeIndex, name: &str, span: Span) -> Validation<(TypeIndex, MemberLowering)> {
        let unknown = || {
            errors::unknown_symbol("member", name, span)
                .with_note(format!("the value has type `{}`", self.display(object_ty)))
        };
        let (base, through_pointer) = if self.registry.is_pointer(object_ty) {
            (self.intern(self.registry.pointee(object_ty), span)?, true)
        } else {
            (object_ty, false)
        };

        if let Some(id) = self.registry.compound_of(base) {
            let compound = self.intern_compound(id, span)?;
            if compound.kind != CompoundKind::Struct {
                return Err(unknown().into());
            }
            if let Some((module, compound_name)) = self.modules.compound_owner(id) {
                self.require(WaitReason::Compound {
                    module,
                    name: compound_name,
                })?;
            }
            let compound = self.intern_compound(id, span)?;
            let Some(field) = compound.field(name) else {
                return Err(unknown().into());
            };
            let lowering = if through_pointer {
                MemberLowering::FieldThroughPointer
            } else {
                MemberLowering::Field
            };
            return Ok((field.ty, lowering));
        }
        if through_pointer {
            return Err(unknown().into());
        }

        let builtin = match (self.registry.base_token(object_ty), name) {
            (Ok(TypeToken::Array(len)), runtime::MEMBER_LENGTH) => (TypeIndex::Z64, MemberLowering::ArrayLength(len)),
            (Ok(TypeToken::Array(_)), runtime::MEMBER_POINTER) => {
                let element = self.intern(self.registry.pointee(object_ty), span)?;
                (self.intern(self.registry.pointer_to(element), span)?, MemberLowering::ArrayPointer)
            }
            (Ok(TypeToken::Slice), runtime::MEMBER_LENGTH) => (TypeIndex::Z64, MemberLowering::Builtin),
            (Ok(TypeToken::Slice), runtime::MEMBER_POINTER) => {
                let element = self.intern(self.registry.pointee(object_ty), span)?;
                (self.intern(self.registry.pointer_to(element), span)?, MemberLowering::Builtin)
            }
            (Ok(TypeToken::Primitive(_)), runtime::MEMBER_LENGTH) if object_ty == TypeIndex::CHAINE => {
                (TypeIndex::Z64, MemberLowering::Builtin)
            }
            (Ok(TypeToken::Primitive(_)), runtime::MEMBER_POINTER) if object_ty == TypeIndex::CHAINE => {
                (self.intern(self.registry.pointer_to(TypeIndex::Z8), span)?, MemberLowering::Builtin)
            }
            (Ok(TypeToken::Primitive(_)), runtime::MEMBER_INFO) if object_ty == TypeIndex::EINI => {
                (TypeIndex::TYPE_INFO_PTR, MemberLowering::Builtin)
            }
            (Ok(TypeToken::Primitive(_)), runtime::MEMBER_POINTER) if object_ty == TypeIndex::EINI => {
                (self.intern(self.registry.pointer_to(TypeIndex::RIEN), span)?, MemberLowering::Builtin)
            }
            _ => return Err(unknown().into()),
        };
        Ok(builtin)
    }

    fn intern_compound(&self, id: CompoundId, span: Span) -> Validation<CompoundDescriptor> {
        self.registry
            .compound(id)
            .map_err(|e| errors::type_mismatch(e.to_string(), span).into())
    }

    /// Is `name` a local or a global visible from here (which shadows module and type names)?
    fn names_value(&self, name: &str) -> bool {
        self.scope.lookup(name).is_some() || self.modules.global_named(self.module, name).is_some()
    }

    fn enum_type_named(&self, name: &str, span: Span) -> Validation<Option<TypeIndex>> {
        for module in self.visible_modules() {
            if module != self.module && !self.modules.is_exported(module, name) {
                continue;
            }
            let Some(entry) = self.modules.compound(module, name) else {
                continue;
            };
            self.require(WaitReason::Compound {
                module,
                name: name.to_string(),
            })?;
            if self.is_enum(entry.ty) {
                return Ok(Some(entry.ty));
            }
            return Err(errors::type_mismatch(format!("`{name}` is a type, not a value"), span).into());
        }
        Ok(None)
    }

    fn index(&mut self, node: &mut Node) -> Validation<()> {
        let span = node.span();
        let [object, index] = node.children.as_mut_slice() else {
            return Err(errors::type_mismatch("malformed index expression", span).into());
        };
        self.expr(object)?;
        self.expr(index)?;
        if source_kind(index) == SourceKind::IntegerLiteral {
            retype_literal(index, TypeIndex::Z64);
        }
        if !self.registry.is_integral(index.ty) {
            return Err(errors::type_mismatch(
                format!("index must be an integer, found `{}`", self.display(index.ty)),
                index.span(),
            )
            .into());
        }
        node.ty = match self.registry.base_token(object.ty) {
            Ok(TypeToken::Pointer | TypeToken::Array(_) | TypeToken::Slice) => {
                let element = self.intern(self.registry.pointee(object.ty), span)?;
                if element == TypeIndex::RIEN {
                    return Err(errors::type_mismatch("cannot index `*rien`", span).into());
                }
                element
            }
            _ if object.ty == TypeIndex::CHAINE => TypeIndex::Z8,
            _ => {
                return Err(errors::type_mismatch(
                    format!("type `{}` cannot be indexed", self.display(object.ty)),
                    span,
                )
                .into());
            }
        };
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Casts, type operands, arrays
    // ------------------------------------------------------------------------

    fn cast(&mut self, node: &mut Node) -> Validation<()> {
        let span = node.span();
        let target = self.type_operand(node)?;
        let Some(operand) = node.children.first_mut() else {
            return Err(errors::type_mismatch("`transtype` needs a value", span).into());
        };
        self.expr(operand)?;
        let source = operand.ty;
        let registry = self.registry;
        let scalar = |ty: TypeIndex| registry.is_integral(ty) || registry.is_real(ty) || ty == TypeIndex::BOOL;
        let address = |ty: TypeIndex| registry.is_pointer(ty) || registry.signature_of(ty).is_some();
        let allowed = source == target
            || (scalar(source) && scalar(target))
            || (address(source) && address(target))
            || (address(source) && registry.is_integer(target))
            || (registry.is_integer(source) && address(target))
            || (source == TypeIndex::NULL && address(target));
        if source == TypeIndex::EINI && target != TypeIndex::EINI {
            operand.coercions.insert(CoercionSet::UNBOX_FROM_ANY);
        } else if !allowed {
            return Err(errors::type_mismatch(
                format!("cannot cast `{}` to `{}`", self.display(source), self.display(target)),
                span,
            )
            .into());
        }
        node.ty = target;
        Ok(())
    }

    fn type_operand(&self, node: &Node) -> Validation<TypeIndex> {
        let Some(expr) = node.type_expr.as_ref() else {
            return Err(errors::type_mismatch("missing type operand", node.span()).into());
        };
        self.resolve_type(expr, node.span(), false)
    }

    fn array_literal(&mut self, node: &mut Node) -> Validation<()> {
        let span = node.span();
        if node.children.is_empty() {
            return Err(errors::type_mismatch("cannot infer the type of an empty array", span).into());
        }
        for element in &mut node.children {
            self.expr(element)?;
        }
        let element_ty = node
            .children
            .iter()
            .find(|e| source_kind(e) == SourceKind::Expression)
            .or_else(|| node.children.iter().find(|e| source_kind(e) == SourceKind::RealLiteral))
            .unwrap_or(&node.children[0])
            .ty;
        let mut failure = None;
        for element in &mut node.children {
            if !self.coerce(element, element_ty).is_compatible() && failure.is_none() {
                failure = Some((element.ty, element.span()));
            }
        }
        if let Some((found, at)) = failure {
            return Err(errors::type_mismatch(
                format!(
                    "array element has type `{}`, expected `{}`",
                    self.display(found),
                    self.display(element_ty)
                ),
                at,
            )
            .into());
        }
        node.ty = self.intern(self.registry.array_of(element_ty, node.children.len() as u64), span)?;
        Ok(())
    }
}

/// Can the value be written to or have its address taken?
pub(crate) fn is_addressable(node: &Node) -> bool {
    match node.kind {
        NodeKind::Identifier => !matches!(node.lowering, Lowering::Access(Access::Function(_))),
        NodeKind::Index => true,
        NodeKind::Unary(UnaryOpId::Deref) => true,
        NodeKind::MemberAccess => match node.lowering {
            Lowering::Member(MemberLowering::Field | MemberLowering::FieldThroughPointer) => true,
            Lowering::Member(MemberLowering::Module(_)) => node.child(1).is_some_and(is_addressable),
            _ => false,
        },
        _ => false,
    }
}

/// Parse decimal, `0x` hexadecimal and `0b` binary integers, with `_` separators.
pub(crate) fn parse_integer(text: &str) -> Result<u64, ParseIntError> {
    let cleaned = text.replace('_', "");
    let (digits, radix) = if let Some(hex) = cleaned.strip_prefix("0x") {
        (hex, 16)
    } else if let Some(bin) = cleaned.strip_prefix("0b") {
        (bin, 2)
    } else {
        (cleaned.as_str(), 10)
    };
    u64::from_str_radix(digits, radix)
}

/// Decode `\n`, `\t`, `\0`, `\\`, `\"`, `\'` and `\xHH` escapes into bytes.
pub(crate) fn decode_escapes(text: &str) -> Vec<u8> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'\\' || i + 1 >= bytes.len() {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        let escaped = bytes[i + 1];
        i += 2;
        match escaped {
            b'n' => out.push(b'\n'),
            b't' => out.push(b'\t'),
            b'r' => out.push(b'\r'),
            b'0' => out.push(0),
            b'x' if i + 2 <= bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i..i + 2]).ok();
                match hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                    Some(byte) => {
                        out.push(byte);
                        i += 2;
                    }
                    None => out.extend_from_slice(b"\\x"),
                }
            }
            other => out.push(other),
        }
    }
    out
}
