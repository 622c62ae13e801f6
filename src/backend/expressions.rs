//! Expression lowering.
//!
//! Expressions lower to C expression text. Whatever has to run first (boxing copies, variadic
//! packs, operands pinned for evaluation order, short-circuited right operands) is written to the
//! frame buffer before the returned text is used, so callers must place the text after anything
//! emitted while producing it.
//!
//! ## Evaluation order
//!
//! C leaves the order of operand evaluation unspecified while Kuri evaluates left to right. When
//! several operands are lowered together and one of them has side effects (it contains a call),
//! every non-constant operand up to that one is pinned into a temporary, in order.

use kuri_core::lang::operators::{self, BinaryOpId, UnaryOpId};
use kuri_core::runtime;

use super::emitter::c_string_literal;
use super::errors::{CodegenFault, CodegenResult};
use super::{CGenerator, Local, pointer_spelling};
use crate::frontend::ast::{Access, Lowering, MemberLowering, Node, NodeKind, NodeValue};
use crate::frontend::mangle::c_identifier;
use crate::frontend::module::{FunctionDescriptor, FunctionId};
use crate::frontend::types::{CoercionSet, TypeIndex, TypeRegistry, TypeToken};

/// One operand of a left-to-right evaluated list.
#[derive(Clone, Copy)]
pub(super) struct Operand<'p> {
    node: &'p Node,
    target: Option<TypeIndex>,
    /// Object of an index: it must stay an lvalue, so it is never pinned.
    place: bool,
}

impl<'p> Operand<'p> {
    pub(super) fn value(node: &'p Node) -> Self {
        Self {
            node,
            target: None,
            place: false,
        }
    }

    pub(super) fn coerced(node: &'p Node, target: TypeIndex) -> Self {
        Self {
            node,
            target: Some(target),
            place: false,
        }
    }

    fn place(node: &'p Node) -> Self {
        Self {
            node,
            target: None,
            place: true,
        }
    }
}

impl<'p> CGenerator<'p> {
    pub(super) fn expr(&mut self, node: &'p Node) -> CodegenResult<String> {
        match node.kind {
            NodeKind::IntegerLiteral | NodeKind::CharLiteral => self.integer_literal(node),
            NodeKind::RealLiteral => self.real_literal(node),
            NodeKind::BoolLiteral => Ok(match node.value {
                NodeValue::Bool(true) => "true".to_string(),
                _ => "false".to_string(),
            }),
            NodeKind::StringLiteral => self.string_literal(node),
            NodeKind::NullLiteral => Ok("NULL".to_string()),
            NodeKind::Identifier => self.identifier(node),
            NodeKind::Call => self.call(node),
            NodeKind::MemberAccess => self.member(node),
            NodeKind::Index => self.index(node),
            NodeKind::Binary(op) => self.binary(node, op),
            NodeKind::Unary(op) => self.unary(node, op),
            NodeKind::Cast => self.cast(node),
            NodeKind::SizeOf => {
                let c_type = self.c_type(type_operand(node)?)?;
                Ok(format!("((int64_t)sizeof({c_type}))"))
            }
            NodeKind::TypeInfoOf => {
                let ty = type_operand(node)?;
                Ok(self.type_info(ty))
            }
            NodeKind::ArrayLiteral => self.array_literal(node),
            _ => Err(CodegenFault::malformed(kind_name(node), "not an expression")),
        }
    }

    /// Lower `node` and apply the coercions the validator recorded on it.
    pub(super) fn coerced(&mut self, node: &'p Node, target: TypeIndex) -> CodegenResult<String> {
        let value = self.expr(node)?;
        self.apply_coercions(node, value, target)
    }

    /// Lower operands left to right, pinning them where C could reorder a side effect.
    pub(super) fn ordered(&mut self, operands: Vec<Operand<'p>>) -> CodegenResult<Vec<String>> {
        let last_effect = operands.iter().rposition(|o| has_effects(o.node));
        let pin_until = match last_effect {
            Some(last) if operands.len() > 1 => {
                let read_after = operands[last + 1..].iter().any(|o| !is_constant(o.node));
                Some(if read_after { last + 1 } else { last })
            }
            _ => None,
        };

        let mut values = Vec::with_capacity(operands.len());
        for (position, operand) in operands.into_iter().enumerate() {
            let target = operand.target.unwrap_or(operand.node.ty);
            let value = self.coerced(operand.node, target)?;
            let pinned =
                pin_until.is_some_and(|end| position < end) && !operand.place && !is_constant(operand.node);
            if pinned {
                let ty = self.coerced_type(operand.node, target)?;
                values.push(self.temp(ty, &value)?);
            } else {
                values.push(value);
            }
        }
        Ok(values)
    }

    /// `&__info_typeN`, or `NULL` when reflection is disabled.
    pub(super) fn type_info(&mut self, ty: TypeIndex) -> String {
        if self.config.emit_reflection {
            self.reflection.reference(ty)
        } else {
            "NULL".to_string()
        }
    }

    pub(super) fn function(&self, id: FunctionId) -> CodegenResult<FunctionDescriptor> {
        self.program.modules.function(id).ok_or(CodegenFault::MissingFunction(id.0))
    }

    // ------------------------------------------------------------------------
    // Literals
    // ------------------------------------------------------------------------

    fn integer_literal(&mut self, node: &Node) -> CodegenResult<String> {
        let NodeValue::Integer(value) = node.value else {
            return Err(CodegenFault::malformed(kind_name(node), "literal without a value"));
        };
        if self.registry().is_real(node.ty) {
            return Ok(real_text(value as f64, node.ty == TypeIndex::R32));
        }
        if node.ty == TypeIndex::Z32 && i32::try_from(value).is_ok() {
            return Ok(value.to_string());
        }
        let c_type = self.c_type(node.ty)?;
        Ok(format!("(({c_type}){}ULL)", value as u64))
    }

    fn real_literal(&mut self, node: &Node) -> CodegenResult<String> {
        let NodeValue::Real(value) = node.value else {
            return Err(CodegenFault::malformed(kind_name(node), "literal without a value"));
        };
        Ok(real_text(value, node.ty == TypeIndex::R32))
    }

    fn string_literal(&mut self, node: &Node) -> CodegenResult<String> {
        let NodeValue::Str(bytes) = &node.value else {
            return Err(CodegenFault::malformed(kind_name(node), "literal without a value"));
        };
        Ok(format!(
            "(({}){{(int8_t *){}, {}}})",
            runtime::STRING_STRUCT,
            c_string_literal(bytes),
            bytes.len()
        ))
    }

    // ------------------------------------------------------------------------
    // Names
    // ------------------------------------------------------------------------

    fn identifier(&mut self, node: &Node) -> CodegenResult<String> {
        let Lowering::Access(access) = &node.lowering else {
            return Err(CodegenFault::malformed(
                kind_name(node),
                format!("`{}` was never resolved", node.name()),
            ));
        };
        if let Access::Function(id) = access {
            let function = self.function(*id)?;
            if function.coroutine {
                let c_type = self.c_type(node.ty)?;
                return Ok(format!("(({c_type}){})", function.linkage_name));
            }
            return Ok(function.linkage_name);
        }
        Ok(self.access(node.name(), access)?.place)
    }

    /// Place and type reached by a resolved name.
    pub(super) fn access(&mut self, name: &str, access: &Access) -> CodegenResult<Local> {
        match access {
            Access::Local | Access::ReferenceParam => self.frame.scope.lookup(name).cloned().ok_or_else(|| {
                CodegenFault::malformed("identifier", format!("`{name}` is not bound in this function"))
            }),
            Access::Employed { base, through_pointer } => {
                let param = self.frame.params.get(base).cloned().ok_or_else(|| {
                    CodegenFault::malformed("identifier", format!("`{base}` is not a parameter"))
                })?;
                let registry = self.registry();
                let holder = if *through_pointer {
                    registry.pointee(param.ty)?
                } else {
                    param.ty
                };
                let field = registry
                    .compound_of(holder)
                    .and_then(|id| registry.compound(id).ok())
                    .and_then(|c| c.field(name).map(|f| f.ty))
                    .ok_or_else(|| {
                        CodegenFault::malformed("identifier", format!("`{base}` has no field `{name}`"))
                    })?;
                let arrow = if *through_pointer { "->" } else { "." };
                Ok(Local {
                    place: format!("{}{arrow}{}", param.place, c_identifier(name)),
                    ty: field,
                })
            }
            Access::Global(id) => {
                let global = self.program.modules.global(*id).ok_or(CodegenFault::MissingGlobal(id.0))?;
                Ok(Local {
                    place: global.linkage_name,
                    ty: global.ty,
                })
            }
            Access::Function(id) => Err(CodegenFault::malformed(
                "identifier",
                format!("function #{} used as a storage location", id.0),
            )),
        }
    }

    // ------------------------------------------------------------------------
    // Members and indexing
    // ------------------------------------------------------------------------

    fn member(&mut self, node: &'p Node) -> CodegenResult<String> {
        let (Some(object), Some(member), Lowering::Member(lowering)) = (node.child(0), node.child(1), &node.lowering)
        else {
            return Err(CodegenFault::malformed(kind_name(node), "unresolved member access"));
        };
        match *lowering {
            MemberLowering::Module(_) => self.expr(member),
            MemberLowering::EnumVariant(value) => {
                let c_type = self.c_type(node.ty)?;
                Ok(format!("(({c_type}){value})"))
            }
            MemberLowering::ArrayLength(len) => {
                if has_effects(object) {
                    let value = self.expr(object)?;
                    Ok(format!("((void)({value}), (int64_t){len})"))
                } else {
                    Ok(format!("((int64_t){len})"))
                }
            }
            MemberLowering::ArrayPointer => {
                let value = self.expr(object)?;
                let array = self.addressable(object, value)?;
                Ok(format!("{array}.data"))
            }
            MemberLowering::Field | MemberLowering::Builtin => {
                let value = self.expr(object)?;
                Ok(format!("{value}.{}", c_identifier(member.name())))
            }
            MemberLowering::FieldThroughPointer => {
                let value = self.expr(object)?;
                Ok(format!("{value}->{}", c_identifier(member.name())))
            }
        }
    }

    fn index(&mut self, node: &'p Node) -> CodegenResult<String> {
        let (Some(object), Some(index)) = (node.child(0), node.child(1)) else {
            return Err(CodegenFault::malformed(kind_name(node), "expected an object and an index"));
        };
        let values = self.ordered(vec![Operand::place(object), Operand::value(index)])?;
        let (base, position) = (&values[0], &values[1]);
        Ok(match self.registry().base_token(object.ty)? {
            TypeToken::Pointer => format!("{base}[{position}]"),
            TypeToken::Array(_) => format!("{base}.data[{position}]"),
            _ => format!("{base}.pointeur[{position}]"),
        })
    }

    // ------------------------------------------------------------------------
    // Operators
    // ------------------------------------------------------------------------

    fn binary(&mut self, node: &'p Node, op: BinaryOpId) -> CodegenResult<String> {
        let (Some(lhs), Some(rhs)) = (node.child(0), node.child(1)) else {
            return Err(CodegenFault::malformed(kind_name(node), "expected two operands"));
        };
        if matches!(op, BinaryOpId::And | BinaryOpId::Or) {
            return self.short_circuit(op, lhs, rhs);
        }
        let values = self.ordered(vec![Operand::value(lhs), Operand::value(rhs)])?;
        let (l, r) = (&values[0], &values[1]);
        let registry = self.registry();
        if op == BinaryOpId::Sub && registry.is_pointer(lhs.ty) && registry.is_pointer(rhs.ty) {
            return Ok(format!("((int64_t)({l} - {r}))"));
        }
        if op == BinaryOpId::Rem && registry.is_real(node.ty) {
            let function = if node.ty == TypeIndex::R32 { "fmodf" } else { "fmod" };
            return Ok(format!("{function}({l}, {r})"));
        }
        Ok(format!("({l} {} {r})", operators::binary_info(op).c_spelling))
    }

    /// `&&` / `||`. A right operand that needs statements of its own only runs when the left
    /// operand does not decide the result.
    fn short_circuit(&mut self, op: BinaryOpId, lhs: &'p Node, rhs: &'p Node) -> CodegenResult<String> {
        let spelling = operators::binary_info(op).c_spelling;
        let left = self.coerced(lhs, lhs.ty)?;

        let mut side = self.frame.out.sibling();
        side.indent();
        let saved = std::mem::replace(&mut self.frame.out, side);
        let right = self.coerced(rhs, rhs.ty);
        let side = std::mem::replace(&mut self.frame.out, saved);
        let right = right?;
        if side.is_empty() {
            return Ok(format!("({left} {spelling} {right})"));
        }

        let held = self.temp(TypeIndex::BOOL, &left)?;
        let test = if op == BinaryOpId::And {
            held.clone()
        } else {
            format!("!{held}")
        };
        let out = &mut self.frame.out;
        out.line(&format!("if ({test}) {{"));
        out.append(side);
        out.indent();
        out.line(&format!("{held} = {right};"));
        out.dedent();
        out.line("}");
        Ok(held)
    }

    fn unary(&mut self, node: &'p Node, op: UnaryOpId) -> CodegenResult<String> {
        let Some(operand) = node.child(0) else {
            return Err(CodegenFault::malformed(kind_name(node), "expected an operand"));
        };
        let value = self.coerced(operand, operand.ty)?;
        Ok(format!("({}{value})", operators::unary_info(op).c_spelling))
    }

    fn cast(&mut self, node: &'p Node) -> CodegenResult<String> {
        let Some(operand) = node.child(0) else {
            return Err(CodegenFault::malformed(kind_name(node), "expected an operand"));
        };
        let value = self.expr(operand)?;
        let target = self.c_type(node.ty)?;
        if operand.coercions.contains(CoercionSet::UNBOX_FROM_ANY) {
            return Ok(format!("(*({})({value}).pointeur)", pointer_spelling(&target)));
        }
        if node.ty == operand.ty {
            return Ok(value);
        }
        Ok(format!("(({target})({value}))"))
    }

    fn array_literal(&mut self, node: &'p Node) -> CodegenResult<String> {
        let element = self.registry().pointee(node.ty)?;
        let operands = node.children.iter().map(|e| Operand::coerced(e, element)).collect();
        let values = self.ordered(operands)?;
        let c_type = self.c_type(node.ty)?;
        Ok(format!("(({c_type}){{{{{}}}}})", values.join(", ")))
    }

    // ------------------------------------------------------------------------
    // Calls
    // ------------------------------------------------------------------------

    pub(super) fn call(&mut self, node: &'p Node) -> CodegenResult<String> {
        let (callee, arguments) = self.call_parts(node)?;
        Ok(format!("{callee}({})", arguments.join(", ")))
    }

    /// `f(arguments..., slots...)` for a call filling output slots. `node` is the call itself or
    /// a module-qualified call.
    pub(super) fn call_with_slots(&mut self, node: &'p Node, slots: Vec<String>) -> CodegenResult<String> {
        let call = call_node(node)
            .ok_or_else(|| CodegenFault::malformed(kind_name(node), "expected a call producing several values"))?;
        let (callee, mut arguments) = self.call_parts(call)?;
        arguments.extend(slots);
        Ok(format!("{callee}({})", arguments.join(", ")))
    }

    /// The bound function of a statement-level call, when it returns several values.
    pub(super) fn multi_value_callee(&self, node: &Node) -> Option<FunctionDescriptor> {
        let id = call_node(node)?.callee?;
        self.program
            .modules
            .function(id)
            .filter(FunctionDescriptor::returns_multiple)
    }

    /// Callee spelling and lowered arguments of a direct or indirect call.
    pub(super) fn call_parts(&mut self, node: &'p Node) -> CodegenResult<(String, Vec<String>)> {
        if let Some(id) = node.callee {
            let function = self.function(id)?;
            let arguments = self.arguments(node, &function)?;
            return Ok((function.linkage_name, arguments));
        }
        let Lowering::Access(access) = &node.lowering else {
            return Err(CodegenFault::UnboundCallee(node.name().to_string()));
        };
        let callee = self.access(node.name(), access)?;
        let params = self
            .registry()
            .signature_of(callee.ty)
            .map(|s| s.params)
            .unwrap_or_default();
        let operands = node
            .children
            .iter()
            .enumerate()
            .map(|(i, argument)| match params.get(i) {
                Some(&param) => Operand::coerced(argument, param),
                None => Operand::value(argument),
            })
            .collect();
        let arguments = self.ordered(operands)?;
        Ok((callee.place, arguments))
    }

    /// Arguments of a direct call; extras of a `...T` parameter are packed into one slice.
    fn arguments(&mut self, node: &'p Node, function: &FunctionDescriptor) -> CodegenResult<Vec<String>> {
        let Lowering::Call { variadic_from, .. } = node.lowering else {
            return Err(CodegenFault::malformed(kind_name(node), "call without a binding"));
        };
        let declared: Vec<TypeIndex> = function.params.iter().filter(|p| !p.variadic).map(|p| p.ty).collect();
        let variadic = function.params.iter().find(|p| p.variadic).map(|p| p.ty);
        let element = match variadic {
            Some(slice) => Some(self.registry().pointee(slice)?),
            None => None,
        };

        let operands = node
            .children
            .iter()
            .enumerate()
            .map(|(i, argument)| match declared.get(i).copied().or(element) {
                Some(target) => Operand::coerced(argument, target),
                None => Operand::value(argument),
            })
            .collect();
        let mut values = self.ordered(operands)?;
        if let (Some(from), Some(slice)) = (variadic_from, variadic) {
            let extras = values.split_off(from.min(values.len()));
            let packed = self.pack(slice, extras)?;
            values.push(packed);
        }
        Ok(values)
    }

    /// `(KuriTrancheN){t.data, n}` over a temporary array holding `values`.
    fn pack(&mut self, slice: TypeIndex, values: Vec<String>) -> CodegenResult<String> {
        let slice_c = self.c_type(slice)?;
        if values.is_empty() {
            return Ok(format!("(({slice_c}){{NULL, 0}})"));
        }
        let registry = self.registry();
        let array = registry.array_of(registry.pointee(slice)?, values.len() as u64)?;
        let array_c = self.c_type(array)?;
        let count = values.len();
        let held = self.temp(array, &format!("({array_c}){{{{{}}}}}", values.join(", ")))?;
        Ok(format!("(({slice_c}){{{held}.data, {count}}})"))
    }

    // ------------------------------------------------------------------------
    // Coercions
    // ------------------------------------------------------------------------

    fn apply_coercions(&mut self, node: &'p Node, value: String, target: TypeIndex) -> CodegenResult<String> {
        let flags = node.coercions;
        if flags.is_empty() {
            return Ok(value);
        }
        let registry = self.registry();
        if flags.contains(CoercionSet::BOX_TO_ANY) {
            let held = self.temp(node.ty, &value)?;
            let info = self.type_info(node.ty);
            return Ok(format!("(({}){{(void *)&{held}, {info}}})", runtime::ANY_STRUCT));
        }
        if flags.contains(CoercionSet::UNBOX_FROM_ANY) {
            let c_type = self.c_type(target)?;
            return Ok(format!("(*({})({value}).pointeur)", pointer_spelling(&c_type)));
        }
        if flags.contains(CoercionSet::ARRAY_DECAY) {
            let TypeToken::Array(len) = registry.base_token(node.ty)? else {
                return Err(CodegenFault::malformed(kind_name(node), "only fixed-size arrays decay"));
            };
            let slice = registry.slice_of(registry.pointee(node.ty)?)?;
            let slice_c = self.c_type(slice)?;
            let array = self.addressable(node, value)?;
            return Ok(format!("(({slice_c}){{{array}.data, {len}}})"));
        }
        if flags.contains(CoercionSet::BYTE_REINTERPRET) {
            let slice_c = self.c_type(registry.slice_of(TypeIndex::OCTET)?)?;
            let held = self.addressable(node, value)?;
            return Ok(format!("(({slice_c}){{(uint8_t *)&{held}, (int64_t)sizeof({held})}})"));
        }
        if flags.contains(CoercionSet::EXTRACT_C_STRING) {
            return Ok(format!("({value}).pointeur"));
        }
        if flags.contains(CoercionSet::BIND_BY_REFERENCE) {
            let held = self.addressable(node, value)?;
            return Ok(format!("(&{held})"));
        }
        Ok(value)
    }

    /// Type of `node` once its coercions are applied.
    pub(super) fn coerced_type(&self, node: &Node, target: TypeIndex) -> CodegenResult<TypeIndex> {
        let flags = node.coercions;
        let registry = self.registry();
        Ok(if flags.contains(CoercionSet::BOX_TO_ANY) {
            TypeIndex::EINI
        } else if flags.contains(CoercionSet::UNBOX_FROM_ANY) {
            target
        } else if flags.contains(CoercionSet::ARRAY_DECAY) {
            registry.slice_of(registry.pointee(node.ty)?)?
        } else if flags.contains(CoercionSet::BYTE_REINTERPRET) {
            registry.slice_of(TypeIndex::OCTET)?
        } else if flags.contains(CoercionSet::EXTRACT_C_STRING) {
            registry.pointer_to(TypeIndex::Z8)?
        } else if flags.contains(CoercionSet::BIND_BY_REFERENCE) {
            registry.pointer_to(node.ty)?
        } else {
            node.ty
        })
    }

    /// `value` when it is an lvalue, otherwise a temporary holding it.
    fn addressable(&mut self, node: &Node, value: String) -> CodegenResult<String> {
        if is_place(self.registry(), node) {
            Ok(value)
        } else {
            self.temp(node.ty, &value)
        }
    }
}

fn type_operand(node: &Node) -> CodegenResult<TypeIndex> {
    match node.value {
        NodeValue::Type(ty) => Ok(ty),
        _ => Err(CodegenFault::malformed(kind_name(node), "missing type operand")),
    }
}

pub(super) fn kind_name(node: &Node) -> String {
    format!("{:?}", node.kind)
}

fn real_text(value: f64, single: bool) -> String {
    let mut text = format!("{value:?}");
    if single {
        text.push('f');
    }
    text
}

/// The call node of `f(...)` or `module.f(...)`.
pub(super) fn call_node(node: &Node) -> Option<&Node> {
    match node.kind {
        NodeKind::Call => Some(node),
        NodeKind::MemberAccess if matches!(node.lowering, Lowering::Member(MemberLowering::Module(_))) => {
            node.child(1).filter(|member| member.kind == NodeKind::Call)
        }
        _ => None,
    }
}

/// Does evaluating the node run a call?
pub(super) fn has_effects(node: &Node) -> bool {
    node.kind == NodeKind::Call || node.children.iter().any(has_effects)
}

/// Values that no side effect can change.
fn is_constant(node: &Node) -> bool {
    match node.kind {
        NodeKind::SizeOf | NodeKind::TypeInfoOf => true,
        _ if node.is_literal() => true,
        NodeKind::MemberAccess => matches!(node.lowering, Lowering::Member(MemberLowering::EnumVariant(_))),
        NodeKind::Unary(UnaryOpId::Neg | UnaryOpId::Not | UnaryOpId::BitNot) | NodeKind::Binary(_) => {
            node.children.iter().all(is_constant)
        }
        _ => false,
    }
}

/// Can the lowered node be written to or have its address taken?
pub(super) fn is_place(registry: &TypeRegistry, node: &Node) -> bool {
    match node.kind {
        NodeKind::Identifier => {
            matches!(&node.lowering, Lowering::Access(access) if !matches!(access, Access::Function(_)))
        }
        NodeKind::Index => node.child(0).is_some_and(|object| {
            !matches!(registry.base_token(object.ty), Ok(TypeToken::Array(_))) || is_place(registry, object)
        }),
        NodeKind::Unary(UnaryOpId::Deref) => true,
        NodeKind::MemberAccess => match node.lowering {
            Lowering::Member(MemberLowering::Field) => node.child(0).is_some_and(|o| is_place(registry, o)),
            Lowering::Member(MemberLowering::FieldThroughPointer) => true,
            Lowering::Member(MemberLowering::Module(_)) => node.child(1).is_some_and(|m| is_place(registry, m)),
            _ => false,
        },
        _ => false,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::frontend::ast::build::*;

    #[test]
    fn test_calls_have_effects_at_any_depth() {
        let nested = binary(BinaryOpId::Add, int(1), unary(UnaryOpId::Neg, call("f", vec![])));
        assert!(has_effects(&nested));
        assert!(!has_effects(&binary(BinaryOpId::Add, ident("a"), int(2))));
    }

    #[test]
    fn test_literal_arithmetic_is_constant() {
        assert!(is_constant(&binary(BinaryOpId::Mul, int(2), real("1.5"))));
        assert!(!is_constant(&binary(BinaryOpId::Mul, int(2), ident("x"))));
        assert!(!is_constant(&unary(UnaryOpId::Deref, ident("p"))));
    }

    #[test]
    fn test_real_text() {
        assert_eq!(real_text(1.0, false), "1.0");
        assert_eq!(real_text(2.5, true), "2.5f");
    }

    #[test]
    fn test_call_node_sees_through_module_access() {
        let mut qualified = member(ident("math"), call("carre", vec![int(2)]));
        assert!(call_node(&qualified).is_none());
        qualified.lowering = Lowering::Member(MemberLowering::Module(crate::frontend::module::ModuleId(1)));
        assert_eq!(call_node(&qualified).map(|c| c.name()), Some("carre"));
    }
}
