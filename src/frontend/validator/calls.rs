//! Call validation and overload resolution.
//!
//! Candidates are every overload of the called name in the current module plus the exported
//! overloads of imported modules (or only those of the named module for `module.f()`). Each
//! candidate is matched independently:
//!
//! 1. named arguments: unknown name, duplicate name, positional after named
//! 2. arity, with extra arguments absorbed by a trailing `...T` or by a C-variadic external
//! 3. per-argument compatibility, summing [`Coercion::penalty`]
//!
//! The cheapest candidate wins; ties go to the earliest declaration, so the choice never depends on
//! worker scheduling. When nothing matches, every candidate is listed with its rejection reason.

use super::{Validator, retype_literal, source_kind};
use crate::frontend::ast::{Access, Lowering, Node, NodeKind, Span};
use crate::frontend::diagnostics::{RejectedCandidate, RejectionReason, errors};
use crate::frontend::module::{FunctionDescriptor, FunctionId, ModuleId};
use crate::frontend::suspension::{Validation, WaitReason};
use crate::frontend::types::{Coercion, TypeIndex};

/// Where a call appears, which decides the callees it may bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CallSite {
    /// Produces exactly one value (or none, as a statement).
    Value,
    /// Right-hand side of `a, b = f()` or a statement.
    MultiValue,
    /// Iterable of a `pour` loop; coroutines are allowed here only.
    Iteration,
}

/// Outcome of matching one candidate.
#[derive(Debug, Clone)]
struct CandidateMatch {
    id: FunctionId,
    cost: u32,
    /// Argument index bound to each declared (non-variadic) parameter.
    slots: Vec<usize>,
    /// Arguments beyond the declared parameters, in call order.
    extras: Vec<usize>,
    /// Target type and coercion per argument index.
    conversions: Vec<(TypeIndex, Coercion)>,
}

impl Validator<'_> {
    /// Validate a call, resolving its callee among the visible overloads.
    pub(crate) fn call(&mut self, node: &mut Node, site: CallSite) -> Validation<()> {
        if let Some(binding) = self.scope.lookup(node.name()).cloned() {
            return self.indirect_call(node, binding.ty, binding.access);
        }
        self.call_in(node, None, site)
    }

    /// Validate a call, restricting candidates to `module` when given.
    pub(crate) fn call_in(&mut self, node: &mut Node, module: Option<ModuleId>, site: CallSite) -> Validation<()> {
        let name = node.name().to_string();
        let span = node.span();

        for argument in &mut node.children {
            match argument.kind {
                NodeKind::NamedArgument => {
                    let Some(value) = argument.children.first_mut() else {
                        return Err(errors::type_mismatch("named argument without a value", argument.span()).into());
                    };
                    self.expr(value)?;
                    argument.ty = value.ty;
                }
                _ => self.expr(argument)?,
            }
        }

        let candidates = self.candidates(&name, module, span)?;
        if candidates.is_empty() {
            if let Some((ty, access)) = self.global_callable(&name, span)? {
                return self.indirect_call(node, ty, access);
            }
            return Err(errors::unknown_symbol("function", &name, span).into());
        }

        let mut best: Option<CandidateMatch> = None;
        let mut rejected = Vec::new();
        for function in &candidates {
            match self.match_candidate(function, &node.children) {
                Ok(candidate) => {
                    if best.as_ref().is_none_or(|b| candidate.cost < b.cost) {
                        best = Some(candidate);
                    }
                }
                Err(reason) => rejected.push(RejectedCandidate {
                    signature: self.signature_text(function),
                    reason,
                }),
            }
        }
        let Some(chosen) = best else {
            return Err(errors::unresolved_overload(&name, &rejected, span).into());
        };
        let Some(function) = candidates.into_iter().find(|f| f.id == chosen.id) else {
            return Err(errors::unknown_symbol("function", &name, span).into());
        };
        tracing::trace!(function = %name, linkage = %function.linkage_name, cost = chosen.cost, "overload chosen");

        if function.coroutine && site != CallSite::Iteration {
            return Err(errors::invalid_control(
                format!("coroutine `{name}` can only be consumed by a `pour` loop"),
                span,
            )
            .into());
        }
        if function.returns_multiple() && site == CallSite::Value {
            return Err(errors::type_mismatch(
                format!(
                    "`{name}` returns {} values; use `a, b = {name}(..)` to receive them",
                    function.returns.len()
                ),
                span,
            )
            .into());
        }
        self.bind_call(node, &function, chosen);
        Ok(())
    }

    /// Same-named overloads visible from here, in declaration order.
    fn candidates(&self, name: &str, module: Option<ModuleId>, span: Span) -> Validation<Vec<FunctionDescriptor>> {
        let modules = match module {
            Some(module) => vec![module],
            None => self.visible_modules(),
        };
        let mut ids = Vec::new();
        for candidate_module in modules {
            if module.is_none() && candidate_module != self.module && !self.modules.is_exported(candidate_module, name) {
                continue;
            }
            let overloads = self.modules.overloads(candidate_module, name);
            if overloads.is_empty() {
                continue;
            }
            self.require(WaitReason::Functions {
                module: candidate_module,
                name: name.to_string(),
            })?;
            ids.extend(overloads);
        }
        ids.sort();
        let mut functions = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(function) = self.modules.function(id) else {
                return Err(errors::unknown_symbol("function", name, span).into());
            };
            functions.push(function);
        }
        Ok(functions)
    }

    /// A global holding a function value, called by name.
    fn global_callable(&self, name: &str, span: Span) -> Validation<Option<(TypeIndex, Access)>> {
        for module in self.visible_modules() {
            if module != self.module && !self.modules.is_exported(module, name) {
                continue;
            }
            if self.modules.global_named(module, name).is_none() {
                continue;
            }
            return self.module_symbol(module, name, span);
        }
        Ok(None)
    }

    fn match_candidate(
        &self,
        function: &FunctionDescriptor,
        arguments: &[Node],
    ) -> Result<CandidateMatch, RejectionReason> {
        let declared: Vec<_> = function.params.iter().filter(|p| !p.variadic).collect();
        let variadic = function.params.iter().find(|p| p.variadic);
        let mut slots: Vec<Option<usize>> = vec![None; declared.len()];
        let mut extras = Vec::new();
        let mut seen_named = false;
        let mut next_position = 0;

        for (index, argument) in arguments.iter().enumerate() {
            if argument.kind == NodeKind::NamedArgument {
                seen_named = true;
                let Some(position) = declared.iter().position(|p| p.name == argument.name()) else {
                    return Err(RejectionReason::UnknownName(argument.name().to_string()));
                };
                if slots[position].is_some() {
                    return Err(RejectionReason::DuplicateName(argument.name().to_string()));
                }
                slots[position] = Some(index);
                continue;
            }
            if seen_named {
                return Err(RejectionReason::MissingNameAfterNamed);
            }
            while next_position < slots.len() && slots[next_position].is_some() {
                next_position += 1;
            }
            if next_position < slots.len() {
                slots[next_position] = Some(index);
                next_position += 1;
            } else {
                extras.push(index);
            }
        }

        let arity = RejectionReason::Arity {
            expected: declared.len(),
            found: arguments.len(),
        };
        if !extras.is_empty() && variadic.is_none() && !function.c_variadic {
            return Err(arity);
        }
        let Some(slots) = slots.into_iter().collect::<Option<Vec<usize>>>() else {
            return Err(arity);
        };

        let mut cost = 0;
        let mut conversions = vec![(TypeIndex::UNRESOLVED, Coercion::Identical); arguments.len()];
        for (position, (param, &argument)) in declared.iter().zip(&slots).enumerate() {
            let value = argument_value(&arguments[argument]);
            let coercion = self.registry.compatibility(param.ty, value.ty, source_kind(value));
            let Some(penalty) = coercion.penalty() else {
                return Err(RejectionReason::ArgumentType {
                    position,
                    parameter: param.name.clone(),
                    expected: self.display(param.ty),
                    found: self.display(value.ty),
                });
            };
            cost += penalty;
            conversions[argument] = (param.ty, coercion);
        }
        if let Some(variadic) = variadic {
            let element = self.registry.pointee(variadic.ty).unwrap_or(TypeIndex::UNRESOLVED);
            for &argument in &extras {
                let value = argument_value(&arguments[argument]);
                let coercion = self.registry.compatibility(element, value.ty, source_kind(value));
                let Some(penalty) = coercion.penalty() else {
                    return Err(RejectionReason::ArgumentType {
                        position: argument,
                        parameter: variadic.name.clone(),
                        expected: self.display(element),
                        found: self.display(value.ty),
                    });
                };
                cost += penalty;
                conversions[argument] = (element, coercion);
            }
        } else {
            let c_string = self
                .registry
                .pointer_to(TypeIndex::Z8)
                .unwrap_or(TypeIndex::UNRESOLVED);
            for &argument in &extras {
                let value = argument_value(&arguments[argument]);
                conversions[argument] = if value.ty == TypeIndex::CHAINE {
                    (c_string, Coercion::ExtractCString)
                } else {
                    (value.ty, Coercion::Identical)
                };
            }
        }

        Ok(CandidateMatch {
            id: function.id,
            cost,
            slots,
            extras,
            conversions,
        })
    }

    /// Reorder arguments into parameter order, apply conversions and bind the callee.
    fn bind_call(&self, node: &mut Node, function: &FunctionDescriptor, chosen: CandidateMatch) {
        let mut arguments: Vec<Option<Node>> = std::mem::take(&mut node.children).into_iter().map(Some).collect();
        let mut ordered = Vec::with_capacity(arguments.len());
        for index in chosen.slots.iter().chain(&chosen.extras) {
            let Some(argument) = arguments.get_mut(*index).and_then(Option::take) else {
                continue;
            };
            let mut value = unwrap_named(argument);
            let (target, coercion) = chosen.conversions[*index];
            if coercion.retypes_literal() {
                retype_literal(&mut value, target);
            } else {
                value.coercions.insert(coercion.flags());
            }
            ordered.push(value);
        }
        let declared = chosen.slots.len();
        node.children = ordered;
        node.callee = Some(function.id);
        node.ty = function.return_type();
        node.lowering = Lowering::Call {
            variadic_from: function.is_variadic().then_some(declared),
            c_variadic_from: (function.c_variadic && !chosen.extras.is_empty()).then_some(declared),
        };
        self.modules.mark_used(function.id);
    }

    /// Call through a function-typed local or global.
    fn indirect_call(&mut self, node: &mut Node, callee_ty: TypeIndex, access: Access) -> Validation<()> {
        let span = node.span();
        let Some(signature) = self.registry.signature_of(callee_ty) else {
            return Err(errors::type_mismatch(
                format!("`{}` has type `{}` and cannot be called", node.name(), self.display(callee_ty)),
                span,
            )
            .into());
        };
        if signature.coroutine {
            return Err(errors::invalid_control("coroutines can only be consumed by a `pour` loop", span).into());
        }
        if signature.returns.len() > 1 {
            return Err(errors::type_mismatch("function values returning several values cannot be called", span).into());
        }
        if node.children.len() != signature.params.len() {
            let candidate = RejectedCandidate {
                signature: self.display(callee_ty),
                reason: RejectionReason::Arity {
                    expected: signature.params.len(),
                    found: node.children.len(),
                },
            };
            return Err(errors::unresolved_overload(node.name(), &[candidate], span).into());
        }
        for (position, (argument, param)) in node.children.iter_mut().zip(&signature.params).enumerate() {
            if argument.kind == NodeKind::NamedArgument {
                return Err(errors::type_mismatch("function values take positional arguments only", argument.span()).into());
            }
            if !argument.ty.is_resolved() {
                self.expr(argument)?;
            }
            if !self.coerce(argument, *param).is_compatible() {
                return Err(errors::argument_type_mismatch(
                    &format!("#{}", position + 1),
                    &self.display(*param),
                    &self.display(argument.ty),
                    argument.span(),
                )
                .into());
            }
        }
        node.ty = signature.returns.first().copied().unwrap_or(TypeIndex::RIEN);
        node.lowering = Lowering::Access(access);
        Ok(())
    }

    /// `f(a: z32, ...b: r64) -> bool` spelling used in overload reports.
    fn signature_text(&self, function: &FunctionDescriptor) -> String {
        let params: Vec<String> = function
            .params
            .iter()
            .map(|p| {
                if p.variadic {
                    let element = self.registry.pointee(p.ty).unwrap_or(p.ty);
                    format!("...{}: {}", p.name, self.display(element))
                } else {
                    format!("{}: {}", p.name, self.display(p.ty))
                }
            })
            .collect();
        let mut text = format!("{}({})", function.name, params.join(", "));
        if function.c_variadic {
            text.insert_str(text.len() - 1, ", ...");
        }
        if !function.returns.is_empty() {
            let returns: Vec<String> = function.returns.iter().map(|r| self.display(*r)).collect();
            text.push_str(&format!(" -> {}", returns.join(", ")));
        }
        text
    }
}

fn argument_value(argument: &Node) -> &Node {
    match argument.kind {
        NodeKind::NamedArgument => argument.child(0).unwrap_or(argument),
        _ => argument,
    }
}

fn unwrap_named(argument: Node) -> Node {
    match argument.kind {
        NodeKind::NamedArgument => {
            let span = argument.span();
            argument
                .children
                .into_iter()
                .next()
                .unwrap_or_else(|| Node::new(NodeKind::NullLiteral, "nul", Vec::new()).at(span.line, span.column))
        }
        _ => argument,
    }
}
