//! Statement and control-flow validation.

use super::calls::CallSite;
use super::expr::is_addressable;
use super::{Binding, LoopFrame, Validator};
use crate::frontend::ast::{
    Access, ForStrategy, Lowering, MemberLowering, Node, NodeKind, NodeValue, ReturnLowering,
};
use crate::frontend::diagnostics::errors;
use crate::frontend::suspension::Validation;
use crate::frontend::types::{Coercion, SourceKind, TypeIndex, TypeToken};

impl Validator<'_> {
    /// Validate a block in its own scope.
    pub(crate) fn block(&mut self, node: &mut Node) -> Validation<()> {
        self.scope.enter();
        let result = node.children.iter_mut().try_for_each(|statement| self.statement(statement));
        self.scope.leave();
        result
    }

    pub(crate) fn statement(&mut self, node: &mut Node) -> Validation<()> {
        match node.kind {
            NodeKind::Block => self.block(node),
            NodeKind::Assignment => self.assignment(node),
            NodeKind::Identifier if node.flags.declaration => self.bare_declaration(node),
            NodeKind::Return => self.return_statement(node),
            NodeKind::Yield => self.yield_statement(node),
            NodeKind::If => self.if_statement(node),
            NodeKind::While => self.while_loop(node),
            NodeKind::Loop => self.infinite_loop(node),
            NodeKind::For => self.for_loop(node),
            NodeKind::Break | NodeKind::Continue => self.loop_jump(node),
            NodeKind::Defer => {
                self.defer_depth += 1;
                let result = self.body(node, 0);
                self.defer_depth -= 1;
                result
            }
            NodeKind::Unsafe => {
                self.unsafe_depth += 1;
                let result = self.body(node, 0);
                self.unsafe_depth -= 1;
                result
            }
            NodeKind::Call | NodeKind::MemberAccess => self.expr_multi(node).map(|_| ()),
            _ => self.expr(node),
        }
    }

    fn body(&mut self, node: &mut Node, index: usize) -> Validation<()> {
        let span = node.span();
        match node.children.get_mut(index) {
            Some(body) if body.kind == NodeKind::Block => self.block(body),
            Some(body) => self.statement(body),
            None => Err(errors::type_mismatch("missing block", span).into()),
        }
    }

    fn condition(&mut self, node: &mut Node) -> Validation<()> {
        let span = node.span();
        let Some(condition) = node.children.first_mut() else {
            return Err(errors::type_mismatch("missing condition", span).into());
        };
        self.expr(condition)?;
        if condition.ty != TypeIndex::BOOL {
            return Err(errors::type_mismatch(
                format!("condition must be `bool`, found `{}`", self.display(condition.ty)),
                condition.span(),
            )
            .into());
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Declarations and assignments
    // ------------------------------------------------------------------------

    /// `dyn x: T` without a value: zero-initialized.
    fn bare_declaration(&mut self, node: &mut Node) -> Validation<()> {
        let Some(ty_expr) = node.type_expr.clone() else {
            return Err(errors::type_mismatch(
                format!("the declaration of `{}` needs a type or a value", node.name()),
                node.span(),
            )
            .into());
        };
        let ty = self.resolve_type(&ty_expr, node.span(), false)?;
        self.bind_declared(node, ty)
    }

    fn bind_declared(&mut self, target: &mut Node, ty: TypeIndex) -> Validation<()> {
        if ty == TypeIndex::RIEN || ty == TypeIndex::NULL {
            return Err(errors::type_mismatch(
                format!("cannot declare `{}` with type `{}`", target.name(), self.display(ty)),
                target.span(),
            )
            .into());
        }
        target.ty = ty;
        target.lowering = Lowering::Access(Access::Local);
        let binding = Binding {
            ty,
            mutable: target.flags.mutable,
            access: Access::Local,
            span: target.span(),
        };
        self.declare_local(&target.name().to_string(), binding)
    }

    fn assignment(&mut self, node: &mut Node) -> Validation<()> {
        let span = node.span();
        let [target, value] = node.children.as_mut_slice() else {
            return Err(errors::type_mismatch("malformed assignment", span).into());
        };

        if target.kind == NodeKind::ExprList {
            let returns = self.expr_multi(value)?;
            if returns.len() != target.children.len() || returns.len() < 2 {
                return Err(errors::invalid_assignment(
                    format!(
                        "{} targets need a call returning {} values",
                        target.children.len(),
                        target.children.len()
                    ),
                    value.span(),
                )
                .into());
            }
            for (element, ty) in target.children.iter_mut().zip(returns) {
                if element.kind == NodeKind::Identifier && element.flags.declaration {
                    let declared = match element.type_expr.clone() {
                        Some(expr) => self.resolve_type(&expr, element.span(), false)?,
                        None => ty,
                    };
                    if declared != ty {
                        return Err(errors::assignment_type_mismatch(
                            &self.display(declared),
                            &self.display(ty),
                            element.span(),
                        )
                        .into());
                    }
                    self.bind_declared(element, ty)?;
                    continue;
                }
                self.expr(element)?;
                self.check_assignable(element)?;
                if self.registry.compatibility(element.ty, ty, SourceKind::Expression) != Coercion::Identical {
                    return Err(errors::assignment_type_mismatch(
                        &self.display(element.ty),
                        &self.display(ty),
                        element.span(),
                    )
                    .into());
                }
            }
            target.ty = TypeIndex::RIEN;
            node.lowering = Lowering::MultiAssign;
            node.ty = TypeIndex::RIEN;
            return Ok(());
        }

        self.expr(value)?;
        if value.ty == TypeIndex::RIEN {
            return Err(errors::type_mismatch("this expression produces no value", value.span()).into());
        }

        if target.kind == NodeKind::Identifier && target.flags.declaration {
            let ty = match target.type_expr.clone() {
                Some(expr) => self.resolve_type(&expr, target.span(), false)?,
                None if value.ty == TypeIndex::NULL => {
                    return Err(errors::type_mismatch(
                        format!("cannot infer the type of `{}` from `nul`", target.name()),
                        target.span(),
                    )
                    .into());
                }
                None => value.ty,
            };
            if !self.coerce(value, ty).is_compatible() {
                return Err(errors::assignment_type_mismatch(&self.display(ty), &self.display(value.ty), value.span()).into());
            }
            self.bind_declared(target, ty)?;
            node.ty = TypeIndex::RIEN;
            return Ok(());
        }

        self.expr(target)?;
        self.check_assignable(target)?;
        if !self.coerce(value, target.ty).is_compatible() {
            return Err(
                errors::assignment_type_mismatch(&self.display(target.ty), &self.display(value.ty), value.span()).into(),
            );
        }
        node.ty = TypeIndex::RIEN;
        Ok(())
    }

    /// The target must be a writable location: a mutable binding, a global inside `nonsûr`, or a
    /// location reached through one of those or through a pointer.
    fn check_assignable(&self, target: &Node) -> Validation<()> {
        if !is_addressable(target) {
            return Err(errors::invalid_assignment("this expression cannot be assigned to", target.span()).into());
        }
        match (&target.kind, &target.lowering) {
            (NodeKind::Identifier, Lowering::Access(Access::Global(id))) => {
                let Some(global) = self.modules.global(*id) else {
                    return Ok(());
                };
                if !global.mutable {
                    return Err(errors::invalid_assignment(
                        format!("cannot assign to the immutable global `{}`", global.name),
                        target.span(),
                    )
                    .into());
                }
                if !self.in_unsafe() {
                    return Err(errors::invalid_assignment(
                        format!("assigning the global `{}` requires a `nonsûr` block", global.name),
                        target.span(),
                    )
                    .into());
                }
                Ok(())
            }
            (NodeKind::Identifier, _) => match self.scope.lookup(target.name()) {
                Some(binding) if !binding.mutable => Err(errors::invalid_assignment(
                    format!("cannot assign twice to the immutable variable `{}`", target.name()),
                    target.span(),
                )
                .with_note(format!("`{}` is declared on line {}", target.name(), binding.span.line))
                .into()),
                _ => Ok(()),
            },
            (NodeKind::MemberAccess, Lowering::Member(MemberLowering::Field)) => match target.child(0) {
                Some(object) => self.check_assignable(object),
                None => Ok(()),
            },
            (NodeKind::MemberAccess, Lowering::Member(MemberLowering::Module(_))) => match target.child(1) {
                Some(member) => self.check_assignable(member),
                None => Ok(()),
            },
            (NodeKind::Index, _) => match target.child(0) {
                Some(object) if matches!(self.registry.base_token(object.ty), Ok(TypeToken::Array(_))) => {
                    self.check_assignable(object)
                }
                Some(object) if object.ty == TypeIndex::CHAINE => Err(errors::invalid_assignment(
                    "strings are read-only views",
                    target.span(),
                )
                .into()),
                _ => Ok(()),
            },
            _ => Ok(()),
        }
    }

    // ------------------------------------------------------------------------
    // Returns and yields
    // ------------------------------------------------------------------------

    fn return_statement(&mut self, node: &mut Node) -> Validation<()> {
        let span = node.span();
        if self.defer_depth > 0 {
            return Err(errors::invalid_control("`retourne` is not allowed inside `diffère`", span).into());
        }
        let Some(function) = self.function.clone() else {
            return Err(errors::invalid_control("`retourne` outside of a function", span).into());
        };
        let expected = function.returns.clone();

        let Some(value) = node.children.first_mut() else {
            if !expected.is_empty() && !function.coroutine {
                let wanted: Vec<String> = expected.iter().map(|t| self.display(*t)).collect();
                return Err(errors::return_type_mismatch(&wanted.join(", "), "rien", span).into());
            }
            node.lowering = Lowering::Return(ReturnLowering::Bare);
            return Ok(());
        };
        if function.coroutine {
            return Err(errors::invalid_control(
                "coroutines produce values with `retiens`; `retourne` only ends them",
                span,
            )
            .into());
        }

        if value.kind == NodeKind::ExprList {
            if value.children.len() != expected.len() {
                return Err(errors::type_mismatch(
                    format!(
                        "`{}` returns {} value(s), found {}",
                        function.name,
                        expected.len(),
                        value.children.len()
                    ),
                    value.span(),
                )
                .into());
            }
            self.coerce_values(&mut value.children, &expected)?;
            value.ty = TypeIndex::RIEN;
            node.lowering = Lowering::Return(ReturnLowering::Multi);
            return Ok(());
        }

        if expected.len() > 1 {
            let produced = self.expr_multi(value)?;
            if produced != expected {
                let wanted: Vec<String> = expected.iter().map(|t| self.display(*t)).collect();
                let found: Vec<String> = produced.iter().map(|t| self.display(*t)).collect();
                return Err(errors::return_type_mismatch(&wanted.join(", "), &found.join(", "), value.span()).into());
            }
            node.lowering = Lowering::Return(ReturnLowering::Forward);
            return Ok(());
        }

        self.expr(value)?;
        let Some(&target) = expected.first() else {
            return Err(errors::return_type_mismatch("rien", &self.display(value.ty), value.span()).into());
        };
        if !self.coerce(value, target).is_compatible() {
            return Err(errors::return_type_mismatch(&self.display(target), &self.display(value.ty), value.span()).into());
        }
        node.lowering = Lowering::Return(ReturnLowering::Single);
        Ok(())
    }

    fn yield_statement(&mut self, node: &mut Node) -> Validation<()> {
        let span = node.span();
        let coroutine = self.function.as_ref().filter(|f| f.coroutine).cloned();
        let Some(function) = coroutine else {
            return Err(errors::invalid_control("`retiens` is only allowed inside a coroutine", span).into());
        };
        if self.defer_depth > 0 {
            return Err(errors::invalid_control("`retiens` is not allowed inside `diffère`", span).into());
        }
        let listed = node.children.first().is_some_and(|c| c.kind == NodeKind::ExprList);
        let values: &mut [Node] = if listed {
            let list = &mut node.children[0];
            list.ty = TypeIndex::RIEN;
            &mut list.children
        } else {
            &mut node.children
        };
        if values.len() != function.returns.len() {
            return Err(errors::type_mismatch(
                format!(
                    "coroutine `{}` yields {} value(s), found {}",
                    function.name,
                    function.returns.len(),
                    values.len()
                ),
                span,
            )
            .into());
        }
        self.coerce_values(values, &function.returns)
    }

    fn coerce_values(&mut self, values: &mut [Node], expected: &[TypeIndex]) -> Validation<()> {
        for (value, target) in values.iter_mut().zip(expected) {
            self.expr(value)?;
            if !self.coerce(value, *target).is_compatible() {
                return Err(
                    errors::return_type_mismatch(&self.display(*target), &self.display(value.ty), value.span()).into(),
                );
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Conditionals and loops
    // ------------------------------------------------------------------------

    fn if_statement(&mut self, node: &mut Node) -> Validation<()> {
        self.condition(node)?;
        self.body(node, 1)?;
        if node.children.len() > 2 {
            self.body(node, 2)?;
        }
        Ok(())
    }

    fn while_loop(&mut self, node: &mut Node) -> Validation<()> {
        self.condition(node)?;
        self.loop_body(node, None, 1)
    }

    fn infinite_loop(&mut self, node: &mut Node) -> Validation<()> {
        self.loop_body(node, None, 0)
    }

    fn loop_body(&mut self, node: &mut Node, label: Option<String>, index: usize) -> Validation<()> {
        let number = self.loop_counter;
        self.loop_counter += 1;
        node.value = NodeValue::Label(number);
        self.loops.push(LoopFrame {
            label,
            number,
            defer_depth: self.defer_depth,
        });
        let result = self.body(node, index);
        self.loops.pop();
        result
    }

    /// `pour x dans iterable`, `pour x, i dans iterable`.
    fn for_loop(&mut self, node: &mut Node) -> Validation<()> {
        let span = node.span();
        let [binding, iterable, _body] = node.children.as_mut_slice() else {
            return Err(errors::type_mismatch("malformed `pour` loop", span).into());
        };

        let (strategy, mut value_types) = self.iteration(iterable)?;
        let names: Vec<&mut Node> = match binding.kind {
            NodeKind::ExprList => binding.children.iter_mut().collect(),
            _ => vec![binding],
        };
        let with_index = names.len() == value_types.len() + 1;
        if names.len() != value_types.len() && !with_index {
            return Err(errors::type_mismatch(
                format!(
                    "this loop produces {} value(s) per iteration, found {} name(s)",
                    value_types.len(),
                    names.len()
                ),
                span,
            )
            .into());
        }
        if with_index {
            value_types.push(TypeIndex::Z64);
        }
        let label = names.first().map(|n| n.name().to_string());

        self.scope.enter();
        let mut result = Ok(());
        for (name, ty) in names.into_iter().zip(value_types) {
            if name.kind != NodeKind::Identifier {
                result = Err(errors::type_mismatch("expected a loop variable name", name.span()).into());
                break;
            }
            name.ty = ty;
            name.lowering = Lowering::Access(Access::Local);
            let binding = Binding {
                ty,
                mutable: false,
                access: Access::Local,
                span: name.span(),
            };
            if let Err(halt) = self.declare_local(&name.name().to_string(), binding) {
                result = Err(halt);
                break;
            }
        }
        if result.is_ok() {
            node.lowering = Lowering::For(strategy);
            result = self.loop_body(node, label, 2);
        }
        self.scope.leave();
        result
    }

    /// Pick the iteration strategy and the per-iteration value types.
    fn iteration(&mut self, iterable: &mut Node) -> Validation<(ForStrategy, Vec<TypeIndex>)> {
        let span = iterable.span();
        if iterable.kind == NodeKind::Range {
            let [start, end] = iterable.children.as_mut_slice() else {
                return Err(errors::type_mismatch("malformed range", span).into());
            };
            self.expr(start)?;
            self.expr(end)?;
            if self.coerce(end, start.ty) == Coercion::Incompatible {
                self.coerce(start, end.ty);
            }
            if start.ty != end.ty || !self.registry.is_integral(start.ty) {
                return Err(errors::type_mismatch(
                    format!(
                        "range bounds must be integers of one type, found `{}` and `{}`",
                        self.display(start.ty),
                        self.display(end.ty)
                    ),
                    span,
                )
                .into());
            }
            iterable.ty = start.ty;
            return Ok((ForStrategy::Range, vec![start.ty]));
        }

        if matches!(iterable.kind, NodeKind::Call | NodeKind::MemberAccess) {
            let function = self.callable(iterable, CallSite::Iteration)?;
            if let Some(function) = function {
                if function.coroutine {
                    return Ok((ForStrategy::Coroutine, function.returns));
                }
                if function.returns_multiple() {
                    return Err(errors::type_mismatch(
                        format!("`{}` returns several values and cannot be iterated", function.name),
                        span,
                    )
                    .into());
                }
            }
        } else {
            self.expr(iterable)?;
        }
        let ty = iterable.ty;
        match self.registry.base_token(ty) {
            Ok(TypeToken::Array(len)) => {
                let element = self.intern(self.registry.pointee(ty), span)?;
                Ok((ForStrategy::FixedArray(len), vec![element]))
            }
            Ok(TypeToken::Slice) => {
                let element = self.intern(self.registry.pointee(ty), span)?;
                Ok((ForStrategy::Slice, vec![element]))
            }
            _ if ty == TypeIndex::CHAINE => Ok((ForStrategy::String, vec![TypeIndex::Z8])),
            _ => Err(errors::type_mismatch(format!("cannot iterate over `{}`", self.display(ty)), span).into()),
        }
    }

    fn loop_jump(&mut self, node: &mut Node) -> Validation<()> {
        let span = node.span();
        let keyword = if node.kind == NodeKind::Break { "arrête" } else { "continue" };
        let label = node.child(0).map(|n| n.name().to_string());
        let frame = match &label {
            Some(label) => self.loops.iter().rev().find(|f| f.label.as_deref() == Some(label.as_str())),
            None => self.loops.last(),
        };
        let Some(frame) = frame else {
            let message = match &label {
                Some(label) => format!("no enclosing loop is labelled `{label}`"),
                None => format!("`{keyword}` outside of a loop"),
            };
            return Err(errors::invalid_control(message, span).into());
        };
        if frame.defer_depth < self.defer_depth {
            return Err(errors::invalid_control(format!("`{keyword}` cannot leave a `diffère` block"), span).into());
        }
        node.value = NodeValue::Label(frame.number);
        if let Some(label) = node.children.first_mut() {
            label.ty = TypeIndex::RIEN;
        }
        Ok(())
    }
}

/// Does the block end in a statement that always returns?
pub(crate) fn ends_with_return(block: &Node) -> bool {
    block.children.last().is_some_and(always_returns)
}

fn always_returns(statement: &Node) -> bool {
    match statement.kind {
        NodeKind::Return => true,
        NodeKind::Block | NodeKind::Unsafe => ends_with_return(statement),
        NodeKind::If => {
            statement.child(1).is_some_and(always_returns) && statement.child(2).is_some_and(always_returns)
        }
        _ => false,
    }
}
