//! Statement lowering.
//!
//! ## Notes
//!
//! - `diffère` bodies are not emitted where they appear. They are replayed, innermost first, at
//!   the end of their block and before every `retourne`, `arrête` and `continue` leaving it.
//! - Loops jump to `__continue_N` / `__break_N` labels, so a jump out of nested loops is a plain
//!   `goto` once the deferred statements in between have run.
//! - Inside coroutines every local is a state field and no C declaration is emitted, which keeps
//!   the `goto` into a resume point legal.

use kuri_core::runtime;

use super::errors::{CodegenFault, CodegenResult};
use super::expressions::{Operand, call_node, is_place, kind_name};
use super::functions::state_name;
use super::{CGenerator, LoopTarget};
use crate::frontend::ast::{ForStrategy, Lowering, Node, NodeKind, ReturnLowering};
use crate::frontend::mangle::c_identifier;
use crate::frontend::types::TypeIndex;

fn continue_label(id: usize) -> String {
    format!("__continue_{id}")
}

fn break_label(id: usize) -> String {
    format!("__break_{id}")
}

/// Statements after which the end of the block is unreachable.
fn jumps(statement: &Node) -> bool {
    match statement.kind {
        NodeKind::Return | NodeKind::Break | NodeKind::Continue => true,
        NodeKind::Block => statement.children.last().is_some_and(jumps),
        NodeKind::Unsafe => statement.child(0).is_some_and(jumps),
        NodeKind::If => statement.child(1).is_some_and(jumps) && statement.child(2).is_some_and(jumps),
        _ => false,
    }
}

impl<'p> CGenerator<'p> {
    pub(super) fn statement(&mut self, node: &'p Node) -> CodegenResult<()> {
        match node.kind {
            NodeKind::Block => self.block(node),
            NodeKind::Unsafe => {
                let body = node
                    .child(0)
                    .ok_or_else(|| CodegenFault::malformed(kind_name(node), "missing body"))?;
                self.braced(body)
            }
            NodeKind::Defer => {
                let body = node
                    .child(0)
                    .ok_or_else(|| CodegenFault::malformed(kind_name(node), "missing body"))?;
                self.frame.defers.push(body);
                Ok(())
            }
            NodeKind::Identifier if node.flags.declaration => {
                self.declare_local(node.name(), node.ty, None)?;
                Ok(())
            }
            NodeKind::Assignment => self.assignment(node),
            NodeKind::Return => self.return_statement(node),
            NodeKind::Yield => self.yield_statement(node),
            NodeKind::If => self.if_statement(node),
            NodeKind::While => self.while_loop(node),
            NodeKind::Loop => self.infinite_loop(node),
            NodeKind::For => self.for_loop(node),
            NodeKind::Break | NodeKind::Continue => self.loop_jump(node),
            NodeKind::Call | NodeKind::MemberAccess if self.multi_value_callee(node).is_some() => {
                self.discard_outputs(node)
            }
            _ => {
                let value = self.expr(node)?;
                self.frame.out.line(&format!("{value};"));
                Ok(())
            }
        }
    }

    // ------------------------------------------------------------------------
    // Blocks and defers
    // ------------------------------------------------------------------------

    /// `{ ... }` in its own scope.
    pub(super) fn block(&mut self, node: &'p Node) -> CodegenResult<()> {
        self.frame.out.line("{");
        self.frame.out.indent();
        self.block_contents(node)?;
        self.frame.out.dedent();
        self.frame.out.line("}");
        Ok(())
    }

    /// Statements of a block without the braces, followed by its deferred statements.
    pub(super) fn block_contents(&mut self, node: &'p Node) -> CodegenResult<()> {
        self.frame.scope.enter();
        self.frame.defers.enter();
        for statement in &node.children {
            self.statement(statement)?;
        }
        let pending = self.frame.defers.leave();
        if !node.children.last().is_some_and(jumps) {
            for body in pending {
                self.braced(body)?;
            }
        }
        self.frame.scope.leave();
        Ok(())
    }

    /// A block, or a lone statement wrapped in braces so that replaying it never redeclares a name.
    fn braced(&mut self, node: &'p Node) -> CodegenResult<()> {
        if node.kind == NodeKind::Block {
            return self.block(node);
        }
        self.frame.out.line("{");
        self.frame.out.indent();
        self.scoped(node)?;
        self.frame.out.dedent();
        self.frame.out.line("}");
        Ok(())
    }

    /// Body of a control statement, at the current indentation.
    fn scoped(&mut self, node: &'p Node) -> CodegenResult<()> {
        if node.kind == NodeKind::Block {
            return self.block_contents(node);
        }
        self.frame.scope.enter();
        let result = self.statement(node);
        self.frame.scope.leave();
        result
    }

    /// Replay every deferred statement registered since `depth` blocks were open.
    fn run_defers_since(&mut self, depth: usize) -> CodegenResult<()> {
        let pending: Vec<&'p Node> = self.frame.defers.since_depth(depth).copied().collect();
        pending.into_iter().try_for_each(|body| self.braced(body))
    }

    fn has_pending_defers(&self) -> bool {
        self.frame.defers.all().next().is_some()
    }

    // ------------------------------------------------------------------------
    // Assignments
    // ------------------------------------------------------------------------

    fn assignment(&mut self, node: &'p Node) -> CodegenResult<()> {
        let (Some(target), Some(value)) = (node.child(0), node.child(1)) else {
            return Err(CodegenFault::malformed(kind_name(node), "expected a target and a value"));
        };
        if node.lowering == Lowering::MultiAssign {
            return self.multi_assign(target, value);
        }
        if target.kind == NodeKind::Identifier && target.flags.declaration {
            let value = self.coerced(value, target.ty)?;
            self.declare_local(target.name(), target.ty, Some(&value))?;
            return Ok(());
        }
        let place = self.expr(target)?;
        let value = self.coerced(value, target.ty)?;
        self.frame.out.line(&format!("{place} = {value};"));
        Ok(())
    }

    /// `a, dyn b = f()`: new names are declared first, then every target receives one output slot.
    fn multi_assign(&mut self, targets: &'p Node, value: &'p Node) -> CodegenResult<()> {
        let mut slots = Vec::with_capacity(targets.children.len());
        for target in &targets.children {
            let place = if target.kind == NodeKind::Identifier && target.flags.declaration {
                self.declare_local(target.name(), target.ty, None)?
            } else {
                self.expr(target)?
            };
            slots.push(format!("&{place}"));
        }
        let call = self.call_with_slots(value, slots)?;
        self.frame.out.line(&format!("{call};"));
        Ok(())
    }

    /// A call returning several values used as a statement: the outputs land in temporaries.
    fn discard_outputs(&mut self, node: &'p Node) -> CodegenResult<()> {
        let Some(function) = self.multi_value_callee(node) else {
            return Err(CodegenFault::malformed(kind_name(node), "expected a call producing several values"));
        };
        let mut slots = Vec::with_capacity(function.returns.len());
        for ty in function.returns {
            let c_type = self.c_type(ty)?;
            let name = self.temp_name();
            let place = self.storage(&name, &c_type, None);
            slots.push(format!("&{place}"));
        }
        let call = self.call_with_slots(node, slots)?;
        self.frame.out.line(&format!("{call};"));
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Returns and yields
    // ------------------------------------------------------------------------

    fn return_statement(&mut self, node: &'p Node) -> CodegenResult<()> {
        let Lowering::Return(lowering) = node.lowering else {
            return Err(CodegenFault::malformed(kind_name(node), "unresolved return"));
        };
        let returns = self.frame.returns.clone();
        match lowering {
            ReturnLowering::Bare => {
                self.run_defers_since(0)?;
                if self.in_coroutine() {
                    self.frame.out.line(&format!(
                        "{}->{} = 1;",
                        runtime::COROUTINE_STATE_PARAM,
                        runtime::COROUTINE_FINISHED
                    ));
                }
                self.frame.out.line("return;");
            }
            ReturnLowering::Single => {
                let (Some(value), Some(&target)) = (node.child(0), returns.first()) else {
                    return Err(CodegenFault::malformed(kind_name(node), "expected one value"));
                };
                let value = self.coerced(value, target)?;
                if self.has_pending_defers() {
                    let held = self.temp(target, &value)?;
                    self.run_defers_since(0)?;
                    self.frame.out.line(&format!("return {held};"));
                } else {
                    self.frame.out.line(&format!("return {value};"));
                }
            }
            ReturnLowering::Multi => {
                let Some(list) = node.child(0) else {
                    return Err(CodegenFault::malformed(kind_name(node), "expected a list of values"));
                };
                let operands = list
                    .children
                    .iter()
                    .zip(&returns)
                    .map(|(value, &ty)| Operand::coerced(value, ty))
                    .collect();
                let mut values = self.ordered(operands)?;
                if self.has_pending_defers() {
                    let mut held = Vec::with_capacity(values.len());
                    for (value, &ty) in values.iter().zip(&returns) {
                        held.push(self.temp(ty, value)?);
                    }
                    values = held;
                    self.run_defers_since(0)?;
                }
                for (k, value) in values.iter().enumerate() {
                    self.frame
                        .out
                        .line(&format!("*{}{k} = {value};", runtime::RETURN_SLOT_PREFIX));
                }
                self.frame.out.line("return;");
            }
            ReturnLowering::Forward => {
                let Some(value) = node.child(0) else {
                    return Err(CodegenFault::malformed(kind_name(node), "expected a call"));
                };
                let slots = (0..returns.len())
                    .map(|k| format!("{}{k}", runtime::RETURN_SLOT_PREFIX))
                    .collect();
                let call = self.call_with_slots(value, slots)?;
                self.frame.out.line(&format!("{call};"));
                self.run_defers_since(0)?;
                self.frame.out.line("return;");
            }
        }
        Ok(())
    }

    /// Store the yielded values, record where to resume and hand control back to the consumer.
    fn yield_statement(&mut self, node: &'p Node) -> CodegenResult<()> {
        if !self.in_coroutine() {
            return Err(CodegenFault::malformed(kind_name(node), "yield outside of a coroutine"));
        }
        let values: &'p [Node] = match node.child(0) {
            Some(list) if list.kind == NodeKind::ExprList => &list.children,
            _ => &node.children,
        };
        let returns = self.frame.returns.clone();
        let operands = values
            .iter()
            .zip(&returns)
            .map(|(value, &ty)| Operand::coerced(value, ty))
            .collect();
        let values = self.ordered(operands)?;

        let state = runtime::COROUTINE_STATE_PARAM;
        for (k, value) in values.iter().enumerate() {
            self.frame
                .out
                .line(&format!("{state}->{}{k} = {value};", runtime::COROUTINE_OUTPUT_PREFIX));
        }
        self.frame.resume_points += 1;
        let point = self.frame.resume_points;
        self.frame
            .out
            .line(&format!("{state}->{} = {point};", runtime::COROUTINE_RESUME));
        self.frame.out.line("return;");
        self.frame
            .out
            .label(&format!("{}_{point}", runtime::COROUTINE_RESUME_LABEL));
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Conditionals and loops
    // ------------------------------------------------------------------------

    fn if_statement(&mut self, node: &'p Node) -> CodegenResult<()> {
        let (Some(condition), Some(then)) = (node.child(0), node.child(1)) else {
            return Err(CodegenFault::malformed(kind_name(node), "expected a condition and a body"));
        };
        let test = self.coerced(condition, TypeIndex::BOOL)?;
        self.frame.out.line(&format!("if ({test}) {{"));
        self.frame.out.indent();
        self.scoped(then)?;
        self.frame.out.dedent();
        if let Some(otherwise) = node.child(2) {
            self.frame.out.line("} else {");
            self.frame.out.indent();
            self.scoped(otherwise)?;
            self.frame.out.dedent();
        }
        self.frame.out.line("}");
        Ok(())
    }

    fn open_loop(&mut self, node: &Node) -> CodegenResult<LoopTarget> {
        let number = node
            .label()
            .ok_or_else(|| CodegenFault::malformed(kind_name(node), "loop without a number"))?;
        let target = LoopTarget {
            number,
            id: self.fresh_label(),
            defer_depth: self.frame.defers.depth(),
        };
        self.frame.loops.push(target);
        Ok(target)
    }

    fn close_loop(&mut self, target: LoopTarget) {
        self.frame.loops.pop();
        self.frame.out.label(&break_label(target.id));
    }

    /// The condition is evaluated inside the loop so that its own statements run every iteration.
    fn while_loop(&mut self, node: &'p Node) -> CodegenResult<()> {
        let (Some(condition), Some(body)) = (node.child(0), node.child(1)) else {
            return Err(CodegenFault::malformed(kind_name(node), "expected a condition and a body"));
        };
        let target = self.open_loop(node)?;
        self.frame.out.line("for (;;) {");
        self.frame.out.indent();
        let test = self.coerced(condition, TypeIndex::BOOL)?;
        self.frame
            .out
            .line(&format!("if (!{test}) goto {};", break_label(target.id)));
        self.scoped(body)?;
        self.frame.out.label(&continue_label(target.id));
        self.frame.out.dedent();
        self.frame.out.line("}");
        self.close_loop(target);
        Ok(())
    }

    fn infinite_loop(&mut self, node: &'p Node) -> CodegenResult<()> {
        let body = node
            .child(0)
            .ok_or_else(|| CodegenFault::malformed(kind_name(node), "missing body"))?;
        let target = self.open_loop(node)?;
        self.frame.out.line("for (;;) {");
        self.frame.out.indent();
        self.scoped(body)?;
        self.frame.out.label(&continue_label(target.id));
        self.frame.out.dedent();
        self.frame.out.line("}");
        self.close_loop(target);
        Ok(())
    }

    fn for_loop(&mut self, node: &'p Node) -> CodegenResult<()> {
        let [binding, iterable, body] = node.children.as_slice() else {
            return Err(CodegenFault::malformed(kind_name(node), "expected a binding, an iterable and a body"));
        };
        let Lowering::For(strategy) = node.lowering else {
            return Err(CodegenFault::malformed(kind_name(node), "no iteration strategy"));
        };
        let names: Vec<&'p Node> = match binding.kind {
            NodeKind::ExprList => binding.children.iter().collect(),
            _ => vec![binding],
        };
        if names.is_empty() {
            return Err(CodegenFault::malformed(kind_name(node), "no loop variable"));
        }

        let target = self.open_loop(node)?;
        self.frame.out.line("{");
        self.frame.out.indent();
        self.frame.scope.enter();
        match strategy {
            ForStrategy::Range => self.range_loop(&names, iterable, body, target)?,
            ForStrategy::FixedArray(len) => {
                self.sequence_loop(&names, iterable, body, target, Some(len))?;
            }
            ForStrategy::Slice | ForStrategy::String => self.sequence_loop(&names, iterable, body, target, None)?,
            ForStrategy::Coroutine => self.coroutine_loop(&names, iterable, body, target)?,
        }
        self.frame.scope.leave();
        self.frame.out.dedent();
        self.frame.out.line("}");
        self.close_loop(target);
        Ok(())
    }

    /// Inclusive range; the variable is compared before stepping so the last value never overflows.
    fn range_loop(
        &mut self,
        names: &[&'p Node],
        iterable: &'p Node,
        body: &'p Node,
        target: LoopTarget,
    ) -> CodegenResult<()> {
        let (Some(start), Some(end)) = (iterable.child(0), iterable.child(1)) else {
            return Err(CodegenFault::malformed(kind_name(iterable), "expected two bounds"));
        };
        let ty = iterable.ty;
        let bounds = self.ordered(vec![Operand::coerced(start, ty), Operand::coerced(end, ty)])?;
        let variable = self.declare_local(names[0].name(), ty, Some(&bounds[0]))?;
        let last = self.temp(ty, &bounds[1])?;
        let counter = match names.get(1) {
            Some(name) => Some(self.declare_local(name.name(), TypeIndex::Z64, Some("0"))?),
            None => None,
        };
        let step = match &counter {
            Some(counter) => format!("{variable} += 1, {counter} += 1"),
            None => format!("{variable} += 1"),
        };

        let out = &mut self.frame.out;
        out.line(&format!("for (; {variable} <= {last}; {step}) {{"));
        out.indent();
        self.scoped(body)?;
        let out = &mut self.frame.out;
        out.label(&continue_label(target.id));
        out.line(&format!("if ({variable} == {last}) goto {};", break_label(target.id)));
        out.dedent();
        out.line("}");
        Ok(())
    }

    /// Fixed-size arrays (`len` given), slices and strings, walked by index.
    fn sequence_loop(
        &mut self,
        names: &[&'p Node],
        iterable: &'p Node,
        body: &'p Node,
        target: LoopTarget,
        len: Option<u64>,
    ) -> CodegenResult<()> {
        let value = self.coerced(iterable, iterable.ty)?;
        let sequence = if is_place(self.registry(), iterable) {
            value
        } else {
            self.temp(iterable.ty, &value)?
        };
        let (data, length) = match len {
            Some(len) => (format!("{sequence}.data"), len.to_string()),
            None => (format!("{sequence}.pointeur"), format!("{sequence}.taille")),
        };
        let index = self.temp(TypeIndex::Z64, "0")?;

        let out = &mut self.frame.out;
        out.line(&format!("for (; {index} < {length}; {index} += 1) {{"));
        out.indent();
        self.frame.scope.enter();
        self.declare_local(names[0].name(), names[0].ty, Some(&format!("{data}[{index}]")))?;
        if let Some(name) = names.get(1) {
            self.declare_local(name.name(), TypeIndex::Z64, Some(&index))?;
        }
        self.scoped(body)?;
        self.frame.scope.leave();
        let out = &mut self.frame.out;
        out.label(&continue_label(target.id));
        out.dedent();
        out.line("}");
        Ok(())
    }

    /// Drive a coroutine through its state record until it reports being finished.
    fn coroutine_loop(
        &mut self,
        names: &[&'p Node],
        iterable: &'p Node,
        body: &'p Node,
        target: LoopTarget,
    ) -> CodegenResult<()> {
        let call = call_node(iterable)
            .ok_or_else(|| CodegenFault::malformed(kind_name(iterable), "expected a coroutine call"))?;
        let id = call
            .callee
            .ok_or_else(|| CodegenFault::UnboundCallee(call.name().to_string()))?;
        let function = self.function(id)?;
        let (_, arguments) = self.call_parts(call)?;

        let record = state_name(&function);
        let state_field = self.temp_name();
        if let Some(current) = self.frame.coroutine.as_mut() {
            current.embeds.push(record.clone());
        }
        let state = self.storage(&state_field, &record, None);
        for (param, argument) in function.params.iter().zip(&arguments) {
            self.frame
                .out
                .line(&format!("{state}.{} = {argument};", c_identifier(&param.name)));
        }
        let outputs = function.returns.len();
        let counter = if names.len() > outputs {
            Some(self.temp(TypeIndex::Z64, "0")?)
        } else {
            None
        };

        let out = &mut self.frame.out;
        out.line("for (;;) {");
        out.indent();
        out.line(&format!("{}(&{state});", function.linkage_name));
        out.line(&format!(
            "if ({state}.{}) goto {};",
            runtime::COROUTINE_FINISHED,
            break_label(target.id)
        ));
        self.frame.scope.enter();
        for (k, name) in names.iter().take(outputs).enumerate() {
            let value = format!("{state}.{}{k}", runtime::COROUTINE_OUTPUT_PREFIX);
            self.declare_local(name.name(), name.ty, Some(&value))?;
        }
        if let (Some(counter), Some(name)) = (&counter, names.get(outputs)) {
            self.declare_local(name.name(), TypeIndex::Z64, Some(counter))?;
        }
        self.scoped(body)?;
        self.frame.scope.leave();
        let out = &mut self.frame.out;
        out.label(&continue_label(target.id));
        if let Some(counter) = &counter {
            out.line(&format!("{counter} += 1;"));
        }
        out.dedent();
        out.line("}");
        Ok(())
    }

    fn loop_jump(&mut self, node: &'p Node) -> CodegenResult<()> {
        let number = node
            .label()
            .ok_or_else(|| CodegenFault::malformed(kind_name(node), "jump without a loop number"))?;
        let target = self
            .frame
            .loops
            .iter()
            .rev()
            .find(|l| l.number == number)
            .copied()
            .ok_or_else(|| CodegenFault::malformed(kind_name(node), format!("loop #{number} is not open")))?;
        self.run_defers_since(target.defer_depth)?;
        let label = if node.kind == NodeKind::Break {
            break_label(target.id)
        } else {
            continue_label(target.id)
        };
        self.frame.out.line(&format!("goto {label};"));
        Ok(())
    }
}
