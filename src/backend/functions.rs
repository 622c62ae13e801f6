//! Function lowering.
//!
//! A plain function keeps its shape in C, except that several results become trailing
//! `T *__retK` output parameters and a `void` return. A coroutine becomes
//! `void L(__etat_coro_L *__etat)`: its parameters, outputs, locals and temporaries live in the
//! state record, and a `switch` over the resume index jumps back to the last `retiens`.

use std::collections::{HashMap, HashSet};

use kuri_core::runtime;

use super::emitter::CEmitter;
use super::errors::{CodegenFault, CodegenResult};
use super::types::declaration;
use super::{CGenerator, Local, RawParam, StateRecord, pointer_spelling};
use crate::frontend::ast::{Access, Lowering, Node, NodeKind};
use crate::frontend::mangle::c_identifier;
use crate::frontend::module::{FunctionDescriptor, GlobalDescriptor, GlobalId, ParamInfo};
use crate::frontend::types::{TypeIndex, TypeToken};

/// Type name of the state record of a coroutine.
pub(super) fn state_name(function: &FunctionDescriptor) -> String {
    format!("{}_{}", runtime::COROUTINE_STATE_PREFIX, function.linkage_name)
}

impl<'p> CGenerator<'p> {
    /// `T name(params)`, shared by prototypes and definitions.
    pub(super) fn signature(&mut self, function: &FunctionDescriptor) -> CodegenResult<String> {
        if function.coroutine {
            return Ok(format!(
                "void {}({} *{})",
                function.linkage_name,
                state_name(function),
                runtime::COROUTINE_STATE_PARAM
            ));
        }
        let mut params = Vec::with_capacity(function.params.len() + function.returns.len());
        for param in &function.params {
            let c_type = self.c_type(param.ty)?;
            params.push(declaration(&c_type, &c_identifier(&param.name)));
        }
        let result = match function.returns.as_slice() {
            [] => "void".to_string(),
            [single] => self.c_type(*single)?,
            several => {
                for (k, &ty) in several.iter().enumerate() {
                    let c_type = self.c_type(ty)?;
                    params.push(declaration(
                        &pointer_spelling(&c_type),
                        &format!("{}{k}", runtime::RETURN_SLOT_PREFIX),
                    ));
                }
                "void".to_string()
            }
        };
        if function.c_variadic {
            params.push("...".to_string());
        }
        let params = if params.is_empty() {
            "void".to_string()
        } else {
            params.join(", ")
        };
        Ok(declaration(&result, &format!("{}({params})", function.linkage_name)))
    }

    #[tracing::instrument(skip_all, fields(function = %function.name, coroutine = function.coroutine))]
    pub(super) fn lower_function(&mut self, function: &FunctionDescriptor, body: &'p Node) -> CodegenResult<String> {
        if function.coroutine {
            return self.lower_coroutine(function, body);
        }
        let header = self.signature(function)?;
        self.reset_frame(function.returns.clone());
        self.frame.scope.enter();
        for param in &function.params {
            self.bind_param(param, c_identifier(&param.name))?;
        }
        self.function_body(body)?;
        self.frame.scope.leave();

        let frame = std::mem::take(&mut self.frame);
        Ok(format!("{header} {{\n{}}}\n", frame.out.finish()))
    }

    fn lower_coroutine(&mut self, function: &FunctionDescriptor, body: &'p Node) -> CodegenResult<String> {
        let header = self.signature(function)?;
        let state = runtime::COROUTINE_STATE_PARAM;
        self.reset_frame(function.returns.clone());

        let mut record = StateRecord {
            name: state_name(function),
            fields: vec![
                (runtime::COROUTINE_RESUME.to_string(), "int32_t".to_string()),
                (runtime::COROUTINE_FINISHED.to_string(), "bool".to_string()),
            ],
            embeds: Vec::new(),
        };
        self.frame.scope.enter();
        for param in &function.params {
            let c_name = c_identifier(&param.name);
            record.fields.push((c_name.clone(), self.c_type(param.ty)?));
            self.bind_param(param, format!("{state}->{c_name}"))?;
        }
        for (k, &ty) in function.returns.iter().enumerate() {
            let c_type = self.c_type(ty)?;
            record
                .fields
                .push((format!("{}{k}", runtime::COROUTINE_OUTPUT_PREFIX), c_type));
        }
        self.frame.coroutine = Some(record);
        self.function_body(body)?;
        self.frame.scope.leave();
        self.frame
            .out
            .line(&format!("{state}->{} = 1;", runtime::COROUTINE_FINISHED));
        self.frame.out.line("return;");

        let frame = std::mem::take(&mut self.frame);
        let record = frame
            .coroutine
            .ok_or_else(|| CodegenFault::malformed("coroutine", "state record lost while lowering"))?;
        if record.embeds.contains(&record.name) {
            return Err(CodegenFault::RecursiveCoroutine(function.name.clone()));
        }

        let mut dispatch = CEmitter::new(self.config.indent_width);
        dispatch.indent();
        dispatch.line(&format!("switch ({state}->{}) {{", runtime::COROUTINE_RESUME));
        dispatch.line("case 0: break;");
        for point in 1..=frame.resume_points {
            dispatch.line(&format!("case {point}: goto {}_{point};", runtime::COROUTINE_RESUME_LABEL));
        }
        dispatch.line("}");
        self.coroutines.push(record);
        tracing::debug!(resume_points = frame.resume_points, "lowered coroutine");
        Ok(format!("{header} {{\n{}{}}}\n", dispatch.finish(), frame.out.finish()))
    }

    /// Bind a parameter reachable at `place`. Reference parameters are read through the pointer.
    fn bind_param(&mut self, param: &ParamInfo, place: String) -> CodegenResult<()> {
        let registry = self.registry();
        let local = match registry.base_token(param.ty)? {
            TypeToken::Reference => Local {
                place: format!("(*{place})"),
                ty: registry.pointee(param.ty)?,
            },
            _ => Local {
                place: place.clone(),
                ty: param.ty,
            },
        };
        self.frame
            .params
            .insert(param.name.clone(), RawParam { place, ty: param.ty });
        self.frame.scope.push(param.name.clone(), local);
        Ok(())
    }

    fn function_body(&mut self, body: &'p Node) -> CodegenResult<()> {
        if body.kind == NodeKind::Block {
            self.block_contents(body)
        } else {
            self.statement(body)
        }
    }

    /// `typedef struct __etat_coro_L {...} __etat_coro_L;` for every lowered coroutine, records
    /// embedded by value first.
    pub(super) fn state_records(&self) -> CodegenResult<String> {
        let by_name: HashMap<&str, &StateRecord> = self.coroutines.iter().map(|r| (r.name.as_str(), r)).collect();
        let mut out = CEmitter::new(self.config.indent_width);
        let mut done = HashSet::new();
        let mut active = HashSet::new();
        for record in &self.coroutines {
            emit_record(record, &by_name, &mut done, &mut active, &mut out)?;
        }
        Ok(out.finish())
    }

    /// Global storage and the function assigning their initial values.
    ///
    /// Initializers run in dependency order: a global whose initializer reads another global runs
    /// after it, otherwise input order is kept.
    pub(super) fn lower_globals(&mut self, globals: &[(GlobalDescriptor, &'p Node)]) -> CodegenResult<(String, String)> {
        let mut storage = CEmitter::new(self.config.indent_width);
        for (global, _) in globals {
            let c_type = self.c_type(global.ty)?;
            storage.line(&format!("static {};", declaration(&c_type, &global.linkage_name)));
        }

        self.reset_frame(Vec::new());
        self.frame.scope.enter();
        self.frame.defers.enter();
        for index in initialization_order(globals) {
            let (global, node) = &globals[index];
            if node.kind != NodeKind::Assignment {
                continue;
            }
            let value = node.child(1).ok_or_else(|| {
                CodegenFault::malformed("global", format!("`{}` has no initial value", global.name))
            })?;
            let value = self.coerced(value, global.ty)?;
            self.frame.out.line(&format!("{} = {value};", global.linkage_name));
        }
        self.frame.scope.leave();
        let frame = std::mem::take(&mut self.frame);
        let initializer = format!("void {}(void) {{\n{}}}\n", runtime::GLOBALS_INIT, frame.out.finish());
        Ok((storage.finish(), initializer))
    }

    /// `int main(void)` running the global initializers, then the entry point.
    pub(super) fn main_wrapper(&self, entry: &FunctionDescriptor) -> String {
        let mut out = CEmitter::new(self.config.indent_width);
        out.block("int main(void)", |out| {
            out.line(&format!("{}();", runtime::GLOBALS_INIT));
            if entry.returns.first() == Some(&TypeIndex::Z32) {
                out.line(&format!("return {}();", entry.linkage_name));
            } else {
                out.line(&format!("{}();", entry.linkage_name));
                out.line("return 0;");
            }
        });
        out.finish()
    }
}

fn emit_record<'r>(
    record: &'r StateRecord,
    by_name: &HashMap<&str, &'r StateRecord>,
    done: &mut HashSet<&'r str>,
    active: &mut HashSet<&'r str>,
    out: &mut CEmitter,
) -> CodegenResult<()> {
    let name = record.name.as_str();
    if done.contains(name) {
        return Ok(());
    }
    if !active.insert(name) {
        return Err(CodegenFault::RecursiveCoroutine(name.to_string()));
    }
    for embedded in &record.embeds {
        let inner = by_name.get(embedded.as_str()).ok_or_else(|| {
            CodegenFault::malformed("coroutine", format!("state record `{embedded}` was never lowered"))
        })?;
        emit_record(inner, by_name, done, active, out)?;
    }
    active.remove(name);
    done.insert(name);

    out.line(&format!("typedef struct {name} {{"));
    out.indent();
    for (field, c_type) in &record.fields {
        out.line(&format!("{};", declaration(c_type, field)));
    }
    out.dedent();
    out.line(&format!("}} {name};"));
    out.blank_line();
    Ok(())
}

/// Indices of `globals` with every global after the globals its initializer reads.
fn initialization_order(globals: &[(GlobalDescriptor, &Node)]) -> Vec<usize> {
    let position: HashMap<GlobalId, usize> = globals.iter().enumerate().map(|(i, (g, _))| (g.id, i)).collect();
    let mut order = Vec::with_capacity(globals.len());
    let mut state = vec![Visit::Pending; globals.len()];

    fn visit(
        index: usize,
        globals: &[(GlobalDescriptor, &Node)],
        position: &HashMap<GlobalId, usize>,
        state: &mut [Visit],
        order: &mut Vec<usize>,
    ) {
        if state[index] != Visit::Pending {
            return;
        }
        state[index] = Visit::Active;
        let mut reads = Vec::new();
        if let Some(value) = globals[index].1.child(1) {
            globals_read(value, &mut reads);
        }
        for id in reads {
            if let Some(&dependency) = position.get(&id) {
                visit(dependency, globals, position, state, order);
            }
        }
        state[index] = Visit::Done;
        order.push(index);
    }

    for index in 0..globals.len() {
        visit(index, globals, &position, &mut state, &mut order);
    }
    order
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    Pending,
    Active,
    Done,
}

fn globals_read(node: &Node, reads: &mut Vec<GlobalId>) {
    if let Lowering::Access(Access::Global(id)) = node.lowering {
        reads.push(id);
    }
    for child in &node.children {
        globals_read(child, reads);
    }
}
