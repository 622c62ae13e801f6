//! Program-level lowering and assembly of the translation unit.

use kuri_core::runtime;

use super::emitter::CEmitter;
use super::errors::{CodegenFault, CodegenResult};
use super::CGenerator;
use crate::config::CompileConfig;
use crate::frontend::ast::{Declaration, Node};
use crate::frontend::module::{FunctionDescriptor, GlobalDescriptor};
use crate::frontend::scheduler::ValidatedProgram;
use crate::frontend::validator::UnitEntity;

/// Lower a validated program to one C translation unit.
///
/// Programs that still carry diagnostics are refused; lowering assumes every annotation is in
/// place.
#[tracing::instrument(skip_all, fields(units = program.units.len(), reflection = config.emit_reflection))]
pub fn generate(program: &ValidatedProgram, config: &CompileConfig) -> CodegenResult<String> {
    if program.has_errors() {
        return Err(CodegenFault::NotValidated(program.diagnostics().len()));
    }
    CGenerator::new(program, config).emit_program()
}

impl<'p> CGenerator<'p> {
    fn emit_program(mut self) -> CodegenResult<String> {
        let program = self.program;
        let mut functions: Vec<(FunctionDescriptor, Option<&'p Node>)> = Vec::new();
        let mut globals: Vec<(GlobalDescriptor, &'p Node)> = Vec::new();
        for (unit, declaration) in program.validated() {
            match (unit.entity, declaration) {
                (Some(UnitEntity::Function(id)), Declaration::Function(decl)) => {
                    functions.push((self.function(id)?, decl.body.as_ref()));
                }
                (Some(UnitEntity::Global(id)), Declaration::Global(node)) => {
                    let global = program.modules.global(id).ok_or(CodegenFault::MissingGlobal(id.0))?;
                    globals.push((global, node));
                }
                _ => {}
            }
        }

        let mut prototypes = CEmitter::new(self.config.indent_width);
        let mut bodies = Vec::new();
        for (function, body) in &functions {
            let signature = self.signature(function)?;
            prototypes.line(&format!("{signature};"));
            if let (Some(body), false) = (*body, function.external) {
                bodies.push(self.lower_function(function, body)?);
            }
        }
        let (storage, initializer) = self.lower_globals(&globals)?;

        let entry = functions
            .iter()
            .map(|(f, _)| f)
            .find(|f| f.name == self.config.entry_point && !f.external && !f.coroutine);
        let wrapper = match entry {
            Some(entry) if self.config.emit_main_wrapper => self.main_wrapper(entry),
            _ => String::new(),
        };

        let registry = &program.registry;
        let reflection = if self.config.emit_reflection {
            self.reflection.emit(registry, self.config.indent_width)?
        } else {
            String::new()
        };
        let states = self.state_records()?;
        let sections = self.types.sections(registry, self.config.indent_width)?;

        let mut file = String::from(runtime::PRELUDE);
        let parts = [
            sections.forward,
            sections.functions,
            sections.bodies,
            states,
            sections.constants,
            reflection,
            storage,
            prototypes.finish(),
        ]
        .into_iter()
        .chain(bodies)
        .chain([initializer, wrapper]);
        for part in parts {
            if part.is_empty() {
                continue;
            }
            file.push('\n');
            file.push_str(&part);
        }
        tracing::debug!(
            functions = functions.len(),
            globals = globals.len(),
            coroutines = self.coroutines.len(),
            bytes = file.len(),
            "generated C translation unit"
        );
        Ok(file)
    }
}
