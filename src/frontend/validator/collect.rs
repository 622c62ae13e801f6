//! Collection pass: register every module, import, export and declaration name before any unit
//! runs, so lookups can tell "unknown" apart from "not published yet".

use crate::frontend::ast::{Declaration, NodeKind, SourceFile, Span};
use crate::frontend::diagnostics::{Diagnostic, DiagnosticKind, errors};
use crate::frontend::module::{FunctionFlags, FunctionId, GlobalId, ModuleId, ModuleTable};
use crate::frontend::types::{CompoundId, TypeRegistry};

/// Registry entry a declaration unit is responsible for publishing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitEntity {
    Function(FunctionId),
    Compound(CompoundId),
    Global(GlobalId),
}

/// One schedulable declaration.
#[derive(Debug, Clone)]
pub struct CollectedUnit {
    /// Index of the file in the input list.
    pub file: usize,
    pub module: ModuleId,
    /// Index of the declaration in its file.
    pub index: usize,
    /// `None` when the declaration could not be registered.
    pub entity: Option<UnitEntity>,
    /// Registration failure, reported as the unit's diagnostic.
    pub failure: Option<Diagnostic>,
}

/// Register `files` into `modules` and `registry`.
///
/// Returns one unit per declaration in input order, plus file-level diagnostics (duplicate modules,
/// unknown imports, exports naming nothing) tagged with the index of their file.
#[tracing::instrument(skip_all, fields(files = files.len()))]
pub fn collect(
    files: &[SourceFile],
    registry: &TypeRegistry,
    modules: &ModuleTable,
) -> (Vec<CollectedUnit>, Vec<(usize, Diagnostic)>) {
    let mut problems = Vec::new();
    let mut ids: Vec<Option<ModuleId>> = Vec::with_capacity(files.len());

    for (file_index, file) in files.iter().enumerate() {
        match modules.add_module(&file.module, &file.path, &file.source) {
            Ok(id) => ids.push(Some(id)),
            Err(existing) => {
                let previous = modules.module(existing).map(|m| m.path).unwrap_or_default();
                problems.push((
                    file_index,
                    Diagnostic::new(
                        DiagnosticKind::Redefinition,
                        format!("redefinition of module `{}`", file.module),
                        Span::default(),
                    )
                    .with_note(format!("`{}` is already defined by `{previous}`", file.module)),
                ));
                ids.push(None);
            }
        }
    }

    for (file_index, file) in files.iter().enumerate() {
        let Some(module) = ids[file_index] else {
            continue;
        };
        for import in &file.imports {
            match modules.module_id(import) {
                Some(target) if target != module => modules.add_import(module, target),
                Some(_) => {}
                None => problems.push((file_index, errors::unknown_symbol("module", import, Span::default()))),
            }
        }
    }

    let mut units = Vec::new();
    for (file_index, file) in files.iter().enumerate() {
        let Some(module) = ids[file_index] else {
            continue;
        };
        for (index, declaration) in file.declarations.iter().enumerate() {
            let registered = register(declaration, module, &file.module, registry, modules);
            let (entity, failure) = match registered {
                Ok(entity) => (Some(entity), None),
                Err(diagnostic) => (None, Some(diagnostic)),
            };
            units.push(CollectedUnit {
                file: file_index,
                module,
                index,
                entity,
                failure,
            });
        }
    }

    // Exports are checked once every name of the module is known.
    for (file_index, file) in files.iter().enumerate() {
        let Some(module) = ids[file_index] else {
            continue;
        };
        for name in &file.exports {
            if !modules.declares(module, name) {
                problems.push((
                    file_index,
                    errors::unknown_symbol("exported symbol", name, Span::default())
                        .with_note(format!("`{}` declares no `{name}`", file.module)),
                ));
            }
        }
        modules.set_exports(module, file.exports.iter().cloned());
    }

    tracing::debug!(units = units.len(), modules = modules.len(), "collected declarations");
    (units, problems)
}

fn register(
    declaration: &Declaration,
    module: ModuleId,
    module_name: &str,
    registry: &TypeRegistry,
    modules: &ModuleTable,
) -> Result<UnitEntity, Diagnostic> {
    let name = declaration.name();
    if matches!(declaration, Declaration::Struct(_) | Declaration::Enum(_)) {
        if let Some(previous) = modules.compound(module, &name.text) {
            return Err(errors::redefinition("type", &name.text, name.span, previous.span));
        }
    }
    match declaration {
        Declaration::Function(function) => {
            let flags = FunctionFlags {
                external: function.external,
                coroutine: function.coroutine,
                c_variadic: function.c_variadic,
            };
            Ok(UnitEntity::Function(modules.register_function(
                module,
                &name.text,
                name.span,
                flags,
            )))
        }
        Declaration::Struct(structure) => {
            let (id, ty) = registry.declare_struct(&name.text, module_name, structure.external);
            modules
                .register_compound(module, &name.text, id, ty, name.span)
                .map_err(|previous| errors::redefinition("type", &name.text, name.span, previous))?;
            Ok(UnitEntity::Compound(id))
        }
        Declaration::Enum(_) => {
            let (id, ty) = registry.declare_enum(&name.text, module_name);
            modules
                .register_compound(module, &name.text, id, ty, name.span)
                .map_err(|previous| errors::redefinition("type", &name.text, name.span, previous))?;
            Ok(UnitEntity::Compound(id))
        }
        Declaration::Global(node) => {
            let target = match node.kind {
                NodeKind::Assignment => node.child(0).unwrap_or(node),
                _ => node,
            };
            if !target.flags.declaration || target.kind != NodeKind::Identifier {
                return Err(errors::type_mismatch(
                    "only declarations are allowed at module level",
                    node.span(),
                ));
            }
            modules
                .register_global(module, &name.text, name.span, target.flags.mutable)
                .map(UnitEntity::Global)
                .map_err(|previous| errors::global_redefinition(&name.text, name.span, previous))
        }
    }
}
