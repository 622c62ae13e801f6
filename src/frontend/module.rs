//! Module table: per-file symbol sets consulted for name resolution.
//!
//! Each source file becomes one module with its function overload sets, compound types, globals,
//! export set and import list. Function and global descriptors live in compilation-wide tables and
//! are referenced by [`FunctionId`] / [`GlobalId`] from the AST.
//!
//! ## Notes
//!
//! - **Pending vs published**: declarations are registered during collection (so names resolve and
//!   redefinitions are caught), and published by their validation unit once their types are known.
//!   Readers that need a published entry get a `Wait` until then.
//! - The table is shared by all workers; reads are concurrent and inserts serialize.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;

use super::ast::Span;
use super::types::{CompoundId, TypeIndex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GlobalId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Publication {
    Pending,
    Published,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamInfo {
    pub name: String,
    pub ty: TypeIndex,
    pub variadic: bool,
    pub mutable: bool,
    pub employed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDescriptor {
    pub id: FunctionId,
    pub name: String,
    pub module: ModuleId,
    pub span: Span,
    pub params: Vec<ParamInfo>,
    pub returns: Vec<TypeIndex>,
    pub linkage_name: String,
    pub external: bool,
    pub c_variadic: bool,
    pub coroutine: bool,
    pub used: bool,
    pub state: Publication,
}

impl FunctionDescriptor {
    /// Trailing Kuri variadic parameter (`...T`).
    pub fn is_variadic(&self) -> bool {
        self.params.last().is_some_and(|p| p.variadic)
    }

    /// Multi-value functions return through output pointers.
    pub fn returns_multiple(&self) -> bool {
        self.returns.len() > 1
    }

    pub fn return_type(&self) -> TypeIndex {
        self.returns.first().copied().unwrap_or(TypeIndex::RIEN)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GlobalDescriptor {
    pub id: GlobalId,
    pub name: String,
    pub module: ModuleId,
    pub span: Span,
    pub ty: TypeIndex,
    pub mutable: bool,
    pub linkage_name: String,
    pub state: Publication,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompoundEntry {
    pub id: CompoundId,
    pub ty: TypeIndex,
    pub span: Span,
    pub state: Publication,
}

#[derive(Debug, Clone)]
pub struct ModuleEntry {
    pub id: ModuleId,
    pub name: String,
    pub path: String,
    pub source: Arc<str>,
    pub imports: Vec<ModuleId>,
    pub exports: HashSet<String>,
    functions: HashMap<String, Vec<FunctionId>>,
    compounds: HashMap<String, CompoundEntry>,
    globals: HashMap<String, GlobalId>,
}

#[derive(Debug, Default)]
pub struct ModuleTable {
    inner: RwLock<TableInner>,
}

#[derive(Debug, Default)]
struct TableInner {
    modules: Vec<ModuleEntry>,
    by_name: HashMap<String, ModuleId>,
    functions: Vec<FunctionDescriptor>,
    globals: Vec<GlobalDescriptor>,
}

impl TableInner {
    fn module(&self, id: ModuleId) -> Option<&ModuleEntry> {
        self.modules.get(id.0 as usize)
    }

    fn module_mut(&mut self, id: ModuleId) -> Option<&mut ModuleEntry> {
        self.modules.get_mut(id.0 as usize)
    }
}

impl ModuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------------
    // Modules
    // ------------------------------------------------------------------------

    /// Add a module; returns the existing id as an error if the name is taken.
    pub fn add_module(&self, name: &str, path: &str, source: &str) -> Result<ModuleId, ModuleId> {
        let mut inner = self.inner.write();
        if let Some(existing) = inner.by_name.get(name) {
            return Err(*existing);
        }
        let id = ModuleId(inner.modules.len() as u32);
        inner.modules.push(ModuleEntry {
            id,
            name: name.to_string(),
            path: path.to_string(),
            source: Arc::from(source),
            imports: Vec::new(),
            exports: HashSet::new(),
            functions: HashMap::new(),
            compounds: HashMap::new(),
            globals: HashMap::new(),
        });
        inner.by_name.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn module_id(&self, name: &str) -> Option<ModuleId> {
        self.inner.read().by_name.get(name).copied()
    }

    pub fn module(&self, id: ModuleId) -> Option<ModuleEntry> {
        self.inner.read().module(id).cloned()
    }

    pub fn module_name(&self, id: ModuleId) -> String {
        self.inner
            .read()
            .module(id)
            .map(|m| m.name.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn add_import(&self, module: ModuleId, imported: ModuleId) {
        let mut inner = self.inner.write();
        if let Some(entry) = inner.module_mut(module) {
            if !entry.imports.contains(&imported) {
                entry.imports.push(imported);
            }
        }
    }

    pub fn imports(&self, module: ModuleId) -> Vec<ModuleId> {
        self.inner
            .read()
            .module(module)
            .map(|m| m.imports.clone())
            .unwrap_or_default()
    }

    pub fn is_imported(&self, from: ModuleId, target: ModuleId) -> bool {
        self.inner
            .read()
            .module(from)
            .is_some_and(|m| m.imports.contains(&target))
    }

    pub fn set_exports(&self, module: ModuleId, names: impl IntoIterator<Item = String>) {
        if let Some(entry) = self.inner.write().module_mut(module) {
            entry.exports.extend(names);
        }
    }

    pub fn is_exported(&self, module: ModuleId, name: &str) -> bool {
        self.inner
            .read()
            .module(module)
            .is_some_and(|m| m.exports.contains(name))
    }

    /// Does the module declare anything (function, compound or global) under `name`?
    pub fn declares(&self, module: ModuleId, name: &str) -> bool {
        self.inner.read().module(module).is_some_and(|m| {
            m.functions.contains_key(name) || m.compounds.contains_key(name) || m.globals.contains_key(name)
        })
    }

    // ------------------------------------------------------------------------
    // Functions
    // ------------------------------------------------------------------------

    /// Register a function in its overload set; its signature is published later.
    pub fn register_function(
        &self,
        module: ModuleId,
        name: &str,
        span: Span,
        flags: FunctionFlags,
    ) -> FunctionId {
        let mut inner = self.inner.write();
        let id = FunctionId(inner.functions.len() as u32);
        inner.functions.push(FunctionDescriptor {
            id,
            name: name.to_string(),
            module,
            span,
            params: Vec::new(),
            returns: Vec::new(),
            linkage_name: String::new(),
            external: flags.external,
            c_variadic: flags.c_variadic,
            coroutine: flags.coroutine,
            used: false,
            state: Publication::Pending,
        });
        if let Some(entry) = inner.module_mut(module) {
            entry.functions.entry(name.to_string()).or_default().push(id);
        }
        id
    }

    /// Publish the resolved signature of a function.
    ///
    /// ## Errors
    /// - The id of an already published overload with the same parameter types.
    pub fn publish_function(
        &self,
        id: FunctionId,
        params: Vec<ParamInfo>,
        returns: Vec<TypeIndex>,
        linkage_name: String,
    ) -> Result<(), FunctionId> {
        let mut inner = self.inner.write();
        let Some(current) = inner.functions.get(id.0 as usize) else {
            return Ok(());
        };
        if current.state == Publication::Published {
            return Ok(());
        }
        let (module, name) = (current.module, current.name.clone());
        let siblings = inner
            .module(module)
            .and_then(|m| m.functions.get(&name))
            .cloned()
            .unwrap_or_default();
        for sibling in siblings {
            if sibling == id {
                continue;
            }
            let Some(other) = inner.functions.get(sibling.0 as usize) else {
                continue;
            };
            let same_params = other.params.len() == params.len()
                && other.params.iter().zip(&params).all(|(a, b)| a.ty == b.ty);
            if other.state == Publication::Published && same_params {
                return Err(sibling);
            }
        }
        if let Some(function) = inner.functions.get_mut(id.0 as usize) {
            function.params = params;
            function.returns = returns;
            function.linkage_name = linkage_name;
            function.state = Publication::Published;
        }
        Ok(())
    }

    pub fn function(&self, id: FunctionId) -> Option<FunctionDescriptor> {
        self.inner.read().functions.get(id.0 as usize).cloned()
    }

    pub fn functions(&self) -> Vec<FunctionDescriptor> {
        self.inner.read().functions.clone()
    }

    /// Overload set of `name` in `module`, in declaration order.
    pub fn overloads(&self, module: ModuleId, name: &str) -> Vec<FunctionId> {
        self.inner
            .read()
            .module(module)
            .and_then(|m| m.functions.get(name))
            .cloned()
            .unwrap_or_default()
    }

    /// Are all overloads of `name` in `module` published?
    pub fn functions_published(&self, module: ModuleId, name: &str) -> bool {
        let inner = self.inner.read();
        let Some(ids) = inner.module(module).and_then(|m| m.functions.get(name)) else {
            return true;
        };
        ids.iter().all(|id| {
            inner
                .functions
                .get(id.0 as usize)
                .is_some_and(|f| f.state == Publication::Published)
        })
    }

    pub fn mark_used(&self, id: FunctionId) {
        if let Some(function) = self.inner.write().functions.get_mut(id.0 as usize) {
            function.used = true;
        }
    }

    // ------------------------------------------------------------------------
    // Compounds
    // ------------------------------------------------------------------------

    /// Register a struct or enum name; returns the previous declaration's span on conflict.
    pub fn register_compound(
        &self,
        module: ModuleId,
        name: &str,
        id: CompoundId,
        ty: TypeIndex,
        span: Span,
    ) -> Result<(), Span> {
        let mut inner = self.inner.write();
        let Some(entry) = inner.module_mut(module) else {
            return Ok(());
        };
        if let Some(existing) = entry.compounds.get(name) {
            return Err(existing.span);
        }
        entry.compounds.insert(
            name.to_string(),
            CompoundEntry {
                id,
                ty,
                span,
                state: Publication::Pending,
            },
        );
        Ok(())
    }

    pub fn compound(&self, module: ModuleId, name: &str) -> Option<CompoundEntry> {
        self.inner
            .read()
            .module(module)
            .and_then(|m| m.compounds.get(name))
            .copied()
    }

    /// Find the module that declared the compound with registry id `id`.
    pub fn compound_owner(&self, id: CompoundId) -> Option<(ModuleId, String)> {
        let inner = self.inner.read();
        inner.modules.iter().find_map(|m| {
            m.compounds
                .iter()
                .find(|(_, entry)| entry.id == id)
                .map(|(name, _)| (m.id, name.clone()))
        })
    }

    pub fn publish_compound(&self, module: ModuleId, name: &str) {
        if let Some(entry) = self
            .inner
            .write()
            .module_mut(module)
            .and_then(|m| m.compounds.get_mut(name))
        {
            entry.state = Publication::Published;
        }
    }

    pub fn compound_published(&self, module: ModuleId, name: &str) -> bool {
        self.compound(module, name)
            .is_none_or(|entry| entry.state == Publication::Published)
    }

    // ------------------------------------------------------------------------
    // Globals
    // ------------------------------------------------------------------------

    /// Register a global; returns the previous declaration's span on conflict.
    pub fn register_global(&self, module: ModuleId, name: &str, span: Span, mutable: bool) -> Result<GlobalId, Span> {
        let mut inner = self.inner.write();
        if let Some(existing) = inner
            .module(module)
            .and_then(|m| m.globals.get(name))
            .and_then(|id| inner.globals.get(id.0 as usize))
        {
            return Err(existing.span);
        }
        let id = GlobalId(inner.globals.len() as u32);
        inner.globals.push(GlobalDescriptor {
            id,
            name: name.to_string(),
            module,
            span,
            ty: TypeIndex::UNRESOLVED,
            mutable,
            linkage_name: String::new(),
            state: Publication::Pending,
        });
        if let Some(entry) = inner.module_mut(module) {
            entry.globals.insert(name.to_string(), id);
        }
        Ok(id)
    }

    pub fn publish_global(&self, id: GlobalId, ty: TypeIndex, linkage_name: String) {
        if let Some(global) = self.inner.write().globals.get_mut(id.0 as usize) {
            global.ty = ty;
            global.linkage_name = linkage_name;
            global.state = Publication::Published;
        }
    }

    pub fn global(&self, id: GlobalId) -> Option<GlobalDescriptor> {
        self.inner.read().globals.get(id.0 as usize).cloned()
    }

    pub fn global_named(&self, module: ModuleId, name: &str) -> Option<GlobalDescriptor> {
        let inner = self.inner.read();
        inner
            .module(module)
            .and_then(|m| m.globals.get(name))
            .and_then(|id| inner.globals.get(id.0 as usize))
            .cloned()
    }

    pub fn global_published(&self, module: ModuleId, name: &str) -> bool {
        self.global_named(module, name)
            .is_none_or(|g| g.state == Publication::Published)
    }

    pub fn globals(&self) -> Vec<GlobalDescriptor> {
        self.inner.read().globals.clone()
    }
}

/// Declaration flags carried into a [`FunctionDescriptor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FunctionFlags {
    pub external: bool,
    pub coroutine: bool,
    pub c_variadic: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_with_module() -> (ModuleTable, ModuleId) {
        let table = ModuleTable::new();
        let id = table.add_module("principal", "principal.kuri", "").unwrap();
        (table, id)
    }

    fn param(ty: TypeIndex) -> ParamInfo {
        ParamInfo {
            name: "x".into(),
            ty,
            variadic: false,
            mutable: false,
            employed: false,
        }
    }

    #[test]
    fn test_duplicate_module_name() {
        let (table, id) = table_with_module();
        assert_eq!(table.add_module("principal", "autre.kuri", ""), Err(id));
    }

    #[test]
    fn test_overload_set_publication() {
        let (table, module) = table_with_module();
        let a = table.register_function(module, "f", Span::default(), FunctionFlags::default());
        let b = table.register_function(module, "f", Span::default(), FunctionFlags::default());
        assert_eq!(table.overloads(module, "f"), vec![a, b]);
        assert!(!table.functions_published(module, "f"));

        table.publish_function(a, vec![param(TypeIndex::Z32)], vec![], "fa".into()).unwrap();
        assert!(!table.functions_published(module, "f"));
        table.publish_function(b, vec![param(TypeIndex::R64)], vec![], "fb".into()).unwrap();
        assert!(table.functions_published(module, "f"));
        assert!(table.functions_published(module, "inconnue"));
    }

    #[test]
    fn test_identical_overloads_conflict() {
        let (table, module) = table_with_module();
        let a = table.register_function(module, "f", Span::default(), FunctionFlags::default());
        let b = table.register_function(module, "f", Span::default(), FunctionFlags::default());
        table.publish_function(a, vec![param(TypeIndex::Z32)], vec![], "fa".into()).unwrap();
        assert_eq!(table.publish_function(b, vec![param(TypeIndex::Z32)], vec![], "fb".into()), Err(a));
    }

    #[test]
    fn test_global_redefinition_reports_previous_span() {
        let (table, module) = table_with_module();
        let first = Span::new(1, 1, 3);
        table.register_global(module, "compteur", first, true).unwrap();
        assert_eq!(table.register_global(module, "compteur", Span::new(2, 1, 3), true), Err(first));
        assert!(!table.global_published(module, "compteur"));
    }

    #[test]
    fn test_imports_and_exports() {
        let (table, main) = table_with_module();
        let lib = table.add_module("outils", "outils.kuri", "").unwrap();
        table.add_import(main, lib);
        table.set_exports(lib, ["aide".to_string()]);
        assert!(table.is_imported(main, lib));
        assert!(!table.is_imported(lib, main));
        assert!(table.is_exported(lib, "aide"));
        assert!(!table.is_exported(lib, "cachee"));
    }
}
