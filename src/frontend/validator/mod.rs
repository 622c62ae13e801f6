//! Semantic validator for Kuri declarations.
//!
//! Resolves names, types, overloads and control flow over one declaration at a time, filling the
//! resolution slots of the AST ([`Node::ty`], coercions, bound callees, lowering hints).
//!
//! ## Notes
//!
//! - **Units**: the scheduler validates each declaration as an independent unit. A [`Validator`] is
//!   created per run of a unit and holds the explicit context: current module, current function,
//!   `nonsûr` / `diffère` depth, the block [`Scope`] and the loop stack.
//! - **Suspension**: whenever a needed declaration is registered but not yet published, validation
//!   returns `Err(Halt::Wait(..))`. The unit is rerun from a pristine copy of its declaration once
//!   the fact is published, so annotations written before the wait are simply discarded.
//! - **Errors** are terminal for the unit; other units are unaffected.
//!
//! ## See also
//!
//! - [`scheduler`](super::scheduler) – runs units and handles parking
//! - [`types`](super::types) – compatibility rules shared by every check

mod calls;
mod collect;
mod decl;
mod expr;
mod stmt;

#[cfg(test)]
mod tests;

pub use collect::{CollectedUnit, UnitEntity, collect};

use kuri_core::lang::operators::{self, BinaryOpId, OperatorCategory, UnaryOpId};
use kuri_core::lang::primitives;
use kuri_core::runtime;

use crate::frontend::ast::{Access, Node, NodeKind, Span, TypeExpr};
use crate::frontend::diagnostics::errors;
use crate::frontend::module::{ModuleId, ModuleTable};
use crate::frontend::scope::Scope;
use crate::frontend::suspension::{Halt, Validation, WaitReason};
use crate::frontend::types::{Coercion, Signature, SourceKind, TypeError, TypeIndex, TypeRegistry};

/// A local name in scope.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub ty: TypeIndex,
    pub mutable: bool,
    pub access: Access,
    pub span: Span,
}

#[derive(Debug, Clone)]
struct FunctionContext {
    name: String,
    returns: Vec<TypeIndex>,
    coroutine: bool,
}

#[derive(Debug, Clone)]
struct LoopFrame {
    label: Option<String>,
    number: usize,
    /// `diffère` nesting when the loop was entered.
    defer_depth: usize,
}

/// Validation context of one unit.
pub struct Validator<'a> {
    registry: &'a TypeRegistry,
    modules: &'a ModuleTable,
    module: ModuleId,
    entry_point: &'a str,
    function: Option<FunctionContext>,
    unsafe_depth: usize,
    defer_depth: usize,
    scope: Scope<Binding>,
    loops: Vec<LoopFrame>,
    loop_counter: usize,
}

impl<'a> Validator<'a> {
    pub fn new(registry: &'a TypeRegistry, modules: &'a ModuleTable, module: ModuleId, entry_point: &'a str) -> Self {
        Self {
            registry,
            modules,
            module,
            entry_point,
            function: None,
            unsafe_depth: 0,
            defer_depth: 0,
            scope: Scope::new(),
            loops: Vec::new(),
            loop_counter: 0,
        }
    }

    pub(crate) fn display(&self, ty: TypeIndex) -> String {
        self.registry.display(ty)
    }

    pub(crate) fn module_name(&self) -> String {
        self.modules.module_name(self.module)
    }

    // ------------------------------------------------------------------------
    // Type expressions
    // ------------------------------------------------------------------------

    /// Resolve a parsed type expression.
    ///
    /// A compound that is registered but unpublished parks the unit, unless `indirect` is set (the
    /// type sits behind a pointer, a reference or a slice, where only its identity is needed).
    pub(crate) fn resolve_type(&self, expr: &TypeExpr, span: Span, indirect: bool) -> Validation<TypeIndex> {
        match expr {
            TypeExpr::Named(name) => self.resolve_named_type(name, span, indirect),
            TypeExpr::Pointer(inner) => {
                let inner = self.resolve_type(inner, span, true)?;
                self.intern(self.registry.pointer_to(inner), span)
            }
            TypeExpr::Reference(inner) => {
                let inner = self.resolve_type(inner, span, true)?;
                self.intern(self.registry.reference_to(inner), span)
            }
            TypeExpr::Array { len: Some(len), element } => {
                let element = self.resolve_type(element, span, indirect)?;
                self.intern(self.registry.array_of(element, *len), span)
            }
            TypeExpr::Array { len: None, element } => {
                let element = self.resolve_type(element, span, true)?;
                self.intern(self.registry.slice_of(element), span)
            }
            TypeExpr::Function { params, returns } | TypeExpr::Coroutine { params, returns } => {
                let coroutine = matches!(expr, TypeExpr::Coroutine { .. });
                let params = params
                    .iter()
                    .map(|p| self.resolve_type(p, span, true))
                    .collect::<Validation<Vec<_>>>()?;
                let returns = returns
                    .iter()
                    .map(|r| self.resolve_type(r, span, true))
                    .collect::<Validation<Vec<_>>>()?;
                self.intern(
                    self.registry.function(Signature {
                        params,
                        returns,
                        coroutine,
                    }),
                    span,
                )
            }
        }
    }

    fn resolve_named_type(&self, name: &str, span: Span, indirect: bool) -> Validation<TypeIndex> {
        if let Some(id) = primitives::from_str(name) {
            return Ok(TypeIndex::primitive(id));
        }
        if name == runtime::TYPE_INFO_COMPOUND {
            return Ok(TypeIndex::TYPE_INFO);
        }
        let (module, bare) = match name.split_once('.') {
            Some((module_name, bare)) => {
                let module = self.qualified_module(module_name, bare, span)?;
                (Some(module), bare)
            }
            None => (None, name),
        };
        let search: Vec<ModuleId> = match module {
            Some(module) => vec![module],
            None => self.visible_modules(),
        };
        for candidate in search {
            if candidate != self.module && module.is_none() && !self.modules.is_exported(candidate, bare) {
                continue;
            }
            let Some(entry) = self.modules.compound(candidate, bare) else {
                continue;
            };
            if !indirect {
                self.require(WaitReason::Compound {
                    module: candidate,
                    name: bare.to_string(),
                })?;
            }
            return Ok(entry.ty);
        }
        Err(errors::unknown_symbol("type", name, span).into())
    }

    /// Current module first, then imported modules in import order.
    pub(crate) fn visible_modules(&self) -> Vec<ModuleId> {
        let mut modules = vec![self.module];
        modules.extend(self.modules.imports(self.module));
        modules
    }

    /// Check that `module_name.symbol` refers to an imported module exporting `symbol`.
    pub(crate) fn qualified_module(&self, module_name: &str, symbol: &str, span: Span) -> Validation<ModuleId> {
        let Some(module) = self.modules.module_id(module_name) else {
            return Err(errors::unknown_symbol("module", module_name, span).into());
        };
        if module == self.module {
            return Ok(module);
        }
        if !self.modules.is_imported(self.module, module) {
            return Err(errors::unknown_symbol("module", module_name, span)
                .with_note(format!("add `importe {module_name}` to use its symbols"))
                .into());
        }
        if !self.modules.is_exported(module, symbol) {
            return Err(errors::unknown_symbol("exported symbol", &format!("{module_name}.{symbol}"), span)
                .with_note(format!("`{symbol}` is not exported by `{module_name}`"))
                .into());
        }
        Ok(module)
    }

    fn intern(&self, result: Result<TypeIndex, TypeError>, span: Span) -> Validation<TypeIndex> {
        result.map_err(|e| errors::type_mismatch(e.to_string(), span).into())
    }

    pub(crate) fn require(&self, reason: WaitReason) -> Validation<()> {
        if reason.is_available(self.modules) {
            Ok(())
        } else {
            tracing::trace!(reason = %reason, "unit waits");
            Err(Halt::Wait(reason))
        }
    }

    // ------------------------------------------------------------------------
    // Coercions
    // ------------------------------------------------------------------------

    /// Coerce `node` to `target`, retyping literals and recording conversion flags.
    pub(crate) fn coerce(&self, node: &mut Node, target: TypeIndex) -> Coercion {
        let coercion = self.registry.compatibility(target, node.ty, source_kind(node));
        if coercion.retypes_literal() {
            retype_literal(node, target);
        } else if coercion.is_compatible() {
            node.coercions.insert(coercion.flags());
        }
        coercion
    }

    // ------------------------------------------------------------------------
    // Bindings
    // ------------------------------------------------------------------------

    /// Reject a new local that shadows a local of an enclosing block or a global.
    pub(crate) fn check_new_local(&self, name: &str, span: Span) -> Validation<()> {
        if let Some(previous) = self.scope.lookup(name) {
            return Err(errors::local_redefinition(name, span, previous.span).into());
        }
        if let Some(global) = self.modules.global_named(self.module, name) {
            return Err(errors::global_redefinition(name, span, global.span).into());
        }
        Ok(())
    }

    pub(crate) fn declare_local(&mut self, name: &str, binding: Binding) -> Validation<()> {
        self.check_new_local(name, binding.span)?;
        self.scope.push(name, binding);
        Ok(())
    }

    pub(crate) fn in_unsafe(&self) -> bool {
        self.unsafe_depth > 0
    }
}

/// How a value node was written, for literal widening.
///
/// Arithmetic over literals only (`1 + 2`, `-3`) still counts as a literal.
pub(crate) fn source_kind(node: &Node) -> SourceKind {
    match node.kind {
        NodeKind::IntegerLiteral | NodeKind::CharLiteral => SourceKind::IntegerLiteral,
        NodeKind::RealLiteral => SourceKind::RealLiteral,
        NodeKind::Unary(UnaryOpId::Neg | UnaryOpId::BitNot) => {
            node.child(0).map(source_kind).unwrap_or(SourceKind::Expression)
        }
        NodeKind::Binary(op) if folds_literals(op) => {
            match (node.child(0).map(source_kind), node.child(1).map(source_kind)) {
                (Some(SourceKind::IntegerLiteral), Some(SourceKind::IntegerLiteral)) => SourceKind::IntegerLiteral,
                (Some(SourceKind::Expression) | None, _) | (_, Some(SourceKind::Expression) | None) => {
                    SourceKind::Expression
                }
                _ => SourceKind::RealLiteral,
            }
        }
        _ => SourceKind::Expression,
    }
}

fn folds_literals(op: BinaryOpId) -> bool {
    matches!(
        operators::binary_info(op).category,
        OperatorCategory::Arithmetic | OperatorCategory::Bitwise
    )
}

/// Give a literal (or literal arithmetic) the type it is widened to.
pub(crate) fn retype_literal(node: &mut Node, target: TypeIndex) {
    node.ty = target;
    let recurse = match node.kind {
        NodeKind::Unary(_) => true,
        NodeKind::Binary(op) => folds_literals(op) && !matches!(op, BinaryOpId::Shl | BinaryOpId::Shr),
        _ => false,
    };
    if recurse {
        for child in &mut node.children {
            retype_literal(child, target);
        }
    }
}
