//! Kuri compiler backend
//!
//! Lowers a [`ValidatedProgram`] to one self-contained C translation unit.
//!
//! The output is laid out in a fixed order: the runtime prelude, forward typedefs,
//! function-pointer typedefs, struct bodies, coroutine state records, enum constants, reflection
//! records, global storage, prototypes, function bodies, the global initializer and the `main`
//! wrapper. Everything before the prototypes is only known once every body has been lowered, so
//! bodies are generated first and the file is assembled at the end.
//!
//! ## Module Organization
//!
//! - `emitter.rs` - Indented C text buffer
//! - `errors.rs` - Internal-consistency faults
//! - `types.rs` - C spelling of registry types and their definition sections
//! - `reflection.rs` - Static `KuriTypeInfo` records
//! - `program.rs` - Entry point and file assembly
//! - `functions.rs` - Signatures, plain and coroutine bodies, state records
//! - `statements.rs` - Blocks, defers, assignments, loops, returns and yields
//! - `expressions.rs` - Expressions, coercions and evaluation order

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod emitter;
mod errors;
mod expressions;
mod functions;
mod program;
mod reflection;
mod statements;
mod types;

pub use emitter::CEmitter;
pub use errors::{CodegenFault, CodegenResult};
pub use program::generate;

use std::collections::HashMap;

use kuri_core::runtime;

use crate::config::CompileConfig;
use crate::frontend::ast::Node;
use crate::frontend::mangle::c_identifier;
use crate::frontend::scheduler::ValidatedProgram;
use crate::frontend::scope::{DeferStack, Scope};
use crate::frontend::types::{TypeIndex, TypeRegistry};
use reflection::ReflectionTable;
use types::{TypeTable, declaration};

/// C generator for one validated program.
///
/// ## Notes
/// - Bodies are lowered one at a time into [`Frame`]; types, reflection records and coroutine
///   state records are collected on the side while they are.
/// - Node references borrow from `program.files`, so deferred statements can be replayed at every
///   exit of their block.
pub struct CGenerator<'p> {
    program: &'p ValidatedProgram,
    config: &'p CompileConfig,
    /// Types spelled so far, printed as typedefs at assembly time
    types: TypeTable,
    /// Types whose `KuriTypeInfo` record is referenced
    reflection: ReflectionTable,
    /// State records of the coroutines lowered so far, in lowering order
    coroutines: Vec<StateRecord>,
    /// State of the function being lowered
    frame: Frame<'p>,
}

/// A local as seen from C.
#[derive(Debug, Clone)]
struct Local {
    /// C lvalue reaching the value (`x`, `(*p)`, `__etat->__l3_x`)
    place: String,
    ty: TypeIndex,
}

/// A parameter as declared in C, before reference parameters are dereferenced.
#[derive(Debug, Clone)]
struct RawParam {
    place: String,
    ty: TypeIndex,
}

/// Target of `arrête` / `continue`.
#[derive(Debug, Clone, Copy)]
struct LoopTarget {
    /// Loop number recorded by the validator
    number: usize,
    /// Suffix of the `__continue_N` / `__break_N` labels
    id: usize,
    /// Defer blocks open outside the loop
    defer_depth: usize,
}

/// Fields of a `__etat_coro_*` record.
#[derive(Debug, Clone)]
struct StateRecord {
    name: String,
    fields: Vec<(String, String)>,
    /// State records embedded by value (coroutines consumed by this one)
    embeds: Vec<String>,
}

/// Per-function lowering state.
#[derive(Default)]
struct Frame<'p> {
    out: CEmitter,
    scope: Scope<Local>,
    params: HashMap<String, RawParam>,
    defers: DeferStack<&'p Node>,
    loops: Vec<LoopTarget>,
    /// Output slots of the function, in declaration order
    returns: Vec<TypeIndex>,
    /// Set while lowering a coroutine: locals and temporaries live in the state record
    coroutine: Option<StateRecord>,
    resume_points: usize,
    temps: usize,
    labels: usize,
    locals: usize,
}

impl<'p> CGenerator<'p> {
    pub fn new(program: &'p ValidatedProgram, config: &'p CompileConfig) -> Self {
        Self {
            program,
            config,
            types: TypeTable::new(),
            reflection: ReflectionTable::new(),
            coroutines: Vec::new(),
            frame: Frame::default(),
        }
    }

    fn registry(&self) -> &'p TypeRegistry {
        &self.program.registry
    }

    fn c_type(&mut self, ty: TypeIndex) -> CodegenResult<String> {
        let registry = self.registry();
        self.types.c_type(registry, ty)
    }

    /// Start lowering a new function body.
    fn reset_frame(&mut self, returns: Vec<TypeIndex>) {
        let mut out = CEmitter::new(self.config.indent_width);
        out.indent();
        self.frame = Frame {
            out,
            returns,
            ..Frame::default()
        };
    }

    fn in_coroutine(&self) -> bool {
        self.frame.coroutine.is_some()
    }

    /// Storage for a hidden or user variable named `name`: a C local in plain functions, a state
    /// field inside coroutines. Returns the lvalue; `init` of `None` zero-initializes.
    fn storage(&mut self, name: &str, c_type: &str, init: Option<&str>) -> String {
        match self.frame.coroutine.as_mut() {
            Some(record) => {
                record.fields.push((name.to_string(), c_type.to_string()));
                let place = format!("{}->{name}", runtime::COROUTINE_STATE_PARAM);
                match init {
                    Some(value) => self.frame.out.line(&format!("{place} = {value};")),
                    None => self.frame.out.line(&format!("{place} = ({c_type}){{0}};")),
                }
                place
            }
            None => {
                let decl = declaration(c_type, name);
                match init {
                    Some(value) => self.frame.out.line(&format!("{decl} = {value};")),
                    None => self.frame.out.line(&format!("{decl} = {{0}};")),
                }
                name.to_string()
            }
        }
    }

    /// Hidden temporary of type `ty` holding `init`.
    fn temp(&mut self, ty: TypeIndex, init: &str) -> CodegenResult<String> {
        let c_type = self.c_type(ty)?;
        let name = self.temp_name();
        Ok(self.storage(&name, &c_type, Some(init)))
    }

    fn temp_name(&mut self) -> String {
        let name = format!("__t{}", self.frame.temps);
        self.frame.temps += 1;
        name
    }

    /// Declare the Kuri local `name` in the innermost scope.
    fn declare_local(&mut self, name: &str, ty: TypeIndex, init: Option<&str>) -> CodegenResult<String> {
        let c_type = self.c_type(ty)?;
        let c_name = if self.in_coroutine() {
            let n = self.frame.locals;
            self.frame.locals += 1;
            format!("__l{n}_{}", c_identifier(name))
        } else {
            c_identifier(name)
        };
        let place = self.storage(&c_name, &c_type, init);
        self.frame.scope.push(
            name,
            Local {
                place: place.clone(),
                ty,
            },
        );
        Ok(place)
    }

    fn fresh_label(&mut self) -> usize {
        let id = self.frame.labels;
        self.frame.labels += 1;
        id
    }
}

/// `T *` spelled from the C spelling of `T`.
fn pointer_spelling(c_type: &str) -> String {
    if c_type.ends_with('*') {
        format!("{c_type}*")
    } else {
        format!("{c_type} *")
    }
}
