//! Tri-state validation results.
//!
//! Every validation entry point returns [`Validation<T>`]: `Ok(T)` to continue, `Err(Halt::Error)`
//! to stop the unit for good, or `Err(Halt::Wait)` to park it until a named fact is published. Using
//! `Result` lets `?` propagate both halting outcomes without extra side effects.

use std::fmt;

use super::diagnostics::Diagnostic;
use super::module::{ModuleId, ModuleTable};

/// Fact a parked unit is waiting for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WaitReason {
    /// A struct or enum declared in `module` has not been published.
    Compound { module: ModuleId, name: String },
    /// Some overload of `name` in `module` has no published header yet.
    Functions { module: ModuleId, name: String },
    Global { module: ModuleId, name: String },
}

impl WaitReason {
    /// Has the awaited fact been published?
    pub fn is_available(&self, modules: &ModuleTable) -> bool {
        match self {
            WaitReason::Compound { module, name } => modules.compound_published(*module, name),
            WaitReason::Functions { module, name } => modules.functions_published(*module, name),
            WaitReason::Global { module, name } => modules.global_published(*module, name),
        }
    }

    /// Human-readable description, qualified by module name.
    pub fn describe(&self, modules: &ModuleTable) -> String {
        let (what, module, name) = match self {
            WaitReason::Compound { module, name } => ("type", module, name),
            WaitReason::Functions { module, name } => ("function", module, name),
            WaitReason::Global { module, name } => ("global", module, name),
        };
        format!("{what} `{}.{name}`", modules.module_name(*module))
    }
}

impl fmt::Display for WaitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitReason::Compound { module, name } => write!(f, "type `{name}` (module #{})", module.0),
            WaitReason::Functions { module, name } => write!(f, "function `{name}` (module #{})", module.0),
            WaitReason::Global { module, name } => write!(f, "global `{name}` (module #{})", module.0),
        }
    }
}

/// Why validation of a unit stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum Halt {
    /// Terminal: the unit is never retried.
    Error(Box<Diagnostic>),
    /// Suspend; retry once the fact is available.
    Wait(WaitReason),
}

impl From<Diagnostic> for Halt {
    fn from(diagnostic: Diagnostic) -> Self {
        Halt::Error(Box::new(diagnostic))
    }
}

pub type Validation<T> = Result<T, Halt>;

/// Flattened outcome of one run of a unit, as seen by the scheduler.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationResult {
    Ok,
    Error(Box<Diagnostic>),
    Wait(WaitReason),
}

impl<T> From<Validation<T>> for ValidationResult {
    fn from(result: Validation<T>) -> Self {
        match result {
            Ok(_) => ValidationResult::Ok,
            Err(Halt::Error(diagnostic)) => ValidationResult::Error(diagnostic),
            Err(Halt::Wait(reason)) => ValidationResult::Wait(reason),
        }
    }
}

/// Park the unit unless `reason` is already available.
pub fn require(reason: WaitReason, modules: &ModuleTable) -> Validation<()> {
    if reason.is_available(modules) {
        Ok(())
    } else {
        Err(Halt::Wait(reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::ast::Span;
    use crate::frontend::module::FunctionFlags;

    #[test]
    fn test_require_waits_until_published() {
        let modules = ModuleTable::new();
        let module = modules.add_module("m", "m.kuri", "").unwrap();
        let id = modules.register_function(module, "f", Span::default(), FunctionFlags::default());
        let reason = WaitReason::Functions {
            module,
            name: "f".into(),
        };
        assert_eq!(require(reason.clone(), &modules), Err(Halt::Wait(reason.clone())));
        modules.publish_function(id, Vec::new(), Vec::new(), "f".into()).unwrap();
        assert_eq!(require(reason.clone(), &modules), Ok(()));
        assert_eq!(reason.describe(&modules), "function `m.f`");
    }

    #[test]
    fn test_flatten_result() {
        let waiting: Validation<u8> = Err(Halt::Wait(WaitReason::Global {
            module: ModuleId(0),
            name: "g".into(),
        }));
        assert!(matches!(ValidationResult::from(waiting), ValidationResult::Wait(_)));
        assert_eq!(ValidationResult::from(Validation::Ok(1u8)), ValidationResult::Ok);
    }
}
