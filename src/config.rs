//! Compilation settings shared by the validator, the scheduler and the C generator.

use kuri_core::runtime;

/// Settings of one compilation.
///
/// Built with [`CompileConfig::default`] and the `with_*` methods; the CLI maps its flags onto it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileConfig {
    /// Validation worker threads. One worker keeps scheduling order fully reproducible.
    pub workers: usize,
    /// Name of the function called by the generated `main`.
    pub entry_point: String,
    /// Emit type-info descriptors for reflection and `eini` boxing.
    pub emit_reflection: bool,
    /// Emit a C `main` that initializes globals and calls the entry point.
    pub emit_main_wrapper: bool,
    /// Spaces per indentation level in the generated C.
    pub indent_width: usize,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            entry_point: runtime::ENTRY_POINT.to_string(),
            emit_reflection: true,
            emit_main_wrapper: true,
            indent_width: 4,
        }
    }
}

impl CompileConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_entry_point(mut self, entry_point: impl Into<String>) -> Self {
        self.entry_point = entry_point.into();
        self
    }

    pub fn with_reflection(mut self, emit: bool) -> Self {
        self.emit_reflection = emit;
        self
    }

    pub fn with_main_wrapper(mut self, emit: bool) -> Self {
        self.emit_main_wrapper = emit;
        self
    }

    pub fn with_indent_width(mut self, width: usize) -> Self {
        self.indent_width = width;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CompileConfig::default();
        assert_eq!(config.workers, 1);
        assert_eq!(config.entry_point, "principale");
        assert!(config.emit_reflection);
        assert!(config.emit_main_wrapper);
    }

    #[test]
    fn test_workers_never_zero() {
        assert_eq!(CompileConfig::default().with_workers(0).workers, 1);
    }
}
