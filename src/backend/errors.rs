//! Internal-consistency faults of the C generator.
//!
//! The generator only sees validated declarations, so every fault here is a compiler bug rather
//! than a user error. The CLI renders them apart from diagnostics and exits with a distinct code.

use crate::frontend::types::{TypeError, TypeIndex};

/// A validated tree the generator cannot lower.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodegenFault {
    #[error("the program still has {0} diagnostic(s); only validated programs can be lowered")]
    NotValidated(usize),
    #[error("unresolved type index #{index} reached the C generator ({context})")]
    UnresolvedType { index: u32, context: String },
    #[error("call to `{0}` has no bound callee")]
    UnboundCallee(String),
    #[error("function #{0} is not published")]
    MissingFunction(u32),
    #[error("global #{0} is not published")]
    MissingGlobal(u32),
    #[error("malformed `{kind}` node: {detail}")]
    Malformed { kind: String, detail: String },
    #[error("coroutine `{0}` consumes itself; its state record would contain itself")]
    RecursiveCoroutine(String),
    #[error(transparent)]
    Registry(#[from] TypeError),
}

impl CodegenFault {
    pub(crate) fn unresolved(ty: TypeIndex, context: impl Into<String>) -> Self {
        CodegenFault::UnresolvedType {
            index: ty.0,
            context: context.into(),
        }
    }

    pub(crate) fn malformed(kind: impl Into<String>, detail: impl Into<String>) -> Self {
        CodegenFault::Malformed {
            kind: kind.into(),
            detail: detail.into(),
        }
    }
}

pub type CodegenResult<T> = Result<T, CodegenFault>;
