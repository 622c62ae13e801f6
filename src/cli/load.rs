//! Loading of JSON AST documents.
//!
//! A document holds either one module or an array of modules, in the [`SourceFile`] shape.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;

use crate::frontend::ast::SourceFile;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read `{path}`: {source}")]
    Io { path: PathBuf, source: std::io::Error },

    #[error("`{path}` is not a valid AST document: {source}")]
    Json { path: PathBuf, source: serde_json::Error },
}

/// Read the modules of the document at `path`.
///
/// Modules without a `path` of their own are attributed to the document.
#[tracing::instrument(skip_all, fields(path = %path.display()))]
pub fn load_file(path: &Path) -> Result<Vec<SourceFile>, LoadError> {
    let text = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut files = parse_document(&text).map_err(|source| LoadError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    for file in &mut files {
        if file.path.is_empty() {
            file.path = path.display().to_string();
        }
    }
    tracing::debug!(modules = files.len(), "loaded AST document");
    Ok(files)
}

/// Parse a document from text.
pub fn parse_document(text: &str) -> Result<Vec<SourceFile>, serde_json::Error> {
    match serde_json::from_str(text)? {
        Value::Array(items) => items.into_iter().map(serde_json::from_value).collect(),
        value => Ok(vec![serde_json::from_value(value)?]),
    }
}
