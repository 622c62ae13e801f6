//! Indented C text buffer.

use std::fmt::Write;

/// A buffer for building C source with consistent indentation.
#[derive(Debug, Clone)]
pub struct CEmitter {
    buffer: String,
    indent_level: usize,
    indent_str: String,
}

impl Default for CEmitter {
    fn default() -> Self {
        Self::new(4)
    }
}

impl CEmitter {
    pub fn new(indent_width: usize) -> Self {
        Self {
            buffer: String::new(),
            indent_level: 0,
            indent_str: " ".repeat(indent_width),
        }
    }

    /// An empty buffer with the same indentation settings and level.
    pub fn sibling(&self) -> Self {
        Self {
            buffer: String::new(),
            indent_level: self.indent_level,
            indent_str: self.indent_str.clone(),
        }
    }

    pub fn finish(self) -> String {
        self.buffer
    }

    pub fn as_str(&self) -> &str {
        &self.buffer
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Write a line with current indentation
    pub fn line(&mut self, s: &str) {
        self.write_indent();
        self.buffer.push_str(s);
        self.buffer.push('\n');
    }

    /// Write formatted text as one indented line
    pub fn linef(&mut self, args: std::fmt::Arguments<'_>) {
        self.write_indent();
        let _ = self.buffer.write_fmt(args);
        self.buffer.push('\n');
    }

    /// Write text without newline or indentation
    pub fn write(&mut self, s: &str) {
        self.buffer.push_str(s);
    }

    pub fn blank_line(&mut self) {
        self.buffer.push('\n');
    }

    /// Labels sit one level left of the statements they mark.
    pub fn label(&mut self, name: &str) {
        let saved = self.indent_level;
        self.indent_level = saved.saturating_sub(1);
        self.line(&format!("{name}:;"));
        self.indent_level = saved;
    }

    fn write_indent(&mut self) {
        for _ in 0..self.indent_level {
            self.buffer.push_str(&self.indent_str);
        }
    }

    pub fn indent(&mut self) {
        self.indent_level += 1;
    }

    pub fn dedent(&mut self) {
        if self.indent_level > 0 {
            self.indent_level -= 1;
        }
    }

    /// Append another buffer verbatim.
    pub fn append(&mut self, other: CEmitter) {
        self.buffer.push_str(&other.buffer);
    }

    /// Write `header {`, the body produced by `f`, then `}`.
    pub fn block<F>(&mut self, header: &str, f: F)
    where
        F: FnOnce(&mut Self),
    {
        if header.is_empty() {
            self.line("{");
        } else {
            self.line(&format!("{header} {{"));
        }
        self.indent();
        f(self);
        self.dedent();
        self.line("}");
    }
}

/// Quote bytes as a C string literal. Non-printable bytes use three-digit octal escapes, which
/// cannot swallow a following digit.
pub fn c_string_literal(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() + 2);
    out.push('"');
    for &byte in bytes {
        match byte {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            b'?' => out.push_str("\\?"),
            b'\n' => out.push_str("\\n"),
            b'\t' => out.push_str("\\t"),
            0x20..=0x7e => out.push(byte as char),
            _ => {
                let _ = write!(out, "\\{byte:03o}");
            }
        }
    }
    out.push('"');
    out
}
