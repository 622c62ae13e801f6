//! Reserved words of the C target.
//!
//! Kuri identifiers that collide with a C keyword (or a name the runtime prelude defines) get a
//! trailing underscore in the generated code.

/// C11 keywords plus the names pulled in by the runtime prelude headers.
pub const C_RESERVED: &[&str] = &[
    "auto", "break", "case", "char", "const", "continue", "default", "do", "double", "else", "enum",
    "extern", "float", "for", "goto", "if", "inline", "int", "long", "register", "restrict",
    "return", "short", "signed", "sizeof", "static", "struct", "switch", "typedef", "union",
    "unsigned", "void", "volatile", "while", "_Alignas", "_Alignof", "_Atomic", "_Bool",
    "_Complex", "_Generic", "_Imaginary", "_Noreturn", "_Static_assert", "_Thread_local", "bool",
    "true", "false", "main", "NULL", "int8_t", "int16_t", "int32_t", "int64_t", "uint8_t",
    "uint16_t", "uint32_t", "uint64_t", "size_t",
];

/// Return `true` if `name` cannot be used verbatim as a C identifier.
pub fn is_reserved(name: &str) -> bool {
    C_RESERVED.contains(&name)
}
