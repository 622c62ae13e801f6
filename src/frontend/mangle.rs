//! Linkage names ("broyage") and C identifier escaping.
//!
//! A Kuri function `f` of module `m` taking `(z32, *Vec)` and returning `r64` links as
//! `_K1m1f_z32_PS3Vec_S_r64`: `_K`, the length-prefixed module and function names, then one
//! encoded type per parameter, then `_S` and the encoded return types. External functions and the
//! entry point keep their source names.
//!
//! Identifiers are ASCII-only in C; any other byte is written as `_x` followed by two hex digits.

use kuri_core::lang::c_keywords;
use kuri_core::lang::primitives;

use super::types::{TypeIndex, TypeRegistry, TypeToken};

/// Linkage name of a Kuri function.
pub fn function_name(
    registry: &TypeRegistry,
    module: &str,
    name: &str,
    params: &[TypeIndex],
    returns: &[TypeIndex],
    external: bool,
    entry_point: &str,
) -> String {
    if external || name == entry_point {
        return c_identifier(name);
    }
    let mut out = String::from("_K");
    push_length_prefixed(&mut out, module);
    push_length_prefixed(&mut out, name);
    for param in params {
        out.push('_');
        encode_type(registry, *param, &mut out);
    }
    if !returns.is_empty() {
        out.push_str("_S");
        for ret in returns {
            out.push('_');
            encode_type(registry, *ret, &mut out);
        }
    }
    out
}

/// Linkage name of a global variable.
pub fn global_name(module: &str, name: &str) -> String {
    let mut out = String::from("_KG");
    push_length_prefixed(&mut out, module);
    push_length_prefixed(&mut out, name);
    out
}

/// Escape a source identifier for C, avoiding reserved words.
pub fn c_identifier(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    escape_into(name, &mut out);
    if c_keywords::is_reserved(&out) {
        out.push('_');
    }
    out
}

fn push_length_prefixed(out: &mut String, name: &str) {
    let mut escaped = String::new();
    escape_into(name, &mut escaped);
    out.push_str(&escaped.len().to_string());
    out.push_str(&escaped);
}

fn escape_into(name: &str, out: &mut String) {
    for byte in name.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'_' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("_x{byte:02X}"));
        }
    }
}

/// Append the mangled form of a type.
pub fn encode_type(registry: &TypeRegistry, ty: TypeIndex, out: &mut String) {
    let Ok(descriptor) = registry.descriptor(ty) else {
        out.push('?');
        return;
    };
    for token in descriptor.tokens() {
        match token {
            TypeToken::Primitive(id) => out.push_str(primitives::info_for(*id).mangle_code),
            TypeToken::Null => out.push('N'),
            TypeToken::Pointer => out.push('P'),
            TypeToken::Reference => out.push('R'),
            TypeToken::Array(len) => out.push_str(&format!("A{len}_")),
            TypeToken::Slice => out.push('T'),
            TypeToken::Function(signature) => {
                out.push(if signature.coroutine { 'C' } else { 'F' });
                for param in &signature.params {
                    encode_type(registry, *param, out);
                }
                out.push('_');
                for ret in &signature.returns {
                    encode_type(registry, *ret, out);
                }
                out.push('E');
            }
            TypeToken::Compound(id) => {
                let name = registry.compound(*id).map(|c| c.name).unwrap_or_default();
                out.push('S');
                push_length_prefixed(out, &name);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_linkage_encodes_signature() {
        let registry = TypeRegistry::new();
        let (_, vec) = registry.declare_struct("Vec", "m", false);
        let vec_ptr = registry.pointer_to(vec).unwrap();
        let name = function_name(
            &registry,
            "m",
            "f",
            &[TypeIndex::Z32, vec_ptr],
            &[TypeIndex::R64],
            false,
            "principale",
        );
        assert_eq!(name, "_K1m1f_z32_PS3Vec_S_r64");
    }

    #[test]
    fn test_overloads_get_distinct_names() {
        let registry = TypeRegistry::new();
        let a = function_name(&registry, "m", "f", &[TypeIndex::Z32], &[], false, "principale");
        let b = function_name(&registry, "m", "f", &[TypeIndex::R64], &[], false, "principale");
        assert_ne!(a, b);
    }

    #[test]
    fn test_external_and_entry_point_keep_names() {
        let registry = TypeRegistry::new();
        assert_eq!(function_name(&registry, "m", "printf", &[], &[], true, "principale"), "printf");
        assert_eq!(
            function_name(&registry, "m", "principale", &[], &[TypeIndex::Z32], false, "principale"),
            "principale"
        );
    }

    #[test]
    fn test_non_ascii_and_reserved_identifiers() {
        assert_eq!(c_identifier("données"), "donn_xC3_xA9es");
        assert_eq!(c_identifier("int"), "int_");
        assert_eq!(global_name("m", "é"), "_KG1m8_xC3_xA9");
    }
}
