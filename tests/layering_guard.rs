//! Layering guardrails for the vocabulary crate.
//!
//! `kuri_core` holds the language vocabulary shared by the compiler and any external tooling (the
//! parser, editors). It must stay dependency-free; this test scans its `Cargo.toml` and fails if
//! `[dependencies]` lists anything.

#[test]
fn vocabulary_crate_has_no_dependencies() {
    let manifest = include_str!("../crates/kuri_core/Cargo.toml");
    let mut in_dependencies = false;

    for raw_line in manifest.lines() {
        let line = raw_line.trim();
        if line.starts_with('[') {
            in_dependencies = line == "[dependencies]";
            continue;
        }
        if !in_dependencies || line.is_empty() || line.starts_with('#') {
            continue;
        }
        let entry = line.split('#').next().unwrap_or("").trim();
        panic!("`kuri_core` must not depend on other crates, found `{entry}`");
    }
}
