//! Compile and run generated C with the system compiler.
//!
//! Ignored by default: run with `cargo test -- --ignored` on a machine with `cc`.

use std::fs;
use std::path::PathBuf;
use std::process::Command;

use kuri::ast::build::*;
use kuri::ast::{Declaration, Node, SourceFile, TypeExpr};
use kuri::{CompileConfig, generate, validate};
use kuri_core::lang::operators::BinaryOpId;

fn ty(name: &str) -> TypeExpr {
    TypeExpr::named(name)
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("kuri_{name}_{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

/// Exit status of the compiled program, or `None` when no C compiler is available.
fn compile_and_run(name: &str, files: Vec<SourceFile>) -> Option<i32> {
    let config = CompileConfig::default();
    let program = validate(files, &config);
    assert!(!program.has_errors(), "{:#?}", program.diagnostics());
    let c = generate(&program, &config).unwrap();

    let dir = scratch_dir(name);
    let source = dir.join("programme.c");
    let binary = dir.join("programme");
    fs::write(&source, &c).unwrap();
    let compiled = Command::new("cc")
        .args(["-std=c11", "-o"])
        .arg(&binary)
        .arg(&source)
        .arg("-lm")
        .output();
    let compiled = match compiled {
        Ok(output) => output,
        Err(_) => return None,
    };
    assert!(
        compiled.status.success(),
        "cc rejected the generated C:\n{}\n{c}",
        String::from_utf8_lossy(&compiled.stderr)
    );
    let status = Command::new(&binary).status().unwrap();
    let _ = fs::remove_dir_all(&dir);
    status.code()
}

fn fail_if(condition: Node, code: i64) -> Node {
    if_(condition, block(vec![ret(vec![int(code)])]), None)
}

#[test]
#[ignore = "requires a system C compiler"]
fn test_coroutine_yields_in_order() {
    let counter = coroutine(
        "compte",
        vec![param("n", ty("z32"))],
        vec![ty("z32")],
        vec![for_(ident("i"), range(int(1), ident("n")), block(vec![yield_(vec![ident("i")])]))],
    );
    let main = function(
        "principale",
        vec![],
        vec![ty("z32")],
        vec![
            declare_mut("ordre", int(0)),
            declare_mut("fois", int(0)),
            for_(
                list(vec![ident("v"), ident("k")]),
                call("compte", vec![int(3)]),
                block(vec![
                    assign(
                        ident("ordre"),
                        binary(BinaryOpId::Add, binary(BinaryOpId::Mul, ident("ordre"), int(10)), ident("v")),
                    ),
                    assign(ident("fois"), binary(BinaryOpId::Add, ident("fois"), int(1))),
                ]),
            ),
            fail_if(binary(BinaryOpId::Ne, ident("ordre"), int(123)), 1),
            fail_if(binary(BinaryOpId::Ne, ident("fois"), int(3)), 2),
            ret(vec![int(0)]),
        ],
    );
    let file = SourceFile::new("principal")
        .declare(Declaration::Function(counter))
        .declare(Declaration::Function(main));
    if let Some(code) = compile_and_run("coroutine", vec![file]) {
        assert_eq!(code, 0);
    }
}

#[test]
#[ignore = "requires a system C compiler"]
fn test_multi_return_and_defers() {
    let divide = function(
        "divise",
        vec![param("a", ty("z32")), param("b", ty("z32"))],
        vec![ty("z32"), ty("z32")],
        vec![ret(vec![
            binary(BinaryOpId::Div, ident("a"), ident("b")),
            binary(BinaryOpId::Rem, ident("a"), ident("b")),
        ])],
    );
    let main = function(
        "principale",
        vec![],
        vec![ty("z32")],
        vec![
            assign(
                list(vec![declaration("q", false), declaration("r", false)]),
                call("divise", vec![int(17), int(5)]),
            ),
            fail_if(binary(BinaryOpId::Ne, ident("q"), int(3)), 1),
            fail_if(binary(BinaryOpId::Ne, ident("r"), int(2)), 2),
            declare_mut("trace", int(0)),
            block(vec![
                defer(assign(ident("trace"), binary(BinaryOpId::Add, binary(BinaryOpId::Mul, ident("trace"), int(10)), int(1)))),
                defer(assign(ident("trace"), binary(BinaryOpId::Add, binary(BinaryOpId::Mul, ident("trace"), int(10)), int(2)))),
            ]),
            fail_if(binary(BinaryOpId::Ne, ident("trace"), int(21)), 3),
            ret(vec![int(0)]),
        ],
    );
    let file = SourceFile::new("principal")
        .declare(Declaration::Function(divide))
        .declare(Declaration::Function(main));
    if let Some(code) = compile_and_run("multi_return", vec![file]) {
        assert_eq!(code, 0);
    }
}

/// `trace = trace * 10 + digit`, inside the `unsafe` block global writes need.
fn record(digit: i64) -> Node {
    unsafe_(block(vec![assign(
        ident("trace"),
        binary(BinaryOpId::Add, binary(BinaryOpId::Mul, ident("trace"), int(10)), int(digit)),
    )]))
}

#[test]
#[ignore = "requires a system C compiler"]
fn test_early_return_drains_every_enclosing_block() {
    let nested = function(
        "etage",
        vec![],
        vec![ty("z32")],
        vec![block(vec![
            defer(record(1)),
            block(vec![
                defer(record(2)),
                block(vec![defer(record(3)), ret(vec![int(5)])]),
            ]),
        ])],
    );
    let main = function(
        "principale",
        vec![],
        vec![ty("z32")],
        vec![
            declare("valeur", call("etage", vec![])),
            fail_if(binary(BinaryOpId::Ne, ident("valeur"), int(5)), 1),
            fail_if(binary(BinaryOpId::Ne, ident("trace"), int(321)), 2),
            ret(vec![int(0)]),
        ],
    );
    let file = SourceFile::new("principal")
        .declare(Declaration::Global(declare_mut("trace", int(0))))
        .declare(Declaration::Function(nested))
        .declare(Declaration::Function(main));
    if let Some(code) = compile_and_run("nested_defers", vec![file]) {
        assert_eq!(code, 0);
    }
}
