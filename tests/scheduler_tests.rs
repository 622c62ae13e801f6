//! Scheduling across files and workers.

use kuri::ast::build::*;
use kuri::ast::{Declaration, SourceFile, TypeExpr};
use kuri::diagnostics::DiagnosticKind;
use kuri::frontend::scheduler::UnitState;
use kuri::{CompileConfig, generate, validate};
use kuri_core::lang::operators::BinaryOpId;

fn ty(name: &str) -> TypeExpr {
    TypeExpr::named(name)
}

/// Declarations deliberately ordered against their dependencies, spread over two modules.
fn tangled() -> Vec<SourceFile> {
    let geometry = SourceFile::new("geometrie")
        .export("aire")
        .export("Rect")
        .declare(Declaration::Function(function(
            "aire",
            vec![param("r", TypeExpr::pointer(ty("Rect")))],
            vec![ty("r64")],
            vec![ret(vec![binary(
                BinaryOpId::Mul,
                member(ident("r"), ident("largeur")),
                member(ident("r"), ident("hauteur")),
            )])],
        )))
        .declare(Declaration::Struct(structure(
            "Rect",
            vec![("coin", ty("Point")), ("largeur", ty("r64")), ("hauteur", ty("r64"))],
        )))
        .declare(Declaration::Struct(structure("Point", vec![("x", ty("r64")), ("y", ty("r64"))])));
    let main = SourceFile::new("principal")
        .import("geometrie")
        .declare(Declaration::Function(function(
            "principale",
            vec![],
            vec![],
            vec![
                declare("s", call("double_aire", vec![])),
                declare("t", binary(BinaryOpId::Add, ident("unite"), int(1))),
            ],
        )))
        .declare(Declaration::Function(function(
            "double_aire",
            vec![],
            vec![ty("r64")],
            vec![ret(vec![binary(BinaryOpId::Mul, call("aire", vec![null()]), real("2.0"))])],
        )))
        .declare(Declaration::Global(declare("unite", int(1))));
    vec![geometry, main]
}

#[test]
fn test_out_of_order_declarations_validate() {
    let program = validate(tangled(), &CompileConfig::default());
    assert!(!program.has_errors(), "{:#?}", program.diagnostics());
    assert!(program.units.iter().all(|u| u.state == UnitState::Validated));
    let names: Vec<&str> = program.units.iter().map(|u| u.name.as_str()).collect();
    assert_eq!(names, ["aire", "Rect", "Point", "principale", "double_aire", "unite"]);
}

#[test]
fn test_worker_count_does_not_change_the_output() {
    let baseline = {
        let config = CompileConfig::default();
        let program = validate(tangled(), &config);
        generate(&program, &config).unwrap()
    };
    for workers in [2, 4, 8] {
        for _ in 0..4 {
            let config = CompileConfig::default().with_workers(workers);
            let program = validate(tangled(), &config);
            assert!(!program.has_errors(), "{:#?}", program.diagnostics());
            assert_eq!(generate(&program, &config).unwrap(), baseline, "workers = {workers}");
        }
    }
}

#[test]
fn test_waiting_on_a_failed_declaration_is_reported_once_per_waiter() {
    let file = SourceFile::new("principal")
        .declare(Declaration::Struct(structure("Boite", vec![("contenu", ty("Inconnu"))])))
        .declare(Declaration::Function(function(
            "ouvre",
            vec![param("b", ty("Boite"))],
            vec![],
            vec![],
        )));
    for workers in [1, 4] {
        let program = validate(vec![file.clone()], &CompileConfig::default().with_workers(workers));
        let kinds: Vec<DiagnosticKind> = program.diagnostics().iter().map(|d| d.kind).collect();
        assert_eq!(kinds, [DiagnosticKind::UnknownSymbol, DiagnosticKind::UnresolvedDependency]);
        assert!(program.units.iter().all(|u| u.state == UnitState::Failed));
    }
}

#[test]
fn test_failures_are_isolated_to_their_unit() {
    let file = SourceFile::new("principal")
        .declare(Declaration::Function(function(
            "casse",
            vec![],
            vec![],
            vec![declare("x", ident("inconnu"))],
        )))
        .declare(Declaration::Function(function(
            "principale",
            vec![],
            vec![],
            vec![declare("y", int(2))],
        )));
    let program = validate(vec![file], &CompileConfig::default().with_workers(3));
    let states: Vec<UnitState> = program.units.iter().map(|u| u.state).collect();
    assert_eq!(states, [UnitState::Failed, UnitState::Validated]);
}
