//! Validator unit tests, driven through the scheduler.

use kuri_core::lang::operators::{BinaryOpId, UnaryOpId};

use crate::config::CompileConfig;
use crate::frontend::ast::build::*;
use crate::frontend::ast::{
    Declaration, ForStrategy, Lowering, Node, NodeKind, NodeValue, ReturnLowering, SourceFile, TypeExpr,
};
use crate::frontend::diagnostics::{Diagnostic, DiagnosticKind};
use crate::frontend::scheduler::{UnitState, ValidatedProgram, validate};
use crate::frontend::types::{CoercionSet, TypeIndex};

fn ty(name: &str) -> TypeExpr {
    TypeExpr::named(name)
}

fn check(files: Vec<SourceFile>) -> ValidatedProgram {
    validate(files, &CompileConfig::default())
}

fn check_one(file: SourceFile) -> ValidatedProgram {
    check(vec![file])
}

fn errors(program: &ValidatedProgram) -> Vec<&Diagnostic> {
    program.diagnostics()
}

fn only_error(program: &ValidatedProgram) -> &Diagnostic {
    let diagnostics = errors(program);
    assert_eq!(diagnostics.len(), 1, "expected one diagnostic, got {diagnostics:#?}");
    diagnostics[0]
}

fn assert_clean(program: &ValidatedProgram) {
    let diagnostics = errors(program);
    assert!(diagnostics.is_empty(), "unexpected diagnostics: {diagnostics:#?}");
}

fn main_with(body: Vec<Node>) -> SourceFile {
    SourceFile::new("principal").declare(Declaration::Function(function("principale", vec![], vec![], body)))
}

/// Integer literal spelled exactly as in the source.
fn literal(text: &str) -> Node {
    Node::new(NodeKind::IntegerLiteral, text, vec![])
}

/// Body statements of the function declared at `index` of the first file.
fn body(program: &ValidatedProgram, index: usize) -> &[Node] {
    match &program.files[0].declarations[index] {
        Declaration::Function(f) => f.body.as_ref().map(|b| b.children.as_slice()).unwrap_or(&[]),
        other => panic!("not a function: {other:?}"),
    }
}

// ========================================
// Bindings and assignments
// ========================================

#[test]
fn test_integer_literal_widens_to_real() {
    let program = check_one(main_with(vec![assign(declaration("x", true).with_type(ty("r64")), int(5))]));
    assert_clean(&program);
    let value = &body(&program, 0)[0].children[1];
    assert_eq!(value.ty, TypeIndex::R64);
    assert!(value.coercions.is_empty());
}

#[test]
fn test_integer_literals_are_typed_by_magnitude() {
    let program = check_one(main_with(vec![
        declare("a", literal("2147483647")),
        declare("b", literal("9223372036854775807")),
        declare("c", literal("9223372036854775808")),
        declare("d", literal("18446744073709551615")),
        declare("e", literal("0xffff_ffff_ffff_ffff")),
    ]));
    assert_clean(&program);
    let typed: Vec<(TypeIndex, NodeValue)> = body(&program, 0)
        .iter()
        .map(|statement| (statement.children[1].ty, statement.children[1].value.clone()))
        .collect();
    assert_eq!(
        typed,
        [
            (TypeIndex::Z32, NodeValue::Integer(2_147_483_647)),
            (TypeIndex::Z64, NodeValue::Integer(9_223_372_036_854_775_807)),
            (TypeIndex::N64, NodeValue::Integer(9_223_372_036_854_775_808)),
            (TypeIndex::N64, NodeValue::Integer(18_446_744_073_709_551_615)),
            (TypeIndex::N64, NodeValue::Integer(18_446_744_073_709_551_615)),
        ]
    );
}

#[test]
fn test_integer_literal_past_64_bits_is_rejected() {
    let program = check_one(main_with(vec![declare("x", literal("18446744073709551616"))]));
    let diagnostic = only_error(&program);
    assert_eq!(diagnostic.kind, DiagnosticKind::TypeMismatch);
    assert!(diagnostic.message.contains("does not fit in 64 bits"), "{}", diagnostic.message);
}

#[test]
fn test_real_literal_overflowing_r64_is_rejected() {
    let program = check_one(main_with(vec![declare("x", real("1e400"))]));
    let diagnostic = only_error(&program);
    assert_eq!(diagnostic.kind, DiagnosticKind::TypeMismatch);
    assert!(diagnostic.message.contains("out of range"), "{}", diagnostic.message);
    assert_clean(&check_one(main_with(vec![declare("x", real("1.5e300"))])));
}

#[test]
fn test_redefinition_points_at_second_declaration() {
    let program = check_one(main_with(vec![
        assign(declaration("x", false).at(2, 5), int(1)),
        assign(declaration("x", false).at(3, 5), int(2)),
    ]));
    let diagnostic = only_error(&program);
    assert_eq!(diagnostic.kind, DiagnosticKind::Redefinition);
    assert_eq!((diagnostic.line, diagnostic.column), (3, 5));
}

#[test]
fn test_local_shadowing_global_is_reported() {
    let file = SourceFile::new("principal")
        .declare(Declaration::Global(declare("compte", int(0))))
        .declare(Declaration::Function(function(
            "principale",
            vec![],
            vec![],
            vec![declare("compte", int(1))],
        )));
    let program = check_one(file);
    let diagnostic = only_error(&program);
    assert_eq!(diagnostic.kind, DiagnosticKind::Redefinition);
    assert!(diagnostic.message.contains("global"));
}

#[test]
fn test_assigning_immutable_local_fails() {
    let program = check_one(main_with(vec![declare("x", int(1)), assign(ident("x"), int(2))]));
    assert_eq!(only_error(&program).kind, DiagnosticKind::InvalidAssignment);
}

#[test]
fn test_global_assignment_requires_unsafe() {
    let outside = SourceFile::new("principal")
        .declare(Declaration::Global(declare_mut("compte", int(0))))
        .declare(Declaration::Function(function(
            "principale",
            vec![],
            vec![],
            vec![assign(ident("compte"), int(1))],
        )));
    assert_eq!(only_error(&check_one(outside)).kind, DiagnosticKind::InvalidAssignment);

    let inside = SourceFile::new("principal")
        .declare(Declaration::Global(declare_mut("compte", int(0))))
        .declare(Declaration::Function(function(
            "principale",
            vec![],
            vec![],
            vec![unsafe_(block(vec![assign(ident("compte"), int(1))]))],
        )));
    assert_clean(&check_one(inside));
}

#[test]
fn test_unknown_variable() {
    let program = check_one(main_with(vec![declare("x", ident("inconnu"))]));
    let diagnostic = only_error(&program);
    assert_eq!(diagnostic.kind, DiagnosticKind::UnknownSymbol);
    assert!(diagnostic.message.contains("inconnu"));
}

#[test]
fn test_boxing_into_eini_records_flag() {
    let program = check_one(main_with(vec![assign(declaration("x", false).with_type(ty("eini")), int(3))]));
    assert_clean(&program);
    let value = &body(&program, 0)[0].children[1];
    assert!(value.coercions.contains(CoercionSet::BOX_TO_ANY));
}

// ========================================
// Calls and overloads
// ========================================

#[test]
fn test_unknown_argument_name_is_reported_per_candidate() {
    let file = SourceFile::new("principal")
        .declare(Declaration::Function(function(
            "f",
            vec![param("b", ty("z32"))],
            vec![],
            vec![],
        )))
        .declare(Declaration::Function(function(
            "principale",
            vec![],
            vec![],
            vec![call("f", vec![named("a", int(1))])],
        )));
    let program = check_one(file);
    let diagnostic = only_error(&program);
    assert_eq!(diagnostic.kind, DiagnosticKind::OverloadResolutionFailed);
    assert!(
        diagnostic.notes.iter().any(|n| n.contains("unknown argument name `a`")),
        "{:?}",
        diagnostic.notes
    );
}

#[test]
fn test_exact_overload_beats_widening() {
    let file = SourceFile::new("principal")
        .declare(Declaration::Function(function("f", vec![param("x", ty("r64"))], vec![], vec![])))
        .declare(Declaration::Function(function("f", vec![param("x", ty("z32"))], vec![], vec![])))
        .declare(Declaration::Function(function(
            "principale",
            vec![],
            vec![],
            vec![call("f", vec![int(1)]), call("f", vec![real("1.5")])],
        )));
    let program = check_one(file);
    assert_clean(&program);
    let calls = body(&program, 2);
    let integer = program.modules.function(calls[0].callee.unwrap()).unwrap();
    let floating = program.modules.function(calls[1].callee.unwrap()).unwrap();
    assert_eq!(integer.params[0].ty, TypeIndex::Z32);
    assert_eq!(floating.params[0].ty, TypeIndex::R64);
}

#[test]
fn test_named_arguments_are_reordered() {
    let file = SourceFile::new("principal")
        .declare(Declaration::Function(function(
            "f",
            vec![param("a", ty("z32")), param("b", ty("bool"))],
            vec![],
            vec![],
        )))
        .declare(Declaration::Function(function(
            "principale",
            vec![],
            vec![],
            vec![call("f", vec![named("b", boolean(true)), named("a", int(4))])],
        )));
    let program = check_one(file);
    assert_clean(&program);
    let call = &body(&program, 1)[0];
    assert_eq!(call.children[0].kind, NodeKind::IntegerLiteral);
    assert_eq!(call.children[1].kind, NodeKind::BoolLiteral);
}

#[test]
fn test_variadic_arguments_are_absorbed() {
    let mut values = param("valeurs", ty("z32"));
    values.variadic = true;
    let file = SourceFile::new("principal")
        .declare(Declaration::Function(function("somme", vec![values], vec![], vec![])))
        .declare(Declaration::Function(function(
            "principale",
            vec![],
            vec![],
            vec![call("somme", vec![int(1), int(2), int(3)])],
        )));
    let program = check_one(file);
    assert_clean(&program);
    assert_eq!(
        body(&program, 1)[0].lowering,
        Lowering::Call {
            variadic_from: Some(0),
            c_variadic_from: None
        }
    );
}

#[test]
fn test_arity_mismatch() {
    let file = SourceFile::new("principal")
        .declare(Declaration::Function(function("f", vec![param("a", ty("z32"))], vec![], vec![])))
        .declare(Declaration::Function(function(
            "principale",
            vec![],
            vec![],
            vec![call("f", vec![int(1), int(2)])],
        )));
    let program = check_one(file);
    let diagnostic = only_error(&program);
    assert_eq!(diagnostic.kind, DiagnosticKind::OverloadResolutionFailed);
    assert!(diagnostic.notes[0].contains("expected 1 argument"), "{:?}", diagnostic.notes);
}

#[test]
fn test_multi_return_needs_destructuring() {
    let pair = function(
        "paire",
        vec![],
        vec![ty("z32"), ty("r64")],
        vec![ret(vec![int(1), real("2.0")])],
    );
    let good = SourceFile::new("principal")
        .declare(Declaration::Function(pair.clone()))
        .declare(Declaration::Function(function(
            "principale",
            vec![],
            vec![],
            vec![assign(
                list(vec![declaration("a", false), declaration("b", false)]),
                call("paire", vec![]),
            )],
        )));
    let program = check_one(good);
    assert_clean(&program);
    assert_eq!(body(&program, 1)[0].lowering, Lowering::MultiAssign);
    assert_eq!(body(&program, 0)[0].lowering, Lowering::Return(ReturnLowering::Multi));

    let bad = SourceFile::new("principal")
        .declare(Declaration::Function(pair))
        .declare(Declaration::Function(function(
            "principale",
            vec![],
            vec![],
            vec![declare("a", call("paire", vec![]))],
        )));
    assert_eq!(only_error(&check_one(bad)).kind, DiagnosticKind::TypeMismatch);
}

// ========================================
// Control flow
// ========================================

#[test]
fn test_missing_return_is_invalid_control() {
    let file = SourceFile::new("principal").declare(Declaration::Function(function(
        "f",
        vec![],
        vec![ty("z32")],
        vec![declare("x", int(1))],
    )));
    assert_eq!(only_error(&check_one(file)).kind, DiagnosticKind::InvalidControl);
}

#[test]
fn test_terminal_if_else_counts_as_return() {
    let file = SourceFile::new("principal").declare(Declaration::Function(function(
        "signe",
        vec![param("x", ty("z32"))],
        vec![ty("z32")],
        vec![if_(
            binary(BinaryOpId::Lt, ident("x"), int(0)),
            block(vec![ret(vec![unary(UnaryOpId::Neg, int(1))])]),
            Some(block(vec![ret(vec![int(1)])])),
        )],
    )));
    assert_clean(&check_one(file));
}

#[test]
fn test_break_outside_loop() {
    let program = check_one(main_with(vec![break_(None)]));
    assert_eq!(only_error(&program).kind, DiagnosticKind::InvalidControl);
}

#[test]
fn test_labelled_continue_targets_outer_loop() {
    let program = check_one(main_with(vec![for_(
        ident("i"),
        range(int(0), int(3)),
        block(vec![for_(
            ident("j"),
            range(int(0), int(3)),
            block(vec![continue_(Some("i"))]),
        )]),
    )]));
    assert_clean(&program);
    let outer = &body(&program, 0)[0];
    let inner = &outer.children[2].children[0];
    let jump = &inner.children[2].children[0];
    assert_eq!(jump.label(), outer.label());
    assert_ne!(inner.label(), outer.label());
}

#[test]
fn test_return_inside_defer_is_rejected() {
    let program = check_one(main_with(vec![defer(block(vec![ret(vec![])]))]));
    assert_eq!(only_error(&program).kind, DiagnosticKind::InvalidControl);
}

#[test]
fn test_yield_outside_coroutine_is_rejected() {
    let program = check_one(main_with(vec![yield_(vec![int(1)])]));
    assert_eq!(only_error(&program).kind, DiagnosticKind::InvalidControl);
}

#[test]
fn test_condition_must_be_bool() {
    let program = check_one(main_with(vec![while_(int(1), block(vec![]))]));
    assert_eq!(only_error(&program).kind, DiagnosticKind::TypeMismatch);
}

#[test]
fn test_coroutine_is_iterated_with_index() {
    let file = SourceFile::new("principal")
        .declare(Declaration::Function(coroutine(
            "compte",
            vec![],
            vec![ty("z32")],
            vec![yield_(vec![int(1)]), yield_(vec![int(2)]), yield_(vec![int(3)])],
        )))
        .declare(Declaration::Function(function(
            "principale",
            vec![],
            vec![],
            vec![for_(
                list(vec![ident("v"), ident("i")]),
                call("compte", vec![]),
                block(vec![declare("w", binary(BinaryOpId::Add, ident("v"), int(1)))]),
            )],
        )));
    let program = check_one(file);
    assert_clean(&program);
    let for_loop = &body(&program, 1)[0];
    assert_eq!(for_loop.lowering, Lowering::For(ForStrategy::Coroutine));
    assert_eq!(for_loop.children[0].children[1].ty, TypeIndex::Z64);
}

#[test]
fn test_coroutine_call_outside_loop_is_rejected() {
    let file = SourceFile::new("principal")
        .declare(Declaration::Function(coroutine(
            "compte",
            vec![],
            vec![ty("z32")],
            vec![yield_(vec![int(1)])],
        )))
        .declare(Declaration::Function(function(
            "principale",
            vec![],
            vec![],
            vec![call("compte", vec![])],
        )));
    assert_eq!(only_error(&check_one(file)).kind, DiagnosticKind::InvalidControl);
}

// ========================================
// Declarations and suspension
// ========================================

#[test]
fn test_struct_declared_after_use_is_awaited() {
    let file = SourceFile::new("principal")
        .declare(Declaration::Function(function(
            "longueur",
            vec![param("v", ty("Vec2"))],
            vec![ty("r64")],
            vec![ret(vec![member(ident("v"), ident("x"))])],
        )))
        .declare(Declaration::Struct(structure(
            "Vec2",
            vec![("x", ty("r64")), ("y", ty("r64"))],
        )));
    let program = check_one(file);
    assert_clean(&program);
    assert!(program.units.iter().all(|u| u.state == UnitState::Validated));
}

#[test]
fn test_mutual_by_value_structs_form_a_cycle() {
    let file = SourceFile::new("principal")
        .declare(Declaration::Struct(structure("A", vec![("b", ty("B"))])))
        .declare(Declaration::Struct(structure("B", vec![("a", ty("A"))])));
    let program = check_one(file);
    let kinds: Vec<DiagnosticKind> = errors(&program).iter().map(|d| d.kind).collect();
    assert!(kinds.contains(&DiagnosticKind::StructureCycle), "{kinds:?}");
}

#[test]
fn test_oversized_struct_field_is_a_type_error() {
    let file = SourceFile::new("principal").declare(Declaration::Struct(structure(
        "Tampon",
        vec![("octets", TypeExpr::array(i64::MAX as u64, ty("z64")))],
    )));
    let program = check_one(file);
    let diagnostic = only_error(&program);
    assert_eq!(diagnostic.kind, DiagnosticKind::TypeMismatch);
    assert!(diagnostic.message.contains("too large"), "{}", diagnostic.message);
    assert_eq!(program.units[0].state, UnitState::Failed);
}

#[test]
fn test_structs_may_point_at_each_other() {
    let file = SourceFile::new("principal")
        .declare(Declaration::Struct(structure("Noeud", vec![
            ("suivant", TypeExpr::pointer(ty("Noeud"))),
            ("liste", TypeExpr::pointer(ty("Liste"))),
        ])))
        .declare(Declaration::Struct(structure("Liste", vec![("tete", TypeExpr::pointer(ty("Noeud")))])));
    assert_clean(&check_one(file));
}

#[test]
fn test_failed_header_leaves_callers_unresolved() {
    let file = SourceFile::new("principal")
        .declare(Declaration::Function(function(
            "f",
            vec![param("x", ty("Inconnu"))],
            vec![],
            vec![],
        )))
        .declare(Declaration::Function(function(
            "principale",
            vec![],
            vec![],
            vec![call("f", vec![int(1)])],
        )));
    let program = check_one(file);
    let kinds: Vec<DiagnosticKind> = errors(&program).iter().map(|d| d.kind).collect();
    assert_eq!(kinds, vec![DiagnosticKind::UnknownSymbol, DiagnosticKind::UnresolvedDependency]);
}

#[test]
fn test_enum_variants_count_up() {
    let file = SourceFile::new("principal")
        .declare(Declaration::Enum(enumeration("Couleur", None, vec!["ROUGE", "VERT", "BLEU"])))
        .declare(Declaration::Function(function(
            "principale",
            vec![],
            vec![],
            vec![declare("c", member(ident("Couleur"), ident("BLEU")))],
        )));
    let program = check_one(file);
    assert_clean(&program);
    let value = &body(&program, 1)[0].children[1];
    assert_eq!(value.value, NodeValue::Integer(2));
}

#[test]
fn test_employed_parameter_fields_are_in_scope() {
    let mut point = param("p", TypeExpr::pointer(ty("Point")));
    point.employed = true;
    let file = SourceFile::new("principal")
        .declare(Declaration::Struct(structure("Point", vec![("x", ty("z32")), ("y", ty("z32"))])))
        .declare(Declaration::Function(function(
            "somme",
            vec![point],
            vec![ty("z32")],
            vec![ret(vec![binary(BinaryOpId::Add, ident("x"), ident("y"))])],
        )));
    assert_clean(&check_one(file));
}

// ========================================
// Modules
// ========================================

#[test]
fn test_qualified_call_requires_export() {
    let library = SourceFile::new("maths")
        .export("carre")
        .declare(Declaration::Function(function(
            "carre",
            vec![param("x", ty("z32"))],
            vec![ty("z32")],
            vec![ret(vec![binary(BinaryOpId::Mul, ident("x"), ident("x"))])],
        )))
        .declare(Declaration::Function(function("cache", vec![], vec![], vec![])));
    let user = SourceFile::new("principal")
        .import("maths")
        .declare(Declaration::Function(function(
            "principale",
            vec![],
            vec![],
            vec![
                declare("y", member(ident("maths"), call("carre", vec![int(3)]))),
                member(ident("maths"), call("cache", vec![])),
            ],
        )));
    let program = check(vec![library, user]);
    let diagnostic = only_error(&program);
    assert_eq!(diagnostic.kind, DiagnosticKind::UnknownSymbol);
    assert!(diagnostic.message.contains("maths.cache"));
}

#[test]
fn test_module_must_be_imported() {
    let library = SourceFile::new("maths")
        .export("pi")
        .declare(Declaration::Global(declare("pi", real("3.14"))));
    let user = main_with(vec![declare("x", member(ident("maths"), ident("pi")))]);
    let program = check(vec![library, user]);
    let diagnostic = only_error(&program);
    assert_eq!(diagnostic.kind, DiagnosticKind::UnknownSymbol);
    assert!(diagnostic.notes.iter().any(|n| n.contains("importe maths")));
}

#[test]
fn test_several_workers_agree_with_one() {
    let files = || {
        vec![
            SourceFile::new("principal")
                .declare(Declaration::Function(function(
                    "principale",
                    vec![],
                    vec![],
                    vec![declare("v", call("fabrique", vec![]))],
                )))
                .declare(Declaration::Function(function(
                    "fabrique",
                    vec![],
                    vec![ty("Boite")],
                    vec![assign(declaration("b", false).with_type(ty("Boite")), call("vide", vec![])), ret(vec![ident("b")])],
                )))
                .declare(Declaration::Function(function("vide", vec![], vec![ty("Boite")], vec![
                    ret(vec![ident("modele")]),
                ])))
                .declare(Declaration::Global(declaration("modele", true).with_type(ty("Boite"))))
                .declare(Declaration::Struct(structure("Boite", vec![("contenu", ty("z64"))]))),
        ]
    };
    let single = validate(files(), &CompileConfig::default());
    let parallel = validate(files(), &CompileConfig::default().with_workers(4));
    assert_clean(&single);
    assert_clean(&parallel);
    assert_eq!(single.files, parallel.files);
}
