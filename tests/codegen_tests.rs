//! End-to-end lowering tests: validate hand-built modules, generate C, and check the text.

use kuri::ast::build::*;
use kuri::ast::{Declaration, FunctionDecl, Node, NodeKind, SourceFile, TypeExpr};
use kuri::backend::CodegenFault;
use kuri::{CompileConfig, generate, validate};
use kuri_core::lang::operators::BinaryOpId;
use kuri_core::runtime;

fn ty(name: &str) -> TypeExpr {
    TypeExpr::named(name)
}

fn emit_with(files: Vec<SourceFile>, config: &CompileConfig) -> String {
    let program = validate(files, config);
    assert!(!program.has_errors(), "unexpected diagnostics: {:#?}", program.diagnostics());
    generate(&program, config).unwrap()
}

fn emit(files: Vec<SourceFile>) -> String {
    emit_with(files, &CompileConfig::default())
}

/// Text of the function definition whose header starts with `header`.
fn definition<'a>(c: &'a str, header: &str) -> &'a str {
    let start = c
        .find(&format!("{header} {{\n"))
        .unwrap_or_else(|| panic!("no definition for `{header}` in:\n{c}"));
    let end = c[start..].find("\n}\n").map_or(c.len(), |e| start + e + 3);
    &c[start..end]
}

fn position(haystack: &str, needle: &str) -> usize {
    haystack
        .find(needle)
        .unwrap_or_else(|| panic!("`{needle}` not found in:\n{haystack}"))
}

fn marker() -> Declaration {
    Declaration::Function(external("marque", vec![param("n", ty("z32"))], vec![]))
}

fn principal(body: Vec<Node>) -> SourceFile {
    SourceFile::new("principal")
        .declare(marker())
        .declare(Declaration::Function(function("principale", vec![], vec![], body)))
}

// ========================================
// Defers
// ========================================

#[test]
fn test_defers_run_in_reverse_order_at_block_end() {
    let c = emit(vec![principal(vec![
        defer(call("marque", vec![int(1)])),
        defer(call("marque", vec![int(2)])),
        defer(call("marque", vec![int(3)])),
    ])]);
    let body = definition(&c, "void principale(void)");
    let third = position(body, "marque(3);");
    let second = position(body, "marque(2);");
    let first = position(body, "marque(1);");
    assert!(third < second && second < first, "{body}");
}

#[test]
fn test_return_value_is_computed_before_defers_run() {
    let file = SourceFile::new("principal")
        .declare(marker())
        .declare(Declaration::Function(function(
            "suivant",
            vec![param("x", ty("z32"))],
            vec![ty("z32")],
            vec![
                defer(call("marque", vec![int(0)])),
                ret(vec![binary(BinaryOpId::Add, ident("x"), int(1))]),
            ],
        )));
    let c = emit(vec![file]);
    let body = definition(&c, "int32_t _K9principal7suivant_z32_S_z32(int32_t x)");
    let held = position(body, "int32_t __t0 = (x + 1);");
    let deferred = position(body, "marque(0);");
    let returned = position(body, "return __t0;");
    assert!(held < deferred && deferred < returned, "{body}");
    assert_eq!(body.matches("marque(0);").count(), 1, "{body}");
}

#[test]
fn test_early_return_runs_defers_of_every_enclosing_block() {
    let file = SourceFile::new("principal")
        .declare(marker())
        .declare(Declaration::Function(function(
            "etage",
            vec![],
            vec![ty("z32")],
            vec![block(vec![
                defer(call("marque", vec![int(1)])),
                block(vec![
                    defer(call("marque", vec![int(2)])),
                    block(vec![defer(call("marque", vec![int(3)])), ret(vec![int(5)])]),
                ]),
            ])],
        )));
    let c = emit(vec![file]);
    let body = definition(&c, "int32_t _K9principal5etage_S_z32(void)");
    let third = position(body, "marque(3);");
    let second = position(body, "marque(2);");
    let first = position(body, "marque(1);");
    let returned = position(body, "return ");
    assert!(third < second && second < first && first < returned, "{body}");
    for marker in ["marque(1);", "marque(2);", "marque(3);"] {
        assert_eq!(body.matches(marker).count(), 1, "{body}");
    }
}

#[test]
fn test_break_runs_defers_of_the_loop_body() {
    let c = emit(vec![principal(vec![loop_(block(vec![
        defer(call("marque", vec![int(7)])),
        break_(None),
    ]))])]);
    let body = definition(&c, "void principale(void)");
    let deferred = position(body, "marque(7);");
    let jump = position(body, "goto __break_0;");
    assert!(deferred < jump, "{body}");
    assert_eq!(body.matches("marque(7);").count(), 1, "{body}");
    assert!(body.contains("__break_0:;"), "{body}");
}

// ========================================
// Loops
// ========================================

#[test]
fn test_loop_jumps_use_labels() {
    let c = emit(vec![principal(vec![
        declare_mut("x", int(0)),
        loop_(block(vec![
            assign(ident("x"), binary(BinaryOpId::Add, ident("x"), int(1))),
            if_(
                binary(BinaryOpId::Lt, ident("x"), int(3)),
                block(vec![continue_(None)]),
                None,
            ),
            break_(None),
        ])),
    ])]);
    let body = definition(&c, "void principale(void)");
    assert!(body.contains("for (;;) {"), "{body}");
    assert!(body.contains("goto __continue_0;"), "{body}");
    assert!(body.contains("goto __break_0;"), "{body}");
    assert!(position(body, "__continue_0:;") < position(body, "__break_0:;"), "{body}");
}

#[test]
fn test_range_loop_checks_the_bound_before_stepping() {
    let c = emit(vec![principal(vec![for_(
        ident("i"),
        range(int(1), int(10)),
        block(vec![call("marque", vec![ident("i")])]),
    )])]);
    let body = definition(&c, "void principale(void)");
    assert!(body.contains("for (; i <= __t0; i += 1) {"), "{body}");
    assert!(body.contains("if (i == __t0) goto __break_0;"), "{body}");
    assert!(body.contains("marque(i);"), "{body}");
}

// ========================================
// Functions
// ========================================

fn divide() -> FunctionDecl {
    function(
        "divise",
        vec![param("a", ty("z32")), param("b", ty("z32"))],
        vec![ty("z32"), ty("z32")],
        vec![ret(vec![
            binary(BinaryOpId::Div, ident("a"), ident("b")),
            binary(BinaryOpId::Rem, ident("a"), ident("b")),
        ])],
    )
}

#[test]
fn test_multi_return_uses_output_parameters() {
    let file = SourceFile::new("principal")
        .declare(Declaration::Function(divide()))
        .declare(Declaration::Function(function(
            "principale",
            vec![],
            vec![],
            vec![assign(
                list(vec![declaration("q", false), declaration("r", false)]),
                call("divise", vec![int(7), int(2)]),
            )],
        )));
    let c = emit(vec![file]);
    let header = "void _K9principal6divise_z32_z32_S_z32_z32(int32_t a, int32_t b, int32_t *__ret0, int32_t *__ret1)";
    assert!(c.contains(&format!("{header};")), "{c}");
    let callee = definition(&c, header);
    assert!(callee.contains("*__ret0 = "), "{callee}");
    assert!(callee.contains("*__ret1 = "), "{callee}");
    assert!(callee.contains("return;"), "{callee}");

    let caller = definition(&c, "void principale(void)");
    assert!(caller.contains("int32_t q = {0};"), "{caller}");
    assert!(caller.contains("int32_t r = {0};"), "{caller}");
    assert!(caller.contains("_K9principal6divise_z32_z32_S_z32_z32(7, 2, &q, &r);"), "{caller}");
}

#[test]
fn test_coroutine_lowers_to_state_record_and_dispatch() {
    let counter = coroutine(
        "compte",
        vec![param("n", ty("z32"))],
        vec![ty("z32")],
        vec![for_(ident("i"), range(int(1), ident("n")), block(vec![yield_(vec![ident("i")])]))],
    );
    let file = SourceFile::new("principal")
        .declare(marker())
        .declare(Declaration::Function(counter))
        .declare(Declaration::Function(function(
            "principale",
            vec![],
            vec![],
            vec![for_(
                ident("x"),
                call("compte", vec![int(3)]),
                block(vec![call("marque", vec![ident("x")])]),
            )],
        )));
    let c = emit(vec![file]);
    let linkage = "_K9principal6compte_z32_S_z32";
    let record = format!("{}_{linkage}", runtime::COROUTINE_STATE_PREFIX);

    let typedef = position(&c, &format!("typedef struct {record} {{"));
    let fields = &c[typedef..];
    assert!(fields.contains("int32_t __reprend_coro;"), "{c}");
    assert!(fields.contains("bool __termine_coro;"), "{c}");
    assert!(fields.contains("int32_t n;"), "{c}");
    assert!(fields.contains("int32_t __sortie0;"), "{c}");

    let body = definition(&c, &format!("void {linkage}({record} *__etat)"));
    assert!(body.contains("switch (__etat->__reprend_coro) {"), "{body}");
    assert!(body.contains("case 1: goto __reprise_1;"), "{body}");
    assert!(body.contains("__etat->__reprend_coro = 1;"), "{body}");
    assert!(body.contains("__reprise_1:;"), "{body}");
    assert!(body.contains("__etat->__sortie0 = "), "{body}");
    assert!(body.contains("__etat->__termine_coro = 1;"), "{body}");

    let consumer = definition(&c, "void principale(void)");
    assert!(consumer.contains(&format!("{record} __t0 = {{0}};")), "{consumer}");
    assert!(consumer.contains("__t0.n = 3;"), "{consumer}");
    assert!(consumer.contains(&format!("{linkage}(&__t0);")), "{consumer}");
    assert!(consumer.contains("if (__t0.__termine_coro) goto __break_0;"), "{consumer}");
    assert!(consumer.contains("int32_t x = __t0.__sortie0;"), "{consumer}");
}

#[test]
fn test_c_variadic_call_passes_raw_string_pointers() {
    let printf = FunctionDecl {
        c_variadic: true,
        ..external("printf", vec![param("format", TypeExpr::pointer(ty("z8")))], vec![ty("z32")])
    };
    let file = SourceFile::new("principal")
        .declare(Declaration::Function(printf))
        .declare(Declaration::Function(function(
            "principale",
            vec![],
            vec![],
            vec![declare("n", call("printf", vec![string("%s %d\n"), string("kuri"), int(3)]))],
        )));
    let c = emit(vec![file]);
    assert!(c.contains("int32_t printf(int8_t *format, ...);"), "{c}");
    let body = definition(&c, "void principale(void)");
    assert_eq!(body.matches(".pointeur").count(), 2, "{body}");
}

// ========================================
// Program layout
// ========================================

#[test]
fn test_globals_initialize_in_dependency_order() {
    let file = SourceFile::new("principal")
        .declare(Declaration::Global(declare("total", binary(BinaryOpId::Mul, ident("base"), int(2)))))
        .declare(Declaration::Global(declare("base", int(21))))
        .declare(Declaration::Function(function("principale", vec![], vec![], vec![])));
    let c = emit(vec![file]);
    assert!(c.contains("static int32_t _KG9principal4base;"), "{c}");
    assert!(c.contains("static int32_t _KG9principal5total;"), "{c}");
    let init = definition(&c, &format!("void {}(void)", runtime::GLOBALS_INIT));
    let base = position(init, "_KG9principal4base = 21;");
    let total = position(init, "_KG9principal5total = (_KG9principal4base * 2);");
    assert!(base < total, "{init}");
}

#[test]
fn test_main_wrapper_initializes_globals_first() {
    let c = emit(vec![principal(vec![])]);
    let main = definition(&c, "int main(void)");
    let init = position(main, &format!("{}();", runtime::GLOBALS_INIT));
    let entry = position(main, "principale();");
    assert!(init < entry, "{main}");
    assert!(main.contains("return 0;"), "{main}");

    let without = emit_with(vec![principal(vec![])], &CompileConfig::default().with_main_wrapper(false));
    assert!(!without.contains("int main(void)"), "{without}");
}

#[test]
fn test_output_starts_with_prelude_and_orders_sections() {
    let file = SourceFile::new("principal")
        .declare(Declaration::Struct(structure("Point", vec![("x", ty("z32")), ("y", ty("z32"))])))
        .declare(Declaration::Function(function(
            "origine",
            vec![],
            vec![ty("Point")],
            vec![ret(vec![ident("modele")])],
        )))
        .declare(Declaration::Global(declaration("modele", true).with_type(ty("Point"))))
        .declare(Declaration::Function(function("principale", vec![], vec![], vec![])));
    let c = emit(vec![file]);
    assert!(c.starts_with(runtime::PRELUDE), "{c}");
    let forward = position(&c, "typedef struct principal_Point principal_Point;");
    let body = position(&c, "struct principal_Point {");
    let storage = position(&c, "static principal_Point _KG9principal6modele;");
    let prototype = position(&c, "principal_Point _K9principal7origine_S_S5Point(void);");
    let main = position(&c, "int main(void)");
    assert!(forward < body && body < storage && storage < prototype && prototype < main, "{c}");
}

#[test]
fn test_wide_integer_literals_keep_their_value() {
    let literal = |text: &str| Node::new(NodeKind::IntegerLiteral, text, vec![]);
    let c = emit(vec![principal(vec![
        declare("petit", literal("9223372036854775807")),
        declare("grand", literal("9223372036854775808")),
        declare("maximum", literal("18446744073709551615")),
    ])]);
    let body = definition(&c, "void principale(void)");
    assert!(body.contains("int64_t petit = ((int64_t)9223372036854775807ULL);"), "{body}");
    assert!(body.contains("uint64_t grand = ((uint64_t)9223372036854775808ULL);"), "{body}");
    assert!(body.contains("uint64_t maximum = ((uint64_t)18446744073709551615ULL);"), "{body}");
}

#[test]
fn test_programs_with_diagnostics_are_not_lowered() {
    let config = CompileConfig::default();
    let program = validate(vec![principal(vec![declare("x", ident("inconnu"))])], &config);
    assert!(program.has_errors());
    assert!(matches!(generate(&program, &config), Err(CodegenFault::NotValidated(1))));
}
