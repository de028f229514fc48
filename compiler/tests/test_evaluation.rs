//! Whole programs through the interpreter: reassignment and copy-on-write,
//! enums, recursion, closures, runtime errors and assertions.

use compiler::ast::build::*;
use compiler::ast::Node;
use compiler::errors::DangError;
use compiler::eval::EvalConfig;
use compiler::{Interpreter, Value};

fn run(program: Vec<Node>) -> Result<Value, DangError> {
    Interpreter::new().run(&program)
}

// ============================================================================
// Reassignment
// ============================================================================

#[test]
fn test_add_assign_on_a_variable() {
    let v = run(vec![
        let_slot("x", None, Some(int(1))),
        add_assign(sym("x"), int(1)),
        sym("x"),
    ])
    .unwrap();
    assert_eq!(v.as_int(), Some(2));
}

#[test]
fn test_add_assign_concatenates_strings() {
    let v = run(vec![
        let_slot("s", None, Some(string("ab"))),
        add_assign(sym("s"), string("c")),
        sym("s"),
    ])
    .unwrap();
    assert_eq!(v.as_str(), Some("abc"));
}

#[test]
fn test_reassignment_type_is_checked() {
    let err = run(vec![
        let_slot("x", None, Some(int(1))),
        assign(sym("x"), string("one")),
    ])
    .unwrap_err();
    assert_eq!(err.to_string(), "reassignment: cannot use String! as Int!");
}

#[test]
fn test_nested_field_update_is_copy_on_write() {
    let v = run(vec![
        let_slot(
            "a",
            None,
            Some(object(vec![
                ("b", object(vec![("c", int(1)), ("d", int(2))])),
                ("e", int(3)),
            ])),
        ),
        let_slot("alias", None, Some(sym("a"))),
        assign(select(select(sym("a"), "b"), "c"), int(5)),
        list(vec![
            get(get(sym("a"), "b"), "c"),
            get(get(sym("alias"), "b"), "c"),
            get(get(sym("a"), "b"), "d"),
            get(sym("a"), "e"),
        ]),
    ])
    .unwrap();
    assert_eq!(v.to_string(), "[5, 1, 2, 3]");
}

#[test]
fn test_closure_sees_reassigned_outer_variable() {
    let v = run(vec![
        let_slot("n", None, Some(int(1))),
        fun_decl("current", func(vec![], None, vec![sym("n")])),
        assign(sym("n"), int(10)),
        call(sym("current"), vec![]),
    ])
    .unwrap();
    assert_eq!(v.as_int(), Some(10));
}

#[test]
fn test_assignment_inside_function_targets_outer_binding() {
    let v = run(vec![
        let_slot("total", None, Some(int(0))),
        fun_decl(
            "bump",
            func(vec![param("by", ty_nn("Int"))], None, vec![add_assign(sym("total"), sym("by"))]),
        ),
        call(sym("bump"), vec![arg(int(2))]),
        call(sym("bump"), vec![arg(int(3))]),
        sym("total"),
    ])
    .unwrap();
    assert_eq!(v.as_int(), Some(5));
}

// ============================================================================
// Enums
// ============================================================================

#[test]
fn test_enum_values_in_declaration_order() {
    let v = run(vec![
        enum_decl("Status", &["ACTIVE", "INACTIVE", "PENDING"]),
        method(sym("Status"), "values", vec![]),
    ])
    .unwrap();
    assert_eq!(v.to_string(), "[ACTIVE, INACTIVE, PENDING]");
}

#[test]
fn test_enum_value_equality() {
    let v = run(vec![
        enum_decl("Status", &["ACTIVE", "INACTIVE"]),
        list(vec![
            eq(get(sym("Status"), "ACTIVE"), get(sym("Status"), "ACTIVE")),
            eq(get(sym("Status"), "ACTIVE"), get(sym("Status"), "INACTIVE")),
        ]),
    ])
    .unwrap();
    assert_eq!(v.to_string(), "[true, false]");
}

// ============================================================================
// Functions and recursion
// ============================================================================

fn parity_functions() -> Vec<Node> {
    let branch = |name: &str, base: bool, other: &str| {
        fun_decl(
            name,
            func(
                vec![param("n", ty_nn("Int"))],
                Some(ty_nn("Boolean")),
                vec![if_else(
                    eq(sym("n"), int(0)),
                    vec![boolean(base)],
                    Some(vec![call(sym(other), vec![arg(sub(sym("n"), int(1)))])]),
                )],
            ),
        )
    };
    vec![branch("isEven", true, "isOdd"), branch("isOdd", false, "isEven")]
}

#[test]
fn test_mutual_recursion() {
    let mut program = parity_functions();
    program.push(list(vec![
        call(sym("isEven"), vec![arg(int(10))]),
        call(sym("isOdd"), vec![arg(int(7))]),
        call(sym("isEven"), vec![arg(int(3))]),
    ]));
    let v = run(program).unwrap();
    assert_eq!(v.to_string(), "[true, true, false]");
}

#[test]
fn test_default_arguments_and_named_calls() {
    let greet = fun_decl(
        "greet",
        func(
            vec![
                param("name", ty_nn("String")),
                param_default("greeting", Some(ty_nn("String")), string("hello")),
            ],
            None,
            vec![add(add(sym("greeting"), string(", ")), sym("name"))],
        ),
    );
    let v = run(vec![
        greet,
        list(vec![
            call(sym("greet"), vec![arg(string("ann"))]),
            call(sym("greet"), vec![named("greeting", string("hi")), named("name", string("bo"))]),
        ]),
    ])
    .unwrap();
    assert_eq!(v.to_string(), "[\"hello, ann\", \"hi, bo\"]");
}

#[test]
fn test_block_arguments_bind_by_signature_position() {
    let apply = fun_decl(
        "apply",
        func(vec![param("x", ty_nn("Int"))], None, vec![call(sym("f"), vec![named("v", sym("x"))])])
            .with_block_param("f", fn_ty(vec![("v", ty_nn("Int"))], ty_nn("Int"))),
    );
    let v = run(vec![
        apply,
        call_with_block(
            sym("apply"),
            vec![arg(int(4))],
            lambda(vec![untyped("y")], vec![mul(sym("y"), sym("y"))]),
        ),
    ])
    .unwrap();
    assert_eq!(v.as_int(), Some(16));
}

#[test]
fn test_unbounded_recursion_hits_the_limit() {
    let spin = fun_decl(
        "spin",
        func(
            vec![param("n", ty_nn("Int"))],
            Some(ty_nn("Int")),
            vec![call(sym("spin"), vec![arg(add(sym("n"), int(1)))])],
        ),
    );
    let mut interp = Interpreter::new().with_config(EvalConfig { max_depth: 32 });
    let err = interp
        .run(&[spin, call(sym("spin"), vec![arg(int(0))])])
        .unwrap_err();
    assert!(matches!(err, DangError::RecursionLimitExceeded { limit: 32, .. }));
    assert_eq!(err.error_code(), "E0880");
}

// ============================================================================
// Runtime errors
// ============================================================================

#[test]
fn test_division_and_modulo_by_zero() {
    let err = run(vec![div(int(1), int(0))]).unwrap_err();
    assert_eq!(err.error_code(), "E0850");
    assert_eq!(err.to_string(), "division by zero");

    let err = run(vec![modulo(int(5), int(0))]).unwrap_err();
    assert_eq!(err.to_string(), "modulo by zero");
}

#[test]
fn test_float_division_by_zero_is_infinite() {
    let v = run(vec![div(float(1.0), int(0))]).unwrap();
    assert!(matches!(v, Value::Float(f) if f.is_infinite()));
}

#[test]
fn test_errors_keep_the_innermost_location() {
    use source_map::SourceLocation;

    let inner = div(int(1), int(0)).at(SourceLocation::new("main.dang", 3, 7));
    let outer = add(int(1), inner).at(SourceLocation::new("main.dang", 1, 1));
    let err = run(vec![outer]).unwrap_err();
    let loc = err.location().expect("error should carry a location");
    assert_eq!((loc.start.line, loc.start.column), (3, 7));
}

// ============================================================================
// Assertions
// ============================================================================

#[test]
fn test_failed_assertion_lists_operand_values() {
    let err = run(vec![
        let_slot("xs", None, Some(list(vec![int(1), int(2)]))),
        assert_that(vec![eq(sym("xs"), list(vec![int(1)]))]),
    ])
    .unwrap_err();
    assert_eq!(
        err.to_string(),
        "assertion failed: xs == [1]\n  xs: [1, 2]\n  [1]: [1]"
    );
}

#[test]
fn test_passing_assertion_is_null() {
    let v = run(vec![assert_that(vec![eq(add(int(1), int(1)), int(2))])]).unwrap();
    assert!(v.is_null());
}

// ============================================================================
// Session integrity
// ============================================================================

#[test]
fn test_failed_run_leaves_no_names_behind() {
    let mut interp = Interpreter::new();
    let f = fun_decl("f", func(vec![], None, vec![int(1)]));
    let err = interp.run(&[f, sym("nope")]).unwrap_err();
    assert_eq!(err.root_cause().to_string(), "\"nope\" not found");

    // rejected by the checker, not discovered at runtime
    let err = interp.run(&[call(sym("f"), vec![])]).unwrap_err();
    assert_eq!(err.error_code(), "E0801");
    assert!(interp.get("f").is_none());
}

#[test]
fn test_runtime_failure_rolls_back_the_whole_run() {
    let mut interp = Interpreter::new();
    interp.run(&[let_slot("kept", None, Some(int(1)))]).unwrap();

    let err = interp
        .run(&[
            let_slot("before", None, Some(int(2))),
            div(int(1), int(0)),
            let_slot("after", None, Some(int(3))),
        ])
        .unwrap_err();
    assert_eq!(err.error_code(), "E0850");
    assert!(interp.get("before").is_none());
    assert!(interp.get("after").is_none());

    let err = interp.run(&[sym("after")]).unwrap_err();
    assert_eq!(err.error_code(), "E0801");
    let v = interp.run(&[sym("kept")]).unwrap();
    assert_eq!(v.as_int(), Some(1));
}

#[test]
fn test_redeclared_class_does_not_merge_old_fields() {
    let mut interp = Interpreter::new();
    interp
        .run(&[class("Foo", vec![pub_slot("x", Some(ty_nn("Int")), None)])])
        .unwrap();

    let err = interp
        .run(&[
            class("Foo", vec![pub_slot("y", Some(ty_nn("String")), None)]),
            get(call(sym("Foo"), vec![named("y", string("a"))]), "x"),
        ])
        .unwrap_err();
    assert_eq!(err.error_code(), "E0810");
    assert!(err.root_cause().to_string().starts_with("field \"x\" not found"));

    // the same holds when the first declaration was part of a failed run
    let mut interp = Interpreter::new();
    interp
        .run(&[class("Foo", vec![pub_slot("x", Some(ty_nn("Int")), None)]), sym("nope")])
        .unwrap_err();
    let v = interp
        .run(&[
            class("Foo", vec![pub_slot("y", Some(ty_nn("String")), None)]),
            get(call(sym("Foo"), vec![named("y", string("a"))]), "y"),
        ])
        .unwrap();
    assert_eq!(v.as_str(), Some("a"));
}

// ============================================================================
// Self-referencing values
// ============================================================================

fn cell_class() -> Node {
    class(
        "Cell",
        vec![
            let_slot("next", Some(ty("Cell")), Some(null())),
            fun_decl(
                "link",
                func(vec![], None, vec![assign(select(self_ref(), "next"), self_ref()), self_ref()]),
            ),
        ],
    )
}

#[test]
fn test_instance_linked_to_itself_prints_and_compares() {
    let v = run(vec![cell_class(), method(call(sym("Cell"), vec![]), "link", vec![])]).unwrap();
    assert_eq!(v.to_string(), "{next: {next: null}}");

    let v = run(vec![
        cell_class(),
        eq(
            method(call(sym("Cell"), vec![]), "link", vec![]),
            method(call(sym("Cell"), vec![]), "link", vec![]),
        ),
    ])
    .unwrap();
    assert_eq!(v.as_bool(), Some(true));
}

#[test]
fn test_self_stored_through_a_bare_field_name_is_a_snapshot() {
    let v = run(vec![
        class(
            "Node",
            vec![
                pub_slot("label", Some(ty_nn("String")), None),
                let_slot("me", Some(ty("Node")), Some(null())),
                fun_decl(
                    "remember",
                    func(
                        vec![],
                        None,
                        vec![assign(sym("me"), self_ref()), assign(sym("label"), string("later")), self_ref()],
                    ),
                ),
            ],
        ),
        method(call(sym("Node"), vec![named("label", string("first"))]), "remember", vec![]),
    ])
    .unwrap();
    assert_eq!(v.to_string(), "{label: \"later\", me: {label: \"first\", me: null}}");
}

// ============================================================================
// Loops and indexing
// ============================================================================

#[test]
fn test_for_loop_with_index() {
    let v = run(vec![
        let_slot("out", None, Some(list(vec![]))),
        for_indexed(
            "i",
            "s",
            list(vec![string("a"), string("b")]),
            vec![add_assign(sym("out"), list(vec![add(sym("s"), string("!"))])), sym("i")],
        ),
        sym("out"),
    ])
    .unwrap();
    assert_eq!(v.to_string(), "[\"a!\", \"b!\"]");
}

#[test]
fn test_loop_value_is_the_last_iteration() {
    let v = run(vec![for_each("x", list(vec![int(1), int(2), int(3)]), vec![mul(sym("x"), int(10))])]).unwrap();
    assert_eq!(v.as_int(), Some(30));

    let v = run(vec![for_each("x", list(vec![]), vec![int(1)])]).unwrap();
    assert!(v.is_null());
}

#[test]
fn test_while_loop_counts_down() {
    let v = run(vec![
        let_slot("n", None, Some(int(3))),
        let_slot("steps", None, Some(int(0))),
        while_loop(
            gt(sym("n"), int(0)),
            vec![add_assign(sym("n"), sub(int(0), int(1))), add_assign(sym("steps"), int(1))],
        ),
        sym("steps"),
    ])
    .unwrap();
    assert_eq!(v.as_int(), Some(3));
}

#[test]
fn test_break_outside_a_loop_is_rejected() {
    let err = run(vec![break_loop()]).unwrap_err();
    assert_eq!(err.root_cause().to_string(), "break outside of a loop");

    // a function body is not inside the loop it was declared in
    let err = run(vec![for_each(
        "x",
        list(vec![int(1)]),
        vec![fun_decl("f", func(vec![], None, vec![continue_loop()]))],
    )])
    .unwrap_err();
    assert_eq!(err.root_cause().to_string(), "continue outside of a loop");
}

#[test]
fn test_index_into_a_nullable_list() {
    let v = run(vec![
        let_slot("xs", Some(list_ty(ty_nn("Int"))), Some(null())),
        index(sym("xs"), int(0)),
    ])
    .unwrap();
    assert!(v.is_null());

    let v = run(vec![index(list(vec![list(vec![int(1)]), list(vec![int(2)])]), int(1))]).unwrap();
    assert_eq!(v.to_string(), "[2]");
}

// ============================================================================
// Printing
// ============================================================================

#[derive(Clone, Default)]
struct Captured(std::rc::Rc<std::cell::RefCell<Vec<u8>>>);

impl std::io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_print_writes_each_value_on_its_own_line() {
    let out = Captured::default();
    let mut interp = Interpreter::new().with_output(out.clone());
    let v = interp
        .run(&[
            call(sym("print"), vec![arg(string("hello"))]),
            call(sym("print"), vec![arg(list(vec![int(1), int(2)]))]),
            call(sym("print"), vec![arg(object(vec![("a", boolean(true))]))]),
        ])
        .unwrap();
    assert!(v.is_null());
    let printed = String::from_utf8(out.0.borrow().clone()).unwrap();
    assert_eq!(printed, "hello\n[1, 2]\n{a: true}\n");
}
