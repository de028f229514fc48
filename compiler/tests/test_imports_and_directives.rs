//! Schema imports through a static provider, and directive declarations

use compiler::ast::build::*;
use compiler::errors::DangError;
use compiler::import::{ImportConfig, StaticSchemaProvider};
use compiler::schema::Schema;
use compiler::{Checker, Interpreter};

const SHOP_SCHEMA: &str = r#"{
  "__schema": {
    "queryType": {"name": "Query"},
    "types": [
      {"kind": "OBJECT", "name": "Query", "fields": [
        {"name": "viewer", "args": [], "type": {"kind": "NON_NULL", "ofType": {"kind": "OBJECT", "name": "Customer"}}},
        {"name": "order", "args": [
            {"name": "number", "type": {"kind": "NON_NULL", "ofType": {"kind": "SCALAR", "name": "String"}}}
          ],
          "type": {"kind": "OBJECT", "name": "Order"}}
      ]},
      {"kind": "OBJECT", "name": "Customer", "fields": [
        {"name": "email", "args": [], "type": {"kind": "NON_NULL", "ofType": {"kind": "SCALAR", "name": "String"}}}
      ]},
      {"kind": "OBJECT", "name": "Order", "fields": [
        {"name": "status", "args": [], "type": {"kind": "NON_NULL", "ofType": {"kind": "ENUM", "name": "OrderStatus"}}}
      ]},
      {"kind": "ENUM", "name": "OrderStatus", "enumValues": [{"name": "OPEN"}, {"name": "SHIPPED"}, {"name": "CLOSED"}]},
      {"kind": "SCALAR", "name": "String"},
      {"kind": "SCALAR", "name": "ID"}
    ]
  }
}"#;

fn shop_checker() -> Checker {
    let schema = Schema::from_json(SHOP_SCHEMA).unwrap();
    Checker::new()
        .with_import_config(ImportConfig::empty())
        .with_schema_provider(StaticSchemaProvider::new().with_schema("shop.example.com", schema))
}

// ============================================================================
// Imports
// ============================================================================

#[test]
fn test_imported_fields_are_typed() {
    let mut checker = shop_checker();
    let ty = checker
        .infer_program(&[
            import("shop.example.com", Some("Shop")),
            get(get(auto("Shop"), "viewer"), "email"),
        ])
        .unwrap();
    assert_eq!(checker.show(&ty), "String!");

    let ty = checker
        .infer_program(&[get(call(select(auto("Shop"), "order"), vec![named("number", string("1"))]), "status")])
        .unwrap();
    // `order` may return null, so the selection is nullable too
    assert_eq!(checker.show(&ty), "OrderStatus");
}

#[test]
fn test_imported_types_are_usable_in_annotations() {
    let mut checker = shop_checker();
    checker
        .infer_program(&[
            import("shop.example.com", Some("Shop")),
            let_slot(
                "s",
                Some(qualified_ty("Shop", "OrderStatus")),
                Some(get(get(auto("Shop"), "OrderStatus"), "OPEN")),
            ),
        ])
        .unwrap();
}

#[test]
fn test_imported_enums_evaluate_locally() {
    let mut interp = Interpreter::with_checker(shop_checker());
    let v = interp
        .run(&[
            import("shop.example.com", Some("Shop")),
            method(get(auto("Shop"), "OrderStatus"), "values", vec![]),
        ])
        .unwrap();
    assert_eq!(v.to_string(), "[OPEN, SHIPPED, CLOSED]");
}

#[test]
fn test_remote_fields_are_not_evaluated() {
    let mut interp = Interpreter::with_checker(shop_checker());
    let err = interp
        .run(&[
            import("shop.example.com", Some("Shop")),
            get(auto("Shop"), "viewer"),
        ])
        .unwrap_err();
    assert_eq!(err.error_code(), "E0870");
    assert_eq!(err.to_string(), "calling remote field Shop.viewer is not supported");
}

#[test]
fn test_unknown_import_source() {
    let mut checker = shop_checker();
    let err = checker
        .infer_program(&[import("elsewhere.example.com", Some("Else"))])
        .unwrap_err();
    assert_eq!(err.error_code(), "E0895");
    assert!(err.to_string().starts_with("import \"elsewhere.example.com\""));
}

// ============================================================================
// Directives
// ============================================================================

fn deprecated() -> compiler::ast::Node {
    directive_decl(
        "deprecated",
        vec![param_default("reason", Some(ty("String")), string("no longer supported"))],
        &["FIELD_DEFINITION"],
    )
}

#[test]
fn test_directive_applications_are_recorded() {
    let mut checker = Checker::new();
    let field = with_directives(
        pub_slot("old", None, Some(int(1))),
        vec![apply_directive("deprecated", vec![named("reason", string("use new"))])],
    );
    checker.infer_program(&[deprecated(), field]).unwrap();

    let applied = checker.env().directives(&checker.modules, "old");
    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].name, "deprecated");
}

#[test]
fn test_directive_declared_after_use() {
    let mut checker = Checker::new();
    let field = with_directives(
        pub_slot("old", None, Some(int(1))),
        vec![apply_directive("deprecated", vec![])],
    );
    checker.infer_program(&[field, deprecated()]).unwrap();
}

#[test]
fn test_directive_on_wrong_location() {
    let mut checker = Checker::new();
    let decl = with_directives(class("Thing", vec![]), vec![apply_directive("deprecated", vec![])]);
    let err = checker.infer_program(&[deprecated(), decl]).unwrap_err();
    assert_eq!(err.to_string(), "directive @deprecated cannot be applied to OBJECT");
}

#[test]
fn test_undeclared_directive() {
    let mut checker = Checker::new();
    let field = with_directives(
        pub_slot("x", None, Some(int(1))),
        vec![apply_directive("nope", vec![])],
    );
    let err = checker.infer_program(&[field]).unwrap_err();
    assert!(matches!(err.root_cause(), DangError::UnresolvedType { .. }));
}
