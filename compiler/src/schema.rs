//! GraphQL introspection schemas and their translation into modules
//!
//! The structs below mirror the standard introspection query result. Only
//! the parts the type system needs are kept; unknown keys are ignored.

use crate::env::{DirectiveLocation, DirectiveSignature, Env, ModuleId, ModuleKind, Modules, Prelude, Visibility};
use crate::errors::{DangError, Result};
use crate::types::{FunctionType, RecordType, Type};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TypeKind {
    Scalar,
    Object,
    Interface,
    Union,
    Enum,
    InputObject,
    List,
    NonNull,
}

/// Reference to a type from a field or argument
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeRef {
    pub kind: TypeKind,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub of_type: Option<Box<TypeRef>>,
}

impl TypeRef {
    pub fn named(kind: TypeKind, name: &str) -> Self {
        TypeRef {
            kind,
            name: Some(name.to_string()),
            of_type: None,
        }
    }

    pub fn wrap(kind: TypeKind, inner: TypeRef) -> Self {
        TypeRef {
            kind,
            name: None,
            of_type: Some(Box::new(inner)),
        }
    }

    /// The kind underneath any `NON_NULL` wrapper
    fn unwrapped_kind(&self) -> TypeKind {
        match (&self.kind, &self.of_type) {
            (TypeKind::NonNull, Some(inner)) => inner.unwrapped_kind(),
            (kind, _) => *kind,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputValue {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub type_ref: TypeRef,
    #[serde(default)]
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub args: Vec<InputValue>,
    #[serde(rename = "type")]
    pub type_ref: TypeRef,
    #[serde(default)]
    pub is_deprecated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumValue {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullType {
    pub kind: TypeKind,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub fields: Option<Vec<Field>>,
    #[serde(default)]
    pub input_fields: Option<Vec<InputValue>>,
    #[serde(default)]
    pub interfaces: Option<Vec<TypeRef>>,
    #[serde(default)]
    pub enum_values: Option<Vec<EnumValue>>,
    #[serde(default)]
    pub possible_types: Option<Vec<TypeRef>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootType {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectiveDef {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub args: Vec<InputValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    pub query_type: RootType,
    #[serde(default)]
    pub mutation_type: Option<RootType>,
    #[serde(default)]
    pub subscription_type: Option<RootType>,
    #[serde(default)]
    pub types: Vec<FullType>,
    #[serde(default)]
    pub directives: Vec<DirectiveDef>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Envelope {
    Data { data: Inner },
    Bare(Inner),
}

#[derive(Deserialize)]
struct Inner {
    #[serde(rename = "__schema")]
    schema: Schema,
}

impl Schema {
    /// Parse introspection JSON, with or without the `data` envelope
    pub fn from_json(json: &str) -> Result<Schema> {
        let envelope: Envelope = serde_json::from_str(json)?;
        Ok(match envelope {
            Envelope::Data { data } => data.schema,
            Envelope::Bare(inner) => inner.schema,
        })
    }

    pub fn type_named(&self, name: &str) -> Option<&FullType> {
        self.types.iter().find(|t| t.name == name)
    }
}

fn is_builtin_scalar(name: &str) -> bool {
    crate::env::BUILTIN_TYPE_NAMES.contains(&name)
}

/// Build a module for `schema`, named `name`.
///
/// Every schema type becomes a named type of the module; builtin scalars
/// resolve to the prelude. Root query fields are also bound directly on the
/// module so `Alias.field` works without going through the query type.
pub fn new_env(modules: &mut Modules, schema: &Schema, prelude: &Prelude, name: &str) -> Result<ModuleId> {
    let root = modules.create(Some(name), ModuleKind::Object, None);
    let env = Env::composite(root, &prelude.env);

    for t in &schema.types {
        if is_builtin_scalar(&t.name) {
            continue;
        }
        let kind = match t.kind {
            TypeKind::Object | TypeKind::InputObject => ModuleKind::Object,
            TypeKind::Interface | TypeKind::Union => ModuleKind::Interface,
            TypeKind::Enum => ModuleKind::Enum,
            TypeKind::Scalar => ModuleKind::Scalar,
            TypeKind::List | TypeKind::NonNull => {
                warn!("skipping schema type {} of kind {:?}", t.name, t.kind);
                continue;
            }
        };
        let id = modules.create(Some(&t.name), kind, None);
        modules.get_mut(id).doc = t.description.clone();
        env.add_class(modules, &t.name, id);

        if matches!(kind, ModuleKind::Enum | ModuleKind::Scalar | ModuleKind::Interface) {
            let ty = modules.type_of(id).non_null();
            env.add(modules, &t.name, ty.into());
            env.set_visibility(modules, &t.name, Visibility::Public);
        }
    }

    for t in &schema.types {
        let Some(install) = env.local_named_type(modules, &t.name) else {
            continue;
        };
        let scope = Env::Module(install);

        if let Some(values) = &t.enum_values {
            let enum_ty = modules.type_of(install).non_null();
            for value in values {
                scope.add(modules, &value.name, enum_ty.clone().into());
                scope.set_visibility(modules, &value.name, Visibility::Public);
                if let Some(doc) = &value.description {
                    scope.set_docstring(modules, &value.name, doc);
                }
            }
            let values_fn = FunctionType::new(RecordType::new(), Type::list(enum_ty).non_null());
            scope.add(modules, "values", Type::function(values_fn).into());
            scope.set_visibility(modules, "values", Visibility::Public);
        }

        for field in t.fields.iter().flatten() {
            let ret = gql_type(modules, &env, &field.type_ref)?;
            let args = gql_args(modules, &env, &field.args)?;
            scope.add(modules, &field.name, Type::function(FunctionType::new(args, ret)).into());
            scope.set_visibility(modules, &field.name, Visibility::Public);
            if let Some(doc) = &field.description {
                scope.set_docstring(modules, &field.name, doc);
            }
        }

        for input in t.input_fields.iter().flatten() {
            let ty = gql_type(modules, &env, &input.type_ref)?;
            scope.add(modules, &input.name, ty.into());
            scope.set_visibility(modules, &input.name, Visibility::Public);
            if let Some(doc) = &input.description {
                scope.set_docstring(modules, &input.name, doc);
            }
        }
    }

    link_interfaces(modules, &env, schema);
    install_directives(modules, &env, schema)?;

    if let Some(query) = env.local_named_type(modules, &schema.query_type.name) {
        for (field, scheme) in Env::Module(query).bindings(modules, Visibility::Public) {
            if env.local_scheme_of(modules, &field).is_none() {
                env.add(modules, &field, scheme);
                env.set_visibility(modules, &field, Visibility::Public);
            }
        }
    }

    debug!("schema module {}: {} types", name, schema.types.len());
    Ok(root)
}

fn gql_args(modules: &Modules, env: &Env, args: &[InputValue]) -> Result<RecordType> {
    let mut record = RecordType::new();
    for arg in args {
        let ty = gql_type(modules, env, &arg.type_ref)?;
        let ty = if arg.default_value.is_some() { ty.nullable() } else { ty };
        record.add(arg.name.clone(), ty);
    }
    Ok(record)
}

/// Translate an introspection type reference.
///
/// Lists of objects become opaque lists. A scalar named `FooID` refers to
/// the object `Foo` when the schema has one.
pub fn gql_type(modules: &Modules, env: &Env, type_ref: &TypeRef) -> Result<Type> {
    match type_ref.kind {
        TypeKind::List => {
            let elem_ref = of_type(type_ref)?;
            let elem = gql_type(modules, env, elem_ref)?;
            if matches!(elem_ref.unwrapped_kind(), TypeKind::Object | TypeKind::Interface) {
                Ok(Type::opaque_list(elem))
            } else {
                Ok(Type::list(elem))
            }
        }
        TypeKind::NonNull => Ok(gql_type(modules, env, of_type(type_ref)?)?.non_null()),
        kind => {
            let name = type_ref
                .name
                .as_deref()
                .ok_or_else(|| schema_error(format!("{:?} type without a name", kind)))?;
            if kind == TypeKind::Scalar && name != "ID" {
                if let Some(object) = name.strip_suffix("ID").and_then(|n| env.named_type(modules, n)) {
                    if modules.kind(object) == ModuleKind::Object {
                        return Ok(modules.type_of(object));
                    }
                }
            }
            env.named_type(modules, name)
                .map(|id| modules.type_of(id))
                .ok_or_else(|| schema_error(format!("{:?} {:?} not found", kind, name)))
        }
    }
}

fn of_type(type_ref: &TypeRef) -> Result<&TypeRef> {
    type_ref
        .of_type
        .as_deref()
        .ok_or_else(|| schema_error(format!("{:?} type without ofType", type_ref.kind)))
}

fn schema_error(message: String) -> DangError {
    DangError::Schema { message }
}

fn link_interfaces(modules: &mut Modules, env: &Env, schema: &Schema) {
    for t in &schema.types {
        let Some(implementer) = env.local_named_type(modules, &t.name) else {
            continue;
        };
        for iface in t.interfaces.iter().flatten() {
            let Some(iface_name) = iface.name.as_deref() else {
                continue;
            };
            match env.local_named_type(modules, iface_name) {
                Some(iface_id) => {
                    modules.add_interface(implementer, iface_id);
                    debug!("linked {} to interface {}", t.name, iface_name);
                }
                None => warn!("interface {} not found for {}", iface_name, t.name),
            }
        }

        if t.kind == TypeKind::Union {
            for member in t.possible_types.iter().flatten() {
                if let Some(member_id) = member.name.as_deref().and_then(|n| env.local_named_type(modules, n)) {
                    modules.add_interface(member_id, implementer);
                }
            }
        }
    }
}

fn install_directives(modules: &mut Modules, env: &Env, schema: &Schema) -> Result<()> {
    for directive in &schema.directives {
        let args = gql_args(modules, env, &directive.args)?;
        let locations = directive
            .locations
            .iter()
            .filter_map(|loc| DirectiveLocation::parse(loc))
            .collect();
        env.add_directive(
            modules,
            DirectiveSignature {
                name: directive.name.clone(),
                args,
                locations,
            },
        );
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod fixtures {
    /// A small schema shaped like a code-hosting API
    pub const HUB_SCHEMA: &str = r#"{
      "data": {
        "__schema": {
          "queryType": {"name": "Query"},
          "types": [
            {"kind": "OBJECT", "name": "Query", "fields": [
              {"name": "viewer", "args": [], "type": {"kind": "NON_NULL", "ofType": {"kind": "OBJECT", "name": "User"}}},
              {"name": "repository", "args": [
                  {"name": "name", "type": {"kind": "NON_NULL", "ofType": {"kind": "SCALAR", "name": "String"}}},
                  {"name": "owner", "type": {"kind": "NON_NULL", "ofType": {"kind": "SCALAR", "name": "String"}}, "defaultValue": "\"octo\""}
                ],
                "type": {"kind": "OBJECT", "name": "Repository"}}
            ]},
            {"kind": "OBJECT", "name": "User", "description": "A person", "interfaces": [{"kind": "INTERFACE", "name": "Node"}], "fields": [
              {"name": "id", "args": [], "type": {"kind": "NON_NULL", "ofType": {"kind": "SCALAR", "name": "ID"}}},
              {"name": "login", "args": [], "type": {"kind": "NON_NULL", "ofType": {"kind": "SCALAR", "name": "String"}}},
              {"name": "repositories", "args": [], "type": {"kind": "NON_NULL", "ofType": {"kind": "LIST", "ofType": {"kind": "NON_NULL", "ofType": {"kind": "OBJECT", "name": "Repository"}}}}},
              {"name": "tags", "args": [], "type": {"kind": "LIST", "ofType": {"kind": "SCALAR", "name": "String"}}}
            ]},
            {"kind": "OBJECT", "name": "Repository", "interfaces": [{"kind": "INTERFACE", "name": "Node"}], "fields": [
              {"name": "id", "args": [], "type": {"kind": "NON_NULL", "ofType": {"kind": "SCALAR", "name": "ID"}}},
              {"name": "visibility", "args": [], "type": {"kind": "ENUM", "name": "Visibility"}},
              {"name": "owner", "args": [], "type": {"kind": "SCALAR", "name": "UserID"}}
            ]},
            {"kind": "INTERFACE", "name": "Node", "fields": [
              {"name": "id", "args": [], "type": {"kind": "NON_NULL", "ofType": {"kind": "SCALAR", "name": "ID"}}}
            ]},
            {"kind": "ENUM", "name": "Visibility", "enumValues": [{"name": "PUBLIC"}, {"name": "PRIVATE", "description": "Hidden"}]},
            {"kind": "SCALAR", "name": "UserID"},
            {"kind": "SCALAR", "name": "DateTime"},
            {"kind": "SCALAR", "name": "String"},
            {"kind": "SCALAR", "name": "ID"}
          ],
          "directives": [
            {"name": "cached", "locations": ["FIELD_DEFINITION", "QUERY"], "args": [
              {"name": "ttl", "type": {"kind": "NON_NULL", "ofType": {"kind": "SCALAR", "name": "Int"}}}
            ]}
          ]
        }
      }
    }"#;
}

#[cfg(test)]
mod tests {
    use super::fixtures::HUB_SCHEMA;
    use super::*;
    use crate::env::build_prelude;

    fn load() -> (Modules, Prelude, ModuleId) {
        let schema = Schema::from_json(HUB_SCHEMA).unwrap();
        let mut modules = Modules::new();
        let prelude = build_prelude(&mut modules);
        let root = new_env(&mut modules, &schema, &prelude, "Hub").unwrap();
        (modules, prelude, root)
    }

    fn field_type(modules: &Modules, root: ModuleId, ty: &str, field: &str) -> String {
        let id = Env::Module(root).named_type(modules, ty).unwrap();
        let scheme = Env::Module(id).local_scheme_of(modules, field).unwrap();
        modules.show(scheme.ty())
    }

    #[test]
    fn test_parse_both_envelopes() {
        let wrapped = Schema::from_json(HUB_SCHEMA).unwrap();
        let bare = format!(
            r#"{{"__schema": {}}}"#,
            serde_json::to_string(&wrapped).unwrap()
        );
        let schema = Schema::from_json(&bare).unwrap();
        assert_eq!(schema.query_type.name, "Query");
        assert!(schema.type_named("User").is_some());
    }

    #[test]
    fn test_invalid_json_is_schema_error() {
        let err = Schema::from_json("{\"nope\": 1}").unwrap_err();
        assert_eq!(err.error_code(), "E0895");
    }

    #[test]
    fn test_fields_become_functions() {
        let (modules, _, root) = load();
        assert_eq!(field_type(&modules, root, "User", "login"), "() -> String!");
        assert_eq!(field_type(&modules, root, "User", "tags"), "() -> [String]");
        assert_eq!(
            field_type(&modules, root, "Query", "repository"),
            "(name: String!, owner: String) -> Repository"
        );
    }

    #[test]
    fn test_object_lists_are_opaque() {
        let (modules, _, root) = load();
        let user = Env::Module(root).named_type(&modules, "User").unwrap();
        let scheme = Env::Module(user).local_scheme_of(&modules, "repositories").unwrap();
        let ret = scheme.ty().as_function().unwrap().ret.clone();
        assert!(matches!(ret.nullable(), Type::OpaqueList(_)));
    }

    #[test]
    fn test_id_scalars_refer_to_objects() {
        let (modules, _, root) = load();
        assert_eq!(field_type(&modules, root, "Repository", "owner"), "() -> User");
    }

    #[test]
    fn test_builtins_resolve_to_prelude() {
        let (modules, prelude, root) = load();
        let string = Env::composite(root, &prelude.env).named_type(&modules, "String");
        assert_eq!(string, Some(prelude.builtins.string));
        assert!(Env::Module(root).local_named_type(&modules, "String").is_none());
    }

    #[test]
    fn test_interfaces_and_enums() {
        let (modules, _, root) = load();
        let env = Env::Module(root);
        let node = env.named_type(&modules, "Node").unwrap();
        let user = env.named_type(&modules, "User").unwrap();
        assert!(modules.implements(user, node));
        assert_eq!(modules.get(node).implementers().len(), 2);

        let visibility = env.named_type(&modules, "Visibility").unwrap();
        assert_eq!(modules.kind(visibility), ModuleKind::Enum);
        assert_eq!(
            Env::Module(visibility).docstring(&modules, "PRIVATE").as_deref(),
            Some("Hidden")
        );
        assert!(env.local_scheme_of(&modules, "Visibility").is_some());
    }

    #[test]
    fn test_query_fields_on_root() {
        let (modules, _, root) = load();
        let env = Env::Module(root);
        assert!(env.local_scheme_of(&modules, "viewer").is_some());
        assert_eq!(env.visibility(&modules, "repository"), Visibility::Public);
    }

    #[test]
    fn test_directives_keep_known_locations() {
        let (modules, _, root) = load();
        let cached = Env::Module(root).directive(&modules, "cached").unwrap();
        assert_eq!(cached.locations, vec![DirectiveLocation::FieldDefinition]);
        assert_eq!(modules.show(cached.args.scheme_of("ttl").unwrap().ty()), "Int!");
    }
}
