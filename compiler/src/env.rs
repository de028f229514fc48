//! Type environments: modules and composite scopes
//!
//! Modules live in an arena ([`Modules`]) and refer to their parent by index.
//! A module is at once a namespace (bindings, nested types, directive
//! declarations) and, when named, a nominal type. Cloning a scope creates a
//! fresh child module delegating to the cloned one; nothing is deep-copied.
//!
//! [`Env`] is the handle inference passes around. It is either a plain module
//! or a composite of a `primary` module (looked up first, written to) and a
//! `lexical` fallback that is only ever read through the composite.

use crate::ast::DirectiveApplication;
use crate::types::{RecordType, Scheme, Type};
use fxhash::{FxHashMap, FxHashSet};
use indexmap::IndexMap;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(u32);

impl ModuleId {
    pub fn new(raw: u32) -> Self {
        ModuleId(raw)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    Object,
    Enum,
    Scalar,
    Interface,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Visibility {
    #[default]
    Private,
    Public,
}

/// Where a directive may be applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveLocation {
    FieldDefinition,
    ArgumentDefinition,
    Object,
    Enum,
    Scalar,
    Interface,
}

impl DirectiveLocation {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "FIELD_DEFINITION" => DirectiveLocation::FieldDefinition,
            "ARGUMENT_DEFINITION" => DirectiveLocation::ArgumentDefinition,
            "OBJECT" => DirectiveLocation::Object,
            "ENUM" => DirectiveLocation::Enum,
            "SCALAR" => DirectiveLocation::Scalar,
            "INTERFACE" => DirectiveLocation::Interface,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DirectiveLocation::FieldDefinition => "FIELD_DEFINITION",
            DirectiveLocation::ArgumentDefinition => "ARGUMENT_DEFINITION",
            DirectiveLocation::Object => "OBJECT",
            DirectiveLocation::Enum => "ENUM",
            DirectiveLocation::Scalar => "SCALAR",
            DirectiveLocation::Interface => "INTERFACE",
        }
    }
}

impl fmt::Display for DirectiveLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A declared directive, as registered by a `directive @name(...)` form
#[derive(Debug, Clone)]
pub struct DirectiveSignature {
    pub name: String,
    pub args: RecordType,
    pub locations: Vec<DirectiveLocation>,
}

#[derive(Debug, Clone)]
pub struct ModuleData {
    pub name: Option<Rc<str>>,
    pub kind: ModuleKind,
    pub parent: Option<ModuleId>,
    pub doc: Option<String>,
    vars: IndexMap<String, Scheme>,
    visibility: FxHashMap<String, Visibility>,
    docstrings: FxHashMap<String, String>,
    directives: FxHashMap<String, Vec<DirectiveApplication>>,
    classes: IndexMap<String, ModuleId>,
    declared_directives: IndexMap<String, DirectiveSignature>,
    interfaces: Vec<ModuleId>,
    implementers: Vec<ModuleId>,
    self_type: Option<Type>,
}

impl ModuleData {
    fn new(name: Option<&str>, kind: ModuleKind, parent: Option<ModuleId>) -> Self {
        ModuleData {
            name: name.map(Rc::from),
            kind,
            parent,
            doc: None,
            vars: IndexMap::new(),
            visibility: FxHashMap::default(),
            docstrings: FxHashMap::default(),
            directives: FxHashMap::default(),
            classes: IndexMap::new(),
            declared_directives: IndexMap::new(),
            interfaces: Vec::new(),
            implementers: Vec::new(),
            self_type: None,
        }
    }

    pub fn vars(&self) -> impl Iterator<Item = (&str, &Scheme)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn classes(&self) -> impl Iterator<Item = (&str, ModuleId)> {
        self.classes.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn interfaces(&self) -> &[ModuleId] {
        &self.interfaces
    }

    pub fn implementers(&self) -> &[ModuleId] {
        &self.implementers
    }
}

/// Arena of every module created during a session
#[derive(Debug, Clone, Default)]
pub struct Modules {
    data: Vec<ModuleData>,
}

impl Modules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, name: Option<&str>, kind: ModuleKind, parent: Option<ModuleId>) -> ModuleId {
        let id = ModuleId(self.data.len() as u32);
        self.data.push(ModuleData::new(name, kind, parent));
        id
    }

    pub fn get(&self, id: ModuleId) -> &ModuleData {
        &self.data[id.index()]
    }

    pub fn get_mut(&mut self, id: ModuleId) -> &mut ModuleData {
        &mut self.data[id.index()]
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The module as a (nullable) type
    pub fn type_of(&self, id: ModuleId) -> Type {
        let data = self.get(id);
        Type::Module(crate::types::ModuleType {
            id,
            name: data.name.clone(),
        })
    }

    pub fn kind(&self, id: ModuleId) -> ModuleKind {
        self.get(id).kind
    }

    pub fn name(&self, id: ModuleId) -> &str {
        self.get(id).name.as_deref().unwrap_or("{...}")
    }

    /// Record that `class` implements `iface`, in both directions
    pub fn add_interface(&mut self, class: ModuleId, iface: ModuleId) {
        if !self.get(class).interfaces.contains(&iface) {
            self.get_mut(class).interfaces.push(iface);
        }
        if !self.get(iface).implementers.contains(&class) {
            self.get_mut(iface).implementers.push(class);
        }
    }

    /// Whether `module` implements `iface`, directly or transitively
    pub fn implements(&self, module: ModuleId, iface: ModuleId) -> bool {
        let mut seen = FxHashSet::default();
        let mut stack = vec![module];
        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            for &parent in &self.get(current).interfaces {
                if parent == iface {
                    return true;
                }
                stack.push(parent);
            }
        }
        false
    }

    /// All interfaces reachable from `module`, nearest first
    pub fn all_interfaces(&self, module: ModuleId) -> Vec<ModuleId> {
        let mut out: Vec<ModuleId> = Vec::new();
        let mut queue = std::collections::VecDeque::from([module]);
        while let Some(current) = queue.pop_front() {
            for &iface in &self.get(current).interfaces {
                if !out.contains(&iface) {
                    out.push(iface);
                    queue.push_back(iface);
                }
            }
        }
        out
    }

    /// Render a type, spelling out anonymous modules field by field
    pub fn show(&self, ty: &Type) -> String {
        self.show_depth(ty, 0)
    }

    fn show_depth(&self, ty: &Type, depth: usize) -> String {
        match ty {
            Type::Module(m) if m.name.is_none() && depth < 4 => {
                let fields: Vec<String> = self
                    .get(m.id)
                    .vars
                    .iter()
                    .map(|(k, s)| format!("{}: {}", k, self.show_depth(s.ty(), depth + 1)))
                    .collect();
                format!("{{{}}}", fields.join(", "))
            }
            Type::NonNull(inner) => format!("{}!", self.show_depth(inner, depth)),
            Type::List(inner) | Type::OpaqueList(inner) => format!("[{}]", self.show_depth(inner, depth)),
            other => other.to_string(),
        }
    }
}

/// A scope handle: a plain module, or a primary module over a lexical fallback
#[derive(Debug, Clone)]
pub enum Env {
    Module(ModuleId),
    Composite { primary: ModuleId, lexical: Rc<Env> },
}

impl Env {
    pub fn composite(primary: ModuleId, lexical: &Env) -> Env {
        Env::Composite {
            primary,
            lexical: Rc::new(lexical.clone()),
        }
    }

    /// The module new bindings are written to
    pub fn primary(&self) -> ModuleId {
        match self {
            Env::Module(id) => *id,
            Env::Composite { primary, .. } => *primary,
        }
    }

    /// Look up a binding in the module chain starting at `id`
    fn module_lookup<'m, T>(
        modules: &'m Modules,
        mut id: ModuleId,
        get: impl Fn(&'m ModuleData) -> Option<T>,
    ) -> Option<T> {
        loop {
            let data = modules.get(id);
            if let Some(found) = get(data) {
                return Some(found);
            }
            id = data.parent?;
        }
    }

    fn lookup<'m, T>(&self, modules: &'m Modules, get: impl Fn(&'m ModuleData) -> Option<T> + Copy) -> Option<T> {
        match self {
            Env::Module(id) => Self::module_lookup(modules, *id, get),
            Env::Composite { primary, lexical } => {
                Self::module_lookup(modules, *primary, get).or_else(|| lexical.lookup(modules, get))
            }
        }
    }

    pub fn scheme_of(&self, modules: &Modules, name: &str) -> Option<Scheme> {
        self.lookup(modules, |m| m.vars.get(name).cloned())
    }

    /// Binding in the primary module only, without parent fallback
    pub fn local_scheme_of(&self, modules: &Modules, name: &str) -> Option<Scheme> {
        modules.get(self.primary()).vars.get(name).cloned()
    }

    /// Declare a binding; first declaration defaults to private visibility
    pub fn add(&self, modules: &mut Modules, name: &str, scheme: Scheme) {
        let data = modules.get_mut(self.primary());
        data.vars.insert(name.to_string(), scheme);
        data.visibility.entry(name.to_string()).or_insert(Visibility::Private);
    }

    pub fn set_visibility(&self, modules: &mut Modules, name: &str, vis: Visibility) {
        modules.get_mut(self.primary()).visibility.insert(name.to_string(), vis);
    }

    pub fn visibility(&self, modules: &Modules, name: &str) -> Visibility {
        self.lookup(modules, |m| m.visibility.get(name).copied())
            .unwrap_or_default()
    }

    pub fn named_type(&self, modules: &Modules, name: &str) -> Option<ModuleId> {
        self.lookup(modules, |m| m.classes.get(name).copied())
    }

    /// Named type registered directly in the primary module
    pub fn local_named_type(&self, modules: &Modules, name: &str) -> Option<ModuleId> {
        modules.get(self.primary()).classes.get(name).copied()
    }

    pub fn add_class(&self, modules: &mut Modules, name: &str, class: ModuleId) {
        modules.get_mut(self.primary()).classes.insert(name.to_string(), class);
    }

    pub fn set_docstring(&self, modules: &mut Modules, name: &str, doc: &str) {
        modules
            .get_mut(self.primary())
            .docstrings
            .insert(name.to_string(), doc.to_string());
    }

    pub fn docstring(&self, modules: &Modules, name: &str) -> Option<String> {
        self.lookup(modules, |m| m.docstrings.get(name).cloned())
    }

    pub fn set_directives(&self, modules: &mut Modules, name: &str, directives: Vec<DirectiveApplication>) {
        modules
            .get_mut(self.primary())
            .directives
            .insert(name.to_string(), directives);
    }

    pub fn directives(&self, modules: &Modules, name: &str) -> Vec<DirectiveApplication> {
        self.lookup(modules, |m| m.directives.get(name).cloned())
            .unwrap_or_default()
    }

    pub fn add_directive(&self, modules: &mut Modules, directive: DirectiveSignature) {
        modules
            .get_mut(self.primary())
            .declared_directives
            .insert(directive.name.clone(), directive);
    }

    pub fn directive(&self, modules: &Modules, name: &str) -> Option<DirectiveSignature> {
        self.lookup(modules, |m| m.declared_directives.get(name).cloned())
    }

    /// Type of `self` in this scope, if inside a class or interface body
    pub fn dynamic_scope_type(&self, modules: &Modules) -> Option<Type> {
        self.lookup(modules, |m| m.self_type.clone())
    }

    pub fn set_dynamic_scope_type(&self, modules: &mut Modules, ty: Type) {
        modules.get_mut(self.primary()).self_type = Some(ty);
    }

    /// Bindings at or above `min` visibility, in declaration order.
    ///
    /// A plain module yields its own bindings; a composite yields the
    /// primary's, then the lexical ones it does not shadow.
    pub fn bindings(&self, modules: &Modules, min: Visibility) -> Vec<(String, Scheme)> {
        match self {
            Env::Module(id) => {
                let data = modules.get(*id);
                data.vars
                    .iter()
                    .filter(|(k, _)| data.visibility.get(*k).copied().unwrap_or_default() >= min)
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            }
            Env::Composite { primary, lexical } => {
                let mut out = Env::Module(*primary).bindings(modules, min);
                let seen: FxHashSet<String> = out.iter().map(|(k, _)| k.clone()).collect();
                out.extend(
                    lexical
                        .bindings(modules, min)
                        .into_iter()
                        .filter(|(k, _)| !seen.contains(k)),
                );
                out
            }
        }
    }

    /// A fresh child scope delegating to this one
    pub fn clone_env(&self, modules: &mut Modules) -> Env {
        match self {
            Env::Module(id) => {
                let data = modules.get(*id);
                let (name, kind) = (data.name.clone(), data.kind);
                let child = modules.create(name.as_deref(), kind, Some(*id));
                Env::Module(child)
            }
            Env::Composite { primary, lexical } => {
                let child = Env::Module(*primary).clone_env(modules);
                Env::Composite {
                    primary: child.primary(),
                    lexical: lexical.clone(),
                }
            }
        }
    }
}

/// Handles to the builtin scalar types
#[derive(Debug, Clone, Copy)]
pub struct Builtins {
    pub id: ModuleId,
    pub string: ModuleId,
    pub int: ModuleId,
    pub float: ModuleId,
    pub boolean: ModuleId,
}

pub const BUILTIN_TYPE_NAMES: [&str; 5] = ["ID", "String", "Int", "Float", "Boolean"];

/// Root scope with the builtin types registered
#[derive(Debug, Clone)]
pub struct Prelude {
    pub env: Env,
    pub builtins: Builtins,
}

/// Create the root module and register the builtin scalars in it.
///
/// Called once per session by the embedder; there are no global type
/// singletons.
pub fn build_prelude(modules: &mut Modules) -> Prelude {
    let root = modules.create(Some("Prelude"), ModuleKind::Object, None);
    let env = Env::Module(root);

    let mut scalar = |name: &str| {
        let id = modules.create(Some(name), ModuleKind::Scalar, None);
        env.add_class(modules, name, id);
        id
    };
    let builtins = Builtins {
        id: scalar("ID"),
        string: scalar("String"),
        int: scalar("Int"),
        float: scalar("Float"),
        boolean: scalar("Boolean"),
    };

    Prelude { env, builtins }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Modules, Prelude) {
        let mut modules = Modules::new();
        let prelude = build_prelude(&mut modules);
        (modules, prelude)
    }

    #[test]
    fn test_prelude_types() {
        let (modules, prelude) = setup();
        for name in BUILTIN_TYPE_NAMES {
            let id = prelude.env.named_type(&modules, name).unwrap();
            assert_eq!(modules.name(id), name);
            assert_eq!(modules.kind(id), ModuleKind::Scalar);
        }
        assert_eq!(prelude.env.named_type(&modules, "Int"), Some(prelude.builtins.int));
    }

    #[test]
    fn test_clone_delegates_to_parent() {
        let (mut modules, prelude) = setup();
        let int = modules.type_of(prelude.builtins.int).non_null();
        prelude.env.add(&mut modules, "x", Scheme::mono(int.clone()));

        let child = prelude.env.clone_env(&mut modules);
        assert_eq!(child.scheme_of(&modules, "x").map(Scheme::into_type), Some(int.clone()));
        assert!(child.local_scheme_of(&modules, "x").is_none());

        child.add(&mut modules, "y", Scheme::mono(int));
        assert!(prelude.env.scheme_of(&modules, "y").is_none());
    }

    #[test]
    fn test_add_defaults_to_private_once() {
        let (mut modules, prelude) = setup();
        let int = modules.type_of(prelude.builtins.int);
        let env = prelude.env.clone_env(&mut modules);

        env.set_visibility(&mut modules, "x", Visibility::Public);
        env.add(&mut modules, "x", Scheme::mono(int.clone()));
        assert_eq!(env.visibility(&modules, "x"), Visibility::Public);

        env.add(&mut modules, "y", Scheme::mono(int));
        assert_eq!(env.visibility(&modules, "y"), Visibility::Private);
    }

    #[test]
    fn test_composite_lookup_and_writes() {
        let (mut modules, prelude) = setup();
        let int = modules.type_of(prelude.builtins.int);
        let string = modules.type_of(prelude.builtins.string);

        let outer = prelude.env.clone_env(&mut modules);
        outer.add(&mut modules, "shadowed", Scheme::mono(int.clone()));
        outer.add(&mut modules, "outer_only", Scheme::mono(int.clone()));

        let class = modules.create(Some("Foo"), ModuleKind::Object, None);
        Env::Module(class).add(&mut modules, "shadowed", Scheme::mono(string.clone()));

        let composite = Env::composite(class, &outer);
        assert_eq!(composite.scheme_of(&modules, "shadowed").map(Scheme::into_type), Some(string));
        assert!(composite.scheme_of(&modules, "outer_only").is_some());
        assert!(composite.local_scheme_of(&modules, "outer_only").is_none());

        composite.add(&mut modules, "new_field", Scheme::mono(int));
        assert!(Env::Module(class).local_scheme_of(&modules, "new_field").is_some());
        assert!(outer.local_scheme_of(&modules, "new_field").is_none());

        let names: Vec<String> = composite
            .bindings(&modules, Visibility::Private)
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(names, vec!["shadowed", "new_field", "outer_only"]);
    }

    #[test]
    fn test_composite_clone_keeps_lexical() {
        let (mut modules, prelude) = setup();
        let class = modules.create(Some("Foo"), ModuleKind::Object, None);
        let composite = Env::composite(class, &prelude.env);

        let cloned = composite.clone_env(&mut modules);
        assert_ne!(cloned.primary(), class);
        assert_eq!(modules.get(cloned.primary()).parent, Some(class));
        assert!(cloned.named_type(&modules, "String").is_some());
    }

    #[test]
    fn test_bindings_filter_visibility() {
        let (mut modules, prelude) = setup();
        let int = modules.type_of(prelude.builtins.int);
        let env = Env::Module(modules.create(Some("M"), ModuleKind::Object, None));

        env.add(&mut modules, "hidden", Scheme::mono(int.clone()));
        env.add(&mut modules, "shown", Scheme::mono(int));
        env.set_visibility(&mut modules, "shown", Visibility::Public);

        let public: Vec<String> = env
            .bindings(&modules, Visibility::Public)
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(public, vec!["shown"]);
    }

    #[test]
    fn test_transitive_interfaces() {
        let mut modules = Modules::new();
        let node = modules.create(Some("Node"), ModuleKind::Interface, None);
        let named = modules.create(Some("Named"), ModuleKind::Interface, None);
        let user = modules.create(Some("User"), ModuleKind::Object, None);

        modules.add_interface(named, node);
        modules.add_interface(user, named);

        assert!(modules.implements(user, node));
        assert!(!modules.implements(node, user));
        assert_eq!(modules.all_interfaces(user), vec![named, node]);
        assert_eq!(modules.get(node).implementers(), &[named]);
    }
}
