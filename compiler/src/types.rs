//! The Dang type algebra
//!
//! A closed set of GraphQL-shaped types: named modules, non-null and list
//! wrappers, the opaque GraphQL list, structural records, functions and type
//! variables. `NonNull` never wraps another `NonNull`; always build non-null
//! types through [`Type::non_null`], which normalizes.

use crate::env::ModuleId;
use fxhash::FxHashMap;
use indexmap::IndexMap;
use std::fmt;
use std::rc::Rc;

/// A unification variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeVar(u32);

impl TypeVar {
    pub fn new(id: u32) -> Self {
        TypeVar(id)
    }

    pub fn id(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TypeVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = (b'a' + (self.0 % 26) as u8) as char;
        match self.0 / 26 {
            0 => write!(f, "{}", letter),
            n => write!(f, "{}{}", letter, n),
        }
    }
}

/// Hands out fresh type variables
#[derive(Debug, Clone, Default)]
pub struct Fresher {
    next: u32,
}

impl Fresher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh_var(&mut self) -> TypeVar {
        let var = TypeVar(self.next);
        self.next += 1;
        var
    }

    pub fn fresh(&mut self) -> Type {
        Type::Var(self.fresh_var())
    }
}

/// Reference to a module acting as a type.
///
/// Equality is by module identity; structural comparison of anonymous
/// modules needs the module arena (see `Unifier::identical_to`).
#[derive(Debug, Clone)]
pub struct ModuleType {
    pub id: ModuleId,
    pub name: Option<Rc<str>>,
}

impl PartialEq for ModuleType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Module(ModuleType),
    NonNull(Box<Type>),
    List(Box<Type>),
    /// A GraphQL-sourced list; cannot be iterated until materialized
    OpaqueList(Box<Type>),
    Record(RecordType),
    Function(Box<FunctionType>),
    Var(TypeVar),
}

impl Type {
    pub fn module(id: ModuleId, name: Option<&str>) -> Type {
        Type::Module(ModuleType {
            id,
            name: name.map(Rc::from),
        })
    }

    /// Wrap in `NonNull`, leaving already non-null types alone
    pub fn non_null(self) -> Type {
        match self {
            Type::NonNull(_) => self,
            other => Type::NonNull(Box::new(other)),
        }
    }

    /// The nullable version of this type
    pub fn nullable(self) -> Type {
        match self {
            Type::NonNull(inner) => *inner,
            other => other,
        }
    }

    pub fn list(elem: Type) -> Type {
        Type::List(Box::new(elem))
    }

    pub fn opaque_list(elem: Type) -> Type {
        Type::OpaqueList(Box::new(elem))
    }

    pub fn function(fun: FunctionType) -> Type {
        Type::Function(Box::new(fun))
    }

    pub fn is_non_null(&self) -> bool {
        matches!(self, Type::NonNull(_))
    }

    pub fn as_var(&self) -> Option<TypeVar> {
        match self {
            Type::Var(v) => Some(*v),
            _ => None,
        }
    }

    /// The module behind this type, looking through `NonNull`
    pub fn as_module(&self) -> Option<&ModuleType> {
        match self {
            Type::Module(m) => Some(m),
            Type::NonNull(inner) => inner.as_module(),
            _ => None,
        }
    }

    /// The function behind this type, looking through `NonNull`
    pub fn as_function(&self) -> Option<&FunctionType> {
        match self {
            Type::Function(f) => Some(f),
            Type::NonNull(inner) => inner.as_function(),
            _ => None,
        }
    }

    /// Element type of a list or opaque list, looking through `NonNull`
    pub fn list_elem(&self) -> Option<&Type> {
        match self {
            Type::List(elem) | Type::OpaqueList(elem) => Some(elem),
            Type::NonNull(inner) => inner.list_elem(),
            _ => None,
        }
    }

    pub fn occurs(&self, var: TypeVar) -> bool {
        match self {
            Type::Var(v) => *v == var,
            Type::Module(_) => false,
            Type::NonNull(t) | Type::List(t) | Type::OpaqueList(t) => t.occurs(var),
            Type::Record(r) => r.fields.values().any(|s| s.ty.occurs(var)),
            Type::Function(f) => f.occurs(var),
        }
    }

    pub fn free_vars(&self, out: &mut Vec<TypeVar>) {
        match self {
            Type::Var(v) => {
                if !out.contains(v) {
                    out.push(*v);
                }
            }
            Type::Module(_) => {}
            Type::NonNull(t) | Type::List(t) | Type::OpaqueList(t) => t.free_vars(out),
            Type::Record(r) => r.fields.values().for_each(|s| s.ty.free_vars(out)),
            Type::Function(f) => {
                f.args.fields.values().for_each(|s| s.ty.free_vars(out));
                f.ret.free_vars(out);
                if let Some(block) = &f.block {
                    Type::function((**block).clone()).free_vars(out);
                }
            }
        }
    }

    /// Short constructor name, used in unification messages
    pub fn shape(&self) -> &'static str {
        match self {
            Type::Module(_) => "named type",
            Type::NonNull(_) => "non-null type",
            Type::List(_) => "list",
            Type::OpaqueList(_) => "GraphQL list",
            Type::Record(_) => "record",
            Type::Function(_) => "function",
            Type::Var(_) => "type variable",
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Module(m) => match &m.name {
                Some(name) => write!(f, "{}", name),
                None => write!(f, "{{...}}"),
            },
            Type::NonNull(inner) => write!(f, "{}!", inner),
            Type::List(inner) | Type::OpaqueList(inner) => write!(f, "[{}]", inner),
            Type::Record(r) => write!(f, "{}", r),
            Type::Function(fun) => write!(f, "{}", fun),
            Type::Var(v) => write!(f, "{}", v),
        }
    }
}

/// A type bound to a name. Always monomorphic once stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Scheme {
    ty: Type,
}

impl Scheme {
    pub fn mono(ty: Type) -> Self {
        Scheme { ty }
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn into_type(self) -> Type {
        self.ty
    }
}

impl From<Type> for Scheme {
    fn from(ty: Type) -> Self {
        Scheme::mono(ty)
    }
}

/// Ordered, optionally named record of fields
#[derive(Debug, Clone, Default)]
pub struct RecordType {
    pub name: Option<String>,
    pub fields: IndexMap<String, Scheme>,
    pub docs: FxHashMap<String, String>,
}

impl PartialEq for RecordType {
    /// Field order matters; docstrings do not.
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .zip(other.fields.iter())
                .all(|((ka, va), (kb, vb))| ka == kb && va == vb)
    }
}

impl RecordType {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(name: impl Into<String>) -> Self {
        RecordType {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, ty: Type) -> Self {
        self.fields.insert(name.into(), Scheme::mono(ty));
        self
    }

    pub fn add(&mut self, name: impl Into<String>, ty: Type) {
        self.fields.insert(name.into(), Scheme::mono(ty));
    }

    pub fn scheme_of(&self, name: &str) -> Option<&Scheme> {
        self.fields.get(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Type)> {
        self.fields.iter().map(|(k, s)| (k.as_str(), s.ty()))
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.name {
            return write!(f, "{}", name);
        }
        write!(f, "{{")?;
        for (i, (name, ty)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", name, ty)?;
        }
        write!(f, "}}")
    }
}

/// Function signature: named arguments, return type, optional block
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionType {
    pub args: RecordType,
    pub ret: Type,
    pub block: Option<Box<FunctionType>>,
}

impl FunctionType {
    pub fn new(args: RecordType, ret: Type) -> Self {
        FunctionType { args, ret, block: None }
    }

    pub fn with_block(mut self, block: FunctionType) -> Self {
        self.block = Some(Box::new(block));
        self
    }

    pub fn arg_names(&self) -> impl Iterator<Item = &str> {
        self.args.fields.keys().map(String::as_str)
    }

    pub fn arg_index(&self, name: &str) -> Option<usize> {
        self.args.fields.get_index_of(name)
    }

    /// Arguments that must be supplied at every call site
    pub fn required_args(&self) -> impl Iterator<Item = &str> {
        self.args.iter().filter(|(_, ty)| ty.is_non_null()).map(|(name, _)| name)
    }

    fn occurs(&self, var: TypeVar) -> bool {
        self.args.fields.values().any(|s| s.ty().occurs(var))
            || self.ret.occurs(var)
            || self.block.as_ref().is_some_and(|b| b.occurs(var))
    }
}

impl fmt::Display for FunctionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, (name, ty)) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", name, ty)?;
        }
        if let Some(block) = &self.block {
            if !self.args.is_empty() {
                write!(f, ", ")?;
            }
            write!(f, "&{}", block)?;
        }
        write!(f, ") -> {}", self.ret)
    }
}

/// Mapping from type variables to their solutions
#[derive(Debug, Clone, Default)]
pub struct Subst {
    map: FxHashMap<TypeVar, Type>,
}

impl Subst {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, var: TypeVar) -> Option<&Type> {
        self.map.get(&var)
    }

    pub fn bind(&mut self, var: TypeVar, ty: Type) {
        self.map.insert(var, ty);
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Add every binding of `other`, which wins on conflict
    pub fn compose(&mut self, other: &Subst) {
        for (var, ty) in &other.map {
            self.map.insert(*var, ty.clone());
        }
    }

    /// Follow variable bindings at the top of a type only
    pub fn prune(&self, ty: &Type) -> Type {
        let mut current = ty.clone();
        while let Type::Var(v) = current {
            match self.map.get(&v) {
                Some(next) => current = next.clone(),
                None => break,
            }
        }
        current
    }

    /// Fully resolve a type through this substitution
    pub fn apply(&self, ty: &Type) -> Type {
        match ty {
            Type::Var(v) => match self.map.get(v) {
                Some(bound) => self.apply(bound),
                None => ty.clone(),
            },
            Type::Module(_) => ty.clone(),
            Type::NonNull(inner) => self.apply(inner).non_null(),
            Type::List(inner) => Type::list(self.apply(inner)),
            Type::OpaqueList(inner) => Type::opaque_list(self.apply(inner)),
            Type::Record(r) => Type::Record(self.apply_record(r)),
            Type::Function(f) => Type::function(self.apply_function(f)),
        }
    }

    pub fn apply_record(&self, record: &RecordType) -> RecordType {
        RecordType {
            name: record.name.clone(),
            fields: record
                .fields
                .iter()
                .map(|(k, s)| (k.clone(), Scheme::mono(self.apply(s.ty()))))
                .collect(),
            docs: record.docs.clone(),
        }
    }

    pub fn apply_function(&self, fun: &FunctionType) -> FunctionType {
        FunctionType {
            args: self.apply_record(&fun.args),
            ret: self.apply(&fun.ret),
            block: fun.block.as_ref().map(|b| Box::new(self.apply_function(b))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int() -> Type {
        Type::module(ModuleId::new(1), Some("Int"))
    }

    fn string() -> Type {
        Type::module(ModuleId::new(2), Some("String"))
    }

    #[test]
    fn test_non_null_never_nests() {
        let t = int().non_null().non_null();
        assert_eq!(t, Type::NonNull(Box::new(int())));
        assert_eq!(t.to_string(), "Int!");
    }

    #[test]
    fn test_apply_normalizes_non_null() {
        let mut fresh = Fresher::new();
        let a = fresh.fresh_var();

        let mut subst = Subst::new();
        subst.bind(a, string().non_null());

        let resolved = subst.apply(&Type::Var(a).non_null());
        assert_eq!(resolved, string().non_null());
    }

    #[test]
    fn test_apply_follows_chains() {
        let mut fresh = Fresher::new();
        let a = fresh.fresh_var();
        let b = fresh.fresh_var();

        let mut subst = Subst::new();
        subst.bind(a, Type::Var(b));
        subst.bind(b, Type::list(int().non_null()));

        assert_eq!(subst.apply(&Type::Var(a)).to_string(), "[Int!]");
        assert_eq!(subst.prune(&Type::Var(a)), Type::list(int().non_null()));
    }

    #[test]
    fn test_function_display() {
        let fun = FunctionType::new(
            RecordType::new().with_field("x", int().non_null()).with_field("y", string()),
            Type::module(ModuleId::new(3), Some("Foo")).non_null(),
        );
        assert_eq!(fun.to_string(), "(x: Int!, y: String) -> Foo!");
        assert_eq!(fun.required_args().collect::<Vec<_>>(), vec!["x"]);
    }

    #[test]
    fn test_record_equality_is_ordered() {
        let a = RecordType::new().with_field("x", int()).with_field("y", string());
        let b = RecordType::new().with_field("y", string()).with_field("x", int());
        assert_ne!(a, b);
        assert_eq!(a.clone(), a);
    }

    #[test]
    fn test_type_var_names() {
        assert_eq!(TypeVar::new(0).to_string(), "a");
        assert_eq!(TypeVar::new(25).to_string(), "z");
        assert_eq!(TypeVar::new(27).to_string(), "b1");
    }

    #[test]
    fn test_occurs_check() {
        let mut fresh = Fresher::new();
        let a = fresh.fresh_var();
        assert!(Type::list(Type::Var(a)).occurs(a));
        assert!(!Type::list(int()).occurs(a));
    }
}
