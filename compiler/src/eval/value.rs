//! Runtime values
//!
//! Scalars, strings and lists are plain data. Modules (object instances,
//! object literals, enum and import namespaces, evaluation scopes) are
//! shared through [`ModuleRef`]; they are only mutated in place while being
//! built, by `reopen`, or on a per-call copy. Reassignment through a field
//! path goes through [`super::cow::update_path`] instead.

use super::env::EvalEnv;
use crate::ast::{ClassDecl, FunctionBase};
use crate::env::ModuleId;
use crate::types::Type;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

pub type ModuleRef = Rc<RefCell<ModuleValue>>;

/// What a module value stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleRole {
    /// Object literals, namespaces and evaluation scopes
    Object,
    /// An instance built by a class constructor
    Instance,
    /// Members added to a class by `reopen`; every instance delegates to it
    Extension,
}

#[derive(Clone)]
pub struct ModuleValue {
    pub name: Option<String>,
    /// The module type this value belongs to, when known
    pub class: Option<ModuleId>,
    pub role: ModuleRole,
    pub parent: Option<ModuleRef>,
    pub fields: IndexMap<String, Value>,
}

impl ModuleValue {
    pub fn new(name: Option<&str>, class: Option<ModuleId>, role: ModuleRole) -> Self {
        ModuleValue {
            name: name.map(str::to_string),
            class,
            role,
            parent: None,
            fields: IndexMap::new(),
        }
    }

    pub fn with_parent(mut self, parent: ModuleRef) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn into_ref(self) -> ModuleRef {
        Rc::new(RefCell::new(self))
    }

    /// Field lookup, delegating to the parent chain
    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.fields.get(name) {
            return Some(value.clone());
        }
        self.parent.as_ref().and_then(|p| p.borrow().get(name))
    }

    pub fn has(&self, name: &str) -> bool {
        self.fields.contains_key(name) || self.parent.as_ref().is_some_and(|p| p.borrow().has(name))
    }

    /// Overwrite `name` wherever it is bound in the chain
    pub fn set_existing(&mut self, name: &str, value: Value) -> bool {
        if let Some(slot) = self.fields.get_mut(name) {
            *slot = value;
            return true;
        }
        match &self.parent {
            Some(parent) => parent.borrow_mut().set_existing(name, value),
            None => false,
        }
    }

    /// A copy sharing every field value and the parent
    pub fn shallow_copy(&self) -> ModuleValue {
        self.clone()
    }
}

impl fmt::Debug for ModuleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleValue")
            .field("name", &self.name)
            .field("role", &self.role)
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A closure: the function's syntax plus the scope it was defined in
pub struct FunctionValue {
    pub name: Option<String>,
    pub fun: Rc<FunctionBase>,
    pub closure: EvalEnv,
    /// Defined in a class body; selecting it from an instance binds `self`
    pub method: bool,
}

impl FunctionValue {
    pub fn param_names(&self) -> Vec<String> {
        self.fun.args.iter().map(|a| a.name.clone()).collect()
    }
}

impl fmt::Debug for FunctionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}>", self.name.as_deref().unwrap_or("lambda"))
    }
}

/// Calling a class builds an instance
pub struct ConstructorValue {
    pub decl: Rc<ClassDecl>,
    pub module: ModuleId,
    pub closure: EvalEnv,
    /// Members added by `reopen`, shared by every instance
    pub statics: ModuleRef,
}

impl ConstructorValue {
    pub fn param_names(&self) -> Vec<String> {
        match self.decl.constructor() {
            Some((_, fun)) => fun.args.iter().map(|a| a.name.clone()).collect(),
            None => self
                .decl
                .implicit_constructor_params()
                .iter()
                .map(|s| s.name.clone())
                .collect(),
        }
    }
}

impl fmt::Debug for ConstructorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<class {}>", self.decl.name)
    }
}

/// Functions implemented by the runtime rather than by Dang code
#[derive(Debug)]
pub struct Builtin {
    pub name: String,
    pub kind: BuiltinKind,
}

#[derive(Debug)]
pub enum BuiltinKind {
    /// Always returns the same value, e.g. an enum's `values()`
    Constant(Value),
    /// A field served by a remote GraphQL endpoint
    Remote,
    /// Writes its argument to the interpreter's output
    Print,
}

#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    String(String),
    Bool(bool),
    List { elements: Vec<Value>, elem_type: Option<Type> },
    Enum { tag: String, enum_type: ModuleId },
    Scalar { value: String, scalar_type: ModuleId },
    Function(Rc<FunctionValue>),
    BoundMethod { receiver: ModuleRef, fun: Rc<FunctionValue> },
    Constructor(Rc<ConstructorValue>),
    Module(ModuleRef),
    Builtin(Rc<Builtin>),
}

impl Value {
    pub fn list(elements: Vec<Value>, elem_type: Option<Type>) -> Value {
        Value::List { elements, elem_type }
    }

    pub fn string(s: impl Into<String>) -> Value {
        Value::String(s.into())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Int(_) => "Int",
            Value::Float(_) => "Float",
            Value::String(_) => "String",
            Value::Bool(_) => "Boolean",
            Value::List { .. } => "List",
            Value::Enum { .. } => "Enum",
            Value::Scalar { .. } => "Scalar",
            Value::Function(_) | Value::BoundMethod { .. } | Value::Builtin(_) => "Function",
            Value::Constructor(_) => "Class",
            Value::Module(_) => "Module",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_callable(&self) -> bool {
        matches!(
            self,
            Value::Function(_) | Value::BoundMethod { .. } | Value::Constructor(_) | Value::Builtin(_)
        )
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::List { elements, .. } => !elements.is_empty(),
            _ => true,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_module(&self) -> Option<&ModuleRef> {
        match self {
            Value::Module(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List { elements, .. } => Some(elements),
            _ => None,
        }
    }

    /// Field of a module value, through its parent chain
    pub fn field(&self, name: &str) -> Option<Value> {
        self.as_module().and_then(|m| m.borrow().get(name))
    }
}

/// Language-level equality: numbers compare across Int and Float, lists
/// element-wise, enums by tag, modules by identity or by their fields
pub fn values_equal(a: &Value, b: &Value) -> bool {
    equal_assuming(a, b, &mut Vec::new())
}

type ModulePtr = *const RefCell<ModuleValue>;

/// Module pairs already under comparison count as equal, so comparing
/// values that contain themselves terminates
fn equal_assuming(a: &Value, b: &Value, assumed: &mut Vec<(ModulePtr, ModulePtr)>) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => a.as_float() == b.as_float(),
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::List { elements: x, .. }, Value::List { elements: y, .. }) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| equal_assuming(a, b, assumed))
        }
        (Value::Enum { tag: x, .. }, Value::Enum { tag: y, .. }) => x == y,
        (Value::Scalar { value: x, .. }, Value::Scalar { value: y, .. }) => x == y,
        (Value::Module(x), Value::Module(y)) => {
            let pair = (Rc::as_ptr(x), Rc::as_ptr(y));
            if Rc::ptr_eq(x, y) || assumed.contains(&pair) {
                return true;
            }
            assumed.push(pair);
            let (x, y) = (x.borrow(), y.borrow());
            let data = |m: &ModuleValue| {
                m.fields
                    .iter()
                    .filter(|(_, v)| !v.is_callable())
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect::<Vec<_>>()
            };
            let (xs, ys) = (data(&x), data(&y));
            x.class == y.class
                && xs.len() == ys.len()
                && xs
                    .iter()
                    .zip(&ys)
                    .all(|((ka, va), (kb, vb))| ka == kb && equal_assuming(va, vb, assumed))
        }
        (Value::Function(x), Value::Function(y)) => Rc::ptr_eq(x, y),
        (Value::Constructor(x), Value::Constructor(y)) => Rc::ptr_eq(x, y),
        _ => false,
    }
}

fn write_escaped(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    write!(f, "\"")?;
    for c in s.chars() {
        match c {
            '"' => write!(f, "\\\"")?,
            '\\' => write!(f, "\\\\")?,
            '\n' => write!(f, "\\n")?,
            '\t' => write!(f, "\\t")?,
            '\r' => write!(f, "\\r")?,
            c => write!(f, "{}", c)?,
        }
    }
    write!(f, "\"")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_value(f, self, &mut Vec::new())
    }
}

/// `open` holds the modules being written; meeting one again prints
/// `<cycle>`
fn write_value(f: &mut fmt::Formatter<'_>, value: &Value, open: &mut Vec<ModulePtr>) -> fmt::Result {
    match value {
        Value::Null => write!(f, "null"),
        Value::Int(n) => write!(f, "{}", n),
        Value::Float(x) if x.is_finite() && x.fract() == 0.0 => write!(f, "{:.1}", x),
        Value::Float(x) => write!(f, "{}", x),
        Value::String(s) => write_escaped(f, s),
        Value::Bool(b) => write!(f, "{}", b),
        Value::List { elements, .. } => {
            write!(f, "[")?;
            for (i, e) in elements.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write_value(f, e, open)?;
            }
            write!(f, "]")
        }
        Value::Enum { tag, .. } => write!(f, "{}", tag),
        Value::Scalar { value, .. } => write_escaped(f, value),
        Value::Function(fun) | Value::BoundMethod { fun, .. } => write!(f, "{:?}", fun),
        Value::Constructor(ctor) => write!(f, "{:?}", ctor),
        Value::Builtin(b) => write!(f, "<builtin {}>", b.name),
        Value::Module(m) => {
            let ptr = Rc::as_ptr(m);
            if open.contains(&ptr) {
                return write!(f, "<cycle>");
            }
            open.push(ptr);
            let m = m.borrow();
            write!(f, "{{")?;
            let mut first = true;
            for (k, v) in m.fields.iter().filter(|(_, v)| !v.is_callable()) {
                if !first {
                    write!(f, ", ")?;
                }
                first = false;
                write!(f, "{}: ", k)?;
                write_value(f, v, open)?;
            }
            open.pop();
            write!(f, "}}")
        }
    }
}
