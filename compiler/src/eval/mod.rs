//! Tree-walking evaluator
//!
//! Evaluation assumes the program already type-checked: the interpreter owns
//! the [`Checker`] that inferred it and consults its side tables (inferred
//! node types, declared modules, call-site argument layouts) instead of
//! re-deriving anything.
//!
//! Scopes mirror the checker's: blocks and calls run in child scopes, class
//! bodies and `reopen` in a composite of the module value over the
//! surrounding scope. Field reassignment is copy-on-write (see [`cow`]).
//!
//! [`Interpreter::run`] is all or nothing: when checking or evaluation
//! fails, both the checker and the top-level bindings go back to where they
//! were before the run.

mod call;
pub mod cow;
pub mod env;
pub mod ops;
pub mod render;
pub mod value;

use crate::ast::{AssignOp, BinaryOp, Block, EnumDecl, ImportDecl, LoopHead, Node, NodeKind, SlotDecl};
use crate::env::{Env, ModuleId, ModuleKind, Visibility};
use crate::errors::{DangError, LoopSignal, Result};
use crate::typecheck::Checker;
use crate::types::Type;
use env::EvalEnv;
use log::debug;
use render::render;
use smallvec::SmallVec;
use std::io::{self, Write};
use std::rc::Rc;
use value::{Builtin, BuiltinKind, ConstructorValue, FunctionValue, ModuleRole, ModuleValue, Value};

/// Limits applied while evaluating
#[derive(Debug, Clone)]
pub struct EvalConfig {
    /// Maximum depth of nested function and constructor calls
    pub max_depth: usize,
}

impl Default for EvalConfig {
    fn default() -> Self {
        EvalConfig { max_depth: 256 }
    }
}

pub struct Interpreter {
    pub checker: Checker,
    config: EvalConfig,
    depth: usize,
    globals: EvalEnv,
    /// Where `print` writes
    output: Box<dyn Write>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_checker(Checker::new())
    }

    /// Evaluate programs checked by `checker`
    pub fn with_checker(checker: Checker) -> Self {
        let globals = EvalEnv::root();
        globals.define(
            "print",
            Value::Builtin(Rc::new(Builtin {
                name: "print".to_string(),
                kind: BuiltinKind::Print,
            })),
        );
        Interpreter {
            checker,
            config: EvalConfig::default(),
            depth: 0,
            globals,
            output: Box::new(io::stdout()),
        }
    }

    pub fn with_config(mut self, config: EvalConfig) -> Self {
        self.config = config;
        self
    }

    /// Send `print` output to `output` instead of stdout
    pub fn with_output(mut self, output: impl Write + 'static) -> Self {
        self.output = Box::new(output);
        self
    }

    pub fn globals(&self) -> &EvalEnv {
        &self.globals
    }

    /// A top-level binding
    pub fn get(&self, name: &str) -> Option<Value> {
        self.globals.get(name)
    }

    /// Type-check `forms`, then evaluate them at the top level.
    ///
    /// Bindings from earlier successful runs stay visible, so a session can
    /// be fed one program at a time. A failed run leaves no bindings behind.
    pub fn run(&mut self, forms: &[Node]) -> Result<Value> {
        let checkpoint = self.checker.checkpoint();
        let globals = self.globals.primary().borrow().fields.clone();

        let env = self.checker.env();
        let result = self
            .checker
            .infer_forms(&env, forms)
            .and_then(|_| self.eval_program(forms));

        if result.is_err() {
            debug!("run failed, restoring {} top-level bindings", globals.len());
            self.checker.rollback(checkpoint);
            self.globals.primary().borrow_mut().fields = globals;
            self.depth = 0;
        }
        result
    }

    /// Evaluate forms the checker has already inferred
    pub fn eval_program(&mut self, forms: &[Node]) -> Result<Value> {
        let env = self.globals.clone();
        self.eval_forms(&env, forms)
    }

    /// Evaluate a sequence in `env`. Functions, classes and enums are
    /// bound before anything runs, so forms can refer to later declarations.
    pub fn eval_forms(&mut self, env: &EvalEnv, forms: &[Node]) -> Result<Value> {
        for form in forms.iter().filter(|f| is_hoisted(f)) {
            self.declare(env, form)
                .map_err(|e| e.with_location(form.loc.as_ref()))?;
        }

        let mut last = Value::Null;
        for form in forms {
            last = if is_hoisted(form) {
                declared_name(form)
                    .and_then(|name| env.local(name))
                    .unwrap_or(Value::Null)
            } else {
                self.eval(env, form)?
            };
        }
        Ok(last)
    }

    /// Evaluate one node. Errors are tagged with the innermost location.
    pub fn eval(&mut self, env: &EvalEnv, node: &Node) -> Result<Value> {
        self.eval_node(env, node)
            .map_err(|e| e.with_location(node.loc.as_ref()))
    }

    fn eval_node(&mut self, env: &EvalEnv, node: &Node) -> Result<Value> {
        match &node.kind {
            // --- Literals ---
            NodeKind::Int(n) => Ok(Value::Int(*n)),
            NodeKind::Float(f) => Ok(Value::Float(*f)),
            NodeKind::String(s) => Ok(Value::String(s.clone())),
            NodeKind::Boolean(b) => Ok(Value::Bool(*b)),
            NodeKind::Null => Ok(Value::Null),
            NodeKind::List(items) => {
                let elements = items
                    .iter()
                    .map(|item| self.eval(env, item))
                    .collect::<Result<Vec<_>>>()?;
                let elem_type = match items.first() {
                    Some(first) => self.checker.type_of(first.id),
                    None => self
                        .checker
                        .type_of(node.id)
                        .and_then(|t| t.list_elem().cloned()),
                };
                Ok(Value::list(elements, elem_type))
            }
            NodeKind::Object(slots) => {
                let module = ModuleValue::new(None, self.checker.module_of(node.id), ModuleRole::Object).into_ref();
                let scope = EvalEnv::composite(module.clone(), env);
                self.eval_forms(&scope, slots)?;
                Ok(Value::Module(module))
            }

            // --- References and calls ---
            NodeKind::Symbol { name, auto_call } => {
                let value = env
                    .get(name)
                    .ok_or_else(|| DangError::runtime(format!("variable {:?} not found", name), None))?;
                let value = match value {
                    Value::Function(fun) if fun.method => match env.self_value() {
                        Some(receiver) => Value::BoundMethod { receiver, fun },
                        None => Value::Function(fun),
                    },
                    other => other,
                };
                self.auto_call(node, value, *auto_call)
            }
            NodeKind::SelfRef => env
                .self_value()
                .map(Value::Module)
                .ok_or_else(|| DangError::runtime("self is not available outside a type body", None)),
            NodeKind::Select {
                receiver,
                field,
                auto_call,
            } => {
                let receiver = self.eval(env, receiver)?;
                let value = match &receiver {
                    Value::Null => return Ok(Value::Null),
                    Value::Module(module) => {
                        let found = module.borrow().get(field);
                        match found {
                            Some(Value::Function(fun)) if fun.method => Value::BoundMethod {
                                receiver: module.clone(),
                                fun,
                            },
                            Some(value) => value,
                            None => return Err(DangError::runtime(format!("field {:?} not found", field), None)),
                        }
                    }
                    other => {
                        return Err(DangError::runtime(
                            format!("cannot select field {:?} from {}", field, other.type_name()),
                            None,
                        ))
                    }
                };
                self.auto_call(node, value, *auto_call)
            }
            NodeKind::Index { receiver, index } => self.eval_index(env, receiver, index),
            NodeKind::FunCall { fun, args, block } => self.eval_call(env, node, fun, args, block.as_deref()),
            NodeKind::Lambda(fun) => Ok(Value::Function(Rc::new(FunctionValue {
                name: None,
                fun: fun.clone(),
                closure: env.clone(),
                method: false,
            }))),

            // --- Operators and control ---
            NodeKind::Binary { op, left, right } => {
                let left = self.eval(env, left)?;
                if *op == BinaryOp::Default && !left.is_null() {
                    return Ok(left);
                }
                let right = self.eval(env, right)?;
                ops::apply_binary_op(*op, &left, &right)
            }
            NodeKind::Not(inner) => match self.eval(env, inner)? {
                Value::Bool(b) => Ok(Value::Bool(!b)),
                other => Err(DangError::runtime(
                    format!("operator ! requires a Boolean, got {}", other.type_name()),
                    None,
                )),
            },
            NodeKind::Conditional { cond, then, otherwise } => {
                if self.eval(env, cond)?.is_truthy() {
                    self.eval_block(env, then)
                } else if let Some(otherwise) = otherwise {
                    self.eval_block(env, otherwise)
                } else {
                    Ok(Value::Null)
                }
            }
            NodeKind::Let { name, value, body } => {
                let value = self.eval(env, value)?;
                let scope = env.clone_env();
                scope.define(name, value);
                self.eval(&scope, body)
            }
            NodeKind::Block(block) => self.eval_block(env, block),
            NodeKind::ForLoop { head, body } => self.eval_loop(env, head, body),
            NodeKind::Break => Err(DangError::LoopExit {
                signal: LoopSignal::Break,
                location: node.loc.clone(),
            }),
            NodeKind::Continue => Err(DangError::LoopExit {
                signal: LoopSignal::Continue,
                location: node.loc.clone(),
            }),

            // --- Declarations ---
            NodeKind::Slot(slot) => self.eval_slot(env, node, slot, false),
            NodeKind::FunDecl(_) | NodeKind::ClassDecl(_) | NodeKind::EnumDecl(_) => self.declare(env, node),
            NodeKind::NewConstructor(_) => Err(DangError::runtime(
                "new() constructor can only be defined inside a type body",
                None,
            )),
            NodeKind::ScalarDecl(_) | NodeKind::InterfaceDecl(_) | NodeKind::DirectiveDecl(_) => Ok(Value::Null),
            NodeKind::ImportDecl(decl) => self.eval_import(env, node, decl),

            // --- Statements ---
            NodeKind::Reassignment { target, op, value } => self.eval_reassignment(env, target, *op, value),
            NodeKind::Reopen { name, block } => {
                let target = env
                    .get(name)
                    .ok_or_else(|| DangError::runtime(format!("variable {:?} not found", name), None))?;
                let module = match &target {
                    Value::Module(module) => module.clone(),
                    Value::Constructor(ctor) => ctor.statics.clone(),
                    other => {
                        return Err(DangError::runtime(format!("cannot reopen {}", other.type_name()), None))
                    }
                };
                let scope = EvalEnv::composite(module.clone(), env);
                self.eval_forms(&scope, &block.forms)?;
                Ok(Value::Module(module))
            }
            NodeKind::Assert { message, block } => self.eval_assert(env, node, message.as_deref(), block),
        }
    }

    /// A block's forms in a child scope (or in `env` itself when inline)
    pub fn eval_block(&mut self, env: &EvalEnv, block: &Block) -> Result<Value> {
        if block.inline {
            return self.eval_forms(env, &block.forms);
        }
        let scope = env.clone_env();
        self.eval_forms(&scope, &block.forms)
    }

    /// `xs[i]`: null for a null list or a position out of range
    fn eval_index(&mut self, env: &EvalEnv, receiver: &Node, index: &Node) -> Result<Value> {
        let receiver = self.eval(env, receiver)?;
        if receiver.is_null() {
            return Ok(Value::Null);
        }
        let index = self.eval(env, index)?;
        let Value::List { elements, .. } = &receiver else {
            return Err(DangError::runtime(format!("cannot index {}", receiver.type_name()), None));
        };
        let Value::Int(position) = index else {
            return Err(DangError::runtime(
                format!("index must be an Int, got {}", index.type_name()),
                None,
            ));
        };
        Ok(usize::try_from(position)
            .ok()
            .and_then(|i| elements.get(i))
            .cloned()
            .unwrap_or(Value::Null))
    }

    /// Run a loop, each iteration in its own scope. The result is the last
    /// completed iteration's value, or null.
    fn eval_loop(&mut self, env: &EvalEnv, head: &LoopHead, body: &Block) -> Result<Value> {
        let mut last = Value::Null;
        match head {
            LoopHead::Each { index, name, iterable } => {
                let elements = match self.eval(env, iterable)? {
                    Value::Null => return Ok(Value::Null),
                    Value::List { elements, .. } => elements,
                    other => {
                        return Err(DangError::runtime(
                            format!("cannot iterate over {}", other.type_name()),
                            iterable.loc.clone(),
                        ))
                    }
                };
                for (i, element) in elements.into_iter().enumerate() {
                    let scope = env.clone_env();
                    if let Some(index) = index {
                        scope.define(index, Value::Int(i as i64));
                    }
                    scope.define(name, element);
                    if !self.iterate(&scope, body, &mut last)? {
                        break;
                    }
                }
            }
            LoopHead::While(cond) => loop {
                match self.eval(env, cond)? {
                    Value::Bool(true) => {}
                    Value::Bool(false) => break,
                    other => {
                        return Err(DangError::runtime(
                            format!("loop condition must be a Boolean, got {}", other.type_name()),
                            cond.loc.clone(),
                        ))
                    }
                }
                if !self.iterate(&env.clone_env(), body, &mut last)? {
                    break;
                }
            },
        }
        Ok(last)
    }

    /// One pass over a loop body. Returns false once the body breaks.
    fn iterate(&mut self, scope: &EvalEnv, body: &Block, last: &mut Value) -> Result<bool> {
        let err = match self.eval_forms(scope, &body.forms) {
            Ok(value) => {
                *last = value;
                return Ok(true);
            }
            Err(err) => err,
        };
        let signal = match err.root_cause() {
            DangError::LoopExit { signal, .. } => *signal,
            _ => return Err(err),
        };
        Ok(signal == LoopSignal::Continue)
    }

    /// Call zero-argument functions referenced with auto-call, unless the
    /// checker decided the reference denotes the function itself
    fn auto_call(&mut self, node: &Node, value: Value, auto_call: bool) -> Result<Value> {
        if !auto_call || !value.is_callable() {
            return Ok(value);
        }
        let denotes_function = self
            .checker
            .type_of(node.id)
            .map_or(true, |t| t.as_function().is_some());
        if denotes_function {
            return Ok(value);
        }
        self.call_value(value, Vec::new(), None, None, node.loc.as_ref())
    }

    // ==================================================================
    // Declarations
    // ==================================================================

    /// Bind a function, class or enum in `env` and return its value
    fn declare(&mut self, env: &EvalEnv, node: &Node) -> Result<Value> {
        let (name, value) = match &node.kind {
            NodeKind::FunDecl(decl) => {
                let fun = FunctionValue {
                    name: Some(decl.name.clone()),
                    fun: decl.function.clone(),
                    closure: env.clone(),
                    method: env.is_class_body(),
                };
                (decl.name.as_str(), Value::Function(Rc::new(fun)))
            }
            NodeKind::ClassDecl(decl) => {
                let module = self.checked_module(node, &decl.name)?;
                let statics = ModuleValue::new(Some(&decl.name), Some(module), ModuleRole::Extension).into_ref();
                let ctor = ConstructorValue {
                    decl: decl.clone(),
                    module,
                    closure: env.clone(),
                    statics,
                };
                (decl.name.as_str(), Value::Constructor(Rc::new(ctor)))
            }
            NodeKind::EnumDecl(decl) => {
                let module = self.checked_module(node, &decl.name)?;
                (decl.name.as_str(), self.enum_namespace(decl, module))
            }
            _ => return self.eval(env, node),
        };
        debug!("declared {} as {}", name, value.type_name());
        env.define(name, value.clone());
        Ok(value)
    }

    fn checked_module(&self, node: &Node, name: &str) -> Result<ModuleId> {
        self.checker
            .module_of(node.id)
            .ok_or_else(|| DangError::runtime(format!("type {} was not checked before evaluation", name), None))
    }

    fn enum_namespace(&self, decl: &EnumDecl, module: ModuleId) -> Value {
        enum_values_namespace(&decl.name, module, decl.values.iter().cloned())
    }

    /// Evaluate a slot and bind it. With `deferred`, a missing required
    /// value is left null for a constructor body to fill in.
    fn eval_slot(&mut self, env: &EvalEnv, node: &Node, slot: &SlotDecl, deferred: bool) -> Result<Value> {
        let value = match &slot.value {
            Some(value) => self.eval(env, value)?,
            None => match self.checker.type_of(node.id) {
                Some(ty) if ty.is_non_null() && !deferred => {
                    return Err(DangError::runtime(
                        format!(
                            "required slot {:?} (type {}) has no value",
                            slot.name,
                            self.checker.show(&ty)
                        ),
                        node.loc.clone(),
                    ))
                }
                _ => Value::Null,
            },
        };
        env.define(&slot.name, value.clone());
        Ok(env.local(&slot.name).unwrap_or(value))
    }

    /// An aliased import as a namespace: enums and nested types are
    /// available locally; fields are served remotely
    fn eval_import(&mut self, env: &EvalEnv, node: &Node, decl: &ImportDecl) -> Result<Value> {
        let Some(alias) = &decl.alias else {
            return Err(DangError::unsupported(
                format!("unaliased import of {:?}", decl.source),
                node.loc.clone(),
            ));
        };
        let module = self.checked_module(node, alias)?;
        let modules = &self.checker.modules;

        let mut namespace = ModuleValue::new(Some(alias), Some(module), ModuleRole::Object);
        for (name, scheme) in Env::Module(module).bindings(modules, Visibility::Public) {
            let ty = self.checker.resolve(scheme.ty());
            let value = if ty.as_function().is_some() {
                Value::Builtin(Rc::new(Builtin {
                    name: format!("{}.{}", alias, name),
                    kind: BuiltinKind::Remote,
                }))
            } else {
                match ty.as_module().map(|m| m.id) {
                    Some(id) if modules.kind(id) == ModuleKind::Enum => {
                        let tags = Env::Module(id)
                            .bindings(modules, Visibility::Public)
                            .into_iter()
                            .filter(|(_, s)| s.ty().as_function().is_none())
                            .map(|(tag, _)| tag);
                        enum_values_namespace(&name, id, tags)
                    }
                    Some(id) => Value::Module(ModuleValue::new(Some(&name), Some(id), ModuleRole::Object).into_ref()),
                    None => Value::Null,
                }
            };
            namespace.fields.insert(name, value);
        }

        debug!("imported {} as {} ({} bindings)", decl.source, alias, namespace.fields.len());
        let value = Value::Module(namespace.into_ref());
        env.define(alias, value.clone());
        Ok(value)
    }

    // ==================================================================
    // Statements
    // ==================================================================

    /// `target = value` / `target += value`. Paths are rebuilt
    /// copy-on-write and the root binding is replaced. Inside a method the
    /// receiver is stored as a snapshot, never as itself.
    fn eval_reassignment(&mut self, env: &EvalEnv, target: &Node, op: AssignOp, value: &Node) -> Result<Value> {
        let value = self.eval(env, value)?;
        let value = match env.self_value() {
            Some(this) => cow::detach(value, &this),
            None => value,
        };

        let mut path: SmallVec<[String; 4]> = SmallVec::new();
        let mut root = target;
        while let NodeKind::Select { receiver, field, .. } = &root.kind {
            path.push(field.clone());
            root = receiver;
        }
        path.reverse();

        let mut result = Value::Null;
        let leaf = |old: Value| -> Result<Value> {
            let new = match op {
                AssignOp::Set => value,
                AssignOp::Add => ops::add(&old, &value)?,
            };
            result = new.clone();
            Ok(new)
        };

        match &root.kind {
            NodeKind::Symbol { name, .. } => {
                let current = env
                    .get(name)
                    .ok_or_else(|| DangError::runtime(format!("variable {:?} not found", name), None))?;
                let updated = cow::update_path(&current, &path, leaf)?;
                if !env.reassign(name, updated) {
                    return Err(DangError::runtime(format!("variable {:?} not found", name), None));
                }
            }
            NodeKind::SelfRef => {
                let this = env
                    .self_value()
                    .ok_or_else(|| DangError::runtime("self is not available outside a type body", None))?;
                let updated = cow::update_path(&Value::Module(this.clone()), &path, leaf)?;
                let Value::Module(updated) = updated else {
                    return Err(DangError::runtime("self can only be replaced by an object", None));
                };
                let fields = updated.borrow().fields.clone();
                this.borrow_mut().fields = fields;
            }
            _ => return Err(DangError::runtime("complex receivers must start with a symbol", None)),
        }
        Ok(result)
    }

    /// Run the block; on a falsy result, report each immediate child of the
    /// last form with its value
    fn eval_assert(&mut self, env: &EvalEnv, node: &Node, message: Option<&Node>, block: &Block) -> Result<Value> {
        let scope = if block.inline { env.clone() } else { env.clone_env() };
        let result = self.eval_forms(&scope, &block.forms)?;
        if result.is_truthy() {
            return Ok(Value::Null);
        }

        let last = block.forms.last();
        let message = match message {
            Some(message) => match self.eval(env, message)? {
                Value::String(s) => s,
                other => other.to_string(),
            },
            None => last.map(render).unwrap_or_else(|| "empty assertion".to_string()),
        };

        let mut details = Vec::new();
        if let Some(last) = last {
            for child in last.children() {
                let shown = match self.eval(&scope, child) {
                    Ok(value) => value.to_string(),
                    Err(err) => format!("<error: {}>", err),
                };
                details.push(format!("{}: {}", render(child), shown));
            }
        }

        Err(DangError::AssertionFailure {
            message: format!("assertion failed: {}", message),
            details,
            location: node.loc.clone(),
        })
    }
}

/// Forms bound before the rest of their sequence runs
fn is_hoisted(node: &Node) -> bool {
    matches!(
        node.kind,
        NodeKind::FunDecl(_) | NodeKind::ClassDecl(_) | NodeKind::EnumDecl(_)
    )
}

fn declared_name(node: &Node) -> Option<&str> {
    match &node.kind {
        NodeKind::FunDecl(decl) => Some(&decl.name),
        NodeKind::ClassDecl(decl) => Some(&decl.name),
        NodeKind::EnumDecl(decl) => Some(&decl.name),
        _ => None,
    }
}

/// Namespace of an enum: one field per value plus `values()`
fn enum_values_namespace(name: &str, module: ModuleId, tags: impl Iterator<Item = String>) -> Value {
    let mut namespace = ModuleValue::new(Some(name), Some(module), ModuleRole::Object);
    let mut values = Vec::new();
    for tag in tags {
        let value = Value::Enum {
            tag: tag.clone(),
            enum_type: module,
        };
        namespace.fields.insert(tag, value.clone());
        values.push(value);
    }
    let elem_type = Type::module(module, Some(name)).non_null();
    namespace.fields.insert(
        "values".to_string(),
        Value::Builtin(Rc::new(Builtin {
            name: format!("{}.values", name),
            kind: BuiltinKind::Constant(Value::list(values, Some(elem_type))),
        })),
    );
    Value::Module(namespace.into_ref())
}
