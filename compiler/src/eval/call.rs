//! Calls: closures, bound methods, constructors and builtins

use super::env::EvalEnv;
use super::value::{BuiltinKind, ConstructorValue, FunctionValue, ModuleRole, ModuleValue, Value};
use super::Interpreter;
use crate::ast::{Arg, FunctionBase, Node, NodeKind};
use crate::errors::{DangError, Result};
use fxhash::FxHashSet;
use log::{debug, trace};
use source_map::SourceLocation;
use std::io::Write;

/// Arguments as written at the call site: optional name, value
pub type CallArgs = Vec<(Option<String>, Value)>;

impl Interpreter {
    pub(super) fn eval_call(
        &mut self,
        env: &EvalEnv,
        node: &Node,
        fun: &Node,
        args: &[Arg],
        block: Option<&Node>,
    ) -> Result<Value> {
        let callee = self.eval(env, fun)?;
        if callee.is_null() && matches!(fun.kind, NodeKind::Select { .. }) {
            // method on a null receiver
            return Ok(Value::Null);
        }

        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push((arg.name.clone(), self.eval(env, &arg.value)?));
        }
        let block = match block {
            Some(block) => Some(self.eval(env, block)?),
            None => None,
        };

        let layout = self.checker.call_layout(node.id).map(<[String]>::to_vec);
        self.call_value(callee, values, block, layout.as_deref(), node.loc.as_ref())
    }

    /// Call any callable value.
    ///
    /// `layout` is the argument order of the callee's static signature at
    /// this call site; arguments are matched to parameters by position in
    /// it, so a lambda may name its parameters differently from the
    /// function type it was passed as.
    pub fn call_value(
        &mut self,
        callee: Value,
        args: CallArgs,
        block: Option<Value>,
        layout: Option<&[String]>,
        loc: Option<&SourceLocation>,
    ) -> Result<Value> {
        match callee {
            Value::Function(fun) => {
                let slots = arrange(layout, &fun.param_names(), args)?;
                let scope = fun.closure.clone_env();
                self.call_function(&fun, &scope, slots, block, loc)
            }
            Value::BoundMethod { receiver, fun } => {
                let slots = arrange(layout, &fun.param_names(), args)?;
                // the body works on its own copy of the receiver
                let this = receiver.borrow().shallow_copy().into_ref();
                let scope = EvalEnv::composite(this, &fun.closure.lexical()).clone_env();
                self.call_function(&fun, &scope, slots, block, loc)
            }
            Value::Constructor(ctor) => {
                let slots = arrange(layout, &ctor.param_names(), args)?;
                self.construct(&ctor, slots, loc)
            }
            Value::Builtin(builtin) => match &builtin.kind {
                BuiltinKind::Constant(value) => Ok(value.clone()),
                BuiltinKind::Remote => Err(DangError::unsupported(
                    format!("calling remote field {}", builtin.name),
                    loc.cloned(),
                )),
                BuiltinKind::Print => {
                    let value = args.into_iter().next().map_or(Value::Null, |(_, value)| value);
                    let line = match &value {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    writeln!(self.output, "{}", line)
                        .map_err(|e| DangError::runtime(format!("print: {}", e), loc.cloned()))?;
                    Ok(Value::Null)
                }
            },
            Value::Null => Err(DangError::runtime("cannot call null", loc.cloned())),
            other => Err(DangError::runtime(
                format!("cannot call {}", other.type_name()),
                loc.cloned(),
            )),
        }
    }

    fn enter(&mut self, loc: Option<&SourceLocation>) -> Result<()> {
        if self.depth >= self.config.max_depth {
            return Err(DangError::RecursionLimitExceeded {
                limit: self.config.max_depth,
                location: loc.cloned(),
            });
        }
        self.depth += 1;
        Ok(())
    }

    fn call_function(
        &mut self,
        fun: &FunctionValue,
        scope: &EvalEnv,
        slots: Vec<Option<Value>>,
        block: Option<Value>,
        loc: Option<&SourceLocation>,
    ) -> Result<Value> {
        self.enter(loc)?;
        trace!("call {} (depth {})", fun.name.as_deref().unwrap_or("lambda"), self.depth);
        let result = self
            .bind_params(scope, &fun.fun, slots, block)
            .and_then(|()| self.eval_forms(scope, &fun.fun.body.forms));
        self.depth -= 1;
        result
    }

    /// Bind arguments in `scope`. Omitted or null arguments fall back to
    /// their default, evaluated in the call's own scope.
    fn bind_params(
        &mut self,
        scope: &EvalEnv,
        fun: &FunctionBase,
        slots: Vec<Option<Value>>,
        block: Option<Value>,
    ) -> Result<()> {
        let mut slots = slots.into_iter();
        for param in &fun.args {
            let given = slots.next().flatten().filter(|v| !v.is_null());
            let value = match (given, &param.value) {
                (Some(value), _) => value,
                (None, Some(default)) => self.eval(scope, default)?,
                (None, None) => Value::Null,
            };
            scope.define(&param.name, value);
        }
        if let Some(param) = &fun.block_param {
            scope.define(&param.name, block.unwrap_or(Value::Null));
        }
        Ok(())
    }

    // ==================================================================
    // Constructors
    // ==================================================================

    /// Build an instance: fields in declaration order, then the explicit
    /// `new()` body if there is one
    fn construct(
        &mut self,
        ctor: &ConstructorValue,
        slots: Vec<Option<Value>>,
        loc: Option<&SourceLocation>,
    ) -> Result<Value> {
        self.enter(loc)?;
        let result = self.construct_instance(ctor, slots);
        self.depth -= 1;
        result
    }

    fn construct_instance(&mut self, ctor: &ConstructorValue, slots: Vec<Option<Value>>) -> Result<Value> {
        let decl = &ctor.decl;
        debug!("constructing {}", decl.name);
        let instance = ModuleValue::new(Some(&decl.name), Some(ctor.module), ModuleRole::Instance)
            .with_parent(ctor.statics.clone())
            .into_ref();
        let scope = EvalEnv::composite(instance.clone(), &ctor.closure);

        let explicit = decl.constructor();
        let mut bound = FxHashSet::default();
        if explicit.is_none() {
            for (param, value) in decl.implicit_constructor_params().into_iter().zip(slots.iter()) {
                if let Some(value) = value.as_ref().filter(|v| !v.is_null()) {
                    instance.borrow_mut().fields.insert(param.name.clone(), value.clone());
                    bound.insert(param.name.clone());
                }
            }
        }

        let forms: Vec<&Node> = decl.forms_without_new().collect();
        for form in forms.iter().filter(|f| matches!(f.kind, NodeKind::FunDecl(_))) {
            self.eval(&scope, form)?;
        }
        for form in &forms {
            match &form.kind {
                NodeKind::FunDecl(_) => {}
                NodeKind::Slot(slot) if bound.contains(&slot.name) => {}
                NodeKind::Slot(slot) => {
                    self.eval_slot(&scope, form, slot, explicit.is_some())?;
                }
                _ => {
                    self.eval(&scope, form)?;
                }
            }
        }

        let value = match explicit {
            Some((_, fun)) => {
                let body_scope = scope.clone_env();
                self.bind_params(&body_scope, fun, slots, None)?;
                self.eval_forms(&body_scope, &fun.body.forms)?
            }
            None => Value::Module(instance),
        };

        self.check_required_fields(ctor, &value)?;
        Ok(value)
    }

    /// Every non-null field must hold a value once construction is done
    fn check_required_fields(&self, ctor: &ConstructorValue, value: &Value) -> Result<()> {
        let Value::Module(module) = value else {
            return Ok(());
        };
        for form in ctor.decl.forms_without_new() {
            let NodeKind::Slot(slot) = &form.kind else {
                continue;
            };
            let required = self.checker.type_of(form.id).is_some_and(|t| t.is_non_null());
            let missing = module.borrow().get(&slot.name).map_or(true, |v| v.is_null());
            if required && missing {
                return Err(DangError::runtime(
                    format!(
                        "new() for {}: required field {:?} was not assigned",
                        ctor.decl.name, slot.name
                    ),
                    form.loc.clone(),
                ));
            }
        }
        Ok(())
    }
}

/// Order call-site arguments by parameter position
fn arrange(layout: Option<&[String]>, params: &[String], args: CallArgs) -> Result<Vec<Option<Value>>> {
    let names = layout.unwrap_or(params);
    let mut slots: Vec<Option<Value>> = vec![None; names.len().max(params.len())];
    for (i, (name, value)) in args.into_iter().enumerate() {
        let index = match &name {
            Some(name) => names
                .iter()
                .position(|n| n == name)
                .or_else(|| params.iter().position(|n| n == name))
                .ok_or_else(|| DangError::runtime(format!("unknown argument {:?}", name), None))?,
            None => i,
        };
        let slot = slots.get_mut(index).ok_or_else(|| {
            DangError::runtime(
                format!("too many arguments: expected at most {}, got {}", params.len(), index + 1),
                None,
            )
        })?;
        *slot = Some(value);
    }
    Ok(slots)
}
