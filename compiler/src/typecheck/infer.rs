//! Inference for expressions, plus the per-node dispatch

use super::Checker;
use crate::ast::{Arg, AssignOp, BinaryOp, Block, FunctionBase, LoopHead, Node, NodeKind};
use crate::env::{Env, ModuleKind, Visibility};
use crate::errors::{DangError, Result};
use crate::types::{FunctionType, Type};
use fxhash::FxHashSet;

impl Checker {
    pub(super) fn hoist_node(&mut self, env: &Env, node: &Node, pass: u8) -> Result<()> {
        match &node.kind {
            NodeKind::FunDecl(decl) if pass == 1 => self.hoist_fun_decl(env, node, decl),
            NodeKind::ClassDecl(decl) => self.hoist_class(env, node, decl, pass),
            NodeKind::EnumDecl(decl) if pass == 0 => self.hoist_enum(env, node, decl),
            NodeKind::ScalarDecl(decl) if pass == 0 => self.hoist_scalar(env, node, decl),
            NodeKind::InterfaceDecl(decl) => self.hoist_interface(env, node, decl, pass),
            NodeKind::DirectiveDecl(decl) if pass == 1 => self.hoist_directive(env, decl),
            NodeKind::ImportDecl(decl) if pass == 0 => self.hoist_import(env, node, decl),
            NodeKind::Slot(slot) if pass == 1 => self.hoist_slot(env, slot),
            _ => Ok(()),
        }
    }

    pub(super) fn infer_node(&mut self, env: &Env, node: &Node) -> Result<Type> {
        match &node.kind {
            NodeKind::Int(_) => Ok(self.int_type()),
            NodeKind::Float(_) => Ok(self.float_type()),
            NodeKind::String(_) => Ok(self.string_type()),
            NodeKind::Boolean(_) => Ok(self.boolean_type()),
            NodeKind::Null => Ok(self.fresher.fresh()),
            NodeKind::List(items) => self.infer_list(env, items),
            NodeKind::Object(slots) => self.infer_object(env, node, slots),

            NodeKind::Symbol { name, auto_call } => {
                let scheme = env
                    .scheme_of(&self.modules, name)
                    .ok_or_else(|| DangError::not_found(name.clone(), node.loc.clone()))?;
                let ty = scheme.into_type();
                let ty = self.instantiate_builtin(name, &ty).unwrap_or(ty);
                Ok(if *auto_call { self.auto_call(ty) } else { ty })
            }
            NodeKind::SelfRef => env
                .dynamic_scope_type(&self.modules)
                .ok_or_else(|| DangError::not_found("self", node.loc.clone())),
            NodeKind::Select {
                receiver,
                field,
                auto_call,
            } => self.infer_select(env, receiver, field, *auto_call),
            NodeKind::Index { receiver, index } => self.infer_index(env, receiver, index),
            NodeKind::FunCall { fun, args, block } => self.infer_call(env, node, fun, args, block.as_deref()),
            NodeKind::Lambda(fun) => self.infer_lambda(env, node, fun, None),

            NodeKind::Binary { op, left, right } => self.infer_binary(env, *op, left, right),
            NodeKind::Not(inner) => {
                let ty = self.infer(env, inner)?;
                let boolean = self.boolean_type();
                self.assignable(&ty, &boolean.clone().nullable()).map_err(|_| {
                    DangError::unification(format!("operator ! requires a Boolean, got {}", self.show(&ty)))
                })?;
                Ok(boolean)
            }
            NodeKind::Conditional { cond, then, otherwise } => {
                self.infer_conditional(env, cond, then, otherwise.as_ref())
            }
            NodeKind::Let { name, value, body } => {
                let value_ty = self.infer(env, value)?;
                let scope = env.clone_env(&mut self.modules);
                scope.add(&mut self.modules, name, value_ty.into());
                self.infer(&scope, body)
            }
            NodeKind::Block(block) => self.infer_block(env, block),
            NodeKind::ForLoop { head, body } => self.infer_loop(env, head, body),
            NodeKind::Break | NodeKind::Continue => {
                if self.loops == 0 {
                    let keyword = if matches!(node.kind, NodeKind::Break) { "break" } else { "continue" };
                    return Err(DangError::unification(format!("{} outside of a loop", keyword)));
                }
                Ok(self.fresher.fresh())
            }

            NodeKind::Slot(slot) => self.infer_slot(env, slot),
            NodeKind::FunDecl(decl) => self.infer_fun_decl(env, node, decl),
            NodeKind::ClassDecl(decl) => self.infer_class(env, node, decl),
            NodeKind::NewConstructor(_) => Err(DangError::unification(
                "new() constructor can only be defined inside a type body",
            )),
            NodeKind::EnumDecl(decl) => self.infer_enum(env, node, decl),
            NodeKind::ScalarDecl(decl) => self.infer_scalar(env, node, decl),
            NodeKind::InterfaceDecl(decl) => self.infer_interface(env, node, decl),
            NodeKind::DirectiveDecl(decl) => {
                self.hoist_directive(env, decl)?;
                Ok(self.fresher.fresh())
            }
            NodeKind::ImportDecl(decl) => self.infer_import(env, node, decl),

            NodeKind::Reassignment { target, op, value } => self.infer_reassignment(env, target, *op, value),
            NodeKind::Reopen { name, block } => self.infer_reopen(env, node, name, block),
            NodeKind::Assert { message, block } => {
                if let Some(message) = message {
                    self.infer(env, message)?;
                }
                self.infer_block(env, block)?;
                Ok(self.fresher.fresh())
            }
        }
    }

    /// A block's forms in a child scope (or in `env` itself when inline)
    pub(crate) fn infer_block(&mut self, env: &Env, block: &Block) -> Result<Type> {
        if block.inline {
            return self.infer_forms(env, &block.forms);
        }
        let scope = env.clone_env(&mut self.modules);
        self.infer_forms(&scope, &block.forms)
    }

    /// Zero-argument functions referenced with auto-call yield their result
    pub(crate) fn auto_call(&self, ty: Type) -> Type {
        let resolved = self.resolve(&ty);
        match resolved.as_function() {
            Some(fun) if fun.required_args().next().is_none() && fun.block.is_none() => fun.ret.clone(),
            _ => ty,
        }
    }

    /// Infer with an expected type, which lets lambdas pick up their
    /// parameter types from the context they are passed into
    pub(crate) fn infer_expecting(&mut self, env: &Env, node: &Node, expected: &Type) -> Result<Type> {
        match (&node.kind, self.resolve(expected).as_function()) {
            (NodeKind::Lambda(fun), Some(expected_fn)) => {
                let expected_fn = expected_fn.clone();
                let ty = self
                    .infer_lambda(env, node, fun, Some(&expected_fn))
                    .map_err(|e| e.with_location(node.loc.as_ref()))?;
                self.node_types.insert(node.id, ty.clone());
                Ok(ty)
            }
            _ => self.infer(env, node),
        }
    }

    // ==================================================================
    // Literals
    // ==================================================================

    fn infer_list(&mut self, env: &Env, items: &[Node]) -> Result<Type> {
        let Some((first, rest)) = items.split_first() else {
            return Ok(Type::list(self.fresher.fresh()).non_null());
        };

        let mut elem = self.infer(env, first)?;
        for (i, item) in rest.iter().enumerate() {
            let item_ty = self.infer(env, item)?;
            match self.unify(&elem, &item_ty) {
                Ok(unified) => elem = unified,
                Err(err) => match self.unifier().find_common_supertype(&elem, &item_ty) {
                    Some(common) => elem = common,
                    None => {
                        return Err(DangError::unification(format!("unify index {}: {}", i + 1, err))
                            .with_location(item.loc.as_ref()))
                    }
                },
            }
        }
        Ok(Type::list(elem).non_null())
    }

    fn infer_object(&mut self, env: &Env, node: &Node, slots: &[Node]) -> Result<Type> {
        let module = self.modules.create(None, ModuleKind::Object, None);
        let scope = Env::composite(module, env);
        self.infer_forms(&scope, slots)?;
        self.node_modules.insert(node.id, module);
        Ok(self.modules.type_of(module).non_null())
    }

    // ==================================================================
    // Selection and calls
    // ==================================================================

    fn infer_select(&mut self, env: &Env, receiver: &Node, field: &str, auto_call: bool) -> Result<Type> {
        let receiver_ty = self.infer(env, receiver)?;
        let resolved = self.resolve(&receiver_ty);
        let nullable = !resolved.is_non_null();

        let not_found = |checker: &Self| {
            DangError::unification(format!("field {:?} not found in {}", field, checker.show(&resolved)))
        };

        let field_ty = if let Some(id) = resolved.as_module().map(|m| m.id) {
            let scope = Env::Module(id);
            let scheme = scope
                .scheme_of(&self.modules, field)
                .ok_or_else(|| not_found(self))?;
            let inside = env
                .dynamic_scope_type(&self.modules)
                .and_then(|t| t.as_module().map(|m| m.id))
                == Some(id);
            if scope.visibility(&self.modules, field) == Visibility::Private
                && !inside
                && self.modules.get(id).name.is_some()
            {
                return Err(DangError::unification(format!(
                    "field {:?} is private in {}",
                    field,
                    self.show(&resolved)
                )));
            }
            scheme.into_type()
        } else {
            let record = match &resolved {
                Type::Record(record) => Some(record),
                Type::NonNull(inner) => match inner.as_ref() {
                    Type::Record(record) => Some(record),
                    _ => None,
                },
                _ => None,
            };
            record
                .and_then(|r| r.scheme_of(field))
                .map(|s| s.ty().clone())
                .ok_or_else(|| not_found(self))?
        };

        let ty = if auto_call { self.auto_call(field_ty) } else { field_ty };
        let ty = self.resolve(&ty);
        Ok(if nullable { ty.nullable() } else { ty })
    }

    /// `xs[i]` is nullable: the position may be out of range
    fn infer_index(&mut self, env: &Env, receiver: &Node, index: &Node) -> Result<Type> {
        let receiver_ty = self.infer(env, receiver)?;
        let index_ty = self.infer(env, index)?;

        let int = self.int_type();
        if self.assignable(&index_ty, &int).is_err() {
            return Err(DangError::unification(format!("index must be Int!, got {}", self.show(&index_ty)))
                .with_location(index.loc.as_ref()));
        }

        let resolved = self.resolve(&receiver_ty);
        let elem = match resolved.clone().nullable() {
            Type::List(elem) => *elem,
            _ => return Err(self.not_a_list("index", &resolved)),
        };
        Ok(self.resolve(&elem).nullable())
    }

    fn not_a_list(&self, action: &str, ty: &Type) -> DangError {
        if ty.list_elem().is_some() {
            return DangError::unification(format!(
                "cannot {} {} directly; select fields from its objects first",
                action,
                self.show(ty)
            ));
        }
        DangError::unification(format!("cannot {} non-list type {}", action, self.show(ty)))
    }

    fn infer_call(
        &mut self,
        env: &Env,
        node: &Node,
        fun: &Node,
        args: &[Arg],
        block: Option<&Node>,
    ) -> Result<Type> {
        let fun_ty = self.infer(env, fun)?;
        let resolved = self.resolve(&fun_ty);
        let Some(signature) = resolved.as_function().cloned() else {
            return Err(DangError::unification(format!("cannot call {}", self.show(&resolved))));
        };

        let names: Vec<String> = signature.arg_names().map(str::to_string).collect();
        let mut provided = FxHashSet::default();
        for (i, a) in args.iter().enumerate() {
            let name = match &a.name {
                Some(name) if names.contains(name) => name.clone(),
                Some(name) => return Err(DangError::unification(format!("unknown argument {:?}", name))),
                None => names.get(i).cloned().ok_or_else(|| {
                    DangError::unification(format!(
                        "too many arguments: expected at most {}, got {}",
                        names.len(),
                        args.len()
                    ))
                })?,
            };
            if !provided.insert(name.clone()) {
                return Err(DangError::unification(format!("argument {:?} given more than once", name)));
            }

            let want = signature
                .args
                .scheme_of(&name)
                .map(|s| s.ty().clone())
                .unwrap_or_else(|| self.fresher.fresh());
            let have = self.infer_expecting(env, &a.value, &want)?;
            self.assignable(&have, &want)
                .map_err(|e| e.context(format!("argument {:?}", name)).with_location(a.value.loc.as_ref()))?;
        }

        match (block, &signature.block) {
            (Some(block), Some(expected)) => {
                let expected = Type::function((**expected).clone());
                let have = self.infer_expecting(env, block, &expected)?;
                self.assignable(&have, &expected).map_err(|_| {
                    DangError::unification(format!(
                        "block argument has type {} but expected {}",
                        self.show(&have),
                        self.show(&expected)
                    ))
                    .with_location(block.loc.as_ref())
                })?;
            }
            (Some(_), None) => {
                return Err(DangError::unification("function does not accept a block argument"));
            }
            (None, Some(_)) => return Err(DangError::unification("function requires a block argument")),
            (None, None) => {}
        }

        if let Some(missing) = signature.required_args().find(|name| !provided.contains(*name)) {
            return Err(DangError::unification(format!("missing required argument {:?}", missing)));
        }

        self.call_layouts.insert(node.id, names);

        let ret = self.resolve(&signature.ret);
        let nullable_receiver = match &fun.kind {
            NodeKind::Select { receiver, .. } => self.type_of(receiver.id).is_some_and(|t| !t.is_non_null()),
            _ => false,
        };
        Ok(if nullable_receiver { ret.nullable() } else { ret })
    }

    fn infer_lambda(
        &mut self,
        env: &Env,
        node: &Node,
        fun: &FunctionBase,
        expected: Option<&FunctionType>,
    ) -> Result<Type> {
        let signature = self.infer_function(env, fun, true, expected)?;
        self.signatures.insert(node.id, signature.clone());
        Ok(Type::function(signature))
    }

    // ==================================================================
    // Operators and control flow
    // ==================================================================

    fn infer_binary(&mut self, env: &Env, op: BinaryOp, left: &Node, right: &Node) -> Result<Type> {
        let lt = self.infer(env, left)?;
        let rt = self.infer(env, right)?;
        match op {
            _ if op.is_arithmetic() => self.arithmetic_type(op, &lt, &rt),
            _ if op.is_comparison() => {
                self.settle_vars(&lt, &rt)?;
                let (l, r) = (self.builtin_of(&lt), self.builtin_of(&rt));
                let b = self.builtins();
                let numeric = |id| id == Some(b.int) || id == Some(b.float);
                if (numeric(l) && numeric(r)) || (l == Some(b.string) && r == Some(b.string)) {
                    Ok(self.boolean_type())
                } else {
                    Err(self.operator_mismatch(op, &lt, &rt))
                }
            }
            BinaryOp::Default => {
                let unified = self.unify(&lt.clone().nullable(), &rt.clone().nullable())?;
                let rt = self.resolve(&rt);
                Ok(if rt.is_non_null() { unified.non_null() } else { unified })
            }
            _ => Ok(self.boolean_type()),
        }
    }

    /// Bind an unresolved operand to the other operand's type
    fn settle_vars(&mut self, lt: &Type, rt: &Type) -> Result<()> {
        let (l, r) = (self.resolve(lt), self.resolve(rt));
        if l.as_var().is_some() || r.as_var().is_some() {
            self.unify(&l, &r)?;
        }
        Ok(())
    }

    fn operator_mismatch(&self, op: BinaryOp, lt: &Type, rt: &Type) -> DangError {
        DangError::unification(format!(
            "operator {} cannot be applied to {} and {}",
            op.symbol(),
            self.show(lt),
            self.show(rt)
        ))
    }

    /// Result type of an arithmetic operator. Mixing Int and Float yields
    /// Float; `+` also concatenates strings and lists.
    pub(crate) fn arithmetic_type(&mut self, op: BinaryOp, lt: &Type, rt: &Type) -> Result<Type> {
        self.settle_vars(lt, rt)?;
        let b = self.builtins();
        let (l, r) = (self.builtin_of(lt), self.builtin_of(rt));
        match (l, r) {
            (Some(x), Some(y)) if x == b.int && y == b.int => return Ok(self.int_type()),
            (Some(x), Some(y))
                if (x == b.int || x == b.float) && (y == b.int || y == b.float) =>
            {
                return Ok(self.float_type())
            }
            (Some(x), Some(y)) if op == BinaryOp::Add && x == b.string && y == b.string => {
                return Ok(self.string_type())
            }
            _ => {}
        }

        if op == BinaryOp::Add {
            let (lr, rr) = (self.resolve(lt), self.resolve(rt));
            if let (Some(le), Some(re)) = (lr.list_elem(), rr.list_elem()) {
                let (le, re) = (le.clone(), re.clone());
                let elem = match self.unify(&le, &re) {
                    Ok(elem) => elem,
                    Err(_) => self
                        .unifier()
                        .find_common_supertype(&le, &re)
                        .ok_or_else(|| self.operator_mismatch(op, lt, rt))?,
                };
                return Ok(Type::list(elem).non_null());
            }
        }

        let (lr, rr) = (self.resolve(lt), self.resolve(rt));
        if lr.as_var().is_some() {
            return Ok(rr);
        }
        Err(self.operator_mismatch(op, lt, rt))
    }

    fn infer_conditional(&mut self, env: &Env, cond: &Node, then: &Block, otherwise: Option<&Block>) -> Result<Type> {
        let cond_ty = self.infer(env, cond)?;
        let boolean = self.boolean_type().nullable();
        if self.assignable(&cond_ty, &boolean).is_err() {
            return Err(DangError::unification(format!(
                "condition must be Boolean, got {}",
                self.show(&cond_ty)
            ))
            .with_location(cond.loc.as_ref()));
        }

        let narrowed = null_check(cond);
        let then_ty = match narrowed {
            Some((name, true)) => self.infer_narrowed(env, then, name)?,
            _ => self.infer_block(env, then)?,
        };
        let Some(otherwise) = otherwise else {
            return Ok(self.resolve(&then_ty).nullable());
        };
        let else_ty = match narrowed {
            Some((name, false)) => self.infer_narrowed(env, otherwise, name)?,
            _ => self.infer_block(env, otherwise)?,
        };

        let (t, e) = (self.resolve(&then_ty), self.resolve(&else_ty));
        let both_non_null = t.is_non_null() && e.is_non_null();
        let unified = match self.unify(&t.clone().nullable(), &e.clone().nullable()) {
            Ok(unified) => unified,
            Err(err) => self
                .unifier()
                .find_common_supertype(&t.clone().nullable(), &e.clone().nullable())
                .ok_or(err)?,
        };
        Ok(if both_non_null { unified.non_null() } else { unified })
    }

    /// Infer a branch in which `name` is known not to be null
    fn infer_narrowed(&mut self, env: &Env, block: &Block, name: &str) -> Result<Type> {
        let ty = match env.scheme_of(&self.modules, name) {
            Some(scheme) => self.resolve(scheme.ty()),
            None => return self.infer_block(env, block),
        };
        if block.inline || ty.is_non_null() || ty.as_var().is_some() {
            return self.infer_block(env, block);
        }
        let scope = env.clone_env(&mut self.modules);
        scope.add(&mut self.modules, name, ty.non_null().into());
        self.infer_forms(&scope, &block.forms)
    }

    /// A loop's value is the last value of its body, or null when the body
    /// never runs
    fn infer_loop(&mut self, env: &Env, head: &LoopHead, body: &Block) -> Result<Type> {
        let scope = env.clone_env(&mut self.modules);
        match head {
            LoopHead::Each { index, name, iterable } => {
                let iterable_ty = self.infer(env, iterable)?;
                let resolved = self.resolve(&iterable_ty);
                let elem = match resolved.clone().nullable() {
                    Type::List(elem) => *elem,
                    _ => return Err(self.not_a_list("iterate over", &resolved).with_location(iterable.loc.as_ref())),
                };
                if let Some(index) = index {
                    let int = self.int_type();
                    scope.add(&mut self.modules, index, int.into());
                }
                scope.add(&mut self.modules, name, elem.into());
            }
            LoopHead::While(cond) => {
                let cond_ty = self.infer(env, cond)?;
                let boolean = self.boolean_type();
                if self.assignable(&cond_ty, &boolean).is_err() {
                    return Err(DangError::unification(format!(
                        "loop condition must be Boolean!, got {}",
                        self.show(&cond_ty)
                    ))
                    .with_location(cond.loc.as_ref()));
                }
            }
        }

        self.loops += 1;
        let result = self.infer_forms(&scope, &body.forms);
        self.loops -= 1;
        Ok(self.resolve(&result?).nullable())
    }

    // ==================================================================
    // Reassignment
    // ==================================================================

    fn infer_reassignment(&mut self, env: &Env, target: &Node, op: AssignOp, value: &Node) -> Result<Type> {
        let mut root = target;
        while let NodeKind::Select { receiver, .. } = &root.kind {
            root = receiver;
        }
        match &root.kind {
            NodeKind::Symbol { name, .. } => {
                if env.scheme_of(&self.modules, name).is_none() {
                    return Err(DangError::not_found(name.clone(), root.loc.clone()));
                }
            }
            NodeKind::SelfRef => {}
            _ => return Err(DangError::unification("complex receivers must start with a symbol")),
        }

        let target_ty = match &target.kind {
            NodeKind::Symbol { name, .. } => env
                .scheme_of(&self.modules, name)
                .map(|s| s.into_type())
                .ok_or_else(|| DangError::not_found(name.clone(), target.loc.clone()))?,
            _ => self.infer(env, target)?,
        };
        let value_ty = self.infer_expecting(env, value, &target_ty)?;

        let result_ty = match op {
            AssignOp::Set => value_ty,
            AssignOp::Add => self.arithmetic_type(BinaryOp::Add, &target_ty, &value_ty)?,
        };
        self.assignable(&result_ty, &target_ty)
            .map_err(|e| e.context("reassignment").with_location(value.loc.as_ref()))?;
        Ok(self.resolve(&target_ty))
    }
}

/// `x != null` (true) or `x == null` (false), either way around
fn null_check(cond: &Node) -> Option<(&str, bool)> {
    let NodeKind::Binary { op, left, right } = &cond.kind else {
        return None;
    };
    let non_null = match op {
        BinaryOp::NotEq => true,
        BinaryOp::Eq => false,
        _ => return None,
    };
    let name = match (&left.kind, &right.kind) {
        (NodeKind::Symbol { name, .. }, NodeKind::Null) | (NodeKind::Null, NodeKind::Symbol { name, .. }) => name,
        _ => return None,
    };
    Some((name.as_str(), non_null))
}
