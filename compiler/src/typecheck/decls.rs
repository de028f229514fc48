//! Declarations: slots, functions, classes, enums, scalars, interfaces,
//! directives and reopen

use super::Checker;
use crate::ast::{Block, ClassDecl, DirectiveDecl, EnumDecl, FunDecl, FunctionBase, InterfaceDecl, Node, NodeKind, ScalarDecl, SlotDecl};
use crate::env::{DirectiveLocation, DirectiveSignature, Env, ModuleId, ModuleKind, Visibility};
use crate::errors::{DangError, NameKind, Result};
use crate::types::{FunctionType, RecordType, Type};
use crate::unify::{validate_field_implementation, Unifier};
use log::debug;

impl Checker {
    // ==================================================================
    // Functions
    // ==================================================================

    /// Argument and return types of a function, without its body.
    ///
    /// Returns the signature and the scope the body runs in, with every
    /// argument (and the block parameter) bound. An argument with a default
    /// is nullable in the signature so callers may omit it.
    pub(crate) fn function_signature(
        &mut self,
        env: &Env,
        fun: &FunctionBase,
        allow_fresh: bool,
        expected: Option<&FunctionType>,
    ) -> Result<(FunctionType, Env)> {
        let scope = env.clone_env(&mut self.modules);
        let mut args = RecordType::new();

        for (i, arg) in fun.args.iter().enumerate() {
            let declared = match &arg.ty {
                Some(ty) => Some(self.resolve_type_node(env, ty)?),
                None => None,
            };
            let default = match &arg.value {
                Some(value) => Some(self.infer(&scope, value)?),
                None => None,
            };
            self.check_directives(env, &arg.directives, DirectiveLocation::ArgumentDefinition)?;

            let ty = match (declared, default) {
                (Some(declared), Some(default)) => {
                    self.unify(&declared, &default).map_err(|e| {
                        DangError::unification(format!(
                            "function arg {:?} mismatch: defined as {}, inferred as {}: {}",
                            arg.name,
                            self.show(&declared),
                            self.show(&default),
                            e
                        ))
                    })?;
                    declared
                }
                (Some(declared), None) => declared,
                (None, Some(default)) => default,
                (None, None) => match expected.and_then(|e| e.args.fields.get_index(i)) {
                    Some((_, scheme)) => scheme.ty().clone(),
                    None if allow_fresh => self.fresher.fresh(),
                    None => {
                        return Err(DangError::unification(format!(
                            "function arg {:?} has no type or value",
                            arg.name
                        ))
                        .with_location(arg.loc.as_ref()))
                    }
                },
            };

            scope.add(&mut self.modules, &arg.name, ty.clone().into());
            let signature_ty = if arg.value.is_some() { ty.nullable() } else { ty };
            args.add(arg.name.clone(), signature_ty);
        }

        let mut block = None;
        if let Some(param) = &fun.block_param {
            let ty = match (&param.ty, expected.and_then(|e| e.block.as_deref())) {
                (Some(ty), _) => self.resolve_type_node(env, ty)?,
                (None, Some(expected)) => Type::function(expected.clone()),
                (None, None) => self.fresher.fresh(),
            };
            let resolved = self.resolve(&ty);
            let block_fn = resolved.as_function().cloned().ok_or_else(|| {
                DangError::unification(format!(
                    "block parameter &{} must have a function type, got {}",
                    param.name,
                    self.show(&resolved)
                ))
            })?;
            scope.add(&mut self.modules, &param.name, Type::function(block_fn.clone()).into());
            block = Some(block_fn);
        }

        let ret = match &fun.ret {
            Some(ret) => self.resolve_type_node(env, ret)?,
            None => self.fresher.fresh(),
        };

        let mut signature = FunctionType::new(args, ret);
        if let Some(block) = block {
            signature = signature.with_block(block);
        }
        Ok((signature, scope))
    }

    /// Full function inference: signature, then the body in its own scope.
    /// A declared return type must accept the body's type.
    pub(crate) fn infer_function(
        &mut self,
        env: &Env,
        fun: &FunctionBase,
        allow_fresh: bool,
        expected: Option<&FunctionType>,
    ) -> Result<FunctionType> {
        let (mut signature, scope) = self.function_signature(env, fun, allow_fresh, expected)?;
        let body_ty = self.outside_loops(|checker| checker.infer_forms(&scope, &fun.body.forms))?;

        if fun.ret.is_some() {
            let last_loc = fun.body.forms.last().and_then(|f| f.loc.clone());
            self.assignable(&body_ty, &signature.ret)
                .map_err(|e| e.context("return type mismatch").with_location(last_loc.as_ref()))?;
        } else {
            signature.ret = body_ty;
        }
        Ok(self.subst.apply_function(&signature))
    }

    pub(super) fn hoist_fun_decl(&mut self, env: &Env, node: &Node, decl: &FunDecl) -> Result<()> {
        let (signature, _) = self
            .function_signature(env, &decl.function, false, None)
            .map_err(|e| e.context(format!("{} signature", decl.name)))?;
        debug!("hoisted fn {}: {}", decl.name, signature);
        env.add(&mut self.modules, &decl.name, Type::function(signature.clone()).into());
        env.set_visibility(&mut self.modules, &decl.name, decl.visibility);
        self.signatures.insert(node.id, signature);
        Ok(())
    }

    pub(super) fn infer_fun_decl(&mut self, env: &Env, node: &Node, decl: &FunDecl) -> Result<Type> {
        let signature = self.infer_function(env, &decl.function, false, None)?;
        let ty = Type::function(signature);

        if let Some(hoisted) = env.local_scheme_of(&self.modules, &decl.name) {
            self.unify(hoisted.ty(), &ty)?;
        }

        self.check_directives(env, &decl.directives, DirectiveLocation::FieldDefinition)?;
        self.record_binding(env, &decl.name, ty.clone(), decl.visibility, decl.docstring.as_deref());
        if !decl.directives.is_empty() {
            env.set_directives(&mut self.modules, &decl.name, decl.directives.clone());
        }

        let resolved = self.resolve(&ty);
        if let Some(signature) = resolved.as_function() {
            self.signatures.insert(node.id, signature.clone());
        }
        Ok(resolved)
    }

    /// Run `f` as the body of a function or type, where `break` and
    /// `continue` cannot reach an enclosing loop
    pub(super) fn outside_loops<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let outer = std::mem::take(&mut self.loops);
        let result = f(self);
        self.loops = outer;
        result
    }

    fn record_binding(&mut self, env: &Env, name: &str, ty: Type, visibility: Visibility, doc: Option<&str>) {
        env.set_visibility(&mut self.modules, name, visibility);
        if let Some(doc) = doc {
            env.set_docstring(&mut self.modules, name, doc);
        }
        env.add(&mut self.modules, name, ty.into());
    }

    // ==================================================================
    // Slots
    // ==================================================================

    /// Typed slots are visible to sibling bodies before their own turn
    pub(super) fn hoist_slot(&mut self, env: &Env, slot: &SlotDecl) -> Result<()> {
        let Some(ty) = &slot.ty else {
            return Ok(());
        };
        if env.local_scheme_of(&self.modules, &slot.name).is_some() {
            return Ok(());
        }
        let ty = self.resolve_type_node(env, ty)?;
        env.add(&mut self.modules, &slot.name, ty.into());
        env.set_visibility(&mut self.modules, &slot.name, slot.visibility);
        Ok(())
    }

    pub(super) fn infer_slot(&mut self, env: &Env, slot: &SlotDecl) -> Result<Type> {
        let declared = match &slot.ty {
            Some(ty) => Some(self.resolve_type_node(env, ty)?),
            None => None,
        };

        let ty = match (&slot.value, declared) {
            (Some(value), Some(declared)) => {
                let value_ty = self.infer_expecting(env, value, &declared)?;
                self.assignable(&value_ty, &declared)
                    .map_err(|e| e.with_location(value.loc.as_ref()))?;
                declared
            }
            (Some(value), None) => self.infer(env, value)?,
            (None, Some(declared)) => declared,
            (None, None) => self.fresher.fresh(),
        };

        if let Some(existing) = env.local_scheme_of(&self.modules, &slot.name) {
            let current = self.resolve(existing.ty());
            let new = self.resolve(&ty);
            if !self.unifier().identical_to(&current, &new) {
                if current.as_var().is_some() || new.as_var().is_some() {
                    self.unify(&current, &new)?;
                } else {
                    return Err(DangError::redefinition(
                        format!(
                            "{:?} already defined as {}, trying to redefine as {}",
                            slot.name,
                            self.show(&current),
                            self.show(&new)
                        ),
                        slot.loc.clone(),
                    ));
                }
            }
        }

        self.check_directives(env, &slot.directives, DirectiveLocation::FieldDefinition)?;
        if !slot.directives.is_empty() {
            env.set_directives(&mut self.modules, &slot.name, slot.directives.clone());
        }
        self.record_binding(env, &slot.name, ty.clone(), slot.visibility, slot.docstring.as_deref());
        Ok(ty)
    }

    // ==================================================================
    // Classes
    // ==================================================================

    /// Register a new named type, replacing any type of the same name in
    /// this scope. Extending an existing type goes through `reopen`.
    fn declare_module(&mut self, env: &Env, name: &str, kind: ModuleKind, doc: Option<&str>) -> ModuleId {
        if let Some(previous) = env.local_named_type(&self.modules, name) {
            debug!("{} shadows {:?} {:?}", name, self.modules.kind(previous), previous);
        }
        let id = self.modules.create(Some(name), kind, None);
        env.add_class(&mut self.modules, name, id);
        if let Some(doc) = doc {
            self.modules.get_mut(id).doc = Some(doc.to_string());
        }
        debug!("declared {:?} {}", kind, name);
        id
    }

    fn link_interfaces(&mut self, env: &Env, module: ModuleId, interfaces: &[String]) -> Result<()> {
        for name in interfaces {
            let iface = env.named_type(&self.modules, name).ok_or_else(|| DangError::UnresolvedType {
                name: name.clone(),
                kind: NameKind::Interface,
                location: None,
            })?;
            if self.modules.kind(iface) != ModuleKind::Interface {
                return Err(DangError::unification(format!("{} is not an interface", name)));
            }
            self.modules.add_interface(module, iface);
        }
        Ok(())
    }

    pub(super) fn hoist_class(&mut self, env: &Env, node: &Node, decl: &ClassDecl, pass: u8) -> Result<()> {
        if pass == 0 {
            let class = self.declare_module(env, &decl.name, ModuleKind::Object, decl.docstring.as_deref());
            let self_ty = self.modules.type_of(class).non_null();
            Env::Module(class).set_dynamic_scope_type(&mut self.modules, self_ty);
            self.node_modules.insert(node.id, class);
            return Ok(());
        }

        let class = self.class_module(env, node)?;
        self.link_interfaces(env, class, &decl.implements)?;

        let constructor = self.constructor_signature(env, decl, class)?;
        debug!("hoisted class {}: {}", decl.name, constructor);
        env.add(&mut self.modules, &decl.name, Type::function(constructor.clone()).into());
        env.set_visibility(&mut self.modules, &decl.name, decl.visibility);
        self.signatures.insert(node.id, constructor);

        let class_env = Env::composite(class, env);
        for pass in 0..2 {
            for form in decl.forms_without_new() {
                self.hoist(&class_env, form, pass)?;
            }
        }
        Ok(())
    }

    fn class_module(&mut self, env: &Env, node: &Node) -> Result<ModuleId> {
        self.hoist(env, node, 0)?;
        self.module_of(node.id)
            .ok_or_else(|| DangError::unification("type declaration was not hoisted"))
    }

    /// Constructor type: the explicit `new(...)` arguments, or every public
    /// field plus every private field without a default. Fields without a
    /// default are required; fields with one may be omitted.
    fn constructor_signature(&mut self, env: &Env, decl: &ClassDecl, class: ModuleId) -> Result<FunctionType> {
        let class_env = Env::composite(class, env);
        let ret = self.modules.type_of(class).non_null();

        if let Some((_, fun)) = decl.constructor() {
            let (mut signature, _) = self.function_signature(&class_env, fun, false, None)?;
            signature.ret = ret;
            return Ok(signature);
        }

        let mut args = RecordType::new();
        for slot in decl.implicit_constructor_params() {
            let ty = match &slot.ty {
                Some(ty) => self.resolve_type_node(&class_env, ty)?,
                None => self.fresher.fresh(),
            };
            let ty = if slot.value.is_some() { ty.nullable() } else { ty.non_null() };
            args.add(slot.name.clone(), ty);
        }
        Ok(FunctionType::new(args, ret))
    }

    pub(super) fn infer_class(&mut self, env: &Env, node: &Node, decl: &ClassDecl) -> Result<Type> {
        self.hoist(env, node, 0)?;
        self.hoist(env, node, 1)?;
        let class = self.class_module(env, node)?;

        for form in &decl.body.forms {
            let (name, public) = match &form.kind {
                NodeKind::Slot(slot) => (slot.name.as_str(), slot.visibility == Visibility::Public),
                NodeKind::FunDecl(fun) => (fun.name.as_str(), fun.visibility == Visibility::Public),
                _ => continue,
            };
            if name == "new" {
                let keyword = if public { "pub" } else { "let" };
                return Err(DangError::unification(format!(
                    "'new' is a constructor, not a method; use `new(...) {{ ... }}` without `{}` or a return type",
                    keyword
                ))
                .with_location(form.loc.as_ref()));
            }
        }

        if let Some(doc) = &decl.docstring {
            env.set_docstring(&mut self.modules, &decl.name, doc);
        }
        self.check_directives(env, &decl.directives, DirectiveLocation::Object)?;
        if !decl.directives.is_empty() {
            env.set_directives(&mut self.modules, &decl.name, decl.directives.clone());
        }

        let class_env = Env::composite(class, env);
        self.outside_loops(|checker| {
            decl.forms_without_new()
                .try_for_each(|form| checker.infer(&class_env, form).map(drop))
        })?;

        match decl.constructor() {
            Some((ctor_node, fun)) => self.infer_new_constructor(&class_env, node, class, ctor_node, fun)?,
            None => self.settle_implicit_constructor(node, decl, class)?,
        }

        self.validate_interfaces(env, node, decl, class)?;

        let constructor = self
            .signature_of(node.id)
            .ok_or_else(|| DangError::unification("class constructor was not hoisted"))?;
        Ok(Type::function(constructor))
    }

    /// Tie untyped constructor parameters to their fields' inferred types
    fn settle_implicit_constructor(&mut self, node: &Node, decl: &ClassDecl, class: ModuleId) -> Result<()> {
        let Some(constructor) = self.signatures.get(&node.id).cloned() else {
            return Ok(());
        };
        for slot in decl.implicit_constructor_params() {
            let (Some(param), Some(field)) = (
                constructor.args.scheme_of(&slot.name),
                Env::Module(class).local_scheme_of(&self.modules, &slot.name),
            ) else {
                continue;
            };
            let field = self.resolve(field.ty());
            let expected = if slot.value.is_some() { field.nullable() } else { field.non_null() };
            self.unify(param.ty(), &expected)?;
        }
        Ok(())
    }

    fn infer_new_constructor(
        &mut self,
        class_env: &Env,
        class_node: &Node,
        class: ModuleId,
        ctor_node: &Node,
        fun: &FunctionBase,
    ) -> Result<()> {
        let (_, scope) = self.function_signature(class_env, fun, false, None)?;
        let body_ty = self.outside_loops(|checker| checker.infer_forms(&scope, &fun.body.forms))?;

        let expected = self.modules.type_of(class).non_null();
        if self.assignable(&body_ty, &expected).is_err() {
            let loc = fun.body.forms.last().and_then(|f| f.loc.clone()).or_else(|| ctor_node.loc.clone());
            return Err(DangError::unification(format!(
                "new() must return self (expected {}, got {})",
                self.show(&expected),
                self.show(&body_ty)
            ))
            .with_location(loc.as_ref()));
        }

        if let Some(signature) = self.signatures.get(&class_node.id).cloned() {
            self.signatures.insert(ctor_node.id, signature);
        }
        Ok(())
    }

    /// Check every declared interface (and the interfaces they extend)
    /// against the class, collecting all failures into one error
    fn validate_interfaces(&mut self, env: &Env, node: &Node, decl: &ClassDecl, class: ModuleId) -> Result<()> {
        let mut failures = Vec::new();

        for iface_name in &decl.implements {
            let Some(iface) = env.named_type(&self.modules, iface_name) else {
                continue;
            };
            if self.modules.kind(iface) != ModuleKind::Interface {
                continue;
            }

            let mut required = vec![iface];
            required.extend(self.modules.all_interfaces(iface));

            let mut missing = Vec::new();
            for required_iface in required {
                let required_name = self.modules.name(required_iface).to_string();
                for (field, scheme) in Env::Module(required_iface).bindings(&self.modules, Visibility::Private) {
                    match Env::Module(class).local_scheme_of(&self.modules, &field) {
                        None => missing.push((field, scheme, required_name.clone())),
                        Some(class_scheme) => {
                            let unifier = Unifier::new(&self.modules, &mut self.subst);
                            if let Err(msg) =
                                validate_field_implementation(&unifier, &field, scheme.ty(), class_scheme.ty())
                            {
                                failures.push(format!(
                                    "class {} does not correctly implement interface {}: {}",
                                    decl.name, required_name, msg
                                ));
                            }
                        }
                    }
                }
            }

            missing.sort_by(|a, b| a.0.cmp(&b.0));
            for (field, scheme, iface_name) in missing {
                failures.push(format!(
                    "class {} is missing `{}: {}`, required by interface {}",
                    decl.name,
                    field,
                    self.show(scheme.ty()),
                    iface_name
                ));
            }
        }

        if failures.is_empty() {
            return Ok(());
        }
        Err(DangError::InterfaceConformanceFailure {
            class: decl.name.clone(),
            failures,
            location: node.loc.clone(),
        })
    }

    // ==================================================================
    // Enums, scalars and interfaces
    // ==================================================================

    /// Values are bindings typed as the enum itself; `values()` lists them
    /// in declaration order
    pub(super) fn hoist_enum(&mut self, env: &Env, node: &Node, decl: &EnumDecl) -> Result<()> {
        let id = self.declare_module(env, &decl.name, ModuleKind::Enum, decl.docstring.as_deref());
        let enum_ty = self.modules.type_of(id).non_null();
        env.add(&mut self.modules, &decl.name, enum_ty.clone().into());

        let scope = Env::Module(id);
        for value in &decl.values {
            scope.add(&mut self.modules, value, enum_ty.clone().into());
            scope.set_visibility(&mut self.modules, value, Visibility::Public);
        }
        let values_fn = FunctionType::new(RecordType::new(), Type::list(enum_ty).non_null());
        scope.add(&mut self.modules, "values", Type::function(values_fn).into());
        scope.set_visibility(&mut self.modules, "values", Visibility::Public);

        self.node_modules.insert(node.id, id);
        Ok(())
    }

    pub(super) fn infer_enum(&mut self, env: &Env, node: &Node, decl: &EnumDecl) -> Result<Type> {
        let id = self.class_module(env, node)?;
        if let Some(doc) = &decl.docstring {
            env.set_docstring(&mut self.modules, &decl.name, doc);
        }
        Ok(self.modules.type_of(id).non_null())
    }

    pub(super) fn hoist_scalar(&mut self, env: &Env, node: &Node, decl: &ScalarDecl) -> Result<()> {
        let id = self.declare_module(env, &decl.name, ModuleKind::Scalar, decl.docstring.as_deref());
        self.node_modules.insert(node.id, id);
        Ok(())
    }

    pub(super) fn infer_scalar(&mut self, env: &Env, node: &Node, decl: &ScalarDecl) -> Result<Type> {
        let id = self.class_module(env, node)?;
        if let Some(doc) = &decl.docstring {
            env.set_docstring(&mut self.modules, &decl.name, doc);
        }
        Ok(self.modules.type_of(id).non_null())
    }

    pub(super) fn hoist_interface(&mut self, env: &Env, node: &Node, decl: &InterfaceDecl, pass: u8) -> Result<()> {
        if pass == 0 {
            let id = self.declare_module(env, &decl.name, ModuleKind::Interface, decl.docstring.as_deref());
            let self_ty = self.modules.type_of(id).non_null();
            Env::Module(id).set_dynamic_scope_type(&mut self.modules, self_ty);
            self.node_modules.insert(node.id, id);
            return Ok(());
        }

        let id = self.class_module(env, node)?;
        self.link_interfaces(env, id, &decl.implements)?;
        let iface_env = Env::composite(id, env);
        for pass in 0..2 {
            for form in &decl.body.forms {
                self.hoist(&iface_env, form, pass)?;
            }
        }
        Ok(())
    }

    pub(super) fn infer_interface(&mut self, env: &Env, node: &Node, decl: &InterfaceDecl) -> Result<Type> {
        self.hoist(env, node, 1)?;
        let id = self.class_module(env, node)?;
        let iface_env = Env::composite(id, env);
        for form in &decl.body.forms {
            self.infer(&iface_env, form)?;
        }
        if let Some(doc) = &decl.docstring {
            env.set_docstring(&mut self.modules, &decl.name, doc);
        }
        Ok(self.modules.type_of(id).non_null())
    }

    // ==================================================================
    // Directives
    // ==================================================================

    pub(super) fn hoist_directive(&mut self, env: &Env, decl: &DirectiveDecl) -> Result<()> {
        let mut args = RecordType::new();
        for arg in &decl.args {
            let ty = match (&arg.ty, &arg.value) {
                (Some(ty), _) => self.resolve_type_node(env, ty)?,
                (None, Some(value)) => self.infer(env, value)?,
                (None, None) => {
                    return Err(DangError::unification(format!(
                        "directive @{} argument {:?} has no type or value",
                        decl.name, arg.name
                    )))
                }
            };
            let ty = if arg.value.is_some() { ty.nullable() } else { ty };
            args.add(arg.name.clone(), ty);
        }

        let locations = decl
            .locations
            .iter()
            .map(|loc| {
                DirectiveLocation::parse(loc)
                    .ok_or_else(|| DangError::unification(format!("unknown directive location {:?}", loc)))
            })
            .collect::<Result<Vec<_>>>()?;

        env.add_directive(
            &mut self.modules,
            DirectiveSignature {
                name: decl.name.clone(),
                args,
                locations,
            },
        );
        Ok(())
    }

    // ==================================================================
    // Reopen
    // ==================================================================

    /// Extend an existing module in place, seeing the reopening scope
    /// through a composite
    pub(super) fn infer_reopen(&mut self, env: &Env, node: &Node, name: &str, block: &Block) -> Result<Type> {
        let bound = env
            .scheme_of(&self.modules, name)
            .and_then(|s| self.resolve(s.ty()).as_module().map(|m| m.id));
        let module = bound
            .or_else(|| env.named_type(&self.modules, name))
            .ok_or_else(|| DangError::not_found(name, node.loc.clone()))?;

        let scope = Env::composite(module, env);
        self.infer_forms(&scope, &block.forms)?;
        self.node_modules.insert(node.id, module);
        Ok(self.modules.type_of(module).non_null())
    }
}
