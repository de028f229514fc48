//! Type inference for Dang programs
//!
//! The [`Checker`] owns the module arena, the substitution and the fresh
//! variable supply for one session. Form sequences (the program, and every
//! block) go through the same driver:
//!
//! 1. hoist pass 0: named types (classes, enums, scalars, interfaces) and
//!    imports are registered, so annotations anywhere in the sequence can
//!    refer to them
//! 2. hoist pass 1: signatures. Functions get their argument and return types
//!    (a fresh variable when unannotated), classes their constructor type,
//!    interfaces and directives their members, and class bodies are hoisted
//!    with `self` installed
//! 3. ordinary inference of every form, in source order
//!
//! Because every signature in a sequence is installed before any body is
//! inferred, declarations may refer to each other freely.
//!
//! A program either checks completely or leaves the session as it was: on
//! failure [`Checker::infer_program`] rolls back to a [`Checkpoint`] taken
//! before the first hoisting pass.
//!
//! Results are kept in side tables keyed by [`NodeId`] so the evaluator can
//! consult them.

mod decls;
mod directives;
mod imports;
mod infer;

use crate::ast::{Node, NodeId, TypeNode};
use crate::env::{build_prelude, Builtins, Env, ModuleId, Modules, Prelude};
use crate::errors::{DangError, Result};
use crate::import::{ImportConfig, SchemaProvider};
use crate::types::{Fresher, FunctionType, RecordType, Subst, Type};
use crate::unify::Unifier;
use fxhash::{FxHashMap, FxHashSet};

/// Limits applied while inferring
#[derive(Debug, Clone)]
pub struct CheckerConfig {
    /// Maximum nesting of `infer` calls before giving up
    pub max_depth: usize,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        CheckerConfig { max_depth: 256 }
    }
}

pub struct Checker {
    pub modules: Modules,
    pub subst: Subst,
    pub fresher: Fresher,
    pub prelude: Prelude,
    config: CheckerConfig,
    depth: usize,

    node_types: FxHashMap<NodeId, Type>,
    node_modules: FxHashMap<NodeId, ModuleId>,
    signatures: FxHashMap<NodeId, FunctionType>,
    /// Argument names of the callee's static signature, per call site
    call_layouts: FxHashMap<NodeId, Vec<String>>,
    hoisted: FxHashSet<(NodeId, u8)>,
    /// Enclosing loops of the form being inferred, reset at function bodies
    loops: usize,
    /// Prelude functions whose type variables are fresh at every use
    generic_bindings: FxHashMap<String, Type>,

    schema_provider: Option<Box<dyn SchemaProvider>>,
    import_config: ImportConfig,
}

/// Session state saved before a program is checked
#[derive(Clone)]
pub struct Checkpoint {
    modules: Modules,
    subst: Subst,
    fresher: Fresher,
    node_types: FxHashMap<NodeId, Type>,
    node_modules: FxHashMap<NodeId, ModuleId>,
    signatures: FxHashMap<NodeId, FunctionType>,
    call_layouts: FxHashMap<NodeId, Vec<String>>,
    hoisted: FxHashSet<(NodeId, u8)>,
}

impl Default for Checker {
    fn default() -> Self {
        Self::new()
    }
}

impl Checker {
    pub fn new() -> Self {
        Self::with_config(CheckerConfig::default())
    }

    pub fn with_config(config: CheckerConfig) -> Self {
        let mut modules = Modules::new();
        let prelude = build_prelude(&mut modules);
        let mut checker = Checker {
            modules,
            subst: Subst::new(),
            fresher: Fresher::new(),
            prelude,
            config,
            depth: 0,
            node_types: FxHashMap::default(),
            node_modules: FxHashMap::default(),
            signatures: FxHashMap::default(),
            call_layouts: FxHashMap::default(),
            hoisted: FxHashSet::default(),
            loops: 0,
            generic_bindings: FxHashMap::default(),
            schema_provider: None,
            import_config: ImportConfig::from_env(),
        };
        checker.install_builtin_functions();
        checker
    }

    /// `print(value: a) -> b`, bound in the root scope
    fn install_builtin_functions(&mut self) {
        let mut args = RecordType::new();
        args.add("value", self.fresher.fresh());
        let print = Type::function(FunctionType::new(args, self.fresher.fresh()));

        let env = self.env();
        env.add(&mut self.modules, "print", print.clone().into());
        self.generic_bindings.insert("print".to_string(), print);
    }

    /// A fresh copy of a generic prelude function's type, or `None` when
    /// `ty` is not the prelude binding of `name`
    pub(crate) fn instantiate_builtin(&mut self, name: &str, ty: &Type) -> Option<Type> {
        let generic = self.generic_bindings.get(name)?;
        if generic != ty {
            return None;
        }
        let mut vars = Vec::new();
        generic.free_vars(&mut vars);
        let mut fresh = Subst::new();
        for var in vars {
            fresh.bind(var, self.fresher.fresh());
        }
        Some(fresh.apply(generic))
    }

    /// Resolve `import` declarations through `provider`
    pub fn with_schema_provider(mut self, provider: impl SchemaProvider + 'static) -> Self {
        self.schema_provider = Some(Box::new(provider));
        self
    }

    pub fn with_import_config(mut self, config: ImportConfig) -> Self {
        self.import_config = config;
        self
    }

    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    /// The root scope of the session
    pub fn env(&self) -> Env {
        self.prelude.env.clone()
    }

    pub fn builtins(&self) -> Builtins {
        self.prelude.builtins
    }

    /// Infer a whole program at the root scope. On error the session is
    /// rolled back, so nothing the program declared stays visible.
    pub fn infer_program(&mut self, forms: &[Node]) -> Result<Type> {
        let checkpoint = self.checkpoint();
        let env = self.env();
        let result = self.infer_forms(&env, forms);
        if result.is_err() {
            self.rollback(checkpoint);
        }
        result
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            modules: self.modules.clone(),
            subst: self.subst.clone(),
            fresher: self.fresher.clone(),
            node_types: self.node_types.clone(),
            node_modules: self.node_modules.clone(),
            signatures: self.signatures.clone(),
            call_layouts: self.call_layouts.clone(),
            hoisted: self.hoisted.clone(),
        }
    }

    /// Restore the state saved by [`Checker::checkpoint`]
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        tracing::debug!(modules = checkpoint.modules.len(), "rolling back checker session");
        self.modules = checkpoint.modules;
        self.subst = checkpoint.subst;
        self.fresher = checkpoint.fresher;
        self.node_types = checkpoint.node_types;
        self.node_modules = checkpoint.node_modules;
        self.signatures = checkpoint.signatures;
        self.call_layouts = checkpoint.call_layouts;
        self.hoisted = checkpoint.hoisted;
        self.depth = 0;
        self.loops = 0;
    }

    /// Hoist and infer a sequence of forms in `env`, returning the type of
    /// the last one (a fresh variable, i.e. null, when empty).
    pub fn infer_forms(&mut self, env: &Env, forms: &[Node]) -> Result<Type> {
        for pass in 0..2u8 {
            tracing::debug!(pass, forms = forms.len(), "hoisting");
            for form in forms {
                self.hoist(env, form, pass)?;
            }
        }

        let mut last = self.fresher.fresh();
        for form in forms {
            last = self.infer(env, form)?;
        }
        Ok(last)
    }

    /// Infer a single node. The error, if any, is tagged with the innermost
    /// node location.
    pub fn infer(&mut self, env: &Env, node: &Node) -> Result<Type> {
        if self.depth >= self.config.max_depth {
            return Err(DangError::RecursionLimitExceeded {
                limit: self.config.max_depth,
                location: node.loc.clone(),
            });
        }
        self.depth += 1;
        let result = self.infer_node(env, node);
        self.depth -= 1;

        let ty = result.map_err(|e| e.with_location(node.loc.as_ref()))?;
        self.node_types.insert(node.id, ty.clone());
        Ok(ty)
    }

    /// Run a hoisting pass over one form; each (form, pass) runs once
    pub(crate) fn hoist(&mut self, env: &Env, node: &Node, pass: u8) -> Result<()> {
        if !self.hoisted.insert((node.id, pass)) {
            return Ok(());
        }
        self.hoist_node(env, node, pass)
            .map_err(|e| e.with_location(node.loc.as_ref()))
    }

    // ==================================================================
    // Side tables
    // ==================================================================

    /// Inferred type of a node, resolved through the current substitution
    pub fn type_of(&self, id: NodeId) -> Option<Type> {
        self.node_types.get(&id).map(|t| self.subst.apply(t))
    }

    /// Module declared or created by a node (classes, enums, objects, ...)
    pub fn module_of(&self, id: NodeId) -> Option<ModuleId> {
        self.node_modules.get(&id).copied()
    }

    /// Signature of a function, lambda, constructor or class
    pub fn signature_of(&self, id: NodeId) -> Option<FunctionType> {
        self.signatures.get(&id).map(|f| self.subst.apply_function(f))
    }

    pub fn call_layout(&self, id: NodeId) -> Option<&[String]> {
        self.call_layouts.get(&id).map(Vec::as_slice)
    }

    // ==================================================================
    // Type helpers
    // ==================================================================

    pub fn unifier(&mut self) -> Unifier<'_> {
        Unifier::new(&self.modules, &mut self.subst)
    }

    pub fn resolve(&self, ty: &Type) -> Type {
        self.subst.apply(ty)
    }

    /// Render a type for messages
    pub fn show(&self, ty: &Type) -> String {
        self.modules.show(&self.resolve(ty))
    }

    pub(crate) fn unify(&mut self, a: &Type, b: &Type) -> Result<Type> {
        self.unifier().unify(a, b)
    }

    pub(crate) fn assignable(&mut self, have: &Type, want: &Type) -> Result<()> {
        self.unifier().assignable(have, want)
    }

    pub fn int_type(&self) -> Type {
        self.modules.type_of(self.prelude.builtins.int).non_null()
    }

    pub fn float_type(&self) -> Type {
        self.modules.type_of(self.prelude.builtins.float).non_null()
    }

    pub fn string_type(&self) -> Type {
        self.modules.type_of(self.prelude.builtins.string).non_null()
    }

    pub fn boolean_type(&self) -> Type {
        self.modules.type_of(self.prelude.builtins.boolean).non_null()
    }

    /// The builtin scalar a type is (ignoring nullability), if any
    pub(crate) fn builtin_of(&self, ty: &Type) -> Option<ModuleId> {
        let resolved = self.resolve(ty);
        let id = resolved.as_module()?.id;
        let b = &self.prelude.builtins;
        [b.id, b.string, b.int, b.float, b.boolean]
            .contains(&id)
            .then_some(id)
    }

    // ==================================================================
    // Type annotations
    // ==================================================================

    /// Turn a type annotation into a type. Type variables named in one
    /// annotation share a fresh variable.
    pub fn resolve_type_node(&mut self, env: &Env, node: &TypeNode) -> Result<Type> {
        let mut vars = FxHashMap::default();
        self.resolve_type_node_in(env, node, &mut vars)
    }

    fn resolve_type_node_in(
        &mut self,
        env: &Env,
        node: &TypeNode,
        vars: &mut FxHashMap<String, Type>,
    ) -> Result<Type> {
        match node {
            TypeNode::Named { base: None, name, loc } => env
                .named_type(&self.modules, name)
                .map(|id| self.modules.type_of(id))
                .ok_or_else(|| DangError::type_not_found(name.clone(), loc.clone())),
            TypeNode::Named {
                base: Some(base),
                name,
                loc,
            } => {
                let base_id = env
                    .named_type(&self.modules, base)
                    .ok_or_else(|| DangError::type_not_found(base.clone(), loc.clone()))?;
                Env::Module(base_id)
                    .named_type(&self.modules, name)
                    .map(|id| self.modules.type_of(id))
                    .ok_or_else(|| DangError::type_not_found(format!("{}.{}", base, name), loc.clone()))
            }
            TypeNode::List(elem) => Ok(Type::list(self.resolve_type_node_in(env, elem, vars)?)),
            TypeNode::NonNull(inner) => Ok(self.resolve_type_node_in(env, inner, vars)?.non_null()),
            TypeNode::Variable(name) => {
                if let Some(existing) = vars.get(name) {
                    return Ok(existing.clone());
                }
                let var = self.fresher.fresh();
                vars.insert(name.clone(), var.clone());
                Ok(var)
            }
            TypeNode::Object(fields) => {
                let mut record = RecordType::new();
                for (field, ty) in fields {
                    let resolved = self.resolve_type_node_in(env, ty, vars)?;
                    record.add(field.clone(), resolved);
                }
                Ok(Type::Record(record))
            }
            TypeNode::Fun { args, block, ret } => {
                let mut record = RecordType::new();
                for (arg, ty) in args {
                    let resolved = self.resolve_type_node_in(env, ty, vars)?;
                    record.add(arg.clone(), resolved);
                }
                let ret = self.resolve_type_node_in(env, ret, vars)?;
                let mut fun = FunctionType::new(record, ret);
                if let Some(block) = block {
                    let block_ty = self.resolve_type_node_in(env, block, vars)?;
                    let block_fn = block_ty
                        .as_function()
                        .cloned()
                        .ok_or_else(|| DangError::unification(format!("block type must be a function, got {}", block_ty)))?;
                    fun = fun.with_block(block_fn);
                }
                Ok(Type::function(fun))
            }
        }
    }
}
