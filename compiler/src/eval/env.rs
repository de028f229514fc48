//! Evaluation scopes
//!
//! Mirrors the checker's [`crate::env::Env`]: a scope is a module value, or
//! a primary module value over a lexical fallback. New bindings always go
//! to the primary module.

use super::cow;
use super::value::{ModuleRef, ModuleRole, ModuleValue, Value};
use std::rc::Rc;

#[derive(Debug, Clone)]
pub enum EvalEnv {
    Module(ModuleRef),
    Composite { primary: ModuleRef, lexical: Rc<EvalEnv> },
}

impl EvalEnv {
    /// An empty top-level scope
    pub fn root() -> Self {
        EvalEnv::Module(ModuleValue::new(None, None, ModuleRole::Object).into_ref())
    }

    pub fn composite(primary: ModuleRef, lexical: &EvalEnv) -> Self {
        EvalEnv::Composite {
            primary,
            lexical: Rc::new(lexical.clone()),
        }
    }

    pub fn primary(&self) -> &ModuleRef {
        match self {
            EvalEnv::Module(m) => m,
            EvalEnv::Composite { primary, .. } => primary,
        }
    }

    /// The fallback scope of a composite; a plain module is its own
    pub fn lexical(&self) -> EvalEnv {
        match self {
            EvalEnv::Module(_) => self.clone(),
            EvalEnv::Composite { lexical, .. } => (**lexical).clone(),
        }
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        match self {
            EvalEnv::Module(m) => m.borrow().get(name),
            EvalEnv::Composite { primary, lexical } => primary.borrow().get(name).or_else(|| lexical.get(name)),
        }
    }

    /// Binding in the primary module only
    pub fn local(&self, name: &str) -> Option<Value> {
        self.primary().borrow().fields.get(name).cloned()
    }

    /// Bind in the primary module. An instance stores a snapshot in place
    /// of any reference to itself.
    pub fn define(&self, name: &str, value: Value) {
        let primary = self.primary();
        let value = if primary.borrow().role == ModuleRole::Instance {
            cow::detach(value, primary)
        } else {
            value
        };
        primary.borrow_mut().fields.insert(name.to_string(), value);
    }

    /// Overwrite an existing binding wherever lookup would find it.
    /// Returns false when the name is not bound at all.
    pub fn reassign(&self, name: &str, value: Value) -> bool {
        match self {
            EvalEnv::Module(m) => m.borrow_mut().set_existing(name, value),
            EvalEnv::Composite { primary, lexical } => {
                if primary.borrow().has(name) {
                    primary.borrow_mut().set_existing(name, value)
                } else {
                    lexical.reassign(name, value)
                }
            }
        }
    }

    /// A fresh child scope delegating to this one
    pub fn clone_env(&self) -> EvalEnv {
        let child = ModuleValue::new(None, None, ModuleRole::Object)
            .with_parent(self.primary().clone())
            .into_ref();
        match self {
            EvalEnv::Module(_) => EvalEnv::Module(child),
            EvalEnv::Composite { lexical, .. } => EvalEnv::Composite {
                primary: child,
                lexical: lexical.clone(),
            },
        }
    }

    /// The instance `self` refers to: the nearest instance module in the
    /// primary chain, then in the lexical scope
    pub fn self_value(&self) -> Option<ModuleRef> {
        let mut current = Some(self.primary().clone());
        while let Some(module) = current {
            if module.borrow().role == ModuleRole::Instance {
                return Some(module);
            }
            current = module.borrow().parent.clone();
        }
        match self {
            EvalEnv::Module(_) => None,
            EvalEnv::Composite { lexical, .. } => lexical.self_value(),
        }
    }

    /// Functions declared here become methods
    pub fn is_class_body(&self) -> bool {
        matches!(self.primary().borrow().role, ModuleRole::Instance | ModuleRole::Extension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_define_and_lookup_through_composite() {
        let outer = EvalEnv::root();
        outer.define("a", Value::Int(1));
        let inner = ModuleValue::new(None, None, ModuleRole::Object).into_ref();
        let env = EvalEnv::composite(inner.clone(), &outer);

        env.define("b", Value::Int(2));
        assert_eq!(env.get("a").and_then(|v| v.as_int()), Some(1));
        assert_eq!(env.get("b").and_then(|v| v.as_int()), Some(2));
        assert!(env.local("a").is_none());
        assert!(outer.get("b").is_none());
        assert!(inner.borrow().fields.contains_key("b"));
    }

    #[test]
    fn test_clone_env_does_not_leak_definitions() {
        let root = EvalEnv::root();
        root.define("x", Value::Int(1));
        let child = root.clone_env();
        child.define("y", Value::Int(2));
        assert!(child.get("x").is_some());
        assert!(root.get("y").is_none());
    }

    #[test]
    fn test_reassign_targets_defining_scope() {
        let root = EvalEnv::root();
        root.define("x", Value::Int(1));
        let child = root.clone_env();
        assert!(child.reassign("x", Value::Int(5)));
        assert_eq!(root.get("x").and_then(|v| v.as_int()), Some(5));
        assert!(child.local("x").is_none());
        assert!(!child.reassign("nope", Value::Null));
    }

    #[test]
    fn test_instance_never_stores_itself() {
        let root = EvalEnv::root();
        let instance = ModuleValue::new(Some("Cell"), None, ModuleRole::Instance).into_ref();
        let body = EvalEnv::composite(instance.clone(), &root);

        body.define("n", Value::Int(1));
        body.define("me", Value::Module(instance.clone()));

        let me = instance.borrow().fields.get("me").cloned().unwrap();
        let me = me.as_module().unwrap();
        assert!(!Rc::ptr_eq(me, &instance));
        assert_eq!(me.borrow().get("n").and_then(|v| v.as_int()), Some(1));
    }

    #[test]
    fn test_self_value_finds_instance() {
        let root = EvalEnv::root();
        assert!(root.self_value().is_none());

        let instance = ModuleValue::new(Some("Foo"), None, ModuleRole::Instance).into_ref();
        let body = EvalEnv::composite(instance.clone(), &root).clone_env();
        let found = body.self_value().unwrap();
        assert!(Rc::ptr_eq(&found, &instance));
        assert!(!body.is_class_body());
        assert!(EvalEnv::composite(instance, &root).is_class_body());
    }
}
