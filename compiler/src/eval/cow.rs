//! Copy-on-write updates through field paths
//!
//! `a.b.c = v` never mutates `a`, `a.b` or anything reachable from them.
//! Each module on the path is shallow-copied and relinked, so only the spine
//! from the root to the leaf is duplicated and every other value stays
//! shared with the source value.
//!
//! The one module that is written in place is an instance under
//! construction or inside its own method. Values stored into it go through
//! [`detach`] first, so an instance never contains itself.

use super::value::{ModuleRef, ModuleValue, Value};
use crate::errors::{DangError, Result};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::rc::Rc;

/// Rebuild `root` with the value at `path` replaced by `leaf(old)`.
///
/// An empty path replaces the root itself.
pub fn update_path<F>(root: &Value, path: &[String], leaf: F) -> Result<Value>
where
    F: FnOnce(Value) -> Result<Value>,
{
    let Some((field, rest)) = path.split_first() else {
        return leaf(root.clone());
    };

    let module = match root {
        Value::Module(module) => module,
        Value::Null => {
            return Err(DangError::runtime(format!("cannot set field {:?} on null", field), None));
        }
        other => {
            return Err(DangError::runtime(
                format!("cannot set field {:?} on {}", field, other.type_name()),
                None,
            ))
        }
    };

    let current = module
        .borrow()
        .get(field)
        .ok_or_else(|| DangError::runtime(format!("field {:?} not found", field), None))?;
    let updated = update_path(&current, rest, leaf)?;

    let mut copy = module.borrow().shallow_copy();
    copy.fields.insert(field.clone(), updated);
    Ok(Value::Module(copy.into_ref()))
}

/// Replace the value at `path` with `value`
pub fn set_path(root: &Value, path: &[String], value: Value) -> Result<Value> {
    update_path(root, path, |_| Ok(value))
}

/// `value` with every reference to `owner` replaced by a snapshot of
/// `owner`'s current fields. Modules and lists on the way to such a
/// reference are copied; everything else is shared.
pub fn detach(value: Value, owner: &ModuleRef) -> Value {
    let mut snapshot = None;
    detach_in(value, owner, &mut snapshot, &mut Vec::new()).0
}

fn detach_in(
    value: Value,
    owner: &ModuleRef,
    snapshot: &mut Option<ModuleRef>,
    seen: &mut Vec<*const RefCell<ModuleValue>>,
) -> (Value, bool) {
    match value {
        Value::Module(module) if Rc::ptr_eq(&module, owner) => {
            let frozen = snapshot.get_or_insert_with(|| owner.borrow().shallow_copy().into_ref());
            (Value::Module(frozen.clone()), true)
        }
        Value::Module(module) => {
            let ptr = Rc::as_ptr(&module);
            if seen.contains(&ptr) {
                return (Value::Module(module), false);
            }
            seen.push(ptr);
            let fields = module.borrow().fields.clone();
            let mut changed = false;
            let fields: IndexMap<String, Value> = fields
                .into_iter()
                .map(|(name, field)| {
                    let (field, field_changed) = detach_in(field, owner, snapshot, seen);
                    changed |= field_changed;
                    (name, field)
                })
                .collect();
            seen.pop();
            if !changed {
                return (Value::Module(module), false);
            }
            let mut copy = module.borrow().shallow_copy();
            copy.fields = fields;
            (Value::Module(copy.into_ref()), true)
        }
        Value::List { elements, elem_type } => {
            let mut changed = false;
            let elements = elements
                .into_iter()
                .map(|element| {
                    let (element, element_changed) = detach_in(element, owner, snapshot, seen);
                    changed |= element_changed;
                    element
                })
                .collect();
            (Value::List { elements, elem_type }, changed)
        }
        other => (other, false),
    }
}
