//! Unification and assignability
//!
//! `unify` is symmetric and used by inference; `assignable` is directional
//! (is a value of `have` usable where `want` is required) and used at call
//! sites, declarations and assignments. Both bind type variables into the
//! session substitution, and both roll back every binding they made when they
//! fail.
//!
//! Subtyping rules:
//! - `T!` is assignable to `T`, never the reverse (unless the target is a
//!   variable, which simply binds)
//! - lists are covariant in their element type
//! - records use width subtyping: every non-null field of the target must be
//!   present in the source
//! - functions are contravariant in their arguments and covariant in their
//!   return type
//! - a module is assignable to every interface it implements, transitively

use crate::env::{ModuleKind, Modules};
use crate::errors::{DangError, Result};
use crate::types::{FunctionType, ModuleType, RecordType, Subst, Type, TypeVar};
use log::trace;

pub struct Unifier<'a> {
    modules: &'a Modules,
    subst: &'a mut Subst,
}

impl<'a> Unifier<'a> {
    pub fn new(modules: &'a Modules, subst: &'a mut Subst) -> Self {
        Unifier { modules, subst }
    }

    pub fn resolve(&self, ty: &Type) -> Type {
        self.subst.apply(ty)
    }

    fn show(&self, ty: &Type) -> String {
        self.modules.show(&self.resolve(ty))
    }

    fn bind(&mut self, var: TypeVar, ty: &Type) -> Result<()> {
        let ty = self.resolve(ty);
        if ty == Type::Var(var) {
            return Ok(());
        }
        if ty.occurs(var) {
            return Err(DangError::unification(format!(
                "recursive type: {} occurs in {}",
                var,
                self.modules.show(&ty)
            )));
        }
        trace!("bind {} := {}", var, ty);
        self.subst.bind(var, ty);
        Ok(())
    }

    /// Run `f`, discarding any bindings it made if it fails
    fn transaction<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let snapshot = self.subst.clone();
        let result = f(self);
        if result.is_err() {
            *self.subst = snapshot;
        }
        result
    }

    // ==================================================================
    // Identity
    // ==================================================================

    /// Exact type identity. Named modules compare by identity, anonymous
    /// modules structurally.
    pub fn identical_to(&self, a: &Type, b: &Type) -> bool {
        let a = self.resolve(a);
        let b = self.resolve(b);
        self.identical(&a, &b)
    }

    fn identical(&self, a: &Type, b: &Type) -> bool {
        match (a, b) {
            (Type::Var(x), Type::Var(y)) => x == y,
            (Type::Module(x), Type::Module(y)) => self.identical_modules(x, y),
            (Type::NonNull(x), Type::NonNull(y))
            | (Type::List(x), Type::List(y))
            | (Type::OpaqueList(x), Type::OpaqueList(y)) => self.identical(x, y),
            (Type::Record(x), Type::Record(y)) => {
                x.name == y.name
                    && x.len() == y.len()
                    && x.iter().zip(y.iter()).all(|((ka, ta), (kb, tb))| ka == kb && self.identical(ta, tb))
            }
            (Type::Function(x), Type::Function(y)) => self.identical_functions(x, y),
            _ => false,
        }
    }

    fn identical_functions(&self, x: &FunctionType, y: &FunctionType) -> bool {
        x.args.len() == y.args.len()
            && x.args
                .iter()
                .zip(y.args.iter())
                .all(|((ka, ta), (kb, tb))| ka == kb && self.identical(ta, tb))
            && self.identical(&x.ret, &y.ret)
            && match (&x.block, &y.block) {
                (Some(bx), Some(by)) => self.identical_functions(bx, by),
                (None, None) => true,
                _ => false,
            }
    }

    fn identical_modules(&self, x: &ModuleType, y: &ModuleType) -> bool {
        if x.id == y.id {
            return true;
        }
        if x.name.is_some() || y.name.is_some() {
            return false;
        }
        let xs: Vec<_> = self.modules.get(x.id).vars().collect();
        let ys = self.modules.get(y.id);
        xs.len() == ys.vars().count()
            && xs.iter().all(|(name, scheme)| {
                ys.vars()
                    .find(|(other, _)| other == name)
                    .is_some_and(|(_, other)| self.identical_to(scheme.ty(), other.ty()))
            })
    }

    // ==================================================================
    // Unification
    // ==================================================================

    /// Make two types equal, returning the unified (most specific) type.
    ///
    /// `T!` unifies with a bare `T'` by unifying `T` with `T'`; the result
    /// stays non-null.
    pub fn unify(&mut self, a: &Type, b: &Type) -> Result<Type> {
        trace!("unify {} ~ {}", a, b);
        self.transaction(|u| u.unify_inner(a, b))
    }

    fn unify_inner(&mut self, a: &Type, b: &Type) -> Result<Type> {
        let a = self.subst.prune(a);
        let b = self.subst.prune(b);

        match (&a, &b) {
            (Type::Var(x), Type::Var(y)) if x == y => Ok(a),
            (Type::Var(x), _) => {
                self.bind(*x, &b)?;
                Ok(b)
            }
            (_, Type::Var(y)) => {
                self.bind(*y, &a)?;
                Ok(a)
            }
            (Type::NonNull(x), Type::NonNull(y)) => Ok(self.unify_inner(x, y)?.non_null()),
            (Type::NonNull(x), _) => Ok(self.unify_inner(x, &b)?.non_null()),
            (_, Type::NonNull(y)) => Ok(self.unify_inner(&a, y)?.non_null()),
            (Type::List(x), Type::List(y)) => Ok(Type::list(self.unify_inner(x, y)?)),
            (Type::OpaqueList(x), Type::OpaqueList(y)) => Ok(Type::opaque_list(self.unify_inner(x, y)?)),
            (Type::Module(x), Type::Module(y)) if self.identical_modules(x, y) => Ok(a),
            (Type::Record(x), Type::Record(y)) => {
                self.unify_records(x, y)?;
                Ok(self.resolve(&a))
            }
            (Type::Function(x), Type::Function(y)) => {
                self.unify_functions(x, y)?;
                Ok(self.resolve(&a))
            }
            _ => Err(self.mismatch(&a, &b)),
        }
    }

    fn mismatch(&self, a: &Type, b: &Type) -> DangError {
        DangError::unification(format!("cannot unify {} with {}", self.show(a), self.show(b)))
    }

    fn unify_records(&mut self, x: &RecordType, y: &RecordType) -> Result<()> {
        if x.name.is_some() && y.name.is_some() && x.name != y.name {
            return Err(self.mismatch(&Type::Record(x.clone()), &Type::Record(y.clone())));
        }
        if x.len() != y.len() {
            return Err(self.mismatch(&Type::Record(x.clone()), &Type::Record(y.clone())));
        }
        for (name, tx) in x.iter() {
            let ty = y
                .scheme_of(name)
                .ok_or_else(|| DangError::unification(format!("record has no field {:?}", name)))?;
            self.unify_inner(tx, ty.ty())?;
        }
        Ok(())
    }

    /// Arguments unify positionally, so a lambda's parameter names need not
    /// match the signature it is checked against.
    fn unify_functions(&mut self, x: &FunctionType, y: &FunctionType) -> Result<()> {
        if x.args.len() != y.args.len() {
            return Err(DangError::unification(format!(
                "cannot unify {} with {}: expected {} arguments, got {}",
                self.show(&Type::function(x.clone())),
                self.show(&Type::function(y.clone())),
                y.args.len(),
                x.args.len()
            )));
        }
        for ((_, tx), (_, ty)) in x.args.iter().zip(y.args.iter()) {
            self.unify_inner(tx, ty)?;
        }
        self.unify_inner(&x.ret, &y.ret)?;
        match (&x.block, &y.block) {
            (Some(bx), Some(by)) => self.unify_functions(bx, by),
            (None, None) => Ok(()),
            _ => Err(DangError::unification("cannot unify a function taking a block with one that does not")),
        }
    }

    // ==================================================================
    // Assignability
    // ==================================================================

    /// Whether a value of type `have` may be used where `want` is required.
    pub fn assignable(&mut self, have: &Type, want: &Type) -> Result<()> {
        trace!("assignable {} -> {}", have, want);
        self.transaction(|u| u.assignable_inner(have, want))
    }

    fn assignable_inner(&mut self, have: &Type, want: &Type) -> Result<()> {
        let have = self.subst.prune(have);
        let want = self.subst.prune(want);

        match (&have, &want) {
            (Type::Var(x), Type::Var(y)) if x == y => return Ok(()),
            (Type::Var(x), _) => return self.bind(*x, &want),
            (_, Type::Var(y)) => return self.bind(*y, &have),
            _ => {}
        }

        if self.identical_to(&have, &want) {
            return Ok(());
        }

        let structural = match (&have, &want) {
            (Type::NonNull(h), Type::NonNull(w)) => Some(self.assignable_inner(h, w)),
            (Type::List(h), Type::List(w)) | (Type::OpaqueList(h), Type::OpaqueList(w)) => {
                Some(self.assignable_inner(h, w))
            }
            (Type::Record(h), Type::Record(w)) => Some(self.assignable_records(h, w)),
            (Type::Function(h), Type::Function(w)) => Some(self.assignable_functions(h, w)),
            _ => None,
        };
        if let Some(result) = structural {
            return result.map_err(|_| DangError::cannot_use(self.show(&have), self.show(&want)));
        }

        for sup in self.supertypes(&have) {
            if self.transaction(|u| u.assignable_inner(&sup, &want)).is_ok() {
                return Ok(());
            }
        }

        Err(DangError::cannot_use(self.show(&have), self.show(&want)))
    }

    fn assignable_records(&mut self, have: &RecordType, want: &RecordType) -> Result<()> {
        if let (Some(h), Some(w)) = (&have.name, &want.name) {
            if h != w {
                return Err(DangError::unification(format!("record {} is not {}", h, w)));
            }
        }
        for (name, want_ty) in want.iter() {
            match have.scheme_of(name) {
                Some(have_ty) => self.assignable_inner(have_ty.ty(), want_ty)?,
                None if want_ty.is_non_null() => {
                    return Err(DangError::unification(format!("missing required field {:?}", name)));
                }
                None => {}
            }
        }
        Ok(())
    }

    fn assignable_functions(&mut self, have: &FunctionType, want: &FunctionType) -> Result<()> {
        for (i, (_, want_arg)) in want.args.iter().enumerate() {
            if let Some((_, have_arg)) = have.args.fields.get_index(i) {
                self.assignable_inner(want_arg, have_arg.ty())?;
            }
        }
        for (_, extra) in have.args.iter().skip(want.args.len()) {
            if extra.is_non_null() {
                return Err(DangError::unification("function requires more arguments than provided"));
            }
        }
        self.assignable_inner(&have.ret, &want.ret)?;
        match (&have.block, &want.block) {
            (Some(hb), Some(wb)) => self.assignable_functions(hb, wb),
            (Some(_), None) => Err(DangError::unification("function requires a block argument")),
            _ => Ok(()),
        }
    }

    /// Immediate supertypes of a type
    pub fn supertypes(&self, ty: &Type) -> Vec<Type> {
        match self.resolve(ty) {
            Type::NonNull(inner) => {
                let mut out = vec![(*inner).clone()];
                out.extend(self.supertypes(&inner).into_iter().map(Type::non_null));
                out
            }
            Type::List(inner) => self.supertypes(&inner).into_iter().map(Type::list).collect(),
            Type::Module(m) => self
                .modules
                .get(m.id)
                .interfaces()
                .iter()
                .map(|&iface| self.modules.type_of(iface))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Assignability checked without keeping any bindings
    pub fn is_subtype_of(&self, sub: &Type, sup: &Type) -> bool {
        let mut scratch = self.subst.clone();
        Unifier::new(self.modules, &mut scratch).assignable(sub, sup).is_ok()
    }

    pub fn is_supertype_of(&self, sup: &Type, sub: &Type) -> bool {
        self.is_subtype_of(sub, sup)
    }

    /// Least common supertype, used to type heterogeneous list literals.
    ///
    /// Prefers the most specific common interface when several qualify.
    pub fn find_common_supertype(&self, a: &Type, b: &Type) -> Option<Type> {
        let a = self.resolve(a);
        let b = self.resolve(b);

        if self.identical(&a, &b) {
            return Some(a);
        }
        if self.is_subtype_of(&a, &b) {
            return Some(b);
        }
        if self.is_subtype_of(&b, &a) {
            return Some(a);
        }

        let both_non_null = a.is_non_null() && b.is_non_null();
        let wrap = |t: Type| if both_non_null { t.non_null() } else { t };

        if a.is_non_null() || b.is_non_null() {
            let (ia, ib) = (a.clone().nullable(), b.clone().nullable());
            if let Some(common) = self.find_common_supertype(&ia, &ib) {
                return Some(wrap(common));
            }
            return None;
        }

        match (&a, &b) {
            (Type::List(x), Type::List(y)) => self.find_common_supertype(x, y).map(Type::list),
            (Type::Module(x), Type::Module(y)) => {
                let theirs = self.modules.all_interfaces(y.id);
                let common: Vec<_> = self
                    .modules
                    .all_interfaces(x.id)
                    .into_iter()
                    .filter(|iface| theirs.contains(iface))
                    .collect();
                common
                    .iter()
                    .find(|&&candidate| {
                        !common
                            .iter()
                            .any(|&other| other != candidate && self.modules.implements(other, candidate))
                    })
                    .or(common.first())
                    .map(|&iface| self.modules.type_of(iface))
            }
            _ => None,
        }
    }
}

/// Check one interface member against the implementing class's member.
///
/// Return types are covariant, arguments contravariant; every interface
/// argument must be present and extra arguments must be optional. A
/// zero-argument interface function is satisfied by a plain field.
pub fn validate_field_implementation(
    u: &Unifier<'_>,
    field: &str,
    iface_ty: &Type,
    class_ty: &Type,
) -> std::result::Result<(), String> {
    let iface_ty = u.resolve(iface_ty);
    let class_ty = u.resolve(class_ty);
    let show = |t: &Type| u.show(t);

    let Some(iface_fn) = iface_ty.as_function() else {
        if class_ty.as_function().is_some() {
            return Err(format!("field {:?}: class has function type but interface does not", field));
        }
        if !u.is_subtype_of(&class_ty, &iface_ty) {
            return Err(format!(
                "field {:?}: type {} is not compatible with interface type {}",
                field,
                show(&class_ty),
                show(&iface_ty)
            ));
        }
        return Ok(());
    };

    let Some(class_fn) = class_ty.as_function() else {
        if iface_fn.args.is_empty() {
            if !u.is_subtype_of(&class_ty, &iface_fn.ret) {
                return Err(format!(
                    "field {:?}: type {} is not compatible with interface type {}",
                    field,
                    show(&class_ty),
                    show(&iface_fn.ret)
                ));
            }
            return Ok(());
        }
        return Err(format!("field {:?}: interface has function type but class does not", field));
    };

    if !u.is_subtype_of(&class_fn.ret, &iface_fn.ret) {
        return Err(format!(
            "field {:?}: return type {} is not compatible with interface return type {} (covariance required)",
            field,
            show(&class_fn.ret),
            show(&iface_fn.ret)
        ));
    }

    for (arg, iface_arg) in iface_fn.args.iter() {
        let Some(class_arg) = class_fn.args.scheme_of(arg) else {
            return Err(format!("field {:?}: missing argument {:?} required by interface", field, arg));
        };
        if !u.is_supertype_of(class_arg.ty(), iface_arg) {
            return Err(format!(
                "field {:?}, argument {:?}: type {} is not compatible with interface type {} (contravariance required)",
                field,
                arg,
                show(class_arg.ty()),
                show(iface_arg)
            ));
        }
    }

    for (arg, class_arg) in class_fn.args.iter() {
        if iface_fn.args.scheme_of(arg).is_none() && class_arg.is_non_null() {
            return Err(format!(
                "field {:?}, argument {:?}: additional arguments not in interface must be optional (nullable or have default)",
                field, arg
            ));
        }
    }

    Ok(())
}

/// Whether a module is an interface
pub fn is_interface(modules: &Modules, ty: &Type) -> bool {
    ty.as_module()
        .is_some_and(|m| modules.kind(m.id) == ModuleKind::Interface)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::{build_prelude, Builtins, Env, ModuleKind};
    use crate::types::{Fresher, Scheme};

    struct Fixture {
        modules: Modules,
        builtins: Builtins,
        subst: Subst,
        fresh: Fresher,
    }

    fn fixture() -> Fixture {
        let mut modules = Modules::new();
        let prelude = build_prelude(&mut modules);
        Fixture {
            modules,
            builtins: prelude.builtins,
            subst: Subst::new(),
            fresh: Fresher::new(),
        }
    }

    impl Fixture {
        fn int(&self) -> Type {
            self.modules.type_of(self.builtins.int)
        }

        fn string(&self) -> Type {
            self.modules.type_of(self.builtins.string)
        }

        fn unifier(&mut self) -> Unifier<'_> {
            Unifier::new(&self.modules, &mut self.subst)
        }
    }

    // ==================================================================
    // Nullability
    // ==================================================================

    #[test]
    fn test_non_null_assignable_to_nullable() {
        let mut fx = fixture();
        let (int, string) = (fx.int(), fx.string());
        let mut u = fx.unifier();

        for t in [int, string, Type::list(Type::Var(TypeVar::new(99)))] {
            assert!(u.assignable(&t.clone().non_null(), &t).is_ok());
        }
    }

    #[test]
    fn test_nullable_not_assignable_to_non_null() {
        let mut fx = fixture();
        let int = fx.int();
        let err = fx.unifier().assignable(&int, &int.clone().non_null()).unwrap_err();
        assert_eq!(err.to_string(), "cannot use Int as Int!");
    }

    #[test]
    fn test_nullable_assignable_to_fresh_variable() {
        let mut fx = fixture();
        let int = fx.int();
        let var = fx.fresh.fresh();
        let mut u = fx.unifier();

        assert!(u.assignable(&int, &var).is_ok());
        assert_eq!(u.resolve(&var), int);
    }

    #[test]
    fn test_list_covariance() {
        let mut fx = fixture();
        let string = fx.string();
        let mut u = fx.unifier();

        let have = Type::list(string.clone().non_null()).non_null();
        let want = Type::list(string.clone());
        assert!(u.assignable(&have, &want).is_ok());
        assert!(u.assignable(&want, &have).is_err());
    }

    // ==================================================================
    // Unification
    // ==================================================================

    #[test]
    fn test_empty_list_unifies_with_declared_list() {
        let mut fx = fixture();
        let string = fx.string();
        let alpha = fx.fresh.fresh();
        let mut u = fx.unifier();

        let empty = Type::list(alpha.clone()).non_null();
        let declared = Type::list(string.clone().non_null()).non_null();

        let unified = u.unify(&empty, &declared).unwrap();
        assert_eq!(unified, declared);
        assert_eq!(u.resolve(&alpha), string.non_null());
    }

    #[test]
    fn test_non_null_unifies_with_bare_type() {
        let mut fx = fixture();
        let int = fx.int();
        let mut u = fx.unifier();

        let unified = u.unify(&int.clone().non_null(), &int).unwrap();
        assert_eq!(unified, int.non_null());
    }

    #[test]
    fn test_failed_unify_rolls_back_bindings() {
        let mut fx = fixture();
        let (int, string) = (fx.int(), fx.string());
        let alpha = fx.fresh.fresh();
        let mut u = fx.unifier();

        let left = Type::function(crate::types::FunctionType::new(
            RecordType::new().with_field("a", alpha.clone()),
            int.clone(),
        ));
        let right = Type::function(crate::types::FunctionType::new(
            RecordType::new().with_field("b", string.clone()),
            string,
        ));
        assert!(u.unify(&left, &right).is_err());
        assert_eq!(u.resolve(&alpha), alpha);
    }

    #[test]
    fn test_occurs_check() {
        let mut fx = fixture();
        let alpha = fx.fresh.fresh();
        let mut u = fx.unifier();

        let err = u.unify(&alpha, &Type::list(alpha.clone())).unwrap_err();
        assert!(err.to_string().contains("recursive type"));
    }

    // ==================================================================
    // Records and functions
    // ==================================================================

    #[test]
    fn test_record_width_subtyping() {
        let mut fx = fixture();
        let (int, string) = (fx.int(), fx.string());
        let mut u = fx.unifier();

        let wide = Type::Record(
            RecordType::new()
                .with_field("name", string.clone().non_null())
                .with_field("age", int.clone().non_null()),
        );
        let narrow = Type::Record(RecordType::new().with_field("name", string.clone()));
        let needs_email = Type::Record(RecordType::new().with_field("email", string.clone().non_null()));
        let optional_email = Type::Record(RecordType::new().with_field("email", string));

        assert!(u.assignable(&wide, &narrow).is_ok());
        assert!(u.assignable(&wide, &needs_email).is_err());
        assert!(u.assignable(&wide, &optional_email).is_ok());
    }

    #[test]
    fn test_function_variance() {
        let mut fx = fixture();
        let int = fx.int();
        let mut u = fx.unifier();

        let accepts_nullable = Type::function(FunctionType::new(
            RecordType::new().with_field("x", int.clone()),
            int.clone().non_null(),
        ));
        let wants = Type::function(FunctionType::new(
            RecordType::new().with_field("item", int.clone().non_null()),
            int.clone(),
        ));

        assert!(u.assignable(&accepts_nullable, &wants).is_ok());
        assert!(u.assignable(&wants, &accepts_nullable).is_err());
    }

    // ==================================================================
    // Interfaces
    // ==================================================================

    fn interface_fixture() -> (Fixture, Type, Type, Type, Type) {
        let mut fx = fixture();
        let node = fx.modules.create(Some("Node"), ModuleKind::Interface, None);
        let named = fx.modules.create(Some("Named"), ModuleKind::Interface, None);
        let user = fx.modules.create(Some("User"), ModuleKind::Object, None);
        let post = fx.modules.create(Some("Post"), ModuleKind::Object, None);
        fx.modules.add_interface(named, node);
        fx.modules.add_interface(user, named);
        fx.modules.add_interface(post, named);

        let types = (
            fx.modules.type_of(node),
            fx.modules.type_of(named),
            fx.modules.type_of(user),
            fx.modules.type_of(post),
        );
        (fx, types.0, types.1, types.2, types.3)
    }

    #[test]
    fn test_module_assignable_to_transitive_interface() {
        let (mut fx, node, _, user, post) = interface_fixture();
        let mut u = fx.unifier();

        assert!(u.assignable(&user.clone().non_null(), &node).is_ok());
        assert!(u.assignable(&user.clone().non_null(), &node.clone().non_null()).is_ok());
        assert!(u.assignable(&node, &user).is_err());
        assert!(u.assignable(&user, &post).is_err());
    }

    #[test]
    fn test_common_supertype_prefers_most_specific_interface() {
        let (mut fx, _, named, user, post) = interface_fixture();
        let u = fx.unifier();

        let common = u.find_common_supertype(&user.non_null(), &post.non_null()).unwrap();
        assert_eq!(common, named.non_null());
    }

    #[test]
    fn test_common_supertype_of_nullable_and_non_null() {
        let mut fx = fixture();
        let int = fx.int();
        let string = fx.string();
        let u = fx.unifier();

        assert_eq!(u.find_common_supertype(&int.clone().non_null(), &int), Some(int.clone()));
        assert_eq!(u.find_common_supertype(&int, &string), None);
    }

    #[test]
    fn test_field_implementation_variance() {
        let mut fx = fixture();
        let string = fx.string();
        let int = fx.int();
        let u = fx.unifier();

        assert!(validate_field_implementation(&u, "id", &string.clone().non_null(), &string.clone().non_null()).is_ok());

        let err = validate_field_implementation(&u, "id", &string.clone().non_null(), &string).unwrap_err();
        assert!(err.contains("not compatible"));

        let iface_fn = Type::function(FunctionType::new(
            RecordType::new().with_field("limit", int.clone().non_null()),
            string.clone(),
        ));
        let class_fn = Type::function(FunctionType::new(
            RecordType::new()
                .with_field("limit", int.clone())
                .with_field("offset", int.clone()),
            string.clone().non_null(),
        ));
        assert!(validate_field_implementation(&u, "items", &iface_fn, &class_fn).is_ok());

        let missing_arg = Type::function(FunctionType::new(RecordType::new(), string.clone()));
        let err = validate_field_implementation(&u, "items", &iface_fn, &missing_arg).unwrap_err();
        assert!(err.contains("missing argument \"limit\" required by interface"));

        let narrower_arg = Type::function(FunctionType::new(
            RecordType::new().with_field("limit", int.clone().non_null()),
            string.clone(),
        ));
        let wider_iface = Type::function(FunctionType::new(
            RecordType::new().with_field("limit", int.clone()),
            string.clone(),
        ));
        let err = validate_field_implementation(&u, "items", &wider_iface, &narrower_arg).unwrap_err();
        assert!(err.contains("(contravariance required)"));

        let required_extra = Type::function(FunctionType::new(
            RecordType::new()
                .with_field("limit", int.clone().non_null())
                .with_field("cursor", string.clone().non_null()),
            string.clone(),
        ));
        let err = validate_field_implementation(&u, "items", &iface_fn, &required_extra).unwrap_err();
        assert!(err.contains("additional arguments not in interface must be optional"));
    }

    #[test]
    fn test_zero_arg_interface_fn_satisfied_by_field() {
        let mut fx = fixture();
        let string = fx.string();
        let u = fx.unifier();

        let iface = Type::function(FunctionType::new(RecordType::new(), string.clone()));
        assert!(validate_field_implementation(&u, "name", &iface, &string.non_null()).is_ok());
    }

    #[test]
    fn test_anonymous_modules_compare_structurally() {
        let mut fx = fixture();
        let int = fx.int().non_null();
        let a = fx.modules.create(None, ModuleKind::Object, None);
        let b = fx.modules.create(None, ModuleKind::Object, None);
        Env::Module(a).add(&mut fx.modules, "x", Scheme::mono(int.clone()));
        Env::Module(b).add(&mut fx.modules, "x", Scheme::mono(int));

        let (ta, tb) = (fx.modules.type_of(a), fx.modules.type_of(b));
        let u = fx.unifier();
        assert!(u.identical_to(&ta, &tb));
        assert_eq!(fx.modules.show(&ta), "{x: Int!}");
    }
}
