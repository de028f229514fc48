//! Checking directive applications against their declarations

use super::Checker;
use crate::ast::DirectiveApplication;
use crate::env::{DirectiveLocation, Env};
use crate::errors::{DangError, NameKind, Result};
use fxhash::FxHashSet;

impl Checker {
    /// Validate `@name(args)` applications found at `location`.
    ///
    /// Arguments may be positional (in declaration order) or named; every
    /// non-null argument of the declaration must be supplied.
    pub(crate) fn check_directives(
        &mut self,
        env: &Env,
        applications: &[DirectiveApplication],
        location: DirectiveLocation,
    ) -> Result<()> {
        for app in applications {
            let Some(decl) = env.directive(&self.modules, &app.name) else {
                return Err(DangError::UnresolvedType {
                    name: app.name.clone(),
                    kind: NameKind::Directive,
                    location: app.loc.clone(),
                });
            };

            if !decl.locations.contains(&location) {
                return Err(DangError::unification(format!(
                    "directive @{} cannot be applied to {}",
                    app.name, location
                ))
                .with_location(app.loc.as_ref()));
            }

            let mut given = FxHashSet::default();
            for (i, arg) in app.args.iter().enumerate() {
                let name = match &arg.name {
                    Some(name) => name.clone(),
                    None => match decl.args.fields.get_index(i) {
                        Some((name, _)) => name.clone(),
                        None => {
                            return Err(DangError::unification(format!(
                                "directive @{} takes at most {} arguments",
                                app.name,
                                decl.args.len()
                            ))
                            .with_location(app.loc.as_ref()))
                        }
                    },
                };
                let Some(want) = decl.args.scheme_of(&name) else {
                    return Err(DangError::unification(format!(
                        "directive @{} has no argument {:?}",
                        app.name, name
                    ))
                    .with_location(arg.value.loc.as_ref().or(app.loc.as_ref())));
                };
                let want = want.ty().clone();

                let have = self.infer(env, &arg.value)?;
                self.assignable(&have, &want).map_err(|e| {
                    e.context(format!("directive @{} argument {:?}", app.name, name))
                        .with_location(arg.value.loc.as_ref())
                })?;
                given.insert(name);
            }

            for required in decl.args.fields.iter().filter(|(_, s)| s.ty().is_non_null()).map(|(k, _)| k) {
                if !given.contains(required) {
                    return Err(DangError::unification(format!(
                        "directive @{} missing required argument {:?}",
                        app.name, required
                    ))
                    .with_location(app.loc.as_ref()));
                }
            }
        }
        Ok(())
    }
}
