//! `import source as Alias`

use super::Checker;
use crate::ast::{ImportDecl, Node, NodeKind};
use crate::env::{Env, BUILTIN_TYPE_NAMES};
use crate::errors::{DangError, Result};
use crate::schema;
use crate::types::Type;
use log::debug;

impl Checker {
    /// Fetch the schema and install it as a named module
    pub(super) fn hoist_import(&mut self, env: &Env, node: &Node, decl: &ImportDecl) -> Result<()> {
        let Some(alias) = &decl.alias else {
            return Err(DangError::unsupported(
                format!("unaliased import of {:?}", decl.source),
                node.loc.clone(),
            ));
        };

        if BUILTIN_TYPE_NAMES.contains(&alias.as_str()) || env.named_type(&self.modules, alias).is_some() {
            return Err(DangError::redefinition(
                format!("import alias {:?} conflicts with existing type", alias),
                node.loc.clone(),
            ));
        }
        if env.local_scheme_of(&self.modules, alias).is_some() {
            return Err(DangError::redefinition(
                format!("import alias {:?} conflicts with existing symbol", alias),
                node.loc.clone(),
            ));
        }

        let mut args = Vec::with_capacity(decl.config.len());
        for arg in &decl.config {
            match (&arg.name, &arg.value.kind) {
                (Some(key), NodeKind::String(value)) => args.push((key.clone(), value.clone())),
                _ => {
                    return Err(DangError::unification(format!(
                        "import {:?}: configuration must be named string literals",
                        decl.source
                    ))
                    .with_location(arg.value.loc.as_ref()))
                }
            }
        }
        let request = self.import_config.request(&decl.source, &args);

        let provider = self.schema_provider.as_ref().ok_or_else(|| {
            DangError::unsupported(
                format!("import of {:?} without a schema provider", decl.source),
                node.loc.clone(),
            )
        })?;
        let schema = provider
            .schema(&request)
            .map_err(|e| e.context(format!("import {:?}", decl.source)))?;

        let module = schema::new_env(&mut self.modules, &schema, &self.prelude, alias)?;
        env.add_class(&mut self.modules, alias, module);
        let module_ty = self.modules.type_of(module).non_null();
        env.add(&mut self.modules, alias, module_ty.into());
        self.node_modules.insert(node.id, module);
        debug!("imported {} as {} ({} types)", decl.source, alias, schema.types.len());
        Ok(())
    }

    pub(super) fn infer_import(&mut self, env: &Env, node: &Node, decl: &ImportDecl) -> Result<Type> {
        self.hoist(env, node, 0)?;
        let module = self
            .module_of(node.id)
            .ok_or_else(|| DangError::not_found(decl.source.clone(), node.loc.clone()))?;
        Ok(self.modules.type_of(module).non_null())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::build::*;
    use crate::import::{ImportConfig, StaticSchemaProvider};
    use crate::schema::fixtures::HUB_SCHEMA;
    use crate::schema::Schema;

    fn checker() -> Checker {
        let schema = Schema::from_json(HUB_SCHEMA).unwrap();
        Checker::new()
            .with_import_config(ImportConfig::empty())
            .with_schema_provider(StaticSchemaProvider::new().with_schema("hub.example.com", schema))
    }

    #[test]
    fn test_aliased_import_installs_module() {
        let mut checker = checker();
        let program = vec![
            import("hub.example.com", Some("Hub")),
            let_slot("login", None, Some(get(get(auto("Hub"), "viewer"), "login"))),
            let_slot("v", Some(qualified_ty("Hub", "Visibility")), Some(get(get(auto("Hub"), "Visibility"), "PUBLIC"))),
        ];
        checker.infer_program(&program).unwrap();
        let env = checker.env();
        let login = env.scheme_of(&checker.modules, "login").unwrap();
        assert_eq!(checker.show(login.ty()), "String!");
    }

    #[test]
    fn test_unaliased_import_is_unsupported() {
        let mut checker = checker();
        let err = checker.infer_program(&[import("hub.example.com", None)]).unwrap_err();
        assert_eq!(err.error_code(), "E0870");
        assert!(err.to_string().contains("unaliased import"));
    }

    #[test]
    fn test_alias_conflicts() {
        let mut checker = checker();
        let err = checker.infer_program(&[import("hub.example.com", Some("String"))]).unwrap_err();
        assert!(matches!(err, DangError::RedefinitionFailure { .. }));

        let mut checker = self::checker();
        checker.infer_program(&[let_slot("Hub", None, Some(int(1)))]).unwrap();
        let err = checker
            .infer_program(&[import("hub.example.com", Some("Hub"))])
            .unwrap_err();
        assert!(err.to_string().contains("conflicts with existing symbol"));
    }

    #[test]
    fn test_missing_provider() {
        let mut checker = Checker::new().with_import_config(ImportConfig::empty());
        let err = checker.infer_program(&[import("hub.example.com", Some("Hub"))]).unwrap_err();
        assert_eq!(err.error_code(), "E0870");
    }
}
