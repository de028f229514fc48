//! Resolving `import` declarations to schemas
//!
//! The checker never talks to the network. An import is turned into an
//! [`ImportRequest`] (endpoint, authorization and headers derived from the
//! source name, the process environment and the import's own arguments),
//! and a [`SchemaProvider`] hands back the introspected [`Schema`].

use crate::errors::{DangError, Result};
use crate::schema::Schema;
use indexmap::IndexMap;
use log::debug;
use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;

/// Source name that selects the Dagger engine instead of an HTTP endpoint
pub const DAGGER_SOURCE: &str = "dagger";

const GITHUB_SOURCE: &str = "api.github.com";
const GITHUB_USER_AGENT: &str = "Dang-GraphQL-Client/1.0";

/// Everything needed to fetch one schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRequest {
    pub source: String,
    /// `None` for the Dagger engine
    pub endpoint: Option<String>,
    pub authorization: Option<String>,
    pub headers: IndexMap<String, String>,
}

/// Supplies schemas for imports
pub trait SchemaProvider {
    fn schema(&self, request: &ImportRequest) -> Result<Schema>;
}

/// Schemas registered up front, keyed by import source
#[derive(Debug, Clone, Default)]
pub struct StaticSchemaProvider {
    schemas: IndexMap<String, Schema>,
}

impl StaticSchemaProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schema(mut self, source: impl Into<String>, schema: Schema) -> Self {
        self.schemas.insert(source.into(), schema);
        self
    }
}

impl SchemaProvider for StaticSchemaProvider {
    fn schema(&self, request: &ImportRequest) -> Result<Schema> {
        self.schemas.get(&request.source).cloned().ok_or_else(|| DangError::Schema {
            message: format!("no schema registered for {:?}", request.source),
        })
    }
}

/// Reads cached introspection JSON from `<dir>/<source>.json`
#[derive(Debug, Clone)]
pub struct FileSchemaProvider {
    dir: PathBuf,
}

impl FileSchemaProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileSchemaProvider { dir: dir.into() }
    }

    pub fn path_for(&self, source: &str) -> PathBuf {
        let file: String = source
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", file))
    }
}

impl SchemaProvider for FileSchemaProvider {
    fn schema(&self, request: &ImportRequest) -> Result<Schema> {
        let path = self.path_for(&request.source);
        let json = std::fs::read_to_string(&path).map_err(|e| DangError::Schema {
            message: format!("{}: {}", path.display(), e),
        })?;
        Schema::from_json(&json)
    }
}

type Lookup = Rc<dyn Fn(&str) -> Option<String>>;

/// How import requests pick up credentials from the environment
#[derive(Clone)]
pub struct ImportConfig {
    lookup: Lookup,
}

impl fmt::Debug for ImportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImportConfig").finish_non_exhaustive()
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl ImportConfig {
    /// Read variables from the process environment
    pub fn from_env() -> Self {
        Self::with_lookup(|name| std::env::var(name).ok().filter(|v| !v.is_empty()))
    }

    /// Read variables through `lookup` instead of the process environment
    pub fn with_lookup(lookup: impl Fn(&str) -> Option<String> + 'static) -> Self {
        ImportConfig { lookup: Rc::new(lookup) }
    }

    /// A configuration that sees no variables at all
    pub fn empty() -> Self {
        Self::with_lookup(|_| None)
    }

    /// The variable that holds the token for `source`, and its value if set
    pub fn token_for(&self, source: &str) -> (String, Option<String>) {
        if source == GITHUB_SOURCE {
            if let Some(token) = (self.lookup)("GITHUB_TOKEN") {
                return ("GITHUB_TOKEN".to_string(), Some(token));
            }
        }
        let var = token_var(source);
        let token = (self.lookup)(&var);
        (var, token)
    }

    /// Build the request for `source`. `args` are the import's own config
    /// arguments: `endpoint` and `authorization` override the derived
    /// values, anything else becomes a header.
    pub fn request(&self, source: &str, args: &[(String, String)]) -> ImportRequest {
        let mut request = ImportRequest {
            source: source.to_string(),
            endpoint: resolve_endpoint(source),
            authorization: None,
            headers: IndexMap::new(),
        };
        if request.endpoint.is_some() {
            request.authorization = self.token_for(source).1.map(|t| format!("Bearer {}", t));
        }
        if source == GITHUB_SOURCE {
            request
                .headers
                .insert("User-Agent".to_string(), GITHUB_USER_AGENT.to_string());
        }

        for (key, value) in args {
            match key.as_str() {
                "endpoint" => request.endpoint = Some(value.clone()),
                "authorization" => request.authorization = Some(value.clone()),
                _ => {
                    request.headers.insert(key.clone(), value.clone());
                }
            }
        }
        debug!("import {} -> {:?}", source, request.endpoint);
        request
    }
}

/// `DANG_<SOURCE>_TOKEN`, with `.` and `-` turned into `_`
pub fn token_var(source: &str) -> String {
    let normalized: String = source
        .chars()
        .map(|c| match c {
            '.' | '-' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect();
    format!("DANG_{}_TOKEN", normalized)
}

/// Map an import source to its GraphQL endpoint; `None` means Dagger
pub fn resolve_endpoint(source: &str) -> Option<String> {
    if source == DAGGER_SOURCE {
        return None;
    }
    if source == GITHUB_SOURCE {
        return Some("https://api.github.com/graphql".to_string());
    }
    if source.starts_with("http://") || source.starts_with("https://") {
        return Some(source.to_string());
    }
    if source.contains('/') {
        return Some(format!("https://{}", source));
    }
    Some(format!("https://{}/graphql", source))
}
