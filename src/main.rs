//! Dang - inspect the type environments the language core builds
//!
//! # Usage
//!
//! ```bash
//! # List the builtin scalar types
//! dang prelude
//!
//! # Load an introspection result and list its types
//! dang schema github.json --alias GitHub
//!
//! # Show the fields of one schema type
//! dang schema github.json --type Repository
//!
//! # Show where an import source would be fetched from
//! dang endpoint api.example.com
//! ```

use clap::{Parser, Subcommand};
use compiler::env::{build_prelude, Env, ModuleKind, Modules, Visibility, BUILTIN_TYPE_NAMES};
use compiler::import::{resolve_endpoint, ImportConfig};
use compiler::schema::{new_env, Schema};
use compiler::DangError;
use diagnostics::ErrorFormatter;
use source_map::SourceMap;
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "dang")]
#[command(version = "0.1.0")]
#[command(about = "Dang - GraphQL-shaped types, inference and evaluation", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the builtin types every module can see
    Prelude,

    /// Load a GraphQL introspection result into a module
    Schema {
        /// Path to the introspection JSON
        file: PathBuf,

        /// Module name, as it would be bound by an import alias
        #[arg(long, default_value = "Schema")]
        alias: String,

        /// Print the members of this type instead of the type list
        #[arg(long = "type")]
        type_name: Option<String>,
    },

    /// Show the endpoint and token variable for an import source
    Endpoint {
        /// Import source, e.g. `github.com` or `https://host/graphql`
        source: String,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.verbose {
        0 => compiler::logging::init_from_env(),
        1 => compiler::logging::init_with_level(log::LevelFilter::Debug),
        _ => compiler::logging::init_with_level(log::LevelFilter::Trace),
    }

    let result = match cli.command {
        Commands::Prelude => {
            show_prelude();
            Ok(())
        }
        Commands::Schema { file, alias, type_name } => show_schema(file, &alias, type_name.as_deref()),
        Commands::Endpoint { source } => {
            show_endpoint(&source);
            Ok(())
        }
    };

    if let Err(e) = result {
        eprint!("{}", ErrorFormatter::new().format_diagnostic(&e.to_diagnostic(), &SourceMap::new()));
        process::exit(1);
    }
}

fn kind_label(kind: ModuleKind) -> &'static str {
    match kind {
        ModuleKind::Object => "type",
        ModuleKind::Enum => "enum",
        ModuleKind::Scalar => "scalar",
        ModuleKind::Interface => "interface",
    }
}

fn show_prelude() {
    let mut modules = Modules::new();
    let prelude = build_prelude(&mut modules);
    for name in BUILTIN_TYPE_NAMES {
        if let Some(id) = prelude.env.named_type(&modules, name) {
            println!("{} {}", kind_label(modules.kind(id)), name);
        }
    }
}

fn show_schema(file: PathBuf, alias: &str, type_name: Option<&str>) -> Result<(), DangError> {
    let json = std::fs::read_to_string(&file)
        .map_err(|e| DangError::Schema { message: format!("reading {}: {}", file.display(), e) })?;
    let schema = Schema::from_json(&json).map_err(|e| e.context(file.display().to_string()))?;

    let mut modules = Modules::new();
    let prelude = build_prelude(&mut modules);
    let root = new_env(&mut modules, &schema, &prelude, alias)?;
    let env = Env::composite(root, &prelude.env);

    match type_name {
        None => {
            let types: Vec<(String, ModuleKind)> = modules
                .get(root)
                .classes()
                .map(|(name, id)| (name.to_string(), modules.kind(id)))
                .collect();
            for (name, kind) in &types {
                println!("{} {}.{}", kind_label(*kind), alias, name);
            }
            println!("{} types", types.len());

            for (member, scheme) in Env::Module(root).bindings(&modules, Visibility::Public) {
                if types.iter().all(|(name, _)| *name != member) {
                    println!("  {}.{}: {}", alias, member, modules.show(scheme.ty()));
                }
            }
        }
        Some(name) => {
            let id = env
                .named_type(&modules, name)
                .ok_or_else(|| DangError::type_not_found(name, None))?;
            println!("{} {}.{}", kind_label(modules.kind(id)), alias, name);
            for (member, scheme) in Env::Module(id).bindings(&modules, Visibility::Public) {
                println!("  {}: {}", member, modules.show(scheme.ty()));
            }
        }
    }
    Ok(())
}

fn show_endpoint(source: &str) {
    let config = ImportConfig::from_env();
    let (var, token) = config.token_for(source);
    match resolve_endpoint(source) {
        Some(endpoint) => {
            println!("endpoint: {}", endpoint);
            println!("token:    ${} ({})", var, if token.is_some() { "set" } else { "unset" });
        }
        None => println!("endpoint: dagger session"),
    }
}
