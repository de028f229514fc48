//! Dang language core
//!
//! GraphQL-shaped type algebra, module environments, unification, hoisting
//! inference and a tree-walking evaluator. Parsing and the GraphQL transport
//! live outside this crate: front ends build [`ast::Node`] trees and a
//! [`import::SchemaProvider`] supplies introspection results.

pub mod logging;

pub mod errors;
pub mod types;
pub mod env;
pub mod unify;

pub mod ast;
pub mod schema;
pub mod import;

pub mod typecheck;
pub mod eval;

pub use errors::{DangError, Result};
pub use eval::value::Value;
pub use eval::Interpreter;
pub use typecheck::Checker;
