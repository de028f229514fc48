//! Error values produced by inference and evaluation
//!
//! Every failure in the core is an ordinary [`DangError`] value: a kind, a
//! message, an optional source location and, for wrapped errors, the cause.
//! Nothing in the core panics on user input.

use diagnostics::{Diagnostic, DiagnosticBuilder, Diagnostics};
use source_map::SourceLocation;
use std::fmt;

pub type Result<T> = std::result::Result<T, DangError>;

/// What kind of name failed to resolve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    Symbol,
    Type,
    Interface,
    Directive,
}

/// Which loop exit a `break` or `continue` asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopSignal {
    Break,
    Continue,
}

/// Errors raised by the Dang core
#[derive(Debug, Clone)]
pub enum DangError {
    /// A named type or symbol was not found in any enclosing scope
    UnresolvedType {
        name: String,
        kind: NameKind,
        location: Option<SourceLocation>,
    },

    /// Two concrete types could not be made equal
    UnificationFailure {
        message: String,
        location: Option<SourceLocation>,
    },

    /// A value's type is not usable where another type is required
    AssignabilityFailure {
        have: String,
        want: String,
        context: Option<String>,
        location: Option<SourceLocation>,
    },

    /// One or more interface members are missing or have incompatible variance
    InterfaceConformanceFailure {
        class: String,
        failures: Vec<String>,
        location: Option<SourceLocation>,
    },

    /// A name was re-declared with a different type in the same scope
    RedefinitionFailure {
        message: String,
        location: Option<SourceLocation>,
    },

    /// Unsupported operands, division by zero, missing fields and so on
    RuntimeOperationFailure {
        message: String,
        location: Option<SourceLocation>,
    },

    /// An assert block evaluated to a falsy value
    AssertionFailure {
        message: String,
        details: Vec<String>,
        location: Option<SourceLocation>,
    },

    /// A feature the core does not implement
    Unsupported {
        feature: String,
        location: Option<SourceLocation>,
    },

    /// `break` or `continue` unwinding to its loop. Only escapes a program
    /// that was not type-checked.
    LoopExit {
        signal: LoopSignal,
        location: Option<SourceLocation>,
    },

    /// Nesting exceeded the configured depth
    RecursionLimitExceeded {
        limit: usize,
        location: Option<SourceLocation>,
    },

    /// Several independent errors collected from one pass
    InferenceErrors { errors: Vec<DangError> },

    /// Introspection JSON could not be read
    Schema { message: String },

    /// An error annotated with what was being done when it happened
    Context {
        context: String,
        location: Option<SourceLocation>,
        source: Box<DangError>,
    },
}

impl DangError {
    pub fn not_found(name: impl Into<String>, location: Option<SourceLocation>) -> Self {
        DangError::UnresolvedType {
            name: name.into(),
            kind: NameKind::Symbol,
            location,
        }
    }

    pub fn type_not_found(name: impl Into<String>, location: Option<SourceLocation>) -> Self {
        DangError::UnresolvedType {
            name: name.into(),
            kind: NameKind::Type,
            location,
        }
    }

    pub fn unification(message: impl Into<String>) -> Self {
        DangError::UnificationFailure {
            message: message.into(),
            location: None,
        }
    }

    pub fn cannot_use(have: impl fmt::Display, want: impl fmt::Display) -> Self {
        DangError::AssignabilityFailure {
            have: have.to_string(),
            want: want.to_string(),
            context: None,
            location: None,
        }
    }

    pub fn redefinition(message: impl Into<String>, location: Option<SourceLocation>) -> Self {
        DangError::RedefinitionFailure {
            message: message.into(),
            location,
        }
    }

    pub fn runtime(message: impl Into<String>, location: Option<SourceLocation>) -> Self {
        DangError::RuntimeOperationFailure {
            message: message.into(),
            location,
        }
    }

    pub fn unsupported(feature: impl Into<String>, location: Option<SourceLocation>) -> Self {
        DangError::Unsupported {
            feature: feature.into(),
            location,
        }
    }

    /// Wrap with a short description of the operation that failed
    pub fn context(self, context: impl Into<String>) -> Self {
        let location = self.location().cloned();
        DangError::Context {
            context: context.into(),
            location,
            source: Box::new(self),
        }
    }

    /// Attach a location unless the error already has a more specific one
    pub fn with_location(mut self, loc: Option<&SourceLocation>) -> Self {
        let Some(loc) = loc else {
            return self;
        };
        let slot = match &mut self {
            DangError::UnresolvedType { location, .. }
            | DangError::UnificationFailure { location, .. }
            | DangError::AssignabilityFailure { location, .. }
            | DangError::InterfaceConformanceFailure { location, .. }
            | DangError::RedefinitionFailure { location, .. }
            | DangError::RuntimeOperationFailure { location, .. }
            | DangError::AssertionFailure { location, .. }
            | DangError::Unsupported { location, .. }
            | DangError::LoopExit { location, .. }
            | DangError::RecursionLimitExceeded { location, .. }
            | DangError::Context { location, .. } => location,
            DangError::InferenceErrors { .. } | DangError::Schema { .. } => return self,
        };
        if slot.is_none() {
            *slot = Some(loc.clone());
        }
        self
    }

    /// Get the source location for this error
    pub fn location(&self) -> Option<&SourceLocation> {
        match self {
            DangError::UnresolvedType { location, .. }
            | DangError::UnificationFailure { location, .. }
            | DangError::AssignabilityFailure { location, .. }
            | DangError::InterfaceConformanceFailure { location, .. }
            | DangError::RedefinitionFailure { location, .. }
            | DangError::RuntimeOperationFailure { location, .. }
            | DangError::AssertionFailure { location, .. }
            | DangError::Unsupported { location, .. }
            | DangError::LoopExit { location, .. }
            | DangError::RecursionLimitExceeded { location, .. }
            | DangError::Context { location, .. } => location.as_ref(),
            DangError::InferenceErrors { errors } => errors.first().and_then(|e| e.location()),
            DangError::Schema { .. } => None,
        }
    }

    /// The innermost error, skipping context wrappers
    pub fn root_cause(&self) -> &DangError {
        match self {
            DangError::Context { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Fine-grained error code for this error kind.
    ///
    /// Error codes E0800-E0899 are reserved for the Dang core:
    /// - E0801: Unresolved symbol or type
    /// - E0810: Unification failure
    /// - E0820: Assignability failure
    /// - E0830: Interface conformance failure
    /// - E0840: Redefinition
    /// - E0850: Runtime operation failure
    /// - E0855: `break` or `continue` outside a loop
    /// - E0860: Assertion failure
    /// - E0870: Unsupported feature
    /// - E0880: Recursion limit exceeded
    /// - E0890: Multiple inference errors
    /// - E0895: Invalid schema
    pub fn error_code(&self) -> &'static str {
        match self {
            DangError::UnresolvedType { .. } => "E0801",
            DangError::UnificationFailure { .. } => "E0810",
            DangError::AssignabilityFailure { .. } => "E0820",
            DangError::InterfaceConformanceFailure { .. } => "E0830",
            DangError::RedefinitionFailure { .. } => "E0840",
            DangError::RuntimeOperationFailure { .. } => "E0850",
            DangError::LoopExit { .. } => "E0855",
            DangError::AssertionFailure { .. } => "E0860",
            DangError::Unsupported { .. } => "E0870",
            DangError::RecursionLimitExceeded { .. } => "E0880",
            DangError::InferenceErrors { .. } => "E0890",
            DangError::Schema { .. } => "E0895",
            DangError::Context { source, .. } => source.error_code(),
        }
    }

    pub fn suggestion(&self) -> Option<String> {
        match self {
            DangError::UnresolvedType { name, kind: NameKind::Symbol, .. } => {
                Some(format!("Declare '{}' before using it, or check its spelling", name))
            }
            DangError::UnresolvedType { name, kind: NameKind::Directive, .. } => {
                Some(format!("Declare it with `directive @{}(...) on ...`", name))
            }
            DangError::AssignabilityFailure { want, .. } if want.ends_with('!') => {
                Some(format!("A non-null {} is required here; nullable values are not accepted", want))
            }
            DangError::RecursionLimitExceeded { .. } => {
                Some("Check for unbounded recursion, or raise the configured depth limit".to_string())
            }
            DangError::Unsupported { feature, .. } if feature.contains("import") => {
                Some("Use an aliased import: `import source as name`".to_string())
            }
            DangError::Context { source, .. } => source.suggestion(),
            _ => None,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        let mut builder = DiagnosticBuilder::error(self.to_string())
            .code(self.error_code())
            .location(self.location().cloned());
        if let Some(help) = self.suggestion() {
            builder = builder.help(help);
        }
        if let DangError::AssertionFailure { details, .. } = self.root_cause() {
            for detail in details {
                builder = builder.note(detail.clone());
            }
        }
        builder.build()
    }

    /// One diagnostic per independent error
    pub fn to_diagnostics(&self) -> Diagnostics {
        match self {
            DangError::InferenceErrors { errors } => errors.iter().map(DangError::to_diagnostic).collect(),
            other => std::iter::once(other.to_diagnostic()).collect(),
        }
    }
}

impl fmt::Display for DangError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DangError::UnresolvedType { name, kind, .. } => match kind {
                NameKind::Symbol => write!(f, "{:?} not found", name),
                NameKind::Type => write!(f, "type {:?} not found", name),
                NameKind::Interface => write!(f, "interface {} not found", name),
                NameKind::Directive => write!(f, "directive @{} not found", name),
            },
            DangError::UnificationFailure { message, .. } => write!(f, "{}", message),
            DangError::AssignabilityFailure { have, want, context, .. } => match context {
                Some(ctx) => write!(f, "{}: cannot use {} as {}", ctx, have, want),
                None => write!(f, "cannot use {} as {}", have, want),
            },
            DangError::InterfaceConformanceFailure { failures, .. } if failures.len() == 1 => {
                write!(f, "{}", failures[0])
            }
            DangError::InterfaceConformanceFailure { class, failures, .. } => {
                write!(f, "class {} does not satisfy its interfaces:", class)?;
                for failure in failures {
                    write!(f, "\n  - {}", failure)?;
                }
                Ok(())
            }
            DangError::RedefinitionFailure { message, .. } => write!(f, "{}", message),
            DangError::RuntimeOperationFailure { message, .. } => write!(f, "{}", message),
            DangError::AssertionFailure { message, details, .. } => {
                write!(f, "{}", message)?;
                for detail in details {
                    write!(f, "\n  {}", detail)?;
                }
                Ok(())
            }
            DangError::Unsupported { feature, .. } => write!(f, "{} is not supported", feature),
            DangError::LoopExit { signal, .. } => match signal {
                LoopSignal::Break => write!(f, "break outside of a loop"),
                LoopSignal::Continue => write!(f, "continue outside of a loop"),
            },
            DangError::RecursionLimitExceeded { limit, .. } => {
                write!(f, "maximum nesting depth of {} exceeded", limit)
            }
            DangError::InferenceErrors { errors } => {
                write!(f, "{} inference errors:", errors.len())?;
                for err in errors {
                    write!(f, "\n  - {}", err)?;
                }
                Ok(())
            }
            DangError::Schema { message } => write!(f, "invalid schema: {}", message),
            DangError::Context { context, source, .. } => write!(f, "{}: {}", context, source),
        }
    }
}

impl std::error::Error for DangError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DangError::Context { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for DangError {
    fn from(err: serde_json::Error) -> Self {
        DangError::Schema {
            message: err.to_string(),
        }
    }
}
