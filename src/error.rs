//! Unified error types for scan-diff.
//!
//! Construction failures, identity lookup ambiguity and persistence
//! precondition violations are hard errors. Missing optional attributes are
//! never errors (they resolve to defaults), and an inconsistent report is a
//! skipped comparison rather than an error.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for scan-diff operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ScanDiffError {
    /// A required identity field is missing or outside its domain
    #[error("Invalid entity: {context}")]
    Validation {
        context: String,
        #[source]
        source: ValidationErrorKind,
    },

    /// More than one child entity shares an identity key
    #[error("Ambiguous lookup: {context}")]
    Lookup {
        context: String,
        #[source]
        source: LookupErrorKind,
    },

    /// Errors during diff computation
    #[error("Diff computation failed: {context}")]
    Diff {
        context: String,
        #[source]
        source: DiffErrorKind,
    },

    /// Errors while handing a report to a storage backend
    #[error("Persistence failed: {context}")]
    Persistence {
        context: String,
        #[source]
        source: PersistenceErrorKind,
    },

    /// IO errors with context
    #[error("IO error at {path:?}: {message}")]
    Io {
        path: Option<PathBuf>,
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Raw report (de)serialization errors
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Configuration errors
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Construction validation failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValidationErrorKind {
    #[error("Port {0} is outside 0-65535")]
    PortOutOfRange(i64),

    #[error("Port '{0}' is not numeric")]
    InvalidPort(String),

    #[error("Missing required field: {field} in {context}")]
    MissingField { field: String, context: String },
}

/// Identity lookup failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LookupErrorKind {
    #[error("{count} services share identity {protocol}/{port} on host {host}")]
    DuplicateService {
        host: String,
        protocol: String,
        port: u16,
        count: usize,
    },

    #[error("{count} hosts share address {address}")]
    DuplicateHost { address: String, count: usize },
}

/// Specific diff error kinds
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DiffErrorKind {
    #[error("Cannot diff {kind} '{old}' against '{new}': identities differ")]
    IdentityMismatch {
        kind: &'static str,
        old: String,
        new: String,
    },
}

/// Persistence failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PersistenceErrorKind {
    #[error("Report is missing sections: {0}")]
    InconsistentReport(String),

    #[error("Backend '{backend}' failed: {message}")]
    Backend { backend: String, message: String },
}

// ============================================================================
// Result type alias
// ============================================================================

/// Convenient Result type for scan-diff operations
pub type Result<T> = std::result::Result<T, ScanDiffError>;

// ============================================================================
// Error construction helpers
// ============================================================================

impl ScanDiffError {
    /// Create a validation error with context
    pub fn validation(context: impl Into<String>, source: ValidationErrorKind) -> Self {
        Self::Validation {
            context: context.into(),
            source,
        }
    }

    /// Create a validation error for a missing field
    pub fn missing_field(field: impl Into<String>, context: impl Into<String>) -> Self {
        Self::validation(
            "missing required field",
            ValidationErrorKind::MissingField {
                field: field.into(),
                context: context.into(),
            },
        )
    }

    /// Create a lookup ambiguity error
    pub fn lookup(context: impl Into<String>, source: LookupErrorKind) -> Self {
        Self::Lookup {
            context: context.into(),
            source,
        }
    }

    /// Create a diff error
    pub fn diff(context: impl Into<String>, source: DiffErrorKind) -> Self {
        Self::Diff {
            context: context.into(),
            source,
        }
    }

    /// Create a persistence error
    pub fn persistence(context: impl Into<String>, source: PersistenceErrorKind) -> Self {
        Self::Persistence {
            context: context.into(),
            source,
        }
    }

    /// Create a backend failure for the named backend
    pub fn backend(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::persistence(
            "backend operation",
            PersistenceErrorKind::Backend {
                backend: backend.into(),
                message: message.into(),
            },
        )
    }

    /// Create an IO error with path context
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let message = format!("{source}");
        Self::Io {
            path: Some(path.into()),
            message,
            source,
        }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Returns true for construction validation failures
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Returns true for identity lookup ambiguity
    #[must_use]
    pub const fn is_lookup(&self) -> bool {
        matches!(self, Self::Lookup { .. })
    }
}

// ============================================================================
// Conversions from existing error types
// ============================================================================

impl From<std::io::Error> for ScanDiffError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            path: None,
            message: format!("{err}"),
            source: err,
        }
    }
}

impl From<serde_json::Error> for ScanDiffError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

// ============================================================================
// Error context extension trait
// ============================================================================

/// Extension trait for adding context to errors.
///
/// Context is prepended to the error's existing context, so a chain reads
/// outermost first: `"loading report: host 10.0.0.1: missing required field"`.
pub trait ErrorContext<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context from a closure, evaluated only on error.
    fn with_context<F, C>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>;
}

impl<T, E: Into<ScanDiffError>> ErrorContext<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        let ctx: String = context.into();
        self.map_err(|e| add_context_to_error(e.into(), &ctx))
    }

    fn with_context<F, C>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>,
    {
        self.map_err(|e| {
            let ctx: String = f().into();
            add_context_to_error(e.into(), &ctx)
        })
    }
}

/// Add context to an error, chaining with any existing context.
fn add_context_to_error(err: ScanDiffError, new_ctx: &str) -> ScanDiffError {
    match err {
        ScanDiffError::Validation {
            context: existing,
            source,
        } => ScanDiffError::Validation {
            context: chain_context(new_ctx, &existing),
            source,
        },
        ScanDiffError::Lookup {
            context: existing,
            source,
        } => ScanDiffError::Lookup {
            context: chain_context(new_ctx, &existing),
            source,
        },
        ScanDiffError::Diff {
            context: existing,
            source,
        } => ScanDiffError::Diff {
            context: chain_context(new_ctx, &existing),
            source,
        },
        ScanDiffError::Persistence {
            context: existing,
            source,
        } => ScanDiffError::Persistence {
            context: chain_context(new_ctx, &existing),
            source,
        },
        ScanDiffError::Io {
            path,
            message,
            source,
        } => ScanDiffError::Io {
            path,
            message: chain_context(new_ctx, &message),
            source,
        },
        ScanDiffError::Serialization(msg) => {
            ScanDiffError::Serialization(chain_context(new_ctx, &msg))
        }
        ScanDiffError::Config(msg) => ScanDiffError::Config(chain_context(new_ctx, &msg)),
    }
}

/// Chain two context strings together.
fn chain_context(new: &str, existing: &str) -> String {
    if existing.is_empty() {
        new.to_string()
    } else {
        format!("{new}: {existing}")
    }
}

/// Extension trait for Option types to convert to errors with context.
pub trait OptionContext<T> {
    /// Convert None to a missing-field validation error.
    fn context_none(self, field: impl Into<String>, context: impl Into<String>) -> Result<T>;
}

impl<T> OptionContext<T> for Option<T> {
    fn context_none(self, field: impl Into<String>, context: impl Into<String>) -> Result<T> {
        self.ok_or_else(|| ScanDiffError::missing_field(field, context))
    }
}
