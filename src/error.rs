use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::event::Location;

/// Fatal grammar compilation failures. No partial grammar is ever returned;
/// the first error aborts compilation of that grammar.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("undefined reference: {name}")]
    UnresolvedRef { name: String },

    #[error("grammar syntax error at {location}: {details}")]
    Syntax { location: Location, details: String },

    #[error("failed to load grammar source {url}: {cause}")]
    Source { url: String, cause: String },
}

impl CompileError {
    pub fn syntax(location: Location, details: impl Into<String>) -> Self {
        CompileError::Syntax {
            location,
            details: details.into(),
        }
    }
}

/// Main application error type that encompasses all failure modes outside of
/// per-document validation diagnostics (those accumulate, they never abort).
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status error: {status} for {url} - {message}")]
    HttpStatus {
        url: String,
        status: u16,
        message: String,
    },

    #[error("request timeout: {url} after {timeout_seconds} seconds")]
    Timeout { url: String, timeout_seconds: u64 },

    #[error("grammar compilation failed: {0}")]
    Compile(#[from] CompileError),

    #[error("XML parse error in {path}: {details}")]
    XmlParse { path: PathBuf, details: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("concurrent operation error: {details}")]
    Concurrency { details: String },

    #[error("validation cancelled: {reason}")]
    Cancelled { reason: String },

    #[error("{0}")]
    Shared(Arc<ValidationError>),
}

impl From<Arc<ValidationError>> for ValidationError {
    fn from(err: Arc<ValidationError>) -> Self {
        ValidationError::Shared(err)
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, ValidationError>;

/// Compile result type alias
pub type CompileResult<T> = std::result::Result<T, CompileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_error_display() {
        let unresolved = CompileError::UnresolvedRef {
            name: "missing".to_string(),
        };
        assert!(unresolved.to_string().contains("undefined reference"));
        assert!(unresolved.to_string().contains("missing"));

        let syntax = CompileError::syntax(Location::new(3, 7), "expected a pattern");
        assert!(syntax.to_string().contains("3:7"));
        assert!(syntax.to_string().contains("expected a pattern"));

        let source = CompileError::Source {
            url: "http://example.com/schema.rng".to_string(),
            cause: "connection refused".to_string(),
        };
        assert!(source.to_string().contains("http://example.com/schema.rng"));
        assert!(source.to_string().contains("connection refused"));
    }

    #[test]
    fn test_compile_error_conversion() {
        let err = CompileError::UnresolvedRef {
            name: "part".to_string(),
        };
        let validation_error: ValidationError = err.into();
        match validation_error {
            ValidationError::Compile(CompileError::UnresolvedRef { name }) => {
                assert_eq!(name, "part");
            }
            other => panic!("expected Compile error, got {:?}", other),
        }
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let validation_error: ValidationError = io_error.into();
        assert!(matches!(validation_error, ValidationError::Io(_)));
    }

    #[test]
    fn test_shared_error_display() {
        let inner = Arc::new(ValidationError::Config("bad threads value".to_string()));
        let shared: ValidationError = inner.into();
        assert!(shared.to_string().contains("bad threads value"));
    }

    #[test]
    fn test_error_source_chain() {
        use std::error::Error;

        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let validation_error = ValidationError::Io(io_error);
        assert!(validation_error.source().is_some());
    }
}
