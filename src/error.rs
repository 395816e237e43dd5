//! Error taxonomy for the strip tool.
//!
//! Every failure is surfaced to the immediate caller. Nothing here is retried
//! and nothing is swallowed; call shapes the extractor does not recognise are
//! not errors at all and never reach this type.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by [`crate::MinErrStrip`] and its components.
#[derive(Error, Debug)]
pub enum StripError {
    /// A required option is missing or invalid. Fatal to the tool instance.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The production template could not be read.
    #[error("production template {} could not be read: {source}", path.display())]
    ResourceMissing {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Module text or the production template failed to parse.
    #[error("syntax error in {origin} at {line}:{column}: {message}")]
    Syntax {
        origin: &'static str,
        line: usize,
        column: usize,
        message: String,
    },

    /// The write collaborator failed. The store has already been reset.
    #[error("failed to write error config to {}: {source}", path.display())]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The JavaScript grammar could not be loaded into the parser.
    #[error("parser initialisation failed: {0}")]
    Parser(#[from] tree_sitter::LanguageError),

    /// A built-in tree-sitter query failed to compile against the grammar.
    #[error("invalid tree-sitter query: {0}")]
    Query(#[from] tree_sitter::QueryError),
}

impl StripError {
    /// Returns true for errors scoped to a single module.
    ///
    /// Callers driving many modules can report these and keep going; anything
    /// else means the tool instance itself is unusable.
    pub fn is_module_error(&self) -> bool {
        matches!(self, StripError::Syntax { origin, .. } if *origin == ORIGIN_MODULE)
    }
}

/// `origin` used for syntax errors in module text.
pub const ORIGIN_MODULE: &str = "module";

/// `origin` used for syntax errors in the production template.
pub const ORIGIN_TEMPLATE: &str = "production template";

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, StripError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_errors_are_recoverable() {
        let err = StripError::Syntax {
            origin: ORIGIN_MODULE,
            line: 3,
            column: 7,
            message: "unexpected token".to_string(),
        };
        assert!(err.is_module_error());
        assert_eq!(
            err.to_string(),
            "syntax error in module at 3:7: unexpected token"
        );
    }

    #[test]
    fn test_template_errors_are_fatal() {
        let err = StripError::Syntax {
            origin: ORIGIN_TEMPLATE,
            line: 1,
            column: 1,
            message: "missing }".to_string(),
        };
        assert!(!err.is_module_error());
        assert!(!StripError::Configuration("docs_url".to_string()).is_module_error());
    }
}
