//! The error config document and the collaborator that writes it.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StripError};
use crate::store::ErrorTemplates;

/// The flushed artifact: config details plus an `errors` mapping.
///
/// ```json
/// {"generated":"Tue, 1 Jul 2025 10:52:37 +0200","errors":{"ng":{"areq":"Argument '{0}' is {1}"}}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorConfig {
    #[serde(flatten)]
    pub details: BTreeMap<String, serde_json::Value>,
    pub errors: ErrorTemplates,
}

impl ErrorConfig {
    /// Build the document. An `errors` entry in `details` is dropped.
    pub fn new(mut details: BTreeMap<String, serde_json::Value>, errors: ErrorTemplates) -> Self {
        if details.remove("errors").is_some() {
            tracing::warn!("Config detail 'errors' is reserved and was ignored");
        }
        Self { details, errors }
    }
}

/// Writes a flushed [`ErrorConfig`] to its destination.
pub trait ConfigWriter {
    fn write(&self, dest: &Path, config: &ErrorConfig) -> Result<()>;
}

/// Writes the document as JSON to a file.
#[derive(Debug, Clone, Default)]
pub struct JsonFileWriter {
    /// Pretty-print instead of writing one line.
    pub pretty: bool,
}

impl JsonFileWriter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    /// Serialize without writing.
    pub fn render(&self, config: &ErrorConfig) -> serde_json::Result<String> {
        if self.pretty {
            serde_json::to_string_pretty(config)
        } else {
            serde_json::to_string(config)
        }
    }
}

impl ConfigWriter for JsonFileWriter {
    fn write(&self, dest: &Path, config: &ErrorConfig) -> Result<()> {
        let failure = |source: io::Error| StripError::WriteFailure {
            path: dest.to_path_buf(),
            source,
        };

        let json = self.render(config).map_err(|e| failure(io::Error::other(e)))?;
        fs::write(dest, json).map_err(failure)?;
        tracing::info!("Wrote error config to {}", dest.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn errors() -> ErrorTemplates {
        let mut codes = BTreeMap::new();
        codes.insert("one".to_string(), "Herp! A {0} happened".to_string());
        let mut errors = BTreeMap::new();
        errors.insert("test".to_string(), codes);
        errors
    }

    #[test]
    fn test_document_shape() {
        let mut details = BTreeMap::new();
        details.insert("version".to_string(), serde_json::json!("1.0"));
        let config = ErrorConfig::new(details, errors());

        let json = JsonFileWriter::default().render(&config).unwrap();

        assert_eq!(
            json,
            r#"{"version":"1.0","errors":{"test":{"one":"Herp! A {0} happened"}}}"#
        );
    }

    #[test]
    fn test_errors_detail_is_reserved() {
        let mut details = BTreeMap::new();
        details.insert("errors".to_string(), serde_json::json!("bogus"));
        let config = ErrorConfig::new(details, errors());

        assert!(config.details.is_empty());
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["errors"]["test"]["one"], "Herp! A {0} happened");
    }

    #[test]
    fn test_writes_file() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("errors.json");
        let config = ErrorConfig::new(BTreeMap::new(), errors());

        JsonFileWriter::new(true).write(&dest, &config).unwrap();

        let written = fs::read_to_string(&dest).unwrap();
        assert!(written.contains('\n'), "pretty output spans lines");
        let parsed: ErrorConfig = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_write_failure() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("missing").join("errors.json");
        let config = ErrorConfig::new(BTreeMap::new(), errors());

        let result = JsonFileWriter::default().write(&dest, &config);

        assert!(matches!(result, Err(StripError::WriteFailure { path, .. }) if path == dest));
    }
}
