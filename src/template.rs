//! Production template loading.
//!
//! The production template is the minimal, documentation-free error factory
//! shipped in place of the bulky one. It carries a marker where the
//! documentation base URL goes.

use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use regex::{NoExpand, Regex};

use crate::error::{Result, StripError};

/// Marker pattern replaced by the documentation URL.
pub const DEFAULT_URL_MARKER: &str = "MINERR_URL";

/// The production template bundled with the tool.
pub const BUILTIN_TEMPLATE: &str = include_str!("templates/minErr.tpl.js");

lazy_static! {
    static ref DEFAULT_MARKER: Regex = Regex::new(DEFAULT_URL_MARKER).unwrap();
}

/// Loads the production template and binds it to a documentation URL.
#[derive(Debug, Clone)]
pub struct ProductionTemplate {
    /// Template file, or `None` for [`BUILTIN_TEMPLATE`].
    path: Option<PathBuf>,
    marker: Regex,
    docs_url: String,
}

impl ProductionTemplate {
    /// Create a loader.
    ///
    /// Fails with a configuration error when `marker` is not a valid regex.
    pub fn new(path: Option<PathBuf>, marker: &str, docs_url: impl Into<String>) -> Result<Self> {
        let marker = Regex::new(marker).map_err(|e| {
            StripError::Configuration(format!("invalid url_replacement pattern {:?}: {}", marker, e))
        })?;
        Ok(Self {
            path,
            marker,
            docs_url: docs_url.into(),
        })
    }

    /// Loader for the bundled template with the default marker.
    pub fn builtin(docs_url: impl Into<String>) -> Self {
        Self {
            path: None,
            marker: DEFAULT_MARKER.clone(),
            docs_url: docs_url.into(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn docs_url(&self) -> &str {
        &self.docs_url
    }

    /// The template text before substitution.
    pub fn raw_source(&self) -> Result<Cow<'static, str>> {
        match &self.path {
            None => Ok(Cow::Borrowed(BUILTIN_TEMPLATE)),
            Some(path) => fs::read_to_string(path)
                .map(Cow::Owned)
                .map_err(|source| StripError::ResourceMissing {
                    path: path.clone(),
                    source,
                }),
        }
    }

    /// The template text with every marker replaced by the documentation URL.
    pub fn load(&self) -> Result<String> {
        let raw = self.raw_source()?;
        Ok(substitute_url(&raw, &self.marker, &self.docs_url))
    }
}

/// Replace every match of `marker` in `source` with `url`.
///
/// `url` is inserted literally; `$` in it is not a capture reference.
pub fn substitute_url(source: &str, marker: &Regex, url: &str) -> String {
    marker.replace_all(source, NoExpand(url)).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_builtin_template_substitution() {
        let template = ProductionTemplate::builtin("http://docs.example.com");
        let source = template.load().unwrap();

        assert!(source.contains("'http://docs.example.com'"));
        assert!(!source.contains(DEFAULT_URL_MARKER));
        assert_eq!(
            source,
            BUILTIN_TEMPLATE.replace(DEFAULT_URL_MARKER, "http://docs.example.com")
        );
    }

    #[test]
    fn test_every_marker_is_replaced() {
        let marker = Regex::new(DEFAULT_URL_MARKER).unwrap();
        let source = "var a = 'MINERR_URL';\nvar b = 'MINERR_URL' + x;\n";

        let result = substitute_url(source, &marker, "http://docs.example.com");

        assert_eq!(
            result,
            "var a = 'http://docs.example.com';\nvar b = 'http://docs.example.com' + x;\n"
        );
    }

    #[test]
    fn test_url_is_inserted_literally() {
        let marker = Regex::new("URL").unwrap();
        assert_eq!(substitute_url("<URL>", &marker, "http://x/$1"), "<http://x/$1>");
    }

    #[test]
    fn test_template_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "function minErr(m) {{ return '@DOCS@'; }}").unwrap();

        let template =
            ProductionTemplate::new(Some(file.path().to_path_buf()), "@DOCS@", "https://e.io/")
                .unwrap();

        assert_eq!(
            template.load().unwrap(),
            "function minErr(m) { return 'https://e.io/'; }"
        );
    }

    #[test]
    fn test_missing_template_file() {
        let template = ProductionTemplate::new(
            Some(PathBuf::from("/nonexistent/minErr.tpl.js")),
            DEFAULT_URL_MARKER,
            "http://docs.example.com",
        )
        .unwrap();

        match template.load() {
            Err(StripError::ResourceMissing { path, .. }) => {
                assert_eq!(path, PathBuf::from("/nonexistent/minErr.tpl.js"));
            }
            other => panic!("expected ResourceMissing, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_marker_is_configuration_error() {
        let result = ProductionTemplate::new(None, "(unclosed", "http://docs.example.com");
        assert!(matches!(result, Err(StripError::Configuration(_))));
    }
}
