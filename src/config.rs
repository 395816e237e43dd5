//! Options for a strip tool instance.
//!
//! Options can be built in code or read from a YAML file:
//!
//! ```yaml
//! docs_url: "http://docs.example.com/error/"
//! config_dest: "build/errors.json"
//! production_template: "tools/minErr.tpl.js"
//! url_replacement: "MINERR_URL"
//! parsed_file_format:
//!   indent:
//!     style: "  "
//!     base: 0
//! config_details:
//!   version: "1.2.0"
//! excluded_paths:
//!   - "**/vendor/**"
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StripError};
use crate::parser::Format;
use crate::template::{ProductionTemplate, DEFAULT_URL_MARKER};

/// Options for [`crate::MinErrStrip`].
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripOptions {
    /// Base URL for error documentation, substituted into the production factory.
    #[serde(default)]
    pub docs_url: String,
    /// Where the error config JSON is written.
    #[serde(default)]
    pub config_dest: PathBuf,
    /// Production template file. Defaults to the bundled template.
    #[serde(default)]
    pub production_template: Option<PathBuf>,
    /// Regex matching the URL marker in the production template.
    #[serde(default = "default_url_replacement")]
    pub url_replacement: String,
    /// Output formatting for spliced code.
    #[serde(default)]
    pub parsed_file_format: Format,
    /// Extra top-level entries of the error config document.
    #[serde(default = "default_config_details")]
    pub config_details: BTreeMap<String, serde_json::Value>,
    /// Glob patterns for paths to skip when collecting modules (e.g., "**/vendor/**")
    #[serde(default)]
    pub excluded_paths: Vec<String>,
}

fn default_url_replacement() -> String {
    DEFAULT_URL_MARKER.to_string()
}

fn default_config_details() -> BTreeMap<String, serde_json::Value> {
    let mut details = BTreeMap::new();
    details.insert(
        "generated".to_string(),
        serde_json::Value::String(chrono::Local::now().to_rfc2822()),
    );
    details
}

impl StripOptions {
    /// Options with the two required settings and defaults for the rest.
    pub fn new(docs_url: impl Into<String>, config_dest: impl Into<PathBuf>) -> Self {
        Self {
            docs_url: docs_url.into(),
            config_dest: config_dest.into(),
            production_template: None,
            url_replacement: default_url_replacement(),
            parsed_file_format: Format::default(),
            config_details: default_config_details(),
            excluded_paths: Vec::new(),
        }
    }

    /// Parse options from a YAML file.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            StripError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        serde_yaml::from_str(&content).map_err(|e| {
            StripError::Configuration(format!("invalid options file {}: {}", path.display(), e))
        })
    }

    pub fn with_production_template(mut self, path: impl Into<PathBuf>) -> Self {
        self.production_template = Some(path.into());
        self
    }

    pub fn with_url_replacement(mut self, pattern: impl Into<String>) -> Self {
        self.url_replacement = pattern.into();
        self
    }

    pub fn with_format(mut self, format: Format) -> Self {
        self.parsed_file_format = format;
        self
    }

    /// Add or replace one config detail.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.config_details.insert(key.into(), value.into());
        self
    }

    /// Replace all config details, including the default timestamp.
    pub fn with_details(mut self, details: BTreeMap<String, serde_json::Value>) -> Self {
        self.config_details = details;
        self
    }

    pub fn with_excluded_paths(mut self, patterns: Vec<String>) -> Self {
        self.excluded_paths = patterns;
        self
    }

    /// Check the options before a tool instance is built from them.
    pub fn validate(&self) -> Result<()> {
        if self.docs_url.trim().is_empty() {
            return Err(StripError::Configuration("docs_url is required".to_string()));
        }
        if self.config_dest.as_os_str().is_empty() {
            return Err(StripError::Configuration(
                "config_dest is required".to_string(),
            ));
        }
        if let Some(parent) = self.config_dest.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                return Err(StripError::Configuration(format!(
                    "config_dest directory {} does not exist",
                    parent.display()
                )));
            }
        }
        if self.format_style().is_empty() {
            return Err(StripError::Configuration(
                "parsed_file_format.indent.style must not be empty".to_string(),
            ));
        }
        Regex::new(&self.url_replacement).map_err(|e| {
            StripError::Configuration(format!(
                "invalid url_replacement pattern {:?}: {}",
                self.url_replacement, e
            ))
        })?;
        for pattern in &self.excluded_paths {
            globset::Glob::new(pattern).map_err(|e| {
                StripError::Configuration(format!("invalid excluded path {:?}: {}", pattern, e))
            })?;
        }
        Ok(())
    }

    fn format_style(&self) -> &str {
        &self.parsed_file_format.indent.style
    }

    /// The production template loader these options describe.
    pub fn production_template(&self) -> Result<ProductionTemplate> {
        ProductionTemplate::new(
            self.production_template.clone(),
            &self.url_replacement,
            self.docs_url.clone(),
        )
    }

    /// Check if a path should be excluded based on excluded_paths patterns.
    /// Uses globset for matching, which supports `**` for recursive directory matching.
    pub fn is_path_excluded(&self, path: &Path) -> bool {
        if self.excluded_paths.is_empty() {
            return false;
        }

        let path_str = path.to_string_lossy();

        for pattern in &self.excluded_paths {
            if let Ok(glob) = globset::Glob::new(pattern) {
                let matcher = glob.compile_matcher();
                if matcher.is_match(&*path_str) {
                    return true;
                }
            }
        }
        false
    }
}
