//! minerr-strip - build-time stripping of documented error factories.
//!
//! JavaScript libraries following the `minErr` convention ship a bulky error
//! factory and document every error site with an `@error` annotation. This
//! crate rewrites such modules for production:
//!
//! - the bulky factory definition is replaced by a minimal one that links to
//!   online documentation instead of formatting messages,
//! - every error template (namespace, code, message) is extracted into a
//!   [`TemplateStore`],
//! - documentation annotations are dropped from the output,
//! - the collected templates are flushed to a JSON document.
//!
//! # Architecture
//!
//! The codebase uses tree-sitter for AST-based analysis:
//!
//! - `parser`: JavaScript parsing and byte-range code generation
//! - `template`: Production factory loading and URL substitution
//! - `factory`: Memoized production factory and definition matching
//! - `annotation`: `@error` comment grammar
//! - `extract`: The extraction and rewrite pass
//! - `store`: Template accumulator
//! - `flush`: Error config document and its writer
//! - `config`: Options, YAML loading and validation
//! - `strip`: The tool instance tying it together
//!
//! # Example
//!
//! ```no_run
//! use minerr_strip::{MinErrStrip, StripOptions};
//!
//! # fn main() -> minerr_strip::Result<()> {
//! let mut tool = MinErrStrip::new(StripOptions::new(
//!     "http://errors.example.com/",
//!     "build/errors.json",
//! ))?;
//! let output = tool.process_module("var e = minErr('ng');\nthrow e('areq', name);\n")?;
//! tool.flush_error_config()?;
//! # Ok(())
//! # }
//! ```

pub mod annotation;
pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod factory;
pub mod flush;
pub mod parser;
pub mod store;
pub mod strip;
pub mod template;

pub use annotation::{Annotation, AnnotationError};
pub use config::StripOptions;
pub use error::{Result, StripError};
pub use extract::{ExtractedEntry, Extraction, Extractor, TemplateSource};
pub use factory::{FactoryCache, FactoryReference, FactorySkeleton};
pub use flush::{ConfigWriter, ErrorConfig, JsonFileWriter};
pub use parser::{Codegen, Format, JsParser, ModuleTree};
pub use store::{ErrorTemplates, TemplateStore};
pub use strip::MinErrStrip;
pub use template::ProductionTemplate;
