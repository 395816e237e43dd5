//! The strip tool instance.
//!
//! [`MinErrStrip`] owns everything one build pipeline needs: options, the
//! parser, the memoized production factory and the template store. Modules
//! are fed through [`MinErrStrip::process_module`] one at a time; the
//! accumulated templates leave through [`MinErrStrip::flush_error_config`].

use crate::config::StripOptions;
use crate::error::{Result, ORIGIN_MODULE};
use crate::extract::{Extraction, Extractor};
use crate::factory::{FactoryCache, FactoryReference};
use crate::flush::{ConfigWriter, ErrorConfig, JsonFileWriter};
use crate::parser::{Codegen, JsParser};
use crate::store::TemplateStore;
use crate::template::ProductionTemplate;

/// A strip tool instance.
pub struct MinErrStrip<W: ConfigWriter = JsonFileWriter> {
    options: StripOptions,
    parser: JsParser,
    codegen: Codegen,
    template: ProductionTemplate,
    factory: FactoryCache,
    store: TemplateStore,
    writer: W,
}

impl MinErrStrip<JsonFileWriter> {
    /// Create a tool instance writing compact JSON.
    ///
    /// Fails with a configuration error when the options are invalid.
    pub fn new(options: StripOptions) -> Result<Self> {
        Self::with_writer(options, JsonFileWriter::default())
    }
}

impl<W: ConfigWriter> MinErrStrip<W> {
    /// Create a tool instance with a custom write collaborator.
    pub fn with_writer(options: StripOptions, writer: W) -> Result<Self> {
        options.validate()?;
        let template = options.production_template()?;
        let codegen = Codegen::new(options.parsed_file_format.clone());

        Ok(Self {
            options,
            parser: JsParser::new(),
            codegen,
            template,
            factory: FactoryCache::new(),
            store: TemplateStore::new(),
            writer,
        })
    }

    pub fn options(&self) -> &StripOptions {
        &self.options
    }

    /// The production factory source with the documentation URL substituted.
    pub fn production_source(&self) -> Result<String> {
        self.template.load()
    }

    /// The cached production factory, loaded on first call.
    pub fn factory(&self) -> Result<&FactoryReference> {
        self.factory.get(&self.parser, &self.template)
    }

    /// Extract one module into the store without generating text.
    pub fn strip_module(&mut self, contents: &str) -> Result<Extraction> {
        let factory = self.factory.get(&self.parser, &self.template)?;
        let module = self.parser.parse(contents, ORIGIN_MODULE)?;
        Ok(Extractor::new(factory).extract(module, &mut self.store))
    }

    /// Rewrite one module and return its production text.
    ///
    /// A module that fails to parse leaves the store untouched.
    pub fn process_module(&mut self, contents: &str) -> Result<String> {
        let extraction = self.strip_module(contents)?;
        Ok(self.codegen.generate(&extraction.module))
    }

    pub fn store(&self) -> &TemplateStore {
        &self.store
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    /// Write the accumulated templates and reset the store.
    ///
    /// The store is reset before the write; a [`crate::StripError::WriteFailure`]
    /// loses the flushed templates. The returned document is the one that
    /// was handed to the writer.
    pub fn flush_error_config(&mut self) -> Result<ErrorConfig> {
        let count = self.store.len();
        let config = ErrorConfig::new(self.options.config_details.clone(), self.store.take());
        tracing::info!(
            "Flushing {} error templates in {} namespaces",
            count,
            config.errors.len()
        );
        self.writer.write(&self.options.config_dest, &config)?;
        Ok(config)
    }
}
