//! In-memory accumulator for extracted error templates.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// `namespace -> code -> template`. The empty namespace means "none".
pub type ErrorTemplates = BTreeMap<String, BTreeMap<String, String>>;

/// Templates collected across extraction passes.
///
/// Owned by one tool instance; `merge`, `reset` and `take` are the only
/// mutators. Ordered maps keep the flushed artifact stable between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateStore {
    errors: ErrorTemplates,
}

impl TemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert a template. Returns the template it replaced, if any.
    pub fn merge(
        &mut self,
        namespace: &str,
        code: &str,
        template: impl Into<String>,
    ) -> Option<String> {
        self.errors
            .entry(namespace.to_string())
            .or_default()
            .insert(code.to_string(), template.into())
    }

    /// Look up one template.
    pub fn get(&self, namespace: &str, code: &str) -> Option<&str> {
        self.errors
            .get(namespace)
            .and_then(|codes| codes.get(code))
            .map(String::as_str)
    }

    /// A copy of the current contents. Does not clear.
    pub fn snapshot(&self) -> ErrorTemplates {
        self.errors.clone()
    }

    /// Clear to the empty mapping.
    pub fn reset(&mut self) {
        self.errors.clear();
    }

    /// Snapshot and reset in one step.
    pub fn take(&mut self) -> ErrorTemplates {
        std::mem::take(&mut self.errors)
    }

    /// Total number of templates across namespaces.
    pub fn len(&self) -> usize {
        self.errors.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Namespaces in sorted order.
    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.errors.keys().map(String::as_str)
    }
}
