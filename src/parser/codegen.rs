//! Text generation from a rewritten module.
//!
//! The extractor never mutates a tree. It records byte-range [`Edit`]s against
//! the original text and [`Codegen`] splices them in, re-indenting spliced
//! blocks according to [`Format`].

use serde::{Deserialize, Serialize};

/// Indentation used for spliced blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Indent {
    /// One level of indentation (e.g. two spaces, a tab).
    #[serde(default = "default_indent_style")]
    pub style: String,
    /// Extra levels prefixed to every line.
    #[serde(default)]
    pub base: usize,
}

fn default_indent_style() -> String {
    "  ".to_string()
}

impl Default for Indent {
    fn default() -> Self {
        Self {
            style: default_indent_style(),
            base: 0,
        }
    }
}

/// Output formatting options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Format {
    #[serde(default)]
    pub indent: Indent,
}

/// What replaces an edited byte range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Replacement {
    /// Drop the range.
    Remove,
    /// Insert a multi-line block, re-indented under the output [`Format`].
    Block(String),
}

/// A single byte-range rewrite against the original source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub start: usize,
    pub end: usize,
    pub replacement: Replacement,
}

impl Edit {
    pub fn remove(start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            replacement: Replacement::Remove,
        }
    }

    pub fn block(start: usize, end: usize, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            replacement: Replacement::Block(text.into()),
        }
    }
}

/// A module after extraction: original text plus pending edits.
#[derive(Debug, Clone)]
pub struct RewrittenModule {
    source: String,
    edits: Vec<Edit>,
}

impl RewrittenModule {
    pub fn new(source: String, edits: Vec<Edit>) -> Self {
        Self { source, edits }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn edits(&self) -> &[Edit] {
        &self.edits
    }
}

/// Applies edits and formatting.
#[derive(Debug, Clone, Default)]
pub struct Codegen {
    format: Format,
}

impl Codegen {
    pub fn new(format: Format) -> Self {
        Self { format }
    }

    pub fn format(&self) -> &Format {
        &self.format
    }

    /// Generate the output text.
    ///
    /// Edits are applied in source order. An edit overlapping one already
    /// applied is skipped.
    pub fn generate(&self, module: &RewrittenModule) -> String {
        let source = module.source();
        let mut edits: Vec<&Edit> = module.edits().iter().collect();
        edits.sort_by_key(|e| (e.start, e.end));

        let mut out = String::with_capacity(source.len());
        let mut cursor = 0;

        for edit in edits {
            if edit.start < cursor || edit.end > source.len() || edit.start > edit.end {
                tracing::warn!(
                    "Skipping overlapping edit at bytes {}..{}",
                    edit.start,
                    edit.end
                );
                continue;
            }
            out.push_str(&source[cursor..edit.start]);
            match &edit.replacement {
                Replacement::Remove => {}
                Replacement::Block(text) => {
                    out.push_str(&self.reindent(text, line_indent(source, edit.start)))
                }
            }
            cursor = edit.end;
        }

        out.push_str(&source[cursor..]);
        out
    }

    /// Re-indent a block.
    ///
    /// The block's own unit is the smallest non-zero leading width; each unit
    /// becomes one `style`. Lines after the first also get `prefix`, the
    /// indentation of the line the block is spliced into.
    fn reindent(&self, text: &str, prefix: &str) -> String {
        let unit = indent_unit(text);
        let style = &self.format.indent.style;
        let base = style.repeat(self.format.indent.base);

        let mut out = String::with_capacity(text.len());
        for (i, line) in text.lines().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            let content = line.trim_start_matches([' ', '\t']);
            if content.trim().is_empty() {
                continue;
            }
            let width = line.len() - content.len();
            if i > 0 {
                out.push_str(prefix);
            }
            out.push_str(&base);
            out.push_str(&style.repeat(width / unit));
            out.push_str(&" ".repeat(width % unit));
            out.push_str(content);
        }
        out
    }
}

/// Smallest non-zero leading whitespace width in `text`, or 1.
fn indent_unit(text: &str) -> usize {
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start_matches([' ', '\t']).len())
        .filter(|w| *w > 0)
        .min()
        .unwrap_or(1)
}

/// Leading whitespace of the line containing byte `pos`, up to `pos`.
fn line_indent(source: &str, pos: usize) -> &str {
    let line_start = source[..pos].rfind('\n').map_or(0, |i| i + 1);
    let line = &source[line_start..pos];
    let content = line.trim_start_matches([' ', '\t']);
    &line[..line.len() - content.len()]
}
