//! JavaScript parsing and code generation.
//!
//! Parsing goes through tree-sitter. Generation is byte-range splicing over
//! the original text (see [`Codegen`]), so anything the extractor leaves alone
//! is emitted exactly as it was written.

mod codegen;

pub use codegen::{Codegen, Edit, Format, Indent, Replacement, RewrittenModule};

use tree_sitter::{Language, Node, Parser as TsParser, Tree};

use crate::error::{Result, StripError};

/// Maximum number of characters of offending text quoted in syntax errors.
const ERROR_SNIPPET_LEN: usize = 24;

/// A parsed module: the source text together with its tree.
///
/// Owned by a single extraction pass and consumed when the pass produces its
/// [`RewrittenModule`].
pub struct ModuleTree {
    source: String,
    tree: Tree,
}

impl ModuleTree {
    /// The module source text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The `program` node.
    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    /// Get text for a node of this tree.
    pub fn node_text(&self, node: Node) -> &str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    /// Give up the tree and keep the text.
    pub fn into_source(self) -> String {
        self.source
    }
}

/// Tree-sitter JavaScript parser.
///
/// `tree_sitter::Parser` is not `Sync`, so a fresh one is created per parse.
pub struct JsParser {
    language: Language,
}

impl JsParser {
    pub fn new() -> Self {
        Self {
            language: tree_sitter_javascript::LANGUAGE.into(),
        }
    }

    /// The JavaScript grammar, for compiling queries.
    pub fn language(&self) -> &Language {
        &self.language
    }

    fn create_parser(&self) -> Result<TsParser> {
        let mut parser = TsParser::new();
        parser.set_language(&self.language)?;
        Ok(parser)
    }

    /// Parse module text.
    ///
    /// `origin` names the text in syntax errors. Tree-sitter recovers from
    /// malformed input by inserting ERROR and MISSING nodes; any such node
    /// makes the whole parse a [`StripError::Syntax`].
    pub fn parse(&self, source: impl Into<String>, origin: &'static str) -> Result<ModuleTree> {
        let source = source.into();
        let mut parser = self.create_parser()?;
        let tree = parser.parse(&source, None).ok_or(StripError::Syntax {
            origin,
            line: 1,
            column: 1,
            message: "parser produced no tree".to_string(),
        })?;

        let root = tree.root_node();
        if root.has_error() {
            let (line, column, message) = match first_error(root) {
                Some(node) => describe_error(node, &source),
                None => (1, 1, "malformed input".to_string()),
            };
            return Err(StripError::Syntax {
                origin,
                line,
                column,
                message,
            });
        }

        Ok(ModuleTree { source, tree })
    }
}

impl Default for JsParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Depth-first search for the first ERROR or MISSING node.
fn first_error(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    children.into_iter().find_map(first_error)
}

fn describe_error(node: Node, source: &str) -> (usize, usize, String) {
    let pos = node.start_position();
    let message = if node.is_missing() {
        format!("missing {}", node.kind())
    } else {
        let text = node.utf8_text(source.as_bytes()).unwrap_or("");
        let snippet: String = text.chars().take(ERROR_SNIPPET_LEN).collect();
        format!("unexpected {:?}", snippet)
    };
    (pos.row + 1, pos.column + 1, message)
}
