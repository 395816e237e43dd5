//! The cached production factory and factory-definition matching.
//!
//! [`FactoryCache`] parses the production template once per tool instance.
//! The resulting [`FactoryReference`] is read-only: splicing it into a module
//! goes through [`FactoryReference::copy_text`].

use once_cell::unsync::OnceCell;
use streaming_iterator::StreamingIterator;
use tree_sitter::{Node, Query, QueryCursor};

use crate::error::{Result, StripError, ORIGIN_TEMPLATE};
use crate::parser::{JsParser, ModuleTree};
use crate::template::ProductionTemplate;

/// Tree-sitter query for top-level function declarations.
///
/// Anchored under `program` so nested functions never match.
const DEFINITION_QUERY: &str = r#"
(program
  (function_declaration
    name: (identifier)) @definition)
"#;

/// Node kinds for function values.
pub(crate) fn is_function_value(kind: &str) -> bool {
    matches!(
        kind,
        "function_expression" | "function" | "arrow_function" | "generator_function"
    )
}

/// Strip any number of enclosing parentheses.
pub(crate) fn unwrap_parens(mut node: Node) -> Node {
    while node.kind() == "parenthesized_expression" {
        match node.named_child(0) {
            Some(inner) => node = inner,
            None => break,
        }
    }
    node
}

/// The structural shape that identifies a factory definition.
///
/// Two definitions with equal skeletons implement the same convention,
/// whatever their bodies say and whatever URL they embed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactorySkeleton {
    /// Declared function name.
    pub name: String,
    /// Number of formal parameters.
    pub arity: usize,
    /// Whether a top-level `return` of the body returns a function.
    pub returns_function: bool,
}

impl FactorySkeleton {
    /// Derive the skeleton of a `function_declaration` node.
    pub fn of(node: Node, source: &str) -> Option<Self> {
        if node.kind() != "function_declaration" {
            return None;
        }

        let name = node
            .child_by_field_name("name")?
            .utf8_text(source.as_bytes())
            .ok()?
            .to_string();

        let params = node.child_by_field_name("parameters")?;
        let mut cursor = params.walk();
        let arity = params
            .named_children(&mut cursor)
            .filter(|p| p.kind() != "comment")
            .count();

        let body = node.child_by_field_name("body")?;
        let mut cursor = body.walk();
        let returns_function = body
            .named_children(&mut cursor)
            .filter(|stmt| stmt.kind() == "return_statement")
            .any(|stmt| {
                stmt.named_child(0)
                    .map(|value| is_function_value(unwrap_parens(value).kind()))
                    .unwrap_or(false)
            });

        Some(Self {
            name,
            arity,
            returns_function,
        })
    }
}

/// The parsed production factory with the documentation URL baked in.
pub struct FactoryReference {
    skeleton: FactorySkeleton,
    text: String,
    query: Query,
}

impl FactoryReference {
    /// Parse production source and keep the text of its top-level function
    /// definition.
    ///
    /// The source must parse cleanly and declare at least one top-level
    /// function; the first one is the factory.
    pub fn from_source(parser: &JsParser, source: String) -> Result<Self> {
        let query = Query::new(parser.language(), DEFINITION_QUERY)?;
        let module = parser.parse(source, ORIGIN_TEMPLATE)?;

        let definitions = find_definitions(&query, &module);
        if definitions.len() > 1 {
            tracing::warn!(
                "Production template declares {} top-level functions, using the first",
                definitions.len()
            );
        }

        let node = definitions.first().copied().ok_or(StripError::Syntax {
            origin: ORIGIN_TEMPLATE,
            line: 1,
            column: 1,
            message: "no top-level function declaration".to_string(),
        })?;

        let skeleton = FactorySkeleton::of(node, module.source()).ok_or(StripError::Syntax {
            origin: ORIGIN_TEMPLATE,
            line: node.start_position().row + 1,
            column: node.start_position().column + 1,
            message: "incomplete function declaration".to_string(),
        })?;

        let text = module.node_text(node).to_string();

        Ok(Self {
            skeleton,
            text,
            query,
        })
    }

    pub fn skeleton(&self) -> &FactorySkeleton {
        &self.skeleton
    }

    /// Name under which modules reach the factory.
    pub fn name(&self) -> &str {
        &self.skeleton.name
    }

    /// A structural copy of the definition, ready to splice into a module.
    pub fn copy_text(&self) -> String {
        self.text.clone()
    }

    /// Whether `node` is a re-definition of this factory.
    pub fn matches(&self, node: Node, source: &str) -> bool {
        FactorySkeleton::of(node, source).as_ref() == Some(&self.skeleton)
    }

    /// Top-level function declarations of `module`, in source order.
    pub fn find_definitions<'t>(&self, module: &'t ModuleTree) -> Vec<Node<'t>> {
        find_definitions(&self.query, module)
    }
}

fn find_definitions<'t>(query: &Query, module: &'t ModuleTree) -> Vec<Node<'t>> {
    let Some(definition) = query.capture_index_for_name("definition") else {
        return vec![];
    };

    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(query, module.root(), module.source().as_bytes());

    let mut nodes = Vec::new();
    while let Some(m) = matches.next() {
        for capture in m.captures {
            if capture.index == definition {
                nodes.push(capture.node);
            }
        }
    }

    nodes.sort_by_key(|n| n.start_byte());
    nodes.dedup_by_key(|n| n.id());
    nodes
}

/// Memoization cell for the [`FactoryReference`] of one tool instance.
///
/// Filled on first use; two tool instances never share a cell, so different
/// documentation URLs cannot leak into each other's output.
#[derive(Default)]
pub struct FactoryCache {
    cell: OnceCell<FactoryReference>,
}

impl FactoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the factory, loading and parsing the template on first call.
    pub fn get(&self, parser: &JsParser, template: &ProductionTemplate) -> Result<&FactoryReference> {
        self.cell.get_or_try_init(|| {
            let source = template.load()?;
            let factory = FactoryReference::from_source(parser, source)?;
            tracing::debug!(
                "Loaded production factory '{}' ({} params)",
                factory.name(),
                factory.skeleton().arity
            );
            Ok(factory)
        })
    }

    /// Whether the template has been loaded.
    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ORIGIN_MODULE;
    use std::path::PathBuf;

    fn factory() -> FactoryReference {
        let source = ProductionTemplate::builtin("http://docs.example.com")
            .load()
            .unwrap();
        FactoryReference::from_source(&JsParser::new(), source).unwrap()
    }

    #[test]
    fn test_builtin_skeleton() {
        let factory = factory();
        assert_eq!(
            factory.skeleton(),
            &FactorySkeleton {
                name: "minErr".to_string(),
                arity: 1,
                returns_function: true,
            }
        );
        assert!(factory.copy_text().starts_with("function minErr( module ) {"));
        assert!(factory.copy_text().ends_with('}'));
        assert!(factory.copy_text().contains("'http://docs.example.com'"));
    }

    #[test]
    fn test_matches_bulky_definition() {
        let factory = factory();
        let module = JsParser::new()
            .parse(
                r#"
function minErr(namespace) {
  var docs = 'http://old.example.com/';
  return function (code, template) {
    return new Error('[' + namespace + ':' + code + '] ' + template + '\n' + docs + code);
  };
}
"#,
                ORIGIN_MODULE,
            )
            .unwrap();

        let definitions = factory.find_definitions(&module);
        assert_eq!(definitions.len(), 1);
        assert!(factory.matches(definitions[0], module.source()));
    }

    #[test]
    fn test_rejects_other_shapes() {
        let factory = factory();
        let module = JsParser::new()
            .parse(
                r#"
function minErr(a, b) { return function () {}; }
function minErr2(a) { return function () {}; }
function minErr(a) { return 42; }
(function () {
  function minErr(module) { return function () {}; }
}());
"#,
                ORIGIN_MODULE,
            )
            .unwrap();

        let definitions = factory.find_definitions(&module);
        assert_eq!(definitions.len(), 3, "nested declarations are not candidates");
        assert!(definitions
            .iter()
            .all(|d| !factory.matches(*d, module.source())));
    }

    #[test]
    fn test_parenthesized_arrow_return() {
        let module = JsParser::new()
            .parse("function minErr(m) { return ((code) => new Error(code)); }", ORIGIN_MODULE)
            .unwrap();
        let node = module.root().named_child(0).unwrap();
        let skeleton = FactorySkeleton::of(node, module.source()).unwrap();
        assert!(skeleton.returns_function);
    }

    #[test]
    fn test_cache_loads_once() {
        let cache = FactoryCache::new();
        let parser = JsParser::new();
        let template = ProductionTemplate::builtin("http://docs.example.com");
        assert!(!cache.is_loaded());

        let first = cache.get(&parser, &template).unwrap() as *const FactoryReference;
        let second = cache.get(&parser, &template).unwrap() as *const FactoryReference;

        assert!(cache.is_loaded());
        assert_eq!(first, second, "second call must reuse the cached factory");
    }

    #[test]
    fn test_cache_propagates_missing_template() {
        let cache = FactoryCache::new();
        let template = ProductionTemplate::new(
            Some(PathBuf::from("/nonexistent/tpl.js")),
            "MINERR_URL",
            "http://docs.example.com",
        )
        .unwrap();

        let result = cache.get(&JsParser::new(), &template);
        assert!(matches!(result, Err(StripError::ResourceMissing { .. })));
        assert!(!cache.is_loaded());
    }

    #[test]
    fn test_template_without_function_is_syntax_error() {
        let result = FactoryReference::from_source(&JsParser::new(), "var x = 1;".to_string());
        assert!(matches!(
            result,
            Err(StripError::Syntax { origin: ORIGIN_TEMPLATE, .. })
        ));
    }

    #[test]
    fn test_unparsable_template_is_syntax_error() {
        let result =
            FactoryReference::from_source(&JsParser::new(), "function minErr( {".to_string());
        assert!(matches!(result, Err(StripError::Syntax { .. })));
    }
}
