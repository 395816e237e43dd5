//! Error template extraction and module rewriting.
//!
//! A single depth-first pass over a module:
//!
//! 1. The first top-level re-definition of the error factory is replaced by
//!    a copy of the cached production factory.
//! 2. Calls of the factory with a literal namespace bind the receiving
//!    identifier to that namespace.
//! 3. Calls through a bound identifier whose first argument is a string
//!    literal are error sites. Their template comes from an `@error`
//!    annotation, an inline template argument, or the arguments themselves.
//! 4. Each template is merged into the [`TemplateStore`]; annotations and
//!    inline templates are dropped from the output.
//!
//! Calls that do not resolve to a namespace are left byte-for-byte intact.

mod literal;
mod scope;

pub use literal::{decode_escapes, string_value};
pub use scope::{Binding, Scopes};

use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;
use tree_sitter::Node;

use crate::annotation::{self, Annotation};
use crate::factory::{unwrap_parens, FactoryReference};
use crate::parser::{Edit, ModuleTree, RewrittenModule};
use crate::store::TemplateStore;

lazy_static! {
    /// A positional placeholder such as `{0}`.
    static ref PLACEHOLDER: Regex = Regex::new(r"\{\d+\}").unwrap();
}

/// Parents whose children are statements. Annotation lookup stops here.
const STATEMENT_LISTS: &[&str] = &[
    "program",
    "statement_block",
    "switch_case",
    "switch_default",
    "class_body",
];

/// Nodes that open a new function scope.
fn is_function_boundary(kind: &str) -> bool {
    matches!(
        kind,
        "function_expression"
            | "function"
            | "generator_function"
            | "arrow_function"
            | "method_definition"
    )
}

/// How a declarator introduces its names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Declaration {
    /// `var`: the nearest function scope.
    Var,
    /// `let`, `const`, parameters: the innermost scope.
    Lexical,
}

impl Declaration {
    fn of(declarator: Node) -> Self {
        match declarator.parent().map(|p| p.kind()) {
            Some("lexical_declaration") => Declaration::Lexical,
            _ => Declaration::Var,
        }
    }
}

/// Where an extracted template came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateSource {
    /// An `@error` comment before the statement.
    Annotation,
    /// A string literal argument carrying `{N}` placeholders.
    Inline,
    /// Folded from the call's trailing arguments.
    Arguments,
}

/// Location of an error site in its module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub start_byte: usize,
    pub end_byte: usize,
    /// 1-indexed.
    pub line: usize,
    /// 1-indexed.
    pub column: usize,
}

impl Span {
    fn from_node(node: Node) -> Self {
        let start = node.start_position();
        Self {
            start_byte: node.start_byte(),
            end_byte: node.end_byte(),
            line: start.row + 1,
            column: start.column + 1,
        }
    }
}

/// One matched error site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedEntry {
    pub namespace: String,
    pub code: String,
    pub template: String,
    pub source: TemplateSource,
    pub span: Span,
}

/// Result of extracting one module.
#[derive(Debug)]
pub struct Extraction {
    /// The module with its pending rewrites.
    pub module: RewrittenModule,
    /// Error sites in source order.
    pub entries: Vec<ExtractedEntry>,
    /// Whether a factory definition was replaced.
    pub factory_rewritten: bool,
}

/// Extracts error templates from modules and rewrites them.
pub struct Extractor<'f> {
    factory: &'f FactoryReference,
}

impl<'f> Extractor<'f> {
    pub fn new(factory: &'f FactoryReference) -> Self {
        Self { factory }
    }

    /// Extract every error site of `module` into `store` and rewrite it.
    ///
    /// Never fails: shapes that are not recognised pass through untouched.
    pub fn extract(&self, module: ModuleTree, store: &mut TemplateStore) -> Extraction {
        let (edits, entries, factory_rewritten) = {
            let mut pass = Pass::new(self.factory, &module, store);
            pass.run();
            (pass.edits, pass.entries, pass.factory_rewritten)
        };

        Extraction {
            module: RewrittenModule::new(module.into_source(), edits),
            entries,
            factory_rewritten,
        }
    }
}

/// State of one extraction pass.
struct Pass<'a> {
    factory: &'a FactoryReference,
    module: &'a ModuleTree,
    store: &'a mut TemplateStore,
    scopes: Scopes,
    /// Ids of top-level definitions matching the factory skeleton.
    definitions: Vec<usize>,
    removed_comments: HashSet<usize>,
    edits: Vec<Edit>,
    entries: Vec<ExtractedEntry>,
    factory_rewritten: bool,
}

impl<'a> Pass<'a> {
    fn new(
        factory: &'a FactoryReference,
        module: &'a ModuleTree,
        store: &'a mut TemplateStore,
    ) -> Self {
        let definitions = factory
            .find_definitions(module)
            .into_iter()
            .filter(|node| factory.matches(*node, module.source()))
            .map(|node| node.id())
            .collect();

        let mut scopes = Scopes::new();
        // modules may use a factory defined elsewhere
        scopes.declare(factory.name(), Binding::Factory);

        Self {
            factory,
            module,
            store,
            scopes,
            definitions,
            removed_comments: HashSet::new(),
            edits: Vec::new(),
            entries: Vec::new(),
            factory_rewritten: false,
        }
    }

    fn run(&mut self) {
        let module: &'a ModuleTree = self.module;
        let root = module.root();
        self.hoist(root);
        self.visit_children(root);
    }

    fn text(&self, node: Node) -> &'a str {
        let module: &'a ModuleTree = self.module;
        module.node_text(node)
    }

    fn visit(&mut self, node: Node<'a>) {
        match node.kind() {
            "comment" => {}
            "function_declaration" | "generator_function_declaration" => {
                self.visit_function_declaration(node)
            }
            kind if is_function_boundary(kind) => self.visit_function(node),
            "class_declaration" => {
                if let Some(name) = node.child_by_field_name("name") {
                    let name = self.text(name);
                    self.scopes.declare(name, Binding::Opaque);
                }
                self.visit_children(node);
            }
            "statement_block" | "switch_body" | "for_statement" => {
                self.scopes.push_block();
                self.visit_children(node);
                self.scopes.pop();
            }
            "for_in_statement" => self.visit_for_in(node),
            "catch_clause" => self.visit_catch(node),
            "variable_declarator" => self.visit_declarator(node),
            "assignment_expression" => self.visit_assignment(node),
            "call_expression" => {
                self.visit_call(node);
                self.visit_children(node);
            }
            _ => self.visit_children(node),
        }
    }

    fn visit_children(&mut self, node: Node<'a>) {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            self.visit(child);
        }
    }

    fn visit_function_declaration(&mut self, node: Node<'a>) {
        let name = node.child_by_field_name("name").map(|n| self.text(n));

        if self.definitions.contains(&node.id()) {
            let factory: &'a FactoryReference = self.factory;
            let name = name.unwrap_or(factory.name());
            self.scopes.declare(name, Binding::Factory);
            let line = node.start_position().row + 1;

            if self.factory_rewritten {
                tracing::warn!(
                    "Ignoring additional definition of '{}' at line {}; only the first is replaced",
                    name,
                    line
                );
            } else {
                tracing::debug!("Replacing factory definition '{}' at line {}", name, line);
                self.edits.push(Edit::block(
                    node.start_byte(),
                    node.end_byte(),
                    self.factory.copy_text(),
                ));
                self.factory_rewritten = true;
            }
            return;
        }

        if let Some(name) = name {
            self.scopes.declare(name, Binding::Opaque);
        }
        self.visit_function(node);
    }

    fn visit_function(&mut self, node: Node<'a>) {
        self.scopes.push_function();

        if matches!(
            node.kind(),
            "function_expression" | "function" | "generator_function"
        ) {
            if let Some(name) = node.child_by_field_name("name") {
                let name = self.text(name);
                self.scopes.declare(name, Binding::Opaque);
            }
        }

        if let Some(params) = node
            .child_by_field_name("parameters")
            .or_else(|| node.child_by_field_name("parameter"))
        {
            self.declare_pattern(params, Declaration::Lexical);
        }

        if let Some(body) = node.child_by_field_name("body") {
            if body.kind() == "statement_block" {
                self.hoist(body);
                self.visit_children(body);
            } else {
                self.visit(body);
            }
        }

        self.scopes.pop();
    }

    fn visit_catch(&mut self, node: Node<'a>) {
        self.scopes.push_block();
        if let Some(param) = node.child_by_field_name("parameter") {
            self.declare_pattern(param, Declaration::Lexical);
        }
        if let Some(body) = node.child_by_field_name("body") {
            self.visit_children(body);
        }
        self.scopes.pop();
    }

    /// `for (x in y)`, `for (const x of y)` and friends.
    fn visit_for_in(&mut self, node: Node<'a>) {
        if let Some(right) = node.child_by_field_name("right") {
            self.visit(right);
        }

        self.scopes.push_block();
        if let Some(left) = node.child_by_field_name("left") {
            match node.child_by_field_name("kind").map(|k| k.kind()) {
                Some("var") => self.declare_pattern(left, Declaration::Var),
                Some(_) => self.declare_pattern(left, Declaration::Lexical),
                None if left.kind() == "identifier" => {
                    let name = self.text(left);
                    self.scopes.assign(name, Binding::Opaque);
                }
                None => self.visit(left),
            }
        }
        if let Some(body) = node.child_by_field_name("body") {
            if body.kind() == "statement_block" {
                self.visit_children(body);
            } else {
                self.visit(body);
            }
        }
        self.scopes.pop();
    }

    /// Declare every identifier bound by a parameter or destructuring pattern.
    fn declare_pattern(&mut self, node: Node<'a>, declaration: Declaration) {
        let mut names = Vec::new();
        self.pattern_names(node, &mut names);
        for name in names {
            match declaration {
                Declaration::Var => self.scopes.declare_var(name, Binding::Opaque),
                Declaration::Lexical => self.scopes.declare(name, Binding::Opaque),
            }
        }
    }

    fn pattern_names(&self, node: Node<'a>, names: &mut Vec<&'a str>) {
        match node.kind() {
            "identifier" | "shorthand_property_identifier_pattern" => names.push(self.text(node)),
            "assignment_pattern" | "object_assignment_pattern" => {
                if let Some(left) = node.child_by_field_name("left") {
                    self.pattern_names(left, names);
                }
            }
            "pair_pattern" => {
                if let Some(value) = node.child_by_field_name("value") {
                    self.pattern_names(value, names);
                }
            }
            "formal_parameters" | "object_pattern" | "array_pattern" | "rest_pattern" => {
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    self.pattern_names(child, names);
                }
            }
            _ => {}
        }
    }

    fn visit_declarator(&mut self, node: Node<'a>) {
        let value = node.child_by_field_name("value");
        if let Some(value) = value {
            self.visit(value);
        }

        let Some(name) = node.child_by_field_name("name") else {
            return;
        };
        let declaration = Declaration::of(node);
        if name.kind() != "identifier" {
            self.declare_pattern(name, declaration);
            return;
        }

        let name = self.text(name);
        let binding = value.and_then(|v| self.classify(v));
        if let Some(Binding::Namespace(ns)) = &binding {
            tracing::debug!("Bound '{}' to namespace '{}'", name, ns);
        }
        match (declaration, binding, value) {
            (Declaration::Lexical, binding, _) => {
                self.scopes.declare(name, binding.unwrap_or(Binding::Opaque))
            }
            (Declaration::Var, Some(binding), _) => self.scopes.declare_var(name, binding),
            (Declaration::Var, None, Some(_)) => self.scopes.declare_var(name, Binding::Opaque),
            (Declaration::Var, None, None) => self.scopes.hoist_var(name),
        }
    }

    fn visit_assignment(&mut self, node: Node<'a>) {
        let right = node.child_by_field_name("right");
        if let Some(right) = right {
            self.visit(right);
        }

        let Some(left) = node.child_by_field_name("left") else {
            return;
        };
        if left.kind() == "identifier" {
            let name = self.text(left);
            let binding = right
                .and_then(|r| self.classify(r))
                .unwrap_or(Binding::Opaque);
            self.scopes.assign(name, binding);
        } else {
            self.visit(left);
        }
    }

    /// Record the bindings a function body or the program establishes before
    /// any of its statements run.
    ///
    /// Function declarations directly in `body` are bound first. Then every
    /// `var` in `body` outside nested functions is declared, bound to its
    /// namespace when its initializer is a factory call or alias. Plain
    /// assignments of factory calls are recorded the same way. `let`, `const`
    /// and `class` are left to the walk.
    fn hoist(&mut self, body: Node<'a>) {
        let mut cursor = body.walk();
        let statements: Vec<Node<'a>> = body.named_children(&mut cursor).collect();

        for statement in &statements {
            if !matches!(
                statement.kind(),
                "function_declaration" | "generator_function_declaration"
            ) {
                continue;
            }
            if let Some(name) = statement.child_by_field_name("name") {
                let binding = if self.definitions.contains(&statement.id()) {
                    Binding::Factory
                } else {
                    Binding::Opaque
                };
                let name = self.text(name);
                self.scopes.declare(name, binding);
            }
        }

        let mut lexical = Vec::new();
        for statement in statements {
            self.hoist_from(statement, &mut lexical);
        }
    }

    /// `lexical` holds the names declared with `let`, `const` or `class` in
    /// the blocks enclosing `node`; assignments to them are not hoisted.
    fn hoist_from(&mut self, node: Node<'a>, lexical: &mut Vec<Vec<&'a str>>) {
        match node.kind() {
            kind if is_function_boundary(kind) => {}
            "function_declaration" | "generator_function_declaration" | "class_body" => {}
            "variable_declaration" => {
                let mut cursor = node.walk();
                let declarators: Vec<Node<'a>> = node.named_children(&mut cursor).collect();
                for declarator in declarators {
                    self.hoist_declarator(declarator, lexical);
                }
            }
            "assignment_expression" => {
                let (Some(left), Some(right)) = (
                    node.child_by_field_name("left"),
                    node.child_by_field_name("right"),
                ) else {
                    return;
                };
                self.hoist_from(right, lexical);
                if left.kind() != "identifier" {
                    return;
                }
                let name = self.text(left);
                if lexical.iter().any(|names| names.contains(&name)) {
                    return;
                }
                if let Some(binding) = self.classify(right) {
                    self.scopes.assign(name, binding);
                }
            }
            "statement_block" | "switch_body" | "for_statement" | "for_in_statement" => {
                lexical.push(self.lexical_names(node));
                self.hoist_children(node, lexical);
                lexical.pop();
            }
            _ => self.hoist_children(node, lexical),
        }
    }

    fn hoist_children(&mut self, node: Node<'a>, lexical: &mut Vec<Vec<&'a str>>) {
        let mut cursor = node.walk();
        let children: Vec<Node<'a>> = node.named_children(&mut cursor).collect();
        for child in children {
            self.hoist_from(child, lexical);
        }
    }

    fn hoist_declarator(&mut self, declarator: Node<'a>, lexical: &mut Vec<Vec<&'a str>>) {
        let value = declarator.child_by_field_name("value");
        if let Some(value) = value {
            self.hoist_from(value, lexical);
        }
        let Some(name) = declarator.child_by_field_name("name") else {
            return;
        };
        if name.kind() != "identifier" {
            let mut names = Vec::new();
            self.pattern_names(name, &mut names);
            for name in names {
                self.scopes.hoist_var(name);
            }
            return;
        }

        let name = self.text(name);
        match value.and_then(|v| self.classify(v)) {
            Some(binding) => self.scopes.declare_var(name, binding),
            None => self.scopes.hoist_var(name),
        }
    }

    /// Names a block-like node declares with `let`, `const` or `class`.
    fn lexical_names(&self, node: Node<'a>) -> Vec<&'a str> {
        let mut names = Vec::new();
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "lexical_declaration" => {
                    let mut inner = child.walk();
                    for declarator in child.named_children(&mut inner) {
                        if let Some(name) = declarator.child_by_field_name("name") {
                            self.pattern_names(name, &mut names);
                        }
                    }
                }
                "class_declaration" => {
                    if let Some(name) = child.child_by_field_name("name") {
                        names.push(self.text(name));
                    }
                }
                "switch_case" | "switch_default" => names.extend(self.lexical_names(child)),
                _ => {}
            }
        }
        if node.kind() == "for_in_statement"
            && node
                .child_by_field_name("kind")
                .is_some_and(|k| k.kind() != "var")
        {
            if let Some(left) = node.child_by_field_name("left") {
                self.pattern_names(left, &mut names);
            }
        }
        names
    }

    /// What binding an initializer produces, if it is one we track.
    fn classify(&self, expr: Node<'a>) -> Option<Binding> {
        let expr = unwrap_parens(expr);
        match expr.kind() {
            "identifier" => self.scopes.resolve(self.text(expr)).cloned(),
            "call_expression" => self.factory_call_namespace(expr).map(Binding::Namespace),
            _ => None,
        }
    }

    /// The namespace of a factory call: `minErr('ns')`, or `""` for `minErr()`.
    fn factory_call_namespace(&self, call: Node<'a>) -> Option<String> {
        let callee = unwrap_parens(call.child_by_field_name("function")?);
        if callee.kind() != "identifier"
            || self.scopes.resolve(self.text(callee)) != Some(&Binding::Factory)
        {
            return None;
        }

        match self.arguments(call)?.as_slice() {
            [] => Some(String::new()),
            [namespace] => string_value(unwrap_parens(*namespace), self.module.source()),
            _ => None,
        }
    }

    /// The namespace an error-site callee resolves to.
    fn callee_namespace(&self, callee: Node<'a>) -> Option<String> {
        let callee = unwrap_parens(callee);
        match callee.kind() {
            "identifier" => match self.scopes.resolve(self.text(callee)) {
                Some(Binding::Namespace(ns)) => Some(ns.clone()),
                _ => None,
            },
            "call_expression" => self.factory_call_namespace(callee),
            _ => None,
        }
    }

    fn arguments(&self, call: Node<'a>) -> Option<Vec<Node<'a>>> {
        let args = call.child_by_field_name("arguments")?;
        if args.kind() != "arguments" {
            return None;
        }
        let mut cursor = args.walk();
        let nodes = args
            .named_children(&mut cursor)
            .filter(|n| n.kind() != "comment")
            .collect();
        Some(nodes)
    }

    fn visit_call(&mut self, call: Node<'a>) {
        let Some(callee) = call.child_by_field_name("function") else {
            return;
        };
        let Some(namespace) = self.callee_namespace(callee) else {
            return;
        };
        let Some(args) = self.arguments(call) else {
            return;
        };
        let Some((first, rest)) = args.split_first() else {
            return;
        };
        let module: &'a ModuleTree = self.module;
        let source = module.source();
        let Some(code) = string_value(unwrap_parens(*first), source) else {
            return;
        };

        let inline = rest.first().and_then(|arg| {
            string_value(unwrap_parens(*arg), source)
                .filter(|value| PLACEHOLDER.is_match(value))
                .map(|value| (*arg, value))
        });
        if let Some((arg, _)) = &inline {
            // runtime parameters must line up with the placeholders
            self.edits.push(Edit::remove(first.end_byte(), arg.end_byte()));
        }

        let (template, origin) = if let Some((annotation, comment)) =
            self.find_annotation(call, &namespace, &code)
        {
            self.remove_comment(comment);
            (annotation.template(), TemplateSource::Annotation)
        } else if let Some((_, value)) = inline {
            (value, TemplateSource::Inline)
        } else {
            (self.fold_arguments(rest), TemplateSource::Arguments)
        };

        tracing::debug!(
            "Extracted {}:{} = {:?} ({:?})",
            namespace,
            code,
            template,
            origin
        );
        self.store.merge(&namespace, &code, template.clone());
        self.entries.push(ExtractedEntry {
            namespace,
            code,
            template,
            source: origin,
            span: Span::from_node(call),
        });
    }

    /// Literal arguments verbatim, others as `{position}`, space separated.
    fn fold_arguments(&self, args: &[Node<'a>]) -> String {
        let source = self.module.source();
        args.iter()
            .enumerate()
            .map(|(i, arg)| {
                string_value(unwrap_parens(*arg), source).unwrap_or_else(|| format!("{{{}}}", i))
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Find the annotation documenting this call.
    ///
    /// Looks at the comments directly preceding the call and each of its
    /// ancestors up to the statement that sits in a statement list.
    fn find_annotation(
        &self,
        call: Node<'a>,
        namespace: &str,
        code: &str,
    ) -> Option<(Annotation, Node<'a>)> {
        let mut node = call;
        loop {
            let mut sibling = node.prev_sibling();
            while let Some(comment) = sibling.filter(|s| s.kind() == "comment") {
                match annotation::parse(self.text(comment)) {
                    Ok(Some(found)) if found.documents(namespace, code) => {
                        return Some((found, comment));
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!(
                        "Ignoring malformed annotation at line {}: {}",
                        comment.start_position().row + 1,
                        e
                    ),
                }
                sibling = comment.prev_sibling();
            }

            let parent = node.parent()?;
            if STATEMENT_LISTS.contains(&parent.kind()) {
                return None;
            }
            node = parent;
        }
    }

    /// Delete a comment, along with its line when nothing else is on it.
    fn remove_comment(&mut self, comment: Node<'a>) {
        if !self.removed_comments.insert(comment.start_byte()) {
            return;
        }
        let (start, end) = comment_extent(
            self.module.source(),
            comment.start_byte(),
            comment.end_byte(),
        );
        self.edits.push(Edit::remove(start, end));
    }
}

/// The byte range to delete for a comment at `start..end`.
fn comment_extent(source: &str, start: usize, end: usize) -> (usize, usize) {
    let line_start = source[..start].rfind('\n').map_or(0, |i| i + 1);
    let line_end = source[end..].find('\n').map_or(source.len(), |i| end + i);
    let before = &source[line_start..start];
    let after = &source[end..line_end];

    match (before.trim().is_empty(), after.trim().is_empty()) {
        (true, true) => (line_start, (line_end + 1).min(source.len())),
        (false, true) => (line_start + before.trim_end().len(), end),
        _ => (start, end + (after.len() - after.trim_start().len())),
    }
}
