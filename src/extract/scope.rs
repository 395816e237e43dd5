//! Lexical scopes for namespace bindings.
//!
//! Frames are either function frames (the program, function bodies), which
//! receive `var` declarations, or block frames (blocks, loops, `switch`,
//! `catch`), which only hold `let`, `const`, `class` and catch parameters.

use std::collections::HashMap;

/// What a local identifier is known to hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    /// The error factory itself (or an alias of it).
    Factory,
    /// The result of calling the factory with this namespace.
    Namespace(String),
    /// Anything else. Shadows outer bindings of the same name.
    Opaque,
}

#[derive(Debug)]
struct Frame {
    bindings: HashMap<String, Binding>,
    function: bool,
}

impl Frame {
    fn new(function: bool) -> Self {
        Self {
            bindings: HashMap::new(),
            function,
        }
    }
}

/// Stack of scopes, innermost last. The bottom frame is the program scope.
#[derive(Debug)]
pub struct Scopes {
    frames: Vec<Frame>,
}

impl Scopes {
    pub fn new() -> Self {
        Self {
            frames: vec![Frame::new(true)],
        }
    }

    /// Enter a function body.
    pub fn push_function(&mut self) {
        self.frames.push(Frame::new(true));
    }

    /// Enter a block, loop head, `switch` body or `catch` clause.
    pub fn push_block(&mut self) {
        self.frames.push(Frame::new(false));
    }

    /// Leave the innermost scope. The program scope is never popped.
    pub fn pop(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    /// Declare `name` in the innermost scope (`let`, `const`, parameters).
    pub fn declare(&mut self, name: &str, binding: Binding) {
        if let Some(frame) = self.frames.last_mut() {
            frame.bindings.insert(name.to_string(), binding);
        }
    }

    /// Declare `name` in the nearest function scope (`var`).
    pub fn declare_var(&mut self, name: &str, binding: Binding) {
        let index = self.function_frame();
        self.frames[index]
            .bindings
            .insert(name.to_string(), binding);
    }

    /// `var name;` without an initializer: declares an opaque binding in the
    /// nearest function scope unless one already exists there.
    pub fn hoist_var(&mut self, name: &str) {
        let index = self.function_frame();
        self.frames[index]
            .bindings
            .entry(name.to_string())
            .or_insert(Binding::Opaque);
    }

    /// Rebind `name` where it is declared; undeclared names are implicit
    /// globals and land in the program scope.
    pub fn assign(&mut self, name: &str, binding: Binding) {
        let index = self
            .frames
            .iter()
            .rposition(|frame| frame.bindings.contains_key(name))
            .unwrap_or(0);
        self.frames[index]
            .bindings
            .insert(name.to_string(), binding);
    }

    /// The innermost binding of `name`, unless it is opaque.
    pub fn resolve(&self, name: &str) -> Option<&Binding> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.bindings.get(name))
            .filter(|binding| **binding != Binding::Opaque)
    }

    fn function_frame(&self) -> usize {
        self.frames
            .iter()
            .rposition(|frame| frame.function)
            .unwrap_or(0)
    }
}

impl Default for Scopes {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ns(name: &str) -> Binding {
        Binding::Namespace(name.to_string())
    }

    #[test]
    fn test_inner_scope_sees_outer_binding() {
        let mut scopes = Scopes::new();
        scopes.declare("testMinErr", ns("test"));
        scopes.push_function();
        scopes.push_block();

        assert_eq!(scopes.resolve("testMinErr"), Some(&ns("test")));
    }

    #[test]
    fn test_shadowing_hides_binding() {
        let mut scopes = Scopes::new();
        scopes.declare("testMinErr", ns("test"));
        scopes.push_function();
        scopes.declare("testMinErr", Binding::Opaque);

        assert_eq!(scopes.resolve("testMinErr"), None);

        scopes.pop();
        assert_eq!(scopes.resolve("testMinErr"), Some(&ns("test")));
    }

    #[test]
    fn test_block_declaration_ends_with_block() {
        let mut scopes = Scopes::new();
        scopes.declare("e", ns("outer"));
        scopes.push_function();
        scopes.push_block();
        scopes.declare("e", Binding::Opaque);
        scopes.declare("inner", ns("ng"));
        scopes.pop();

        assert_eq!(scopes.resolve("e"), Some(&ns("outer")));
        assert_eq!(scopes.resolve("inner"), None);
    }

    #[test]
    fn test_var_lands_in_function_scope() {
        let mut scopes = Scopes::new();
        scopes.push_function();
        scopes.push_block();
        scopes.push_block();
        scopes.declare_var("e", ns("ng"));
        scopes.pop();
        scopes.pop();

        assert_eq!(scopes.resolve("e"), Some(&ns("ng")));
        scopes.pop();
        assert_eq!(scopes.resolve("e"), None);
    }

    #[test]
    fn test_hoist_var_keeps_existing_binding() {
        let mut scopes = Scopes::new();
        scopes.declare_var("late", ns("beta"));
        scopes.hoist_var("late");
        assert_eq!(scopes.resolve("late"), Some(&ns("beta")));

        scopes.declare("outer", ns("a"));
        scopes.push_function();
        scopes.hoist_var("outer");
        assert_eq!(scopes.resolve("outer"), None, "local var shadows outer binding");
    }

    #[test]
    fn test_assign_updates_declaring_scope() {
        let mut scopes = Scopes::new();
        scopes.declare("err", Binding::Opaque);
        scopes.push_function();
        scopes.assign("err", ns("late"));
        scopes.pop();

        assert_eq!(scopes.resolve("err"), Some(&ns("late")));
    }

    #[test]
    fn test_assign_undeclared_is_global() {
        let mut scopes = Scopes::new();
        scopes.push_function();
        scopes.push_block();
        scopes.assign("implicit", ns("g"));
        scopes.pop();
        scopes.pop();

        assert_eq!(scopes.resolve("implicit"), Some(&ns("g")));
    }

    #[test]
    fn test_program_scope_is_never_popped() {
        let mut scopes = Scopes::new();
        scopes.declare("minErr", Binding::Factory);
        scopes.pop();
        scopes.pop();

        assert_eq!(scopes.resolve("minErr"), Some(&Binding::Factory));
        scopes.declare_var("later", ns("x"));
        assert_eq!(scopes.resolve("later"), Some(&ns("x")));
    }
}
