use lox_lexer::Token;

use crate::object::{Function, FunctionType};

pub(super) const MAX_LOCALS: usize = u8::MAX as usize + 1;
pub(super) const UNINITIALIZED_LOCAL_DEPTH: isize = -1;

#[derive(Debug, Clone, Default)]
struct Local<'a> {
    name: Token<'a>,
    depth: isize,
}

/// Per-function code generation state.
///
/// Nested function declarations push a new `CodeGen` whose `enclosing`
/// points back to the surrounding one.
pub(super) struct CodeGen<'a> {
    pub(super) function: Function,
    pub(super) fn_type: FunctionType,
    locals: Vec<Local<'a>>,
    pub(super) scope_depth: isize,
    pub(super) enclosing: Option<Box<CodeGen<'a>>>,
}

impl<'a> CodeGen<'a> {
    pub(super) fn new(fn_type: FunctionType, name: Option<&str>) -> Box<Self> {
        let mut locals = Vec::with_capacity(MAX_LOCALS);
        // Slot 0 holds the running function, its empty name can never be resolved.
        locals.push(Local {
            name: Token::default(),
            depth: 0,
        });
        Box::new(CodeGen {
            function: Function::new(name),
            fn_type,
            locals,
            scope_depth: 0,
            enclosing: None,
        })
    }

    pub(super) fn begin_scope(&mut self) {
        self.scope_depth += 1;
    }

    /// Leave the current scope and return how many locals went out of it.
    pub(super) fn end_scope(&mut self) -> usize {
        self.scope_depth -= 1;

        let mut popped = 0;
        while self
            .locals
            .last()
            .is_some_and(|local| local.depth > self.scope_depth)
        {
            self.locals.pop();
            popped += 1;
        }
        popped
    }

    // Whether a local with this name was already declared in the innermost scope.
    pub(super) fn is_declared_in_scope(&self, name: &str) -> bool {
        self.locals
            .iter()
            .rev()
            .take_while(|local| {
                local.depth == UNINITIALIZED_LOCAL_DEPTH || local.depth >= self.scope_depth
            })
            .any(|local| local.name.lexeme == name)
    }

    pub(super) fn add_local(&mut self, name: Token<'a>) -> Result<(), &'static str> {
        if self.locals.len() == MAX_LOCALS {
            return Err("Too many local variables in function.");
        }

        self.locals.push(Local {
            name,
            depth: UNINITIALIZED_LOCAL_DEPTH,
        });
        Ok(())
    }

    pub(super) fn mark_initialized(&mut self) {
        if self.scope_depth == 0 {
            return;
        }
        if let Some(local) = self.locals.last_mut() {
            local.depth = self.scope_depth;
        }
    }

    // Resolve a local variable by name, return its slot and depth.
    pub(super) fn resolve_local(&self, name: &str) -> Option<(u8, isize)> {
        self.locals
            .iter()
            .rposition(|local| local.name.lexeme == name)
            .map(|i| (i as u8, self.locals[i].depth))
    }
}

#[cfg(test)]
mod tests {
    use lox_lexer::TokenType;

    use super::*;

    fn ident(name: &str) -> Token<'_> {
        Token::new(TokenType::Identifier, name, 1)
    }

    #[test]
    fn test_scopes() {
        let mut codegen = CodeGen::new(FunctionType::Script, None);
        codegen.begin_scope();
        codegen.add_local(ident("a")).unwrap();
        assert_eq!(codegen.resolve_local("a"), Some((1, UNINITIALIZED_LOCAL_DEPTH)));
        codegen.mark_initialized();
        assert_eq!(codegen.resolve_local("a"), Some((1, 1)));
        assert!(codegen.is_declared_in_scope("a"));

        codegen.begin_scope();
        assert!(!codegen.is_declared_in_scope("a"));
        codegen.add_local(ident("a")).unwrap();
        codegen.mark_initialized();
        codegen.add_local(ident("b")).unwrap();
        codegen.mark_initialized();
        assert_eq!(codegen.resolve_local("a"), Some((2, 2)));

        assert_eq!(codegen.end_scope(), 2);
        assert_eq!(codegen.resolve_local("a"), Some((1, 1)));
        assert_eq!(codegen.resolve_local("b"), None);
        assert_eq!(codegen.end_scope(), 1);
        assert_eq!(codegen.resolve_local("a"), None);
    }

    #[test]
    fn test_slot_zero_is_reserved() {
        let codegen = CodeGen::new(FunctionType::Function, Some("f"));
        assert_eq!(codegen.resolve_local("f"), None);
        assert_eq!(codegen.function.name.as_deref(), Some("f"));
    }

    #[test]
    fn test_local_limit() {
        let mut codegen = CodeGen::new(FunctionType::Script, None);
        codegen.begin_scope();
        for _ in 1..MAX_LOCALS {
            codegen.add_local(ident("x")).unwrap();
        }
        assert_eq!(
            codegen.add_local(ident("y")),
            Err("Too many local variables in function.")
        );
    }
}
