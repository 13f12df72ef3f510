use std::{io::Write, mem};

use codegen::CodeGen;
use lox_lexer::{ErrorReporter, Scanner, Token, TokenType};

use crate::{
    OpCode, Value, VmError,
    object::{Function, FunctionType},
};

mod codegen;
mod expr;
mod rules;
#[cfg(test)]
mod tests;

/// Compile `source` into the top-level script function.
///
/// Diagnostics are written to `diagnostics` as soon as they are found.
/// Any error fails the whole compilation.
pub fn compile<W: Write>(source: &str, diagnostics: W) -> Result<Function, VmError> {
    let _span = tracing::debug_span!("compile", source_len = source.len()).entered();

    let mut compiler = Compiler::new(source, diagnostics);
    compiler.advance();
    while !compiler.match_token(TokenType::Eof) {
        compiler.declaration();
    }
    let function = compiler.end_compiler();

    if compiler.reporter.had_error {
        tracing::debug!(
            errors = compiler.reporter.error_count(),
            "compilation failed"
        );
        Err(VmError::CompileError)
    } else {
        tracing::debug!(
            code_size = function.chunk.code_size(),
            constants = function.chunk.constants().len(),
            "compiled script"
        );
        Ok(function)
    }
}

pub(crate) struct Compiler<'a, W: Write> {
    scanner: Scanner<'a>,
    current: Token<'a>,
    previous: Token<'a>,
    reporter: ErrorReporter<W>,
    codegen: Box<CodeGen<'a>>,
}

impl<'a, W: Write> Compiler<'a, W> {
    fn new(source: &'a str, diagnostics: W) -> Self {
        Compiler {
            scanner: Scanner::new(source),
            current: Token::default(),
            previous: Token::default(),
            reporter: ErrorReporter::new(diagnostics),
            codegen: CodeGen::new(FunctionType::Script, None),
        }
    }

    fn declaration(&mut self) {
        if self.match_token(TokenType::Fun) {
            self.fun_declaration();
        } else if self.match_token(TokenType::Var) {
            self.var_declaration();
        } else {
            self.statement();
        }

        if self.reporter.panic_mode {
            self.synchronize();
        }
    }

    fn fun_declaration(&mut self) {
        let global = self.parse_variable("Expect function name.");
        // A function may refer to its own name in its body.
        self.codegen.mark_initialized();
        self.function(FunctionType::Function);
        self.define_variable(global);
    }

    fn var_declaration(&mut self) {
        let global = self.parse_variable("Expect variable name.");

        if self.match_token(TokenType::Equal) {
            self.expression();
        } else {
            self.emit(OpCode::Nil);
        }
        self.consume(
            TokenType::Semicolon,
            "Expect ';' after variable declaration.",
        );

        self.define_variable(global);
    }

    fn function(&mut self, fn_type: FunctionType) {
        let mut codegen = CodeGen::new(fn_type, Some(self.previous.lexeme));
        mem::swap(&mut self.codegen, &mut codegen);
        self.codegen.enclosing = Some(codegen);
        self.codegen.begin_scope();

        self.consume(TokenType::OpenParen, "Expect '(' after function name.");
        if !self.check(TokenType::CloseParen) {
            loop {
                if self.codegen.function.arity == u8::MAX {
                    self.error_at_current("Can't have more than 255 parameters.");
                } else {
                    self.codegen.function.arity += 1;
                }
                let constant = self.parse_variable("Expect parameter name.");
                self.define_variable(constant);
                if !self.match_token(TokenType::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenType::CloseParen, "Expect ')' after parameters.");
        self.consume(TokenType::OpenBrace, "Expect '{' before function body.");
        self.block();

        // No end_scope here, the frame is discarded with its locals.
        let function = self.end_compiler();
        self.emit_constant(Value::from(function));
    }

    fn statement(&mut self) {
        if self.match_token(TokenType::Print) {
            self.print_statement();
        } else if self.match_token(TokenType::If) {
            self.if_statement();
        } else if self.match_token(TokenType::Return) {
            self.return_statement();
        } else if self.match_token(TokenType::While) {
            self.while_statement();
        } else if self.match_token(TokenType::For) {
            self.for_statement();
        } else if self.match_token(TokenType::OpenBrace) {
            self.begin_scope();
            self.block();
            self.end_scope();
        } else {
            self.expression_statement();
        }
    }

    fn block(&mut self) {
        while !self.check(TokenType::CloseBrace) && !self.check(TokenType::Eof) {
            self.declaration();
        }

        self.consume(TokenType::CloseBrace, "Expect '}' after block.");
    }

    fn print_statement(&mut self) {
        self.expression();
        self.consume(TokenType::Semicolon, "Expect ';' after value.");
        self.emit(OpCode::Print);
    }

    fn expression_statement(&mut self) {
        self.expression();
        self.consume(TokenType::Semicolon, "Expect ';' after expression.");
        self.emit(OpCode::Pop);
    }

    fn if_statement(&mut self) {
        self.consume(TokenType::OpenParen, "Expect '(' after 'if'.");
        self.expression();
        self.consume(TokenType::CloseParen, "Expect ')' after condition.");

        let then_jump = self.emit_jump(OpCode::JumpIfFalse);
        self.emit(OpCode::Pop);
        self.statement();

        let else_jump = self.emit_jump(OpCode::Jump);
        self.patch_jump(then_jump);
        self.emit(OpCode::Pop);

        if self.match_token(TokenType::Else) {
            self.statement();
        }
        self.patch_jump(else_jump);
    }

    fn while_statement(&mut self) {
        let loop_start = self.code_size();
        self.consume(TokenType::OpenParen, "Expect '(' after 'while'.");
        self.expression();
        self.consume(TokenType::CloseParen, "Expect ')' after condition.");

        let exit_jump = self.emit_jump(OpCode::JumpIfFalse);
        self.emit(OpCode::Pop);
        self.statement();
        self.emit_loop(loop_start);

        self.patch_jump(exit_jump);
        self.emit(OpCode::Pop);
    }

    fn for_statement(&mut self) {
        // The loop variable is scoped to the loop.
        self.begin_scope();
        self.consume(TokenType::OpenParen, "Expect '(' after 'for'.");
        if self.match_token(TokenType::Semicolon) {
            // No initializer.
        } else if self.match_token(TokenType::Var) {
            self.var_declaration();
        } else {
            self.expression_statement();
        }

        let mut loop_start = self.code_size();
        let mut exit_jump = None;
        if !self.match_token(TokenType::Semicolon) {
            self.expression();
            self.consume(TokenType::Semicolon, "Expect ';' after loop condition.");

            // Jump out of the loop if the condition is false.
            exit_jump = Some(self.emit_jump(OpCode::JumpIfFalse));
            self.emit(OpCode::Pop);
        }

        if !self.match_token(TokenType::CloseParen) {
            // The increment runs after the body, jump over it on the first pass.
            let body_jump = self.emit_jump(OpCode::Jump);
            let increment_start = self.code_size();
            self.expression();
            self.emit(OpCode::Pop);
            self.consume(TokenType::CloseParen, "Expect ')' after for clauses.");

            self.emit_loop(loop_start);
            loop_start = increment_start;
            self.patch_jump(body_jump);
        }

        self.statement();
        self.emit_loop(loop_start);

        if let Some(exit_jump) = exit_jump {
            self.patch_jump(exit_jump);
            self.emit(OpCode::Pop);
        }

        self.end_scope();
    }

    fn return_statement(&mut self) {
        if self.codegen.fn_type == FunctionType::Script {
            self.error("Can't return from top-level code.");
        }

        if self.match_token(TokenType::Semicolon) {
            self.emit_return();
        } else {
            self.expression();
            self.consume(TokenType::Semicolon, "Expect ';' after return value.");
            self.emit(OpCode::Return);
        }
    }

    fn synchronize(&mut self) {
        self.reporter.panic_mode = false;

        while self.current.kind != TokenType::Eof {
            if self.previous.kind == TokenType::Semicolon {
                return;
            }

            if self.current.is_synchronize_keyword() {
                return;
            }
            self.advance();
        }
    }
}

// Variables and scopes
impl<'a, W: Write> Compiler<'a, W> {
    fn begin_scope(&mut self) {
        self.codegen.begin_scope();
    }

    fn end_scope(&mut self) {
        for _ in 0..self.codegen.end_scope() {
            self.emit(OpCode::Pop);
        }
    }

    fn parse_variable(&mut self, message: &str) -> u8 {
        self.consume(TokenType::Identifier, message);

        self.declare_variable();
        if self.codegen.scope_depth > 0 {
            return 0;
        }

        self.identifier_constant(self.previous.lexeme)
    }

    fn declare_variable(&mut self) {
        // Globals are late bound and may be redeclared.
        if self.codegen.scope_depth == 0 {
            return;
        }

        let name = self.previous;
        if self.codegen.is_declared_in_scope(name.lexeme) {
            self.error("Already a variable with this name in this scope.");
        }

        if let Err(message) = self.codegen.add_local(name) {
            self.error(message);
        }
    }

    fn define_variable(&mut self, global: u8) {
        if self.codegen.scope_depth > 0 {
            self.codegen.mark_initialized();
            return;
        }

        self.emit_with(OpCode::DefineGlobal, global);
    }

    fn identifier_constant(&mut self, name: &str) -> u8 {
        self.make_constant(Value::from(name))
    }
}

// Bytecode emission
impl<'a, W: Write> Compiler<'a, W> {
    fn code_size(&self) -> usize {
        self.codegen.function.chunk.code_size()
    }

    fn emit_byte(&mut self, byte: u8) {
        let line = self.previous.line;
        self.codegen.function.chunk.write_byte(byte, line);
    }

    fn emit(&mut self, op: OpCode) {
        self.emit_byte(op.into());
    }

    fn emit_pair(&mut self, first: OpCode, second: OpCode) {
        self.emit(first);
        self.emit(second);
    }

    fn emit_with(&mut self, op: OpCode, operand: u8) {
        self.emit(op);
        self.emit_byte(operand);
    }

    fn emit_constant(&mut self, value: Value) {
        let constant = self.make_constant(value);
        self.emit_with(OpCode::Constant, constant);
    }

    fn emit_return(&mut self) {
        self.emit(OpCode::Nil);
        self.emit(OpCode::Return);
    }

    // Emit a jump with a placeholder offset, return the offset of the placeholder.
    fn emit_jump(&mut self, instruction: OpCode) -> usize {
        self.emit(instruction);
        self.emit_byte(0xff);
        self.emit_byte(0xff);
        self.code_size() - 2
    }

    fn patch_jump(&mut self, offset: usize) {
        // -2 to adjust for the bytecode for the jump offset itself.
        let jump = self.code_size() - offset - 2;
        match u16::try_from(jump) {
            Ok(jump) => self.codegen.function.chunk.patch_short(offset, jump),
            Err(_) => self.error("Too much code to jump over."),
        }
    }

    fn emit_loop(&mut self, loop_start: usize) {
        self.emit(OpCode::Loop);

        // +2 to also jump over the operand of the loop instruction.
        let offset = self.code_size() - loop_start + 2;
        let [hi, lo] = u16::try_from(offset)
            .unwrap_or_else(|_| {
                self.error("Loop body too large.");
                0
            })
            .to_be_bytes();
        self.emit_byte(hi);
        self.emit_byte(lo);
    }

    fn make_constant(&mut self, value: Value) -> u8 {
        let constant = self.codegen.function.chunk.add_constant(value);
        u8::try_from(constant).unwrap_or_else(|_| {
            self.error("Too many constants in one chunk.");
            0
        })
    }

    fn end_compiler(&mut self) -> Function {
        self.emit_return();
        let function = mem::take(&mut self.codegen.function);
        if let Some(enclosing) = self.codegen.enclosing.take() {
            self.codegen = enclosing;
        }
        function
    }
}

// Token handling
impl<'a, W: Write> Compiler<'a, W> {
    fn advance(&mut self) {
        self.previous = self.current;

        loop {
            self.current = self.scanner.scan_token();
            if self.current.kind != TokenType::Error {
                break;
            }
            self.error_at_current(self.current.lexeme);
        }
    }

    fn consume(&mut self, kind: TokenType, message: &str) {
        if self.check(kind) {
            self.advance();
            return;
        }
        self.error_at_current(message);
    }

    fn match_token(&mut self, kind: TokenType) -> bool {
        if !self.check(kind) {
            false
        } else {
            self.advance();
            true
        }
    }

    fn check(&self, kind: TokenType) -> bool {
        self.current.kind == kind
    }

    fn error_at_current(&mut self, message: &str) {
        self.reporter.error_at(self.current, message);
    }

    fn error(&mut self, message: &str) {
        self.reporter.error_at(self.previous, message);
    }
}
