use std::io::Write;

use lox_lexer::{Token, TokenType};

use super::{
    Compiler,
    codegen::UNINITIALIZED_LOCAL_DEPTH,
    rules::{Precedence, get_rule},
};
use crate::{OpCode, Value};

impl<'a, W: Write> Compiler<'a, W> {
    pub(super) fn expression(&mut self) {
        self.parse_precedence(Precedence::Assignment);
    }

    pub(super) fn number(&mut self, _can_assign: bool) {
        match self.previous.lexeme.parse::<f64>() {
            Ok(value) => self.emit_constant(Value::Number(value)),
            Err(_) => self.error("Invalid number literal."),
        }
    }

    pub(super) fn string(&mut self, _can_assign: bool) {
        let lexeme = self.previous.lexeme;
        // Trim the surrounding quotes.
        let content = lexeme
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .unwrap_or(lexeme);
        self.emit_constant(Value::from(content));
    }

    pub(super) fn literal(&mut self, _can_assign: bool) {
        match self.previous.kind {
            TokenType::False => self.emit(OpCode::False),
            TokenType::True => self.emit(OpCode::True),
            TokenType::Nil => self.emit(OpCode::Nil),
            _ => unreachable!(),
        }
    }

    pub(super) fn grouping(&mut self, _can_assign: bool) {
        self.expression();
        self.consume(TokenType::CloseParen, "Expect ')' after expression.");
    }

    pub(super) fn unary(&mut self, _can_assign: bool) {
        let operator = self.previous.kind;

        // Compile the operand.
        self.parse_precedence(Precedence::Unary);

        match operator {
            TokenType::Bang => self.emit(OpCode::Not),
            TokenType::Minus => self.emit(OpCode::Negate),
            _ => unreachable!(),
        }
    }

    pub(super) fn binary(&mut self, _can_assign: bool) {
        let operator = self.previous.kind;
        let rule = get_rule::<W>(operator);
        self.parse_precedence(rule.precedence + 1);

        match operator {
            TokenType::BangEqual => self.emit_pair(OpCode::Equal, OpCode::Not),
            TokenType::EqualEqual => self.emit(OpCode::Equal),
            TokenType::Greater => self.emit(OpCode::Greater),
            TokenType::GreaterEqual => self.emit_pair(OpCode::Less, OpCode::Not),
            TokenType::Less => self.emit(OpCode::Less),
            TokenType::LessEqual => self.emit_pair(OpCode::Greater, OpCode::Not),
            TokenType::Plus => self.emit(OpCode::Add),
            TokenType::Minus => self.emit(OpCode::Subtract),
            TokenType::Star => self.emit(OpCode::Multiply),
            TokenType::Slash => self.emit(OpCode::Divide),
            _ => unreachable!(),
        }
    }

    // Left operand is on the stack, skip the right one when it is falsey.
    pub(super) fn and_(&mut self, _can_assign: bool) {
        let end_jump = self.emit_jump(OpCode::JumpIfFalse);
        self.emit(OpCode::Pop);
        self.parse_precedence(Precedence::And);
        self.patch_jump(end_jump);
    }

    pub(super) fn or_(&mut self, _can_assign: bool) {
        let else_jump = self.emit_jump(OpCode::JumpIfFalse);
        let end_jump = self.emit_jump(OpCode::Jump);

        self.patch_jump(else_jump);
        self.emit(OpCode::Pop);

        self.parse_precedence(Precedence::Or);
        self.patch_jump(end_jump);
    }

    pub(super) fn variable(&mut self, can_assign: bool) {
        self.named_variable(self.previous, can_assign);
    }

    fn named_variable(&mut self, name: Token<'a>, can_assign: bool) {
        let (get_op, set_op, arg) = if let Some((slot, depth)) =
            self.codegen.resolve_local(name.lexeme)
        {
            if depth == UNINITIALIZED_LOCAL_DEPTH {
                self.error("Can't read local variable in its own initializer.");
            }
            (OpCode::GetLocal, OpCode::SetLocal, slot)
        } else {
            let constant = self.identifier_constant(name.lexeme);
            (OpCode::GetGlobal, OpCode::SetGlobal, constant)
        };

        if can_assign && self.match_token(TokenType::Equal) {
            self.expression();
            self.emit_with(set_op, arg);
        } else {
            self.emit_with(get_op, arg);
        }
    }

    // Pratt parsing implementation
    pub(super) fn parse_precedence(&mut self, precedence: Precedence) {
        self.advance();
        let Some(prefix_fn) = get_rule::<W>(self.previous.kind).prefix else {
            self.error("Expect expression.");
            return;
        };

        let can_assign = precedence <= Precedence::Assignment;
        prefix_fn(self, can_assign);

        while precedence <= get_rule::<W>(self.current.kind).precedence {
            self.advance();
            if let Some(infix_fn) = get_rule::<W>(self.previous.kind).infix {
                infix_fn(self, can_assign);
            }
        }

        if can_assign && self.match_token(TokenType::Equal) {
            self.error("Invalid assignment target.");
        }
    }
}
