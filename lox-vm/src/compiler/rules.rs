use std::{io::Write, ops::Add};

use lox_lexer::TokenType;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use super::Compiler;

pub(super) type ParseFn<'a, W> = fn(&mut Compiler<'a, W>, bool /*can assign*/);

// Precedence levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub(super) enum Precedence {
    None,
    Assignment, // =
    Or,         // or
    And,        // and
    Equality,   // == !=
    Comparison, // < > <= >=
    Term,       // + -
    Factor,     // * /
    Unary,      // ! -
    Call,       // . ()
    Primary,
}

impl Add<u8> for Precedence {
    type Output = Self;

    fn add(self, rhs: u8) -> Self::Output {
        Self::try_from(u8::from(self).saturating_add(rhs)).unwrap_or(Precedence::Primary)
    }
}

// Parse rule structure
pub(super) struct ParseRule<'a, W: Write> {
    pub(super) prefix: Option<ParseFn<'a, W>>,
    pub(super) infix: Option<ParseFn<'a, W>>,
    pub(super) precedence: Precedence,
}

impl<'a, W: Write> ParseRule<'a, W> {
    fn new(
        prefix: Option<ParseFn<'a, W>>,
        infix: Option<ParseFn<'a, W>>,
        precedence: Precedence,
    ) -> Self {
        Self {
            prefix,
            infix,
            precedence,
        }
    }
}

pub(super) fn get_rule<'a, W: Write>(kind: TokenType) -> ParseRule<'a, W> {
    match kind {
        TokenType::OpenParen => ParseRule::new(Some(Compiler::grouping), None, Precedence::None),
        TokenType::Minus => {
            ParseRule::new(Some(Compiler::unary), Some(Compiler::binary), Precedence::Term)
        }
        TokenType::Plus => ParseRule::new(None, Some(Compiler::binary), Precedence::Term),
        TokenType::Slash => ParseRule::new(None, Some(Compiler::binary), Precedence::Factor),
        TokenType::Star => ParseRule::new(None, Some(Compiler::binary), Precedence::Factor),
        TokenType::Bang => ParseRule::new(Some(Compiler::unary), None, Precedence::None),
        TokenType::BangEqual => ParseRule::new(None, Some(Compiler::binary), Precedence::Equality),
        TokenType::EqualEqual => {
            ParseRule::new(None, Some(Compiler::binary), Precedence::Equality)
        }
        TokenType::Greater => ParseRule::new(None, Some(Compiler::binary), Precedence::Comparison),
        TokenType::GreaterEqual => {
            ParseRule::new(None, Some(Compiler::binary), Precedence::Comparison)
        }
        TokenType::Less => ParseRule::new(None, Some(Compiler::binary), Precedence::Comparison),
        TokenType::LessEqual => {
            ParseRule::new(None, Some(Compiler::binary), Precedence::Comparison)
        }
        TokenType::Identifier => ParseRule::new(Some(Compiler::variable), None, Precedence::None),
        TokenType::String => ParseRule::new(Some(Compiler::string), None, Precedence::None),
        TokenType::Number => ParseRule::new(Some(Compiler::number), None, Precedence::None),
        TokenType::And => ParseRule::new(None, Some(Compiler::and_), Precedence::And),
        TokenType::Or => ParseRule::new(None, Some(Compiler::or_), Precedence::Or),
        TokenType::False | TokenType::True | TokenType::Nil => {
            ParseRule::new(Some(Compiler::literal), None, Precedence::None)
        }
        _ => ParseRule::new(None, None, Precedence::None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_order() {
        assert!(Precedence::Assignment < Precedence::Or);
        assert!(Precedence::Or < Precedence::And);
        assert!(Precedence::Term < Precedence::Factor);
        assert_eq!(Precedence::Term + 1, Precedence::Factor);
        assert_eq!(Precedence::Primary + 1, Precedence::Primary);
    }

    #[test]
    fn test_rule_precedence() {
        let rule = get_rule::<Vec<u8>>(TokenType::Star);
        assert_eq!(rule.precedence, Precedence::Factor);
        assert!(rule.prefix.is_none());
        assert!(rule.infix.is_some());

        let rule = get_rule::<Vec<u8>>(TokenType::Minus);
        assert!(rule.prefix.is_some() && rule.infix.is_some());

        let rule = get_rule::<Vec<u8>>(TokenType::Semicolon);
        assert_eq!(rule.precedence, Precedence::None);
        assert!(rule.prefix.is_none() && rule.infix.is_none());
    }
}
