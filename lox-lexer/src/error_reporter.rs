use std::io::Write;

use crate::{Token, TokenType};

/// Collects compile diagnostics and writes them to `out` as they are found.
///
/// While in panic mode further errors are swallowed, the parser
/// leaves panic mode once it has synchronized on a statement boundary.
pub struct ErrorReporter<W: Write> {
    pub panic_mode: bool,
    pub had_error: bool,
    error_count: usize,
    out: W,
}

impl<W: Write> ErrorReporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            panic_mode: false,
            had_error: false,
            error_count: 0,
            out,
        }
    }

    pub fn error_at(&mut self, token: Token<'_>, message: &str) {
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;
        let location = match token.kind {
            TokenType::Eof => " at end".to_owned(),
            // The lexeme of an error token is the message itself.
            TokenType::Error => String::new(),
            _ => format!(" at '{}'", token.lexeme),
        };
        // A broken diagnostics sink must not abort compilation.
        let _ = writeln!(self.out, "[line {}] Error{location}: {message}", token.line);
        self.had_error = true;
        self.error_count += 1;
    }

    /// Number of diagnostics reported so far.
    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
