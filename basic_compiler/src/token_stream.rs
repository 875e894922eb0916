//! Buffered stream of tokens for look ahead.
use crate::{
    error::{CompileError, Position},
    tokens::{Span, Token, TokenKind},
};

use std::{error, fmt};

/// Cursor over a fully scanned token sequence.
///
/// The whole source is tokenized up front, so peeking is idempotent
/// and the cursor can be stepped back to re-read a token the parser
/// already consumed.
pub struct TokenStream {
    tokens: Vec<Token>,
    /// Index of the next token to be consumed.
    cursor: usize,
}

impl TokenStream {
    #[inline]
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, cursor: 0 }
    }

    #[inline]
    pub fn is_at_end(&self) -> bool {
        self.cursor >= self.tokens.len()
    }

    /// Consumes the current token regardless of type.
    ///
    /// Returns `None` when the cursor is at the end of the token stream.
    #[inline]
    pub fn next_token(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.cursor).cloned()?;
        self.cursor += 1;
        Some(token)
    }

    /// Moves the cursor back by one token, so the last consumed token
    /// will be returned again by the next read.
    #[inline]
    pub fn step_back(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    /// Return the current token without advancing the cursor.
    #[inline]
    pub fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.cursor)
    }

    #[inline]
    pub fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|token| token.kind)
    }

    /// The token consumed last.
    #[inline]
    pub fn previous(&self) -> Option<&Token> {
        self.cursor.checked_sub(1).and_then(|i| self.tokens.get(i))
    }

    /// Consumes the current token if it matches the given token type.
    ///
    /// Returns true when matched. Returns false when token types
    /// do not match, or the token stream is at the end.
    pub fn match_token(&mut self, token_kind: TokenKind) -> bool {
        let is_match = self.peek_kind() == Some(token_kind);
        if is_match {
            self.cursor += 1;
        }
        is_match
    }

    /// Return the current token and advance the cursor.
    ///
    /// The consumed token must match the given token type, otherwise
    /// an error is returned and the cursor stays put.
    pub fn consume(&mut self, token_kind: TokenKind) -> Result<Token, TokenError> {
        match self.peek() {
            Some(token) if token.kind == token_kind => {
                let token = token.clone();
                self.cursor += 1;
                Ok(token)
            }
            Some(token) => Err(TokenError::Mismatch {
                expected: token_kind,
                encountered: token.kind,
                span: token.span,
            }),
            None => Err(TokenError::EndOfSource),
        }
    }

    /// Source location of the current token, or of the last one when
    /// the stream is exhausted.
    pub fn position(&self) -> Option<Position> {
        self.peek()
            .or_else(|| self.tokens.last())
            .map(|token| Position::from(token.span))
    }
}

/// Error returned when an unexpected token type is encountered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    Mismatch {
        expected: TokenKind,
        encountered: TokenKind,
        span: Span,
    },
    EndOfSource,
}

impl error::Error for TokenError {}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use TokenError as E;
        match self {
            E::Mismatch {
                expected,
                encountered,
                ..
            } => write!(f, "encountered unexpected {}, expected {}", encountered, expected),
            E::EndOfSource => write!(f, "unexpected end of source code"),
        }
    }
}

impl From<TokenError> for CompileError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Mismatch { span, .. } => CompileError::syntax(&err).with_position(span),
            TokenError::EndOfSource => CompileError::syntax(err),
        }
    }
}
