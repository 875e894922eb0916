//! Lexical analysis (tokenizer)
use crate::{
    error::{CompileError, CompileResult, Position},
    tokens::{Keyword, LiteralKind, Operator, Separator, Span, Token, TokenKind},
};

use itertools::{multipeek, MultiPeek};
use log::debug;
use smol_str::SmolStr;
use std::str::CharIndices;

/// Scan the whole source into a token sequence.
///
/// Runs of blank lines collapse into a single newline separator, and
/// the sequence always ends with a newline separator, synthesized when
/// the source doesn't end with one. Source without any tokens yields an
/// empty sequence.
pub fn tokenize(source: &str) -> CompileResult<Vec<Token>> {
    let mut lexer = Lexer::new(source);
    let mut tokens: Vec<Token> = Vec::new();

    while let Some(token) = lexer.next_token()? {
        // A newline only terminates a statement if there is one.
        if token.is_newline() && tokens.last().map_or(true, Token::is_newline) {
            continue;
        }
        tokens.push(token);
    }

    if tokens.last().map_or(false, |token| !token.is_newline()) {
        tokens.push(lexer.end_of_source());
    }

    debug!("tokenized {} tokens from {} bytes", tokens.len(), source.len());

    Ok(tokens)
}

/// Lexical analyzer.
pub struct Lexer<'a> {
    source: SourceText<'a>,
    token_start: SourcePos,
}

impl<'a> Lexer<'a> {
    pub fn new(source_code: &'a str) -> Self {
        Self {
            source: SourceText::new(source_code),
            token_start: SourcePos::default(),
        }
    }

    /// Scan the next token.
    ///
    /// Returns `None` at end of source.
    #[rustfmt::skip]
    pub fn next_token(&mut self) -> CompileResult<Option<Token>> {
        use Operator as O;
        use Separator as S;
        use TokenKind as T;

        while let Some(next_char) = self.source.next_char() {
            self.start_token();

            let token = match next_char {
                ' ' | '\t' | '\r' => continue,
                '\n'              => self.make_token(T::Separator(S::Newline)),
                '('               => self.make_token(T::Separator(S::LeftParen)),
                ')'               => self.make_token(T::Separator(S::RightParen)),
                '['               => self.make_token(T::Separator(S::LeftBracket)),
                ']'               => self.make_token(T::Separator(S::RightBracket)),
                '{'               => self.make_token(T::Separator(S::LeftBrace)),
                '}'               => self.make_token(T::Separator(S::RightBrace)),
                ','               => self.make_token(T::Separator(S::Comma)),
                '+'               => self.make_token(T::Operator(O::Plus)),
                '-'               => self.make_token(T::Operator(O::Minus)),
                '*'               => self.make_token(T::Operator(O::Star)),
                '/'               => self.make_token(T::Operator(O::Slash)),
                '^'               => self.make_token(T::Operator(O::Caret)),
                '='               => self.consume_operator(&[('=', O::EqEq)], O::Eq),
                '<'               => self.consume_operator(&[('=', O::LessEq), ('>', O::NotEq)], O::Less),
                '>'               => self.consume_operator(&[('=', O::GreaterEq)], O::Greater),
                '"'               => self.consume_string()?,
                '0'..='9' | '.'   => self.consume_number(next_char)?,
                '_' | 'a'..='z'
                    | 'A'..='Z'   => self.consume_word_token(),
                _                 => {
                    return Err(self.error(format!("unexpected character {:?}", next_char)));
                }
            };

            return Ok(Some(token));
        }

        Ok(None)
    }

    /// Prime the lexer state for recording a new token.
    fn start_token(&mut self) {
        self.token_start = self.source.current_pos();
    }

    fn make_token(&mut self, kind: TokenKind) -> Token {
        let span = Span {
            start: self.token_start.position,
            end: self.source.offset(),
            line: self.token_start.line,
            column: self.token_start.column,
        };

        Token {
            kind,
            text: SmolStr::new(span.fragment(self.source.original)),
            span,
        }
    }

    /// Newline separator for sources that don't end in one.
    fn end_of_source(&mut self) -> Token {
        self.token_start = SourcePos {
            position: self.source.offset(),
            line: self.source.next_line,
            column: self.source.next_column,
        };
        let mut token = self.make_token(TokenKind::Separator(Separator::Newline));
        token.text = SmolStr::new_inline("\n");
        token
    }

    fn error(&self, message: impl ToString) -> CompileError {
        CompileError::lexical(message).with_position(Position {
            line: self.token_start.line,
            column: self.token_start.column,
        })
    }

    /// Two character operators are preferred over their one character prefix.
    fn consume_operator(&mut self, pairs: &[(char, Operator)], single: Operator) -> Token {
        if let Some(peeked) = self.source.peek_char() {
            if let Some((_, operator)) = pairs.iter().find(|(c, _)| *c == peeked) {
                self.source.next_char();
                return self.make_token(TokenKind::Operator(*operator));
            }
        }

        self.make_token(TokenKind::Operator(single))
    }

    /// String literal, captured verbatim including the quotes and escapes.
    ///
    /// A string may not span multiple lines.
    fn consume_string(&mut self) -> CompileResult<Token> {
        loop {
            match self.source.next_char() {
                Some('"') => break,
                Some('\\') => {
                    // Escaped character is kept as is, but can't close the string.
                    if let None | Some('\n') = self.source.next_char() {
                        return Err(self.error("unterminated string literal"));
                    }
                }
                Some('\n') | None => return Err(self.error("unterminated string literal")),
                Some(_) => {}
            }
        }

        Ok(self.make_token(TokenKind::Literal(LiteralKind::String)))
    }

    fn consume_number(&mut self, first: char) -> CompileResult<Token> {
        let mut kind = LiteralKind::Int;

        if first == '.' {
            if !matches!(self.source.peek_char(), Some('0'..='9')) {
                return Err(self.error("unexpected character '.'"));
            }
            kind = LiteralKind::Decimal;
        }

        self.consume_digits();

        // The fraction must have at least one digit, otherwise the
        // dot is left for the next token.
        if kind == LiteralKind::Int {
            if let (Some('.'), Some('0'..='9')) = self.source.peek_char2() {
                self.source.next_char();
                self.consume_digits();
                kind = LiteralKind::Decimal;
            }
        }

        Ok(self.make_token(TokenKind::Literal(kind)))
    }

    fn consume_digits(&mut self) {
        while let Some('0'..='9') = self.source.peek_char() {
            self.source.next_char();
        }
    }

    /// Identifier or keyword.
    fn consume_word(&mut self) {
        while let Some(c) = self.source.peek_char() {
            if is_letter_or_digit(c) {
                self.source.next_char();
            } else {
                break;
            }
        }
    }
}

/// Specialised words.
impl<'a> Lexer<'a> {
    fn consume_word_token(&mut self) -> Token {
        self.consume_word();

        let fragment = &self.source.original[self.token_start.position..self.source.offset()];

        // Longest match: the two word form wins over the identifier `GO`.
        if fragment == "GO" && self.match_second_word("TO") {
            return self.make_token(TokenKind::Keyword(Keyword::Goto));
        }

        match Keyword::parse(fragment) {
            Some(Keyword::Rem) => {
                let token = self.make_token(TokenKind::Keyword(Keyword::Rem));
                self.erase_comment();
                token
            }
            Some(keyword) => self.make_token(TokenKind::Keyword(keyword)),
            None => self.make_token(TokenKind::Identifier),
        }
    }

    /// Consumes whitespace followed by the given word, only if the
    /// word is not the prefix of a longer identifier.
    fn match_second_word(&mut self, word: &str) -> bool {
        let mut count = 0;
        let mut blanks = 0;

        self.source.reset_peek();
        let mut peeked = self.source.peek_next();
        while let Some(' ' | '\t') = peeked {
            blanks += 1;
            peeked = self.source.peek_next();
        }

        if blanks == 0 {
            self.source.reset_peek();
            return false;
        }
        count += blanks;

        for expected in word.chars() {
            if peeked != Some(expected) {
                self.source.reset_peek();
                return false;
            }
            count += 1;
            peeked = self.source.peek_next();
        }

        let is_word_end = !matches!(peeked, Some(c) if is_letter_or_digit(c));
        self.source.reset_peek();

        if is_word_end {
            for _ in 0..count {
                self.source.next_char();
            }
        }

        is_word_end
    }

    /// Erase comment up to, but not including, the trailing newline.
    fn erase_comment(&mut self) {
        while let Some(c) = self.source.peek_char() {
            if c == '\n' {
                break;
            }
            self.source.next_char();
        }
    }
}

fn is_letter_or_digit(c: char) -> bool {
    matches!(c, '_' | 'a'..='z' | 'A'..='Z' | '0'..='9')
}

/// Wrapper for source code that keeps a cursor position.
///
/// Allows forward lookup via peeking.
struct SourceText<'a> {
    original: &'a str,

    /// Iterator over UTF-8 encoded source code.
    ///
    /// `MultiPeek` advances an internal peek cursor on every `peek()`, and
    /// restores it on `next()` or `reset_peek()`.
    chars: MultiPeek<CharIndices<'a>>,

    /// Byte position and character that was consumed last.
    current: (usize, char),
    /// Byte offset just past the last consumed character.
    offset: usize,
    current_line: usize,
    current_column: usize,

    /// Position of the character that will be consumed next.
    next_line: usize,
    next_column: usize,
}

impl<'a> SourceText<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            original: source,
            chars: multipeek(source.char_indices()),
            current: (0, '\0'),
            offset: 0,
            current_line: 1,
            current_column: 1,
            next_line: 1,
            next_column: 1,
        }
    }

    /// Advance the cursor and return the next character.
    fn next_char(&mut self) -> Option<char> {
        let (index, c) = self.chars.next()?;

        self.current = (index, c);
        self.offset = index + c.len_utf8();
        self.current_line = self.next_line;
        self.current_column = self.next_column;

        if c == '\n' {
            self.next_line += 1;
            self.next_column = 1;
        } else {
            self.next_column += 1;
        }

        Some(c)
    }

    /// Single character lookahead. Idempotent.
    fn peek_char(&mut self) -> Option<char> {
        self.chars.reset_peek();
        let peeked = self.chars.peek().map(|(_, c)| *c);
        self.chars.reset_peek();
        peeked
    }

    /// Two character lookahead. Idempotent.
    fn peek_char2(&mut self) -> (Option<char>, Option<char>) {
        self.chars.reset_peek();
        let first = self.chars.peek().map(|(_, c)| *c);
        let second = self.chars.peek().map(|(_, c)| *c);
        self.chars.reset_peek();
        (first, second)
    }

    /// Advances the peek cursor by one each call.
    fn peek_next(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn reset_peek(&mut self) {
        self.chars.reset_peek()
    }

    /// Byte offset just past the last consumed character.
    fn offset(&self) -> usize {
        self.offset
    }

    fn current_pos(&self) -> SourcePos {
        SourcePos {
            position: self.current.0,
            line: self.current_line,
            column: self.current_column,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct SourcePos {
    position: usize,
    line: usize,
    column: usize,
}
