use smol_str::SmolStr;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Source fragment the token was scanned from.
    ///
    /// String literals keep their surrounding quotes.
    pub text: SmolStr,
    pub span: Span,
}

impl Token {
    #[inline]
    pub fn is_newline(&self) -> bool {
        self.kind == TokenKind::Separator(Separator::Newline)
    }

    #[inline]
    pub fn is_keyword(&self, keyword: Keyword) -> bool {
        self.kind == TokenKind::Keyword(keyword)
    }

    #[inline]
    pub fn is_separator(&self, separator: Separator) -> bool {
        self.kind == TokenKind::Separator(separator)
    }

    #[inline]
    pub fn is_operator(&self, operator: Operator) -> bool {
        self.kind == TokenKind::Operator(operator)
    }

    /// Unsigned integer literal, as used for line numbers and dimension sizes.
    #[inline]
    pub fn is_int_literal(&self) -> bool {
        self.kind == TokenKind::Literal(LiteralKind::Int)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    /// Identifier in the set of reserved words.
    Keyword(Keyword),
    Separator(Separator),
    Operator(Operator),
    Literal(LiteralKind),
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TokenKind::Identifier => write!(f, "identifier"),
            TokenKind::Keyword(keyword) => write!(f, "keyword {}", keyword),
            TokenKind::Separator(sep) => write!(f, "separator {}", sep),
            TokenKind::Operator(op) => write!(f, "operator {}", op),
            TokenKind::Literal(lit) => write!(f, "{} literal", lit),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Let,
    Dim,
    Goto,
    For,
    To,
    Step,
    End,
    If,
    Then,
    Else,
    Print,
    Println,
    Read,
    Rem,
}

impl Keyword {
    /// Lookup a single word in the reserved word table.
    ///
    /// Keywords are case sensitive.
    #[rustfmt::skip]
    pub fn parse(text: impl AsRef<str>) -> Option<Self> {
        use Keyword as K;
        match text.as_ref() {
            "LET"     => Some(K::Let),
            "DIM"     => Some(K::Dim),
            "GOTO"    => Some(K::Goto),
            "FOR"     => Some(K::For),
            "TO"      => Some(K::To),
            "STEP"    => Some(K::Step),
            "END"     => Some(K::End),
            "IF"      => Some(K::If),
            "THEN"    => Some(K::Then),
            "ELSE"    => Some(K::Else),
            "PRINT"   => Some(K::Print),
            "PRINTLN" => Some(K::Println),
            "READ"    => Some(K::Read),
            "REM"     => Some(K::Rem),
            _         => None,
        }
    }
}

impl fmt::Display for Keyword {
    #[rustfmt::skip]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use Keyword as K;
        match self {
            K::Let     => write!(f, "LET"),
            K::Dim     => write!(f, "DIM"),
            K::Goto    => write!(f, "GOTO"),
            K::For     => write!(f, "FOR"),
            K::To      => write!(f, "TO"),
            K::Step    => write!(f, "STEP"),
            K::End     => write!(f, "END"),
            K::If      => write!(f, "IF"),
            K::Then    => write!(f, "THEN"),
            K::Else    => write!(f, "ELSE"),
            K::Print   => write!(f, "PRINT"),
            K::Println => write!(f, "PRINTLN"),
            K::Read    => write!(f, "READ"),
            K::Rem     => write!(f, "REM"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[rustfmt::skip]
pub enum Separator {
    LeftParen,    // (
    RightParen,   // )
    LeftBracket,  // [
    RightBracket, // ]
    LeftBrace,    // {
    RightBrace,   // }
    Comma,        // ,
    /// End of statement
    Newline,
}

impl fmt::Display for Separator {
    #[rustfmt::skip]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use Separator as S;
        match self {
            S::LeftParen    => write!(f, "'('"),
            S::RightParen   => write!(f, "')'"),
            S::LeftBracket  => write!(f, "'['"),
            S::RightBracket => write!(f, "']'"),
            S::LeftBrace    => write!(f, "'{{'"),
            S::RightBrace   => write!(f, "'}}'"),
            S::Comma        => write!(f, "','"),
            S::Newline      => write!(f, "newline"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[rustfmt::skip]
pub enum Operator {
    Plus,      // +
    Minus,     // -
    Star,      // *
    Slash,     // /
    Caret,     // ^
    Eq,        // =
    EqEq,      // ==
    NotEq,     // <>
    Less,      // <
    LessEq,    // <=
    Greater,   // >
    GreaterEq, // >=
}

impl Operator {
    /// Operators that bind tighter than `+` and `-`.
    #[inline]
    pub fn is_multiplicative(&self) -> bool {
        matches!(self, Operator::Star | Operator::Slash | Operator::Caret)
    }

    #[inline]
    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            Operator::Plus | Operator::Minus | Operator::Star | Operator::Slash | Operator::Caret
        )
    }

    #[inline]
    pub fn is_comparator(&self) -> bool {
        !self.is_arithmetic()
    }

    #[rustfmt::skip]
    pub fn symbol(&self) -> &'static str {
        use Operator as O;
        match self {
            O::Plus      => "+",
            O::Minus     => "-",
            O::Star      => "*",
            O::Slash     => "/",
            O::Caret     => "^",
            O::Eq        => "=",
            O::EqEq      => "==",
            O::NotEq     => "<>",
            O::Less      => "<",
            O::LessEq    => "<=",
            O::Greater   => ">",
            O::GreaterEq => ">=",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "'{}'", self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralKind {
    /// `[0-9]+`
    Int,
    /// `[0-9]*\.[0-9]+`
    Decimal,
    /// Double quoted, escapes kept verbatim.
    String,
}

impl fmt::Display for LiteralKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LiteralKind::Int => write!(f, "integer"),
            LiteralKind::Decimal => write!(f, "decimal"),
            LiteralKind::String => write!(f, "string"),
        }
    }
}

/// Chunk of source code, encoded as starting and ending positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// Start position of bytes in source.
    pub start: usize,
    /// End position of bytes in source, exclusive.
    pub end: usize,
    /// Physical line, starting at 1.
    pub line: usize,
    pub column: usize,
}

impl Span {
    #[inline]
    pub fn fragment<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start..self.end]
    }
}
