//! Result and errors.
use crate::tokens::Span;
use std::fmt::{self, Display, Formatter};

pub type CompileResult<T> = std::result::Result<T, CompileError>;

/// Error raised by one of the compilation stages.
///
/// Compilation is aborted on the first error, unless the semantic
/// analyser was configured to collect errors. See [`Diagnostics`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    pub kind: ErrorKind,
    pub message: String,
    /// BASIC line number of the statement being compiled.
    pub line_number: Option<u32>,
    /// Physical position of the offending token in the source text.
    pub position: Option<Position>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unmatched character or unterminated string.
    Lexical,
    /// Unexpected token, missing keyword or unbalanced construct.
    Syntax,
    /// Undefined variable, type mismatch or wrong array dimensions.
    Semantic,
    /// Node or operator the generator can't lower.
    CodeGen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl From<Span> for Position {
    fn from(span: Span) -> Self {
        Position {
            line: span.line,
            column: span.column,
        }
    }
}

impl CompileError {
    pub fn new(kind: ErrorKind, message: impl ToString) -> Self {
        Self {
            kind,
            message: message.to_string(),
            line_number: None,
            position: None,
        }
    }

    #[inline]
    pub fn lexical(message: impl ToString) -> Self {
        Self::new(ErrorKind::Lexical, message)
    }

    #[inline]
    pub fn syntax(message: impl ToString) -> Self {
        Self::new(ErrorKind::Syntax, message)
    }

    #[inline]
    pub fn semantic(message: impl ToString) -> Self {
        Self::new(ErrorKind::Semantic, message)
    }

    #[inline]
    pub fn codegen(message: impl ToString) -> Self {
        Self::new(ErrorKind::CodeGen, message)
    }

    pub fn with_line_number(mut self, line_number: u32) -> Self {
        self.line_number = Some(line_number);
        self
    }

    pub fn with_position(mut self, position: impl Into<Position>) -> Self {
        self.position = Some(position.into());
        self
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lexical => write!(f, "lexical error"),
            Self::Syntax => write!(f, "syntax error"),
            Self::Semantic => write!(f, "semantic error"),
            Self::CodeGen => write!(f, "code generation error"),
        }
    }
}

impl Display for CompileError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(line_number) = self.line_number {
            write!(f, " at line {line_number}")?;
        }
        if let Some(Position { line, column }) = self.position {
            write!(f, " ({line}:{column})")?;
        }
        write!(f, ": {}", self.message)
    }
}

impl std::error::Error for CompileError {}

/// Every error reported by one compilation.
///
/// Never empty. In fail-fast mode it holds exactly one error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostics {
    errors: Vec<CompileError>,
}

impl Diagnostics {
    /// Returns `None` when there is nothing to report.
    pub fn from_errors(errors: Vec<CompileError>) -> Option<Self> {
        if errors.is_empty() {
            None
        } else {
            Some(Self { errors })
        }
    }

    /// The error that aborted, or would have aborted, compilation.
    pub fn first(&self) -> &CompileError {
        &self.errors[0]
    }

    pub fn errors(&self) -> &[CompileError] {
        &self.errors
    }
}

impl From<CompileError> for Diagnostics {
    fn from(err: CompileError) -> Self {
        Self { errors: vec![err] }
    }
}

impl Display for Diagnostics {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostics {}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_display_with_location() {
        let err = CompileError::semantic("Variable X is not initialized.")
            .with_line_number(20)
            .with_position(Position { line: 2, column: 13 });
        assert_eq!(
            err.to_string(),
            "semantic error at line 20 (2:13): Variable X is not initialized."
        );
    }

    #[test]
    fn test_empty_diagnostics() {
        assert!(Diagnostics::from_errors(vec![]).is_none());
    }
}
