//! Syntactic and semantic analysis.
//!
//! The parser builds the [`Ast`] in a single pass over the token
//! stream. Identifiers are resolved against a stack of open scopes,
//! and every expression is typed as soon as it is reduced.
mod dim;
mod expr;
mod ident;
mod literal;
mod stmts;

use crate::{
    ast::{Ast, NodeId},
    error::{CompileError, CompileResult, Diagnostics, ErrorKind},
    token_stream::{TokenError, TokenStream},
    tokens::{Token, TokenKind},
};
use log::{debug, warn};
use std::collections::HashMap;

pub struct Parser {
    stream: TokenStream,
    ast: Ast,
    /// Open scopes, innermost last.
    ///
    /// The program scope is pushed on construction and never popped.
    scopes: Vec<NodeId>,
    /// BASIC line number of the statement being parsed.
    line_number: u32,
    /// Line numbers seen so far, mapped to the scope their statement
    /// was attached to. `None` when the line produced no code.
    lines: HashMap<u32, Option<NodeId>>,
    /// Jumps to be checked once every line is known.
    gotos: Vec<PendingGoto>,
    /// Keep going after semantic errors.
    collect_errors: bool,
    errors: Vec<CompileError>,
}

struct PendingGoto {
    target: u32,
    line_number: u32,
    scope: NodeId,
    token: Token,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        let ast = Ast::new();
        let root = ast.root();

        Self {
            stream: TokenStream::new(tokens),
            ast,
            scopes: vec![root],
            line_number: 0,
            lines: HashMap::new(),
            gotos: vec![],
            collect_errors: false,
            errors: vec![],
        }
    }

    /// Report semantic errors in bulk instead of stopping at the first one.
    ///
    /// Syntax errors always stop the parser.
    pub fn collect_errors(mut self, collect: bool) -> Self {
        self.collect_errors = collect;
        self
    }

    /// Parse the whole token stream into a tree.
    pub fn build_ast(mut self) -> Result<Ast, Diagnostics> {
        if let Err(err) = self.program() {
            self.errors.push(err);
        }

        match Diagnostics::from_errors(self.errors) {
            Some(diagnostics) => Err(diagnostics),
            None => {
                debug!(
                    "parsed {} lines into {} nodes and {} variables",
                    self.lines.len(),
                    self.ast.len(),
                    self.ast.variables().count()
                );
                Ok(self.ast)
            }
        }
    }

    fn program(&mut self) -> CompileResult<()> {
        while !self.stream.is_at_end() {
            self.statement()?;
        }

        // Every FOR and IF must be closed by an END.
        if let Some(scope) = self.scopes.get(1).copied() {
            let construct = self.ast.parent(scope).unwrap_or(scope);
            let node = self.ast.node(construct);
            return Err(CompileError::syntax(format!(
                "{} opened at line {} is never closed with END",
                node.kind.name().to_uppercase(),
                node.line_number
            )));
        }

        self.check_gotos()
    }

    /// Every jump must land on a line that produced code.
    fn check_gotos(&mut self) -> CompileResult<()> {
        for goto in std::mem::take(&mut self.gotos) {
            match self.lines.get(&goto.target) {
                Some(Some(target_scope)) if *target_scope == goto.scope => {}
                Some(Some(target_scope)) if self.encloses(*target_scope, goto.scope) => {
                    // Leaving nested scopes skips their frame release, which
                    // the enclosing scope's addressing tolerates.
                    warn!(
                        "GOTO {} at line {} jumps out of a nested scope",
                        goto.target, goto.line_number
                    );
                }
                Some(Some(_)) => {
                    let err = CompileError::semantic(format!(
                        "GOTO target {} is inside a nested scope.",
                        goto.target
                    ))
                    .with_line_number(goto.line_number)
                    .with_position(goto.token.span);
                    self.report(err)?;
                }
                Some(None) => {
                    let err = CompileError::semantic(format!(
                        "GOTO target {} is not an executable statement.",
                        goto.target
                    ))
                    .with_line_number(goto.line_number)
                    .with_position(goto.token.span);
                    self.report(err)?;
                }
                None => {
                    let err = CompileError::semantic(format!("GOTO target {} does not exist.", goto.target))
                        .with_line_number(goto.line_number)
                        .with_position(goto.token.span);
                    self.report(err)?;
                }
            }
        }

        Ok(())
    }
}

/// Scope stack.
impl Parser {
    /// Whether `outer` is `inner` or one of the scopes enclosing it.
    fn encloses(&self, outer: NodeId, inner: NodeId) -> bool {
        let mut node = Some(inner);
        while let Some(id) = node {
            if id == outer {
                return true;
            }
            node = self.ast.parent(id);
        }
        false
    }

    #[inline]
    fn current_scope(&self) -> NodeId {
        // The program scope is never popped.
        self.scopes[self.scopes.len() - 1]
    }

    fn push_scope(&mut self, scope: NodeId) {
        self.scopes.push(scope);
    }

    /// Pops the innermost scope.
    ///
    /// Returns `None` when only the program scope is open.
    fn pop_scope(&mut self) -> Option<NodeId> {
        if self.scopes.len() > 1 {
            self.scopes.pop()
        } else {
            None
        }
    }

    /// Append a statement node to the innermost scope.
    fn attach_statement(&mut self, node: NodeId) {
        let scope = self.current_scope();
        self.ast.add_child(scope, node);
        self.lines.insert(self.line_number, Some(scope));
    }
}

/// Token helpers.
impl Parser {
    /// Consume the next token, whatever it is.
    fn advance(&mut self) -> CompileResult<Token> {
        match self.stream.next_token() {
            Some(token) => Ok(token),
            None => Err(self.error_here(ErrorKind::Syntax, TokenError::EndOfSource)),
        }
    }

    /// Consume the next token, which must be of the given kind.
    fn expect(&mut self, kind: TokenKind) -> CompileResult<Token> {
        match self.stream.consume(kind) {
            Ok(token) => Ok(token),
            Err(TokenError::EndOfSource) => Err(self.error_here(ErrorKind::Syntax, TokenError::EndOfSource)),
            Err(err) => Err(CompileError::from(err).with_line_number(self.line_number)),
        }
    }
}

/// Errors.
impl Parser {
    /// Error located at the given token, within the current statement.
    fn error_at(&self, kind: ErrorKind, token: &Token, message: impl ToString) -> CompileError {
        CompileError::new(kind, message)
            .with_line_number(self.line_number)
            .with_position(token.span)
    }

    /// Error located at the current cursor.
    fn error_here(&self, kind: ErrorKind, message: impl ToString) -> CompileError {
        let err = CompileError::new(kind, message).with_line_number(self.line_number);
        match self.stream.position() {
            Some(position) => err.with_position(position),
            None => err,
        }
    }

    /// Fail, or record the error and carry on when collecting.
    ///
    /// Only semantic errors can be recovered from. The parser is left
    /// in a consistent state after each of them.
    fn report(&mut self, err: CompileError) -> CompileResult<()> {
        if self.collect_errors && err.kind == ErrorKind::Semantic {
            debug!("recovered from {err}");
            self.errors.push(err);
            Ok(())
        } else {
            Err(err)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{ast::NodeKind, lex::tokenize};

    fn parse(source: &str) -> Result<Ast, Diagnostics> {
        Parser::new(tokenize(source).unwrap()).build_ast()
    }

    #[test]
    fn test_empty_program() {
        let ast = parse("").unwrap();
        assert!(ast.children(ast.root()).is_empty());
    }

    #[test]
    fn test_unclosed_for() {
        let err = parse("10 FOR I = 1 TO 3\n20 PRINT \"%d\", I\n").unwrap_err();
        assert_eq!(err.first().kind, ErrorKind::Syntax);
        assert!(err.first().message.contains("line 10"), "{}", err);
    }

    #[test]
    fn test_goto_target_must_exist() {
        let err = parse("10 GOTO 30\n20 LET X = 1\n").unwrap_err();
        assert_eq!(err.first().kind, ErrorKind::Semantic);
        assert_eq!(err.first().line_number, Some(10));
    }

    #[test]
    fn test_goto_target_must_be_executable() {
        let err = parse("10 GOTO 20\n20 REM nothing here\n").unwrap_err();
        assert_eq!(err.first().kind, ErrorKind::Semantic);
        assert!(err.first().message.contains("not an executable"));
    }

    #[test]
    fn test_goto_into_nested_scope() {
        let err = parse("10 GOTO 30\n20 FOR I = 1 TO 2\n30 LET Y = I\n40 END\n").unwrap_err();
        assert_eq!(err.first().kind, ErrorKind::Semantic);
        assert_eq!(err.first().line_number, Some(10));
        assert!(err.first().message.contains("nested scope"), "{}", err);

        // Sibling scopes don't enclose each other either.
        let source = "10 IF 1 < 2 THEN\n20 GOTO 50\n30 END\n40 IF 2 < 3 THEN\n50 LET X = 1\n60 END\n";
        assert!(parse(source).is_err());
    }

    #[test]
    fn test_goto_out_of_nested_scope() {
        // Into the outer loop body from a sibling statement of the loop.
        let source = "10 FOR I = 1 TO 2\n20 FOR J = 1 TO 2\n30 LET X = J\n40 END\n50 END\n60 GOTO 20\n";
        assert!(parse(source).is_err());

        // Out of both loops, and from the inner body to the outer one.
        let source = "10 FOR I = 1 TO 2\n20 FOR J = 1 TO 2\n30 GOTO 60\n40 END\n50 END\n60 LET X = 1\n";
        assert!(parse(source).is_ok());

        let source = "10 FOR I = 1 TO 2\n20 LET Y = I\n30 FOR J = 1 TO 2\n40 GOTO 20\n50 END\n60 END\n";
        assert!(parse(source).is_ok());
    }

    #[test]
    fn test_backward_goto() {
        let ast = parse("10 LET X = 1\n20 GOTO 10\n").unwrap();
        let children = ast.children(ast.root());
        assert!(matches!(ast.kind(children[1]), NodeKind::GoTo { target: 10 }));
    }
}
