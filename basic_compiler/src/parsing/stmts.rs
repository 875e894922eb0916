//! Statement parsing.
use super::{Parser, PendingGoto};
use crate::{
    ast::{NodeId, NodeKind, Scope},
    error::{CompileResult, ErrorKind},
    tokens::{Keyword, LiteralKind, Operator, Separator, Token, TokenKind},
    types::ValueType,
};
use log::{trace, warn};

impl Parser {
    /// One numbered line, up to and including its newline.
    pub(super) fn statement(&mut self) -> CompileResult<()> {
        use Keyword as K;
        use TokenKind as T;

        self.line_label()?;

        let token = self.advance()?;
        match token.kind {
            T::Keyword(K::Let) => self.let_stmt()?,
            T::Identifier => {
                // Assignment without LET.
                self.stream.step_back();
                self.let_stmt()?;
            }
            T::Keyword(K::Dim) => self.dim_stmt()?,
            T::Keyword(K::Goto) => self.goto_stmt()?,
            T::Keyword(K::For) => self.for_stmt()?,
            T::Keyword(K::If) => self.if_stmt()?,
            T::Keyword(K::Else) => self.else_stmt(&token)?,
            T::Keyword(K::End) => self.end_stmt(&token)?,
            T::Keyword(K::Print) => self.print_stmt()?,
            T::Keyword(K::Println) => self.println_stmt()?,
            T::Keyword(K::Read) => self.read_stmt()?,
            T::Keyword(K::Rem) => {}
            kind => {
                return Err(self.error_at(
                    ErrorKind::Syntax,
                    &token,
                    format!("expected a statement, found {kind}"),
                ))
            }
        }

        trace!("line {}: {}", self.line_number, token.text);

        if !self.stream.match_token(T::Separator(Separator::Newline)) {
            let found = self
                .stream
                .peek_kind()
                .map_or_else(|| "end of source".to_string(), |kind| kind.to_string());
            return Err(self.error_here(
                ErrorKind::Syntax,
                format!("expected end of line after {} statement, found {found}", token.text),
            ));
        }

        Ok(())
    }

    /// Leading line number of a statement.
    fn line_label(&mut self) -> CompileResult<()> {
        let token = self.advance()?;
        if !token.is_int_literal() {
            return Err(self.error_at(
                ErrorKind::Syntax,
                &token,
                format!("expected a line number, found {}", token.kind),
            ));
        }

        let line_number = token.text.parse::<u32>().map_err(|_| {
            self.error_at(
                ErrorKind::Syntax,
                &token,
                format!("line number {} is out of range", token.text),
            )
        })?;

        if self.lines.contains_key(&line_number) {
            return Err(self.error_at(
                ErrorKind::Syntax,
                &token,
                format!("duplicate line number {line_number}"),
            ));
        }

        self.line_number = line_number;
        self.lines.insert(line_number, None);

        Ok(())
    }

    /// `[LET] name[i]... = expr`
    fn let_stmt(&mut self) -> CompileResult<()> {
        let name = self.expect(TokenKind::Identifier)?;
        let indices = self.indices()?;
        self.expect(TokenKind::Operator(Operator::Eq))?;
        let value = self.expression()?;

        let target = self.target(&name, indices)?;
        let assign = self.assignment(&name, target, value)?;
        self.attach_statement(assign);

        Ok(())
    }

    fn goto_stmt(&mut self) -> CompileResult<()> {
        let token = self.expect(TokenKind::Literal(LiteralKind::Int))?;
        let target = token.text.parse::<u32>().map_err(|_| {
            self.error_at(
                ErrorKind::Syntax,
                &token,
                format!("line number {} is out of range", token.text),
            )
        })?;

        let node = self.ast.add_node(NodeKind::GoTo { target }, self.line_number);
        self.attach_statement(node);

        self.gotos.push(PendingGoto {
            target,
            line_number: self.line_number,
            scope: self.current_scope(),
            token,
        });

        Ok(())
    }

    /// `FOR name = expr TO expr [STEP expr]`
    fn for_stmt(&mut self) -> CompileResult<()> {
        use TokenKind as T;

        let name = self.expect(T::Identifier)?;
        self.expect(T::Operator(Operator::Eq))?;
        let init = self.expression()?;
        let target = self.target(&name, vec![])?;
        let assign = self.assignment(&name, target, init)?;

        self.expect(T::Keyword(Keyword::To))?;
        let limit = self.expression()?;

        let step = if self.stream.match_token(T::Keyword(Keyword::Step)) {
            self.expression()?
        } else {
            self.synthesized_literal("1", ValueType::Int)
        };

        if let NodeKind::Literal(literal) = self.ast.kind(step) {
            if literal.text.starts_with('-') {
                warn!(
                    "FOR at line {} has negative step {}, but the loop test assumes it counts up",
                    self.line_number, literal.text
                );
            }
        }

        let node = self.ast.add_node(NodeKind::For, self.line_number);
        self.ast.add_child(node, assign);
        self.ast.add_child(node, limit);
        self.ast.add_child(node, step);

        let body = self.open_scope(node);
        self.attach_statement(node);
        self.push_scope(body);

        Ok(())
    }

    /// `IF expr comparator expr [THEN]`
    fn if_stmt(&mut self) -> CompileResult<()> {
        let lhs = self.expression()?;

        let comparator = self.advance()?;
        let operator = match comparator.kind {
            TokenKind::Operator(operator) if operator.is_comparator() => operator,
            kind => {
                return Err(self.error_at(
                    ErrorKind::Syntax,
                    &comparator,
                    format!("expected a comparison operator, found {kind}"),
                ))
            }
        };

        let rhs = self.expression()?;
        let condition = self.binary(operator, &comparator, lhs, rhs)?;
        self.stream.match_token(TokenKind::Keyword(Keyword::Then));

        let node = self.ast.add_node(NodeKind::If, self.line_number);
        self.ast.add_child(node, condition);

        let branch = self.open_scope(node);
        self.attach_statement(node);
        self.push_scope(branch);

        Ok(())
    }

    /// Closes the true branch of the innermost IF and opens its false branch.
    fn else_stmt(&mut self, keyword: &Token) -> CompileResult<()> {
        let scope = self.current_scope();

        let node = match self.ast.parent(scope) {
            Some(node) if self.is_open_true_branch(node, scope) => node,
            _ => {
                return Err(self.error_at(
                    ErrorKind::Syntax,
                    keyword,
                    "ELSE without a matching IF",
                ))
            }
        };

        self.pop_scope();
        let branch = self.open_scope(node);
        self.push_scope(branch);

        Ok(())
    }

    fn is_open_true_branch(&self, node: NodeId, scope: NodeId) -> bool {
        matches!(self.ast.kind(node), NodeKind::If)
            && matches!(self.ast.children(node), [_, branch] if *branch == scope)
    }

    fn end_stmt(&mut self, keyword: &Token) -> CompileResult<()> {
        match self.pop_scope() {
            Some(_) => Ok(()),
            None => Err(self.error_at(
                ErrorKind::Syntax,
                keyword,
                "END without a matching FOR or IF",
            )),
        }
    }

    /// New empty scope appended to the children of a FOR or IF.
    fn open_scope(&mut self, construct: NodeId) -> NodeId {
        let scope = self
            .ast
            .add_node(NodeKind::SubRoutine(Scope::default()), self.line_number);
        self.ast.add_child(construct, scope);
        scope
    }

    /// `PRINT "format" [, expr]...`
    fn print_stmt(&mut self) -> CompileResult<()> {
        let format = self.format_string("PRINT")?;
        let node = self.ast.add_node(NodeKind::Print, self.line_number);
        self.ast.add_child(node, format);

        while self.stream.match_token(TokenKind::Separator(Separator::Comma)) {
            let arg = self.expression()?;
            self.ast.add_child(node, arg);
        }

        self.attach_statement(node);

        Ok(())
    }

    /// `PRINTLN [name[i]...]`
    fn println_stmt(&mut self) -> CompileResult<()> {
        let node = self.ast.add_node(NodeKind::Println, self.line_number);

        if self.stream.peek().map_or(true, Token::is_newline) {
            let format = self.synthesized_literal("\"\\n\"", ValueType::String);
            self.ast.add_child(node, format);
        } else {
            let name = self.expect(TokenKind::Identifier)?;
            let arg = self.variable_read(&name)?;
            let format = match self.ast.expr_type(arg) {
                Some(ValueType::String) => "\"%s\\n\"",
                _ => "\"%d\\n\"",
            };
            let format = self.synthesized_literal(format, ValueType::String);
            self.ast.add_child(node, format);
            self.ast.add_child(node, arg);
        }

        self.attach_statement(node);

        Ok(())
    }

    /// `READ "format" [, name[i]]...`
    fn read_stmt(&mut self) -> CompileResult<()> {
        let format = self.format_string("READ")?;
        let node = self.ast.add_node(NodeKind::Read, self.line_number);
        self.ast.add_child(node, format);

        while self.stream.match_token(TokenKind::Separator(Separator::Comma)) {
            let name = self.expect(TokenKind::Identifier)?;
            let indices = self.indices()?;
            let target = self.target(&name, indices)?;

            // Untyped targets are read as integers.
            if let NodeKind::Variable(var) = *self.ast.kind(target) {
                self.ast.variable_mut(var).ty.get_or_insert(ValueType::Int);
            }

            self.ast.add_child(node, target);
        }

        self.attach_statement(node);

        Ok(())
    }

    /// First argument of PRINT and READ.
    fn format_string(&mut self, statement: &str) -> CompileResult<NodeId> {
        if let Some(TokenKind::Literal(LiteralKind::String)) = self.stream.peek_kind() {
            let token = self.advance()?;
            return self.literal(&token, false);
        }

        let err = self.error_here(
            ErrorKind::Semantic,
            format!("The first argument of {statement} must be a string literal."),
        );
        self.report(err)?;

        self.expression()
    }
}
