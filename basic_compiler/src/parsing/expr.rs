//! Expression parsing.
//!
//! An expression is scanned as a flat run of operands separated by
//! arithmetic operators, then reduced in two passes. The first pass
//! folds the multiplicative operators (`*`, `/`, `^`) into their
//! neighbours, the second left-folds what remains. The result is the
//! usual precedence, with every level left associative.
use super::Parser;
use crate::{
    ast::{NodeId, NodeKind, OperatorNode},
    error::{CompileResult, ErrorKind},
    tokens::{LiteralKind, Operator, Separator, Token, TokenKind},
    types::ValueType,
};

impl Parser {
    pub(super) fn expression(&mut self) -> CompileResult<NodeId> {
        let mut operands = vec![self.operand()?];
        let mut operators = vec![];

        while let Some(operator) = self.peek_arithmetic() {
            let token = self.advance()?;
            operators.push((operator, token));
            operands.push(self.operand()?);
        }

        self.fold(operands, operators)
    }

    fn peek_arithmetic(&self) -> Option<Operator> {
        match self.stream.peek_kind() {
            Some(TokenKind::Operator(operator)) if operator.is_arithmetic() => Some(operator),
            _ => None,
        }
    }

    /// Reduce `N` operands and `N - 1` operators to a single tree.
    fn fold(&mut self, operands: Vec<NodeId>, operators: Vec<(Operator, Token)>) -> CompileResult<NodeId> {
        let mut operands = operands.into_iter();
        let mut left = match operands.next() {
            Some(first) => first,
            None => return Err(self.error_here(ErrorKind::Syntax, "expected an expression")),
        };

        // Pass 1: multiplicative operators take the operand to their
        // right immediately. The product becomes the left operand of
        // whatever operator follows.
        let mut reduced = vec![];
        let mut additive = vec![];
        for ((operator, token), right) in operators.into_iter().zip(operands) {
            if operator.is_multiplicative() {
                left = self.binary(operator, &token, left, right)?;
            } else {
                reduced.push(left);
                additive.push((operator, token));
                left = right;
            }
        }
        reduced.push(left);

        // Pass 2
        let mut reduced = reduced.into_iter();
        let mut acc = match reduced.next() {
            Some(first) => first,
            None => return Err(self.error_here(ErrorKind::Syntax, "expected an expression")),
        };
        for ((operator, token), right) in additive.into_iter().zip(reduced) {
            acc = self.binary(operator, &token, acc, right)?;
        }

        Ok(acc)
    }

    fn operand(&mut self) -> CompileResult<NodeId> {
        use TokenKind as T;

        let token = self.advance()?;
        match token.kind {
            T::Operator(Operator::Minus) => self.negation(&token),
            T::Separator(Separator::LeftParen) => self.parenthesized(),
            T::Identifier => self.variable_read(&token),
            T::Literal(_) => self.literal(&token, false),
            kind => Err(self.error_at(
                ErrorKind::Syntax,
                &token,
                format!("expected an expression, found {kind}"),
            )),
        }
    }

    fn parenthesized(&mut self) -> CompileResult<NodeId> {
        let inner = self.expression()?;
        self.expect(TokenKind::Separator(Separator::RightParen))?;
        Ok(inner)
    }

    /// Unary minus.
    ///
    /// Numeric literals absorb the sign. Anything else is multiplied
    /// by `-1`.
    fn negation(&mut self, minus: &Token) -> CompileResult<NodeId> {
        use TokenKind as T;

        let token = self.advance()?;
        let operand = match token.kind {
            T::Literal(LiteralKind::Int | LiteralKind::Decimal) => return self.literal(&token, true),
            T::Identifier => self.variable_read(&token)?,
            T::Separator(Separator::LeftParen) => self.parenthesized()?,
            kind => {
                return Err(self.error_at(
                    ErrorKind::Syntax,
                    &token,
                    format!("expected a number, variable or '(' after unary minus, found {kind}"),
                ))
            }
        };

        let product = self.ast.add_node(
            NodeKind::Operator(OperatorNode {
                operator: Operator::Star,
                ty: None,
            }),
            self.line_number,
        );
        let minus_one = self.synthesized_literal("-1", ValueType::Int);
        self.ast.split_parent(operand, product);
        self.ast.add_child(product, minus_one);
        self.infer_operator(product, minus)?;

        Ok(product)
    }

    /// Operator node with both operands attached and its type resolved.
    pub(super) fn binary(&mut self, operator: Operator, token: &Token, lhs: NodeId, rhs: NodeId) -> CompileResult<NodeId> {
        let node = self.ast.add_node(NodeKind::Operator(OperatorNode { operator, ty: None }), self.line_number);
        self.ast.add_child(node, lhs);
        self.ast.add_child(node, rhs);
        self.infer_operator(node, token)?;
        Ok(node)
    }

    fn infer_operator(&mut self, node: NodeId, token: &Token) -> CompileResult<()> {
        use ValueType as V;

        let (lhs, rhs) = match self.ast.children(node) {
            [lhs, rhs] => (*lhs, *rhs),
            _ => return Ok(()),
        };

        let ty = match (self.ast.expr_type(lhs), self.ast.expr_type(rhs)) {
            (Some(lhs), Some(rhs)) => match V::resolve(lhs, rhs) {
                Ok(ty) => Some(ty),
                Err(err) => {
                    let err = self.error_at(
                        ErrorKind::Semantic,
                        token,
                        format!("Type mismatch. Operator {}: {err}.", token.text),
                    );
                    self.report(err)?;
                    None
                }
            },
            // Untyped operands are still dominated by int.
            (Some(V::Int), None) | (None, Some(V::Int)) => Some(V::Int),
            _ => None,
        };

        if let NodeKind::Operator(operator) = &mut self.ast.node_mut(node).kind {
            operator.ty = ty;
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use crate::{
        ast::{Ast, NodeId, NodeKind},
        lex::tokenize,
        parsing::Parser,
    };

    /// Parse `10 LET X = <expr>` and render the value in prefix form.
    fn prefix(expr: &str) -> String {
        let source = format!("10 LET X = {expr}\n");
        let ast = Parser::new(tokenize(&source).unwrap()).build_ast().unwrap();
        let assign = ast.children(ast.root())[0];
        render(&ast, ast.children(assign)[1])
    }

    fn render(ast: &Ast, node: NodeId) -> String {
        match ast.kind(node) {
            NodeKind::Literal(literal) => literal.text.to_string(),
            NodeKind::Variable(var) => ast.variable(*var).name.to_string(),
            NodeKind::Operator(op) => {
                let children = ast.children(node);
                format!(
                    "({} {} {})",
                    op.operator.symbol(),
                    render(ast, children[0]),
                    render(ast, children[1])
                )
            }
            kind => kind.name().to_string(),
        }
    }

    #[test]
    fn test_precedence() {
        assert_eq!(prefix("1 + 2 * 3"), "(+ 1 (* 2 3))");
        assert_eq!(prefix("1 * 2 + 3"), "(+ (* 1 2) 3)");
        assert_eq!(prefix("1 - 2 - 3"), "(- (- 1 2) 3)");
        assert_eq!(prefix("8 / 4 / 2"), "(/ (/ 8 4) 2)");
        assert_eq!(prefix("1 + 2 * 3 * 4 - 5"), "(- (+ 1 (* (* 2 3) 4)) 5)");
        assert_eq!(prefix("2 ^ 3 * 2"), "(* (^ 2 3) 2)");
    }

    #[test]
    fn test_parentheses() {
        assert_eq!(prefix("(1 + 2) * 3"), "(* (+ 1 2) 3)");
        assert_eq!(prefix("2 * (3 - (4 + 5))"), "(* 2 (- 3 (+ 4 5)))");
    }

    #[test]
    fn test_unary_minus() {
        assert_eq!(prefix("-5"), "-5");
        assert_eq!(prefix("3 - -5"), "(- 3 -5)");
        assert_eq!(prefix("-(1 + 2)"), "(* (+ 1 2) -1)");
    }

    #[test]
    fn test_negated_variable() {
        let source = "10 LET Y = 2\n20 LET X = 1 - -Y * 3\n";
        let ast = Parser::new(tokenize(source).unwrap()).build_ast().unwrap();
        let assign = ast.children(ast.root())[1];
        assert_eq!(render(&ast, ast.children(assign)[1]), "(- 1 (* (* Y -1) 3))");
    }
}
