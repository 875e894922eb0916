//! Array declarations.
use super::Parser;
use crate::{
    ast::{linear_offset, NodeKind, VarId, Variable},
    error::{CompileResult, ErrorKind},
    tokens::{LiteralKind, Operator, Separator, Token, TokenKind},
    types::ValueType,
};
use log::trace;

impl Parser {
    /// `DIM name[d0][d1]... [= {...}]`
    pub(super) fn dim_stmt(&mut self) -> CompileResult<()> {
        use TokenKind as T;

        let name = self.expect(T::Identifier)?;

        let mut dims = vec![];
        while self.stream.match_token(T::Separator(Separator::LeftBracket)) {
            let size = self.expect(T::Literal(LiteralKind::Int))?;
            self.expect(T::Separator(Separator::RightBracket))?;

            match size.text.parse::<usize>() {
                Ok(size) if size > 0 => dims.push(size),
                _ => {
                    let err = self.error_at(
                        ErrorKind::Semantic,
                        &size,
                        format!("Dimension of {} must be a positive integer, not {}.", name.text, size.text),
                    );
                    self.report(err)?;
                    dims.push(1);
                }
            }
        }

        let scope = self.current_scope();
        if self.ast.lookup(scope, &name.text).is_some() {
            let err = self.error_at(
                ErrorKind::Semantic,
                &name,
                format!("Variable {} is already declared in this scope.", name.text),
            );
            self.report(err)?;
        }

        let mut variable = Variable::new(name.text.clone(), dims, scope);
        if variable.size().is_none() {
            let err = self.error_at(
                ErrorKind::Semantic,
                &name,
                format!("Array {} is too large.", name.text),
            );
            self.report(err)?;
            variable.dims.iter_mut().for_each(|dim| *dim = 1);
        }

        let var = self.ast.declare(variable)?;
        trace!("line {}: declared {}", self.line_number, self.ast.variable(var));

        let has_eq = self.stream.match_token(T::Operator(Operator::Eq));
        if has_eq || self.stream.peek_kind() == Some(T::Separator(Separator::LeftBrace)) {
            self.initializer(var, &name)?;
        }

        Ok(())
    }

    /// Brace nested literal list, flattened into one assignment per element.
    ///
    /// The element index is tracked per nesting level. Entering a brace
    /// resets its level and every level below it, a comma advances the
    /// current level.
    fn initializer(&mut self, var: VarId, name: &Token) -> CompileResult<()> {
        use TokenKind as T;

        let dims = self.ast.variable(var).dims.clone();
        let mut index = vec![0_usize; dims.len()];
        let mut depth = 0_usize;

        self.expect(T::Separator(Separator::LeftBrace))?;
        self.enter_brace(&mut index, &mut depth, name)?;

        while depth > 0 {
            let token = self.advance()?;
            match token.kind {
                T::Separator(Separator::LeftBrace) => self.enter_brace(&mut index, &mut depth, name)?,
                T::Separator(Separator::RightBrace) => depth -= 1,
                T::Separator(Separator::Comma) => {
                    if let Some(level) = index.get_mut(depth - 1) {
                        *level += 1;
                    }
                }
                T::Operator(Operator::Minus) => {
                    let number = self.advance()?;
                    if !matches!(number.kind, T::Literal(LiteralKind::Int | LiteralKind::Decimal)) {
                        return Err(self.error_at(
                            ErrorKind::Syntax,
                            &number,
                            format!("expected a number after '-', found {}", number.kind),
                        ));
                    }
                    self.initial_element(var, name, &index, &number, true)?;
                }
                T::Literal(_) => self.initial_element(var, name, &index, &token, false)?,
                kind => {
                    return Err(self.error_at(
                        ErrorKind::Syntax,
                        &token,
                        format!("unexpected {kind} in array initializer"),
                    ))
                }
            }
        }

        Ok(())
    }

    fn enter_brace(&mut self, index: &mut [usize], depth: &mut usize, name: &Token) -> CompileResult<()> {
        *depth += 1;

        if *depth > index.len() {
            let err = self.error_at(
                ErrorKind::Semantic,
                name,
                format!(
                    "Initializer of {} is nested deeper than its {} dimensions.",
                    name.text,
                    index.len()
                ),
            );
            self.report(err)?;
        } else {
            index[*depth - 1..].iter_mut().for_each(|level| *level = 0);
        }

        Ok(())
    }

    fn initial_element(
        &mut self,
        var: VarId,
        name: &Token,
        index: &[usize],
        token: &Token,
        negative: bool,
    ) -> CompileResult<()> {
        let value = self.literal(token, negative)?;

        if linear_offset(&self.ast.variable(var).dims, index).is_none() {
            let err = self.error_at(
                ErrorKind::Semantic,
                token,
                format!("Initializer element {:?} is outside the shape of {}.", index, name.text),
            );
            return self.report(err);
        }

        let target = self.ast.add_node(NodeKind::Variable(var), self.line_number);
        for i in index {
            let literal = self.synthesized_literal(&i.to_string(), ValueType::Int);
            self.ast.add_child(target, literal);
        }

        let assign = self.assignment(name, target, value)?;
        self.attach_statement(assign);

        Ok(())
    }
}
