//! Variable references and assignment targets.
use super::Parser;
use crate::{
    ast::{NodeId, NodeKind, VarId, Variable},
    error::{CompileResult, ErrorKind},
    tokens::{Separator, Token, TokenKind},
    types::ValueType,
};
use log::trace;

impl Parser {
    /// Find a declaration visible from the innermost scope.
    pub(super) fn resolve(&self, name: &str) -> Option<VarId> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| self.ast.lookup(*scope, name))
    }

    /// Bracketed index expressions following an identifier.
    pub(super) fn indices(&mut self) -> CompileResult<Vec<NodeId>> {
        let mut indices = vec![];

        while let Ok(bracket) = self.stream.consume(TokenKind::Separator(Separator::LeftBracket)) {
            let index = self.expression()?;
            self.expect(TokenKind::Separator(Separator::RightBracket))?;

            if let Some(ty @ (ValueType::Float | ValueType::String)) = self.ast.expr_type(index) {
                let err = self.error_at(
                    ErrorKind::Semantic,
                    &bracket,
                    format!("Array index must be int, not {ty}."),
                );
                self.report(err)?;
            }

            indices.push(index);
        }

        Ok(indices)
    }

    /// Variable used as an operand. It must already be declared.
    pub(super) fn variable_read(&mut self, name: &Token) -> CompileResult<NodeId> {
        let indices = self.indices()?;

        let var = match self.resolve(&name.text) {
            Some(var) => var,
            None => {
                let err = self.error_at(
                    ErrorKind::Semantic,
                    name,
                    format!("Variable {} is not initialized.", name.text),
                );
                self.report(err)?;

                // Declared on the spot so the same name isn't reported twice.
                let scope = self.current_scope();
                self.ast
                    .declare(Variable::new(name.text.clone(), vec![1; indices.len()], scope))?
            }
        };

        self.reference(var, name, indices)
    }

    /// Variable written to by an assignment or READ.
    ///
    /// Names not visible from the innermost scope are declared in it.
    pub(super) fn target(&mut self, name: &Token, indices: Vec<NodeId>) -> CompileResult<NodeId> {
        let var = match self.resolve(&name.text) {
            Some(var) => var,
            None => {
                let scope = self.current_scope();
                let var = self.ast.declare(Variable::new(name.text.clone(), vec![], scope))?;
                trace!("line {}: declared {} in scope {}", self.line_number, name.text, scope);
                var
            }
        };

        self.reference(var, name, indices)
    }

    fn reference(&mut self, var: VarId, name: &Token, indices: Vec<NodeId>) -> CompileResult<NodeId> {
        let expected = self.ast.variable(var).dims.len();
        if expected != indices.len() {
            let err = self.error_at(
                ErrorKind::Semantic,
                name,
                format!(
                    "Wrong dimensions. The variable {} has {} dimensions, not {}.",
                    name.text,
                    expected,
                    indices.len()
                ),
            );
            self.report(err)?;
        }

        let node = self.ast.add_node(NodeKind::Variable(var), self.line_number);
        for index in indices {
            self.ast.add_child(node, index);
        }

        Ok(node)
    }

    /// Assignment of a value to a target reference.
    ///
    /// The first assignment gives an untyped variable its type, after
    /// that the types must match exactly.
    pub(super) fn assignment(&mut self, name: &Token, target: NodeId, value: NodeId) -> CompileResult<NodeId> {
        if let NodeKind::Variable(var) = self.ast.kind(target) {
            let var = *var;
            let found = self.ast.expr_type(value);

            match (self.ast.variable(var).ty, found) {
                (None, found) => self.ast.variable_mut(var).ty = found,
                (Some(expected), Some(found)) if expected != found => {
                    let err = self.error_at(
                        ErrorKind::Semantic,
                        name,
                        format!("Type mismatch. Variable {} is {expected}, not {found}.", name.text),
                    );
                    self.report(err)?;
                }
                _ => {}
            }
        }

        let assign = self.ast.add_node(NodeKind::Assign, self.line_number);
        self.ast.add_child(assign, target);
        self.ast.add_child(assign, value);

        Ok(assign)
    }
}
