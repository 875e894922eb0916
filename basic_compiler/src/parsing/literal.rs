//! Literal values.
use super::Parser;
use crate::{
    ast::{Literal, NodeId, NodeKind},
    error::{CompileResult, ErrorKind},
    tokens::{LiteralKind, Token, TokenKind},
    types::ValueType,
};
use smol_str::SmolStr;

impl Parser {
    /// Literal node for a scanned literal token.
    ///
    /// String literals are given a data section label right away.
    pub(super) fn literal(&mut self, token: &Token, negative: bool) -> CompileResult<NodeId> {
        let ty = match token.kind {
            TokenKind::Literal(LiteralKind::Int) => ValueType::Int,
            TokenKind::Literal(LiteralKind::Decimal) => ValueType::Float,
            TokenKind::Literal(LiteralKind::String) => ValueType::String,
            kind => {
                return Err(self.error_at(
                    ErrorKind::Syntax,
                    token,
                    format!("expected a literal, found {kind}"),
                ))
            }
        };

        let text = if negative {
            SmolStr::new(format!("-{}", token.text))
        } else {
            token.text.clone()
        };

        if ty == ValueType::Int && text.parse::<i32>().is_err() {
            let err = self.error_at(
                ErrorKind::Semantic,
                token,
                format!("Integer literal {text} does not fit in 32 bits."),
            );
            self.report(err)?;
        }

        Ok(self.literal_node(text, ty))
    }

    /// Literal that doesn't appear in the source text.
    pub(super) fn synthesized_literal(&mut self, text: &str, ty: ValueType) -> NodeId {
        self.literal_node(SmolStr::new(text), ty)
    }

    fn literal_node(&mut self, text: SmolStr, ty: ValueType) -> NodeId {
        let node = self
            .ast
            .add_node(NodeKind::Literal(Literal { text, ty, label: None }), self.line_number);

        if ty == ValueType::String {
            self.ast.register_string(node);
        }

        node
    }
}
