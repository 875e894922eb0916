//! Stack frame layout.
use crate::{
    ast::{Ast, NodeId, MAX_FRAME_SIZE},
    error::{CompileError, CompileResult},
};
use log::trace;

/// Frame relative storage of the scopes currently entered.
///
/// Addresses are byte distances below `%ebp`. A variable at address
/// `n` occupies `[%ebp - n, %ebp - n + size)`, so the first scalar of
/// the program lives at `-4(%ebp)`. Nested scopes are laid out below
/// their parent and release their space when left.
#[derive(Debug, Default)]
pub struct Frame {
    /// Bytes reserved by every entered scope.
    top: u32,
}

impl Frame {
    /// Assign addresses to the variables of a scope, in declaration order.
    ///
    /// Returns the number of bytes the scope reserves. Fails when the
    /// frame outgrows a 32-bit displacement.
    pub fn enter(&mut self, ast: &mut Ast, scope: NodeId) -> CompileResult<u32> {
        let vars = ast
            .scope(scope)
            .map(|scope| scope.vars().to_vec())
            .unwrap_or_default();

        let base = self.top;
        for var in vars {
            let variable = ast.variable_mut(var);
            let top = variable
                .size()
                .and_then(|size| self.top.checked_add(size))
                .filter(|top| *top <= MAX_FRAME_SIZE)
                .ok_or_else(|| {
                    CompileError::codegen(format!("stack frame is too large to hold {}", variable.name))
                })?;

            self.top = top;
            variable.address = Some(top);
            trace!("{} at -{}(%ebp)", variable, top);
        }

        Ok(self.top - base)
    }

    /// Release the bytes reserved by the innermost entered scope.
    pub fn leave(&mut self, size: u32) {
        self.top -= size;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ast::{NodeKind, Scope, Variable};

    #[test]
    fn test_addresses_follow_declaration_order() {
        let mut ast = Ast::new();
        let root = ast.root();
        let x = ast.declare(Variable::new("X", vec![], root)).unwrap();
        let a = ast.declare(Variable::new("A", vec![3], root)).unwrap();
        let y = ast.declare(Variable::new("Y", vec![], root)).unwrap();

        let mut frame = Frame::default();
        assert_eq!(frame.enter(&mut ast, root).unwrap(), 20);
        assert_eq!(ast.variable(x).address, Some(4));
        assert_eq!(ast.variable(a).address, Some(16));
        assert_eq!(ast.variable(y).address, Some(20));
    }

    #[test]
    fn test_nested_scope_does_not_alias_parent() {
        let mut ast = Ast::new();
        let root = ast.root();
        let body = ast.add_node(NodeKind::SubRoutine(Scope::default()), 20);
        ast.add_child(root, body);
        let sibling = ast.add_node(NodeKind::SubRoutine(Scope::default()), 50);
        ast.add_child(root, sibling);

        ast.declare(Variable::new("X", vec![], root)).unwrap();
        let inner = ast.declare(Variable::new("B", vec![2, 2], body)).unwrap();
        let other = ast.declare(Variable::new("Z", vec![], sibling)).unwrap();

        let mut frame = Frame::default();
        assert_eq!(frame.enter(&mut ast, root).unwrap(), 4);

        let size = frame.enter(&mut ast, body).unwrap();
        assert_eq!(size, 16);
        assert_eq!(ast.variable(inner).address, Some(20));
        frame.leave(size);

        // Siblings reuse the space released by the previous scope.
        assert_eq!(frame.enter(&mut ast, sibling).unwrap(), 4);
        assert_eq!(ast.variable(other).address, Some(8));
    }

    #[test]
    fn test_frame_overflow() {
        let mut ast = Ast::new();
        let root = ast.root();
        // Each fits on its own, together they don't.
        ast.declare(Variable::new("A", vec![400_000_000], root)).unwrap();
        ast.declare(Variable::new("B", vec![400_000_000], root)).unwrap();

        let err = Frame::default().enter(&mut ast, root).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::CodeGen);
        assert_eq!(err.message, "stack frame is too large to hold B");
    }
}
