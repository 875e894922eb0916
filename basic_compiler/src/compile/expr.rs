//! Expression lowering.
use super::{operands, CodeGen, Cond, Operand, Reg, IR};
use crate::{
    ast::{strides, Ast, Literal, NodeId, NodeKind, OperatorNode, WORD_SIZE},
    error::{CompileError, CompileResult},
    tokens::Operator,
    types::ValueType,
};
use smol_str::SmolStr;

impl CodeGen {
    /// Evaluate an expression and push its value.
    pub(super) fn emit_expr(&mut self, ast: &Ast, expr: NodeId) -> CompileResult<()> {
        match ast.kind(expr) {
            NodeKind::Literal(literal) => self.emit_literal(literal),
            NodeKind::Variable(var) => {
                if ast.variable(*var).ty == Some(ValueType::Float) {
                    return Err(float_unsupported());
                }
                let src = self.emit_address(ast, expr)?;
                self.emit(IR::Push(src));
                Ok(())
            }
            NodeKind::Operator(op) => self.emit_binary(ast, expr, op),
            kind => Err(CompileError::codegen(format!(
                "unexpected {} node in expression",
                kind.name()
            ))),
        }
    }

    fn emit_literal(&mut self, literal: &Literal) -> CompileResult<()> {
        match literal.ty {
            ValueType::Int => {
                let value = int_value(literal)?;
                self.emit(IR::Push(Operand::Imm(value)));
            }
            ValueType::String => {
                let label = literal
                    .label
                    .clone()
                    .ok_or_else(|| CompileError::codegen(format!("string literal {} has no label", literal.text)))?;
                self.emit(IR::Push(Operand::Addr(label)));
            }
            ValueType::Float => return Err(float_unsupported()),
        }

        Ok(())
    }

    /// Integer literal that can be stored without going through the stack.
    pub(super) fn immediate(&self, ast: &Ast, expr: NodeId) -> CompileResult<Option<i32>> {
        match ast.kind(expr) {
            NodeKind::Literal(literal) if literal.ty == ValueType::Int => int_value(literal).map(Some),
            _ => Ok(None),
        }
    }

    /// Memory operand of a variable reference.
    ///
    /// For array elements the index expressions are evaluated and
    /// combined into `%edx`, which the returned operand scales by the
    /// element size.
    pub(super) fn emit_address(&mut self, ast: &Ast, reference: NodeId) -> CompileResult<Operand> {
        let variable = match ast.kind(reference) {
            NodeKind::Variable(var) => ast.variable(*var),
            kind => {
                return Err(CompileError::codegen(format!(
                    "expected a variable, found {} node",
                    kind.name()
                )))
            }
        };

        let address = variable
            .address
            .ok_or_else(|| CompileError::codegen(format!("variable {} has no storage", variable.name)))?;
        let disp = -(address as i32);

        let indices = ast.children(reference);
        if indices.is_empty() {
            return Ok(Operand::Mem { disp, base: Reg::Ebp });
        }

        for index in indices {
            self.emit_expr(ast, *index)?;
        }
        self.emit_index(&variable.dims);

        Ok(Operand::Indexed {
            disp,
            base: Reg::Ebp,
            index: Reg::Edx,
            scale: WORD_SIZE as u8,
        })
    }

    /// Pop one index per dimension and combine them into a linear
    /// element offset in `%edx`.
    ///
    /// The innermost index is on top of the stack.
    fn emit_index(&mut self, dims: &[usize]) {
        self.emit(IR::Mov(Operand::Imm(0), Operand::Reg(Reg::Edx)));

        for stride in strides(dims).into_iter().rev() {
            self.emit(IR::Pop(Reg::Eax));
            if stride != 1 {
                self.emit(IR::Imul(Operand::Imm(stride as i32), Reg::Eax));
            }
            self.emit(IR::Add(Operand::Reg(Reg::Eax), Operand::Reg(Reg::Edx)));
        }
    }

    fn emit_binary(&mut self, ast: &Ast, node: NodeId, op: &OperatorNode) -> CompileResult<()> {
        use Operator as O;

        match op.ty {
            Some(ValueType::Float) => return Err(float_unsupported()),
            Some(ValueType::String) => {
                return Err(CompileError::codegen(format!(
                    "unsupported operator {} for string operands",
                    op.operator
                )))
            }
            _ => {}
        }

        let (lhs, rhs) = operands(ast, node)?;
        self.emit_expr(ast, lhs)?;
        self.emit_expr(ast, rhs)?;

        match op.operator {
            O::Plus | O::Minus | O::Star => {
                self.emit(IR::Pop(Reg::Edx));
                self.emit(IR::Pop(Reg::Eax));
                let ir = match op.operator {
                    O::Plus => IR::Add(Operand::Reg(Reg::Edx), Operand::Reg(Reg::Eax)),
                    O::Minus => IR::Sub(Operand::Reg(Reg::Edx), Operand::Reg(Reg::Eax)),
                    _ => IR::Imul(Operand::Reg(Reg::Edx), Reg::Eax),
                };
                self.emit(ir);
            }
            O::Slash => {
                self.emit(IR::Pop(Reg::Ecx));
                self.emit(IR::Pop(Reg::Eax));
                self.emit(IR::Cltd);
                self.emit(IR::Idiv(Reg::Ecx));
            }
            O::Caret => self.emit_power(node),
            operator => {
                return Err(CompileError::codegen(format!(
                    "comparator {operator} can only be used in an IF condition"
                )))
            }
        }

        self.emit(IR::Push(Operand::Reg(Reg::Eax)));

        Ok(())
    }

    /// Counted multiplication loop, result in `%eax`.
    ///
    /// A zero or negative exponent yields 1.
    fn emit_power(&mut self, node: NodeId) {
        let body = SmolStr::new(format!("POW_{node}_LOOP"));
        let test = SmolStr::new(format!("POW_{node}_TEST"));

        self.emit(IR::Pop(Reg::Ecx));
        self.emit(IR::Pop(Reg::Edx));
        self.emit(IR::Mov(Operand::Imm(1), Operand::Reg(Reg::Eax)));
        self.emit(IR::Jmp(test.clone()));
        self.emit(IR::Label(body.clone()));
        self.emit(IR::Imul(Operand::Reg(Reg::Edx), Reg::Eax));
        self.emit(IR::Dec(Reg::Ecx));
        self.emit(IR::Label(test));
        self.emit(IR::Cmp(Operand::Imm(0), Operand::Reg(Reg::Ecx)));
        self.emit(IR::Jcc(Cond::Greater, body));
    }
}

fn int_value(literal: &Literal) -> CompileResult<i32> {
    literal
        .text
        .parse::<i32>()
        .map_err(|_| CompileError::codegen(format!("invalid integer literal {}", literal.text)))
}

fn float_unsupported() -> CompileError {
    CompileError::codegen("float code generation is not supported")
}
