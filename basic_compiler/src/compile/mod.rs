//! Code generation.
//!
//! Lowers a checked [`Ast`] to 32-bit AT&T assembly. Expressions are
//! evaluated on the machine stack: every operand is pushed, and every
//! operator pops its inputs and pushes its result.
mod expr;
mod frame;
mod ir;

pub use self::ir::{assemble, Cond, Operand, Reg, IR};

use self::frame::Frame;
use crate::{
    ast::{Ast, NodeId, NodeKind, WORD_SIZE},
    error::{CompileError, CompileResult},
    tokens::Operator,
    types::ValueType,
    CompileConf, Target,
};
use log::{debug, trace};
use smol_str::SmolStr;

/// Code generator.
pub struct CodeGen {
    /// Resulting generated code.
    code: Vec<IR>,
    target: Target,
    source_name: Option<SmolStr>,
    frame: Frame,
    /// Line number of the last emitted `LINE_` label.
    last_line: Option<u32>,
}

impl CodeGen {
    pub fn new(conf: &CompileConf) -> Self {
        Self {
            code: vec![],
            target: conf.target,
            source_name: conf.source_name.clone(),
            frame: Frame::default(),
            last_line: None,
        }
    }

    /// Lower the whole program.
    ///
    /// Assigns a frame address to every variable as its scope is entered.
    pub fn compile(&mut self, ast: &mut Ast) -> CompileResult<()> {
        self.reset();
        self.emit_header(ast);
        self.emit_program(ast)?;
        debug!("emitted {} lines of assembly", self.code.len());
        Ok(())
    }

    #[inline]
    pub fn code(&self) -> &[IR] {
        &self.code
    }

    /// Render the generated code as assembly source.
    pub fn assemble(&self) -> String {
        assemble(&self.code)
    }

    /// Clear the internal state so the code generator can be reused.
    pub fn reset(&mut self) {
        self.code.clear();
        self.frame = Frame::default();
        self.last_line = None;
    }

    #[inline]
    fn emit(&mut self, ir: IR) {
        self.code.push(ir)
    }
}

impl Default for CodeGen {
    fn default() -> Self {
        Self::new(&CompileConf::default())
    }
}

/// Program layout.
impl CodeGen {
    /// File directive and the data section.
    fn emit_header(&mut self, ast: &Ast) {
        if let Some(name) = self.source_name.clone() {
            self.emit(IR::File(name));
        }

        let strings: Vec<_> = ast
            .strings()
            .filter_map(|literal| Some((literal.label.clone()?, SmolStr::new(literal.content()))))
            .collect();

        if !strings.is_empty() {
            self.emit(IR::Section(self.target.rodata_section()));
            for (label, content) in strings {
                self.emit(IR::Label(label));
                self.emit(IR::Ascii(content));
            }
        }
    }

    fn emit_program(&mut self, ast: &mut Ast) -> CompileResult<()> {
        let main = self.target.symbol("main");
        self.emit(IR::Text);
        self.emit(IR::Globl(main.clone()));
        self.emit(IR::Label(main));

        // Prologue
        self.emit(IR::Push(Operand::Reg(Reg::Ebp)));
        self.emit(IR::Mov(Operand::Reg(Reg::Esp), Operand::Reg(Reg::Ebp)));

        let root = ast.root();
        let size = self.frame.enter(ast, root)?;
        trace!("program reserves {size} bytes");
        if size > 0 {
            self.emit(IR::Sub(Operand::Imm(size as i32), Operand::Reg(Reg::Esp)));
        }
        if self.target == Target::MinGw {
            self.emit(IR::Call(SmolStr::new_inline("___main")));
        }

        for stmt in ast.children(root).to_vec() {
            self.emit_stmt(ast, stmt)?;
        }

        // Epilogue. `leave` releases the program's reservation.
        self.emit(IR::Mov(Operand::Imm(0), Operand::Reg(Reg::Eax)));
        self.emit(IR::Leave);
        self.emit(IR::Ret);

        Ok(())
    }

    /// Nested scope, with its own reservation that is released on exit.
    fn emit_scope(&mut self, ast: &mut Ast, scope: NodeId) -> CompileResult<()> {
        let size = self.frame.enter(ast, scope)?;
        trace!("scope {scope} reserves {size} bytes");

        if size > 0 {
            self.emit(IR::Sub(Operand::Imm(size as i32), Operand::Reg(Reg::Esp)));
        }

        for stmt in ast.children(scope).to_vec() {
            self.emit_stmt(ast, stmt)?;
        }

        if size > 0 {
            self.emit(IR::Add(Operand::Imm(size as i32), Operand::Reg(Reg::Esp)));
        }
        self.frame.leave(size);

        Ok(())
    }
}

/// Statements.
impl CodeGen {
    fn emit_stmt(&mut self, ast: &mut Ast, stmt: NodeId) -> CompileResult<()> {
        let line = ast.node(stmt).line_number;

        // Jump target for GOTO. Statements sharing a line share the label.
        if self.last_line != Some(line) {
            self.emit(IR::Label(line_label(line)));
            self.last_line = Some(line);
        }

        let result = match ast.kind(stmt).clone() {
            NodeKind::Assign => self.emit_assign(ast, stmt),
            NodeKind::For => self.emit_for(ast, stmt),
            NodeKind::If => self.emit_if(ast, stmt),
            NodeKind::GoTo { target } => {
                self.emit(IR::Jmp(line_label(target)));
                Ok(())
            }
            NodeKind::Print | NodeKind::Println => self.emit_print(ast, stmt),
            NodeKind::Read => self.emit_read(ast, stmt),
            kind => Err(CompileError::codegen(format!(
                "unexpected {} node in statement position",
                kind.name()
            ))),
        };

        result.map_err(|err| match err.line_number {
            Some(_) => err,
            None => err.with_line_number(line),
        })
    }

    fn emit_assign(&mut self, ast: &Ast, assign: NodeId) -> CompileResult<()> {
        let (target, value) = operands(ast, assign)?;

        match self.immediate(ast, value)? {
            Some(value) => {
                let dst = self.emit_address(ast, target)?;
                self.emit(IR::Mov(Operand::Imm(value), dst));
            }
            None => {
                self.emit_expr(ast, value)?;
                let dst = self.emit_address(ast, target)?;
                self.emit(IR::Pop(Reg::Eax));
                self.emit(IR::Mov(Operand::Reg(Reg::Eax), dst));
            }
        }

        Ok(())
    }

    /// Loop test at the bottom, entered by a jump from the top.
    ///
    /// The test is always `counter <= limit`, also for negative steps.
    fn emit_for(&mut self, ast: &mut Ast, node: NodeId) -> CompileResult<()> {
        let line = ast.node(node).line_number;
        let (init, limit, step, body) = match *ast.children(node) {
            [init, limit, step, body] => (init, limit, step, body),
            _ => return Err(malformed(ast, node)),
        };

        let start = SmolStr::new(format!("FOR_{line}_START"));
        let test = SmolStr::new(format!("FOR_{line}_TEST"));

        self.emit_assign(ast, init)?;
        self.emit(IR::Jmp(test.clone()));
        self.emit(IR::Label(start.clone()));

        self.emit_scope(ast, body)?;

        let (counter, _) = operands(ast, init)?;
        let counter = self.emit_address(ast, counter)?;

        self.emit_expr(ast, step)?;
        self.emit(IR::Pop(Reg::Eax));
        self.emit(IR::Add(Operand::Reg(Reg::Eax), counter.clone()));

        self.emit(IR::Label(test));
        self.emit_expr(ast, limit)?;
        self.emit(IR::Pop(Reg::Eax));
        self.emit(IR::Cmp(Operand::Reg(Reg::Eax), counter));
        self.emit(IR::Jcc(Cond::LessEqual, start));

        Ok(())
    }

    /// Branches on the inverted comparison, past the true branch.
    fn emit_if(&mut self, ast: &mut Ast, node: NodeId) -> CompileResult<()> {
        use Operator as O;

        let line = ast.node(node).line_number;
        let (condition, then_branch, else_branch) = match *ast.children(node) {
            [condition, then_branch] => (condition, then_branch, None),
            [condition, then_branch, else_branch] => (condition, then_branch, Some(else_branch)),
            _ => return Err(malformed(ast, node)),
        };

        let operator = match ast.kind(condition) {
            NodeKind::Operator(op) if op.ty == Some(ValueType::String) => {
                return Err(CompileError::codegen(format!(
                    "unsupported comparator {} for string operands",
                    op.operator
                )))
            }
            NodeKind::Operator(op) => op.operator,
            _ => return Err(malformed(ast, condition)),
        };

        let (lhs, rhs) = operands(ast, condition)?;
        self.emit_expr(ast, lhs)?;
        self.emit_expr(ast, rhs)?;
        self.emit(IR::Pop(Reg::Eax));
        self.emit(IR::Pop(Reg::Edx));

        // Strict comparisons are turned into inclusive ones by moving
        // the right operand one step toward the left.
        #[rustfmt::skip]
        let (adjust, skip_when) = match operator {
            O::Eq | O::EqEq => (false, Cond::NotEqual),
            O::NotEq        => (false, Cond::Equal),
            O::Less         => (true,  Cond::Greater),
            O::LessEq       => (false, Cond::Greater),
            O::Greater      => (false, Cond::LessEqual),
            O::GreaterEq    => (true,  Cond::LessEqual),
            operator        => {
                return Err(CompileError::codegen(format!("unsupported comparator {operator}")))
            }
        };

        if adjust {
            self.emit(IR::Sub(Operand::Imm(1), Operand::Reg(Reg::Eax)));
        }
        self.emit(IR::Cmp(Operand::Reg(Reg::Eax), Operand::Reg(Reg::Edx)));

        let else_label = SmolStr::new(format!("IF_{line}_ELSE"));
        let end_label = SmolStr::new(format!("IF_{line}_END"));

        let skip_to = if else_branch.is_some() { &else_label } else { &end_label };
        self.emit(IR::Jcc(skip_when, skip_to.clone()));

        self.emit_scope(ast, then_branch)?;
        self.emit(IR::Jmp(end_label.clone()));

        if let Some(else_branch) = else_branch {
            self.emit(IR::Label(else_label));
            self.emit_scope(ast, else_branch)?;
        }

        self.emit(IR::Label(end_label));

        Ok(())
    }

    /// PRINT and PRINTLN. Arguments are passed by value.
    fn emit_print(&mut self, ast: &Ast, node: NodeId) -> CompileResult<()> {
        let (format, args) = match ast.children(node).split_first() {
            Some((format, args)) => (*format, args),
            None => return Err(malformed(ast, node)),
        };

        for arg in args.iter().rev() {
            self.emit_expr(ast, *arg)?;
        }

        self.emit_call(ast, format, "printf", args.len())
    }

    /// READ. Arguments are passed by address.
    fn emit_read(&mut self, ast: &Ast, node: NodeId) -> CompileResult<()> {
        let (format, targets) = match ast.children(node).split_first() {
            Some((format, targets)) => (*format, targets),
            None => return Err(malformed(ast, node)),
        };

        for target in targets.iter().rev() {
            let address = self.emit_address(ast, *target)?;
            self.emit(IR::Lea(address, Reg::Eax));
            self.emit(IR::Push(Operand::Reg(Reg::Eax)));
        }

        self.emit_call(ast, format, "scanf", targets.len())
    }

    /// Push the format string and call into the C runtime.
    ///
    /// The caller has already pushed `arg_count` arguments.
    fn emit_call(&mut self, ast: &Ast, format: NodeId, function: &str, arg_count: usize) -> CompileResult<()> {
        let label = match ast.kind(format) {
            NodeKind::Literal(literal) => literal.label.clone(),
            _ => None,
        };
        let label = label.ok_or_else(|| CompileError::codegen("format argument is not a string literal"))?;

        self.emit(IR::Push(Operand::Addr(label)));
        self.emit(IR::Call(self.target.symbol(function)));
        self.emit(IR::Add(
            Operand::Imm((WORD_SIZE as usize * (arg_count + 1)) as i32),
            Operand::Reg(Reg::Esp),
        ));

        Ok(())
    }
}

impl Target {
    /// C symbol name as seen by the assembler.
    pub fn symbol(&self, name: &str) -> SmolStr {
        match self {
            Target::MinGw => SmolStr::new(format!("_{name}")),
            Target::Elf => SmolStr::new(name),
        }
    }

    pub fn rodata_section(&self) -> &'static str {
        match self {
            Target::MinGw => ".rdata,\"dr\"",
            Target::Elf => ".rodata",
        }
    }
}

fn line_label(line: u32) -> SmolStr {
    SmolStr::new(format!("LINE_{line}"))
}

/// The two children of an assignment or binary operator.
fn operands(ast: &Ast, node: NodeId) -> CompileResult<(NodeId, NodeId)> {
    match *ast.children(node) {
        [lhs, rhs] => Ok((lhs, rhs)),
        _ => Err(malformed(ast, node)),
    }
}

fn malformed(ast: &Ast, node: NodeId) -> CompileError {
    CompileError::codegen(format!(
        "malformed {} node with {} children",
        ast.kind(node).name(),
        ast.children(node).len()
    ))
}
