//! Interpreter for the subset of 32-bit AT&T assembly the compiler emits.
//!
//! Lets the tests check what a program does instead of the exact
//! instructions it was lowered to. `printf` and `scanf` are stood in for
//! by a formatter supporting `%d`, `%s` and `%%`.
#![allow(dead_code)]

use std::{cmp::Ordering, collections::HashMap, fmt};

const STACK_TOP: i32 = 0x0010_0000;
const DATA_START: i32 = 0x0001_0000;
const RETURN_SENTINEL: i32 = -1;
const STEP_LIMIT: usize = 1_000_000;

/// Result of running a program to completion.
#[derive(Debug)]
pub struct Run {
    pub output: String,
    pub exit_code: i32,
    pub steps: usize,
}

#[derive(Debug)]
pub struct MachineError(pub String);

impl fmt::Display for MachineError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

macro_rules! fail {
    ($($arg:tt)*) => {
        return Err(MachineError(format!($($arg)*)))
    };
}

/// Run assembly with empty standard input.
pub fn run(asm: &str) -> Result<Run, MachineError> {
    run_with_input(asm, "")
}

pub fn run_with_input(asm: &str, input: &str) -> Result<Run, MachineError> {
    let program = Program::load(asm)?;
    Machine::new(&program, input).execute()
}

/// Shorthand for tests only interested in what was printed.
pub fn output_of(asm: &str) -> String {
    match run(asm) {
        Ok(run) => run.output,
        Err(err) => panic!("{}\n\n{}", err, asm),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Reg {
    Eax,
    Ecx,
    Edx,
    Esp,
    Ebp,
}

#[derive(Debug, Clone)]
enum Operand {
    Imm(i32),
    Reg(Reg),
    Mem {
        disp: i32,
        base: Reg,
        index: Option<(Reg, i32)>,
    },
}

#[derive(Debug, Clone)]
struct Instr {
    mnemonic: String,
    operands: Vec<Operand>,
    /// Jump or call target.
    target: Option<String>,
    source: String,
}

#[derive(Debug, Default)]
struct Program {
    code: Vec<Instr>,
    labels: HashMap<String, usize>,
    /// Address of every `.ascii` label.
    data_labels: HashMap<String, i32>,
    /// Decoded string contents by address.
    strings: HashMap<i32, String>,
}

impl Program {
    fn load(asm: &str) -> Result<Self, MachineError> {
        let mut program = Program::default();
        let mut pending_label: Option<String> = None;

        // Data labels first, so instructions can refer to them by address.
        for line in asm.lines() {
            let trimmed = line.trim();
            if let Some(label) = trimmed.strip_suffix(':') {
                pending_label = Some(label.to_string());
            } else if let Some(rest) = trimmed.strip_prefix(".ascii") {
                let label = match pending_label.take() {
                    Some(label) => label,
                    None => fail!("string without label: {}", line),
                };
                let address = DATA_START + program.strings.len() as i32 * 0x100;
                program.data_labels.insert(label, address);
                program.strings.insert(address, decode_ascii(rest.trim())?);
            } else if !trimmed.is_empty() {
                pending_label = None;
            }
        }

        for line in asm.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('.') {
                continue;
            }
            if let Some(label) = trimmed.strip_suffix(':') {
                if !line.starts_with('\t') {
                    if program.labels.insert(label.to_string(), program.code.len()).is_some() {
                        fail!("duplicate label {}", label);
                    }
                    continue;
                }
            }
            let instr = program.parse_instr(trimmed)?;
            program.code.push(instr);
        }

        Ok(program)
    }

    fn parse_instr(&self, line: &str) -> Result<Instr, MachineError> {
        let mut parts = line.splitn(2, '\t');
        let mnemonic = parts.next().unwrap_or_default().to_string();
        let rest = parts.next().unwrap_or_default().trim();

        let mut instr = Instr {
            mnemonic,
            operands: vec![],
            target: None,
            source: line.to_string(),
        };

        match instr.mnemonic.as_str() {
            "jmp" | "je" | "jne" | "jg" | "jle" | "call" => instr.target = Some(rest.to_string()),
            _ if rest.is_empty() => {}
            _ => {
                for operand in rest.split(", ") {
                    instr.operands.push(self.parse_operand(operand)?);
                }
            }
        }

        Ok(instr)
    }

    fn parse_operand(&self, text: &str) -> Result<Operand, MachineError> {
        if let Some(imm) = text.strip_prefix('$') {
            return match imm.parse::<i32>() {
                Ok(value) => Ok(Operand::Imm(value)),
                Err(_) => match self.data_labels.get(imm) {
                    Some(address) => Ok(Operand::Imm(*address)),
                    None => fail!("unknown label {}", imm),
                },
            };
        }

        if text.starts_with('%') {
            return Ok(Operand::Reg(parse_reg(text)?));
        }

        let open = match text.find('(') {
            Some(open) => open,
            None => fail!("unsupported operand {}", text),
        };
        let disp = match &text[..open] {
            "" => 0,
            disp => match disp.parse::<i32>() {
                Ok(disp) => disp,
                Err(_) => fail!("bad displacement in {}", text),
            },
        };
        let inner = text[open + 1..].trim_end_matches(')');
        let parts: Vec<&str> = inner.split(',').collect();
        match parts.as_slice() {
            [base] => Ok(Operand::Mem {
                disp,
                base: parse_reg(base)?,
                index: None,
            }),
            [base, index, scale] => {
                let scale = match scale.parse::<i32>() {
                    Ok(scale) => scale,
                    Err(_) => fail!("bad scale in {}", text),
                };
                Ok(Operand::Mem {
                    disp,
                    base: parse_reg(base)?,
                    index: Some((parse_reg(index)?, scale)),
                })
            }
            _ => fail!("unsupported memory operand {}", text),
        }
    }
}

fn parse_reg(text: &str) -> Result<Reg, MachineError> {
    match text {
        "%eax" => Ok(Reg::Eax),
        "%ecx" => Ok(Reg::Ecx),
        "%edx" => Ok(Reg::Edx),
        "%esp" => Ok(Reg::Esp),
        "%ebp" => Ok(Reg::Ebp),
        _ => fail!("unknown register {}", text),
    }
}

/// Contents of an `.ascii "...\0"` directive, escapes resolved.
fn decode_ascii(quoted: &str) -> Result<String, MachineError> {
    let inner = match quoted.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        Some(inner) => inner,
        None => fail!("unquoted string {}", quoted),
    };
    let inner = match inner.strip_suffix("\\0") {
        Some(inner) => inner,
        None => fail!("string is not null terminated: {}", quoted),
    };

    let mut decoded = String::new();
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            decoded.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => decoded.push('\n'),
            Some('t') => decoded.push('\t'),
            Some('"') => decoded.push('"'),
            Some('\\') => decoded.push('\\'),
            other => fail!("unsupported escape \\{:?} in {}", other, quoted),
        }
    }

    Ok(decoded)
}

struct Machine<'a> {
    program: &'a Program,
    registers: HashMap<Reg, i32>,
    memory: HashMap<i32, i32>,
    /// Result of the last `cmpl`, destination against source.
    flags: Ordering,
    pc: usize,
    input: std::str::SplitWhitespace<'a>,
    output: String,
}

impl<'a> Machine<'a> {
    fn new(program: &'a Program, input: &'a str) -> Self {
        let mut registers = HashMap::new();
        for reg in [Reg::Eax, Reg::Ecx, Reg::Edx, Reg::Ebp] {
            registers.insert(reg, 0);
        }
        registers.insert(Reg::Esp, STACK_TOP);

        Self {
            program,
            registers,
            memory: HashMap::new(),
            flags: Ordering::Equal,
            pc: 0,
            input: input.split_whitespace(),
            output: String::new(),
        }
    }

    fn execute(mut self) -> Result<Run, MachineError> {
        self.pc = match ["_main", "main"].iter().find_map(|name| self.program.labels.get(*name)) {
            Some(entry) => *entry,
            None => fail!("program has no main"),
        };
        self.push(RETURN_SENTINEL);

        let mut steps = 0;
        loop {
            steps += 1;
            if steps > STEP_LIMIT {
                fail!("step limit exceeded, output so far: {:?}", self.output);
            }

            let instr = match self.program.code.get(self.pc) {
                Some(instr) => instr.clone(),
                None => fail!("ran off the end of the program"),
            };
            self.pc += 1;

            if self.step(&instr)? {
                break;
            }
        }

        if self.reg(Reg::Esp) != STACK_TOP {
            fail!(
                "stack is unbalanced on return: {:#x} != {:#x}",
                self.reg(Reg::Esp),
                STACK_TOP
            );
        }

        let exit_code = self.reg(Reg::Eax);
        Ok(Run {
            output: self.output,
            exit_code,
            steps,
        })
    }

    /// Returns true when `main` returned.
    fn step(&mut self, instr: &Instr) -> Result<bool, MachineError> {
        let ops = &instr.operands;
        match (instr.mnemonic.as_str(), ops.as_slice()) {
            ("pushl", [src]) => {
                let value = self.read(src)?;
                self.push(value);
            }
            ("popl", [dst]) => {
                let value = self.pop()?;
                self.write(dst, value)?;
            }
            ("movl", [src, dst]) => {
                let value = self.read(src)?;
                self.write(dst, value)?;
            }
            ("leal", [src, dst]) => {
                let address = self.address(src)?;
                self.write(dst, address)?;
            }
            ("addl", [src, dst]) => {
                let value = self.read(dst)?.wrapping_add(self.read(src)?);
                self.write(dst, value)?;
            }
            ("subl", [src, dst]) => {
                let value = self.read(dst)?.wrapping_sub(self.read(src)?);
                self.write(dst, value)?;
            }
            ("imull", [src, dst]) => {
                let value = self.read(dst)?.wrapping_mul(self.read(src)?);
                self.write(dst, value)?;
            }
            ("decl", [dst]) => {
                let value = self.read(dst)?.wrapping_sub(1);
                self.write(dst, value)?;
            }
            ("cltd", []) => {
                let sign = if self.reg(Reg::Eax) < 0 { -1 } else { 0 };
                self.registers.insert(Reg::Edx, sign);
            }
            ("idivl", [divisor]) => {
                let divisor = self.read(divisor)? as i64;
                if divisor == 0 {
                    fail!("division by zero at {}", instr.source);
                }
                let dividend = ((self.reg(Reg::Edx) as i64) << 32) | (self.reg(Reg::Eax) as u32 as i64);
                self.registers.insert(Reg::Eax, (dividend / divisor) as i32);
                self.registers.insert(Reg::Edx, (dividend % divisor) as i32);
            }
            ("cmpl", [src, dst]) => {
                self.flags = self.read(dst)?.cmp(&self.read(src)?);
            }
            ("jmp", []) => self.jump(instr)?,
            ("je", []) if self.flags == Ordering::Equal => self.jump(instr)?,
            ("jne", []) if self.flags != Ordering::Equal => self.jump(instr)?,
            ("jg", []) if self.flags == Ordering::Greater => self.jump(instr)?,
            ("jle", []) if self.flags != Ordering::Greater => self.jump(instr)?,
            ("je" | "jne" | "jg" | "jle", []) => {}
            ("call", []) => self.call(instr)?,
            ("leave", []) => {
                let ebp = self.reg(Reg::Ebp);
                self.registers.insert(Reg::Esp, ebp);
                let saved = self.pop()?;
                self.registers.insert(Reg::Ebp, saved);
            }
            ("ret", []) => {
                if self.pop()? == RETURN_SENTINEL {
                    return Ok(true);
                }
                fail!("return to unknown address");
            }
            _ => fail!("unsupported instruction {}", instr.source),
        }

        Ok(false)
    }

    fn jump(&mut self, instr: &Instr) -> Result<(), MachineError> {
        let label = instr.target.as_deref().unwrap_or_default();
        match self.program.labels.get(label) {
            Some(target) => self.pc = *target,
            None => fail!("jump to unknown label {}", label),
        }
        Ok(())
    }

    fn call(&mut self, instr: &Instr) -> Result<(), MachineError> {
        let symbol = instr.target.as_deref().unwrap_or_default();
        match symbol.trim_start_matches('_') {
            "main" => {}
            "printf" => self.printf()?,
            "scanf" => self.scanf()?,
            _ => fail!("call to unknown function {}", symbol),
        }
        // Return value of the C calls is not used.
        self.registers.insert(Reg::Eax, 0);
        Ok(())
    }

    fn printf(&mut self) -> Result<(), MachineError> {
        let format = self.string_at(self.load(self.reg(Reg::Esp))?)?;
        let mut arg_address = self.reg(Reg::Esp) + 4;
        let mut chars = format.chars();

        while let Some(c) = chars.next() {
            if c != '%' {
                self.output.push(c);
                continue;
            }
            match chars.next() {
                Some('d') => {
                    let value = self.load(arg_address)?;
                    self.output.push_str(&value.to_string());
                    arg_address += 4;
                }
                Some('s') => {
                    let text = self.string_at(self.load(arg_address)?)?;
                    self.output.push_str(&text);
                    arg_address += 4;
                }
                Some('%') => self.output.push('%'),
                other => fail!("unsupported conversion %{:?}", other),
            }
        }

        Ok(())
    }

    fn scanf(&mut self) -> Result<(), MachineError> {
        let format = self.string_at(self.load(self.reg(Reg::Esp))?)?;
        let mut arg_address = self.reg(Reg::Esp) + 4;

        for _ in 0..format.matches("%d").count() {
            let value = match self.input.next().map(str::parse::<i32>) {
                Some(Ok(value)) => value,
                _ => fail!("input exhausted or malformed"),
            };
            let target = self.load(arg_address)?;
            self.memory.insert(target, value);
            arg_address += 4;
        }

        Ok(())
    }

    fn string_at(&self, address: i32) -> Result<String, MachineError> {
        match self.program.strings.get(&address) {
            Some(text) => Ok(text.clone()),
            None => fail!("no string at {:#x}", address),
        }
    }

    fn reg(&self, reg: Reg) -> i32 {
        self.registers.get(&reg).copied().unwrap_or_default()
    }

    fn push(&mut self, value: i32) {
        let esp = self.reg(Reg::Esp) - 4;
        self.registers.insert(Reg::Esp, esp);
        self.memory.insert(esp, value);
    }

    fn pop(&mut self) -> Result<i32, MachineError> {
        let esp = self.reg(Reg::Esp);
        if esp >= STACK_TOP {
            fail!("pop from empty stack");
        }
        let value = self.load(esp)?;
        self.registers.insert(Reg::Esp, esp + 4);
        Ok(value)
    }

    /// Reading memory that was never written is an error, which catches
    /// use of uninitialised variables and misaddressed elements.
    fn load(&self, address: i32) -> Result<i32, MachineError> {
        match self.memory.get(&address) {
            Some(value) => Ok(*value),
            None => fail!("read of unwritten memory at {:#x}", address),
        }
    }

    fn address(&self, operand: &Operand) -> Result<i32, MachineError> {
        match operand {
            Operand::Mem { disp, base, index } => {
                let offset = index.map(|(reg, scale)| self.reg(reg) * scale).unwrap_or_default();
                Ok(self.reg(*base) + disp + offset)
            }
            _ => fail!("operand {:?} has no address", operand),
        }
    }

    fn read(&self, operand: &Operand) -> Result<i32, MachineError> {
        match operand {
            Operand::Imm(value) => Ok(*value),
            Operand::Reg(reg) => Ok(self.reg(*reg)),
            Operand::Mem { .. } => self.load(self.address(operand)?),
        }
    }

    fn write(&mut self, operand: &Operand, value: i32) -> Result<(), MachineError> {
        match operand {
            Operand::Imm(_) => fail!("write to immediate"),
            Operand::Reg(reg) => {
                self.registers.insert(*reg, value);
            }
            Operand::Mem { .. } => {
                let address = self.address(operand)?;
                self.memory.insert(address, value);
            }
        }
        Ok(())
    }
}
