use smol_str::SmolStr;
use std::fmt;

/// Intermediate representation.
///
/// One variant per emitted line of 32-bit AT&T assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IR {
    /// `.file "name"`
    File(SmolStr),
    /// `.section name`
    Section(&'static str),
    /// `.text`
    Text,
    /// `.globl symbol`
    Globl(SmolStr),
    /// `.ascii "..."`
    /// Null terminated. Escape sequences are passed through to the assembler.
    Ascii(SmolStr),
    Label(SmolStr),
    Push(Operand),
    Pop(Reg),
    /// Source, destination.
    Mov(Operand, Operand),
    /// Load effective address of a memory operand.
    Lea(Operand, Reg),
    Add(Operand, Operand),
    Sub(Operand, Operand),
    Imul(Operand, Reg),
    /// Sign extend `%eax` into `%edx:%eax`.
    Cltd,
    /// Signed divide `%edx:%eax`, quotient in `%eax`.
    Idiv(Reg),
    Dec(Reg),
    /// Sets flags from `rhs - lhs`, in operand order.
    Cmp(Operand, Operand),
    Jmp(SmolStr),
    Jcc(Cond, SmolStr),
    Call(SmolStr),
    Leave,
    Ret,
}

/// Outputs instruction as assembly.
impl fmt::Display for IR {
    #[rustfmt::skip]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            IR::File(name)        => write!(f, "\t.file\t\"{}\"", name),
            IR::Section(name)     => write!(f, "\t.section {}", name),
            IR::Text              => write!(f, "\t.text"),
            IR::Globl(symbol)     => write!(f, "\t.globl\t{}", symbol),
            IR::Ascii(content)    => write!(f, "\t.ascii \"{}\\0\"", content),
            IR::Label(label)      => write!(f, "{}:", label),
            IR::Push(src)         => write!(f, "\tpushl\t{}", src),
            IR::Pop(dst)          => write!(f, "\tpopl\t{}", dst),
            IR::Mov(src, dst)     => write!(f, "\tmovl\t{}, {}", src, dst),
            IR::Lea(src, dst)     => write!(f, "\tleal\t{}, {}", src, dst),
            IR::Add(src, dst)     => write!(f, "\taddl\t{}, {}", src, dst),
            IR::Sub(src, dst)     => write!(f, "\tsubl\t{}, {}", src, dst),
            IR::Imul(src, dst)    => write!(f, "\timull\t{}, {}", src, dst),
            IR::Cltd              => write!(f, "\tcltd"),
            IR::Idiv(src)         => write!(f, "\tidivl\t{}", src),
            IR::Dec(dst)          => write!(f, "\tdecl\t{}", dst),
            IR::Cmp(lhs, rhs)     => write!(f, "\tcmpl\t{}, {}", lhs, rhs),
            IR::Jmp(label)        => write!(f, "\tjmp\t{}", label),
            IR::Jcc(cond, label)  => write!(f, "\t{}\t{}", cond, label),
            IR::Call(symbol)      => write!(f, "\tcall\t{}", symbol),
            IR::Leave             => write!(f, "\tleave"),
            IR::Ret               => write!(f, "\tret"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg {
    Eax,
    Ecx,
    Edx,
    Esp,
    Ebp,
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Reg::Eax => write!(f, "%eax"),
            Reg::Ecx => write!(f, "%ecx"),
            Reg::Edx => write!(f, "%edx"),
            Reg::Esp => write!(f, "%esp"),
            Reg::Ebp => write!(f, "%ebp"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// `$5`
    Imm(i32),
    /// Address of a label, `$LC0`
    Addr(SmolStr),
    Reg(Reg),
    /// `-4(%ebp)`
    Mem { disp: i32, base: Reg },
    /// `-12(%ebp,%edx,4)`
    Indexed {
        disp: i32,
        base: Reg,
        index: Reg,
        scale: u8,
    },
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Operand::Imm(value) => write!(f, "${}", value),
            Operand::Addr(label) => write!(f, "${}", label),
            Operand::Reg(reg) => write!(f, "{}", reg),
            Operand::Mem { disp, base } => write!(f, "{}({})", disp, base),
            Operand::Indexed {
                disp,
                base,
                index,
                scale,
            } => write!(f, "{}({},{},{})", disp, base, index, scale),
        }
    }
}

/// Condition of a conditional jump, after `cmpl src, dst`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cond {
    Equal,
    NotEqual,
    Greater,
    LessEqual,
}

impl fmt::Display for Cond {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Cond::Equal => write!(f, "je"),
            Cond::NotEqual => write!(f, "jne"),
            Cond::Greater => write!(f, "jg"),
            Cond::LessEqual => write!(f, "jle"),
        }
    }
}

/// Render the instruction list as assembly source, one line per instruction.
pub fn assemble(code: &[IR]) -> String {
    let mut text = String::new();
    for ir in code {
        text.push_str(&ir.to_string());
        text.push('\n');
    }
    text
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_operands() {
        assert_eq!(Operand::Imm(-1).to_string(), "$-1");
        assert_eq!(Operand::Addr("LC0".into()).to_string(), "$LC0");
        assert_eq!(Operand::Mem { disp: -4, base: Reg::Ebp }.to_string(), "-4(%ebp)");
        assert_eq!(
            Operand::Indexed {
                disp: -16,
                base: Reg::Ebp,
                index: Reg::Edx,
                scale: 4
            }
            .to_string(),
            "-16(%ebp,%edx,4)"
        );
    }

    #[test]
    fn test_assemble() {
        let code = [
            IR::Label("main".into()),
            IR::Push(Operand::Reg(Reg::Ebp)),
            IR::Mov(Operand::Reg(Reg::Esp), Operand::Reg(Reg::Ebp)),
            IR::Jcc(Cond::LessEqual, "FOR_20_START".into()),
            IR::Ascii("%d\\n".into()),
            IR::Ret,
        ];
        assert_eq!(
            assemble(&code),
            "main:\n\tpushl\t%ebp\n\tmovl\t%esp, %ebp\n\tjle\tFOR_20_START\n\t.ascii \"%d\\n\\0\"\n\tret\n"
        );
    }
}
