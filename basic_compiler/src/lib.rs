//! Compiler for a small line numbered BASIC dialect, targeting 32-bit
//! x86 assembly in AT&T syntax.
//!
//! ```text
//! 10 LET X = 5
//! 20 FOR I = 1 TO X
//! 30 PRINT "%d ", I * I
//! 40 END
//! ```
//!
//! The pipeline runs in three stages, each one finishing before the
//! next starts: [`lex::tokenize`], [`parsing::Parser`] and
//! [`compile::CodeGen`].
pub mod ast;
pub mod compile;
pub mod error;
pub mod lex;
pub mod parsing;
pub mod token_stream;
pub mod tokens;
pub mod types;

use crate::{ast::Ast, compile::CodeGen, error::Diagnostics, parsing::Parser};
use log::debug;
use smol_str::SmolStr;

pub mod prelude {
    pub use super::{
        compile_str, compile_with,
        error::{CompileError, CompileResult, Diagnostics, ErrorKind},
        parse_str, CompileConf, Target,
    };
}

/// Compiler configuration.
#[derive(Debug, Default, Clone)]
pub struct CompileConf {
    pub target: Target,
    /// Report every semantic error instead of stopping at the first.
    pub collect_errors: bool,
    /// Name written to the `.file` directive.
    pub source_name: Option<SmolStr>,
}

/// Assembler and C runtime flavour of the output.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Windows 32-bit. C symbols carry a leading underscore.
    #[default]
    MinGw,
    /// Linux 32-bit.
    Elf,
}

/// Compile source code with the default configuration.
pub fn compile_str(source: &str) -> Result<String, Diagnostics> {
    compile_with(source, &CompileConf::default())
}

pub fn compile_with(source: &str, conf: &CompileConf) -> Result<String, Diagnostics> {
    let mut ast = parse_with(source, conf)?;

    let mut codegen = CodeGen::new(conf);
    codegen.compile(&mut ast)?;

    let assembly = codegen.assemble();
    debug!("compiled {} bytes of source into {} bytes of assembly", source.len(), assembly.len());

    Ok(assembly)
}

/// Run the front end only, returning the checked tree.
pub fn parse_str(source: &str) -> Result<Ast, Diagnostics> {
    parse_with(source, &CompileConf::default())
}

fn parse_with(source: &str, conf: &CompileConf) -> Result<Ast, Diagnostics> {
    // Lexical analysis
    let tokens = lex::tokenize(source)?;

    // Syntactic and semantic analysis
    Parser::new(tokens)
        .collect_errors(conf.collect_errors)
        .build_ast()
}
