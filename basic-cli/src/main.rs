//! Entrypoint for CLI
mod error;

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use basic_compiler::prelude::*;
use error::CliError;
use log::{error, info};
use smol_str::SmolStr;

static USAGE: &str = r#"
usage: basic [--target mingw|elf] [--collect-errors] [-o OUT] [FILE]

Compiles a BASIC program into 32-bit x86 assembly.

options:
    --target T          Assembler flavour, mingw (default) or elf
    --collect-errors    Report every semantic error, not just the first
    -o OUT              Output file, defaults to FILE with a .s extension

FILE defaults to programs/sample.bas

examples:
    basic programs/sample.bas
    basic --target elf -o loop.s programs/loop.bas
"#;

const DEFAULT_INPUT: &str = "programs/sample.bas";

fn main() {
    if let Err(err) = simple_logger::SimpleLogger::new().env().init() {
        eprintln!("failed to initialise logger: {err}");
    }

    let cmd = match parse_args(env::args().skip(1)) {
        Some(cmd) => cmd,
        None => {
            print_usage();
            // FreeBSD EX_USAGE (64)
            std::process::exit(64)
        }
    };

    if let Err(err) = run_compiler(&cmd) {
        error!("{err}");
        std::process::exit(1)
    }
}

fn run_compiler(cmd: &Cmd) -> Result<(), CliError> {
    info!("compiling {}", cmd.input.display());

    let source = fs::read_to_string(&cmd.input)?;

    let conf = CompileConf {
        target: cmd.target,
        collect_errors: cmd.collect_errors,
        source_name: cmd
            .input
            .file_name()
            .map(|name| SmolStr::new(name.to_string_lossy())),
    };

    let assembly = match compile_with(&source, &conf) {
        Ok(assembly) => assembly,
        Err(diagnostics) => {
            for err in diagnostics.errors() {
                error!("{}: {err}", cmd.input.display());
            }
            // Nothing is written on failure.
            return Err(diagnostics.into());
        }
    };

    fs::write(&cmd.output, assembly)?;
    info!("wrote {}", cmd.output.display());

    Ok(())
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Option<Cmd> {
    let mut target = Target::default();
    let mut collect_errors = false;
    let mut output = None;
    let mut input = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--target" => {
                target = match args.next()?.as_str() {
                    "mingw" => Target::MinGw,
                    "elf" => Target::Elf,
                    _ => return None,
                }
            }
            "--collect-errors" => collect_errors = true,
            "-o" => output = Some(PathBuf::from(args.next()?)),
            flag if flag.starts_with('-') => return None,
            _ => {
                // Only one input file.
                if input.replace(PathBuf::from(arg)).is_some() {
                    return None;
                }
            }
        }
    }

    let input = input.unwrap_or_else(|| PathBuf::from(DEFAULT_INPUT));
    let output = output.unwrap_or_else(|| output_path(&input));

    Some(Cmd {
        input,
        output,
        target,
        collect_errors,
    })
}

fn output_path(input: &Path) -> PathBuf {
    input.with_extension("s")
}

fn print_usage() {
    println!("BASIC compiler v{}", env!("CARGO_PKG_VERSION"));
    println!("{USAGE}");
}

#[derive(Debug)]
struct Cmd {
    input: PathBuf,
    output: PathBuf,
    target: Target,
    collect_errors: bool,
}
