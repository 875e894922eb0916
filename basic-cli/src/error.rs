//! Application errors
use basic_compiler::error::Diagnostics;
use std::fmt;

#[derive(Debug)]
pub struct CliError {
    pub kind: ErrorKind,
}

impl std::error::Error for CliError {}

#[derive(Debug)]
pub enum ErrorKind {
    Compile(Diagnostics),
    Io(std::io::Error),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.kind {
            ErrorKind::Compile(diagnostics) => {
                let count = diagnostics.errors().len();
                write!(f, "compilation failed with {count} error{}", if count == 1 { "" } else { "s" })
            }
            ErrorKind::Io(err) => write!(f, "io error: {err}"),
        }
    }
}

impl From<Diagnostics> for CliError {
    fn from(diagnostics: Diagnostics) -> Self {
        Self {
            kind: ErrorKind::Compile(diagnostics),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self {
            kind: ErrorKind::Io(err),
        }
    }
}
