//! Assembles and executes SLIM, a three-address assembly language for a
//! 32-register machine with word-addressed memory and line-oriented I/O
//!
//! SLIM source is plain text, one statement per line. Comments start with a
//! semicolon (`;`) and continue to the end of the line. A statement is one
//! of:
//!
//! - a register allocation: `allocate-registers <name>, <name>, ...`
//!   (whitespace may replace the commas; at most 32 names in total)
//! - a label: `<name>:` on its own line, naming the next command
//! - a command: an opcode followed by comma- or whitespace-separated
//!   arguments, each a register name, a label name or an integer literal
//!
//! The commands:
//! - `add/sub/mul/div/quo/rem dest, src1, src2`: 32-bit wrapping arithmetic
//!   (`quo` is an alias for `div`; both floor toward negative infinity)
//! - `seq/sne/slt/sgt/sle/sge dest, src1, src2`: write 1 if the relation
//!   holds, else 0
//! - `ld dest, addr` / `st src, addr`: memory access through the address
//!   held in `addr`
//! - `li dest, value`: load an integer literal or a label's index
//! - `read dest` / `write src`: one line of console I/O
//! - `j addr` / `jeqz src, addr`: jump to the command index held in `addr`,
//!   unconditionally or when `src` is zero
//! - `halt`: stop execution
//!
//! Assembly is three passes, each of which collects every error it can find
//! before giving up: [`parser`] turns lines into syntactic records,
//! [`namer`] assigns register slots and label indices, and [`resolver`]
//! checks opcodes and rewrites arguments to integers. [`vm`] executes the
//! result.

pub mod namer;
pub mod parser;
pub mod resolver;
pub mod vm;

use std::fmt;

use crate::console::Console;
use crate::validation::Validation;
use self::resolver::ResolvedCommand;

/// How many registers a SLIM machine has
pub const NUM_REGISTERS: usize = 32;

/// An error found while assembling a SLIM program
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompilationError {
    /// A line that matches no syntactic form
    BadWord { word: String, line: usize },
    /// An allocation whose name is already taken
    RegisterInUse { name: String, line: usize },
    /// A label whose name is already taken
    LabelInUse { name: String, line: usize },
    /// An allocation past the register limit
    NoMoreRegisters { name: String, line: usize },
    UnknownOpcode { name: String, line: usize },
    MissingArgument { line: usize },
    TooManyArguments { line: usize },
    UnknownName { name: String, line: usize },
    ExpectedRegister { name: String, line: usize },
    ExpectedLabel { name: String, line: usize },
}

impl fmt::Display for CompilationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompilationError::BadWord { word, line } => {
                write!(f, "Bad word '{}' in line {}.", word, line)
            }
            CompilationError::RegisterInUse { name, line } => {
                write!(f, "Register name '{}' already in use in line {}.", name, line)
            }
            CompilationError::LabelInUse { name, line } => {
                write!(f, "Label name '{}' already in use in line {}.", name, line)
            }
            CompilationError::NoMoreRegisters { name, line } => {
                write!(f, "No more registers available for '{}' in line {}.", name, line)
            }
            CompilationError::UnknownOpcode { name, line } => {
                write!(f, "Unknown opcode '{}' in line {}.", name, line)
            }
            CompilationError::MissingArgument { line } => {
                write!(f, "Missing argument in line {}.", line)
            }
            CompilationError::TooManyArguments { line } => {
                write!(f, "Too many arguments in line {}.", line)
            }
            CompilationError::UnknownName { name, line } => {
                write!(f, "Unknown name '{}' in line {}.", name, line)
            }
            CompilationError::ExpectedRegister { name, line } => {
                write!(f, "Expected a register, found '{}' in line {}.", name, line)
            }
            CompilationError::ExpectedLabel { name, line } => {
                write!(f, "Expected a label, found '{}' in line {}.", name, line)
            }
        }
    }
}

impl std::error::Error for CompilationError {}

/// Assemble SLIM source text into an executable program
pub fn assemble(source: &str) -> Validation<Vec<ResolvedCommand>, CompilationError> {
    let parsed = parser::parse(source)?;
    let named = namer::name(&parsed)?;
    resolver::resolve(&named)
}

/// Assemble and execute SLIM source against the given console.
///
/// Assembler diagnostics and runtime failures go to the console's error
/// channel, one line each. Returns whether the program assembled cleanly
/// and ran to completion.
pub fn run(source: &str, console: &mut dyn Console) -> bool {
    match assemble(source) {
        Ok(commands) => match vm::Vm::new(commands, console).execute() {
            Ok(()) => true,
            Err(failure) => {
                console.write_error(&failure.to_string());
                false
            }
        },
        Err(errors) => {
            for error in &errors {
                console.write_error(&error.to_string());
            }
            false
        }
    }
}
