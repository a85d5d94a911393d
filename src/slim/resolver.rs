//! Resolution pass: opcode, arity and argument checking

use std::str::FromStr;

use crate::slim::CompilationError;
use crate::slim::namer::{NamedCommand, NamedProgram};
use crate::validation::{self, Validation};

/// The SLIM operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Add,
    Sub,
    Mul,
    Div,
    /// Alias for [`Opcode::Div`]
    Quo,
    Rem,
    Seq,
    Sne,
    Slt,
    Sgt,
    Sle,
    Sge,
    Ld,
    St,
    Li,
    Read,
    Write,
    J,
    Jeqz,
    Halt,
}

/// What an argument position will be used for at runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Register,
    Label,
}

impl Opcode {
    /// Expected operands, in order
    pub fn roles(self) -> &'static [Role] {
        use Role::{Label, Register};
        match self {
            Opcode::Add
            | Opcode::Sub
            | Opcode::Mul
            | Opcode::Div
            | Opcode::Quo
            | Opcode::Rem
            | Opcode::Seq
            | Opcode::Sne
            | Opcode::Slt
            | Opcode::Sgt
            | Opcode::Sle
            | Opcode::Sge => &[Register, Register, Register],
            Opcode::Ld | Opcode::St | Opcode::Jeqz => &[Register, Register],
            Opcode::Li => &[Register, Label],
            Opcode::Read | Opcode::Write | Opcode::J => &[Register],
            Opcode::Halt => &[],
        }
    }
}

impl FromStr for Opcode {
    type Err = ();

    fn from_str(text: &str) -> Result<Opcode, ()> {
        match text {
            "add" => Ok(Opcode::Add),
            "sub" => Ok(Opcode::Sub),
            "mul" => Ok(Opcode::Mul),
            "div" => Ok(Opcode::Div),
            "quo" => Ok(Opcode::Quo),
            "rem" => Ok(Opcode::Rem),
            "seq" => Ok(Opcode::Seq),
            "sne" => Ok(Opcode::Sne),
            "slt" => Ok(Opcode::Slt),
            "sgt" => Ok(Opcode::Sgt),
            "sle" => Ok(Opcode::Sle),
            "sge" => Ok(Opcode::Sge),
            "ld" => Ok(Opcode::Ld),
            "st" => Ok(Opcode::St),
            "li" => Ok(Opcode::Li),
            "read" => Ok(Opcode::Read),
            "write" => Ok(Opcode::Write),
            "j" => Ok(Opcode::J),
            "jeqz" => Ok(Opcode::Jeqz),
            "halt" => Ok(Opcode::Halt),
            _ => Err(()),
        }
    }
}

/// A command ready for execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCommand {
    pub opcode: Opcode,
    pub args: Vec<i32>,
}

/// Check every command's opcode and arity and rewrite its arguments to
/// integers, accumulating errors across arguments and commands.
pub fn resolve(program: &NamedProgram) -> Validation<Vec<ResolvedCommand>, CompilationError> {
    validation::sequence(
        program
            .commands
            .iter()
            .map(|command| visit(command, program))
            .collect(),
    )
}

fn visit(
    command: &NamedCommand,
    program: &NamedProgram,
) -> Validation<ResolvedCommand, CompilationError> {
    let Ok(opcode) = command.opcode.parse::<Opcode>() else {
        return Err(vec![CompilationError::UnknownOpcode {
            name: command.opcode.clone(),
            line: command.line,
        }]);
    };
    let roles = opcode.roles();
    if command.args.len() < roles.len() {
        return Err(vec![CompilationError::MissingArgument { line: command.line }]);
    }
    if command.args.len() > roles.len() {
        return Err(vec![CompilationError::TooManyArguments { line: command.line }]);
    }

    let mut args = Vec::with_capacity(roles.len());
    let mut errors = Vec::new();
    for (arg, role) in command.args.iter().zip(roles) {
        match visit_arg(arg, *role, command.line, program) {
            Ok(value) => args.push(value),
            Err(error) => errors.push(error),
        }
    }
    if errors.is_empty() {
        Ok(ResolvedCommand { opcode, args })
    } else {
        Err(errors)
    }
}

fn visit_arg(
    arg: &str,
    role: Role,
    line: usize,
    program: &NamedProgram,
) -> Result<i32, CompilationError> {
    if is_literal(arg) {
        // a literal is tolerated in any position; a bad value surfaces at
        // runtime when it is dereferenced
        return match arg.parse::<i128>() {
            Ok(value) => Ok(value as i32),
            Err(_) => Err(CompilationError::UnknownName {
                name: arg.to_string(),
                line,
            }),
        };
    }
    if let Some(&slot) = program.registers.get(arg) {
        return match role {
            Role::Register => Ok(slot as i32),
            Role::Label => Err(CompilationError::ExpectedLabel {
                name: arg.to_string(),
                line,
            }),
        };
    }
    if let Some(&index) = program.labels.get(arg) {
        return match role {
            Role::Label => Ok(index as i32),
            Role::Register => Err(CompilationError::ExpectedRegister {
                name: arg.to_string(),
                line,
            }),
        };
    }
    Err(CompilationError::UnknownName {
        name: arg.to_string(),
        line,
    })
}

fn is_literal(arg: &str) -> bool {
    let digits = arg.strip_prefix('-').unwrap_or(arg);
    !digits.is_empty() && digits.bytes().all(|byte| byte.is_ascii_digit())
}
