//! Naming pass: register names to slots, label names to command indices

use std::collections::HashMap;

use crate::slim::parser::ParsedLine;
use crate::slim::{CompilationError, NUM_REGISTERS};
use crate::validation::Validation;

/// A command whose arguments are still raw strings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedCommand {
    pub opcode: String,
    pub args: Vec<String>,
    pub line: usize,
}

/// The commands of a program plus the meaning of every declared name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedProgram {
    pub commands: Vec<NamedCommand>,
    pub registers: HashMap<String, usize>,
    pub labels: HashMap<String, usize>,
}

/// Walk parsed lines in order, assigning each allocated register the next
/// free slot and each label the index of the command that follows it.
///
/// A label followed only by more labels or by the end of the program gets
/// the index one past the last command, so jumping to it halts. Name
/// collisions and slot exhaustion are accumulated.
pub fn name(lines: &[ParsedLine]) -> Validation<NamedProgram, CompilationError> {
    let mut registers: HashMap<String, usize> = HashMap::new();
    let mut labels: HashMap<String, usize> = HashMap::new();
    let mut commands: Vec<NamedCommand> = Vec::new();
    let mut pending_labels: Vec<String> = Vec::new();
    let mut errors: Vec<CompilationError> = Vec::new();

    for parsed in lines {
        match parsed {
            ParsedLine::Alloc { names, line } => {
                for name in names {
                    if registers.contains_key(name) || labels.contains_key(name) {
                        errors.push(CompilationError::RegisterInUse {
                            name: name.clone(),
                            line: *line,
                        });
                    } else if registers.len() >= NUM_REGISTERS {
                        errors.push(CompilationError::NoMoreRegisters {
                            name: name.clone(),
                            line: *line,
                        });
                    } else {
                        let slot = registers.len();
                        registers.insert(name.clone(), slot);
                    }
                }
            }
            ParsedLine::Label { name, line } => {
                if registers.contains_key(name)
                    || labels.contains_key(name)
                    || pending_labels.contains(name)
                {
                    errors.push(CompilationError::LabelInUse {
                        name: name.clone(),
                        line: *line,
                    });
                } else {
                    pending_labels.push(name.clone());
                }
            }
            ParsedLine::Command { opcode, args, line } => {
                for label in pending_labels.drain(..) {
                    labels.insert(label, commands.len());
                }
                commands.push(NamedCommand {
                    opcode: opcode.clone(),
                    args: args.clone(),
                    line: *line,
                });
            }
            ParsedLine::Blank => {}
        }
    }
    // a trailing label points one past the last command; jumping there halts
    for label in pending_labels.drain(..) {
        labels.insert(label, commands.len());
    }

    if errors.is_empty() {
        Ok(NamedProgram {
            commands,
            registers,
            labels,
        })
    } else {
        Err(errors)
    }
}
