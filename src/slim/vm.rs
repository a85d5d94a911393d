//! The SLIM virtual machine

use std::collections::HashMap;
use std::fmt;

use num_integer::Integer;

use crate::console::Console;
use crate::slim::NUM_REGISTERS;
use crate::slim::resolver::{Opcode, ResolvedCommand};

/// A failure that terminates execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    DivisionByZero,
    /// A load from an address no store has touched
    UnwrittenAddress(i32),
    /// A register operand that does not name one of the 32 registers
    RegisterOutOfRange(i32),
    /// A console line that does not parse as an integer
    BadInput(String),
    EndOfInput,
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::DivisionByZero => write!(f, "Division by zero."),
            RuntimeError::UnwrittenAddress(address) => {
                write!(f, "Read of unwritten address {}.", address)
            }
            RuntimeError::RegisterOutOfRange(index) => {
                write!(f, "Register index {} out of range.", index)
            }
            RuntimeError::BadInput(input) => {
                write!(f, "Cannot read '{}' as an integer.", input)
            }
            RuntimeError::EndOfInput => write!(f, "No more input."),
        }
    }
}

impl std::error::Error for RuntimeError {}

/// State of one SLIM execution
pub struct Vm<'a> {
    running: bool,
    registers: [i32; NUM_REGISTERS],
    memory: HashMap<i32, i32>,
    commands: Vec<ResolvedCommand>,
    pointer: i32,
    console: &'a mut dyn Console,
}

impl<'a> Vm<'a> {
    pub fn new(commands: Vec<ResolvedCommand>, console: &'a mut dyn Console) -> Vm<'a> {
        Vm {
            running: true,
            registers: [0; NUM_REGISTERS],
            memory: HashMap::new(),
            commands,
            pointer: 0,
            console,
        }
    }

    /// Run the fetch–execute loop until a `halt` executes or the pointer
    /// leaves the program
    pub fn execute(mut self) -> Result<(), RuntimeError> {
        while self.running && self.pointer >= 0 && (self.pointer as usize) < self.commands.len() {
            let command = self.commands[self.pointer as usize].clone();
            self.exec_command(&command)?;
        }
        Ok(())
    }

    fn exec_command(&mut self, command: &ResolvedCommand) -> Result<(), RuntimeError> {
        match (command.opcode, command.args.as_slice()) {
            (Opcode::Add, &[dest, src1, src2]) => {
                self.arithmetic(dest, src1, src2, |a, b| a + b)
            }
            (Opcode::Sub, &[dest, src1, src2]) => {
                self.arithmetic(dest, src1, src2, |a, b| a - b)
            }
            (Opcode::Mul, &[dest, src1, src2]) => {
                self.arithmetic(dest, src1, src2, |a, b| a * b)
            }
            (Opcode::Div | Opcode::Quo, &[dest, src1, src2]) => {
                self.division(dest, src1, src2)
            }
            (Opcode::Rem, &[dest, src1, src2]) => self.remainder(dest, src1, src2),
            (Opcode::Seq, &[dest, src1, src2]) => {
                self.predicate(dest, src1, src2, |a, b| a == b)
            }
            (Opcode::Sne, &[dest, src1, src2]) => {
                self.predicate(dest, src1, src2, |a, b| a != b)
            }
            (Opcode::Slt, &[dest, src1, src2]) => {
                self.predicate(dest, src1, src2, |a, b| a < b)
            }
            (Opcode::Sgt, &[dest, src1, src2]) => {
                self.predicate(dest, src1, src2, |a, b| a > b)
            }
            (Opcode::Sle, &[dest, src1, src2]) => {
                self.predicate(dest, src1, src2, |a, b| a <= b)
            }
            (Opcode::Sge, &[dest, src1, src2]) => {
                self.predicate(dest, src1, src2, |a, b| a >= b)
            }
            (Opcode::Ld, &[dest, addr]) => {
                let address = self.get(addr)?;
                let value = *self
                    .memory
                    .get(&address)
                    .ok_or(RuntimeError::UnwrittenAddress(address))?;
                self.set(dest, value)?;
                self.advance();
                Ok(())
            }
            (Opcode::St, &[src, addr]) => {
                let address = self.get(addr)?;
                let value = self.get(src)?;
                self.memory.insert(address, value);
                self.advance();
                Ok(())
            }
            (Opcode::Li, &[dest, immediate]) => {
                self.set(dest, immediate)?;
                self.advance();
                Ok(())
            }
            (Opcode::Read, &[dest]) => {
                let input = self.console.read().ok_or(RuntimeError::EndOfInput)?;
                let value = input
                    .trim()
                    .parse::<i32>()
                    .map_err(|_| RuntimeError::BadInput(input.clone()))?;
                self.set(dest, value)?;
                self.advance();
                Ok(())
            }
            (Opcode::Write, &[src]) => {
                let value = self.get(src)?;
                self.console.write(&value.to_string());
                self.advance();
                Ok(())
            }
            (Opcode::J, &[addr]) => {
                self.pointer = self.get(addr)?;
                Ok(())
            }
            (Opcode::Jeqz, &[src, addr]) => {
                let target = self.get(addr)?;
                if self.get(src)? == 0 {
                    self.pointer = target;
                } else {
                    self.advance();
                }
                Ok(())
            }
            (Opcode::Halt, &[]) => {
                self.running = false;
                Ok(())
            }
            _ => unreachable!("arity was checked during resolution"),
        }
    }

    fn get(&self, index: i32) -> Result<i32, RuntimeError> {
        usize::try_from(index)
            .ok()
            .and_then(|slot| self.registers.get(slot))
            .copied()
            .ok_or(RuntimeError::RegisterOutOfRange(index))
    }

    fn set(&mut self, index: i32, value: i32) -> Result<(), RuntimeError> {
        let slot = usize::try_from(index).map_err(|_| RuntimeError::RegisterOutOfRange(index))?;
        match self.registers.get_mut(slot) {
            Some(register) => {
                *register = value;
                Ok(())
            }
            None => Err(RuntimeError::RegisterOutOfRange(index)),
        }
    }

    fn advance(&mut self) {
        self.pointer += 1;
    }

    // Arithmetic runs in i64 and truncates the result, wrapping it into
    // 32-bit two's complement.
    fn arithmetic(
        &mut self,
        dest: i32,
        src1: i32,
        src2: i32,
        op: fn(i64, i64) -> i64,
    ) -> Result<(), RuntimeError> {
        let a = i64::from(self.get(src1)?);
        let b = i64::from(self.get(src2)?);
        self.set(dest, op(a, b) as i32)?;
        self.advance();
        Ok(())
    }

    fn division(&mut self, dest: i32, src1: i32, src2: i32) -> Result<(), RuntimeError> {
        let a = i64::from(self.get(src1)?);
        let b = i64::from(self.get(src2)?);
        if b == 0 {
            return Err(RuntimeError::DivisionByZero);
        }
        self.set(dest, Integer::div_floor(&a, &b) as i32)?;
        self.advance();
        Ok(())
    }

    // The remainder takes the sign of the dividend: align the signs, then
    // floor-mod.
    fn remainder(&mut self, dest: i32, src1: i32, src2: i32) -> Result<(), RuntimeError> {
        let mut a = i64::from(self.get(src1)?);
        let mut b = i64::from(self.get(src2)?);
        if b == 0 {
            return Err(RuntimeError::DivisionByZero);
        }
        if a.signum() != b.signum() {
            a = -a;
            b = -b;
        }
        self.set(dest, Integer::mod_floor(&a, &b) as i32)?;
        self.advance();
        Ok(())
    }

    fn predicate(
        &mut self,
        dest: i32,
        src1: i32,
        src2: i32,
        relation: fn(i32, i32) -> bool,
    ) -> Result<(), RuntimeError> {
        let a = self.get(src1)?;
        let b = self.get(src2)?;
        self.set(dest, i32::from(relation(a, b)))?;
        self.advance();
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use indoc::indoc;

    use super::*;
    use crate::console::StaticConsole;
    use crate::slim::assemble;

    fn execute(source: &str, input: &[&str]) -> (Vec<String>, Result<(), RuntimeError>) {
        let commands = assemble(source).expect("program should assemble");
        let mut console = StaticConsole::new(input);
        let result = Vm::new(commands, &mut console).execute();
        (console.output, result)
    }

    fn outputs(source: &str) -> Vec<String> {
        let (output, result) = execute(source, &[]);
        result.expect("program should run to completion");
        output
    }

    #[test]
    fn addition_wraps_at_the_32_bit_boundary() {
        let output = outputs(indoc! {"
            allocate-registers big, one
            li big, 2147483647
            li one, 1
            add big, big, one
            write big
        "});
        assert_eq!(output, vec!["-2147483648"]);
    }

    #[test]
    fn division_floors_toward_negative_infinity() {
        let output = outputs(indoc! {"
            allocate-registers a, b
            li a, -7
            li b, 2
            div a, a, b
            write a
            li a, 7
            li b, 2
            quo a, a, b
            write a
        "});
        assert_eq!(output, vec!["-4", "3"]);
    }

    #[test]
    fn remainder_takes_the_sign_of_the_dividend() {
        let output = outputs(indoc! {"
            allocate-registers a, b, out
            li a, -7
            li b, 2
            rem out, a, b
            write out
            li a, 7
            li b, -2
            rem out, a, b
            write out
            li a, 7
            li b, 2
            rem out, a, b
            write out
        "});
        assert_eq!(output, vec!["-1", "1", "1"]);
    }

    #[test]
    fn division_by_zero_fails() {
        let (_, result) = execute(
            indoc! {"
                allocate-registers a, b
                li a, 1
                div a, a, b
            "},
            &[],
        );
        assert_eq!(result, Err(RuntimeError::DivisionByZero));
    }

    #[test]
    fn predicates_write_one_or_zero() {
        let output = outputs(indoc! {"
            allocate-registers a, b, out
            li a, 3
            li b, 5
            slt out, a, b
            write out
            sge out, a, b
            write out
            sne out, a, b
            write out
            seq out, a, a
            write out
        "});
        assert_eq!(output, vec!["1", "0", "1", "1"]);
    }

    #[test]
    fn memory_round_trips_through_an_address_register() {
        let output = outputs(indoc! {"
            allocate-registers value, addr
            li value, 42
            li addr, 100
            st value, addr
            ld value, addr
            write value
        "});
        assert_eq!(output, vec!["42"]);
    }

    #[test]
    fn loading_an_unwritten_address_fails() {
        let (_, result) = execute(
            indoc! {"
                allocate-registers value, addr
                li addr, 5
                ld value, addr
            "},
            &[],
        );
        assert_eq!(result, Err(RuntimeError::UnwrittenAddress(5)));
    }

    #[test]
    fn read_echoes_through_write() {
        let (output, result) = execute("allocate-registers a\nread a\nwrite a\n", &["-17"]);
        result.unwrap();
        assert_eq!(output, vec!["-17"]);
    }

    #[test]
    fn read_rejects_non_integer_input() {
        let (_, result) = execute("allocate-registers a\nread a\n", &["seven"]);
        assert_eq!(result, Err(RuntimeError::BadInput("seven".to_string())));
    }

    #[test]
    fn read_fails_at_end_of_input() {
        let (_, result) = execute("allocate-registers a\nread a\n", &[]);
        assert_eq!(result, Err(RuntimeError::EndOfInput));
    }

    #[test]
    fn jumps_are_register_indirect() {
        let output = outputs(indoc! {"
            allocate-registers counter, limit, cond, target, one
            li one, 1
            li limit, 3
            again:
            add counter, counter, one
            slt cond, counter, limit
            li target, done
            jeqz cond, target
            li target, again
            j target
            done:
            write counter
        "});
        assert_eq!(output, vec!["3"]);
    }

    #[test]
    fn a_jump_out_of_range_halts() {
        let output = outputs(indoc! {"
            allocate-registers target
            li target, -1
            j target
            write target
        "});
        assert!(output.is_empty());
    }

    #[test]
    fn halt_stops_before_later_commands() {
        let output = outputs(indoc! {"
            allocate-registers a
            li a, 1
            halt
            write a
        "});
        assert!(output.is_empty());
    }
}
