//! Lowering from the worm AST to SLIM assembly text
//!
//! Every expression leaves its value in the reserved `result` register.
//! Nested expressions spill their left operands into anonymous `arg-<n>`
//! registers; named variables live in per-scope `local-<n>` registers that
//! are saved to the stack around calls. The emitted program starts with one
//! `allocate-registers` directive naming every register used, then loads
//! for the `zero`, `one` and `stack-pointer` registers, then the body, then
//! `halt`.

use std::collections::{BTreeSet, HashMap};

use crate::compiler::CompileError;
use crate::compiler::ast::{BinOp, BoolOp, CmpOp, Expr, Module, Stmt, UnaryOp};
use crate::slim::NUM_REGISTERS;

const RESULT: &str = "result";
const ZERO: &str = "zero";
const ONE: &str = "one";
const JUMP_LABEL: &str = "jump-label";
// always points at the next empty slot in the stack
const STACK_POINTER: &str = "stack-pointer";
const MAIN_SCOPE: &str = "";

fn binop_opcode(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "add",
        BinOp::Sub => "sub",
        BinOp::Mul => "mul",
        BinOp::FloorDiv => "div",
        BinOp::Mod => "rem",
    }
}

fn cmp_opcode(op: CmpOp) -> &'static str {
    match op {
        CmpOp::Eq => "seq",
        CmpOp::NotEq => "sne",
        CmpOp::Lt => "slt",
        CmpOp::Gt => "sgt",
        CmpOp::LtE => "sle",
        CmpOp::GtE => "sge",
    }
}

/// Variable bindings for one function scope
#[derive(Default)]
struct Namespace {
    names: HashMap<String, String>,
    local_count: usize,
}

/// Builder state threaded through the AST walk
struct Lowerer {
    namespaces: HashMap<String, Namespace>,
    scope: String,
    registers: BTreeSet<String>,
    arg_count: usize,
    lines: Vec<String>,
    break_labels: Vec<String>,
    continue_labels: Vec<String>,
    label_counts: HashMap<String, usize>,
}

/// Lower a module to SLIM assembly text
pub fn lower(module: &Module) -> Result<String, CompileError> {
    let mut lowerer = Lowerer::new();
    for statement in &module.body {
        lowerer.stmt(statement)?;
    }
    lowerer.finish()
}

impl Lowerer {
    fn new() -> Lowerer {
        let mut namespaces = HashMap::new();
        namespaces.insert(MAIN_SCOPE.to_string(), Namespace::default());
        let registers = [RESULT, ZERO, ONE, JUMP_LABEL, STACK_POINTER]
            .into_iter()
            .map(str::to_string)
            .collect();
        Lowerer {
            namespaces,
            scope: MAIN_SCOPE.to_string(),
            registers,
            arg_count: 0,
            lines: Vec::new(),
            break_labels: Vec::new(),
            continue_labels: Vec::new(),
            label_counts: HashMap::new(),
        }
    }

    // === names and registers === //

    /// The name of the n-th expression spill register, allocating it
    fn arg(&mut self, n: usize) -> String {
        let name = format!("arg-{n}");
        self.registers.insert(name.clone());
        name
    }

    /// The name of the n-th local-variable register, allocating it
    fn local(&mut self, n: usize) -> String {
        let name = format!("local-{n}");
        self.registers.insert(name.clone());
        name
    }

    /// Reserve the next spill register for the duration of one operand
    fn add_arg(&mut self) -> String {
        let name = self.arg(self.arg_count);
        self.arg_count += 1;
        name
    }

    fn rem_arg(&mut self) {
        self.arg_count -= 1;
    }

    /// A fresh label `<base>-<n>`, counting per base
    fn add_label(&mut self, base: &str) -> String {
        let count = self.label_counts.entry(base.to_string()).or_insert(0);
        *count += 1;
        format!("{base}-{count}")
    }

    /// The label at the head of the named function
    fn func_label(&self, name: &str) -> String {
        format!("def-{name}")
    }

    fn local_count(&self) -> usize {
        self.namespaces
            .get(&self.scope)
            .map_or(0, |namespace| namespace.local_count)
    }

    fn lookup_name(&self, name: &str) -> Option<String> {
        self.namespaces
            .get(&self.scope)
            .and_then(|namespace| namespace.names.get(name))
            .cloned()
    }

    /// The register for a variable in the current scope, binding the next
    /// local slot on first sight
    fn get_or_create_name(&mut self, name: &str) -> String {
        if let Some(existing) = self.lookup_name(name) {
            return existing;
        }
        let slot = self.local(self.local_count());
        let namespace = self.namespaces.entry(self.scope.clone()).or_default();
        namespace.names.insert(name.to_string(), slot.clone());
        namespace.local_count += 1;
        slot
    }

    // === emission === //

    fn emit(&mut self, opcode: &str, args: &[&str]) {
        if args.is_empty() {
            self.lines.push(opcode.to_string());
        } else {
            self.lines.push(format!("{} {}", opcode, args.join(", ")));
        }
    }

    fn label(&mut self, name: &str) {
        self.lines.push(format!("{name}:"));
    }

    // === helper idioms === //

    fn cp(&mut self, dest: &str, src: &str) {
        self.emit("add", &[dest, ZERO, src]);
    }

    fn j_to(&mut self, label: &str) {
        self.emit("li", &[JUMP_LABEL, label]);
        self.emit("j", &[JUMP_LABEL]);
    }

    fn jeqz_to(&mut self, src: &str, label: &str) {
        self.emit("li", &[JUMP_LABEL, label]);
        self.emit("jeqz", &[src, JUMP_LABEL]);
    }

    fn push(&mut self, src: &str) {
        self.emit("st", &[src, STACK_POINTER]);
        self.emit("add", &[STACK_POINTER, STACK_POINTER, ONE]);
    }

    fn pop(&mut self, dest: &str) {
        self.emit("sub", &[STACK_POINTER, STACK_POINTER, ONE]);
        self.emit("ld", &[dest, STACK_POINTER]);
    }

    // === statements === //

    fn stmt(&mut self, statement: &Stmt) -> Result<(), CompileError> {
        match statement {
            Stmt::Assign { target, value, .. } => {
                self.expr(value)?;
                let slot = self.get_or_create_name(target);
                self.cp(&slot, RESULT);
            }
            Stmt::AugAssign {
                target, op, value, ..
            } => {
                self.expr(value)?;
                let slot = self.get_or_create_name(target);
                self.emit(binop_opcode(*op), &[&slot, &slot, RESULT]);
            }
            Stmt::ExprStmt { value, .. } => {
                self.expr(value)?;
            }
            Stmt::If {
                test, body, orelse, ..
            } => {
                self.expr(test)?;
                let false_label = self.add_label("else");
                let end_label = self.add_label("end-if");
                self.jeqz_to(RESULT, &false_label);
                for statement in body {
                    self.stmt(statement)?;
                }
                self.j_to(&end_label);
                self.label(&false_label);
                for statement in orelse {
                    self.stmt(statement)?;
                }
                self.label(&end_label);
            }
            Stmt::While { test, body, .. } => {
                let start_label = self.add_label("start-while");
                let end_label = self.add_label("end-while");
                self.continue_labels.push(start_label.clone());
                self.break_labels.push(end_label.clone());

                self.label(&start_label);
                self.expr(test)?;
                self.jeqz_to(RESULT, &end_label);
                for statement in body {
                    self.stmt(statement)?;
                }
                self.j_to(&start_label);
                self.label(&end_label);

                self.continue_labels.pop();
                self.break_labels.pop();
            }
            Stmt::Break { line } => {
                let Some(label) = self.break_labels.last().cloned() else {
                    return Err(CompileError::new("'break' outside loop.", *line));
                };
                self.j_to(&label);
            }
            Stmt::Continue { line } => {
                let Some(label) = self.continue_labels.last().cloned() else {
                    return Err(CompileError::new("'continue' outside loop.", *line));
                };
                self.j_to(&label);
            }
            Stmt::FunctionDef {
                name, params, body, ..
            } => {
                let func_label = self.func_label(name);
                let end_label = self.add_label(&format!("end-{name}"));
                self.scope = name.clone();

                // don't execute the body when passing the definition
                self.j_to(&end_label);
                self.label(&func_label);
                for param in params {
                    // parameters must claim the lowest local slots, in order
                    self.get_or_create_name(param);
                }
                for statement in body {
                    self.stmt(statement)?;
                }
                // implicit return in case the body falls off the end
                self.pop(JUMP_LABEL);
                self.emit("j", &[JUMP_LABEL]);
                self.label(&end_label);

                self.scope = MAIN_SCOPE.to_string();
            }
            Stmt::Return { value, .. } => {
                self.expr(value)?;
                self.pop(JUMP_LABEL);
                self.emit("j", &[JUMP_LABEL]);
            }
        }
        Ok(())
    }

    // === expressions === //

    fn expr(&mut self, expression: &Expr) -> Result<(), CompileError> {
        match expression {
            Expr::Constant { value, .. } => {
                let wrapped = *value as i32;
                self.emit("li", &[RESULT, &wrapped.to_string()]);
            }
            Expr::Name { id, line } => {
                let Some(slot) = self.lookup_name(id) else {
                    return Err(CompileError::new(format!("Unknown name: {id}"), *line));
                };
                self.cp(RESULT, &slot);
            }
            Expr::NamedExpr { target, value, .. } => {
                self.expr(value)?;
                let slot = self.get_or_create_name(target);
                self.cp(&slot, RESULT);
            }
            Expr::UnaryOp { op, operand, .. } => {
                self.expr(operand)?;
                match op {
                    UnaryOp::Plus => {}
                    UnaryOp::Minus => self.emit("sub", &[RESULT, ZERO, RESULT]),
                    UnaryOp::Not => self.emit("seq", &[RESULT, ZERO, RESULT]),
                }
            }
            Expr::BinOp {
                left, op, right, ..
            } => {
                self.expr(left)?;
                let arg = self.add_arg();
                self.cp(&arg, RESULT);
                self.expr(right)?;
                self.emit(binop_opcode(*op), &[RESULT, &arg, RESULT]);
                self.rem_arg();
            }
            Expr::Compare {
                left, op, right, ..
            } => {
                self.expr(left)?;
                let arg = self.add_arg();
                self.cp(&arg, RESULT);
                self.expr(right)?;
                self.emit(cmp_opcode(*op), &[RESULT, &arg, RESULT]);
                self.rem_arg();
            }
            Expr::BoolOp {
                op, left, right, ..
            } => {
                let end_label = self.add_label("boolop-end");
                let next_label = self.add_label("boolop-next");
                self.expr(left)?;
                match op {
                    BoolOp::And => {
                        self.jeqz_to(RESULT, &end_label);
                        self.expr(right)?;
                    }
                    BoolOp::Or => {
                        self.jeqz_to(RESULT, &next_label);
                        self.j_to(&end_label);
                        self.label(&next_label);
                        self.expr(right)?;
                    }
                }
                self.label(&end_label);
            }
            Expr::IfExp {
                test, body, orelse, ..
            } => {
                self.expr(test)?;
                let false_label = self.add_label("else");
                let end_label = self.add_label("end-if");
                self.jeqz_to(RESULT, &false_label);
                self.expr(body)?;
                self.j_to(&end_label);
                self.label(&false_label);
                self.expr(orelse)?;
                self.label(&end_label);
            }
            Expr::Call { func, args, line } => self.call(func, args, *line)?,
        }
        Ok(())
    }

    fn call(&mut self, func: &str, args: &[Expr], line: usize) -> Result<(), CompileError> {
        match func {
            "print" => {
                if args.len() != 1 {
                    return Err(CompileError::new("Non-single print arguments.", line));
                }
                let Expr::Call {
                    func: inner,
                    args: inner_args,
                    ..
                } = &args[0]
                else {
                    return Err(CompileError::new("Print call not wrapping int.", line));
                };
                if inner != "int" {
                    return Err(CompileError::new("Print call not wrapping int.", line));
                }
                if inner_args.len() != 1 {
                    return Err(CompileError::new("Multiple print call arguments.", line));
                }
                self.expr(&inner_args[0])?;
                self.emit("write", &[RESULT]);
            }
            "int" => {
                if args.len() != 1 {
                    return Err(CompileError::new("Non-single int arguments.", line));
                }
                let Expr::Call {
                    func: inner,
                    args: inner_args,
                    ..
                } = &args[0]
                else {
                    return Err(CompileError::new("Int call not wrapping input.", line));
                };
                if inner != "input" {
                    return Err(CompileError::new("Int call not wrapping input.", line));
                }
                if !inner_args.is_empty() {
                    return Err(CompileError::new("Input call argument.", line));
                }
                self.emit("read", &[RESULT]);
            }
            _ => self.user_call(func, args)?,
        }
        Ok(())
    }

    /// A call to a user-defined function.
    ///
    /// Saves the live spill registers and the caller's locals, pushes the
    /// return address, places the arguments directly into the callee's
    /// parameter slots, jumps, and restores everything in reverse order.
    /// `result` is not saved, so the callee's return value survives the
    /// restore.
    fn user_call(&mut self, func: &str, args: &[Expr]) -> Result<(), CompileError> {
        let return_label = self.add_label("return");
        let func_label = self.func_label(func);
        let saved_args = self.arg_count;
        let saved_locals = self.local_count();

        for index in 0..saved_args {
            let register = self.arg(index);
            self.push(&register);
        }
        for index in 0..saved_locals {
            let register = self.local(index);
            self.push(&register);
        }
        self.emit("li", &[JUMP_LABEL, &return_label]);
        self.push(JUMP_LABEL);
        for (index, arg) in args.iter().enumerate() {
            self.expr(arg)?;
            let slot = self.local(index);
            self.cp(&slot, RESULT);
        }
        self.j_to(&func_label);
        self.label(&return_label);
        for index in (0..saved_locals).rev() {
            let register = self.local(index);
            self.pop(&register);
        }
        for index in (0..saved_args).rev() {
            let register = self.arg(index);
            self.pop(&register);
        }
        Ok(())
    }

    // === final emission === //

    fn finish(self) -> Result<String, CompileError> {
        if self.registers.len() > NUM_REGISTERS {
            return Err(CompileError::without_line("Expression stack overflow."));
        }
        let names: Vec<&str> = self.registers.iter().map(String::as_str).collect();
        let mut code = Vec::with_capacity(self.lines.len() + 5);
        code.push(format!("allocate-registers {}", names.join(", ")));
        code.push(format!("li {ZERO}, 0"));
        code.push(format!("li {ONE}, 1"));
        code.push(format!("li {STACK_POINTER}, 0"));
        code.extend(self.lines);
        code.push("halt".to_string());
        Ok(code.join("\n") + "\n")
    }
}

#[cfg(test)]
mod test {
    use indoc::indoc;

    use super::*;
    use crate::compiler::compile;
    use crate::console::StaticConsole;
    use crate::slim;

    /// Compile a worm program, run it, and return the console's output
    fn run_worm(source: &str, input: &[&str]) -> Vec<String> {
        let assembly = compile(source).expect("program should compile");
        let mut console = StaticConsole::new(input);
        assert!(
            slim::run(&assembly, &mut console),
            "program failed: {:?}",
            console.error
        );
        console.output
    }

    fn compile_error(source: &str) -> CompileError {
        compile(source).expect_err("program should not compile")
    }

    #[test]
    fn emitted_text_reassembles() {
        let source = indoc! {"
            def double(x):
                return x + x

            i = 0
            while i < 3:
                if i % 2 == 0 and i != 4:
                    print(int(double(i)))
                i += 1
        "};
        let assembly = compile(source).unwrap();
        assert!(slim::assemble(&assembly).is_ok());
    }

    #[test]
    fn the_preamble_declares_and_initializes_the_reserved_registers() {
        let assembly = compile("print(int(1))\n").unwrap();
        let lines: Vec<&str> = assembly.lines().collect();
        assert_eq!(
            lines[0],
            "allocate-registers jump-label, one, result, stack-pointer, zero"
        );
        assert_eq!(&lines[1..4], &["li zero, 0", "li one, 1", "li stack-pointer, 0"]);
        assert_eq!(lines.last(), Some(&"halt"));
    }

    #[test]
    fn binary_operands_spill_into_arg_registers() {
        let assembly = compile("print(int(1 + 2))\n").unwrap();
        assert!(assembly.contains("add result, arg-0, result"));
        // one nesting level only needs one spill register
        assert!(!assembly.contains("arg-1"));
    }

    #[test]
    fn counts_to_ten() {
        let source = "i = 1; while i <= 10: print(int(i)); i += 1\n";
        let expected: Vec<String> = (1..=10).map(|n| n.to_string()).collect();
        assert_eq!(run_worm(source, &[]), expected);
    }

    #[test]
    fn iterative_factorial() {
        let source = indoc! {"
            n = int(input())
            total = 1
            i = 1
            while i <= n:
                total *= i
                i += 1
            print(int(total))
        "};
        assert_eq!(run_worm(source, &["5"]), vec!["120"]);
    }

    #[test]
    fn recursive_factorial() {
        let source = indoc! {"
            def fact(x):
                return 1 if x == 1 else x * fact(x - 1)

            print(int(fact(5)))
        "};
        assert_eq!(run_worm(source, &[]), vec!["120"]);
    }

    #[test]
    fn doubly_recursive_fibonacci() {
        let source = indoc! {"
            def fib(x):
                if x <= 1:
                    return x
                else:
                    return fib(x - 1) + fib(x - 2)

            print(int(fib(4)))
        "};
        assert_eq!(run_worm(source, &[]), vec!["3"]);
    }

    #[test]
    fn recursion_with_locals_saves_and_restores_frames() {
        let source = indoc! {"
            def fib(x):
                if x <= 1:
                    return x
                else:
                    a = fib(x - 1)
                    b = fib(x - 2)
                    return a + b

            print(int(fib(10)))
        "};
        assert_eq!(run_worm(source, &[]), vec!["55"]);
    }

    #[test]
    fn two_parameter_recursion() {
        let source = indoc! {"
            def choose(n, k):
                if k == 0:
                    return 1
                elif k == n:
                    return 1
                else:
                    return choose(n - 1, k - 1) + choose(n - 1, k)

            print(int(choose(10, 4)))
        "};
        assert_eq!(run_worm(source, &[]), vec!["210"]);
    }

    #[test]
    fn repeated_doubling_overflows_to_the_minimum() {
        let source = indoc! {"
            x = 1
            i = 0
            while i < 31:
                x *= 2
                i += 1
            print(int(x))
        "};
        assert_eq!(run_worm(source, &[]), vec!["-2147483648"]);
    }

    #[test]
    fn break_leaves_only_the_innermost_loop() {
        let source = indoc! {"
            x = 0
            y = 0
            while True:
                x = 0
                while True:
                    x += 1
                    if x > 2:
                        break
                y += 1
                if y > 3:
                    break
            print(int(x))
            print(int(y))
        "};
        assert_eq!(run_worm(source, &[]), vec!["3", "4"]);
    }

    #[test]
    fn continue_skips_to_the_next_iteration() {
        let source = indoc! {"
            x = 0
            while x < 9:
                x += 1
                if x % 2 == 0:
                    continue
                print(int(x))
        "};
        assert_eq!(run_worm(source, &[]), vec!["1", "3", "5", "7", "9"]);
    }

    #[test]
    fn boolean_operators_short_circuit() {
        let source = indoc! {"
            x = 1
            y = 0 and (x := 9)
            z = 1 or (x := 9)
            print(int(x))
            print(int(y))
            print(int(z))
        "};
        assert_eq!(run_worm(source, &[]), vec!["1", "0", "1"]);
    }

    #[test]
    fn walrus_in_a_while_test() {
        let source = indoc! {"
            x = 0
            while (x := x + 1) < 5:
                print(int(x))
        "};
        assert_eq!(run_worm(source, &[]), vec!["1", "2", "3", "4"]);
    }

    #[test]
    fn unary_and_not() {
        let source = indoc! {"
            a = 99
            print(int(-a))
            print(int(+a))
            print(int(not a))
            print(int(not 0))
        "};
        assert_eq!(run_worm(source, &[]), vec!["-99", "99", "0", "1"]);
    }

    #[test]
    fn division_floors_and_remainder_follows_the_dividend() {
        let source = indoc! {"
            print(int(-7 // 2))
            print(int(-7 % 2))
            print(int(7 % -2))
        "};
        assert_eq!(run_worm(source, &[]), vec!["-4", "-1", "1"]);
    }

    #[test]
    fn rejects_unknown_names() {
        let error = compile_error("x = y\n");
        assert_eq!(error.message, "Unknown name: y");
        assert_eq!(error.line, Some(1));
    }

    #[test]
    fn rejects_break_outside_a_loop() {
        let error = compile_error("break\n");
        assert_eq!(error.message, "'break' outside loop.");
    }

    #[test]
    fn rejects_print_without_int() {
        let error = compile_error("print(3)\n");
        assert_eq!(error.message, "Print call not wrapping int.");
    }

    #[test]
    fn rejects_int_without_input() {
        let error = compile_error("x = int(3)\n");
        assert_eq!(error.message, "Int call not wrapping input.");
    }

    #[test]
    fn rejects_programs_that_need_too_many_registers() {
        // every level of right-nesting holds one more spill register live
        // while the inner operand evaluates
        let mut expression = String::from("1");
        for _ in 0..30 {
            expression = format!("(1 + {expression})");
        }
        let error = compile_error(&format!("print(int({expression}))\n"));
        assert_eq!(error.message, "Expression stack overflow.");
        assert_eq!(error.line, None);
    }

    #[test]
    fn deep_left_nesting_reuses_one_spill_register() {
        let mut expression = String::from("1");
        for _ in 0..30 {
            expression = format!("({expression} + 1)");
        }
        let assembly = compile(&format!("print(int({expression}))\n")).unwrap();
        assert!(assembly.contains("arg-0"));
        assert!(!assembly.contains("arg-1"));
    }
}
