//! Compiling worm source to SLIM assembly text

pub mod ast;
pub mod lower;
pub mod parser;

use std::fmt;

/// A fatal problem in the source program.
///
/// Compilation aborts at the first one; there is no recovery inside the
/// front end or the lowering engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    pub message: String,
    pub line: Option<usize>,
}

impl CompileError {
    pub fn new(message: impl Into<String>, line: usize) -> CompileError {
        CompileError {
            message: message.into(),
            line: Some(line),
        }
    }

    pub fn without_line(message: impl Into<String>) -> CompileError {
        CompileError {
            message: message.into(),
            line: None,
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "Line {}: {}", line, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for CompileError {}

/// Compile worm source text to SLIM assembly text
pub fn compile(source: &str) -> Result<String, CompileError> {
    let module = parser::parse(source)?;
    lower::lower(&module)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn compiled_output_is_slim_text() {
        let slim = compile("print(int(123))\n").unwrap();
        assert!(slim.starts_with("allocate-registers "));
        assert!(slim.contains("li result, 123"));
        assert!(slim.contains("write result"));
        assert!(slim.trim_end().ends_with("halt"));
    }

    #[test]
    fn errors_carry_their_line() {
        let error = compile("x = 1\ny = z\n").unwrap_err();
        assert_eq!(error.to_string(), "Line 2: Unknown name: z");
    }
}
