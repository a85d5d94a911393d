//! Line-at-a-time parser for SLIM source text

use regex::Regex;

use crate::slim::CompilationError;
use crate::validation::Validation;

/// One source line in parsed form
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
    /// An opcode with raw argument strings
    Command {
        opcode: String,
        args: Vec<String>,
        line: usize,
    },
    /// A jump target naming the next command
    Label { name: String, line: usize },
    /// An `allocate-registers` directive
    Alloc { names: Vec<String>, line: usize },
    /// Nothing left after comment stripping
    Blank,
}

// A name starts with anything but a digit and continues with anything that
// is neither whitespace nor a comma.
const NAME: &str = r"[^\s,\d][^\s,]*";
// Arguments and allocation names are separated by whitespace or by a comma
// with optional surrounding whitespace.
const SEP: &str = r"(?:\s*,\s*|\s+)";

/// Parse SLIM source into line records, preserving 1-based line numbers.
///
/// Unparseable lines are collected as [`CompilationError::BadWord`] and
/// parsing continues, so one pass reports every malformed line.
pub fn parse(source: &str) -> Validation<Vec<ParsedLine>, CompilationError> {
    let label = Regex::new(&format!("^({NAME}):$")).unwrap();
    let alloc = Regex::new(&format!(r"^allocate-registers\s+{NAME}(?:{SEP}{NAME})*$")).unwrap();
    let command =
        Regex::new(&format!(r"^([a-z-]+)(?:\s+(?:-?\d+|{NAME})(?:{SEP}(?:-?\d+|{NAME}))*)?$"))
            .unwrap();
    let token = Regex::new(r"[^\s,]+").unwrap();

    let mut lines = Vec::new();
    let mut errors = Vec::new();
    for (index, raw) in source.lines().enumerate() {
        let line_number = index + 1;
        let cleaned = raw.split(';').next().unwrap_or("").trim();
        if cleaned.is_empty() {
            lines.push(ParsedLine::Blank);
        } else if let Some(captures) = label.captures(cleaned) {
            lines.push(ParsedLine::Label {
                name: captures[1].to_string(),
                line: line_number,
            });
        } else if alloc.is_match(cleaned) {
            let names = token
                .find_iter(cleaned)
                .skip(1) // the directive itself
                .map(|found| found.as_str().to_string())
                .collect();
            lines.push(ParsedLine::Alloc {
                names,
                line: line_number,
            });
        } else if command.is_match(cleaned) {
            let mut tokens = token.find_iter(cleaned).map(|found| found.as_str().to_string());
            let opcode = tokens.next().unwrap();
            lines.push(ParsedLine::Command {
                opcode,
                args: tokens.collect(),
                line: line_number,
            });
        } else {
            errors.push(CompilationError::BadWord {
                word: cleaned.to_string(),
                line: line_number,
            });
        }
    }
    if errors.is_empty() { Ok(lines) } else { Err(errors) }
}

#[cfg(test)]
mod test {
    use indoc::indoc;

    use super::*;

    fn command(opcode: &str, args: &[&str], line: usize) -> ParsedLine {
        ParsedLine::Command {
            opcode: opcode.to_string(),
            args: args.iter().map(|arg| arg.to_string()).collect(),
            line,
        }
    }

    #[test]
    fn parses_every_line_form() {
        let source = indoc! {"
            ; a whole-line comment
            allocate-registers a, b
            start:
            add a, a, b ; a trailing comment

            halt
        "};
        let parsed = parse(source).unwrap();
        assert_eq!(
            parsed,
            vec![
                ParsedLine::Blank,
                ParsedLine::Alloc {
                    names: vec!["a".to_string(), "b".to_string()],
                    line: 2,
                },
                ParsedLine::Label {
                    name: "start".to_string(),
                    line: 3,
                },
                command("add", &["a", "a", "b"], 4),
                ParsedLine::Blank,
                command("halt", &[], 6),
            ]
        );
    }

    #[test]
    fn separators_may_be_commas_or_whitespace() {
        let parsed = parse("allocate-registers a b,c , d\nadd a b, c\n").unwrap();
        assert_eq!(
            parsed,
            vec![
                ParsedLine::Alloc {
                    names: vec![
                        "a".to_string(),
                        "b".to_string(),
                        "c".to_string(),
                        "d".to_string(),
                    ],
                    line: 1,
                },
                command("add", &["a", "b", "c"], 2),
            ]
        );
    }

    #[test]
    fn accepts_signed_integer_literals_as_arguments() {
        let parsed = parse("li a, -5\n").unwrap();
        assert_eq!(parsed, vec![command("li", &["a", "-5"], 1)]);
    }

    #[test]
    fn rejects_a_malformed_allocation() {
        // "5x" is neither a name nor a literal, so the directive form fails
        // and so does the command form.
        let errors = parse("allocate-registers 5x\n").unwrap_err();
        assert_eq!(
            errors,
            vec![CompilationError::BadWord {
                word: "allocate-registers 5x".to_string(),
                line: 1,
            }]
        );
    }

    #[test]
    fn a_bare_allocation_falls_through_to_a_command() {
        // with no names the directive form fails, but the word itself still
        // looks like an opcode; the resolver rejects it later
        let parsed = parse("allocate-registers\n").unwrap();
        assert_eq!(parsed, vec![command("allocate-registers", &[], 1)]);
    }

    #[test]
    fn collects_every_bad_line() {
        let errors = parse("li a, 5\n???\nhalt\n!!!\n").unwrap_err();
        assert_eq!(
            errors,
            vec![
                CompilationError::BadWord {
                    word: "???".to_string(),
                    line: 2,
                },
                CompilationError::BadWord {
                    word: "!!!".to_string(),
                    line: 4,
                },
            ]
        );
    }
}
