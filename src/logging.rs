//! Pretty-printing diagnostics to the terminal

use colored::Colorize;

/// Pretty-print an error message to stderr
pub fn error(message: &str) {
    let title = "error:".red().bold();
    eprintln!("{} {}", title, message);
}
