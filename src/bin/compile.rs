use std::io::Read;
use std::{env, fs};

use worm::logging::error;

fn main() {
    let args: Vec<String> = env::args().collect();
    let source = read_source(&args[1..]).unwrap_or_else(|message| {
        error(&message);
        std::process::exit(1);
    });

    match worm::compiler::compile(&source) {
        Ok(assembly) => print!("{}", assembly),
        Err(e) => {
            error(&e.to_string());
            std::process::exit(1);
        }
    }
}

/// Concatenate the named source files, or read stdin when none are given
fn read_source(paths: &[String]) -> Result<String, String> {
    if paths.is_empty() {
        let mut source = String::new();
        std::io::stdin()
            .read_to_string(&mut source)
            .map_err(|e| format!("failed to read stdin: {}", e))?;
        return Ok(source);
    }
    let mut source = String::new();
    for path in paths {
        let text = fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {}", path, e))?;
        source.push_str(&text);
    }
    Ok(source)
}
