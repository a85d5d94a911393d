use std::{env, fs};

use worm::console::StdIoConsole;
use worm::logging::error;

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        eprintln!("Usage: {} <program.slim>", args[0]);
        std::process::exit(1);
    }

    let source = fs::read_to_string(&args[1]).unwrap_or_else(|e| {
        error(&format!("failed to read {}: {}", args[1], e));
        std::process::exit(1);
    });

    let mut console = StdIoConsole;
    if !worm::slim::run(&source, &mut console) {
        std::process::exit(2);
    }
}
