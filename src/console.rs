//! The two-direction line I/O port connecting the machine to the world

use std::io::BufRead;

/// A line-oriented console with an output and an error channel
pub trait Console {
    /// Read one line, without the trailing newline. `None` on end of input.
    fn read(&mut self) -> Option<String>;

    /// Write one line to the output channel
    fn write(&mut self, message: &str);

    /// Write one diagnostic line to the error channel
    fn write_error(&mut self, message: &str);
}

/// Console backed by the process stdin, stdout and stderr
pub struct StdIoConsole;

impl Console for StdIoConsole {
    fn read(&mut self) -> Option<String> {
        let mut line = String::new();
        match std::io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => {
                while line.ends_with('\n') || line.ends_with('\r') {
                    line.pop();
                }
                Some(line)
            }
        }
    }

    fn write(&mut self, message: &str) {
        println!("{}", message);
    }

    fn write_error(&mut self, message: &str) {
        eprintln!("{}", message);
    }
}

/// Console with scripted input that records everything written to it
pub struct StaticConsole {
    input: std::vec::IntoIter<String>,
    pub output: Vec<String>,
    pub error: Vec<String>,
}

impl StaticConsole {
    pub fn new(input: &[&str]) -> StaticConsole {
        let lines: Vec<String> = input.iter().map(|line| line.to_string()).collect();
        StaticConsole {
            input: lines.into_iter(),
            output: Vec::new(),
            error: Vec::new(),
        }
    }
}

impl Console for StaticConsole {
    fn read(&mut self) -> Option<String> {
        self.input.next()
    }

    fn write(&mut self, message: &str) {
        self.output.push(message.to_string());
    }

    fn write_error(&mut self, message: &str) {
        self.error.push(message.to_string());
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn static_console_replays_input_in_order() {
        let mut console = StaticConsole::new(&["1", "2"]);
        assert_eq!(console.read(), Some("1".to_string()));
        assert_eq!(console.read(), Some("2".to_string()));
        assert_eq!(console.read(), None);
    }

    #[test]
    fn static_console_records_channels_separately() {
        let mut console = StaticConsole::new(&[]);
        console.write("out");
        console.write_error("err");
        assert_eq!(console.output, vec!["out"]);
        assert_eq!(console.error, vec!["err"]);
    }
}
