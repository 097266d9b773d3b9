//! Interactive operator prompts

use crate::error::{AppError, AppResult};
use std::io::{BufRead, Write};

/// Asks the operator for a value
pub trait Prompter {
    /// Returns the trimmed answer, or `default` when the answer is empty.
    fn prompt(&mut self, label: &str, default: Option<&str>) -> AppResult<String>;
}

/// Prompts on stdout and reads answers line by line from any reader
pub struct LinePrompter<R: BufRead, W: Write> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> LinePrompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

/// Prompter bound to the process console
pub fn console() -> LinePrompter<std::io::StdinLock<'static>, std::io::Stdout> {
    LinePrompter::new(std::io::stdin().lock(), std::io::stdout())
}

impl<R: BufRead, W: Write> Prompter for LinePrompter<R, W> {
    fn prompt(&mut self, label: &str, default: Option<&str>) -> AppResult<String> {
        match default {
            Some(d) => write!(self.output, "{} [{}]: ", label, d)?,
            None => write!(self.output, "{}: ", label)?,
        }
        self.output.flush()?;

        let mut line = String::new();
        let read = self.input.read_line(&mut line)?;
        let answer = line.trim();

        if !answer.is_empty() {
            return Ok(answer.to_string());
        }
        match default {
            Some(d) => Ok(d.to_string()),
            None if read == 0 => Err(AppError::ConfigError(format!(
                "no input available for '{}'",
                label
            ))),
            None => Err(AppError::ConfigError(format!("'{}' is required", label))),
        }
    }
}
