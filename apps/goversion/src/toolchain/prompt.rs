//! Confirmation gates for destructive steps.
//!
//! The install pipeline asks before downloading and again before replacing
//! the installation root. It only sees the [`Confirm`] trait; the CLI picks
//! [`TerminalPrompt`] or, with `--yes`, [`AssumeYes`].

use std::io::{self, BufRead, Write};

/// Blocking yes/no question.
pub trait Confirm {
    /// Asks `prompt` and returns the answer.
    ///
    /// # Errors
    ///
    /// Returns an error if the answer cannot be read.
    fn confirm(&self, prompt: &str) -> io::Result<bool>;
}

/// Asks on stdout and reads the answer from stdin.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompt;

impl Confirm for TerminalPrompt {
    fn confirm(&self, prompt: &str) -> io::Result<bool> {
        let stdin = io::stdin();
        let stdout = io::stdout();
        ask(&mut stdin.lock(), &mut stdout.lock(), prompt)
    }
}

/// Accepts every prompt without asking.
#[derive(Debug, Default, Clone, Copy)]
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&self, prompt: &str) -> io::Result<bool> {
        log::debug!("{prompt} [assumed yes]");
        Ok(true)
    }
}

/// Repeats `prompt` until the answer is one of `y`, `yes`, `n` or `no`.
///
/// End of input counts as a refusal.
fn ask<R: BufRead, W: Write>(input: &mut R, output: &mut W, prompt: &str) -> io::Result<bool> {
    let mut line = String::new();
    loop {
        write!(output, "{prompt} [y/n]: ")?;
        output.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            writeln!(output)?;
            return Ok(false);
        }

        match line.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            _ => {}
        }
    }
}
