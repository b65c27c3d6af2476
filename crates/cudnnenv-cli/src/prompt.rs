use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use cudnnenv_installer::Confirm;

/// Asks `question [y/n] ` until the answer is `y` or `n` (any case).
/// End of input counts as "no".
pub(crate) fn yes_no_query<R: BufRead, W: Write>(
    question: &str,
    input: &mut R,
    output: &mut W,
) -> Result<bool> {
    loop {
        write!(output, "{question} [y/n] ").context("failed to write confirmation prompt")?;
        output
            .flush()
            .context("failed to flush confirmation prompt")?;

        let mut answer = String::new();
        let read = input
            .read_line(&mut answer)
            .context("failed to read confirmation answer")?;
        if read == 0 {
            writeln!(output).context("failed to write confirmation prompt")?;
            return Ok(false);
        }

        match answer.trim_end_matches(['\r', '\n']).to_ascii_lowercase().as_str() {
            "y" => return Ok(true),
            "n" => return Ok(false),
            _ => continue,
        }
    }
}

/// Terminal-backed [`Confirm`] over any reader/writer pair.
pub(crate) struct PromptConfirm<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> PromptConfirm<R, W> {
    pub(crate) fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> Confirm for PromptConfirm<R, W> {
    fn confirm(&mut self, question: &str) -> Result<bool> {
        yes_no_query(question, &mut self.input, &mut self.output)
    }
}
