use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};

/// Source of interactive yes/no decisions.
pub trait Confirm {
    fn confirm(&mut self, prompt: &str) -> Result<bool>;
}

impl<C: Confirm + ?Sized> Confirm for &mut C {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        (**self).confirm(prompt)
    }
}

/// Prompts on stdout and accepts exactly `y` from stdin.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        let stdin = io::stdin();
        let stdout = io::stdout();
        ask(prompt, &mut stdin.lock(), &mut stdout.lock())
    }
}

fn ask<R: BufRead, W: Write>(prompt: &str, input: &mut R, output: &mut W) -> Result<bool> {
    write!(output, "{prompt} [y/N]: ").context("failed to write confirmation prompt")?;
    output.flush().context("failed to flush confirmation prompt")?;

    let mut answer = String::new();
    input
        .read_line(&mut answer)
        .context("failed to read confirmation answer")?;
    Ok(answer.trim_end_matches(['\r', '\n']) == "y")
}
