//! Interactive questions about library metadata.

use crate::analysis::{AnalysisOption, OptionValues};
use crate::error::MkaError;
use anyhow::Result;
use log::warn;
use std::io::{self, BufRead, Stderr, StdinLock, Write};

/// Source of answers for interactive metadata entry.
pub trait Prompter {
    /// Ask `question`, offering `current` as the default. A blank answer keeps `current`.
    fn ask(&mut self, question: &str, current: &str) -> Result<String>;

    /// Ask for an analysis option until the answer is acceptable.
    fn ask_option(&mut self, option: &AnalysisOption, current: &str) -> Result<String> {
        let question = match option.values {
            OptionValues::Choice(choices) => format!("{} ({})", option.prompt, choices.join("/")),
            OptionValues::Mapq => option.prompt.to_string(),
        };
        loop {
            let answer = self.ask(&question, current)?;
            if option.accepts(&answer) {
                return Ok(answer);
            }
            let err = MkaError::InvalidChoice {
                option: option.name.to_string(),
                value: answer,
                expected: option.expected(),
            };
            warn!("{err}");
        }
    }
}

/// Line-oriented prompter: questions go to `output`, answers come from `input`.
pub struct LinePrompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> LinePrompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        LinePrompter { input, output }
    }

    pub fn into_output(self) -> W {
        self.output
    }
}

/// Prompter over the process's stdin, asking on stderr.
pub fn terminal() -> LinePrompter<StdinLock<'static>, Stderr> {
    LinePrompter::new(io::stdin().lock(), io::stderr())
}

impl<R: BufRead, W: Write> Prompter for LinePrompter<R, W> {
    fn ask(&mut self, question: &str, current: &str) -> Result<String> {
        if current.is_empty() {
            write!(self.output, "{question}: ")?;
        } else {
            write!(self.output, "{question} [{current}]: ")?;
        }
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            writeln!(self.output)?;
            return Err(MkaError::PromptClosed(question.to_string()).into());
        }

        let answer = line.trim();
        if answer.is_empty() {
            Ok(current.to_string())
        } else {
            Ok(answer.to_string())
        }
    }
}
