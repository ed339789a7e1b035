// merakictl - CLI for the Meraki Dashboard API
// Copyright (C) 2024 Mathias Uhl <mathiasuhl@gmx.de>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use anyhow::{Context, Result, anyhow};
use std::io::{self, BufRead, Write};

pub trait Prompter {
    fn confirm(&mut self, question: &str) -> Result<bool>;

    /// Returns the index of the chosen option.
    fn choose(&mut self, question: &str, options: &[String]) -> Result<usize>;
}

/// Prompts on stderr so table output on stdout stays clean.
pub struct StdinPrompter;

impl StdinPrompter {
    fn read_answer(&self) -> Result<String> {
        let mut input = String::new();
        let read = io::stdin()
            .lock()
            .read_line(&mut input)
            .context("reading answer from stdin")?;
        if read == 0 {
            return Err(anyhow!("no answer provided on stdin"));
        }
        Ok(input.trim().to_string())
    }
}

impl Prompter for StdinPrompter {
    fn confirm(&mut self, question: &str) -> Result<bool> {
        let mut err = io::stderr();
        write!(err, "{question} [y/N]: ")?;
        err.flush()?;
        Ok(is_yes(&self.read_answer()?))
    }

    fn choose(&mut self, question: &str, options: &[String]) -> Result<usize> {
        let mut err = io::stderr();
        writeln!(err, "{question}")?;
        for (idx, option) in options.iter().enumerate() {
            writeln!(err, "  {}) {option}", idx + 1)?;
        }
        write!(err, "Enter a number [1-{}]: ", options.len())?;
        err.flush()?;
        parse_choice(&self.read_answer()?, options.len())
    }
}

fn is_yes(answer: &str) -> bool {
    answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes")
}

fn parse_choice(answer: &str, len: usize) -> Result<usize> {
    match answer.parse::<usize>() {
        Ok(n) if (1..=len).contains(&n) => Ok(n - 1),
        _ => Err(anyhow!("invalid selection `{answer}`; expected 1-{len}")),
    }
}

/// Replays canned answers; records the questions it was asked.
#[cfg(test)]
#[derive(Default)]
pub struct ScriptedPrompter {
    pub confirms: std::collections::VecDeque<bool>,
    pub choices: std::collections::VecDeque<usize>,
    pub asked: Vec<String>,
}

#[cfg(test)]
impl ScriptedPrompter {
    pub fn confirming(answer: bool) -> Self {
        Self {
            confirms: [answer].into(),
            ..Self::default()
        }
    }

    pub fn choosing(index: usize) -> Self {
        Self {
            choices: [index].into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
impl Prompter for ScriptedPrompter {
    fn confirm(&mut self, question: &str) -> Result<bool> {
        self.asked.push(question.to_string());
        self.confirms
            .pop_front()
            .ok_or_else(|| anyhow!("unexpected confirm: {question}"))
    }

    fn choose(&mut self, question: &str, options: &[String]) -> Result<usize> {
        self.asked.push(format!("{question} {options:?}"));
        self.choices
            .pop_front()
            .ok_or_else(|| anyhow!("unexpected choice: {question}"))
    }
}
