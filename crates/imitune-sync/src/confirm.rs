//! Operator confirmation.
//!
//! Pipelines decide *when* a destructive step needs approval; a [`Confirm`]
//! implementation decides *how* the answer is obtained.

use std::io::{self, BufRead, Write};
use std::sync::Mutex;

/// Asks the operator a yes/no question.
pub trait Confirm: Send + Sync {
    /// Returns `true` only for an explicit affirmative answer.
    fn confirm(&self, prompt: &str) -> bool;
}

/// Returns `true` when `answer` is an explicit "yes".
#[must_use]
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Prompts on stdout and reads one line from stdin.
///
/// Anything but `y`/`yes`, including EOF or a read error, declines.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalConfirm;

impl Confirm for TerminalConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        print!("{prompt} [y/N]: ");
        if io::stdout().flush().is_err() {
            return false;
        }

        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(0) | Err(_) => false,
            Ok(_) => is_affirmative(&answer),
        }
    }
}

/// Answers every prompt with a fixed response, for `--yes` style flags.
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub bool);

impl Confirm for FixedAnswer {
    fn confirm(&self, prompt: &str) -> bool {
        log::info!("{prompt} -> {}", if self.0 { "yes" } else { "no" });
        self.0
    }
}

/// Replays scripted answers and keeps every prompt it was shown.
///
/// Once the script runs out it declines.
#[derive(Debug, Default)]
pub struct ScriptedConfirm {
    answers: Mutex<Vec<bool>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedConfirm {
    #[must_use]
    pub fn new(answers: impl IntoIterator<Item = bool>) -> Self {
        let mut answers: Vec<bool> = answers.into_iter().collect();
        answers.reverse();
        Self {
            answers: Mutex::new(answers),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Prompts shown so far, oldest first.
    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }
}

impl Confirm for ScriptedConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        self.answers
            .lock()
            .ok()
            .and_then(|mut a| a.pop())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_affirmative_answers() {
        for yes in ["y", "Y", "yes", " YES \n", "y\n"] {
            assert!(is_affirmative(yes), "{yes:?}");
        }
        for no in ["", "n", "no", "yep", "sure", "\n"] {
            assert!(!is_affirmative(no), "{no:?}");
        }
    }

    #[test]
    fn test_scripted_answers_in_order_then_decline() {
        let confirm = ScriptedConfirm::new([true, false]);
        assert!(confirm.confirm("first"));
        assert!(!confirm.confirm("second"));
        assert!(!confirm.confirm("third"));
        assert_eq!(confirm.prompts(), ["first", "second", "third"]);
    }

    #[test]
    fn test_fixed_answer() {
        assert!(FixedAnswer(true).confirm("delete?"));
        assert!(!FixedAnswer(false).confirm("delete?"));
    }
}
