use anyhow::{Context, Result};
use dialoguer::{Select, theme::ColorfulTheme};

/// Picks one entry from a list of choices
pub trait Selector {
    /// Index of the chosen entry, or `None` when there is nothing to choose
    /// from or the prompt was dismissed
    fn select(&self, prompt: &str, choices: &[String]) -> Result<Option<usize>>;
}

/// Terminal selector built on dialoguer
#[derive(Default)]
pub struct TerminalSelector {
    theme: ColorfulTheme,
}

impl TerminalSelector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Selector for TerminalSelector {
    fn select(&self, prompt: &str, choices: &[String]) -> Result<Option<usize>> {
        if choices.is_empty() {
            return Ok(None);
        }

        Select::with_theme(&self.theme)
            .with_prompt(prompt)
            .items(choices)
            .default(0)
            .interact_opt()
            .context("Failed to read selection")
    }
}
