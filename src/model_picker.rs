use anyhow::{Context, Result, bail};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};

use crate::config::ModelSelect;

const MODELS: &[&str] = &[
    "gpt-3.5-turbo-0301",
    "gpt-3.5-turbo",
    "gpt-4-32k-0314",
    "gpt-4-32k",
    "gpt-4-0314",
    "gpt-4",
    "text-davinci-003",
    "text-davinci-002",
    "text-curie-001",
];

/// The fixed model catalog, in menu order.
pub fn models() -> &'static [&'static str] {
    MODELS
}

pub trait KeySource {
    /// Blocks for one keypress. `None` means a key without a character.
    fn read_key(&mut self) -> Result<Option<char>>;
}

/// How the model menu reads the user's choice.
pub enum ModelInput<'k> {
    Keypress(&'k mut dyn KeySource),
    Line,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    Keypress,
    Line,
}

impl SelectionMode {
    /// Single keypresses need a terminal; piped stdin falls back to lines.
    pub fn resolve(preference: ModelSelect, stdin_is_terminal: bool) -> Self {
        match preference {
            ModelSelect::Keypress => Self::Keypress,
            ModelSelect::Line => Self::Line,
            ModelSelect::Auto if stdin_is_terminal => Self::Keypress,
            ModelSelect::Auto => Self::Line,
        }
    }
}

/// Maps a digit key to a zero-based index; only `1`..`9` can select.
pub fn index_for_key(key: char, count: usize) -> Option<usize> {
    let digit = key.to_digit(10)? as usize;
    (1..=count).contains(&digit).then(|| digit - 1)
}

pub fn index_for_line(line: &str, count: usize) -> Option<usize> {
    let number = line.trim().parse::<usize>().ok()?;
    (1..=count).contains(&number).then(|| number - 1)
}

struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> Result<Self> {
        enable_raw_mode().context("Failed to switch terminal to raw mode")?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

/// Reads keypresses straight from the terminal in raw mode.
#[derive(Debug, Default)]
pub struct TerminalKeys;

impl KeySource for TerminalKeys {
    fn read_key(&mut self) -> Result<Option<char>> {
        let _raw = RawModeGuard::enable()?;
        loop {
            let Event::Key(key) = event::read().context("Failed to read terminal event")? else {
                continue;
            };
            if key.kind != KeyEventKind::Press {
                continue;
            }

            return match key.code {
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    bail!("model selection cancelled")
                }
                KeyCode::Char(c) => Ok(Some(c)),
                _ => Ok(None),
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{SelectionMode, index_for_key, index_for_line, models};
    use crate::config::ModelSelect;

    #[test]
    fn catalog_is_fixed_and_ordered() {
        let models = models();
        assert_eq!(models.len(), 9);
        assert_eq!(models[0], "gpt-3.5-turbo-0301");
        assert_eq!(models[1], "gpt-3.5-turbo");
        assert_eq!(models[8], "text-curie-001");
    }

    #[test]
    fn index_for_key_maps_one_based_digits() {
        assert_eq!(index_for_key('1', 9), Some(0));
        assert_eq!(index_for_key('9', 9), Some(8));
        assert_eq!(index_for_key('0', 9), None);
        assert_eq!(index_for_key('4', 3), None);
        assert_eq!(index_for_key('q', 9), None);
    }

    #[test]
    fn index_for_line_accepts_trimmed_numbers() {
        assert_eq!(index_for_line(" 2 ", 9), Some(1));
        assert_eq!(index_for_line("10", 9), None);
        assert_eq!(index_for_line("0", 9), None);
        assert_eq!(index_for_line("-1", 9), None);
        assert_eq!(index_for_line("two", 9), None);
    }

    #[test]
    fn selection_mode_follows_terminal_capability_in_auto() {
        assert_eq!(
            SelectionMode::resolve(ModelSelect::Auto, true),
            SelectionMode::Keypress
        );
        assert_eq!(
            SelectionMode::resolve(ModelSelect::Auto, false),
            SelectionMode::Line
        );
    }

    #[test]
    fn selection_mode_respects_explicit_preference() {
        assert_eq!(
            SelectionMode::resolve(ModelSelect::Line, true),
            SelectionMode::Line
        );
        assert_eq!(
            SelectionMode::resolve(ModelSelect::Keypress, false),
            SelectionMode::Keypress
        );
    }
}
