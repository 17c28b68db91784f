use anyhow::{Context, Result, bail};
use std::io::{self, BufRead, Write};

use crate::model_picker::{ModelInput, index_for_key, index_for_line};

const API_KEY_PROMPT: &str = "Please enter your API key: ";
const PROXY_PROMPT: &str =
    "Please enter an HTTP proxy (e.g. http://127.0.0.1:1081), or press Enter for none: ";
const MODEL_NUMBER_PROMPT: &str = "Enter the model number: ";
const INVALID_MODEL_MESSAGE: &str = "Invalid input, please enter a valid model number.";
const QUESTION_PROMPT: &str = "\r\nPlease enter your question: ";

/// Line-oriented terminal prompts over any reader/writer pair.
///
/// Prompts and the model list go to `output`. Validation messages go to
/// `notices`, stderr unless a caller supplies another writer. Prompts that
/// validate their answer re-ask at most `retry_limit` times before giving up
/// with an error.
pub struct Prompter<R, W, E = io::Stderr> {
    input: R,
    output: W,
    notices: E,
    retry_limit: u32,
}

impl<R, W> Prompter<R, W>
where
    R: BufRead,
    W: Write,
{
    pub fn new(input: R, output: W, retry_limit: u32) -> Self {
        Self::with_notices(input, output, io::stderr(), retry_limit)
    }
}

impl<R, W, E> Prompter<R, W, E>
where
    R: BufRead,
    W: Write,
    E: Write,
{
    pub fn with_notices(input: R, output: W, notices: E, retry_limit: u32) -> Self {
        Self {
            input,
            output,
            notices,
            retry_limit: retry_limit.max(1),
        }
    }

    pub fn output(&mut self) -> &mut W {
        &mut self.output
    }

    #[cfg(test)]
    pub(crate) fn into_output(self) -> W {
        self.output
    }

    #[cfg(test)]
    pub(crate) fn into_parts(self) -> (W, E) {
        (self.output, self.notices)
    }

    /// Prints `prompt` and returns the next raw line, line ending included.
    /// End of input is an error.
    pub fn read_line(&mut self, prompt: &str) -> Result<String> {
        write!(self.output, "{prompt}").context("Failed to write prompt")?;
        self.output.flush().context("Failed to flush stdout")?;

        let mut line = String::new();
        let read = self
            .input
            .read_line(&mut line)
            .context("Failed to read stdin")?;
        if read == 0 {
            bail!("stdin closed before input was provided");
        }
        Ok(line)
    }

    fn ask_until_valid<T>(
        &mut self,
        prompt: &str,
        what: &str,
        mut parse: impl FnMut(&str) -> std::result::Result<T, String>,
    ) -> Result<T> {
        for _ in 0..self.retry_limit {
            let line = self.read_line(prompt)?;
            match parse(line.trim()) {
                Ok(value) => return Ok(value),
                Err(message) => {
                    writeln!(self.notices, "{message}").context("Failed to write stderr")?;
                    self.notices.flush().context("Failed to flush stderr")?;
                }
            }
        }
        bail!(
            "no valid {} after {} attempt(s)",
            what,
            self.retry_limit
        )
    }

    pub fn api_key(&mut self) -> Result<String> {
        self.ask_until_valid(API_KEY_PROMPT, "API key", |value| {
            if value.is_empty() {
                Err("API key must not be empty".to_string())
            } else {
                Ok(value.to_string())
            }
        })
    }

    /// An empty answer means a direct connection. The address is validated
    /// later, when the HTTP client is built.
    pub fn proxy(&mut self) -> Result<Option<String>> {
        let line = self.read_line(PROXY_PROMPT)?;
        let proxy = line.trim();
        Ok((!proxy.is_empty()).then(|| proxy.to_string()))
    }

    pub fn max_tokens(&mut self, default: u32) -> Result<u32> {
        let prompt = format!(
            "Please enter max tokens (Enter for the default {default}, at most 600 is recommended): "
        );
        self.ask_until_valid(&prompt, "max tokens", |value| {
            if value.is_empty() {
                return Ok(default);
            }
            match value.parse::<u32>() {
                Ok(0) => Err("max tokens must be at least 1".to_string()),
                Ok(tokens) => Ok(tokens),
                Err(err) => Err(format!("max tokens must be a number: {err}")),
            }
        })
    }

    pub fn choose_model(
        &mut self,
        models: &[&'static str],
        input: ModelInput<'_>,
    ) -> Result<&'static str> {
        if models.is_empty() {
            bail!("no models available");
        }

        writeln!(self.output, "Please choose a model:").context("Failed to write models")?;
        for (idx, model) in models.iter().enumerate() {
            writeln!(self.output, "{}. {}", idx + 1, model).context("Failed to write models")?;
        }

        let index = match input {
            ModelInput::Keypress(keys) => {
                write!(self.output, "{MODEL_NUMBER_PROMPT}").context("Failed to write prompt")?;
                self.output.flush().context("Failed to flush stdout")?;
                loop {
                    let key = keys.read_key().context("Failed to read keyboard input")?;
                    if let Some(index) = key.and_then(|c| index_for_key(c, models.len())) {
                        write!(self.output, "\r\n").context("Failed to write newline")?;
                        break index;
                    }
                    write!(
                        self.output,
                        "\r\nInvalid input, please enter a valid model number: "
                    )
                    .context("Failed to write prompt")?;
                    self.output.flush().context("Failed to flush stdout")?;
                }
            }
            ModelInput::Line => {
                let count = models.len();
                self.ask_until_valid(MODEL_NUMBER_PROMPT, "model number", |value| {
                    index_for_line(value, count).ok_or_else(|| INVALID_MODEL_MESSAGE.to_string())
                })?
            }
        };

        let chosen = models[index];
        writeln!(self.output, "Selected model: {chosen}").context("Failed to write model")?;
        Ok(chosen)
    }

    pub fn read_question(&mut self) -> Result<String> {
        self.read_line(QUESTION_PROMPT)
    }
}

#[cfg(test)]
mod tests {
    use anyhow::{Result, bail};
    use std::collections::VecDeque;
    use std::io::Cursor;

    use super::Prompter;
    use crate::model_picker::{KeySource, ModelInput};

    const MODELS: &[&str] = &["model-a", "model-b", "model-c"];

    fn prompter(input: &str) -> Prompter<Cursor<String>, Vec<u8>> {
        Prompter::new(Cursor::new(input.to_string()), Vec::new(), 3)
    }

    fn output_of(prompter: Prompter<Cursor<String>, Vec<u8>>) -> String {
        String::from_utf8(prompter.into_output()).expect("output should be utf-8")
    }

    fn captured(input: &str) -> Prompter<Cursor<String>, Vec<u8>, Vec<u8>> {
        Prompter::with_notices(Cursor::new(input.to_string()), Vec::new(), Vec::new(), 3)
    }

    fn streams_of(prompter: Prompter<Cursor<String>, Vec<u8>, Vec<u8>>) -> (String, String) {
        let (out, notices) = prompter.into_parts();
        (
            String::from_utf8(out).expect("output should be utf-8"),
            String::from_utf8(notices).expect("notices should be utf-8"),
        )
    }

    struct ScriptedKeys(VecDeque<Option<char>>);

    impl KeySource for ScriptedKeys {
        fn read_key(&mut self) -> Result<Option<char>> {
            match self.0.pop_front() {
                Some(key) => Ok(key),
                None => bail!("no more keys"),
            }
        }
    }

    #[test]
    fn api_key_is_trimmed() {
        let mut p = prompter("  sk-test \n");
        assert_eq!(p.api_key().expect("key expected"), "sk-test");
    }

    #[test]
    fn api_key_reprompts_on_empty_input() {
        let mut p = captured("\n   \nsk-test\n");
        assert_eq!(p.api_key().expect("key expected"), "sk-test");
        let (out, notices) = streams_of(p);
        assert_eq!(out.matches("Please enter your API key: ").count(), 3);
        assert!(!out.contains("must not be empty"), "{out}");
        assert_eq!(notices, "API key must not be empty\nAPI key must not be empty\n");
    }

    #[test]
    fn api_key_gives_up_after_retry_limit() {
        let mut p = prompter("\n\n\nsk-too-late\n");
        let err = p.api_key().expect_err("should give up");
        assert!(err.to_string().contains("after 3 attempt(s)"), "{err}");
    }

    #[test]
    fn api_key_fails_on_closed_stdin() {
        let mut p = prompter("");
        let err = p.api_key().expect_err("should fail");
        assert!(err.to_string().contains("stdin closed"), "{err}");
    }

    #[test]
    fn proxy_is_optional_and_unvalidated() {
        let mut p = prompter("\n not a url \n");
        assert_eq!(p.proxy().expect("proxy expected"), None);
        assert_eq!(
            p.proxy().expect("proxy expected"),
            Some("not a url".to_string())
        );
    }

    #[test]
    fn max_tokens_uses_default_for_empty_input() {
        let mut p = prompter("\n");
        assert_eq!(p.max_tokens(100).expect("tokens expected"), 100);
    }

    #[test]
    fn max_tokens_reprompts_on_invalid_input() {
        let mut p = captured("lots\n0\n250\n");
        assert_eq!(p.max_tokens(100).expect("tokens expected"), 250);
        let (out, notices) = streams_of(p);
        assert!(!out.contains("max tokens must"), "{out}");
        assert!(notices.contains("max tokens must be a number"), "{notices}");
        assert!(notices.contains("max tokens must be at least 1"), "{notices}");
    }

    #[test]
    fn max_tokens_gives_up_after_retry_limit() {
        let mut p = prompter("a\nb\nc\n");
        assert!(p.max_tokens(100).is_err());
    }

    #[test]
    fn choose_model_lists_catalog_and_reads_line() {
        let mut p = captured("9\n2\n");
        let chosen = p
            .choose_model(MODELS, ModelInput::Line)
            .expect("model expected");
        assert_eq!(chosen, "model-b");

        let (out, notices) = streams_of(p);
        assert!(out.contains("1. model-a\n2. model-b\n3. model-c\n"), "{out}");
        assert!(!out.contains("Invalid input"), "{out}");
        assert_eq!(notices, "Invalid input, please enter a valid model number.\n");
        assert!(out.contains("Selected model: model-b"), "{out}");
    }

    #[test]
    fn choose_model_skips_invalid_keypresses() {
        let mut keys = ScriptedKeys(VecDeque::from([Some('x'), None, Some('0'), Some('4'), Some('3')]));
        let mut p = prompter("");
        let chosen = p
            .choose_model(MODELS, ModelInput::Keypress(&mut keys))
            .expect("model expected");
        assert_eq!(chosen, "model-c");

        let out = output_of(p);
        assert_eq!(out.matches("Invalid input").count(), 4, "{out}");
    }

    #[test]
    fn choose_model_propagates_key_read_failure() {
        let mut keys = ScriptedKeys(VecDeque::new());
        let mut p = prompter("");
        assert!(p.choose_model(MODELS, ModelInput::Keypress(&mut keys)).is_err());
    }

    #[test]
    fn choose_model_rejects_empty_catalog() {
        let mut p = prompter("1\n");
        let err = p
            .choose_model(&[], ModelInput::Line)
            .expect_err("should fail");
        assert!(err.to_string().contains("no models available"));
    }

    #[test]
    fn read_question_returns_raw_line() {
        let mut p = prompter("  Hello \n");
        assert_eq!(p.read_question().expect("line expected"), "  Hello \n");
        let out = output_of(p);
        assert_eq!(out, "\r\nPlease enter your question: ");
    }
}
