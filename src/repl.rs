use anyhow::{Context, Result};
use std::io::{BufRead, Write};
use tracing::{error, info};

use crate::completion::{ChatBackend, CompletionClient};
use crate::prompt::Prompter;

const EXIT_COMMAND: &str = "q";
const ANSWER_LABEL: &str = "ChatGpt: ";

/// Records each exchange of the session.
pub trait Transcript {
    fn question(&mut self, question: &str);
    fn answer(&mut self, answer: &str);
    fn failure(&mut self, message: &str);
}

/// Writes the transcript through the process-wide `tracing` subscriber.
#[derive(Debug, Default)]
pub struct TracingTranscript;

impl Transcript for TracingTranscript {
    fn question(&mut self, question: &str) {
        info!("{}", question);
    }

    fn answer(&mut self, answer: &str) {
        info!("{}{}", ANSWER_LABEL, answer);
    }

    fn failure(&mut self, message: &str) {
        error!("{}", message);
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Exit,
    Blank,
    Question(&'a str),
}

fn classify_input(line: &str) -> Input<'_> {
    let question = line.trim();
    if question == EXIT_COMMAND {
        Input::Exit
    } else if question.is_empty() {
        Input::Blank
    } else {
        Input::Question(question)
    }
}

pub async fn run_repl<R, W, E, B, T>(
    prompter: &mut Prompter<R, W, E>,
    client: &CompletionClient<B>,
    transcript: &mut T,
) -> Result<()>
where
    R: BufRead,
    W: Write,
    E: Write,
    B: ChatBackend,
    T: Transcript,
{
    loop {
        let line = prompter.read_question()?;
        let question = match classify_input(&line) {
            Input::Exit => {
                writeln!(prompter.output(), "Exiting").context("Failed to write stdout")?;
                return Ok(());
            }
            Input::Blank => continue,
            Input::Question(question) => question,
        };

        transcript.question(question);
        match client.get_answer(question).await {
            Ok(answer) => {
                write!(prompter.output(), "{ANSWER_LABEL}{answer}\r\n")
                    .context("Failed to write stdout")?;
                transcript.answer(&answer);
            }
            Err(err) => {
                let message = err.to_string();
                writeln!(prompter.output(), "{message}").context("Failed to write stdout")?;
                transcript.failure(&message);
            }
        }
        prompter.output().flush().context("Failed to flush stdout")?;
    }
}
