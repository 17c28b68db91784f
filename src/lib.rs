pub mod completion;
pub mod config;
pub mod logging;
pub mod model;
pub mod model_picker;
pub mod prompt;
pub mod providers;
pub mod repl;
pub mod session;

use anyhow::Result;
use std::io::{self, IsTerminal};
use tracing::info;

use completion::CompletionClient;
use config::Config;
use model_picker::{ModelInput, SelectionMode, TerminalKeys};
use prompt::Prompter;
use repl::{TracingTranscript, run_repl};
use session::collect_session;

pub async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    logging::init();

    let cfg = Config::from_env();
    info!(
        api_base_url = %cfg.api_base_url,
        default_max_tokens = cfg.default_max_tokens,
        model_select = cfg.model_select.as_str(),
        question_role = cfg.question_role.as_str(),
        "loaded runtime configuration"
    );

    let stdin = io::stdin();
    let selection = SelectionMode::resolve(cfg.model_select, stdin.is_terminal());
    let mut keys = TerminalKeys;
    let model_input = match selection {
        SelectionMode::Keypress => ModelInput::Keypress(&mut keys),
        SelectionMode::Line => ModelInput::Line,
    };

    let mut prompter = Prompter::new(stdin.lock(), io::stdout(), cfg.prompt_retry_limit);
    let session = collect_session(&mut prompter, &cfg, model_input)?;
    info!(
        model = session.model(),
        max_tokens = session.max_tokens(),
        proxy = session.proxy_url().unwrap_or("none"),
        "session configured"
    );

    let client = CompletionClient::connect(&session, &cfg)?;
    let mut transcript = TracingTranscript;
    run_repl(&mut prompter, &client, &mut transcript).await
}
