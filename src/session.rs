use anyhow::{Result, bail};
use std::io::{BufRead, Write};

use crate::config::Config;
use crate::model_picker::{self, ModelInput};
use crate::prompt::Prompter;

/// Settings gathered once at start-up and fixed for the rest of the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    api_key: String,
    proxy_url: Option<String>,
    max_tokens: u32,
    model: &'static str,
}

impl SessionConfig {
    pub fn new(
        api_key: impl Into<String>,
        proxy_url: Option<String>,
        max_tokens: u32,
        model: &'static str,
    ) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            bail!("API key must not be empty");
        }
        if max_tokens == 0 {
            bail!("max tokens must be at least 1");
        }

        Ok(Self {
            api_key,
            proxy_url: proxy_url.filter(|url| !url.trim().is_empty()),
            max_tokens,
            model,
        })
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn proxy_url(&self) -> Option<&str> {
        self.proxy_url.as_deref()
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    pub fn model(&self) -> &'static str {
        self.model
    }
}

/// Asks for the key, proxy, token budget and model, in that order.
pub fn collect_session<R, W, E>(
    prompter: &mut Prompter<R, W, E>,
    cfg: &Config,
    model_input: ModelInput<'_>,
) -> Result<SessionConfig>
where
    R: BufRead,
    W: Write,
    E: Write,
{
    let api_key = prompter.api_key()?;
    let models = model_picker::models();
    let proxy_url = prompter.proxy()?;
    let max_tokens = prompter.max_tokens(cfg.default_max_tokens)?;
    let model = prompter.choose_model(models, model_input)?;

    SessionConfig::new(api_key, proxy_url, max_tokens, model)
}
