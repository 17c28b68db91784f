use std::env;

use crate::model::MessageRole;

const DEFAULT_API_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MAX_TOKENS: u32 = 100;
const DEFAULT_PROMPT_RETRY_LIMIT: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelSelect {
    Auto,
    Keypress,
    Line,
}

impl ModelSelect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Keypress => "keypress",
            Self::Line => "line",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: String,
    pub default_max_tokens: u32,
    pub prompt_retry_limit: u32,
    pub model_timeout_secs: Option<u64>,
    pub model_select: ModelSelect,
    pub question_role: MessageRole,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env_with(|_| None)
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_env_with(|key| env::var(key).ok())
    }

    fn from_env_with(mut get_var: impl FnMut(&str) -> Option<String>) -> Self {
        let api_base_url = get_var("OPENAI_BASE_URL")
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());

        Self {
            api_base_url,
            default_max_tokens: parse_default_max_tokens(get_var("DEFAULT_MAX_TOKENS").as_deref()),
            prompt_retry_limit: parse_prompt_retry_limit(get_var("PROMPT_RETRY_LIMIT").as_deref()),
            model_timeout_secs: parse_optional_positive_u64(
                get_var("MODEL_TIMEOUT_SECS").as_deref(),
            ),
            model_select: parse_model_select(get_var("MODEL_SELECT").as_deref()),
            question_role: parse_question_role(get_var("QUESTION_ROLE").as_deref()),
        }
    }
}

fn parse_optional_positive_u64(raw: Option<&str>) -> Option<u64> {
    raw.and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
}

fn parse_positive_u32(raw: Option<&str>, default: u32) -> u32 {
    raw.and_then(|value| value.trim().parse::<u32>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

fn parse_default_max_tokens(raw: Option<&str>) -> u32 {
    parse_positive_u32(raw, DEFAULT_MAX_TOKENS)
}

fn parse_prompt_retry_limit(raw: Option<&str>) -> u32 {
    parse_positive_u32(raw, DEFAULT_PROMPT_RETRY_LIMIT)
}

fn parse_model_select(raw: Option<&str>) -> ModelSelect {
    match raw.unwrap_or("auto").trim().to_ascii_lowercase().as_str() {
        "keypress" | "key" => ModelSelect::Keypress,
        "line" => ModelSelect::Line,
        _ => ModelSelect::Auto,
    }
}

// Questions go out as "assistant" unless explicitly switched.
fn parse_question_role(raw: Option<&str>) -> MessageRole {
    match raw
        .unwrap_or("assistant")
        .trim()
        .to_ascii_lowercase()
        .as_str()
    {
        "user" => MessageRole::User,
        _ => MessageRole::Assistant,
    }
}
