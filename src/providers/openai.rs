use anyhow::{Context, Result};
use reqwest::{Client, Proxy};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::model::{ChatRequest, ChatResponse, Message};
use crate::providers::http_errors::{chat_api_request_error, chat_api_status_error};

#[derive(Debug, Serialize)]
struct OpenAiChatRequest {
    model: String,
    max_tokens: u32,
    stream: bool,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiChatResponse {
    #[serde(default)]
    choices: Vec<ChoiceResponse>,
}

#[derive(Debug, Deserialize)]
struct ChoiceResponse {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

fn chat_url(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

fn to_openai_messages(messages: &[Message]) -> Vec<ChatMessage> {
    messages
        .iter()
        .map(|msg| ChatMessage {
            role: msg.role.as_str().to_string(),
            content: msg.content.clone(),
        })
        .collect()
}

const SUPPORTED_PROXY_SCHEMES: &[&str] = &["http", "https"];

/// Addresses without a scheme are taken as `http://`.
fn check_proxy_scheme(raw: &str) -> Result<(), String> {
    match raw.split_once("://") {
        Some((scheme, _))
            if !SUPPORTED_PROXY_SCHEMES
                .iter()
                .any(|supported| scheme.eq_ignore_ascii_case(supported)) =>
        {
            Err(format!(
                "unsupported proxy scheme '{scheme}', expected http or https"
            ))
        }
        _ => Ok(()),
    }
}

/// Parses a user-supplied HTTP proxy address. Failures are logged and yield
/// `None` so the caller can continue with a direct connection.
pub fn parse_proxy(raw: &str) -> Option<Proxy> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let parsed = check_proxy_scheme(raw)
        .and_then(|()| Proxy::all(raw).map_err(|err| err.to_string()));
    match parsed {
        Ok(proxy) => Some(proxy),
        Err(err) => {
            warn!(
                proxy_url = %raw,
                error = %err,
                "failed to parse proxy address, using direct connection"
            );
            None
        }
    }
}

pub fn build_http_client(proxy_url: Option<&str>, timeout_secs: Option<u64>) -> Result<Client> {
    let mut builder = Client::builder();
    if let Some(proxy) = proxy_url.and_then(parse_proxy) {
        builder = builder.proxy(proxy);
    }
    if let Some(secs) = timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    builder.build().context("Failed to initialize HTTP client")
}

pub struct OpenAiBackend {
    client: Client,
    api_key: String,
    api_url: String,
    timeout_secs: Option<u64>,
}

impl OpenAiBackend {
    pub fn new(
        client: Client,
        api_key: impl Into<String>,
        base_url: &str,
        timeout_secs: Option<u64>,
    ) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            api_url: chat_url(base_url),
            timeout_secs,
        }
    }

    pub async fn create_chat_completion(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let body = OpenAiChatRequest {
            model: request.model.clone(),
            max_tokens: request.max_tokens,
            stream: false,
            messages: to_openai_messages(&request.messages),
        };
        debug!(
            api_url = %self.api_url,
            model = %request.model,
            max_tokens = request.max_tokens,
            "sending chat completion request"
        );

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                warn!(
                    api_url = %self.api_url,
                    model = %request.model,
                    error = %err,
                    "chat completion request failed"
                );
                chat_api_request_error(err, &self.api_url, self.timeout_secs)
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let response_body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read response body>".to_string());
            warn!(
                api_url = %self.api_url,
                model = %request.model,
                status = %status,
                response_body_len = response_body.len(),
                "chat API returned non-success status"
            );
            return Err(chat_api_status_error(status, &response_body));
        }

        let parsed: OpenAiChatResponse = response
            .json()
            .await
            .context("Failed to parse chat completion response")?;
        debug!(
            model = %request.model,
            choice_count = parsed.choices.len(),
            "received chat completion response"
        );

        Ok(ChatResponse {
            choices: parsed
                .choices
                .into_iter()
                .map(|choice| choice.message.content.unwrap_or_default())
                .collect(),
        })
    }
}
