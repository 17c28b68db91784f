use anyhow::Result;
use std::error::Error;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use tracing::debug;

use crate::config::Config;
use crate::model::{ChatRequest, ChatResponse, Message, MessageRole};
use crate::providers::openai::{OpenAiBackend, build_http_client};
use crate::session::SessionConfig;

pub type ChatFuture<'a> = Pin<Box<dyn Future<Output = Result<ChatResponse>> + 'a>>;

pub trait ChatBackend {
    fn chat<'a>(&'a self, request: &'a ChatRequest) -> ChatFuture<'a>;
}

impl ChatBackend for OpenAiBackend {
    fn chat<'a>(&'a self, request: &'a ChatRequest) -> ChatFuture<'a> {
        Box::pin(async move { self.create_chat_completion(request).await })
    }
}

#[derive(Debug)]
pub enum CompletionError {
    Request(anyhow::Error),
    EmptyResponse,
}

impl fmt::Display for CompletionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request(err) => write!(f, "chatGpt returned an error: {err:#}"),
            Self::EmptyResponse => write!(f, "chatGpt server returned nothing"),
        }
    }
}

impl Error for CompletionError {}

/// Keeps the first `max_tokens` characters of `question`.
///
/// This counts characters, not model tokens.
pub fn truncate_question(question: &str, max_tokens: usize) -> String {
    match question.char_indices().nth(max_tokens) {
        Some((cut, _)) => question[..cut].to_string(),
        None => question.to_string(),
    }
}

pub struct CompletionClient<B = OpenAiBackend> {
    backend: B,
    model: String,
    max_tokens: u32,
    role: MessageRole,
}

impl CompletionClient<OpenAiBackend> {
    pub fn connect(session: &SessionConfig, cfg: &Config) -> Result<Self> {
        let http = build_http_client(session.proxy_url(), cfg.model_timeout_secs)?;
        let backend = OpenAiBackend::new(
            http,
            session.api_key(),
            &cfg.api_base_url,
            cfg.model_timeout_secs,
        );
        Ok(Self::with_backend(session, cfg.question_role, backend))
    }
}

impl<B> CompletionClient<B> {
    pub fn with_backend(session: &SessionConfig, role: MessageRole, backend: B) -> Self {
        Self {
            backend,
            model: session.model().to_string(),
            max_tokens: session.max_tokens(),
            role,
        }
    }

    pub fn build_request(&self, question: &str) -> ChatRequest {
        let content = truncate_question(question, self.max_tokens as usize);
        ChatRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages: vec![Message::new(self.role, content)],
        }
    }
}

impl<B> CompletionClient<B>
where
    B: ChatBackend,
{
    pub async fn get_answer(&self, question: &str) -> Result<String, CompletionError> {
        let request = self.build_request(question);
        debug!(
            model = %request.model,
            question_chars = question.chars().count(),
            "requesting answer"
        );

        let response = self
            .backend
            .chat(&request)
            .await
            .map_err(CompletionError::Request)?;

        response
            .choices
            .first()
            .map(|content| content.trim().to_string())
            .ok_or(CompletionError::EmptyResponse)
    }
}
