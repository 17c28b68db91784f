use anyhow::anyhow;
use serde::Deserialize;
use std::error::Error as StdError;
use std::io::ErrorKind;

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

fn error_chain_has_kind(
    err: &(dyn StdError + 'static),
    kind: ErrorKind,
    needle: &str,
) -> bool {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(source) = current {
        if let Some(io_err) = source.downcast_ref::<std::io::Error>()
            && io_err.kind() == kind
        {
            return true;
        }

        if source.to_string().to_ascii_lowercase().contains(needle) {
            return true;
        }

        current = source.source();
    }

    false
}

fn error_chain_has_connection_refused(err: &(dyn StdError + 'static)) -> bool {
    error_chain_has_kind(err, ErrorKind::ConnectionRefused, "connection refused")
}

fn error_chain_has_timeout(err: &(dyn StdError + 'static)) -> bool {
    error_chain_has_kind(err, ErrorKind::TimedOut, "timed out")
}

pub(crate) fn chat_api_request_error(
    err: reqwest::Error,
    api_url: &str,
    timeout_secs: Option<u64>,
) -> anyhow::Error {
    if err.is_timeout() || error_chain_has_timeout(&err) {
        return match timeout_secs {
            Some(secs) => anyhow!(
                "Chat request timed out after {}s while calling '{}'. \
                 Increase MODEL_TIMEOUT_SECS or check the API and proxy.",
                secs,
                api_url
            ),
            None => anyhow!("Chat request to '{}' timed out.", api_url),
        };
    }

    if err.is_connect() {
        if error_chain_has_connection_refused(&err) {
            return anyhow!(
                "Connection refused by chat API at '{}'. \
                 Check OPENAI_BASE_URL and the proxy address.",
                api_url
            );
        }

        return anyhow!(
            "Failed to connect to chat API at '{}'. \
             Check OPENAI_BASE_URL, the proxy address and network connectivity.",
            api_url
        );
    }

    anyhow!("Failed to call chat API at '{}': {}", api_url, err)
}

/// Prefers the API's own `error.message` over the raw body.
pub(crate) fn chat_api_status_error(status: reqwest::StatusCode, body: &str) -> anyhow::Error {
    let message = serde_json::from_str::<ApiErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| body.trim().to_string());
    anyhow!("Chat API request failed with status {}: {}", status, message)
}
