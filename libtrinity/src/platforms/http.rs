//! HTTP plumbing shared by the connectors

use reqwest::{Client, Response};
use serde_json::Value;
use std::time::Duration;

use crate::error::{ConfigError, PlatformError, Result};

const USER_AGENT: &str = concat!("trinity/", env!("CARGO_PKG_VERSION"));

/// Longest remote error body carried into an error message
const MAX_ERROR_BODY: usize = 300;

/// Build the client shared by every connector
pub fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| {
            ConfigError::InvalidValue {
                field: "http".to_string(),
                message: e.to_string(),
            }
            .into()
        })
}

pub fn network_error(err: reqwest::Error) -> PlatformError {
    if err.is_timeout() {
        PlatformError::Network(format!("request timed out: {}", err))
    } else {
        PlatformError::Network(err.to_string())
    }
}

/// Read a response body as JSON, mapping non-success statuses to `Remote`
pub async fn json_body(response: Response) -> std::result::Result<Value, PlatformError> {
    let status = response.status();
    let body = response.text().await.map_err(network_error)?;

    if !status.is_success() {
        return Err(PlatformError::Remote {
            status: status.as_u16(),
            message: remote_message(&body),
        });
    }

    serde_json::from_str(&body)
        .map_err(|e| PlatformError::MalformedResponse(format!("invalid JSON: {}", e)))
}

/// Pick the human-readable message out of a platform error body
///
/// Graph API uses `error.message`, Pinterest `message`, Twitter `detail` or
/// `errors[0].message`. Anything else is passed through, truncated.
pub fn remote_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        for pointer in ["/error/message", "/message", "/detail", "/errors/0/message"] {
            if let Some(message) = value.pointer(pointer).and_then(Value::as_str) {
                return message.to_string();
            }
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty response body".to_string();
    }
    if trimmed.len() <= MAX_ERROR_BODY {
        return trimmed.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &trimmed[..end])
}

/// Read an identifier that may be encoded as a string or a number
pub fn id_field(value: &Value, pointer: &str) -> std::result::Result<String, PlatformError> {
    match value.pointer(pointer) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(PlatformError::MalformedResponse(format!(
            "response has no '{}'",
            pointer.trim_start_matches('/').replace('/', ".")
        ))),
    }
}

/// Join a configured base URL and a path without doubling slashes
pub fn endpoint(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
