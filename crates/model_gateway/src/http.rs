//! Shared HTTP plumbing for provider adapters.

use reqwest::RequestBuilder;
use serde_json::Value;

use workbench_core::{Error, Result};

const MAX_UPSTREAM_MESSAGE: usize = 1024;

/// Send a JSON request and decode a JSON response.
///
/// Transport failures and non-2xx statuses become `Error::Provider`. URLs are
/// stripped from transport errors since some carry credentials.
pub(crate) async fn send_json(request: RequestBuilder, provider: &str) -> Result<Value> {
    let response = request
        .send()
        .await
        .map_err(|e| Error::provider(format!("{} request failed: {}", provider, e.without_url())))?;

    let status = response.status();
    if !status.is_success() {
        let body = match response.text().await {
            Ok(text) => text,
            Err(e) => format!("unable to read error body: {}", e.without_url()),
        };
        let message = extract_error_message(&body).unwrap_or_else(|| status.to_string());
        tracing::warn!(provider, status = status.as_u16(), "Upstream provider error");
        return Err(Error::provider(format!("{}: {}", provider, message)));
    }

    response
        .json::<Value>()
        .await
        .map_err(|e| Error::provider(format!("{} returned an unreadable response: {}", provider, e.without_url())))
}

/// Pull `error.message` or a string `error` out of an upstream error body.
fn extract_error_message(body: &str) -> Option<String> {
    let message = match serde_json::from_str::<Value>(body) {
        Ok(parsed) => match parsed.get("error") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Object(obj)) => obj.get("message")?.as_str()?.to_string(),
            _ => parsed.get("message")?.as_str()?.to_string(),
        },
        Err(_) => body.trim().to_string(),
    };

    if message.trim().is_empty() {
        return None;
    }

    let mut end = message.len().min(MAX_UPSTREAM_MESSAGE);
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    Some(message[..end].to_string())
}

/// Read a required string at `pointer` from a response body.
pub(crate) fn required_str(body: &Value, pointer: &str, provider: &str) -> Result<String> {
    body.pointer(pointer)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::provider(format!("{} response missing {}", provider, pointer)))
}
