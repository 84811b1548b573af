//! Authenticated JSON POSTs and TraceParent extraction from the replies.
//!
//! Every call sends `Authorization: Bearer <token>` and a JSON body. The reply
//! is reduced to a single string: the `TraceParent` field when the body is a
//! JSON object carrying one, otherwise the body text unchanged.
use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::time::Instant;

/// Response field holding the correlation id.
pub(crate) const TRACE_PARENT_FIELD: &str = "TraceParent";

/// Telemetry payload accepted by the custom API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct TelemetryEvent {
    pub(crate) source: String,
    pub(crate) stage: String,
    pub(crate) level: String,
    pub(crate) message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) trace_parent: Option<String>,
}

impl TelemetryEvent {
    pub(crate) fn new(source: &str, stage: &str, level: &str, message: &str) -> Self {
        Self {
            source: source.to_string(),
            stage: stage.to_string(),
            level: level.to_string(),
            message: message.to_string(),
            trace_parent: None,
        }
    }

    pub(crate) fn with_trace_parent(mut self, trace_parent: impl Into<String>) -> Self {
        self.trace_parent = Some(trace_parent.into());
        self
    }
}

/// Body for creating a record in an entity set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct EntityRecord {
    pub(crate) name: String,
    pub(crate) description: String,
}

/// Transport for a single JSON POST; returns the raw response text.
///
/// `tag` is sent as the `tag` query parameter when present.
pub(crate) trait Poster {
    fn send(&self, url: &str, tag: Option<&str>, body: &str) -> Result<String>;
}

/// Serialize `body`, POST it, and reduce the reply to a TraceParent or raw text.
pub(crate) fn post_data<P, B>(
    poster: &P,
    url: &str,
    tag: Option<&str>,
    body: &B,
) -> Result<String>
where
    P: Poster + ?Sized,
    B: Serialize,
{
    let payload = serde_json::to_string(body).context("serialize request body")?;
    let response = poster.send(url, tag, &payload)?;
    Ok(interpret_response(response))
}

/// `TraceParent` from the reply if present, otherwise the reply itself.
pub(crate) fn interpret_response(body: String) -> String {
    extract_trace_parent(&body).unwrap_or(body)
}

/// Pull `TraceParent` out of a JSON object reply.
///
/// Only bodies whose first character is `{` are parsed. A parse failure or a
/// missing field is not an error; the caller falls back to the raw text.
pub(crate) fn extract_trace_parent(body: &str) -> Option<String> {
    if !body.starts_with('{') {
        return None;
    }
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get(TRACE_PARENT_FIELD)? {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// [`Poster`] over a blocking ureq agent.
pub(crate) struct HttpPoster {
    agent: ureq::Agent,
    token: String,
}

impl HttpPoster {
    /// Agent that keeps no idle connections, so each call closes its socket.
    pub(crate) fn new(token: impl Into<String>) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .max_idle_connections(0)
            .build()
            .into();
        Self::with_agent(agent, token)
    }

    pub(crate) fn with_agent(agent: ureq::Agent, token: impl Into<String>) -> Self {
        Self {
            agent,
            token: token.into(),
        }
    }
}

impl Poster for HttpPoster {
    fn send(&self, url: &str, tag: Option<&str>, body: &str) -> Result<String> {
        let mut request = self
            .agent
            .post(url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Content-Type", "application/json");
        if let Some(tag) = tag {
            request = request.query("tag", tag);
        }

        let start = Instant::now();
        let mut response = request
            .send(body.as_bytes())
            .with_context(|| format!("POST {url}"))?;
        let status = response.status().as_u16();
        let text = response
            .body_mut()
            .read_to_string()
            .with_context(|| format!("read response from {url}"))?;
        let elapsed_ms = start.elapsed().as_millis();

        tracing::info!(
            elapsed_ms,
            status,
            request_bytes = body.len(),
            response_bytes = text.len(),
            tagged = tag.is_some(),
            "post complete"
        );
        Ok(text)
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
