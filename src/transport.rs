//! Outbound exchange with the answering service.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderName, AUTHORIZATION};
use serde_json::{json, Value};

use crate::config::TransportConfig;
use crate::error::{ChatError, Result};

/// Successful reply from the answering service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportReply {
    pub text: String,
    /// Conversation id the server issued with this reply, if any.
    pub conversation_id: Option<String>,
}

/// One request/reply exchange. `conversation_id` is the id captured from the
/// previous reply and is echoed back to the server.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, query: &str, conversation_id: Option<&str>) -> Result<TransportReply>;
}

/// Reads the reply text out of a `{ message | results }` payload. `results`
/// is rendered as JSON when there is no `message`.
pub fn extract_reply_text(payload: &Value) -> Result<String> {
    let Value::Object(fields) = payload else {
        return Err(ChatError::MalformedPayload(format!(
            "expected a JSON object, got `{payload}`"
        )));
    };
    match fields.get("message") {
        Some(Value::String(text)) => Ok(text.clone()),
        Some(Value::Null) | None => match fields.get("results") {
            Some(results) => Ok(results.to_string()),
            None => Err(ChatError::MalformedPayload(
                "payload has neither `message` nor `results`".into(),
            )),
        },
        Some(other) => Ok(other.to_string()),
    }
}

/// JSON-over-HTTP transport: `POST <base>/<endpoint>` with `{ "query": .. }`.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    http: reqwest::Client,
    url: String,
    api_key: Option<String>,
    correlation_header: HeaderName,
}

impl HttpTransport {
    pub fn from_config(cfg: &TransportConfig) -> Result<Self> {
        let correlation_header = HeaderName::from_bytes(cfg.correlation_header.as_bytes())
            .map_err(|err| {
                ChatError::Config(format!(
                    "invalid correlation header `{}`: {err}",
                    cfg.correlation_header
                ))
            })?;
        Ok(Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(cfg.timeout_secs))
                .build()?,
            url: cfg.url(),
            api_key: cfg.api_key.clone().filter(|key| !key.is_empty()),
            correlation_header,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, query: &str, conversation_id: Option<&str>) -> Result<TransportReply> {
        let mut builder = self.http.post(&self.url).json(&json!({ "query": query }));
        if let Some(key) = &self.api_key {
            builder = builder.header(AUTHORIZATION, format!("Bearer {key}"));
        }
        if let Some(id) = conversation_id {
            builder = builder.header(self.correlation_header.clone(), id);
        }

        let resp = builder
            .send()
            .await
            .map_err(|err| ChatError::Transport(format!("request to {} failed: {err}", self.url)))?;

        let issued_id = resp
            .headers()
            .get(&self.correlation_header)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .map(str::to_string);

        if !resp.status().is_success() {
            return Err(ChatError::Status {
                status: resp.status().as_u16(),
                conversation_id: issued_id,
            });
        }

        let payload: Value = resp
            .json()
            .await
            .map_err(|err| ChatError::MalformedPayload(format!("reply is not JSON: {err}")))?;
        let text = extract_reply_text(&payload)?;

        Ok(TransportReply {
            text,
            conversation_id: issued_id,
        })
    }
}

/// Scripted reply for [`StubTransport`].
#[derive(Debug, Clone)]
pub enum StubReply {
    Text(String),
    Status(u16),
    Fail(String),
}

/// Transport that replays scripted outcomes in order, optionally after a delay.
#[derive(Debug, Default)]
pub struct StubTransport {
    replies: Mutex<VecDeque<StubReply>>,
    delay: Duration,
    issued_id: Option<String>,
    requests: Mutex<Vec<(String, Option<String>)>>,
}

impl StubTransport {
    pub fn new(replies: Vec<StubReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            ..Self::default()
        }
    }

    /// Always fails with a network error.
    pub fn failing() -> Self {
        Self::new(Vec::new())
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Attach a server-issued conversation id to every outcome.
    pub fn issuing_conversation_id(mut self, id: impl Into<String>) -> Self {
        self.issued_id = Some(id.into());
        self
    }

    /// `(query, conversation_id)` pairs received so far.
    pub fn requests(&self) -> Vec<(String, Option<String>)> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn send(&self, query: &str, conversation_id: Option<&str>) -> Result<TransportReply> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((query.to_string(), conversation_id.map(str::to_string)));
        let next = self
            .replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match next {
            Some(StubReply::Text(text)) => Ok(TransportReply {
                text,
                conversation_id: self.issued_id.clone(),
            }),
            Some(StubReply::Status(status)) => Err(ChatError::Status {
                status,
                conversation_id: self.issued_id.clone(),
            }),
            Some(StubReply::Fail(reason)) => Err(ChatError::Transport(reason)),
            None => Err(ChatError::Transport(
                "StubTransport ran out of scripted replies".into(),
            )),
        }
    }
}
