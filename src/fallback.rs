//! Canned replies used when the answering service cannot be reached.

use std::borrow::Cow;
use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs;

use crate::error::{ChatError, Result};
use crate::transport::extract_reply_text;

const BUNDLED_FALLBACK: &str = include_str!("../assets/availability-fallback.json");

/// Local source of a `{ message | results }` document. Never touches the
/// network.
#[async_trait]
pub trait FallbackSource: Send + Sync {
    async fn load(&self) -> Result<String>;
}

fn parse_document(raw: &str, origin: &str) -> Result<String> {
    let payload: Value = serde_json::from_str(raw)
        .map_err(|err| ChatError::Fallback(format!("`{origin}` is not valid JSON: {err}")))?;
    extract_reply_text(&payload)
        .map_err(|err| ChatError::Fallback(format!("`{origin}` has no usable reply: {err}")))
}

/// Fallback document read from disk on each use.
#[derive(Debug, Clone)]
pub struct FileFallback {
    path: PathBuf,
}

impl FileFallback {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl FallbackSource for FileFallback {
    async fn load(&self) -> Result<String> {
        let raw = fs::read_to_string(&self.path).await.map_err(|err| {
            ChatError::Fallback(format!("failed to read `{}`: {err}", self.path.display()))
        })?;
        parse_document(&raw, &self.path.display().to_string())
    }
}

/// Fallback document held in memory, by default the one bundled with the crate.
#[derive(Debug, Clone)]
pub struct StaticFallback {
    body: Cow<'static, str>,
}

impl StaticFallback {
    pub fn new(body: impl Into<Cow<'static, str>>) -> Self {
        Self { body: body.into() }
    }

    pub fn bundled() -> Self {
        Self::new(BUNDLED_FALLBACK)
    }
}

impl Default for StaticFallback {
    fn default() -> Self {
        Self::bundled()
    }
}

#[async_trait]
impl FallbackSource for StaticFallback {
    async fn load(&self) -> Result<String> {
        parse_document(&self.body, "static fallback")
    }
}

/// No fallback configured: every read fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFallback;

#[async_trait]
impl FallbackSource for NoFallback {
    async fn load(&self) -> Result<String> {
        Err(ChatError::Fallback("no fallback configured".into()))
    }
}
