//! Persisted slot for the user's avatar image.
//!
//! The avatar outlives chat sessions, so it is kept in a small key/value blob
//! store rather than in the conversation.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
#[cfg(feature = "persistence")]
use sqlx::{sqlite::SqlitePoolOptions, Row, SqlitePool};
use tokio::fs;

use crate::error::{ChatError, Result};

pub const PROFILE_PICTURE_KEY: &str = "userProfilePic";

/// Key -> string persistence contract.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// `data:<mime>;base64,<payload>`
pub fn encode_data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

/// Splits a base64 data URL into its MIME type and decoded bytes.
pub fn decode_data_url(url: &str) -> Result<(String, Vec<u8>)> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| ChatError::Storage("not a data URL".into()))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| ChatError::Storage("data URL has no payload".into()))?;
    let mime = meta
        .strip_suffix(";base64")
        .ok_or_else(|| ChatError::Storage("data URL is not base64 encoded".into()))?;
    let bytes = STANDARD
        .decode(payload)
        .map_err(|err| ChatError::Storage(format!("invalid base64 payload: {err}")))?;
    Ok((mime.to_string(), bytes))
}

#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    entries: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// All entries in one JSON object on disk.
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    path: PathBuf,
}

impl FileBlobStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn read_all(&self) -> Result<HashMap<String, String>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(err) => {
                return Err(ChatError::Storage(format!(
                    "failed to read `{}`: {err}",
                    self.path.display()
                )))
            }
        };
        if content.trim().is_empty() {
            return Ok(HashMap::new());
        }
        Ok(serde_json::from_str(&content)?)
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_all().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.read_all().await?;
        entries.insert(key.to_string(), value.to_string());
        let serialized = serde_json::to_string_pretty(&entries)?;
        fs::write(&self.path, serialized).await.map_err(|err| {
            ChatError::Storage(format!("failed to write `{}`: {err}", self.path.display()))
        })
    }
}

#[cfg(feature = "persistence")]
pub struct SqlBlobStore {
    pool: SqlitePool,
}

#[cfg(feature = "persistence")]
impl SqlBlobStore {
    const INIT_STATEMENT: &'static str = r#"
        CREATE TABLE IF NOT EXISTS blobs (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
    "#;

    pub async fn connect(connection_url: impl AsRef<str>) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(connection_url.as_ref())
            .await
            .map_err(|err| {
                ChatError::Storage(format!(
                    "failed connecting to `{}`: {err}",
                    connection_url.as_ref()
                ))
            })?;

        sqlx::query(Self::INIT_STATEMENT)
            .execute(&pool)
            .await
            .map_err(|err| ChatError::Storage(format!("failed initializing schema: {err}")))?;

        Ok(Self { pool })
    }
}

#[cfg(feature = "persistence")]
#[async_trait]
impl BlobStore for SqlBlobStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM blobs WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| ChatError::Storage(format!("failed loading `{key}`: {err}")))?;
        row.map(|row| {
            row.try_get::<String, _>("value")
                .map_err(|err| ChatError::Storage(format!("failed decoding `{key}`: {err}")))
        })
        .transpose()
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO blobs (key, value) VALUES (?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map(|_| ())
        .map_err(|err| ChatError::Storage(format!("failed writing `{key}`: {err}")))
    }
}

/// The avatar entry of a blob store.
pub struct AvatarSlot<S: BlobStore> {
    store: S,
}

impl<S: BlobStore> AvatarSlot<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Stored data URL, if the user ever picked a picture.
    pub async fn load(&self) -> Result<Option<String>> {
        self.store.get(PROFILE_PICTURE_KEY).await
    }

    /// Encodes and stores an image, returning the data URL to display.
    pub async fn save_image(&self, mime: &str, bytes: &[u8]) -> Result<String> {
        let url = encode_data_url(mime, bytes);
        self.store.set(PROFILE_PICTURE_KEY, &url).await?;
        tracing::debug!(mime, size = bytes.len(), "avatar updated");
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const PIXEL: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a];

    #[test]
    fn data_url_round_trip() {
        let url = encode_data_url("image/png", PIXEL);
        assert!(url.starts_with("data:image/png;base64,"));
        let (mime, bytes) = decode_data_url(&url).unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(bytes, PIXEL);
    }

    #[test]
    fn rejects_non_base64_urls() {
        assert!(decode_data_url("https://example.com/a.png").is_err());
        assert!(decode_data_url("data:image/png,raw").is_err());
    }

    #[tokio::test]
    async fn memory_slot_starts_empty() {
        let slot = AvatarSlot::new(MemoryBlobStore::default());
        assert!(slot.load().await.unwrap().is_none());
        let url = slot.save_image("image/jpeg", PIXEL).await.unwrap();
        assert_eq!(slot.load().await.unwrap(), Some(url));
    }

    #[tokio::test]
    async fn file_store_survives_reopening() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("blobs.json");

        let url = AvatarSlot::new(FileBlobStore::new(&path))
            .save_image("image/png", PIXEL)
            .await
            .unwrap();
        let store = FileBlobStore::new(&path);
        store.set("other", "value").await.unwrap();

        let reopened = AvatarSlot::new(FileBlobStore::new(&path));
        assert_eq!(reopened.load().await.unwrap(), Some(url));
        assert_eq!(store.get("other").await.unwrap().as_deref(), Some("value"));
    }

    #[cfg(feature = "persistence")]
    #[tokio::test]
    async fn sqlite_store_overwrites_by_key() {
        let store = SqlBlobStore::connect("sqlite::memory:").await.unwrap();
        assert!(store.get(PROFILE_PICTURE_KEY).await.unwrap().is_none());

        store.set(PROFILE_PICTURE_KEY, "first").await.unwrap();
        store.set(PROFILE_PICTURE_KEY, "second").await.unwrap();

        assert_eq!(
            store.get(PROFILE_PICTURE_KEY).await.unwrap().as_deref(),
            Some("second")
        );
    }
}
