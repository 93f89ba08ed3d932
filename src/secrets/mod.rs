//! Signing-key retrieval.
//!
//! Token issuance and validation ask a [`SecretProvider`] for the symmetric
//! key on every call. [`CachedSecretProvider`] can sit in front of a slow
//! backend to keep a key for a bounded time.

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::SecretError;

/// Symmetric HMAC key. `Debug` never prints the bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningKey(Vec<u8>);

impl SigningKey {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigningKey(<{} bytes>)", self.0.len())
    }
}

#[async_trait]
pub trait SecretProvider: Send + Sync {
    async fn signing_key(&self) -> Result<SigningKey, SecretError>;
}

/// Key fixed at construction, normally `auth.jwt_secret`.
pub struct StaticSecretProvider {
    key: SigningKey,
}

impl StaticSecretProvider {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self { key: SigningKey::new(secret) }
    }
}

#[async_trait]
impl SecretProvider for StaticSecretProvider {
    async fn signing_key(&self) -> Result<SigningKey, SecretError> {
        if self.key.as_bytes().is_empty() {
            return Err(SecretError::Invalid("signing secret is empty".into()));
        }
        Ok(self.key.clone())
    }
}

#[derive(Deserialize)]
struct SecretDocument {
    jwt_secret: Option<String>,
}

/// Reads a JSON secret document (`{"jwt_secret": "..."}`) from disk on every call.
pub struct JsonFileSecretProvider {
    path: PathBuf,
}

impl JsonFileSecretProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SecretProvider for JsonFileSecretProvider {
    async fn signing_key(&self) -> Result<SigningKey, SecretError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| SecretError::Unavailable(format!("{}: {}", self.path.display(), e)))?;

        let doc: SecretDocument = serde_json::from_str(&raw)
            .map_err(|e| SecretError::Invalid(e.to_string()))?;

        match doc.jwt_secret {
            Some(secret) if !secret.is_empty() => Ok(SigningKey::new(secret)),
            _ => Err(SecretError::Invalid("jwt_secret missing or empty".into())),
        }
    }
}

/// Serves a fetched key for `ttl`, then refreshes from the inner provider.
/// A failed refresh drops the cached key so a rotated-out secret is never reused.
pub struct CachedSecretProvider {
    inner: Arc<dyn SecretProvider>,
    ttl: Duration,
    cached: RwLock<Option<(SigningKey, Instant)>>,
}

impl CachedSecretProvider {
    pub fn new(inner: Arc<dyn SecretProvider>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            cached: RwLock::new(None),
        }
    }

    pub async fn invalidate(&self) {
        *self.cached.write().await = None;
    }
}

#[async_trait]
impl SecretProvider for CachedSecretProvider {
    async fn signing_key(&self) -> Result<SigningKey, SecretError> {
        if let Some((key, fetched_at)) = self.cached.read().await.as_ref() {
            if fetched_at.elapsed() < self.ttl {
                return Ok(key.clone());
            }
        }

        let mut cached = self.cached.write().await;
        // Another task may have refreshed while we waited for the lock.
        if let Some((key, fetched_at)) = cached.as_ref() {
            if fetched_at.elapsed() < self.ttl {
                return Ok(key.clone());
            }
        }

        match self.inner.signing_key().await {
            Ok(key) => {
                debug!("Signing key refreshed");
                *cached = Some((key.clone(), Instant::now()));
                Ok(key)
            }
            Err(e) => {
                warn!("Signing key refresh failed, dropping cached key: {}", e);
                *cached = None;
                Err(e)
            }
        }
    }
}
