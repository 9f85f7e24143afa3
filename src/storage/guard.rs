//! Timeout and retry around object store calls.

use std::time::Duration;

use bytes::Bytes;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use super::object::{self, BlobRef};

/// Retry behaviour for object store calls.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt (0 means a single attempt).
    pub max_attempts: u32,
    #[serde(with = "millis")]
    pub initial_backoff: Duration,
    #[serde(with = "millis")]
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
    /// Upper bound for a single attempt.
    #[serde(with = "millis")]
    pub timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            timeout: Duration::from_secs(30),
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

impl RetryConfig {
    pub fn no_retry(timeout: Duration) -> Self {
        Self {
            max_attempts: 0,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            backoff_multiplier: 1.0,
            timeout,
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let millis =
            self.initial_backoff.as_millis() as f64 * self.backoff_multiplier.powi(attempt as i32);
        Duration::from_millis(millis as u64).min(self.max_backoff)
    }

    /// Runs `operation` until it succeeds, each attempt bounded by `timeout`.
    pub async fn run<F, Fut, T, E>(&self, name: &'static str, mut operation: F) -> Result<T, GuardError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error,
    {
        let mut attempt = 0;
        loop {
            let error = match tokio::time::timeout(self.timeout, operation()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(error)) => GuardError::Backend(error),
                Err(_) => GuardError::Timeout(self.timeout),
            };
            if attempt >= self.max_attempts {
                warn!(operation = name, attempts = attempt + 1, %error, "giving up");
                return Err(error);
            }
            let backoff = self.backoff(attempt);
            debug!(
                operation = name,
                attempt = attempt + 1,
                backoff_ms = backoff.as_millis() as u64,
                %error,
                "retrying after backoff"
            );
            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GuardError<E> {
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Backend(E),
}

/// Object store client whose calls are bounded and retried.
pub struct Guarded<C> {
    inner: C,
    retry: RetryConfig,
}

impl<C> Guarded<C> {
    pub fn new(inner: C, retry: RetryConfig) -> Self {
        Self { inner, retry }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

impl<C> object::Client for Guarded<C>
where
    C: object::Client + Sync,
{
    type Error = GuardError<C::Error>;

    async fn put(&self, key: &str, content_type: &str, body: Bytes) -> Result<BlobRef, Self::Error> {
        self.retry
            .run("put", || self.inner.put(key, content_type, body.clone()))
            .await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<BlobRef>, Self::Error> {
        self.retry.run("list", || self.inner.list(prefix)).await
    }

    async fn resolve_url(&self, blob: &BlobRef) -> Result<Url, Self::Error> {
        self.retry
            .run("resolve_url", || self.inner.resolve_url(blob))
            .await
    }

    async fn delete(&self, key: &str) -> Result<(), Self::Error> {
        self.retry.run("delete", || self.inner.delete(key)).await
    }
}
