use bytes::Bytes;
use serde::{Deserialize, Serialize};
use url::Url;

/// Handle to a stored blob.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlobRef {
    /// Full storage path, e.g. `Nature Photography/1700000000000_fern.jpg`.
    pub full_path: String,
    /// Last path segment.
    pub name: String,
}

impl BlobRef {
    pub fn new(full_path: impl Into<String>) -> Self {
        let full_path = full_path.into();
        let name = full_path
            .rsplit('/')
            .next()
            .unwrap_or(full_path.as_str())
            .to_owned();
        Self { full_path, name }
    }
}

pub trait Client {
    type Error: std::error::Error + Send + Sync + 'static;

    fn put(
        &self,
        key: &str,
        content_type: &str,
        body: Bytes,
    ) -> impl Future<Output = Result<BlobRef, Self::Error>> + Send;

    /// Lists blobs directly under `prefix`. Only the first page the backend
    /// returns is reflected.
    fn list(&self, prefix: &str) -> impl Future<Output = Result<Vec<BlobRef>, Self::Error>> + Send;

    fn resolve_url(&self, blob: &BlobRef)
    -> impl Future<Output = Result<Url, Self::Error>> + Send;

    fn delete(&self, key: &str) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// `base/<segment>/<segment>` with each key segment percent-encoded.
pub fn public_url(base: &Url, key: &str) -> Result<Url, url::ParseError> {
    let mut joined = base.as_str().trim_end_matches('/').to_owned();
    for segment in key.split('/') {
        joined.push('/');
        joined.push_str(&urlencoding::encode(segment));
    }
    Url::parse(&joined)
}
