use std::collections::{BTreeMap, HashMap};

use bytes::Bytes;
use url::Url;

use crate::storage::{
    index,
    object::{self, BlobRef, public_url},
};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("failed to build url: {0}")]
    Url(url::ParseError),
}

/// Object store kept in process memory, keyed by full path.
pub struct ObjectClient {
    base: Url,
    map: tokio::sync::Mutex<BTreeMap<String, (Bytes, String)>>,
}

impl ObjectClient {
    pub fn new(base: Url) -> Self {
        Self {
            base,
            map: Default::default(),
        }
    }

    pub async fn get(&self, key: &str) -> Option<(Bytes, String)> {
        self.map.lock().await.get(key).cloned()
    }

    pub async fn keys(&self) -> Vec<String> {
        self.map.lock().await.keys().cloned().collect()
    }
}

impl Default for ObjectClient {
    fn default() -> Self {
        Self::new(Url::parse("memory://objects/").expect("static url is valid"))
    }
}

/// Whether `key` sits directly under `prefix`.
pub(crate) fn directly_under(prefix: &str, key: &str) -> bool {
    key.strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('/'))
        .is_some_and(|name| !name.is_empty() && !name.contains('/'))
}

impl object::Client for ObjectClient {
    type Error = Error;

    async fn put(&self, key: &str, content_type: &str, body: Bytes) -> Result<BlobRef, Error> {
        self.map
            .lock()
            .await
            .insert(key.to_owned(), (body, content_type.to_owned()));
        Ok(BlobRef::new(key))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<BlobRef>, Error> {
        Ok(self
            .map
            .lock()
            .await
            .keys()
            .filter(|key| directly_under(prefix, key))
            .map(BlobRef::new)
            .collect())
    }

    async fn resolve_url(&self, blob: &BlobRef) -> Result<Url, Error> {
        if !self.map.lock().await.contains_key(&blob.full_path) {
            return Err(Error::NotFound(blob.full_path.clone()));
        }
        public_url(&self.base, &blob.full_path).map_err(Error::Url)
    }

    async fn delete(&self, key: &str) -> Result<(), Error> {
        self.map.lock().await.remove(key);
        Ok(())
    }
}

#[derive(Default)]
pub struct IndexClient {
    map: tokio::sync::Mutex<HashMap<String, String>>,
}

impl index::Client for IndexClient {
    type Error = std::convert::Infallible;

    async fn get(&self, key: &str) -> Result<Option<String>, Self::Error> {
        Ok(self.map.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), Self::Error> {
        self.map.lock().await.insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}
