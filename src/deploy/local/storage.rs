use std::str::FromStr as _;

use bytes::Bytes;
use tracing::error;
use url::Url;

use crate::storage::{
    index,
    object::{self, BlobRef, public_url},
};

use super::memory::directly_under;

/// Sqlite file holding both blobs and the local index.
pub struct LocalStorage {
    pool: sqlx::SqlitePool,
}

#[derive(Clone)]
pub struct ObjectClient {
    pool: sqlx::SqlitePool,
    base: Url,
}

#[derive(Clone)]
pub struct IndexClient {
    pool: sqlx::SqlitePool,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("sqlite error: {0}")]
    Sqlite(sqlx::Error),
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("failed to build url: {0}")]
    Url(url::ParseError),
}

impl LocalStorage {
    pub async fn open(url: &str) -> Result<Self, sqlx::Error> {
        let options = sqlx::sqlite::SqliteConnectOptions::from_str(url)
            .inspect_err(|error| error!(%error, %url, "Failed to open local storage db"))?
            .create_if_missing(true);
        let pool = sqlx::pool::PoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .inspect_err(|error| error!(%error, %url, "Failed to open local storage db"))?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS blob(
                key TEXT NOT NULL PRIMARY KEY,
                content_type TEXT NOT NULL,
                body BLOB NOT NULL
            );

            CREATE TABLE IF NOT EXISTS kv(
                key TEXT NOT NULL PRIMARY KEY,
                value TEXT NOT NULL
            );
        "#,
        )
        .execute(&pool)
        .await
        .inspect_err(|error| error!(%error, %url, "Failed to execute DDL to storage db"))?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &sqlx::SqlitePool {
        &self.pool
    }

    /// Object client whose URLs resolve against `base`.
    pub fn object_client(&self, base: Url) -> ObjectClient {
        ObjectClient {
            pool: self.pool.clone(),
            base,
        }
    }

    pub fn index_client(&self) -> IndexClient {
        IndexClient {
            pool: self.pool.clone(),
        }
    }
}

impl object::Client for ObjectClient {
    type Error = Error;

    async fn put(&self, key: &str, content_type: &str, body: Bytes) -> Result<BlobRef, Error> {
        sqlx::query(
            r#"
            INSERT INTO blob(key, content_type, body)
            VALUES (?, ?, ?)
            ON CONFLICT(key)
            DO UPDATE SET
                content_type = EXCLUDED.content_type,
                body = EXCLUDED.body
        "#,
        )
        .bind(key)
        .bind(content_type)
        .bind(body.as_ref())
        .execute(&self.pool)
        .await
        .map_err(Error::Sqlite)?;
        Ok(BlobRef::new(key))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<BlobRef>, Error> {
        let keys = sqlx::query_scalar::<_, String>(
            "SELECT key FROM blob WHERE substr(key, 1, length(?) + 1) = ? || '/' ORDER BY key",
        )
        .bind(prefix)
        .bind(prefix)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Sqlite)?;
        Ok(keys
            .into_iter()
            .filter(|key| directly_under(prefix, key))
            .map(BlobRef::new)
            .collect())
    }

    async fn resolve_url(&self, blob: &BlobRef) -> Result<Url, Error> {
        let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM blob WHERE key = ?")
            .bind(&blob.full_path)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Sqlite)?;
        if exists == 0 {
            return Err(Error::NotFound(blob.full_path.clone()));
        }
        public_url(&self.base, &blob.full_path).map_err(Error::Url)
    }

    async fn delete(&self, key: &str) -> Result<(), Error> {
        sqlx::query("DELETE FROM blob WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(Error::Sqlite)?;
        Ok(())
    }
}

impl index::Client for IndexClient {
    type Error = sqlx::Error;

    async fn get(&self, key: &str) -> Result<Option<String>, Self::Error> {
        sqlx::query_scalar::<_, String>("SELECT value FROM kv WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), Self::Error> {
        sqlx::query(
            r#"
            INSERT INTO kv(key, value)
            VALUES (?, ?)
            ON CONFLICT(key)
            DO UPDATE SET value = EXCLUDED.value
        "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
