use std::time::Duration;

use aws_config::BehaviorVersion;
use aws_sdk_s3::{presigning::PresigningConfig, primitives::ByteStream};
use bytes::Bytes;
use tracing::debug;
use url::Url;

use crate::{
    config,
    storage::object::{self, BlobRef, public_url},
};

pub struct Client {
    client: aws_sdk_s3::Client,
    bucket: String,
    public_base_url: Option<Url>,
    presign_ttl: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to put object: {0}")]
    Put(String),
    #[error("Failed to list objects: {0}")]
    List(String),
    #[error("Failed to presign object url: {0}")]
    Presign(String),
    #[error("Failed to delete object: {0}")]
    Delete(String),
    #[error("Failed to build url: {0}")]
    Url(url::ParseError),
}

impl Client {
    pub async fn new(config: &config::S3Storage) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint.as_str());
        }
        if let Some(region) = &config.region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }
        if let Some(credentials) = &config.credentials {
            loader = loader.credentials_provider(aws_sdk_s3::config::Credentials::new(
                &credentials.access_key_id,
                &credentials.secret_access_key,
                None,
                None,
                "studio-folio",
            ));
        }
        let sdk_config = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.force_path_style)
            .build();
        Self {
            client: aws_sdk_s3::Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
            public_base_url: config.public_base_url.clone(),
            presign_ttl: Duration::from_secs(config.presign_ttl_secs),
        }
    }
}

impl object::Client for Client {
    type Error = Error;

    async fn put(&self, key: &str, content_type: &str, body: Bytes) -> Result<BlobRef, Error> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|error| Error::Put(error.to_string()))?;
        Ok(BlobRef::new(key))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<BlobRef>, Error> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(format!("{prefix}/"))
            .delimiter("/")
            .send()
            .await
            .map_err(|error| Error::List(error.to_string()))?;
        if output.is_truncated().unwrap_or(false) {
            debug!(prefix, "listing truncated, only the first page is used");
        }
        Ok(output
            .contents()
            .iter()
            .filter_map(|object| object.key())
            .filter(|key| !key.ends_with('/'))
            .map(BlobRef::new)
            .collect())
    }

    async fn resolve_url(&self, blob: &BlobRef) -> Result<Url, Error> {
        if let Some(base) = &self.public_base_url {
            return public_url(base, &blob.full_path).map_err(Error::Url);
        }
        let presigning = PresigningConfig::expires_in(self.presign_ttl)
            .map_err(|error| Error::Presign(error.to_string()))?;
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&blob.full_path)
            .presigned(presigning)
            .await
            .map_err(|error| Error::Presign(error.to_string()))?;
        Url::parse(request.uri()).map_err(Error::Url)
    }

    async fn delete(&self, key: &str) -> Result<(), Error> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|error| Error::Delete(error.to_string()))?;
        Ok(())
    }
}
