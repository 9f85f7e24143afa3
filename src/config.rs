use serde::Deserialize;
use url::Url;

use crate::storage::guard::RetryConfig;

#[derive(Deserialize, Debug)]
pub struct Config {
    pub object_store: ObjectStorage,
    pub index: IndexStorage,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    /// Prefix every route is mounted under, e.g. `/studio2`.
    #[serde(default)]
    pub base_path: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type")]
pub enum ObjectStorage {
    S3(S3Storage),
    Local {
        /// sqlite connection url, e.g. `sqlite://studio.db`
        url: String,
        public_base_url: Url,
    },
}

#[derive(Deserialize, Debug, Clone)]
pub struct S3Storage {
    pub bucket: String,
    pub endpoint: Option<Url>,
    pub region: Option<String>,
    pub credentials: Option<S3Credentials>,
    /// Serve blobs from here instead of presigning.
    pub public_base_url: Option<Url>,
    #[serde(default = "default_presign_ttl_secs")]
    pub presign_ttl_secs: u64,
    #[serde(default)]
    pub force_path_style: bool,
}

fn default_presign_ttl_secs() -> u64 {
    7 * 24 * 60 * 60
}

#[derive(Deserialize, Clone)]
pub struct S3Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl std::fmt::Debug for S3Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Credentials")
            .field("access_key_id", &self.access_key_id)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct IndexStorage {
    /// sqlite connection url; may point at the same file as the object store
    pub url: String,
}

#[derive(Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct AdminConfig {
    pub username: String,
    pub password: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            username: "admin".into(),
            password: "admin123".into(),
        }
    }
}

impl std::fmt::Debug for AdminConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminConfig")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn from_yaml(src: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(src)
    }
}
