use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::{debug, warn};

/// Key holding the JSON array of uploaded image records.
pub const IMAGES_KEY: &str = "portfolioImages";
/// Key holding the JSON array of contact messages.
pub const MESSAGES_KEY: &str = "contactMessages";

/// String key-value store holding the local index.
pub trait Client {
    type Error: std::error::Error + Send + Sync + 'static;

    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send;

    fn set(&self, key: &str, value: &str) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// JSON array read from one index key.
///
/// Entries that do not decode as `T` stay in the list untouched and are
/// written back as they were read.
#[derive(Debug)]
pub struct StoredList<T> {
    entries: Vec<(Value, Option<T>)>,
}

impl<T> Default for StoredList<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T: DeserializeOwned> StoredList<T> {
    fn decode(key: &str, raw: &str) -> Self {
        let values = match serde_json::from_str::<Vec<Value>>(raw) {
            Ok(values) => values,
            Err(error) => {
                warn!(key, %error, "index value is not a JSON array, treating as empty");
                return Self::default();
            }
        };
        let entries = values
            .into_iter()
            .enumerate()
            .map(|(position, value)| {
                let item = <T as serde::Deserialize>::deserialize(&value)
                    .inspect_err(|error| warn!(key, position, %error, "skipping undecodable index entry"))
                    .ok();
                (value, item)
            })
            .collect();
        Self { entries }
    }
}

impl<T> StoredList<T> {
    /// Decoded entries in stored order.
    pub fn items(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().filter_map(|(_, item)| item.as_ref())
    }

    pub fn into_items(self) -> Vec<T> {
        self.entries.into_iter().filter_map(|(_, item)| item).collect()
    }

    /// Number of decoded entries.
    pub fn len(&self) -> usize {
        self.items().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keeps decoded entries for which `keep` holds. Undecodable entries are
    /// always kept.
    pub fn retain(&mut self, mut keep: impl FnMut(&T) -> bool) {
        self.entries
            .retain(|(_, item)| item.as_ref().is_none_or(&mut keep));
    }

    fn encode(&self) -> String {
        Value::Array(self.entries.iter().map(|(value, _)| value.clone()).collect()).to_string()
    }
}

impl<T: Serialize> StoredList<T> {
    pub fn push(&mut self, item: T) -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(&item)?;
        self.entries.push((value, Some(item)));
        Ok(())
    }
}

/// Reads the JSON array stored under `key`.
///
/// An absent value and a value that is not a JSON array both read as an
/// empty list.
pub async fn read_stored<T, C>(client: &C, key: &str) -> Result<StoredList<T>, C::Error>
where
    T: DeserializeOwned,
    C: Client,
{
    match client.get(key).await? {
        Some(raw) => Ok(StoredList::decode(key, &raw)),
        None => {
            debug!(key, "index key absent");
            Ok(StoredList::default())
        }
    }
}

/// Entries under `key` that decode as `T`.
pub async fn read_list<T, C>(client: &C, key: &str) -> Result<Vec<T>, C::Error>
where
    T: DeserializeOwned,
    C: Client,
{
    Ok(read_stored(client, key).await?.into_items())
}

/// Replaces the whole array stored under `key`.
pub async fn write_stored<T, C>(client: &C, key: &str, list: &StoredList<T>) -> Result<(), C::Error>
where
    C: Client,
{
    debug!(key, count = list.entries.len(), "write index list");
    client.set(key, &list.encode()).await
}
