//! Contact messages
//!
//! Every operation reads the whole message list from the index, changes it
//! and writes it back. Concurrent writers race and the last one wins.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::storage::index::{self, MESSAGES_KEY};

/// Contact form contents as entered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    pub message: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FormError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("invalid email address: {0}")]
    InvalidEmail(String),
}

impl ContactForm {
    pub fn validate(&self) -> Result<(), FormError> {
        for (field, value) in [
            ("name", &self.name),
            ("email", &self.email),
            ("message", &self.message),
        ] {
            if value.trim().is_empty() {
                return Err(FormError::Missing(field));
            }
        }
        if !looks_like_email(self.email.trim()) {
            return Err(FormError::InvalidEmail(self.email.clone()));
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactMessage {
    /// Creation time in milliseconds; unique within the list.
    pub id: i64,
    pub name: String,
    pub email: String,
    pub message: String,
    pub date: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum MessageError<IE> {
    #[error("invalid contact form: {0}")]
    Form(#[from] FormError),
    #[error("message store: {0}")]
    Store(#[source] IE),
    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
}

pub struct MessageBoard<'s, I> {
    index: &'s I,
}

impl<'s, I: index::Client> MessageBoard<'s, I> {
    pub fn new(index: &'s I) -> Self {
        Self { index }
    }

    pub async fn submit(
        &self,
        form: &mut ContactForm,
    ) -> Result<ContactMessage, MessageError<I::Error>> {
        self.submit_at(form, Utc::now()).await
    }

    /// Appends the form as a new message created at `now` and clears the form.
    pub async fn submit_at(
        &self,
        form: &mut ContactForm,
        now: DateTime<Utc>,
    ) -> Result<ContactMessage, MessageError<I::Error>> {
        form.validate()?;
        let mut messages = index::read_stored::<ContactMessage, _>(self.index, MESSAGES_KEY)
            .await
            .map_err(MessageError::Store)?;

        let mut id = now.timestamp_millis();
        while messages.items().any(|message| message.id == id) {
            id += 1;
        }
        let message = ContactMessage {
            id,
            name: form.name.clone(),
            email: form.email.clone(),
            message: form.message.clone(),
            date: now,
        };
        messages
            .push(message.clone())
            .map_err(MessageError::Encode)?;
        index::write_stored(self.index, MESSAGES_KEY, &messages)
            .await
            .map_err(MessageError::Store)?;

        info!(id, "stored contact message");
        form.clear();
        Ok(message)
    }

    /// Every stored message, oldest first.
    pub async fn list(&self) -> Result<Vec<ContactMessage>, I::Error> {
        index::read_list(self.index, MESSAGES_KEY).await
    }

    /// Removes the message with `id` and returns the remaining list.
    ///
    /// Unknown ids leave the store untouched. Stored entries that are not
    /// readable messages are never removed.
    pub async fn delete(&self, id: i64) -> Result<Vec<ContactMessage>, I::Error> {
        let mut messages =
            index::read_stored::<ContactMessage, _>(self.index, MESSAGES_KEY).await?;
        let before = messages.len();
        messages.retain(|message| message.id != id);
        if messages.len() == before {
            debug!(id, "no message to delete");
            return Ok(messages.into_items());
        }
        index::write_stored(self.index, MESSAGES_KEY, &messages).await?;
        info!(id, "deleted contact message");
        Ok(messages.into_items())
    }
}
