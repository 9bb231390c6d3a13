//! Per-conversation scratch data passed between dialogue steps.
//!
//! Entries are keyed by conversation identity and a logical key name, and
//! can be read exactly once: [`ConversationStore::take`] removes what it
//! returns. Entries nobody takes are evicted after an idle period.

use super::{ConversationId, GatewayError};
use crate::config::{CONVERSATION_MAX_ENTRIES, CONVERSATION_TTL_SECS};
use moka::future::Cache;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

type EntryKey = (ConversationId, String);

/// Take-once key/value store scoped by conversation
#[derive(Clone)]
pub struct ConversationStore {
    entries: Cache<EntryKey, serde_json::Value>,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(CONVERSATION_TTL_SECS),
            CONVERSATION_MAX_ENTRIES,
        )
    }
}

impl ConversationStore {
    /// Create a store evicting entries idle for longer than `ttl`
    ///
    /// # Examples
    ///
    /// ```
    /// use pdf_courier::gateway::ConversationStore;
    /// use std::time::Duration;
    ///
    /// let store = ConversationStore::new(Duration::from_secs(3600), 10_000);
    /// ```
    #[must_use]
    pub fn new(ttl: Duration, max_capacity: u64) -> Self {
        let entries = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_idle(ttl)
            .build();
        Self { entries }
    }

    /// Insert or overwrite the value at `key`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidConversationValue`] if the value cannot be serialized.
    pub async fn put<T>(
        &self,
        conversation: ConversationId,
        key: &str,
        value: &T,
    ) -> Result<(), GatewayError>
    where
        T: Serialize + ?Sized + Sync,
    {
        let value =
            serde_json::to_value(value).map_err(|source| GatewayError::InvalidConversationValue {
                key: key.to_owned(),
                source,
            })?;
        self.entries.insert((conversation, key.to_owned()), value).await;
        debug!(
            chat_id = conversation.chat_id,
            user_id = conversation.user_id,
            key,
            "Conversation entry stored"
        );
        Ok(())
    }

    /// Remove and return the value at `key`.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::MissingConversationKey`] if nothing is stored there
    /// - [`GatewayError::InvalidConversationValue`] if the stored value is not a `T`;
    ///   the entry is consumed either way
    pub async fn take<T>(&self, conversation: ConversationId, key: &str) -> Result<T, GatewayError>
    where
        T: DeserializeOwned,
    {
        let Some(value) = self.entries.remove(&(conversation, key.to_owned())).await else {
            warn!(
                chat_id = conversation.chat_id,
                user_id = conversation.user_id,
                key,
                "Conversation key read before it was written"
            );
            return Err(GatewayError::MissingConversationKey {
                key: key.to_owned(),
            });
        };

        serde_json::from_value(value).map_err(|source| GatewayError::InvalidConversationValue {
            key: key.to_owned(),
            source,
        })
    }

    /// Whether a value is stored at `key`
    #[must_use]
    pub fn contains(&self, conversation: ConversationId, key: &str) -> bool {
        self.entries.contains_key(&(conversation, key.to_owned()))
    }
}
