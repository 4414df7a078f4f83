//! Flash messages: short lived notices kept in the session until a later request reads
//! and clears them.

use crate::session::SessionStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha1::{Digest, Sha1};
use std::fmt;
use tracing::warn;

pub const KIND_NORMAL: &str = "normal";
pub const KIND_ERROR: &str = "error";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessage {
    pub message: String,
    pub kind: String,
    pub is_error: bool,
    pub hash: String,
}

impl FlashMessage {
    pub fn new(message: impl Into<String>, kind: impl Into<String>) -> Self {
        let message = message.into();
        let kind = kind.into();
        let hash = message_hash(&message, &kind);
        Self { is_error: kind == KIND_ERROR, message, kind, hash }
    }
}

impl fmt::Display for FlashMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// sha1 over `message|kind`, hex encoded.
fn message_hash(message: &str, kind: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(message.as_bytes());
    hasher.update(b"|");
    hasher.update(kind.as_bytes());
    hex::encode(hasher.finalize())
}

/// Flash view over the request session.
pub struct Flash<'a> {
    session: &'a dyn SessionStore,
    key: &'a str,
}

impl fmt::Debug for Flash<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flash").field("key", &self.key).finish_non_exhaustive()
    }
}

impl<'a> Flash<'a> {
    pub fn new(session: &'a dyn SessionStore, key: &'a str) -> Self {
        Self { session, key }
    }

    /// Messages in the order they were appended.
    pub fn messages(&self) -> Vec<FlashMessage> {
        match self.session.get(self.key) {
            Some(value) => serde_json::from_value(value).unwrap_or_else(|e| {
                warn!(cause = %e, key = self.key, "discarding unreadable flash messages");
                Vec::new()
            }),
            None => Vec::new(),
        }
    }

    /// Append a message unless an identical message of the same kind is already queued.
    pub fn append(&self, message: impl Into<String>, kind: impl Into<String>) {
        let flash_message = FlashMessage::new(message, kind);
        let mut messages = self.messages();
        if messages.iter().any(|m| m.hash == flash_message.hash) {
            return;
        }
        messages.push(flash_message);
        self.store(&messages);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.append(message, KIND_ERROR);
    }

    /// Replace every queued message with this one.
    pub fn set(&self, message: impl Into<String>, kind: impl Into<String>) {
        self.clear();
        self.append(message, kind);
    }

    pub fn clear(&self) {
        if self.session.remove(self.key).is_some() {
            self.session.save();
        }
    }

    pub fn get_and_clear(&self) -> Vec<FlashMessage> {
        let messages = self.messages();
        self.clear();
        messages
    }

    pub fn len(&self) -> usize {
        self.messages().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn store(&self, messages: &[FlashMessage]) {
        match serde_json::to_value(messages) {
            Ok(value) => {
                self.session.insert(self.key, value);
                self.session.save();
            }
            Err(e) => warn!(cause = %e, "can't store flash messages"),
        }
    }

    pub(crate) fn to_value(&self) -> Value {
        self.session.get(self.key).unwrap_or_else(|| Value::Array(Vec::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::{Flash, FlashMessage, KIND_ERROR, KIND_NORMAL};
    use crate::session::MemorySession;

    const KEY: &str = "flash";

    #[test]
    fn test_append_is_idempotent() {
        let session = MemorySession::new();
        let flash = Flash::new(&session, KEY);

        flash.append("saved", KIND_NORMAL);
        flash.append("saved", KIND_NORMAL);
        assert_eq!(flash.len(), 1);

        flash.append("saved", KIND_ERROR);
        assert_eq!(flash.len(), 2);

        let messages = flash.messages();
        assert_eq!(messages[0].message, "saved");
        assert!(!messages[0].is_error);
        assert!(messages[1].is_error);
    }

    #[test]
    fn test_clear_and_set() {
        let session = MemorySession::new();
        let flash = Flash::new(&session, KEY);

        flash.append("one", KIND_NORMAL);
        flash.error("two");
        flash.clear();
        assert!(flash.messages().is_empty());
        assert!(flash.is_empty());

        flash.append("one", KIND_NORMAL);
        flash.set("only", KIND_NORMAL);
        let messages = flash.get_and_clear();
        assert_eq!(messages, vec![FlashMessage::new("only", KIND_NORMAL)]);
        assert!(flash.is_empty());
    }

    #[test]
    fn test_messages_survive_in_session() {
        let session = MemorySession::new();
        Flash::new(&session, KEY).append("hello", KIND_NORMAL);

        let later = Flash::new(&session, KEY);
        assert_eq!(later.messages()[0].to_string(), "hello");
        assert_eq!(later.messages()[0].hash.len(), 40);
    }
}
