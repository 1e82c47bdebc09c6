use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::payload::{ChartPayload, TablePayload};

pub const DEFAULT_SOURCE_TITLE: &str = "Source";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }

    pub fn is_user(self) -> bool {
        self == Role::User
    }

    pub fn is_model(self) -> bool {
        self == Role::Model
    }
}

impl AsRef<str> for Role {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl TryFrom<&str> for Role {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "user" => Ok(Role::User),
            "model" => Ok(Role::Model),
            _ => Err(format!("invalid message role: {value}")),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl From<Role> for String {
    fn from(value: Role) -> Self {
        value.as_str().to_string()
    }
}

/// A web page the model cited while answering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub uri: String,
    pub title: String,
}

impl Source {
    pub fn new(uri: impl Into<String>, title: Option<String>) -> Self {
        let title = title
            .filter(|title| !title.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SOURCE_TITLE.to_string());
        Self {
            uri: uri.into(),
            title,
        }
    }
}

/// Insertion-ordered source list, unique by URI.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceList {
    items: Vec<Source>,
}

impl SourceList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `source` unless its URI is already present. Returns whether it
    /// was added.
    pub fn insert(&mut self, source: Source) -> bool {
        if source.uri.is_empty() || self.items.iter().any(|s| s.uri == source.uri) {
            return false;
        }
        self.items.push(source);
        true
    }

    pub fn extend(&mut self, sources: impl IntoIterator<Item = Source>) {
        for source in sources {
            self.insert(source);
        }
    }

    pub fn as_slice(&self) -> &[Source] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

static MESSAGE_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_message_id(now: DateTime<Utc>) -> String {
    let seq = MESSAGE_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{}-{}", now.timestamp_millis(), seq)
}

#[derive(Debug, Clone)]
pub struct Message {
    pub id: String,
    pub role: Role,
    /// Raw text as received. For model messages this still contains the
    /// embedded payload blocks; display text is derived from it.
    pub text: String,
    /// Attached image as a `data:` URI.
    pub image: Option<String>,
    pub sources: Vec<Source>,
    pub is_streaming: bool,
    pub timestamp: DateTime<Utc>,
    pub chart: Option<ChartPayload>,
    pub table: Option<TablePayload>,
}

impl Message {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        let timestamp = Utc::now();
        Self {
            id: next_message_id(timestamp),
            role,
            text: text.into(),
            image: None,
            sources: Vec::new(),
            is_streaming: false,
            timestamp,
            chart: None,
            table: None,
        }
    }

    pub fn user(text: impl Into<String>, image: Option<String>) -> Self {
        let mut message = Self::new(Role::User, text);
        message.image = image;
        message
    }

    /// Empty model message that is about to receive a stream.
    pub fn model_placeholder() -> Self {
        let mut message = Self::new(Role::Model, String::new());
        message.is_streaming = true;
        message
    }

    pub fn is_user(&self) -> bool {
        self.role.is_user()
    }

    pub fn is_model(&self) -> bool {
        self.role.is_model()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_strings() {
        assert_eq!(Role::try_from("model"), Ok(Role::Model));
        assert!(Role::try_from("assistant").is_err());
        assert_eq!(String::from(Role::User), "user");
    }

    #[test]
    fn source_list_dedupes_by_uri_and_keeps_order() {
        let mut sources = SourceList::new();
        assert!(sources.insert(Source::new("https://a.example", Some("A".into()))));
        assert!(sources.insert(Source::new("https://b.example", None)));
        assert!(!sources.insert(Source::new("https://a.example", Some("A again".into()))));
        assert!(!sources.insert(Source::new("", Some("empty".into()))));

        let titles: Vec<&str> = sources.as_slice().iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["A", DEFAULT_SOURCE_TITLE]);
    }

    #[test]
    fn message_ids_are_unique() {
        let first = Message::new(Role::User, "hi");
        let second = Message::new(Role::User, "hi");
        assert_ne!(first.id, second.id);
        assert!(Message::model_placeholder().is_streaming);
    }
}
