//! Canonical cross-backend message representation

use chrono::{DateTime, Utc};
use std::fmt;

/// A single relayed chat message.
///
/// Carries backend display strings, not opaque ids: adapters resolve
/// backend-native user ids to display names before constructing one.
/// The timestamp is assigned by the relay at ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Display name of the original author
    pub author: String,

    /// Ingestion time, assigned by the receiving adapter
    pub timestamp: DateTime<Utc>,

    /// Identifier of the originating room/channel
    pub source: String,

    /// Raw text body
    pub content: String,
}

impl Message {
    /// Create a message stamped with the current time
    pub fn new(
        author: impl Into<String>,
        source: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            author: author.into(),
            timestamp: Utc::now(),
            source: source.into(),
            content: content.into(),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {}: ({}) {}",
            self.timestamp, self.source, self.author, self.content
        )
    }
}
