use std::{collections::HashSet, fmt};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{errors::Error, Result};

/// Platform channel id (opaque, stable).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub String);

/// Platform message id (opaque, stable).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

/// Platform user id (opaque, stable).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthorId(pub String);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a record across all logs.
pub type RecordKey = (ChannelId, MessageId);

/// A message as handed over by a message-source adapter.
///
/// Every field is optional here; `MessageRecord::try_from_raw` decides what is
/// required. Adapters must not leak SDK types past this struct.
#[derive(Clone, Debug, Default)]
pub struct RawMessage {
    pub channel_id: Option<String>,
    pub channel_name: Option<String>,
    pub message_id: Option<String>,
    pub author_id: Option<String>,
    pub author_display_name: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub content: Option<String>,
    pub attachments: Vec<String>,
}

/// Canonical persisted message. Immutable once written.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub channel_id: ChannelId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_name: Option<String>,
    pub message_id: MessageId,
    pub author_id: AuthorId,
    pub author_display_name: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<String>,
}

impl MessageRecord {
    pub fn try_from_raw(raw: RawMessage) -> Result<Self> {
        let message_id = required(raw.message_id, "message_id")?;
        let channel_id = required(raw.channel_id, "channel_id")
            .map_err(|e| Error::MalformedRecord(format!("message {message_id}: {e}")))?;
        let author_id = required(raw.author_id, "author_id")
            .map_err(|e| Error::MalformedRecord(format!("message {message_id}: {e}")))?;
        let created_at = raw.created_at.ok_or_else(|| {
            Error::MalformedRecord(format!("message {message_id}: missing created_at"))
        })?;

        let author_display_name = raw
            .author_display_name
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| author_id.clone());

        Ok(Self {
            channel_id: ChannelId(channel_id),
            channel_name: raw.channel_name.filter(|s| !s.trim().is_empty()),
            message_id: MessageId(message_id),
            author_id: AuthorId(author_id),
            author_display_name,
            created_at,
            content: raw.content.unwrap_or_default(),
            attachments: raw.attachments,
        })
    }

    pub fn key(&self) -> RecordKey {
        (self.channel_id.clone(), self.message_id.clone())
    }

    /// UTC calendar day the record belongs to (selects its log file).
    pub fn day(&self) -> NaiveDate {
        self.created_at.date_naive()
    }
}

fn required(v: Option<String>, field: &str) -> Result<String> {
    match v {
        Some(s) if !s.trim().is_empty() => Ok(s),
        _ => Err(Error::MalformedRecord(format!("missing {field}"))),
    }
}

/// Position of a written record, used as a paging bound.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CursorMark {
    pub message_id: MessageId,
    pub created_at: DateTime<Utc>,
}

/// Per-channel progress marker.
///
/// There is no cursor store: the cursor is rebuilt from the channel's own day
/// logs at the start of a run and advanced as pages are written.
#[derive(Clone, Debug)]
pub struct FetchCursor {
    pub since: DateTime<Utc>,
    oldest: Option<CursorMark>,
    newest: Option<CursorMark>,
    known: HashSet<MessageId>,
}

impl FetchCursor {
    /// No prior progress: fetch everything back to `since`.
    pub fn new(since: DateTime<Utc>) -> Self {
        Self {
            since,
            oldest: None,
            newest: None,
            known: HashSet::new(),
        }
    }

    pub fn from_records<'a>(
        since: DateTime<Utc>,
        records: impl IntoIterator<Item = &'a MessageRecord>,
    ) -> Self {
        let mut cursor = Self::new(since);
        for r in records {
            cursor.observe(r);
        }
        cursor
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.known.contains(id)
    }

    pub fn oldest(&self) -> Option<&CursorMark> {
        self.oldest.as_ref()
    }

    pub fn newest(&self) -> Option<&CursorMark> {
        self.newest.as_ref()
    }

    /// True once the written history reaches back to the `since` boundary.
    pub fn reached_since(&self) -> bool {
        self.oldest
            .as_ref()
            .is_some_and(|m| m.created_at <= self.since)
    }

    /// Record a freshly written page.
    pub fn advance(&mut self, written: &[MessageRecord]) {
        for r in written {
            self.observe(r);
        }
    }

    fn observe(&mut self, r: &MessageRecord) {
        self.known.insert(r.message_id.clone());
        let mark = || CursorMark {
            message_id: r.message_id.clone(),
            created_at: r.created_at,
        };
        if self
            .oldest
            .as_ref()
            .map_or(true, |m| r.created_at < m.created_at)
        {
            self.oldest = Some(mark());
        }
        if self
            .newest
            .as_ref()
            .map_or(true, |m| r.created_at > m.created_at)
        {
            self.newest = Some(mark());
        }
    }
}
