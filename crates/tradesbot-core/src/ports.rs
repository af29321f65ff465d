//! Hexagonal ports for the external collaborators.
//!
//! Discord, GCS, Gemini and Notion live in adapter crates; the pipelines only
//! see these traits so they can run against in-process fakes.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::{
    domain::{ChannelId, MessageId, RawMessage},
    Result,
};

/// Paged access to a channel's message history.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Up to `limit` messages strictly older than `before` (newest first).
    /// `before = None` starts from the most recent message.
    async fn list_messages_before(
        &self,
        channel_id: &ChannelId,
        before: Option<&MessageId>,
        limit: usize,
    ) -> Result<Vec<RawMessage>>;

    /// The history-bearing channels behind a configured id.
    ///
    /// Most ids are their own history. Containers such as forums expand into
    /// the threads that may hold messages newer than `since`; each of those
    /// is fetched and logged as its own channel.
    async fn resolve_channels(
        &self,
        channel_id: &ChannelId,
        _since: DateTime<Utc>,
    ) -> Result<Vec<ChannelId>> {
        Ok(vec![channel_id.clone()])
    }
}

/// Durable blob storage with `/`-separated paths.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn write_blob(&self, path: &str, bytes: &[u8]) -> Result<()>;

    /// `Error::Storage` (or `Io` with `NotFound`) when the blob is missing.
    async fn read_blob(&self, path: &str) -> Result<Vec<u8>>;

    /// All blob paths starting with `prefix`, sorted.
    async fn list_blobs(&self, prefix: &str) -> Result<Vec<String>>;

    /// Append to a blob, creating it when missing.
    ///
    /// Stores without native append fall back to read-concat-write, which is
    /// only safe with a single writer per path.
    async fn append_blob(&self, path: &str, bytes: &[u8]) -> Result<()> {
        let mut existing = match self.read_blob(path).await {
            Ok(v) => v,
            Err(e) if is_not_found(&e) => Vec::new(),
            Err(e) => return Err(e),
        };
        existing.extend_from_slice(bytes);
        self.write_blob(path, &existing).await
    }
}

/// Whether a store error means "no such blob".
pub fn is_not_found(err: &crate::Error) -> bool {
    match err {
        crate::Error::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
        crate::Error::MissingOrCorruptLog { .. } => true,
        _ => false,
    }
}

/// External text-generation service.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn model_name(&self) -> &str;

    /// Run one prompt and return the raw response text.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Typed scalar properties of a workspace-database page.
#[derive(Clone, Debug, PartialEq)]
pub struct PageProperties {
    pub title: String,
    pub date: NaiveDate,
    pub total_messages: u64,
    pub unique_authors: u64,
    pub top_tickers: Vec<String>,
    pub ai_analysis: bool,
}

/// A rich-text body section: heading, paragraphs, then bullets.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BodySection {
    pub heading: String,
    pub level: u8,
    pub paragraphs: Vec<String>,
    pub bullets: Vec<String>,
}

/// Optional workspace database (Notion) receiving each summary as a page.
#[async_trait]
pub trait WorkspacePublisher: Send + Sync {
    /// Returns the created page id.
    async fn create_page(
        &self,
        properties: &PageProperties,
        sections: &[BodySection],
    ) -> Result<String>;
}
