//! Discord adapter (REST v10, bot token).
//!
//! Implements the `tradesbot-core` `MessageSource` port. Discord payloads are
//! mapped into `RawMessage` here and never leave this crate. Forum channels
//! resolve into their active and archived public threads.

use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Deserialize};

use tradesbot_core::{
    domain::{ChannelId, MessageId, RawMessage},
    errors::Error,
    ports::MessageSource,
    Result,
};

pub const DEFAULT_BASE_URL: &str = "https://discord.com/api/v10";

/// Longest server-requested pause honored before reporting a rate limit.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(30);

/// Safety bound on archived-thread listing per forum.
const MAX_ARCHIVE_PAGES: usize = 20;

#[derive(Debug, Deserialize)]
pub struct DiscordUser {
    pub id: Option<String>,
    pub username: Option<String>,
    pub global_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DiscordAttachment {
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DiscordMessage {
    pub id: Option<String>,
    pub channel_id: Option<String>,
    pub author: Option<DiscordUser>,
    pub content: Option<String>,
    pub timestamp: Option<String>,
    #[serde(default)]
    pub attachments: Vec<DiscordAttachment>,
}

#[derive(Debug, Deserialize)]
struct DiscordChannel {
    id: Option<String>,
    #[serde(rename = "type")]
    kind: Option<u8>,
    name: Option<String>,
    guild_id: Option<String>,
    parent_id: Option<String>,
    thread_metadata: Option<ThreadMetadata>,
}

#[derive(Debug, Deserialize)]
struct ThreadMetadata {
    archive_timestamp: Option<String>,
}

impl DiscordChannel {
    fn archived_at(&self) -> Option<DateTime<Utc>> {
        self.thread_metadata
            .as_ref()
            .and_then(|m| m.archive_timestamp.as_deref())
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&Utc))
    }
}

#[derive(Debug, Deserialize)]
struct ThreadList {
    #[serde(default)]
    threads: Vec<DiscordChannel>,
    #[serde(default)]
    has_more: bool,
}

/// How a channel's history is reached.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ChannelKind {
    /// Messages are read from the channel itself.
    History,
    /// Messages live in threads under the channel.
    Forum,
    Unsupported(u8),
}

fn channel_kind(kind: Option<u8>) -> ChannelKind {
    match kind {
        // text, dm, voice, group dm, announcement, threads, stage
        None | Some(0 | 1 | 2 | 3 | 5 | 10 | 11 | 12 | 13) => ChannelKind::History,
        // forum, media
        Some(15 | 16) => ChannelKind::Forum,
        Some(k) => ChannelKind::Unsupported(k),
    }
}

/// Keep threads of `forum_id` that may hold messages at or after `since`.
///
/// Archived threads arrive newest-archived first, so the second value is true
/// once a thread archived before `since` was seen and older pages can be skipped.
fn select_threads(
    forum_id: &str,
    since: DateTime<Utc>,
    threads: Vec<DiscordChannel>,
) -> (Vec<DiscordChannel>, bool) {
    let mut reached_since = false;
    let mut kept = Vec::new();
    for t in threads {
        if t.parent_id.as_deref().is_some_and(|p| p != forum_id) {
            continue;
        }
        match t.archived_at() {
            Some(at) if at < since => reached_since = true,
            _ => kept.push(t),
        }
    }
    (kept, reached_since)
}

#[derive(Debug, Deserialize)]
struct RateLimited {
    retry_after: Option<f64>,
}

/// Map one Discord message to the adapter-neutral shape.
///
/// Unparseable timestamps become `None` and are rejected by core validation.
pub fn map_message(
    channel_id: &ChannelId,
    channel_name: Option<&str>,
    msg: DiscordMessage,
) -> RawMessage {
    let (author_id, author_display_name) = match msg.author {
        Some(a) => (a.id, a.global_name.or(a.username)),
        None => (None, None),
    };
    RawMessage {
        channel_id: msg.channel_id.or_else(|| Some(channel_id.0.clone())),
        channel_name: channel_name.map(str::to_string),
        message_id: msg.id,
        author_id,
        author_display_name,
        created_at: msg
            .timestamp
            .as_deref()
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&Utc)),
        content: msg.content,
        attachments: msg.attachments.into_iter().filter_map(|a| a.url).collect(),
    }
}

/// Classify a non-success status: rate limits and server errors are
/// transient, everything else is permanent for the channel.
pub fn status_error(channel_id: &ChannelId, status: StatusCode, body: &str) -> Error {
    let reason = format!(
        "discord {status}: {}",
        body.chars().take(200).collect::<String>()
    );
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        Error::TransientFetch {
            channel: channel_id.0.clone(),
            reason,
        }
    } else {
        Error::Fetch {
            channel: channel_id.0.clone(),
            reason,
        }
    }
}

pub struct DiscordSource {
    token: String,
    base_url: String,
    http: reqwest::Client,
    channel_names: Mutex<HashMap<ChannelId, Option<String>>>,
}

impl DiscordSource {
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_base_url(token, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(token: impl Into<String>, base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("DiscordBot (tradesbot, 0.1)")
            .build()
            .expect("reqwest client build");
        Self {
            token: token.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            channel_names: Mutex::new(HashMap::new()),
        }
    }

    fn auth(&self) -> String {
        format!("Bot {}", self.token)
    }

    fn remember_name(&self, channel_id: &ChannelId, name: Option<String>) {
        if let Ok(mut m) = self.channel_names.lock() {
            m.insert(channel_id.clone(), name);
        }
    }

    /// GET a JSON resource on behalf of `channel_id`.
    ///
    /// A 429 waits out the server's `retry_after` (capped) before the
    /// transient error is returned to the retry loop.
    async fn get_json<T: DeserializeOwned>(
        &self,
        channel_id: &ChannelId,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let resp = self
            .http
            .get(url)
            .header(reqwest::header::AUTHORIZATION, self.auth())
            .query(query)
            .send()
            .await
            .map_err(|e| Error::TransientFetch {
                channel: channel_id.0.clone(),
                reason: format!("discord request error: {e}"),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            if status == StatusCode::TOO_MANY_REQUESTS {
                if let Some(secs) = serde_json::from_str::<RateLimited>(&body)
                    .ok()
                    .and_then(|r| r.retry_after)
                    .filter(|s| s.is_finite() && *s > 0.0)
                {
                    let wait = Duration::from_secs_f64(secs).min(MAX_RETRY_AFTER);
                    tracing::warn!("channel {channel_id}: rate limited, waiting {wait:?}");
                    tokio::time::sleep(wait).await;
                }
            }
            return Err(status_error(channel_id, status, &body));
        }

        resp.json().await.map_err(|e| Error::TransientFetch {
            channel: channel_id.0.clone(),
            reason: format!("discord json error: {e}"),
        })
    }

    async fn channel(&self, channel_id: &ChannelId) -> Result<DiscordChannel> {
        let url = format!("{}/channels/{}", self.base_url, channel_id.0);
        self.get_json(channel_id, &url, &[]).await
    }

    /// Channel name, looked up once per channel. Lookup failures are not fatal.
    async fn channel_name(&self, channel_id: &ChannelId) -> Option<String> {
        let cached = self
            .channel_names
            .lock()
            .ok()
            .and_then(|m| m.get(channel_id).cloned());
        if let Some(name) = cached {
            return name;
        }

        let name = match self.channel(channel_id).await {
            Ok(c) => c.name,
            Err(e) => {
                tracing::debug!("channel {channel_id}: name lookup failed: {e}");
                None
            }
        };
        self.remember_name(channel_id, name.clone());
        name
    }

    /// Active threads of the forum plus archived public threads not archived
    /// before `since`.
    async fn forum_threads(
        &self,
        forum_id: &ChannelId,
        forum: &DiscordChannel,
        since: DateTime<Utc>,
    ) -> Result<Vec<DiscordChannel>> {
        let mut threads = Vec::new();

        match &forum.guild_id {
            Some(guild_id) => {
                let url = format!("{}/guilds/{guild_id}/threads/active", self.base_url);
                let active: ThreadList = self.get_json(forum_id, &url, &[]).await?;
                threads.extend(select_threads(&forum_id.0, since, active.threads).0);
            }
            None => tracing::warn!("forum {forum_id}: no guild id, skipping active threads"),
        }

        let url = format!(
            "{}/channels/{}/threads/archived/public",
            self.base_url, forum_id.0
        );
        let mut before: Option<String> = None;
        for _ in 0..MAX_ARCHIVE_PAGES {
            let mut query = vec![("limit", "100".to_string())];
            if let Some(b) = &before {
                query.push(("before", b.clone()));
            }
            let page: ThreadList = self.get_json(forum_id, &url, &query).await?;
            let next = page
                .threads
                .last()
                .and_then(|t| t.thread_metadata.as_ref())
                .and_then(|m| m.archive_timestamp.clone());
            let has_more = page.has_more;
            let (kept, reached_since) = select_threads(&forum_id.0, since, page.threads);
            threads.extend(kept);

            match next {
                Some(ts) if has_more && !reached_since && before.as_ref() != Some(&ts) => {
                    before = Some(ts)
                }
                _ => break,
            }
        }
        Ok(threads)
    }
}

#[async_trait]
impl MessageSource for DiscordSource {
    async fn list_messages_before(
        &self,
        channel_id: &ChannelId,
        before: Option<&MessageId>,
        limit: usize,
    ) -> Result<Vec<RawMessage>> {
        let channel_name = self.channel_name(channel_id).await;

        let url = format!("{}/channels/{}/messages", self.base_url, channel_id.0);
        let mut query = vec![("limit", limit.clamp(1, 100).to_string())];
        if let Some(b) = before {
            query.push(("before", b.0.clone()));
        }
        let messages: Vec<DiscordMessage> = self.get_json(channel_id, &url, &query).await?;

        tracing::debug!(
            "channel {channel_id}: {} messages before {:?}",
            messages.len(),
            before.map(|b| b.0.as_str())
        );
        Ok(messages
            .into_iter()
            .map(|m| map_message(channel_id, channel_name.as_deref(), m))
            .collect())
    }

    async fn resolve_channels(
        &self,
        channel_id: &ChannelId,
        since: DateTime<Utc>,
    ) -> Result<Vec<ChannelId>> {
        let channel = self.channel(channel_id).await?;
        self.remember_name(channel_id, channel.name.clone());

        match channel_kind(channel.kind) {
            ChannelKind::History => Ok(vec![channel_id.clone()]),
            ChannelKind::Unsupported(k) => Err(Error::Fetch {
                channel: channel_id.0.clone(),
                reason: format!("unsupported channel type {k}"),
            }),
            ChannelKind::Forum => {
                let threads = self.forum_threads(channel_id, &channel, since).await?;
                let mut seen = HashSet::new();
                let mut ids = Vec::new();
                for t in threads {
                    let Some(id) = t.id else { continue };
                    let id = ChannelId(id);
                    if seen.insert(id.clone()) {
                        self.remember_name(&id, t.name);
                        ids.push(id);
                    }
                }
                tracing::info!("forum {channel_id}: {} threads to fetch", ids.len());
                Ok(ids)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tradesbot_core::domain::MessageRecord;

    const PAGE: &str = r#"[
        {
            "id": "1287",
            "channel_id": "42",
            "author": {"id": "7", "username": "trader", "global_name": "Trader Joe"},
            "content": "$NVDA looks good",
            "timestamp": "2025-09-20T14:03:11.123000+00:00",
            "attachments": [{"url": "https://cdn.example/a.png"}]
        },
        {
            "id": "1286",
            "author": {"id": "8", "username": "quiet", "global_name": null},
            "content": "",
            "timestamp": "not a time"
        }
    ]"#;

    #[test]
    fn maps_discord_payload() {
        let page: Vec<DiscordMessage> = serde_json::from_str(PAGE).unwrap();
        let channel = ChannelId("42".into());
        let raw: Vec<RawMessage> = page
            .into_iter()
            .map(|m| map_message(&channel, Some("stocks"), m))
            .collect();

        let first = MessageRecord::try_from_raw(raw[0].clone()).unwrap();
        assert_eq!(first.author_display_name, "Trader Joe");
        assert_eq!(first.channel_name.as_deref(), Some("stocks"));
        assert_eq!(first.attachments, vec!["https://cdn.example/a.png"]);
        assert_eq!(first.created_at.to_rfc3339(), "2025-09-20T14:03:11.123+00:00");

        assert_eq!(raw[1].channel_id.as_deref(), Some("42"));
        assert_eq!(raw[1].author_display_name.as_deref(), Some("quiet"));
        assert!(matches!(
            MessageRecord::try_from_raw(raw[1].clone()),
            Err(Error::MalformedRecord(_))
        ));
    }

    #[test]
    fn status_classification() {
        let c = ChannelId("42".into());
        assert!(status_error(&c, StatusCode::TOO_MANY_REQUESTS, "").is_transient());
        assert!(status_error(&c, StatusCode::BAD_GATEWAY, "").is_transient());
        let forbidden = status_error(&c, StatusCode::FORBIDDEN, r#"{"message":"Missing Access"}"#);
        assert!(!forbidden.is_transient());
        assert!(forbidden.to_string().contains("Missing Access"));
        assert!(!status_error(&c, StatusCode::NOT_FOUND, "").is_transient());
    }

    const ARCHIVED: &str = r#"{
        "threads": [
            {"id": "901", "type": 11, "name": "NVDA earnings", "parent_id": "77",
             "thread_metadata": {"archived": true, "archive_timestamp": "2025-09-20T18:00:00+00:00"}},
            {"id": "902", "type": 11, "name": "other forum", "parent_id": "78",
             "thread_metadata": {"archived": true, "archive_timestamp": "2025-09-20T12:00:00+00:00"}},
            {"id": "903", "type": 11, "name": "old idea", "parent_id": "77",
             "thread_metadata": {"archived": true, "archive_timestamp": "2025-09-18T09:00:00+00:00"}}
        ],
        "members": [],
        "has_more": true
    }"#;

    #[test]
    fn channel_types_decide_how_history_is_read() {
        assert_eq!(channel_kind(Some(0)), ChannelKind::History);
        assert_eq!(channel_kind(Some(11)), ChannelKind::History);
        assert_eq!(channel_kind(None), ChannelKind::History);
        assert_eq!(channel_kind(Some(15)), ChannelKind::Forum);
        assert_eq!(channel_kind(Some(4)), ChannelKind::Unsupported(4));

        let forum: DiscordChannel =
            serde_json::from_str(r#"{"id":"77","type":15,"name":"ideas","guild_id":"1"}"#).unwrap();
        assert_eq!(channel_kind(forum.kind), ChannelKind::Forum);
        assert_eq!(forum.guild_id.as_deref(), Some("1"));
    }

    #[test]
    fn archived_threads_stop_at_since() {
        let page: ThreadList = serde_json::from_str(ARCHIVED).unwrap();
        assert!(page.has_more);
        let since = DateTime::parse_from_rfc3339("2025-09-20T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        let (kept, reached_since) = select_threads("77", since, page.threads);
        let ids: Vec<_> = kept.iter().filter_map(|t| t.id.as_deref()).collect();
        assert_eq!(ids, vec!["901"]);
        assert!(reached_since);
    }

    #[test]
    fn active_threads_without_archive_time_are_kept() {
        let active: ThreadList = serde_json::from_str(
            r#"{"threads":[{"id":"950","type":11,"parent_id":"77","thread_metadata":{"archived":false}}]}"#,
        )
        .unwrap();
        let (kept, reached_since) = select_threads("77", Utc::now(), active.threads);
        assert_eq!(kept.len(), 1);
        assert!(!reached_since);
        assert!(!active.has_more);
    }
}
