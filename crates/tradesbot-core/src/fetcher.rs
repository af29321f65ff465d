//! Paginated, resumable history ingestion.
//!
//! `HistoryPager` is the lazy page sequence for one channel; `Fetcher` drives
//! pagers, appends every accepted page to the day logs immediately and runs
//! channels through a bounded worker pool.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::{sync::Semaphore, task::JoinSet};

use crate::{
    config::FetchConfig,
    domain::{ChannelId, CursorMark, FetchCursor, MessageId, MessageRecord},
    ports::{MessageSource, ObjectStore},
    retry::{with_backoff, RetryPolicy},
    storage::DayLogWriter,
    utils::days_between,
    Result,
};

/// Why a pager stopped requesting pages.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// The last page reached back past `since`.
    ReachedSince,
    /// The last page was shorter than the page size.
    Exhausted,
    /// `max_pages` requests were made.
    PageLimit,
}

/// One normalized page, newest first as delivered.
#[derive(Clone, Debug, Default)]
pub struct Page {
    pub records: Vec<MessageRecord>,
    pub raw_len: usize,
    pub malformed: usize,
}

/// Lazy newest-to-oldest page sequence over one channel.
///
/// Restartable: a new pager built with the same `before` bound replays the
/// same (or a larger) sequence.
pub struct HistoryPager {
    source: Arc<dyn MessageSource>,
    channel_id: ChannelId,
    before: Option<MessageId>,
    since: DateTime<Utc>,
    page_size: usize,
    max_pages: usize,
    retry: RetryPolicy,
    requested: usize,
    stop: Option<StopReason>,
}

impl HistoryPager {
    pub fn new(
        source: Arc<dyn MessageSource>,
        channel_id: ChannelId,
        before: Option<MessageId>,
        since: DateTime<Utc>,
        cfg: &FetchConfig,
    ) -> Self {
        Self {
            source,
            channel_id,
            before,
            since,
            page_size: cfg.page_size.max(1),
            max_pages: cfg.max_pages,
            retry: cfg.retry,
            requested: 0,
            stop: None,
        }
    }

    /// Pages requested so far.
    pub fn requested(&self) -> usize {
        self.requested
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop
    }

    /// Fetch the next page, or `None` once a stop rule has fired.
    ///
    /// Transient errors are retried per the retry policy; the error that
    /// survives the policy is returned and the pager should be dropped.
    pub async fn next_page(&mut self) -> Result<Option<Page>> {
        if self.stop.is_some() {
            return Ok(None);
        }
        if self.requested >= self.max_pages {
            tracing::warn!(
                "channel {}: page limit ({}) reached before history boundary",
                self.channel_id,
                self.max_pages
            );
            self.stop = Some(StopReason::PageLimit);
            return Ok(None);
        }

        let raw = {
            let source = &self.source;
            let channel_id = &self.channel_id;
            let before = self.before.as_ref();
            let page_size = self.page_size;
            let label = format!("channel {channel_id} page {}", self.requested + 1);
            with_backoff(&self.retry, &label, || {
                source.list_messages_before(channel_id, before, page_size)
            })
            .await?
        };
        self.requested += 1;

        let raw_len = raw.len();
        let fallback_before = raw
            .last()
            .and_then(|m| m.message_id.clone())
            .map(MessageId);

        let mut page = Page {
            raw_len,
            ..Page::default()
        };
        for m in raw {
            match MessageRecord::try_from_raw(m) {
                Ok(r) => page.records.push(r),
                Err(e) => {
                    tracing::warn!("channel {}: skipping record: {e}", self.channel_id);
                    page.malformed += 1;
                }
            }
        }

        let oldest = oldest_mark(&page.records);
        if raw_len < self.page_size {
            self.stop = Some(StopReason::Exhausted);
        } else if oldest
            .as_ref()
            .is_some_and(|m| m.created_at < self.since)
        {
            self.stop = Some(StopReason::ReachedSince);
        }

        match oldest.map(|m| m.message_id).or(fallback_before) {
            Some(next) => self.before = Some(next),
            // Nothing to page from; a repeat request would loop.
            None => {
                self.stop.get_or_insert(StopReason::Exhausted);
            }
        }

        Ok(Some(page))
    }
}

fn oldest_mark(records: &[MessageRecord]) -> Option<CursorMark> {
    records
        .iter()
        .min_by(|a, b| a.created_at.cmp(&b.created_at))
        .map(|r| CursorMark {
            message_id: r.message_id.clone(),
            created_at: r.created_at,
        })
}

/// Counters for one channel run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelFetch {
    pub channel_id: ChannelId,
    pub pages: usize,
    pub written: usize,
    pub already_logged: usize,
    pub out_of_window: usize,
    pub malformed: usize,
    pub stop: Option<StopReason>,
}

impl ChannelFetch {
    fn new(channel_id: ChannelId) -> Self {
        Self {
            channel_id,
            pages: 0,
            written: 0,
            already_logged: 0,
            out_of_window: 0,
            malformed: 0,
            stop: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChannelOutcome {
    Completed,
    /// The channel was aborted; pages written before the failure are kept.
    Failed { error: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelReport {
    pub stats: ChannelFetch,
    pub outcome: ChannelOutcome,
}

impl ChannelReport {
    pub fn is_ok(&self) -> bool {
        self.outcome == ChannelOutcome::Completed
    }
}

#[derive(Clone)]
pub struct Fetcher {
    source: Arc<dyn MessageSource>,
    store: Arc<dyn ObjectStore>,
    cfg: FetchConfig,
}

impl Fetcher {
    pub fn new(source: Arc<dyn MessageSource>, store: Arc<dyn ObjectStore>, cfg: FetchConfig) -> Self {
        Self { source, store, cfg }
    }

    /// Lazy page sequence for a channel, starting below `before`.
    pub fn history(
        &self,
        channel_id: ChannelId,
        before: Option<MessageId>,
        since: DateTime<Utc>,
    ) -> HistoryPager {
        HistoryPager::new(self.source.clone(), channel_id, before, since, &self.cfg)
    }

    /// Fetch every configured channel through the bounded worker pool.
    ///
    /// Each configured id is first resolved into the channels that hold its
    /// history (a forum becomes its threads). One report per resolved
    /// channel, in configuration order. A failed channel never aborts its
    /// siblings.
    pub async fn fetch_all(&self, since: DateTime<Utc>, until: DateTime<Utc>) -> Vec<ChannelReport> {
        let mut ids: Vec<ChannelId> = Vec::new();
        let mut reports: Vec<Option<ChannelReport>> = Vec::new();
        for configured in &self.cfg.channel_ids {
            match self.resolve(configured, since).await {
                Ok(resolved) if resolved.is_empty() => {
                    tracing::info!("channel {configured}: nothing to fetch");
                    ids.push(configured.clone());
                    reports.push(Some(ChannelReport {
                        stats: ChannelFetch::new(configured.clone()),
                        outcome: ChannelOutcome::Completed,
                    }));
                }
                Ok(resolved) => {
                    for id in resolved {
                        ids.push(id);
                        reports.push(None);
                    }
                }
                Err(e) => {
                    tracing::error!("channel {configured}: cannot resolve: {e}");
                    ids.push(configured.clone());
                    reports.push(Some(ChannelReport {
                        stats: ChannelFetch::new(configured.clone()),
                        outcome: ChannelOutcome::Failed {
                            error: e.to_string(),
                        },
                    }));
                }
            }
        }

        let sem = Arc::new(Semaphore::new(self.cfg.concurrency.max(1)));
        let mut set = JoinSet::new();
        for (idx, channel_id) in ids.iter().cloned().enumerate() {
            if reports[idx].is_some() {
                continue;
            }
            let this = self.clone();
            let sem = sem.clone();
            set.spawn(async move {
                let _permit = sem.acquire_owned().await;
                (idx, this.fetch_channel_history(channel_id, since, until).await)
            });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((idx, report)) => reports[idx] = Some(report),
                Err(e) => tracing::error!("channel worker crashed: {e}"),
            }
        }

        reports
            .into_iter()
            .zip(ids)
            .map(|(report, channel_id)| {
                report.unwrap_or_else(|| ChannelReport {
                    stats: ChannelFetch::new(channel_id),
                    outcome: ChannelOutcome::Failed {
                        error: "worker crashed".to_string(),
                    },
                })
            })
            .collect()
    }

    async fn resolve(&self, channel_id: &ChannelId, since: DateTime<Utc>) -> Result<Vec<ChannelId>> {
        let resolved = with_backoff(&self.cfg.retry, &format!("resolve channel {channel_id}"), || {
            self.source.resolve_channels(channel_id, since)
        })
        .await?;
        if resolved.len() != 1 || &resolved[0] != channel_id {
            tracing::info!(
                "channel {channel_id}: expanded into {} channels",
                resolved.len()
            );
        }
        Ok(resolved)
    }

    /// Fetch one channel's history in `[since, until)` into its day logs.
    ///
    /// Resumes from what the logs already hold. Paging always walks down from
    /// the newest message to `since` in one unbroken sequence; already-logged
    /// records are skipped, so an earlier aborted run can leave no hole that a
    /// later run steps over.
    pub async fn fetch_channel_history(
        &self,
        channel_id: ChannelId,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> ChannelReport {
        let mut stats = ChannelFetch::new(channel_id.clone());
        let outcome = match self.run_channel(&channel_id, since, until, &mut stats).await {
            Ok(()) => {
                tracing::info!(
                    "channel {channel_id}: {} written, {} already logged, {} pages ({:?})",
                    stats.written,
                    stats.already_logged,
                    stats.pages,
                    stats.stop
                );
                ChannelOutcome::Completed
            }
            Err(e) => {
                tracing::error!(
                    "channel {channel_id}: aborted after {} pages ({} written): {e}",
                    stats.pages,
                    stats.written
                );
                ChannelOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };
        ChannelReport { stats, outcome }
    }

    async fn run_channel(
        &self,
        channel_id: &ChannelId,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        stats: &mut ChannelFetch,
    ) -> Result<()> {
        let writer = DayLogWriter::new(self.store.clone(), channel_id.clone());
        let days = days_between(since.date_naive(), until.date_naive());
        let existing = writer.read_existing(&days).await?;
        let mut cursor = FetchCursor::from_records(since, existing.iter());

        if let Some(oldest) = cursor.oldest() {
            tracing::info!(
                "channel {channel_id}: resuming with {} logged records (oldest {}, reaches since: {})",
                existing.len(),
                oldest.created_at,
                cursor.reached_since()
            );
        }

        let mut pager = self.history(channel_id.clone(), None, since);
        while let Some(page) = pager.next_page().await? {
            stats.pages += 1;
            stats.malformed += page.malformed;

            let mut accepted = Vec::with_capacity(page.records.len());
            for r in page.records {
                if cursor.contains(&r.message_id) {
                    stats.already_logged += 1;
                } else if r.created_at < since || r.created_at >= until {
                    stats.out_of_window += 1;
                } else {
                    accepted.push(r);
                }
            }

            if !accepted.is_empty() {
                stats.written += writer.append_page(&accepted).await?;
                cursor.advance(&accepted);
            }
            tracing::debug!(
                "channel {channel_id}: page {} -> {} accepted of {}",
                pager.requested(),
                accepted.len(),
                page.raw_len
            );
        }

        stats.stop = pager.stop_reason();
        Ok(())
    }
}
