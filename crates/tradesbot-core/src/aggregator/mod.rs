//! Daily aggregation: merge a day's logs, compute statistics, optionally
//! analyze, then store and publish the `DailySummary`.

pub mod analysis;
pub mod merge;
pub mod publish;
pub mod render;
pub mod summary;
pub mod tickers;

use std::sync::Arc;

use chrono::{NaiveDate, Utc};

use crate::{
    config::AggregateConfig,
    errors::Error,
    ports::{ObjectStore, TextGenerator, WorkspacePublisher},
    storage::{self, SummaryFormat},
    Result,
};

pub use analysis::{AiAnalysis, Analyzer, Conviction, InsightStatus, Sentiment, TickerInsight};
pub use merge::{load_day, DayLoad, LogIssue};
pub use summary::DailySummary;
pub use tickers::{extract_tickers, DayStats, TickerExtractor, TickerStats};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SummarizeOptions {
    pub use_ai: bool,
    pub publish: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreLocation {
    Primary,
    Fallback,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredSummary {
    pub location: StoreLocation,
    pub paths: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PublishStatus {
    NotRequested,
    NotConfigured,
    Published { page_id: String },
    Failed { reason: String },
}

/// Why a run that asked for AI ended up stats-only, if it did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AiStatus {
    Disabled,
    NotConfigured,
    Ran,
}

/// Outcome of one `summarize` run.
#[derive(Clone, Debug)]
pub struct SummaryRun {
    pub summary: DailySummary,
    pub logs_read: usize,
    pub duplicates: usize,
    pub malformed_lines: usize,
    pub ai: AiStatus,
    pub stored: StoredSummary,
    pub publish: PublishStatus,
}

pub struct Aggregator {
    store: Arc<dyn ObjectStore>,
    fallback: Option<Arc<dyn ObjectStore>>,
    analyzer: Option<Analyzer>,
    publisher: Option<Arc<dyn WorkspacePublisher>>,
    extractor: TickerExtractor,
    cfg: AggregateConfig,
}

impl Aggregator {
    pub fn new(store: Arc<dyn ObjectStore>, cfg: AggregateConfig) -> Self {
        Self {
            store,
            fallback: None,
            analyzer: None,
            publisher: None,
            extractor: TickerExtractor::new(&cfg.ticker_denylist),
            cfg,
        }
    }

    /// Store used when writing the summary to the primary store fails.
    pub fn with_fallback(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.fallback = Some(store);
        self
    }

    pub fn with_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.analyzer = Some(Analyzer::new(generator, self.cfg.clone()));
        self
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn WorkspacePublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Most recent date with at least one day log.
    pub async fn latest_date(&self) -> Result<Option<NaiveDate>> {
        Ok(storage::list_available_dates(self.store.as_ref())
            .await?
            .last()
            .copied())
    }

    /// Build the summary for `date` without storing it.
    pub async fn build_summary(
        &self,
        date: NaiveDate,
        use_ai: bool,
    ) -> Result<(DailySummary, DayLoad, AiStatus)> {
        let load = load_day(self.store.as_ref(), date).await?;
        let stats = tickers::compute_stats(&load.records, &self.extractor, &self.cfg);

        let (analysis, ai) = match (use_ai, &self.analyzer) {
            (false, _) => (None, AiStatus::Disabled),
            (true, None) => {
                tracing::warn!("AI analysis requested but no text generator is configured");
                (None, AiStatus::NotConfigured)
            }
            (true, Some(analyzer)) => {
                let a = analyzer.analyze(&stats, &load.records).await;
                tracing::info!(
                    "{date}: analyzed {}/{} tickers with {}",
                    a.analyzed_count(),
                    a.tickers.len(),
                    a.model
                );
                (Some(a), AiStatus::Ran)
            }
        };

        let mut summary = DailySummary::new(date, Utc::now(), stats, analysis);
        summary.skipped_logs = load.issues.clone();
        Ok((summary, load, ai))
    }

    /// Build, store and optionally publish the summary for `date`.
    pub async fn summarize_day(&self, date: NaiveDate, opts: SummarizeOptions) -> Result<SummaryRun> {
        let (summary, load, ai) = self.build_summary(date, opts.use_ai).await?;
        let stored = self.store_summary(&summary).await?;
        let publish = if opts.publish {
            self.publish(&summary).await
        } else {
            PublishStatus::NotRequested
        };

        Ok(SummaryRun {
            summary,
            logs_read: load.logs_read,
            duplicates: load.duplicates,
            malformed_lines: load.malformed_lines,
            ai,
            stored,
            publish,
        })
    }

    /// Write all formats to the primary store, falling back as a whole to
    /// the fallback store. Failing both is fatal.
    pub async fn store_summary(&self, summary: &DailySummary) -> Result<StoredSummary> {
        let rendered = [
            (SummaryFormat::Json, summary.to_json()?),
            (SummaryFormat::Markdown, render::render_markdown(summary)),
            (SummaryFormat::Text, render::render_text(summary)),
        ];

        let primary_err = match write_all(self.store.as_ref(), summary.date, &rendered).await {
            Ok(paths) => {
                tracing::info!("stored summary for {} ({} files)", summary.date, paths.len());
                return Ok(StoredSummary {
                    location: StoreLocation::Primary,
                    paths,
                });
            }
            Err(e) => e,
        };
        tracing::warn!(
            "storing summary for {} failed: {primary_err}; trying fallback",
            summary.date
        );

        let Some(fallback) = &self.fallback else {
            return Err(Error::Storage(format!(
                "summary for {} not stored: {primary_err} (no fallback configured)",
                summary.date
            )));
        };
        match write_all(fallback.as_ref(), summary.date, &rendered).await {
            Ok(paths) => {
                tracing::warn!("summary for {} stored in fallback location", summary.date);
                Ok(StoredSummary {
                    location: StoreLocation::Fallback,
                    paths,
                })
            }
            Err(e) => Err(Error::Storage(format!(
                "summary for {} not stored: primary: {primary_err}; fallback: {e}",
                summary.date
            ))),
        }
    }

    async fn publish(&self, summary: &DailySummary) -> PublishStatus {
        let Some(publisher) = &self.publisher else {
            return PublishStatus::NotConfigured;
        };
        let properties = publish::page_properties(summary);
        let sections = publish::body_sections(summary);
        match publisher.create_page(&properties, &sections).await {
            Ok(page_id) => {
                tracing::info!("published summary for {} as page {page_id}", summary.date);
                PublishStatus::Published { page_id }
            }
            Err(e) => {
                tracing::warn!("publishing summary for {} failed: {e}", summary.date);
                PublishStatus::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}

async fn write_all(
    store: &dyn ObjectStore,
    date: NaiveDate,
    rendered: &[(SummaryFormat, String)],
) -> Result<Vec<String>> {
    let mut paths = Vec::with_capacity(rendered.len());
    for (format, body) in rendered {
        let path = storage::summary_path(date, *format);
        store.write_blob(&path, body.as_bytes()).await?;
        paths.push(path);
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{AuthorId, ChannelId, MessageId, MessageRecord},
        ports::{BodySection, PageProperties},
        storage::{encode_jsonl, MemoryObjectStore},
    };
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::Mutex;

    fn rec(channel: &str, id: &str, author: &str, hour: u32, content: &str) -> MessageRecord {
        MessageRecord {
            channel_id: ChannelId(channel.into()),
            channel_name: None,
            message_id: MessageId(id.into()),
            author_id: AuthorId(author.into()),
            author_display_name: author.to_uppercase(),
            created_at: Utc.with_ymd_and_hms(2025, 9, 20, hour, 0, 0).unwrap(),
            content: content.into(),
            attachments: vec![],
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, 20).unwrap()
    }

    /// Channel A: X twice on $NVDA two hours apart, Y on $TSLA.
    /// Channel B: X on $NVDA.
    fn seeded_store() -> Arc<MemoryObjectStore> {
        let store = Arc::new(MemoryObjectStore::new());
        store.insert(
            "2025-09-20/a.jsonl",
            encode_jsonl(&[
                rec("a", "1", "x", 13, "$NVDA bullish"),
                rec("a", "2", "y", 14, "$TSLA"),
                rec("a", "3", "x", 15, "$NVDA bullish"),
            ])
            .unwrap(),
        );
        store.insert(
            "2025-09-20/b.jsonl",
            encode_jsonl(&[rec("b", "4", "x", 16, "$NVDA")]).unwrap(),
        );
        store
    }

    struct FakeGenerator;

    #[async_trait]
    impl TextGenerator for FakeGenerator {
        fn model_name(&self) -> &str {
            "fake-model"
        }

        async fn generate(&self, prompt: &str) -> Result<String> {
            if prompt.contains("executive_summary") {
                return Ok(r#"{"executive_summary":"NVDA led the day.","key_themes":["chips"],"notable_insights":[]}"#.into());
            }
            if prompt.contains("discussion of $NVDA ") {
                return Ok(r#"```json
{"sentiment":"BULLISH","conviction":"MEDIUM","themes":["breakout"],"risks":[]}
```"#
                    .into());
            }
            Err(Error::External("upstream 500".into()))
        }
    }

    /// Reads from an inner store; every write fails.
    struct ReadOnlyStore(Arc<MemoryObjectStore>);

    #[async_trait]
    impl ObjectStore for ReadOnlyStore {
        async fn write_blob(&self, path: &str, _bytes: &[u8]) -> Result<()> {
            Err(Error::Storage(format!("{path}: permission denied")))
        }

        async fn read_blob(&self, path: &str) -> Result<Vec<u8>> {
            self.0.read_blob(path).await
        }

        async fn list_blobs(&self, prefix: &str) -> Result<Vec<String>> {
            self.0.list_blobs(prefix).await
        }
    }

    #[derive(Default)]
    struct FakePublisher {
        fail: bool,
        pages: Mutex<Vec<(PageProperties, usize)>>,
    }

    #[async_trait]
    impl WorkspacePublisher for FakePublisher {
        async fn create_page(
            &self,
            properties: &PageProperties,
            sections: &[BodySection],
        ) -> Result<String> {
            if self.fail {
                return Err(Error::Publish("401 unauthorized".into()));
            }
            self.pages
                .lock()
                .unwrap()
                .push((properties.clone(), sections.len()));
            Ok("page-1".into())
        }
    }

    #[tokio::test]
    async fn two_channel_day_end_to_end() {
        let store = seeded_store();
        let publisher = Arc::new(FakePublisher::default());
        let agg = Aggregator::new(store.clone(), AggregateConfig::default())
            .with_generator(Arc::new(FakeGenerator))
            .with_publisher(publisher.clone());

        let run = agg
            .summarize_day(date(), SummarizeOptions { use_ai: true, publish: true })
            .await
            .unwrap();

        let s = &run.summary;
        assert_eq!(s.stats.total_messages, 4);
        assert_eq!(s.stats.unique_authors, 2);
        assert_eq!(s.stats.channel_count, 2);
        let counts: Vec<_> = s
            .stats
            .tickers
            .iter()
            .map(|t| (t.symbol.as_str(), t.mention_count))
            .collect();
        assert_eq!(counts, vec![("NVDA", 3), ("TSLA", 1)]);

        let ai = s.analysis.as_ref().unwrap();
        assert_eq!(ai.executive_summary.as_deref(), Some("NVDA led the day."));
        assert!(ai.insight("NVDA").unwrap().analysis().is_some());
        assert!(matches!(
            ai.insight("TSLA").unwrap().status,
            InsightStatus::StatsOnly { .. }
        ));
        assert_eq!(ai.watchlist, vec!["NVDA", "TSLA"]);

        assert_eq!(run.ai, AiStatus::Ran);
        assert_eq!(run.stored.location, StoreLocation::Primary);
        assert_eq!(
            store.paths().iter().filter(|p| p.starts_with("summaries/")).count(),
            3
        );
        let stored = String::from_utf8(store.get("summaries/2025-09-20.json").unwrap()).unwrap();
        assert_eq!(&DailySummary::from_json(&stored).unwrap(), s);

        assert_eq!(run.publish, PublishStatus::Published { page_id: "page-1".into() });
        let pages = publisher.pages.lock().unwrap();
        assert_eq!(pages[0].0.top_tickers, vec!["NVDA", "TSLA"]);
        assert!(pages[0].0.ai_analysis);
    }

    #[tokio::test]
    async fn rerun_is_stable_apart_from_timestamp() {
        let agg = Aggregator::new(seeded_store(), AggregateConfig::default());
        let (first, _, _) = agg.build_summary(date(), false).await.unwrap();
        let (second, _, ai) = agg.build_summary(date(), false).await.unwrap();
        assert_eq!(first.stats, second.stats);
        assert!(first.analysis.is_none());
        assert_eq!(ai, AiStatus::Disabled);
    }

    #[tokio::test]
    async fn duplicate_log_lines_do_not_change_counts() {
        let store = seeded_store();
        let extra = encode_jsonl(&[rec("a", "1", "x", 13, "$NVDA bullish")]).unwrap();
        store.append_blob("2025-09-20/a.jsonl", &extra).await.unwrap();

        let agg = Aggregator::new(store, AggregateConfig::default());
        let (s, load, _) = agg.build_summary(date(), false).await.unwrap();
        assert_eq!(load.duplicates, 1);
        assert_eq!(s.stats.total_messages, 4);
        assert_eq!(s.ticker("NVDA").unwrap().mention_count, 3);
    }

    #[tokio::test]
    async fn empty_day_still_writes_a_summary() {
        let store = Arc::new(MemoryObjectStore::new());
        let agg = Aggregator::new(store.clone(), AggregateConfig::default())
            .with_generator(Arc::new(FakeGenerator));
        let run = agg
            .summarize_day(date(), SummarizeOptions { use_ai: true, publish: false })
            .await
            .unwrap();
        assert!(run.summary.is_empty());
        assert!(run.summary.stats.tickers.is_empty());
        assert_eq!(run.publish, PublishStatus::NotRequested);
        assert!(store.get("summaries/2025-09-20.md").is_some());
    }

    #[tokio::test]
    async fn ai_without_generator_is_stats_only() {
        let agg = Aggregator::new(seeded_store(), AggregateConfig::default());
        let (s, _, ai) = agg.build_summary(date(), true).await.unwrap();
        assert!(s.analysis.is_none());
        assert_eq!(ai, AiStatus::NotConfigured);
    }

    #[tokio::test]
    async fn primary_write_failure_uses_fallback() {
        let primary = Arc::new(ReadOnlyStore(seeded_store()));
        let fallback = Arc::new(MemoryObjectStore::new());
        let agg = Aggregator::new(primary, AggregateConfig::default()).with_fallback(fallback.clone());

        let run = agg
            .summarize_day(date(), SummarizeOptions::default())
            .await
            .unwrap();
        assert_eq!(run.stored.location, StoreLocation::Fallback);
        assert_eq!(run.summary.stats.total_messages, 4);
        assert_eq!(fallback.paths().len(), 3);
    }

    #[tokio::test]
    async fn both_stores_failing_is_fatal() {
        let primary = Arc::new(ReadOnlyStore(seeded_store()));
        let fallback = Arc::new(ReadOnlyStore(Arc::new(MemoryObjectStore::new())));
        let agg = Aggregator::new(primary, AggregateConfig::default()).with_fallback(fallback);

        let err = agg
            .summarize_day(date(), SummarizeOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }

    #[tokio::test]
    async fn publish_failure_does_not_fail_the_run() {
        let publisher = Arc::new(FakePublisher {
            fail: true,
            ..FakePublisher::default()
        });
        let agg = Aggregator::new(seeded_store(), AggregateConfig::default()).with_publisher(publisher);
        let run = agg
            .summarize_day(date(), SummarizeOptions { use_ai: false, publish: true })
            .await
            .unwrap();
        assert!(matches!(run.publish, PublishStatus::Failed { .. }));
    }

    #[tokio::test]
    async fn latest_date_picks_most_recent_log() {
        let store = seeded_store();
        store.insert("2025-09-18/a.jsonl", Vec::new());
        store.insert("summaries/2025-09-30.json", b"{}".to_vec());
        let agg = Aggregator::new(store, AggregateConfig::default());
        assert_eq!(agg.latest_date().await.unwrap(), Some(date()));
    }
}
