//! Blob layout and the append-only day logs.
//!
//! Layout:
//! - `{date}/{channel_id}.jsonl`: one `MessageRecord` per line
//! - `summaries/{date}.{json,md,txt}`: aggregation output

pub mod fs;
pub mod memory;

use std::{collections::BTreeMap, sync::Arc};

use chrono::NaiveDate;

use crate::{
    domain::{ChannelId, MessageRecord},
    ports::{is_not_found, ObjectStore},
    Result,
};

pub use fs::FsObjectStore;
pub use memory::MemoryObjectStore;

pub const LOG_EXTENSION: &str = ".jsonl";
pub const SUMMARY_PREFIX: &str = "summaries/";

pub fn day_prefix(date: NaiveDate) -> String {
    format!("{}/", date.format("%Y-%m-%d"))
}

pub fn day_log_path(date: NaiveDate, channel_id: &ChannelId) -> String {
    format!("{}{}{LOG_EXTENSION}", day_prefix(date), channel_id.0)
}

/// Output formats of a daily summary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SummaryFormat {
    Json,
    Markdown,
    Text,
}

impl SummaryFormat {
    pub const ALL: [SummaryFormat; 3] = [Self::Json, Self::Markdown, Self::Text];

    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Markdown => "md",
            Self::Text => "txt",
        }
    }
}

pub fn summary_path(date: NaiveDate, format: SummaryFormat) -> String {
    format!(
        "{SUMMARY_PREFIX}{}.{}",
        date.format("%Y-%m-%d"),
        format.extension()
    )
}

/// Date of a day-log path (`2025-09-20/123.jsonl`), if it is one.
pub fn log_path_date(path: &str) -> Option<NaiveDate> {
    let (day, file) = path.split_once('/')?;
    if !file.ends_with(LOG_EXTENSION) || file.contains('/') {
        return None;
    }
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

/// Every date with at least one day log, ascending.
pub async fn list_available_dates(store: &dyn ObjectStore) -> Result<Vec<NaiveDate>> {
    let mut dates: Vec<NaiveDate> = store
        .list_blobs("")
        .await?
        .iter()
        .filter_map(|p| log_path_date(p))
        .collect();
    dates.sort();
    dates.dedup();
    Ok(dates)
}

/// Serialize records as newline-delimited JSON.
pub fn encode_jsonl(records: &[MessageRecord]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for r in records {
        serde_json::to_writer(&mut out, r)?;
        out.push(b'\n');
    }
    Ok(out)
}

/// Parsed content of one log blob.
#[derive(Debug, Default)]
pub struct DecodedLog {
    pub records: Vec<MessageRecord>,
    pub malformed_lines: usize,
}

/// Parse a JSONL log, skipping blank and malformed lines.
pub fn decode_jsonl(path: &str, bytes: &[u8]) -> DecodedLog {
    let mut out = DecodedLog::default();
    let text = String::from_utf8_lossy(bytes);
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<MessageRecord>(line) {
            Ok(r) => out.records.push(r),
            Err(e) => {
                tracing::warn!("{path}:{}: skipping malformed record: {e}", idx + 1);
                out.malformed_lines += 1;
            }
        }
    }
    out
}

/// Append-only writer for one channel's day logs.
///
/// Each channel worker owns exactly one writer, so no two writers ever touch
/// the same `{date}/{channel_id}.jsonl`.
pub struct DayLogWriter {
    store: Arc<dyn ObjectStore>,
    channel_id: ChannelId,
}

impl DayLogWriter {
    pub fn new(store: Arc<dyn ObjectStore>, channel_id: ChannelId) -> Self {
        Self { store, channel_id }
    }

    /// Append one page, routing each record to the log of its UTC day.
    ///
    /// The whole page is encoded before the first append. A page that spans
    /// UTC midnight is one append per day, so a failure on a later day leaves
    /// the earlier day's part written; the next run skips those ids.
    pub async fn append_page(&self, records: &[MessageRecord]) -> Result<usize> {
        let mut by_day: BTreeMap<NaiveDate, Vec<MessageRecord>> = BTreeMap::new();
        for r in records {
            by_day.entry(r.day()).or_default().push(r.clone());
        }

        let mut encoded = Vec::with_capacity(by_day.len());
        for (day, mut recs) in by_day {
            recs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
            encoded.push((day_log_path(day, &self.channel_id), encode_jsonl(&recs)?));
        }

        for (path, bytes) in &encoded {
            self.store.append_blob(path, bytes).await?;
        }
        Ok(records.len())
    }

    /// All records already logged for this channel on the given days.
    pub async fn read_existing(&self, days: &[NaiveDate]) -> Result<Vec<MessageRecord>> {
        let mut out = Vec::new();
        for day in days {
            let path = day_log_path(*day, &self.channel_id);
            match self.store.read_blob(&path).await {
                Ok(bytes) => out.extend(decode_jsonl(&path, &bytes).records),
                Err(e) if is_not_found(&e) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(out)
    }
}
