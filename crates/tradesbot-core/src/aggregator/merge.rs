use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    domain::{MessageRecord, RecordKey},
    errors::Error,
    ports::ObjectStore,
    storage::{day_prefix, decode_jsonl, LOG_EXTENSION},
    Result,
};

/// A day log that was left out of the summary (unreadable, empty or all malformed).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogIssue {
    pub path: String,
    pub reason: String,
}

impl From<LogIssue> for Error {
    fn from(issue: LogIssue) -> Self {
        Error::MissingOrCorruptLog {
            path: issue.path,
            reason: issue.reason,
        }
    }
}

/// Every record logged for one day, merged across channels.
#[derive(Clone, Debug, Default)]
pub struct DayLoad {
    /// Unique by `(channel_id, message_id)`, sorted by `created_at` ascending.
    pub records: Vec<MessageRecord>,
    pub logs_read: usize,
    pub duplicates: usize,
    pub malformed_lines: usize,
    pub issues: Vec<LogIssue>,
}

impl DayLoad {
    fn skip(&mut self, path: String, reason: String) {
        let issue = LogIssue { path, reason };
        tracing::warn!("skipping {}", Error::from(issue.clone()));
        self.issues.push(issue);
    }
}

/// Read all `{date}/*.jsonl` logs and merge them.
///
/// Unreadable, empty and fully malformed logs are reported in `issues` and
/// skipped. Only a failure to list the day is returned as an error.
pub async fn load_day(store: &dyn ObjectStore, date: NaiveDate) -> Result<DayLoad> {
    let prefix = day_prefix(date);
    let mut paths: Vec<String> = store
        .list_blobs(&prefix)
        .await?
        .into_iter()
        .filter(|p| p.ends_with(LOG_EXTENSION))
        .collect();
    paths.sort();

    let mut load = DayLoad::default();
    let mut logs = Vec::with_capacity(paths.len());
    for path in paths {
        match store.read_blob(&path).await {
            Ok(bytes) => {
                let decoded = decode_jsonl(&path, &bytes);
                load.malformed_lines += decoded.malformed_lines;
                if decoded.records.is_empty() {
                    let reason = if decoded.malformed_lines == 0 {
                        "empty log".to_string()
                    } else {
                        format!("no valid records ({} malformed lines)", decoded.malformed_lines)
                    };
                    load.skip(path, reason);
                    continue;
                }
                load.logs_read += 1;
                logs.push(decoded.records);
            }
            Err(e) => load.skip(path, e.to_string()),
        }
    }

    let (records, duplicates) = merge_records(logs);
    load.records = records;
    load.duplicates = duplicates;
    tracing::info!(
        "{date}: {} records from {} logs ({} duplicates, {} malformed lines, {} skipped)",
        load.records.len(),
        load.logs_read,
        load.duplicates,
        load.malformed_lines,
        load.issues.len()
    );
    Ok(load)
}

/// Concatenate logs, keep the first copy of each key, then stable-sort by time.
///
/// Returns the merged records and the number of duplicates dropped.
pub fn merge_records<I>(logs: I) -> (Vec<MessageRecord>, usize)
where
    I: IntoIterator<Item = Vec<MessageRecord>>,
{
    let mut seen: HashSet<RecordKey> = HashSet::new();
    let mut out = Vec::new();
    let mut duplicates = 0;
    for record in logs.into_iter().flatten() {
        if seen.insert(record.key()) {
            out.push(record);
        } else {
            duplicates += 1;
        }
    }
    out.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    (out, duplicates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{AuthorId, ChannelId, MessageId},
        storage::{encode_jsonl, MemoryObjectStore},
    };
    use chrono::{TimeZone, Utc};

    fn rec(channel: &str, id: &str, minute: u32, content: &str) -> MessageRecord {
        MessageRecord {
            channel_id: ChannelId(channel.into()),
            channel_name: None,
            message_id: MessageId(id.into()),
            author_id: AuthorId("u1".into()),
            author_display_name: "alice".into(),
            created_at: Utc.with_ymd_and_hms(2025, 9, 20, 10, minute, 0).unwrap(),
            content: content.into(),
            attachments: vec![],
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, 20).unwrap()
    }

    #[test]
    fn duplicates_keep_first_copy() {
        let (merged, dups) = merge_records(vec![
            vec![rec("a", "1", 5, "first"), rec("a", "2", 1, "x")],
            vec![rec("a", "1", 5, "second"), rec("b", "1", 3, "other channel")],
        ]);
        assert_eq!(dups, 1);
        assert_eq!(merged.len(), 3);
        let ids: Vec<_> = merged
            .iter()
            .map(|r| format!("{}/{}", r.channel_id, r.message_id))
            .collect();
        assert_eq!(ids, vec!["a/2", "b/1", "a/1"]);
        assert_eq!(merged[2].content, "first");
    }

    #[tokio::test]
    async fn load_day_merges_channels_and_skips_corrupt_bytes() {
        let store = MemoryObjectStore::new();
        store.insert(
            "2025-09-20/a.jsonl",
            encode_jsonl(&[rec("a", "1", 2, "$NVDA"), rec("a", "1", 2, "$NVDA")]).unwrap(),
        );
        let mut b = encode_jsonl(&[rec("b", "9", 1, "hi")]).unwrap();
        b.extend_from_slice(b"garbage\n");
        store.insert("2025-09-20/b.jsonl", b);
        store.insert("2025-09-21/a.jsonl", encode_jsonl(&[rec("a", "7", 0, "")]).unwrap());
        store.insert("2025-09-20/notes.txt", b"ignored".to_vec());

        let load = load_day(&store, day()).await.unwrap();
        assert_eq!(load.logs_read, 2);
        assert_eq!(load.duplicates, 1);
        assert_eq!(load.malformed_lines, 1);
        assert!(load.issues.is_empty());
        let ids: Vec<_> = load.records.iter().map(|r| r.message_id.0.as_str()).collect();
        assert_eq!(ids, vec!["9", "1"]);
    }

    #[tokio::test]
    async fn empty_day_is_not_an_error() {
        let store = MemoryObjectStore::new();
        let load = load_day(&store, day()).await.unwrap();
        assert!(load.records.is_empty());
        assert_eq!(load.logs_read, 0);
    }

    #[tokio::test]
    async fn empty_and_garbage_logs_are_reported() {
        let store = MemoryObjectStore::new();
        store.insert("2025-09-20/a.jsonl", b"garbage\n{nope}\n".to_vec());
        store.insert("2025-09-20/b.jsonl", Vec::new());
        store.insert("2025-09-20/c.jsonl", encode_jsonl(&[rec("c", "1", 4, "ok")]).unwrap());

        let load = load_day(&store, day()).await.unwrap();
        assert_eq!(load.logs_read, 1);
        assert_eq!(load.malformed_lines, 2);
        let skipped: Vec<_> = load.issues.iter().map(|i| i.path.as_str()).collect();
        assert_eq!(skipped, vec!["2025-09-20/a.jsonl", "2025-09-20/b.jsonl"]);
        assert_eq!(load.issues[1].reason, "empty log");
        assert!(matches!(
            Error::from(load.issues[0].clone()),
            Error::MissingOrCorruptLog { .. }
        ));
        assert_eq!(load.records.len(), 1);
    }

    #[tokio::test]
    async fn loading_twice_is_identical() {
        let store = MemoryObjectStore::new();
        store.insert(
            "2025-09-20/a.jsonl",
            encode_jsonl(&[rec("a", "2", 9, "b"), rec("a", "1", 1, "a")]).unwrap(),
        );
        let first = load_day(&store, day()).await.unwrap().records;
        let second = load_day(&store, day()).await.unwrap().records;
        assert_eq!(first, second);
    }
}
