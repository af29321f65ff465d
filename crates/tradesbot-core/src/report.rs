//! End-of-run status report (printed to stdout by the binary).

use std::fmt;

use crate::{
    aggregator::{AiStatus, InsightStatus, PublishStatus, StoreLocation, SummaryRun},
    fetcher::{ChannelOutcome, ChannelReport, StopReason},
};

/// Human-readable per-channel or per-ticker status of one run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunReport {
    pub title: String,
    pub lines: Vec<String>,
    /// Channels or tickers that did not complete normally.
    pub failures: usize,
}

fn stop_label(stop: Option<StopReason>) -> &'static str {
    match stop {
        Some(StopReason::ReachedSince) => "reached since",
        Some(StopReason::Exhausted) => "history exhausted",
        Some(StopReason::PageLimit) => "page limit",
        None => "not started",
    }
}

impl RunReport {
    pub fn from_fetch(reports: &[ChannelReport]) -> Self {
        let mut out = Self {
            title: format!("fetch: {} channel(s)", reports.len()),
            ..Self::default()
        };
        for r in reports {
            let s = &r.stats;
            let counts = format!(
                "{} written, {} already logged, {} outside window, {} malformed, {} pages",
                s.written, s.already_logged, s.out_of_window, s.malformed, s.pages
            );
            match &r.outcome {
                ChannelOutcome::Completed => out.lines.push(format!(
                    "OK     {} ({}): {counts}",
                    s.channel_id,
                    stop_label(s.stop)
                )),
                ChannelOutcome::Failed { error } => {
                    out.failures += 1;
                    out.lines
                        .push(format!("FAILED {}: {error}; {counts}", s.channel_id));
                }
            }
        }
        out
    }

    pub fn from_summary(run: &SummaryRun) -> Self {
        let s = &run.summary;
        let mut out = Self {
            title: format!(
                "summarize {}: {} messages, {} authors, {} channels, {} tickers",
                s.date,
                s.stats.total_messages,
                s.stats.unique_authors,
                s.stats.channel_count,
                s.stats.tickers.len()
            ),
            ..Self::default()
        };

        out.lines.push(format!(
            "logs: {} read, {} skipped, {} duplicate records, {} malformed lines",
            run.logs_read,
            s.skipped_logs.len(),
            run.duplicates,
            run.malformed_lines
        ));
        for issue in &s.skipped_logs {
            out.lines
                .push(format!("SKIPPED {}: {}", issue.path, issue.reason));
        }

        match run.ai {
            AiStatus::Disabled => out.lines.push("ai: disabled".to_string()),
            AiStatus::NotConfigured => out
                .lines
                .push("ai: not configured, stats only".to_string()),
            AiStatus::Ran => {}
        }

        for t in &s.stats.tickers {
            let status = match s.analysis.as_ref().and_then(|a| a.insight(&t.symbol)) {
                Some(insight) => match &insight.status {
                    InsightStatus::Analyzed(a) => format!("analyzed {} / {}", a.sentiment, a.conviction),
                    InsightStatus::StatsOnly { reason } => {
                        out.failures += 1;
                        format!("stats-only ({reason})")
                    }
                },
                None => "stats-only".to_string(),
            };
            out.lines.push(format!(
                "${:<6} {:>4} mentions {:>3} authors  {status}",
                t.symbol, t.mention_count, t.unique_authors
            ));
        }

        let location = match run.stored.location {
            StoreLocation::Primary => "primary store",
            StoreLocation::Fallback => "FALLBACK store",
        };
        out.lines.push(format!(
            "stored in {location}: {}",
            run.stored.paths.join(", ")
        ));

        out.lines.push(match &run.publish {
            PublishStatus::NotRequested => "publish: not requested".to_string(),
            PublishStatus::NotConfigured => "publish: requested but not configured".to_string(),
            PublishStatus::Published { page_id } => format!("publish: page {page_id}"),
            PublishStatus::Failed { reason } => {
                out.failures += 1;
                format!("publish: FAILED ({reason})")
            }
        });
        out
    }

    pub fn is_clean(&self) -> bool {
        self.failures == 0
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.title)?;
        for line in &self.lines {
            writeln!(f, "  {line}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        aggregator::{DailySummary, DayStats, StoredSummary},
        domain::ChannelId,
        fetcher::ChannelFetch,
    };
    use chrono::{NaiveDate, TimeZone, Utc};

    fn channel(id: &str, outcome: ChannelOutcome) -> ChannelReport {
        ChannelReport {
            stats: ChannelFetch {
                channel_id: ChannelId(id.into()),
                pages: 2,
                written: 150,
                already_logged: 0,
                out_of_window: 3,
                malformed: 0,
                stop: Some(StopReason::ReachedSince),
            },
            outcome,
        }
    }

    #[test]
    fn fetch_report_lists_every_channel() {
        let report = RunReport::from_fetch(&[
            channel("1", ChannelOutcome::Completed),
            channel(
                "2",
                ChannelOutcome::Failed {
                    error: "403 missing access".into(),
                },
            ),
        ]);
        assert_eq!(report.failures, 1);
        assert!(!report.is_clean());
        let text = report.to_string();
        assert!(text.contains("OK     1 (reached since): 150 written"));
        assert!(text.contains("FAILED 2: 403 missing access"));
    }

    #[test]
    fn summary_report_marks_fallback_and_publish_failure() {
        let at = Utc.with_ymd_and_hms(2025, 9, 20, 0, 0, 0).unwrap();
        let run = SummaryRun {
            summary: DailySummary::new(
                NaiveDate::from_ymd_opt(2025, 9, 20).unwrap(),
                at,
                DayStats::default(),
                None,
            ),
            logs_read: 0,
            duplicates: 0,
            malformed_lines: 0,
            ai: AiStatus::NotConfigured,
            stored: StoredSummary {
                location: StoreLocation::Fallback,
                paths: vec!["summaries/2025-09-20.json".into()],
            },
            publish: PublishStatus::Failed {
                reason: "401".into(),
            },
        };
        let report = RunReport::from_summary(&run);
        let text = report.to_string();
        assert!(text.starts_with("summarize 2025-09-20: 0 messages"));
        assert!(text.contains("ai: not configured, stats only"));
        assert!(text.contains("stored in FALLBACK store"));
        assert!(text.contains("publish: FAILED (401)"));
        assert_eq!(report.failures, 1);
    }
}
