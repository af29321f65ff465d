use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    aggregator::{
        analysis::AiAnalysis,
        merge::LogIssue,
        tickers::{DayStats, TickerStats},
    },
    Result,
};

/// The aggregated view of one day. Regenerating a date overwrites it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub generated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub stats: DayStats,
    /// Logs left out because they could not be read.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_logs: Vec<LogIssue>,
    /// `None` when the run was stats-only.
    pub analysis: Option<AiAnalysis>,
}

impl DailySummary {
    pub fn new(
        date: NaiveDate,
        generated_at: DateTime<Utc>,
        stats: DayStats,
        analysis: Option<AiAnalysis>,
    ) -> Self {
        Self {
            date,
            generated_at,
            stats,
            skipped_logs: Vec::new(),
            analysis,
        }
    }

    pub fn title(&self) -> String {
        format!("Discord Trading Summary - {}", self.date.format("%Y-%m-%d"))
    }

    pub fn is_empty(&self) -> bool {
        self.stats.total_messages == 0
    }

    pub fn top_tickers(&self, n: usize) -> &[TickerStats] {
        &self.stats.tickers[..n.min(self.stats.tickers.len())]
    }

    pub fn ticker(&self, symbol: &str) -> Option<&TickerStats> {
        self.stats.tickers.iter().find(|t| t.symbol == symbol)
    }

    /// Watchlist from the analysis, or the head of the ranking without it.
    pub fn watchlist(&self, len: usize) -> Vec<String> {
        match &self.analysis {
            Some(a) => a.watchlist.iter().take(len).cloned().collect(),
            None => self
                .top_tickers(len)
                .iter()
                .map(|t| t.symbol.clone())
                .collect(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}
