//! Ticker extraction and day statistics.

use std::{
    collections::{BTreeMap, BTreeSet, HashSet},
    sync::OnceLock,
};

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    config::AggregateConfig,
    domain::{AuthorId, ChannelId, MessageRecord},
    utils::{collapse_whitespace, truncate_chars},
};

/// Tokens that match `$` + capitals but are rarely tickers in chat.
pub const DEFAULT_DENYLIST: &[&str] = &[
    "A", "I", "AM", "AN", "AND", "ARE", "AS", "AT", "BE", "BY", "DO", "FOR", "GO", "IF", "IN",
    "IS", "IT", "ME", "MY", "NO", "OF", "OK", "ON", "OR", "SO", "THE", "TO", "UP", "WE", "USD",
    "CAD", "EUR", "EOD", "IMO", "LOL", "ATH", "CEO", "DD", "YOLO", "FOMO",
];

fn ticker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$([A-Z]{1,5})\b").expect("valid regex"))
}

/// Deterministic `$TICKER` matcher with a denylist.
#[derive(Clone, Debug)]
pub struct TickerExtractor {
    denylist: HashSet<String>,
}

impl Default for TickerExtractor {
    fn default() -> Self {
        Self::new(&[])
    }
}

impl TickerExtractor {
    pub fn new(extra_denied: &[String]) -> Self {
        let denylist = DEFAULT_DENYLIST
            .iter()
            .map(|s| s.to_string())
            .chain(extra_denied.iter().map(|s| s.to_uppercase()))
            .collect();
        Self { denylist }
    }

    /// Distinct symbols (without the sigil) mentioned in `text`.
    pub fn extract(&self, text: &str) -> BTreeSet<String> {
        ticker_re()
            .captures_iter(text)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str())
            .filter(|s| !self.denylist.contains(*s))
            .map(|s| s.to_string())
            .collect()
    }

    pub fn extract_tickers(&self, record: &MessageRecord) -> BTreeSet<String> {
        self.extract(&record.content)
    }
}

/// Symbols mentioned by a record, using the default denylist.
pub fn extract_tickers(record: &MessageRecord) -> BTreeSet<String> {
    TickerExtractor::default().extract_tickers(record)
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Excerpt {
    pub author: String,
    pub channel_id: ChannelId,
    pub created_at: DateTime<Utc>,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TickerStats {
    pub symbol: String,
    /// Distinct messages mentioning the symbol.
    pub mention_count: u64,
    pub unique_authors: u64,
    /// Display names of the distinct authors, sorted.
    pub authors: Vec<String>,
    pub first_mentioned_at: DateTime<Utc>,
    pub last_mentioned_at: DateTime<Utc>,
    pub excerpts: Vec<Excerpt>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickerCount {
    pub symbol: String,
    pub count: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelStats {
    pub channel_id: ChannelId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_name: Option<String>,
    pub messages: u64,
    pub unique_authors: u64,
    pub top_tickers: Vec<TickerCount>,
}

impl ChannelStats {
    pub fn label(&self) -> String {
        match &self.channel_name {
            Some(name) => format!("#{name} ({})", self.channel_id),
            None => self.channel_id.to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Corpus-wide statistics for one day.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DayStats {
    pub total_messages: u64,
    pub unique_authors: u64,
    pub channel_count: u64,
    pub time_range: Option<TimeRange>,
    /// Ranked: mention count desc, then earliest first mention, then symbol.
    pub tickers: Vec<TickerStats>,
    pub channels: Vec<ChannelStats>,
}

const CHANNEL_TOP_TICKERS: usize = 10;

#[derive(Default)]
struct TickerAcc {
    mentions: u64,
    authors: BTreeMap<AuthorId, String>,
    first: Option<DateTime<Utc>>,
    last: Option<DateTime<Utc>>,
    excerpts: Vec<Excerpt>,
}

#[derive(Default)]
struct ChannelAcc {
    name: Option<String>,
    messages: u64,
    authors: BTreeSet<AuthorId>,
    tickers: BTreeMap<String, (u64, DateTime<Utc>)>,
}

/// Compute day statistics over records sorted by `created_at` ascending.
pub fn compute_stats(
    records: &[MessageRecord],
    extractor: &TickerExtractor,
    cfg: &AggregateConfig,
) -> DayStats {
    let mut authors: BTreeSet<&AuthorId> = BTreeSet::new();
    let mut tickers: BTreeMap<String, TickerAcc> = BTreeMap::new();
    let mut channels: BTreeMap<ChannelId, ChannelAcc> = BTreeMap::new();

    for r in records {
        authors.insert(&r.author_id);

        let ch = channels.entry(r.channel_id.clone()).or_default();
        ch.messages += 1;
        ch.authors.insert(r.author_id.clone());
        if ch.name.is_none() {
            ch.name = r.channel_name.clone();
        }

        for symbol in extractor.extract_tickers(r) {
            let ch_entry = ch.tickers.entry(symbol.clone()).or_insert((0, r.created_at));
            ch_entry.0 += 1;

            let acc = tickers.entry(symbol).or_default();
            acc.mentions += 1;
            acc.authors
                .entry(r.author_id.clone())
                .or_insert_with(|| r.author_display_name.clone());
            acc.first = Some(acc.first.map_or(r.created_at, |f| f.min(r.created_at)));
            acc.last = Some(acc.last.map_or(r.created_at, |l| l.max(r.created_at)));
            if acc.excerpts.len() < cfg.excerpts_per_ticker {
                let text = truncate_chars(&collapse_whitespace(&r.content), cfg.excerpt_max_chars);
                acc.excerpts.push(Excerpt {
                    author: r.author_display_name.clone(),
                    channel_id: r.channel_id.clone(),
                    created_at: r.created_at,
                    text,
                });
            }
        }
    }

    let mut ranked: Vec<TickerStats> = tickers
        .into_iter()
        .filter_map(|(symbol, acc)| {
            let mut names: Vec<String> = acc.authors.into_values().collect();
            names.sort();
            Some(TickerStats {
                symbol,
                mention_count: acc.mentions,
                unique_authors: names.len() as u64,
                authors: names,
                first_mentioned_at: acc.first?,
                last_mentioned_at: acc.last?,
                excerpts: acc.excerpts,
            })
        })
        .collect();
    rank_tickers(&mut ranked);

    let mut channel_stats: Vec<ChannelStats> = channels
        .into_iter()
        .map(|(channel_id, acc)| {
            let mut counts: Vec<(String, u64, DateTime<Utc>)> = acc
                .tickers
                .into_iter()
                .map(|(s, (n, first))| (s, n, first))
                .collect();
            counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)).then(a.0.cmp(&b.0)));
            ChannelStats {
                channel_id,
                channel_name: acc.name,
                messages: acc.messages,
                unique_authors: acc.authors.len() as u64,
                top_tickers: counts
                    .into_iter()
                    .take(CHANNEL_TOP_TICKERS)
                    .map(|(symbol, count, _)| TickerCount { symbol, count })
                    .collect(),
            }
        })
        .collect();
    channel_stats.sort_by(|a, b| {
        b.messages
            .cmp(&a.messages)
            .then_with(|| a.channel_id.cmp(&b.channel_id))
    });

    let time_range = match (records.first(), records.last()) {
        (Some(first), Some(last)) => Some(TimeRange {
            start: first.created_at,
            end: last.created_at,
        }),
        _ => None,
    };

    DayStats {
        total_messages: records.len() as u64,
        unique_authors: authors.len() as u64,
        channel_count: channel_stats.len() as u64,
        time_range,
        tickers: ranked,
        channels: channel_stats,
    }
}

/// Mention count desc, earliest first mention, then symbol.
pub fn rank_tickers(tickers: &mut [TickerStats]) {
    tickers.sort_by(|a, b| {
        b.mention_count
            .cmp(&a.mention_count)
            .then(a.first_mentioned_at.cmp(&b.first_mentioned_at))
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
}
