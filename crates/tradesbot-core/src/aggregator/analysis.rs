//! Per-ticker and per-day calls to the text generator.
//!
//! Every response is validated before it reaches a summary. A ticker whose
//! call fails, times out or returns an incomplete answer degrades to
//! stats-only; the rest of the day is unaffected.

use std::{fmt, str::FromStr, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use tokio::{sync::Semaphore, task::JoinSet};

use crate::{
    aggregator::tickers::{DayStats, TickerStats},
    config::AggregateConfig,
    domain::MessageRecord,
    errors::Error,
    ports::TextGenerator,
    utils::{collapse_whitespace, truncate_chars},
    Result,
};

/// Messages quoted in the day overview prompt.
const OVERVIEW_SAMPLE: usize = 100;
/// Cap on themes, risks and insights kept from one answer.
const MAX_LIST_ITEMS: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Sentiment {
    Bullish,
    Bearish,
    Neutral,
    Mixed,
}

impl FromStr for Sentiment {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BULLISH" => Ok(Self::Bullish),
            "BEARISH" => Ok(Self::Bearish),
            "NEUTRAL" => Ok(Self::Neutral),
            "MIXED" => Ok(Self::Mixed),
            other => Err(format!("unknown sentiment {other:?}")),
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Bullish => "BULLISH",
            Self::Bearish => "BEARISH",
            Self::Neutral => "NEUTRAL",
            Self::Mixed => "MIXED",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Conviction {
    High,
    Medium,
    Low,
}

impl FromStr for Conviction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HIGH" => Ok(Self::High),
            "MEDIUM" => Ok(Self::Medium),
            "LOW" => Ok(Self::Low),
            other => Err(format!("unknown conviction {other:?}")),
        }
    }
}

impl fmt::Display for Conviction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TickerAnalysis {
    pub sentiment: Sentiment,
    pub conviction: Conviction,
    pub themes: Vec<String>,
    pub risks: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InsightStatus {
    Analyzed(TickerAnalysis),
    StatsOnly { reason: String },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TickerInsight {
    pub symbol: String,
    #[serde(flatten)]
    pub status: InsightStatus,
}

impl TickerInsight {
    pub fn analysis(&self) -> Option<&TickerAnalysis> {
        match &self.status {
            InsightStatus::Analyzed(a) => Some(a),
            InsightStatus::StatsOnly { .. } => None,
        }
    }
}

/// AI block of a daily summary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AiAnalysis {
    pub model: String,
    pub executive_summary: Option<String>,
    pub key_themes: Vec<String>,
    pub notable_insights: Vec<String>,
    /// One entry per analyzed candidate, in ranking order.
    pub tickers: Vec<TickerInsight>,
    pub watchlist: Vec<String>,
}

impl AiAnalysis {
    pub fn insight(&self, symbol: &str) -> Option<&TickerInsight> {
        self.tickers.iter().find(|t| t.symbol == symbol)
    }

    pub fn analyzed_count(&self) -> usize {
        self.tickers.iter().filter(|t| t.analysis().is_some()).count()
    }
}

/// Structured input for one ticker call.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TickerPrompt {
    pub symbol: String,
    pub mention_count: u64,
    pub unique_authors: u64,
    pub excerpts: Vec<String>,
}

impl TickerPrompt {
    pub fn from_stats(stats: &TickerStats) -> Self {
        Self {
            symbol: stats.symbol.clone(),
            mention_count: stats.mention_count,
            unique_authors: stats.unique_authors,
            excerpts: stats
                .excerpts
                .iter()
                .map(|e| format!("{}: {}", e.author, e.text))
                .collect(),
        }
    }

    pub fn render(&self) -> String {
        let excerpts = if self.excerpts.is_empty() {
            "(none)".to_string()
        } else {
            self.excerpts
                .iter()
                .map(|e| format!("- {e}"))
                .collect::<Vec<_>>()
                .join("\n")
        };
        format!(
            "You are analyzing today's discussion of ${symbol} in a trading community.\n\
             \n\
             ## Context\n\
             - Mentions: {mentions} messages\n\
             - Distinct authors: {authors}\n\
             \n\
             ## Excerpts\n\
             {excerpts}\n\
             \n\
             ## Task\n\
             Answer with JSON only, using exactly this structure:\n\
             {{\"sentiment\": \"BULLISH|BEARISH|NEUTRAL|MIXED\", \
             \"conviction\": \"HIGH|MEDIUM|LOW\", \
             \"themes\": [\"...\"], \"risks\": [\"...\"]}}\n\
             Be concise and factual. If sentiment is unclear, answer MIXED.\n",
            symbol = self.symbol,
            mentions = self.mention_count,
            authors = self.unique_authors,
        )
    }
}

/// Day-level overview requested once per summary.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DayOverview {
    pub executive_summary: String,
    pub key_themes: Vec<String>,
    pub notable_insights: Vec<String>,
}

pub fn overview_prompt(stats: &DayStats, records: &[MessageRecord], excerpt_max_chars: usize) -> String {
    let tickers = stats
        .tickers
        .iter()
        .take(10)
        .map(|t| format!("${} ({} mentions)", t.symbol, t.mention_count))
        .collect::<Vec<_>>()
        .join(", ");
    let messages = records
        .iter()
        .take(OVERVIEW_SAMPLE)
        .map(|r| {
            let channel = r.channel_name.as_deref().unwrap_or(&r.channel_id.0);
            let text = truncate_chars(&collapse_whitespace(&r.content), excerpt_max_chars);
            format!("[{channel}] {}: {text}", r.author_display_name)
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "You are summarizing one day of discussion in a trading community.\n\
         \n\
         ## Context\n\
         - Total messages: {total}\n\
         - Unique authors: {authors}\n\
         - Top tickers: {tickers}\n\
         \n\
         ## Messages\n\
         {messages}\n\
         \n\
         ## Task\n\
         Answer with JSON only, using exactly this structure:\n\
         {{\"executive_summary\": \"2-3 sentences\", \
         \"key_themes\": [\"...\"], \"notable_insights\": [\"...\"]}}\n",
        total = stats.total_messages,
        authors = stats.unique_authors,
    )
}

/// Remove a surrounding Markdown code fence, with or without a language tag.
///
/// The tag may run straight into the body (`` ```json{...}``` ``).
pub fn strip_code_fence(text: &str) -> &str {
    let t = text.trim();
    let Some(rest) = t.strip_prefix("```") else {
        return t;
    };
    let tag_len = rest
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(rest.len());
    let body = &rest[tag_len..];
    body.strip_suffix("```").unwrap_or(body).trim()
}

#[derive(Deserialize)]
struct RawTickerAnswer {
    sentiment: Option<String>,
    conviction: Option<String>,
    themes: Option<Vec<String>>,
    risks: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct RawOverviewAnswer {
    executive_summary: Option<String>,
    #[serde(default)]
    key_themes: Vec<String>,
    #[serde(default)]
    notable_insights: Vec<String>,
}

fn analysis_error(ticker: &str, reason: impl Into<String>) -> Error {
    Error::Analysis {
        ticker: ticker.to_string(),
        reason: reason.into(),
    }
}

fn capped(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .take(MAX_LIST_ITEMS)
        .collect()
}

/// Validate one ticker answer. Every field is required.
pub fn parse_ticker_analysis(symbol: &str, response: &str) -> Result<TickerAnalysis> {
    let raw: RawTickerAnswer = serde_json::from_str(strip_code_fence(response))
        .map_err(|e| analysis_error(symbol, format!("response is not the expected JSON: {e}")))?;

    let sentiment = raw
        .sentiment
        .ok_or_else(|| analysis_error(symbol, "missing sentiment"))?
        .parse::<Sentiment>()
        .map_err(|e| analysis_error(symbol, e))?;
    let conviction = raw
        .conviction
        .ok_or_else(|| analysis_error(symbol, "missing conviction"))?
        .parse::<Conviction>()
        .map_err(|e| analysis_error(symbol, e))?;
    let themes = raw
        .themes
        .ok_or_else(|| analysis_error(symbol, "missing themes"))?;
    let risks = raw
        .risks
        .ok_or_else(|| analysis_error(symbol, "missing risks"))?;

    Ok(TickerAnalysis {
        sentiment,
        conviction,
        themes: capped(themes),
        risks: capped(risks),
    })
}

pub fn parse_day_overview(response: &str) -> Result<DayOverview> {
    let raw: RawOverviewAnswer = serde_json::from_str(strip_code_fence(response))
        .map_err(|e| analysis_error("*", format!("overview is not the expected JSON: {e}")))?;
    let executive_summary = raw
        .executive_summary
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| analysis_error("*", "missing executive_summary"))?;
    Ok(DayOverview {
        executive_summary,
        key_themes: capped(raw.key_themes),
        notable_insights: capped(raw.notable_insights),
    })
}

/// Up to `len` ranked symbols: HIGH/MEDIUM conviction first (in ranking
/// order), then the rest of the ranking.
pub fn build_watchlist(ranked: &[TickerStats], insights: &[TickerInsight], len: usize) -> Vec<String> {
    let strong = |symbol: &str| {
        insights
            .iter()
            .find(|i| i.symbol == symbol)
            .and_then(TickerInsight::analysis)
            .is_some_and(|a| matches!(a.conviction, Conviction::High | Conviction::Medium))
    };

    let mut out: Vec<String> = ranked
        .iter()
        .filter(|t| strong(&t.symbol))
        .take(len)
        .map(|t| t.symbol.clone())
        .collect();
    for t in ranked {
        if out.len() >= len {
            break;
        }
        if !out.contains(&t.symbol) {
            out.push(t.symbol.clone());
        }
    }
    out
}

async fn generate_with_timeout(
    generator: &dyn TextGenerator,
    what: &str,
    prompt: &str,
    timeout: Duration,
) -> Result<String> {
    match tokio::time::timeout(timeout, generator.generate(prompt)).await {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(analysis_error(what, e.to_string())),
        Err(_) => Err(analysis_error(what, format!("timed out after {timeout:?}"))),
    }
}

/// Runs the analysis step against a `TextGenerator`.
#[derive(Clone)]
pub struct Analyzer {
    generator: Arc<dyn TextGenerator>,
    cfg: AggregateConfig,
}

impl Analyzer {
    pub fn new(generator: Arc<dyn TextGenerator>, cfg: AggregateConfig) -> Self {
        Self { generator, cfg }
    }

    pub fn model_name(&self) -> &str {
        self.generator.model_name()
    }

    /// Analyze the top ranked tickers and the day as a whole.
    pub async fn analyze(&self, stats: &DayStats, records: &[MessageRecord]) -> AiAnalysis {
        let candidates: Vec<TickerStats> = stats
            .tickers
            .iter()
            .take(self.cfg.analysis_top_n)
            .cloned()
            .collect();
        let tickers = self.analyze_tickers(&candidates).await;

        let overview = if records.is_empty() {
            None
        } else {
            match self.overview(stats, records).await {
                Ok(o) => Some(o),
                Err(e) => {
                    tracing::warn!("day overview unavailable: {e}");
                    None
                }
            }
        };
        let overview = overview.unwrap_or_default();

        let watchlist = build_watchlist(&stats.tickers, &tickers, self.cfg.watchlist_len);
        AiAnalysis {
            model: self.model_name().to_string(),
            executive_summary: Some(overview.executive_summary).filter(|s| !s.is_empty()),
            key_themes: overview.key_themes,
            notable_insights: overview.notable_insights,
            tickers,
            watchlist,
        }
    }

    /// One call per candidate, bounded by `analysis_concurrency`. The output
    /// keeps the candidates' order.
    pub async fn analyze_tickers(&self, candidates: &[TickerStats]) -> Vec<TickerInsight> {
        let sem = Arc::new(Semaphore::new(self.cfg.analysis_concurrency.max(1)));
        let mut set = JoinSet::new();

        for (idx, stats) in candidates.iter().enumerate() {
            let generator = self.generator.clone();
            let sem = sem.clone();
            let timeout = self.cfg.analysis_timeout;
            let prompt = TickerPrompt::from_stats(stats);
            set.spawn(async move {
                let _permit = sem.acquire_owned().await;
                let symbol = prompt.symbol.clone();
                let result = match generate_with_timeout(
                    generator.as_ref(),
                    &symbol,
                    &prompt.render(),
                    timeout,
                )
                .await
                {
                    Ok(text) => parse_ticker_analysis(&symbol, &text),
                    Err(e) => Err(e),
                };
                (idx, result)
            });
        }

        let mut results: Vec<Option<Result<TickerAnalysis>>> =
            candidates.iter().map(|_| None).collect();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((idx, result)) => results[idx] = Some(result),
                Err(e) => tracing::error!("analysis task crashed: {e}"),
            }
        }

        candidates
            .iter()
            .zip(results)
            .map(|(stats, result)| {
                let status = match result {
                    Some(Ok(analysis)) => {
                        tracing::debug!(
                            "${}: {} / {}",
                            stats.symbol,
                            analysis.sentiment,
                            analysis.conviction
                        );
                        InsightStatus::Analyzed(analysis)
                    }
                    Some(Err(e)) => {
                        tracing::warn!("${} degraded to stats-only: {e}", stats.symbol);
                        InsightStatus::StatsOnly {
                            reason: failure_reason(e),
                        }
                    }
                    None => InsightStatus::StatsOnly {
                        reason: "analysis task did not complete".to_string(),
                    },
                };
                TickerInsight {
                    symbol: stats.symbol.clone(),
                    status,
                }
            })
            .collect()
    }

    async fn overview(&self, stats: &DayStats, records: &[MessageRecord]) -> Result<DayOverview> {
        let prompt = overview_prompt(stats, records, self.cfg.excerpt_max_chars);
        let text =
            generate_with_timeout(self.generator.as_ref(), "*", &prompt, self.cfg.analysis_timeout)
                .await?;
        parse_day_overview(&text)
    }
}

fn failure_reason(err: Error) -> String {
    match err {
        Error::Analysis { reason, .. } => reason,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::tickers::Excerpt;
    use crate::domain::ChannelId;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    };

    /// Answers by matching `$SYMBOL` in the prompt; unknown symbols fail.
    #[derive(Default)]
    struct FakeGenerator {
        answers: Mutex<Vec<(String, String)>>,
        hang_on: Option<String>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl FakeGenerator {
        fn answer(self, needle: &str, text: &str) -> Self {
            self.answers
                .lock()
                .unwrap()
                .push((needle.to_string(), text.to_string()));
            self
        }
    }

    #[async_trait]
    impl TextGenerator for FakeGenerator {
        fn model_name(&self) -> &str {
            "fake-model"
        }

        async fn generate(&self, prompt: &str) -> Result<String> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::task::yield_now().await;
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if let Some(h) = &self.hang_on {
                if prompt.contains(h.as_str()) {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                }
            }
            let answers = self.answers.lock().unwrap();
            answers
                .iter()
                .find(|(needle, _)| prompt.contains(needle.as_str()))
                .map(|(_, text)| text.clone())
                .ok_or_else(|| Error::External("no canned answer".to_string()))
        }
    }

    fn stats(symbol: &str, mentions: u64, minute: u32) -> TickerStats {
        let at = Utc.with_ymd_and_hms(2025, 9, 20, 10, minute, 0).unwrap();
        TickerStats {
            symbol: symbol.to_string(),
            mention_count: mentions,
            unique_authors: 1,
            authors: vec!["alice".to_string()],
            first_mentioned_at: at,
            last_mentioned_at: at,
            excerpts: vec![Excerpt {
                author: "alice".to_string(),
                channel_id: ChannelId("c1".into()),
                created_at: at,
                text: format!("${symbol} looks strong"),
            }],
        }
    }

    fn cfg() -> AggregateConfig {
        AggregateConfig {
            analysis_timeout: Duration::from_secs(1),
            analysis_concurrency: 2,
            ..AggregateConfig::default()
        }
    }

    const NVDA_OK: &str = r#"{"sentiment":"bullish","conviction":"HIGH","themes":["AI capex"],"risks":["valuation"]}"#;

    #[test]
    fn strips_fences_with_and_without_language() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{}\n```\n"), "{}");
        assert_eq!(strip_code_fence("  {}  "), "{}");
        assert_eq!(strip_code_fence("```json{\"a\":1}```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```JSON [1] ```"), "[1]");
    }

    #[test]
    fn parses_case_insensitive_enums() {
        let a = parse_ticker_analysis("NVDA", &format!("```json\n{NVDA_OK}\n```")).unwrap();
        assert_eq!(a.sentiment, Sentiment::Bullish);
        assert_eq!(a.conviction, Conviction::High);
        assert_eq!(a.themes, vec!["AI capex"]);

        let inline = parse_ticker_analysis("NVDA", &format!("```json{NVDA_OK}```")).unwrap();
        assert_eq!(inline, a);
    }

    #[test]
    fn missing_or_invalid_fields_are_failures() {
        let cases = [
            r#"{"conviction":"HIGH","themes":[],"risks":[]}"#,
            r#"{"sentiment":"VERY_BULLISH","conviction":"HIGH","themes":[],"risks":[]}"#,
            r#"{"sentiment":"BULLISH","conviction":"HIGH","themes":"growth","risks":[]}"#,
            r#"{"sentiment":"BULLISH","conviction":"HIGH","themes":[]}"#,
            "not json at all",
        ];
        for case in cases {
            let err = parse_ticker_analysis("NVDA", case).unwrap_err();
            assert!(matches!(err, Error::Analysis { .. }), "{case}: {err}");
        }
    }

    #[test]
    fn prompt_carries_structured_fields() {
        let p = TickerPrompt::from_stats(&stats("NVDA", 3, 0));
        assert_eq!(p.excerpts, vec!["alice: $NVDA looks strong"]);
        let text = p.render();
        assert!(text.contains("$NVDA"));
        assert!(text.contains("Mentions: 3"));
        assert!(text.contains("\"conviction\""));
    }

    #[tokio::test]
    async fn one_bad_ticker_degrades_alone() {
        let gen = FakeGenerator::default()
            .answer("$NVDA", NVDA_OK)
            .answer("$TSLA", r#"{"sentiment":"BEARISH"}"#);
        let analyzer = Analyzer::new(Arc::new(gen), cfg());
        let out = analyzer
            .analyze_tickers(&[stats("NVDA", 3, 0), stats("TSLA", 1, 1), stats("AMD", 1, 2)])
            .await;

        let symbols: Vec<_> = out.iter().map(|t| t.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["NVDA", "TSLA", "AMD"]);
        assert!(out[0].analysis().is_some());
        assert_eq!(
            out[1].status,
            InsightStatus::StatsOnly {
                reason: "missing conviction".to_string()
            }
        );
        assert!(out[2].analysis().is_none());
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let gen = Arc::new(FakeGenerator::default().answer("$", NVDA_OK));
        let analyzer = Analyzer::new(gen.clone(), cfg());
        let candidates: Vec<_> = ["A", "B", "C", "D", "E", "F"]
            .iter()
            .enumerate()
            .map(|(i, s)| stats(&format!("X{s}"), 1, i as u32))
            .collect();
        let out = analyzer.analyze_tickers(&candidates).await;
        assert_eq!(out.len(), 6);
        assert!(gen.max_in_flight.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_an_analysis_failure() {
        let gen = FakeGenerator {
            hang_on: Some("$SLOW".to_string()),
            ..FakeGenerator::default()
        }
        .answer("$", NVDA_OK);
        let analyzer = Analyzer::new(Arc::new(gen), cfg());
        let out = analyzer
            .analyze_tickers(&[stats("SLOW", 2, 0), stats("NVDA", 1, 1)])
            .await;
        match &out[0].status {
            InsightStatus::StatsOnly { reason } => assert!(reason.contains("timed out")),
            other => panic!("expected stats-only, got {other:?}"),
        }
        assert!(out[1].analysis().is_some());
    }

    #[test]
    fn watchlist_prefers_strong_conviction() {
        let ranked = vec![
            stats("AAA", 9, 0),
            stats("BBB", 8, 1),
            stats("CCC", 7, 2),
            stats("DDD", 6, 3),
        ];
        let analysis = |c| {
            InsightStatus::Analyzed(TickerAnalysis {
                sentiment: Sentiment::Neutral,
                conviction: c,
                themes: vec![],
                risks: vec![],
            })
        };
        let insights = vec![
            TickerInsight { symbol: "AAA".into(), status: analysis(Conviction::Low) },
            TickerInsight { symbol: "CCC".into(), status: analysis(Conviction::Medium) },
            TickerInsight { symbol: "DDD".into(), status: analysis(Conviction::High) },
        ];
        assert_eq!(build_watchlist(&ranked, &insights, 3), vec!["CCC", "DDD", "AAA"]);
        assert_eq!(build_watchlist(&ranked, &[], 2), vec!["AAA", "BBB"]);
    }

    #[test]
    fn insight_serializes_with_status_tag() {
        let insight = TickerInsight {
            symbol: "TSLA".into(),
            status: InsightStatus::StatsOnly { reason: "timed out".into() },
        };
        let v = serde_json::to_value(&insight).unwrap();
        assert_eq!(v["status"], "stats_only");
        assert_eq!(v["symbol"], "TSLA");
        let back: TickerInsight = serde_json::from_value(v).unwrap();
        assert_eq!(back, insight);
    }

    #[test]
    fn overview_requires_executive_summary() {
        let ok = parse_day_overview(
            r#"{"executive_summary":"Chips led.","key_themes":["AI"],"notable_insights":[]}"#,
        )
        .unwrap();
        assert_eq!(ok.executive_summary, "Chips led.");
        assert!(parse_day_overview(r#"{"key_themes":["AI"]}"#).is_err());
    }
}
