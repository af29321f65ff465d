//! Markdown and plain-text renders of a `DailySummary`.

use chrono::{DateTime, Utc};

use crate::{
    aggregator::{
        analysis::{InsightStatus, TickerInsight},
        summary::DailySummary,
        tickers::ChannelStats,
    },
    utils::group_thousands,
};

const TOP_TICKERS: usize = 10;
const WATCHLIST_LEN: usize = 5;
const DETAILED_TICKERS: usize = 5;
const CHANNEL_TICKERS: usize = 3;
const RULE_WIDTH: usize = 70;

fn ts(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%d %H:%M UTC").to_string()
}

fn channel_tickers(ch: &ChannelStats) -> String {
    ch.top_tickers
        .iter()
        .take(CHANNEL_TICKERS)
        .map(|t| format!("${} ({})", t.symbol, t.count))
        .collect::<Vec<_>>()
        .join(", ")
}

fn detailed(summary: &DailySummary) -> Vec<&TickerInsight> {
    summary
        .analysis
        .as_ref()
        .map(|a| a.tickers.iter().take(DETAILED_TICKERS).collect())
        .unwrap_or_default()
}

fn mentions(summary: &DailySummary, symbol: &str) -> u64 {
    summary.ticker(symbol).map_or(0, |t| t.mention_count)
}

pub fn render_markdown(summary: &DailySummary) -> String {
    let stats = &summary.stats;
    let mut md = vec![format!("# {}", summary.title()), String::new()];

    if let Some(exec) = summary
        .analysis
        .as_ref()
        .and_then(|a| a.executive_summary.as_deref())
    {
        md.push("## Executive Summary".into());
        md.push(String::new());
        md.push(exec.to_string());
        md.push(String::new());
    }

    md.push("## Overview".into());
    md.push(String::new());
    md.push(format!(
        "- **Total Messages**: {}",
        group_thousands(stats.total_messages)
    ));
    md.push(format!("- **Unique Authors**: {}", stats.unique_authors));
    md.push(format!("- **Channels**: {}", stats.channel_count));
    if let Some(range) = stats.time_range {
        md.push(format!(
            "- **Time Range**: {} to {}",
            ts(range.start),
            ts(range.end)
        ));
    }
    if !summary.skipped_logs.is_empty() {
        md.push(format!("- **Skipped Logs**: {}", summary.skipped_logs.len()));
    }
    md.push(String::new());

    if summary.is_empty() {
        md.push("_No messages were logged for this day._".into());
        md.push(String::new());
    }

    if !stats.tickers.is_empty() {
        md.push("## Top Tickers".into());
        md.push(String::new());
        for (i, t) in summary.top_tickers(TOP_TICKERS).iter().enumerate() {
            md.push(format!(
                "{}. **${}** - {} mentions from {} authors",
                i + 1,
                t.symbol,
                t.mention_count,
                t.unique_authors
            ));
        }
        md.push(String::new());
    }

    let watchlist = summary.watchlist(WATCHLIST_LEN);
    if !watchlist.is_empty() {
        md.push("## Watchlist".into());
        md.push(String::new());
        for symbol in &watchlist {
            md.push(format!("- **${symbol}**"));
        }
        md.push(String::new());
    }

    let insights = detailed(summary);
    if !insights.is_empty() {
        md.push("## Ticker Analysis".into());
        md.push(String::new());
        for insight in insights {
            md.push(format!("### ${}", insight.symbol));
            match &insight.status {
                InsightStatus::Analyzed(a) => {
                    md.push(format!(
                        "**Sentiment**: {} | **Conviction**: {} | **Mentions**: {}",
                        a.sentiment,
                        a.conviction,
                        mentions(summary, &insight.symbol)
                    ));
                    md.push(String::new());
                    if !a.themes.is_empty() {
                        md.push("**Themes:**".into());
                        md.extend(a.themes.iter().map(|t| format!("- {t}")));
                        md.push(String::new());
                    }
                    if !a.risks.is_empty() {
                        md.push("**Risks:**".into());
                        md.extend(a.risks.iter().map(|r| format!("- {r}")));
                        md.push(String::new());
                    }
                }
                InsightStatus::StatsOnly { reason } => {
                    md.push(format!(
                        "**Mentions**: {} | _stats only: {reason}_",
                        mentions(summary, &insight.symbol)
                    ));
                    md.push(String::new());
                }
            }
        }
    }

    if let Some(a) = &summary.analysis {
        if !a.key_themes.is_empty() {
            md.push("## Key Themes".into());
            md.push(String::new());
            md.extend(a.key_themes.iter().map(|t| format!("- {t}")));
            md.push(String::new());
        }
        if !a.notable_insights.is_empty() {
            md.push("## Notable Insights".into());
            md.push(String::new());
            md.extend(a.notable_insights.iter().map(|t| format!("- {t}")));
            md.push(String::new());
        }
    }

    if !stats.channels.is_empty() {
        md.push("## Channel Activity".into());
        md.push(String::new());
        for ch in &stats.channels {
            md.push(format!("### {}", ch.label()));
            md.push(String::new());
            md.push(format!("- **Messages**: {}", group_thousands(ch.messages)));
            md.push(format!("- **Unique Authors**: {}", ch.unique_authors));
            if !ch.top_tickers.is_empty() {
                md.push(format!("- **Top Tickers**: {}", channel_tickers(ch)));
            }
            md.push(String::new());
        }
    }

    md.push("---".into());
    let generator = summary
        .analysis
        .as_ref()
        .map(|a| format!(" with {}", a.model))
        .unwrap_or_default();
    md.push(format!("*Generated{generator} at {}*", ts(summary.generated_at)));
    md.push(String::new());
    md.join("\n")
}

pub fn render_text(summary: &DailySummary) -> String {
    let stats = &summary.stats;
    let rule = "=".repeat(RULE_WIDTH);
    let sub = "-".repeat(RULE_WIDTH);
    let mut out = vec![rule.clone(), summary.title().to_uppercase(), rule.clone(), String::new()];
    let heading = |out: &mut Vec<String>, title: &str| {
        out.push(title.to_string());
        out.push(sub.clone());
    };

    if let Some(exec) = summary
        .analysis
        .as_ref()
        .and_then(|a| a.executive_summary.as_deref())
    {
        heading(&mut out, "EXECUTIVE SUMMARY");
        out.push(exec.to_string());
        out.push(String::new());
    }

    heading(&mut out, "OVERVIEW");
    out.push(format!(
        "Total Messages: {}",
        group_thousands(stats.total_messages)
    ));
    out.push(format!("Unique Authors: {}", stats.unique_authors));
    out.push(format!("Channels: {}", stats.channel_count));
    if let Some(range) = stats.time_range {
        out.push(format!("Time Range: {} to {}", ts(range.start), ts(range.end)));
    }
    if !summary.skipped_logs.is_empty() {
        out.push(format!("Skipped Logs: {}", summary.skipped_logs.len()));
    }
    if summary.is_empty() {
        out.push("No messages were logged for this day.".into());
    }
    out.push(String::new());

    if !stats.tickers.is_empty() {
        heading(&mut out, "TOP TICKERS");
        for (i, t) in summary.top_tickers(TOP_TICKERS).iter().enumerate() {
            out.push(format!(
                "{:>3}. ${:<6} {} mentions, {} authors",
                i + 1,
                t.symbol,
                t.mention_count,
                t.unique_authors
            ));
        }
        out.push(String::new());
    }

    let watchlist = summary.watchlist(WATCHLIST_LEN);
    if !watchlist.is_empty() {
        heading(&mut out, "WATCHLIST");
        out.extend(watchlist.iter().map(|s| format!("  * ${s}")));
        out.push(String::new());
    }

    let insights = detailed(summary);
    if !insights.is_empty() {
        heading(&mut out, "TICKER ANALYSIS");
        for insight in insights {
            let n = mentions(summary, &insight.symbol);
            match &insight.status {
                InsightStatus::Analyzed(a) => {
                    out.push(format!(
                        "  ${} - {n} mentions | {} | Conviction: {}",
                        insight.symbol, a.sentiment, a.conviction
                    ));
                    out.extend(a.themes.iter().take(2).map(|t| format!("    + {t}")));
                    out.extend(a.risks.iter().take(2).map(|r| format!("    ! {r}")));
                }
                InsightStatus::StatsOnly { reason } => {
                    out.push(format!(
                        "  ${} - {n} mentions | stats only ({reason})",
                        insight.symbol
                    ));
                }
            }
        }
        out.push(String::new());
    }

    if let Some(a) = &summary.analysis {
        if !a.key_themes.is_empty() {
            heading(&mut out, "KEY THEMES");
            out.extend(a.key_themes.iter().map(|t| format!("  * {t}")));
            out.push(String::new());
        }
        if !a.notable_insights.is_empty() {
            heading(&mut out, "NOTABLE INSIGHTS");
            out.extend(a.notable_insights.iter().map(|t| format!("  * {t}")));
            out.push(String::new());
        }
    }

    if !stats.channels.is_empty() {
        heading(&mut out, "CHANNEL BREAKDOWN");
        for ch in &stats.channels {
            out.push(format!("  {}", ch.label()));
            out.push(format!(
                "    Messages: {} | Authors: {}",
                group_thousands(ch.messages),
                ch.unique_authors
            ));
            if !ch.top_tickers.is_empty() {
                out.push(format!("    Top Tickers: {}", channel_tickers(ch)));
            }
        }
        out.push(String::new());
    }

    out.push(rule);
    out.push(String::new());
    out.join("\n")
}
