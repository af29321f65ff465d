//! Workspace-database page derived from a `DailySummary`.

use crate::{
    aggregator::{analysis::InsightStatus, summary::DailySummary},
    ports::{BodySection, PageProperties},
    utils::group_thousands,
};

const PROPERTY_TICKERS: usize = 5;
const SECTION_TICKERS: usize = 5;

pub fn page_properties(summary: &DailySummary) -> PageProperties {
    PageProperties {
        title: summary.title(),
        date: summary.date,
        total_messages: summary.stats.total_messages,
        unique_authors: summary.stats.unique_authors,
        top_tickers: summary
            .top_tickers(PROPERTY_TICKERS)
            .iter()
            .map(|t| t.symbol.clone())
            .collect(),
        ai_analysis: summary
            .analysis
            .as_ref()
            .is_some_and(|a| a.executive_summary.is_some() || a.analyzed_count() > 0),
    }
}

fn section(heading: impl Into<String>, level: u8) -> BodySection {
    BodySection {
        heading: heading.into(),
        level,
        ..BodySection::default()
    }
}

pub fn body_sections(summary: &DailySummary) -> Vec<BodySection> {
    let stats = &summary.stats;
    let mut out = Vec::new();

    if let Some(exec) = summary
        .analysis
        .as_ref()
        .and_then(|a| a.executive_summary.clone())
    {
        let mut s = section("Executive Summary", 2);
        s.paragraphs.push(exec);
        out.push(s);
    }

    let mut overview = section("Overview", 2);
    overview.bullets = vec![
        format!("Total Messages: {}", group_thousands(stats.total_messages)),
        format!("Unique Authors: {}", stats.unique_authors),
        format!("Channels: {}", stats.channel_count),
    ];
    if let Some(range) = stats.time_range {
        overview.bullets.push(format!(
            "Time Range: {} to {}",
            range.start.to_rfc3339(),
            range.end.to_rfc3339()
        ));
    }
    out.push(overview);

    let watchlist = summary.watchlist(PROPERTY_TICKERS);
    if !watchlist.is_empty() {
        let mut s = section("Top Watchlist", 2);
        s.bullets = watchlist.iter().map(|t| format!("${t}")).collect();
        out.push(s);
    }

    if let Some(a) = &summary.analysis {
        if !a.tickers.is_empty() {
            out.push(section("Ticker Analysis", 2));
        }
        for insight in a.tickers.iter().take(SECTION_TICKERS) {
            let mentions = summary
                .ticker(&insight.symbol)
                .map_or(0, |t| t.mention_count);
            let mut s = section(format!("${}", insight.symbol), 3);
            match &insight.status {
                InsightStatus::Analyzed(an) => {
                    s.paragraphs.push(format!(
                        "{mentions} mentions | Sentiment: {} | Conviction: {}",
                        an.sentiment, an.conviction
                    ));
                    s.bullets.extend(an.themes.iter().cloned());
                    s.bullets.extend(an.risks.iter().map(|r| format!("Risk: {r}")));
                }
                InsightStatus::StatsOnly { reason } => {
                    s.paragraphs
                        .push(format!("{mentions} mentions | stats only ({reason})"));
                }
            }
            out.push(s);
        }

        if !a.key_themes.is_empty() {
            let mut s = section("Key Themes", 2);
            s.bullets = a.key_themes.clone();
            out.push(s);
        }
        if !a.notable_insights.is_empty() {
            let mut s = section("Notable Insights", 2);
            s.bullets = a.notable_insights.clone();
            out.push(s);
        }
    }

    if !stats.channels.is_empty() {
        let mut s = section("Channel Breakdown", 2);
        s.bullets = stats
            .channels
            .iter()
            .map(|ch| {
                let tickers = ch
                    .top_tickers
                    .iter()
                    .take(3)
                    .map(|t| format!("${} ({})", t.symbol, t.count))
                    .collect::<Vec<_>>()
                    .join(", ");
                let mut line = format!(
                    "{}: {} messages, {} authors",
                    ch.label(),
                    group_thousands(ch.messages),
                    ch.unique_authors
                );
                if !tickers.is_empty() {
                    line.push_str(&format!(" | {tickers}"));
                }
                line
            })
            .collect();
        out.push(s);
    }

    out
}
