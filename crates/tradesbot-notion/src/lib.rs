//! Notion adapter: one database page per summary.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use tradesbot_core::{
    errors::Error,
    ports::{BodySection, PageProperties, WorkspacePublisher},
    Result,
};

pub const DEFAULT_BASE_URL: &str = "https://api.notion.com/v1";
pub const NOTION_VERSION: &str = "2022-06-28";

/// Notion rejects rich-text items longer than this.
pub const MAX_TEXT_CHARS: usize = 2000;
/// Notion accepts at most this many children on page creation.
pub const MAX_CHILDREN: usize = 100;

#[derive(Clone, Debug)]
pub struct NotionPublisher {
    token: String,
    database_id: String,
    base_url: String,
    http: reqwest::Client,
}

impl NotionPublisher {
    pub fn new(token: impl Into<String>, database_id: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("reqwest client build");
        Self {
            token: token.into(),
            database_id: database_id.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            http,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

fn clamp(text: &str) -> String {
    if text.chars().count() <= MAX_TEXT_CHARS {
        return text.to_string();
    }
    let mut out: String = text.chars().take(MAX_TEXT_CHARS - 3).collect();
    out.push_str("...");
    out
}

fn rich_text(text: &str) -> Value {
    json!([{"type": "text", "text": {"content": clamp(text)}}])
}

fn block(kind: &str, text: &str) -> Value {
    json!({"object": "block", "type": kind, kind: {"rich_text": rich_text(text)}})
}

pub fn properties_json(p: &PageProperties) -> Value {
    let tickers: Vec<Value> = p.top_tickers.iter().map(|t| json!({"name": t})).collect();
    json!({
        "Name": {"title": rich_text(&p.title)},
        "Date": {"date": {"start": p.date.format("%Y-%m-%d").to_string()}},
        "Total Messages": {"number": p.total_messages},
        "Unique Authors": {"number": p.unique_authors},
        "Top Tickers": {"multi_select": tickers},
        "AI Analysis": {"checkbox": p.ai_analysis},
    })
}

/// Blocks for the page body, capped at `MAX_CHILDREN`.
///
/// A divider separates top-level sections.
pub fn children_json(sections: &[BodySection]) -> Vec<Value> {
    let mut blocks = Vec::new();
    for (i, s) in sections.iter().enumerate() {
        if i > 0 && s.level <= 2 {
            blocks.push(json!({"object": "block", "type": "divider", "divider": {}}));
        }
        let heading = match s.level {
            0..=1 => "heading_1",
            2 => "heading_2",
            _ => "heading_3",
        };
        blocks.push(block(heading, &s.heading));
        blocks.extend(s.paragraphs.iter().map(|p| block("paragraph", p)));
        blocks.extend(s.bullets.iter().map(|b| block("bulleted_list_item", b)));
    }
    if blocks.len() > MAX_CHILDREN {
        tracing::warn!(
            "notion page body truncated from {} to {MAX_CHILDREN} blocks",
            blocks.len()
        );
        blocks.truncate(MAX_CHILDREN);
    }
    blocks
}

#[async_trait]
impl WorkspacePublisher for NotionPublisher {
    async fn create_page(&self, properties: &PageProperties, sections: &[BodySection]) -> Result<String> {
        let body = json!({
            "parent": {"database_id": self.database_id},
            "properties": properties_json(properties),
            "children": children_json(sections),
        });

        let resp = self
            .http
            .post(format!("{}/pages", self.base_url))
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Publish(format!("notion request error: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Publish(format!(
                "notion create page failed: {status} {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let v: Value = resp
            .json()
            .await
            .map_err(|e| Error::Publish(format!("notion json error: {e}")))?;
        let id = v
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Publish("notion response has no page id".to_string()))?;
        if let Some(url) = v.get("url").and_then(Value::as_str) {
            tracing::info!("notion page created: {url}");
        }
        Ok(id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn properties_match_database_schema() {
        let p = PageProperties {
            title: "Discord Trading Summary - 2025-09-20".into(),
            date: NaiveDate::from_ymd_opt(2025, 9, 20).unwrap(),
            total_messages: 4,
            unique_authors: 2,
            top_tickers: vec!["NVDA".into(), "TSLA".into()],
            ai_analysis: true,
        };
        let v = properties_json(&p);
        assert_eq!(
            v["Name"]["title"][0]["text"]["content"],
            "Discord Trading Summary - 2025-09-20"
        );
        assert_eq!(v["Date"]["date"]["start"], "2025-09-20");
        assert_eq!(v["Total Messages"]["number"], 4);
        assert_eq!(v["Top Tickers"]["multi_select"][1]["name"], "TSLA");
        assert_eq!(v["AI Analysis"]["checkbox"], true);
    }

    #[test]
    fn long_text_and_many_blocks_are_clamped() {
        let sections = vec![
            BodySection {
                heading: "Overview".into(),
                level: 2,
                paragraphs: vec!["x".repeat(5000)],
                bullets: vec![],
            },
            BodySection {
                heading: "Channel Breakdown".into(),
                level: 2,
                paragraphs: vec![],
                bullets: (0..150).map(|i| format!("channel {i}")).collect(),
            },
        ];
        let blocks = children_json(&sections);
        assert_eq!(blocks.len(), MAX_CHILDREN);
        assert_eq!(blocks[0]["type"], "heading_2");
        let para = blocks[1]["paragraph"]["rich_text"][0]["text"]["content"]
            .as_str()
            .unwrap();
        assert_eq!(para.chars().count(), MAX_TEXT_CHARS);
        assert_eq!(blocks[2]["type"], "divider");
    }

    #[test]
    fn subsections_are_not_divided() {
        let sections = vec![
            BodySection { heading: "Ticker Analysis".into(), level: 2, ..Default::default() },
            BodySection { heading: "$NVDA".into(), level: 3, ..Default::default() },
        ];
        let blocks = children_json(&sections);
        let kinds: Vec<_> = blocks.iter().map(|b| b["type"].as_str().unwrap()).collect();
        assert_eq!(kinds, vec!["heading_2", "heading_3"]);
    }
}
