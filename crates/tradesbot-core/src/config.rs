use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use chrono::{DateTime, NaiveDate, Utc};

use crate::{
    domain::ChannelId, errors::Error, retry::RetryPolicy, source::ThrottleConfig, Result,
};

/// Discord caps history pages at 100 messages.
pub const MAX_PAGE_SIZE: usize = 100;

/// Typed process configuration, loaded once in the binary and handed to the
/// pipelines as `FetchConfig` / `AggregateConfig` values.
#[derive(Clone, Debug)]
pub struct Config {
    // Message source
    pub discord_bot_token: Option<String>,
    pub channel_ids: Vec<ChannelId>,
    pub since: DateTime<Utc>,

    // Fetch behavior
    pub page_size: usize,
    pub max_pages: usize,
    pub fetch_max_attempts: usize,
    pub fetch_retry_base: Duration,
    pub fetch_concurrency: usize,
    pub source_min_interval: Duration,

    // Storage
    pub store: StoreConfig,
    pub summary_fallback_dir: PathBuf,

    // Analysis
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub analysis_top_n: usize,
    pub analysis_concurrency: usize,
    pub analysis_timeout: Duration,

    // Statistics
    pub excerpts_per_ticker: usize,
    pub excerpt_max_chars: usize,
    pub ticker_denylist: Vec<String>,

    // Workspace database
    pub notion_api_token: Option<String>,
    pub notion_database_id: Option<String>,
}

/// Where day logs and summaries live.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreConfig {
    Local { root: PathBuf },
    Gcs { bucket: String, access_token: String },
}

/// Everything the fetcher needs.
#[derive(Clone, Debug)]
pub struct FetchConfig {
    pub channel_ids: Vec<ChannelId>,
    pub page_size: usize,
    pub max_pages: usize,
    pub retry: RetryPolicy,
    pub concurrency: usize,
    pub throttle: ThrottleConfig,
}

/// Everything the aggregator needs.
#[derive(Clone, Debug)]
pub struct AggregateConfig {
    pub excerpts_per_ticker: usize,
    pub excerpt_max_chars: usize,
    pub ticker_denylist: Vec<String>,
    pub analysis_top_n: usize,
    pub analysis_concurrency: usize,
    pub analysis_timeout: Duration,
    pub watchlist_len: usize,
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            excerpts_per_ticker: 3,
            excerpt_max_chars: 200,
            ticker_denylist: Vec::new(),
            analysis_top_n: 10,
            analysis_concurrency: 3,
            analysis_timeout: Duration::from_secs(30),
            watchlist_len: 5,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_env(Utc::now())
    }

    fn from_env(now: DateTime<Utc>) -> Result<Self> {
        let discord_bot_token = env_str("DISCORD_BOT_TOKEN").and_then(non_empty);
        let channel_ids = parse_csv(env_str("CHANNEL_IDS"))
            .into_iter()
            .map(ChannelId)
            .collect();

        let since = match env_str("SINCE_UTC_DATE").and_then(non_empty) {
            Some(raw) => parse_since(&raw)?,
            // Daily job default: the last 24 hours.
            None => now - chrono::Duration::hours(24),
        };

        let page_size = env_usize("FETCH_PAGE_SIZE")
            .unwrap_or(MAX_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        let max_pages = env_usize("FETCH_MAX_PAGES").unwrap_or(50).max(1);
        let fetch_max_attempts = env_usize("FETCH_MAX_ATTEMPTS").unwrap_or(4).max(1);
        let fetch_retry_base =
            Duration::from_millis(env_u64("FETCH_RETRY_BASE_MS").unwrap_or(500));
        let fetch_concurrency = env_usize("FETCH_CONCURRENCY").unwrap_or(2).max(1);
        let source_min_interval =
            Duration::from_millis(env_u64("SOURCE_MIN_INTERVAL_MS").unwrap_or(250));

        let store = match (
            env_str("GCS_BUCKET").and_then(non_empty),
            env_str("GCS_ACCESS_TOKEN").and_then(non_empty),
        ) {
            (Some(bucket), Some(access_token)) => StoreConfig::Gcs {
                bucket,
                access_token,
            },
            (Some(_), None) => {
                return Err(Error::Config(
                    "GCS_BUCKET is set but GCS_ACCESS_TOKEN is missing".to_string(),
                ))
            }
            _ => StoreConfig::Local {
                root: env_path("LOCAL_STORE_DIR").unwrap_or_else(|| PathBuf::from("/tmp/ingest")),
            },
        };
        let summary_fallback_dir = env_path("SUMMARY_FALLBACK_DIR")
            .unwrap_or_else(|| PathBuf::from("/tmp/tradesbot-summaries"));

        let gemini_api_key = env_str("GEMINI_API_KEY").and_then(non_empty);
        let gemini_model = env_str("GEMINI_MODEL")
            .and_then(non_empty)
            .unwrap_or_else(|| "gemini-2.0-flash-001".to_string());
        let analysis_top_n = env_usize("ANALYSIS_TOP_N").unwrap_or(10);
        let analysis_concurrency = env_usize("ANALYSIS_CONCURRENCY").unwrap_or(3).max(1);
        let analysis_timeout =
            Duration::from_millis(env_u64("ANALYSIS_TIMEOUT_MS").unwrap_or(30_000));

        let excerpts_per_ticker = env_usize("EXCERPTS_PER_TICKER").unwrap_or(3);
        let excerpt_max_chars = env_usize("EXCERPT_MAX_CHARS").unwrap_or(200).max(1);
        let ticker_denylist = parse_csv(env_str("TICKER_DENYLIST"))
            .into_iter()
            .map(|s| s.trim_start_matches('$').to_uppercase())
            .collect();

        let notion_api_token = env_str("NOTION_API_TOKEN").and_then(non_empty);
        let notion_database_id = env_str("NOTION_DATABASE_ID").and_then(non_empty);

        Ok(Self {
            discord_bot_token,
            channel_ids,
            since,
            page_size,
            max_pages,
            fetch_max_attempts,
            fetch_retry_base,
            fetch_concurrency,
            source_min_interval,
            store,
            summary_fallback_dir,
            gemini_api_key,
            gemini_model,
            analysis_top_n,
            analysis_concurrency,
            analysis_timeout,
            excerpts_per_ticker,
            excerpt_max_chars,
            ticker_denylist,
            notion_api_token,
            notion_database_id,
        })
    }

    /// The message-source credential; its absence is fatal for fetching.
    pub fn require_discord_token(&self) -> Result<&str> {
        self.discord_bot_token.as_deref().ok_or_else(|| {
            Error::Config("DISCORD_BOT_TOKEN environment variable is required".to_string())
        })
    }

    pub fn fetch_config(&self) -> Result<FetchConfig> {
        if self.channel_ids.is_empty() {
            return Err(Error::Config(
                "CHANNEL_IDS environment variable is required (comma-separated)".to_string(),
            ));
        }
        Ok(FetchConfig {
            channel_ids: self.channel_ids.clone(),
            page_size: self.page_size,
            max_pages: self.max_pages,
            retry: RetryPolicy {
                max_attempts: self.fetch_max_attempts,
                base_delay: self.fetch_retry_base,
                max_delay: Duration::from_secs(30),
            },
            concurrency: self.fetch_concurrency,
            throttle: ThrottleConfig {
                global_min_interval: Duration::from_millis(25),
                per_channel_min_interval: self.source_min_interval,
            },
        })
    }

    pub fn aggregate_config(&self) -> AggregateConfig {
        AggregateConfig {
            excerpts_per_ticker: self.excerpts_per_ticker,
            excerpt_max_chars: self.excerpt_max_chars,
            ticker_denylist: self.ticker_denylist.clone(),
            analysis_top_n: self.analysis_top_n,
            analysis_concurrency: self.analysis_concurrency,
            analysis_timeout: self.analysis_timeout,
            ..AggregateConfig::default()
        }
    }

    /// Notion credentials, when both are configured.
    pub fn notion(&self) -> Option<(&str, &str)> {
        Some((
            self.notion_api_token.as_deref()?,
            self.notion_database_id.as_deref()?,
        ))
    }
}

/// Accepts `YYYY-MM-DD` (midnight UTC) or a full RFC3339 timestamp.
pub fn parse_since(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return d
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc())
            .ok_or_else(|| Error::Config(format!("invalid date: {raw}")));
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Config(format!("invalid SINCE_UTC_DATE {raw:?}: {e}")))
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn parse_csv(v: Option<String>) -> Vec<String> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
