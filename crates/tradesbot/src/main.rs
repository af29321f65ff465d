use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};

use tradesbot_core::{
    aggregator::{Aggregator, SummarizeOptions},
    config::{parse_since, Config, StoreConfig},
    domain::ChannelId,
    fetcher::Fetcher,
    ports::ObjectStore,
    report::RunReport,
    source::ThrottledSource,
    storage::{list_available_dates, FsObjectStore},
    Error,
};
use tradesbot_discord::DiscordSource;
use tradesbot_gcs::GcsObjectStore;
use tradesbot_gemini::GeminiClient;
use tradesbot_notion::NotionPublisher;

/// Collect trading-channel history and summarize it per day.
#[derive(Parser, Debug)]
#[command(name = "tradesbot")]
#[command(about = "Ingests Discord trading channels into daily logs and summarizes them")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Append new channel history to the day logs
    Fetch {
        /// Lower bound (YYYY-MM-DD or RFC3339); defaults to SINCE_UTC_DATE
        #[arg(long)]
        since: Option<String>,

        /// Upper bound (exclusive); defaults to now
        #[arg(long)]
        until: Option<String>,

        /// Channel to fetch; repeatable, replaces CHANNEL_IDS
        #[arg(long = "channel")]
        channels: Vec<String>,
    },

    /// Build, store and optionally publish one day's summary
    Summarize {
        /// Day to summarize (YYYY-MM-DD); defaults to the most recent day with logs
        date: Option<NaiveDate>,

        /// Statistics only, no text-generation calls
        #[arg(long)]
        no_ai: bool,

        /// Also create a page in the configured workspace database
        #[arg(long)]
        publish: bool,
    },

    /// List days that have logs
    Dates,
}

fn build_store(cfg: &Config) -> Arc<dyn ObjectStore> {
    match &cfg.store {
        StoreConfig::Local { root } => Arc::new(FsObjectStore::new(root.clone())),
        StoreConfig::Gcs {
            bucket,
            access_token,
        } => Arc::new(GcsObjectStore::new(bucket.clone(), access_token.clone())),
    }
}

async fn run_fetch(
    cfg: &Config,
    since: Option<String>,
    until: Option<String>,
    channels: Vec<String>,
) -> Result<RunReport, Error> {
    let token = cfg.require_discord_token()?;
    let fetch_cfg = if channels.is_empty() {
        cfg.fetch_config()?
    } else {
        let mut overridden = cfg.clone();
        overridden.channel_ids = channels.into_iter().map(ChannelId).collect();
        overridden.fetch_config()?
    };

    let since: DateTime<Utc> = match since {
        Some(raw) => parse_since(&raw)?,
        None => cfg.since,
    };
    let until: DateTime<Utc> = match until {
        Some(raw) => parse_since(&raw)?,
        None => Utc::now(),
    };
    if since >= until {
        return Err(Error::Config(format!(
            "empty fetch window: since {since} is not before until {until}"
        )));
    }

    let discord = Arc::new(DiscordSource::new(token));
    let source = Arc::new(ThrottledSource::new(discord, fetch_cfg.throttle));
    let fetcher = Fetcher::new(source, build_store(cfg), fetch_cfg);

    tracing::info!("fetching history from {since} to {until}");
    let reports = fetcher.fetch_all(since, until).await;
    Ok(RunReport::from_fetch(&reports))
}

async fn run_summarize(
    cfg: &Config,
    date: Option<NaiveDate>,
    no_ai: bool,
    publish: bool,
) -> Result<RunReport, Error> {
    let store = build_store(cfg);
    let fallback: Arc<dyn ObjectStore> =
        Arc::new(FsObjectStore::new(cfg.summary_fallback_dir.clone()));

    let mut aggregator = Aggregator::new(store, cfg.aggregate_config()).with_fallback(fallback);
    if let Some(key) = &cfg.gemini_api_key {
        aggregator = aggregator.with_generator(Arc::new(GeminiClient::new(
            key.clone(),
            cfg.gemini_model.clone(),
        )));
    }
    if let Some((token, database_id)) = cfg.notion() {
        aggregator =
            aggregator.with_publisher(Arc::new(NotionPublisher::new(token, database_id)));
    }

    let date = match date {
        Some(d) => d,
        None => aggregator.latest_date().await?.ok_or_else(|| {
            Error::Config("no day logs found; pass a DATE or run `fetch` first".to_string())
        })?,
    };

    let run = aggregator
        .summarize_day(
            date,
            SummarizeOptions {
                use_ai: !no_ai,
                publish,
            },
        )
        .await?;
    Ok(RunReport::from_summary(&run))
}

async fn run_dates(cfg: &Config) -> Result<(), Error> {
    let store = build_store(cfg);
    let dates = list_available_dates(store.as_ref()).await?;
    if dates.is_empty() {
        println!("no day logs");
    }
    for d in dates {
        println!("{d}");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tradesbot_core::logging::init("tradesbot")?;
    let cli = Cli::parse();
    let cfg = Config::load()?;

    let report = match cli.command {
        Command::Fetch {
            since,
            until,
            channels,
        } => run_fetch(&cfg, since, until, channels).await?,
        Command::Summarize {
            date,
            no_ai,
            publish,
        } => run_summarize(&cfg, date, no_ai, publish).await?,
        Command::Dates => return run_dates(&cfg).await,
    };

    print!("{report}");
    if !report.is_clean() {
        tracing::warn!("run finished with {} failure(s)", report.failures);
    }
    Ok(())
}
