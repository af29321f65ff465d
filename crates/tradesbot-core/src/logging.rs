use tracing_subscriber::{fmt, EnvFilter};

use crate::{errors::Error, Result};

/// Initialize tracing for a binary.
///
/// Default: info for our crates, warn for everything else.
/// Can be overridden with `RUST_LOG`. Logs go to stderr; stdout carries the
/// run report.
pub fn init(service_name: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,tradesbot=info,tradesbot_core=info,tradesbot_discord=info,\
             tradesbot_gcs=info,tradesbot_gemini=info,tradesbot_notion=info,{service_name}=info"
        ))
    });

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .try_init()
        .map_err(|e| Error::Config(format!("logging init failed: {e}")))
}
