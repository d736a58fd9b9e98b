use anyhow::Result;
use tracing_subscriber::{fmt, EnvFilter};

pub const LOG_ENV: &str = "DOCMETA_LOG";
const DEFAULT_FILTER: &str = "debug";

/// Installs the stderr subscriber. Without `verbose` nothing is logged so
/// stdout stays clean for piping.
pub fn init(verbose: bool) -> Result<()> {
    if !verbose {
        return Ok(());
    }
    let _ = fmt()
        .with_env_filter(filter_from(std::env::var(LOG_ENV).ok().as_deref()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .try_init();
    Ok(())
}

fn filter_from(directive: Option<&str>) -> EnvFilter {
    directive
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .and_then(|value| EnvFilter::try_new(value).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}
