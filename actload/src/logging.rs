use anyhow::Context as _;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "ACTLOAD_LOG";
const DEFAULT_DIRECTIVE: &str = "warn";

/// `--log-level` wins over `ACTLOAD_LOG`, which wins over `RUST_LOG`.
pub fn env_filter(level: Option<&str>) -> anyhow::Result<EnvFilter> {
    if let Some(level) = level {
        return EnvFilter::try_new(level).with_context(|| format!("invalid --log-level `{level}`"));
    }

    Ok(EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE)))
}

/// Logs go to stderr so stdout stays reserved for the report.
pub fn init(level: Option<&str>) -> anyhow::Result<()> {
    let filter = env_filter(level)?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))
}
