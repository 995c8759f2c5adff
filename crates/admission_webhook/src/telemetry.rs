use tracing_subscriber::{fmt, prelude::*, EnvFilter, Registry};

use crate::config::LogFormat;

/// Initialize tracing
pub fn init(format: LogFormat) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    let collector = Registry::default().with(env_filter);

    match format {
        LogFormat::Json => tracing::subscriber::set_global_default(collector.with(fmt::layer().json()))?,
        LogFormat::Compact => tracing::subscriber::set_global_default(collector.with(fmt::layer().compact()))?,
    }
    Ok(())
}
