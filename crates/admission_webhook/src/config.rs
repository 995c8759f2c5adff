use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

/// Runtime settings, read from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    /// Directory holding `tls.crt` and `tls.key`.
    pub cert_dir: PathBuf,
    pub webhook_addr: SocketAddr,
    pub health_addr: SocketAddr,
    /// Upper bound on a single admission review.
    pub admission_timeout: Duration,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let webhook_addr = get("WEBHOOK_ADDR", "0.0.0.0:8443");
        let health_addr = get("HEALTH_ADDR", "0.0.0.0:8080");
        let timeout = get("ADMISSION_TIMEOUT_SECS", "10");
        let timeout_secs: u64 = timeout
            .parse()
            .with_context(|| format!("ADMISSION_TIMEOUT_SECS={timeout:?} is not a number of seconds"))?;
        if timeout_secs == 0 {
            bail!("ADMISSION_TIMEOUT_SECS must be greater than 0");
        }

        let log_format = match get("LOG_FORMAT", "compact").to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "compact" | "" => LogFormat::Compact,
            other => bail!("LOG_FORMAT={other:?} is not one of json, compact"),
        };

        Ok(Config {
            cert_dir: PathBuf::from(get("WEBHOOK_CERT_DIR", "/etc/certs")),
            webhook_addr: webhook_addr
                .parse()
                .with_context(|| format!("WEBHOOK_ADDR={webhook_addr:?} is not a socket address"))?,
            health_addr: health_addr
                .parse()
                .with_context(|| format!("HEALTH_ADDR={health_addr:?} is not a socket address"))?,
            admission_timeout: Duration::from_secs(timeout_secs),
            log_format,
        })
    }

    pub fn cert_file(&self) -> PathBuf {
        self.cert_dir.join("tls.crt")
    }

    pub fn key_file(&self) -> PathBuf {
        self.cert_dir.join("tls.key")
    }
}
