use anyhow::Result;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

const WATCHED_FILES: [&str; 2] = ["tls.crt", "tls.key"];

/// Flags a server restart when the serving certificate or key changes on disk.
#[derive(Clone)]
pub struct CertificateReloader {
    cert_dir: PathBuf,
    changed: Arc<AtomicBool>,
}

impl CertificateReloader {
    pub fn new(cert_dir: impl Into<PathBuf>) -> Self {
        Self {
            cert_dir: cert_dir.into(),
            changed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns whether a change was seen since the last call, clearing the flag.
    pub fn take_change(&self) -> bool {
        self.changed.swap(false, Ordering::Relaxed)
    }

    pub fn start_watching(&self) {
        let changed = self.changed.clone();
        let cert_dir = self.cert_dir.clone();

        tokio::spawn(async move {
            if let Err(e) = watch_certificates(&cert_dir, changed).await {
                error!("Certificate watcher failed: {}", e);
            }
        });
    }
}

fn touches_certificates(event: &Event) -> bool {
    event.paths.iter().any(|path| {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| WATCHED_FILES.contains(&name))
    })
}

async fn watch_certificates(cert_dir: &Path, changed: Arc<AtomicBool>) -> Result<()> {
    let (tx, mut rx) = mpsc::channel(100);

    let mut watcher = RecommendedWatcher::new(
        move |res: Result<Event, notify::Error>| {
            if let Err(e) = tx.blocking_send(res) {
                error!("Failed to send file watcher event: {}", e);
            }
        },
        Config::default(),
    )?;

    // Secret volumes swap a symlinked directory, so watch recursively.
    watcher.watch(cert_dir, RecursiveMode::Recursive)?;
    info!("Started watching certificate directory: {}", cert_dir.display());

    while let Some(event_result) = rx.recv().await {
        match event_result {
            Ok(event) if touches_certificates(&event) => {
                info!("Certificate files changed - signaling server restart");
                changed.store(true, Ordering::Relaxed);
            }
            Ok(_) => {}
            Err(e) => {
                warn!("File watcher error: {}", e);
            }
        }
    }

    Ok(())
}
