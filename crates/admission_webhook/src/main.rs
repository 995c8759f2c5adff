use axum::{extract::State, http::StatusCode, routing::get, Router};
use axum_server::tls_rustls::RustlsConfig;
use kube::Client;
use ops_admission::{KubeResumer, KubeStore, OpsRequestValidator};
use prometheus::{Encoder, Registry, TextEncoder};
use std::sync::Arc;
use tracing::{error, info, warn};

mod cert_reloader;
mod config;
mod metrics;
mod telemetry;
mod validator;

use cert_reloader::CertificateReloader;
use config::Config;
use metrics::Metrics;
use validator::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::CryptoProvider::install_default(rustls::crypto::aws_lc_rs::default_provider()).ok();

    let config = Config::from_env()?;
    telemetry::init(config.log_format)?;

    let registry = Registry::new();
    let metrics = Metrics::new()?.register(&registry)?;

    let client = Client::try_default().await?;
    let validator = OpsRequestValidator::new(
        Arc::new(KubeStore::new(client.clone())),
        Arc::new(KubeResumer::new(client)),
    );
    let state = Arc::new(AppState {
        validator,
        metrics,
        timeout: config.admission_timeout,
    });

    let health_addr = config.health_addr;
    let health_app = Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(registry);
    tokio::spawn(async move {
        let served = match tokio::net::TcpListener::bind(health_addr).await {
            Ok(listener) => {
                info!("Health server listening on {}", health_addr);
                axum::serve(listener, health_app).await
            }
            Err(e) => Err(e),
        };
        if let Err(e) = served {
            error!("Health server failed: {}", e);
        }
    });

    let cert_reloader = CertificateReloader::new(&config.cert_dir);
    cert_reloader.start_watching();

    loop {
        info!("Starting OpsRequest admission webhook");
        let tls_config = RustlsConfig::from_pem_file(config.cert_file(), config.key_file()).await?;
        let app = validator::router(state.clone());

        info!(
            "Admission webhook listening on {} (HTTPS) with certificate auto-reload",
            config.webhook_addr
        );
        let addr = config.webhook_addr;
        let server_handle = tokio::spawn(async move {
            axum_server::bind_rustls(addr, tls_config)
                .serve(app.into_make_service())
                .await
        });

        // Check for certificate changes every second
        loop {
            tokio::time::sleep(tokio::time::Duration::from_secs(1)).await;

            if cert_reloader.take_change() {
                info!("Certificate change detected - restarting server");
                server_handle.abort();
                break;
            }

            if server_handle.is_finished() {
                match server_handle.await {
                    Ok(Ok(())) => {
                        info!("Server exited normally");
                        return Ok(());
                    }
                    Ok(Err(e)) => {
                        warn!("Server error: {}", e);
                        break;
                    }
                    Err(_) => {
                        info!("Server aborted for restart");
                        break;
                    }
                }
            }
        }

        // Small delay before restart
        tokio::time::sleep(tokio::time::Duration::from_secs(1)).await;
    }
}

async fn health_handler() -> &'static str {
    "healthy"
}

async fn metrics_handler(State(registry): State<Registry>) -> Result<String, StatusCode> {
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&registry.gather(), &mut buffer)
        .map_err(|e| {
            warn!("Failed to encode metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    String::from_utf8(buffer).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}
