//! Echo server binary entry point
//!
//! Serves the one-shot signaling endpoint (`POST /offer`) plus static files,
//! over HTTP by default or HTTPS when a certificate pair is supplied.
//!
//! # Usage
//!
//! ```bash
//! # Plain HTTP on the default port
//! cargo run -p echo-server
//!
//! # HTTPS with a local certificate pair
//! cargo run -p echo-server -- \
//!   --cert-file ./certs/localhost.pem \
//!   --key-file ./certs/localhost-key.pem
//! ```

use anyhow::Result;
use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use echo_rtc::{build_router, AppState, EchoConfig, SessionRegistry};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// WebRTC echo server
///
/// Accepts one offer per POST to /offer, answers with embedded candidates,
/// and echoes every inbound RTP packet back on the matching track.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Host to bind the HTTP listener to
    #[arg(long, default_value = "0.0.0.0", env = "ECHO_HOST")]
    host: String,

    /// Port to bind the HTTP listener to
    #[arg(short, long, default_value_t = 8080, env = "ECHO_PORT")]
    port: u16,

    /// Directory served for paths other than the signaling endpoints
    #[arg(long, default_value = "./html", env = "ECHO_STATIC_DIR")]
    static_dir: String,

    /// TLS certificate file; enables HTTPS together with --key-file
    #[arg(long, env = "ECHO_CERT_FILE")]
    cert_file: Option<PathBuf>,

    /// TLS private key file
    #[arg(long, env = "ECHO_KEY_FILE")]
    key_file: Option<PathBuf>,

    /// STUN servers for candidate gathering (comma-separated, may be empty)
    #[arg(
        long,
        value_delimiter = ',',
        default_value = "stun:stun.l.google.com:19302",
        env = "ECHO_STUN_SERVERS"
    )]
    stun_servers: Vec<String>,
}

impl Args {
    fn into_config(self) -> EchoConfig {
        let mut config = EchoConfig::default();
        config.server.host = self.host;
        config.server.port = self.port;
        config.server.static_dir = self.static_dir;
        config.server.cert_file = self.cert_file;
        config.server.key_file = self.key_file;
        config.ice.stun_servers = self.stun_servers;
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Args::parse().into_config();
    config.validate()?;
    let config = Arc::new(config);

    let registry = Arc::new(SessionRegistry::new());
    let router = build_router(AppState::new(Arc::clone(&registry), Arc::clone(&config)));

    let bind_addr = config.server.bind_addr();

    if let (Some(cert), Some(key)) = (&config.server.cert_file, &config.server.key_file) {
        let tls = RustlsConfig::from_pem_file(cert, key).await?;

        let addr: SocketAddr = bind_addr.parse()?;
        info!(%addr, "echo server listening (https)");
        axum_server::bind_rustls(addr, tls)
            .serve(router.into_make_service())
            .await?;
    } else {
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(addr = %bind_addr, "echo server listening (http)");
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
    }

    info!("echo server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
