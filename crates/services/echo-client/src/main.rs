//! Echo client binary entry point
//!
//! Runs exactly one connection attempt against an echo server and exits 0
//! when the peer connection reached `Connected` before the deadline, 1
//! otherwise. Designed to be driven by scripts, so the verdict lives in the
//! exit code and the last line of output.
//!
//! # Usage
//!
//! ```bash
//! cargo run -p echo-client -- http://localhost:8080/offer
//! cargo run -p echo-client -- --timeout 30 https://echo.example.com/offer
//! ```

use anyhow::Result;
use clap::Parser;
use echo_rtc::{ClientConfig, EchoClient, IceConfig, DEFAULT_ECHO_SERVER_URL};
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// WebRTC echo client
///
/// Posts one offer, applies the answer, and reports whether the connection
/// came up within the deadline.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// URL the offer is posted to
    #[arg(default_value = DEFAULT_ECHO_SERVER_URL)]
    server_url: String,

    /// Deadline for the whole attempt, in seconds
    #[arg(short, long, default_value_t = 10, env = "ECHO_CONNECT_TIMEOUT")]
    timeout: u64,

    /// STUN servers for candidate gathering (comma-separated, may be empty)
    #[arg(
        long,
        value_delimiter = ',',
        default_value = "stun:stun.l.google.com:19302",
        env = "ECHO_STUN_SERVERS"
    )]
    stun_servers: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let client = EchoClient::new(
        ClientConfig {
            server_url: args.server_url,
            connect_timeout_secs: args.timeout,
        },
        IceConfig {
            stun_servers: args.stun_servers,
        },
    );

    match client.connect().await {
        Ok(outcome) => {
            println!("echo client result: {outcome}");
            Ok(ExitCode::from(outcome.exit_code() as u8))
        }
        Err(e) => {
            error!("connection attempt aborted: {e}");
            println!("echo client result: error ({e})");
            Ok(ExitCode::FAILURE)
        }
    }
}
