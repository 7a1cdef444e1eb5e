//! OpenAlgo Stream Client Binary
//!
//! Connects to an OpenAlgo stream server, subscribes to a configured set of
//! instruments, and logs every update until interrupted.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin openalgo-stream-client
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `OPENALGO_API_KEY`: API credential
//!
//! ## Optional
//! - `OPENALGO_WS_URL`: Stream server URL (default: ws://127.0.0.1:8765)
//! - `OPENALGO_SYMBOLS`: Comma-separated `EXCHANGE:SYMBOL` list
//!   (default: NSE:INFY)
//! - `OPENALGO_KINDS`: Comma-separated data kinds - ltp | quote | depth
//!   (default: ltp)
//! - `STREAM_CLIENT_HEARTBEAT_INTERVAL_SECS`: Keep-alive ping interval (default: 30)
//! - `STREAM_CLIENT_HEARTBEAT_TIMEOUT_SECS`: Keep-alive probe timeout (default: 10)
//! - `STREAM_CLIENT_RECONNECT_DELAY_SECS`: Delay between reconnect attempts (default: 5)
//! - `STREAM_CLIENT_MAX_RECONNECT_ATTEMPTS`: Reconnect attempt budget (default: 5)
//! - `RUST_LOG`: Log level (default: info)

use anyhow::Context;
use tokio::signal;

use openalgo_stream_client::infrastructure::{metrics, telemetry};
use openalgo_stream_client::{
    StreamClient, StreamSettings, SubscriptionKind, SymbolKey, TickEvent, callback,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    load_dotenv();
    telemetry::init();
    metrics::register_metrics();

    tracing::info!("Starting OpenAlgo stream client");

    let settings = StreamSettings::from_env()?;
    let symbols = parse_symbols()?;
    let kinds = parse_kinds()?;
    log_config(&settings, &symbols, &kinds);

    let client = StreamClient::initialize(settings).await;

    for key in &symbols {
        for kind in &kinds {
            let cb = callback(log_tick);
            match kind {
                SubscriptionKind::Ltp => {
                    client.subscribe_ltp(key.exchange(), key.symbol(), cb).await?;
                }
                SubscriptionKind::Quote => {
                    client.subscribe_quote(key.exchange(), key.symbol(), cb).await?;
                }
                SubscriptionKind::Depth => {
                    client.subscribe_depth(key.exchange(), key.symbol(), cb).await?;
                }
            }
        }
    }

    tracing::info!("Stream client ready");

    await_shutdown().await;

    client.shutdown().await;
    tracing::info!("Stream client stopped");
    Ok(())
}

/// Log one dispatched tick.
fn log_tick(event: &TickEvent) -> Result<(), openalgo_stream_client::CallbackError> {
    match event {
        TickEvent::Ltp(update) => {
            tracing::info!(
                exchange = %update.exchange,
                symbol = %update.symbol,
                ltp = %update.ltp,
                "ltp"
            );
        }
        TickEvent::Quote(update) => {
            tracing::info!(
                exchange = %update.exchange,
                symbol = %update.symbol,
                ltp = ?update.quote.ltp,
                volume = ?update.quote.volume,
                "quote"
            );
        }
        TickEvent::Depth(update) => {
            tracing::info!(
                exchange = %update.exchange,
                symbol = %update.symbol,
                best_bid = ?update.depth.best_bid().map(|level| level.price),
                best_ask = ?update.depth.best_ask().map(|level| level.price),
                "depth"
            );
        }
    }
    Ok(())
}

/// Parse the instrument list from `OPENALGO_SYMBOLS`.
fn parse_symbols() -> anyhow::Result<Vec<SymbolKey>> {
    let raw = std::env::var("OPENALGO_SYMBOLS").unwrap_or_else(|_| "NSE:INFY".to_string());
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<SymbolKey>()
                .with_context(|| format!("bad OPENALGO_SYMBOLS entry `{part}`"))
        })
        .collect()
}

/// Parse the data kind list from `OPENALGO_KINDS`.
fn parse_kinds() -> anyhow::Result<Vec<SubscriptionKind>> {
    let raw = std::env::var("OPENALGO_KINDS").unwrap_or_else(|_| "ltp".to_string());
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<SubscriptionKind>()
                .with_context(|| format!("bad OPENALGO_KINDS entry `{part}`"))
        })
        .collect()
}

/// Load .env from the current directory or any ancestor.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Log the parsed configuration.
fn log_config(settings: &StreamSettings, symbols: &[SymbolKey], kinds: &[SubscriptionKind]) {
    tracing::info!(
        url = %settings.ws_url,
        symbols = symbols.len(),
        kinds = ?kinds.iter().map(|kind| kind.as_str()).collect::<Vec<_>>(),
        max_reconnect_attempts = settings.websocket.max_reconnect_attempts,
        "Configuration loaded"
    );
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        }
    }
}
