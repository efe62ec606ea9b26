//! Live dashboard in the terminal.
//!
//! Starts a telemetry session (push feed by default), prints the current
//! values and status after every update, and shuts down on Ctrl-C.
//!
//! ```bash
//! RUST_LOG=silkworm_telemetry=debug cargo run --example live_dashboard -- [config.json]
//! ```
//!
//! `SILKWORM_BROKER_URL` in the environment (or a `.env` file) overrides the
//! configured broker.

use futures_util::StreamExt;
use silkworm_telemetry::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), TelemetryError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config = match std::env::args().nth(1) {
        Some(path) => TelemetryConfig::from_json_file(path)?,
        None => TelemetryConfig::default(),
    };
    if let Ok(url) = std::env::var("SILKWORM_BROKER_URL") {
        config.feed.broker_url = url;
    }

    let mut session = TelemetrySession::start(config)?;
    let mut updates = session.updates();

    println!("Devices: {:?}", session.devices().iter().map(|d| &d.name).collect::<Vec<_>>());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            update = updates.next() => {
                let Some(snapshot) = update else { break };
                let now = snapshot.current;
                let report = session.status();
                println!(
                    "[{:?}] {:.1} °C ({}) | {:.1} % ({}) | {} points",
                    session.ready_state(),
                    now.temperature,
                    report.temperature.card_label(),
                    now.humidity,
                    report.humidity.card_label(),
                    snapshot.history.len(),
                );
                for alert in session.alerts().iter().filter(|a| a.severity != Severity::Ok) {
                    println!("  ! {}", alert.message);
                }
            }
        }
    }

    session.shutdown().await;
    Ok(())
}
