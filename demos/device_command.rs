//! Send one actuator command over the push feed.
//!
//! ```bash
//! cargo run --example device_command -- FAN on
//! ```

use std::time::Duration;

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

    let mut args = std::env::args().skip(1);
    let device = args.next().unwrap_or_else(|| "FAN".to_string());
    let action: Action = args
        .next()
        .as_deref()
        .unwrap_or("on")
        .parse()
        .map_err(TelemetryError::Other)?;

    let mut builder = TelemetrySession::builder().transport_mode(TransportMode::Push);
    if let Ok(url) = std::env::var("SILKWORM_BROKER_URL") {
        builder = builder.broker_url(&url);
    }
    let mut session = builder.build()?;

    // commands are dropped while not connected, so wait for the broker first
    let deadline = tokio::time::Instant::now() + Duration::from_secs(15);
    while session.ready_state() != ReadyState::Connected {
        if tokio::time::Instant::now() >= deadline {
            session.shutdown().await;
            return Err(FeedError::ConnectionFailed("broker did not accept the connection".into()).into());
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    session.dispatch(device.as_str(), action)?;
    println!("Sent {}", DeviceCommand::new(device.as_str(), action).token());

    // let the client flush the publish before disconnecting
    tokio::time::sleep(Duration::from_millis(500)).await;
    session.shutdown().await;
    Ok(())
}
