//! Runs a Knockout server.
//!
//! Environment:
//! - `KNOCKOUT_BIND` — listen address (default `127.0.0.1:8080`)
//! - `KNOCKOUT_STYLE` — `simultaneous` (default) or `turn-based`
//! - `KNOCKOUT_RESOLUTION` — `all-pairs` (default) or `adjacent`
//! - `RUST_LOG` — log filter (default `info`)

use knockout::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), KnockoutError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let bind = std::env::var("KNOCKOUT_BIND").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    let style = match std::env::var("KNOCKOUT_STYLE") {
        Ok(name) => PlayStyle::from_name(&name).unwrap_or_else(|| {
            tracing::warn!(%name, "unknown KNOCKOUT_STYLE, using simultaneous");
            PlayStyle::Simultaneous
        }),
        Err(_) => PlayStyle::Simultaneous,
    };
    let resolution = match std::env::var("KNOCKOUT_RESOLUTION") {
        Ok(name) => ResolutionPolicy::from_name(&name).unwrap_or_else(|| {
            tracing::warn!(%name, "unknown KNOCKOUT_RESOLUTION, using all-pairs");
            ResolutionPolicy::AllPairs
        }),
        Err(_) => ResolutionPolicy::AllPairs,
    };

    let server = KnockoutServer::builder()
        .bind(&bind)
        .room_config(RoomConfig {
            style,
            resolution,
            ..RoomConfig::default()
        })
        .build()
        .await?;
    tracing::info!(addr = %server.local_addr()?, ?style, ?resolution, "listening");

    tokio::select! {
        result = server.run() => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
            Ok(())
        }
    }
}
