//! # Knockout
//!
//! Server for a multiplayer rock/paper/scissors elimination game.
//!
//! Clients connect over WebSocket, land in a named room, ready up, and play
//! rounds until one player is left standing. Rooms run either
//! simultaneously (everyone picks against a round clock) or turn by turn.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use knockout::prelude::*;
//!
//! # async fn start() -> Result<(), KnockoutError> {
//! let server = KnockoutServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod server;

pub use error::KnockoutError;
pub use server::{KnockoutServer, KnockoutServerBuilder, ServerConfig};

pub mod prelude {
    pub use crate::{KnockoutError, KnockoutServer, KnockoutServerBuilder, ServerConfig};

    pub use knockout_protocol::{
        ClientId, ClientMessage, Codec, JsonCodec, Phase, ProtocolError, ServerMessage, TimerKind,
    };
    pub use knockout_room::{
        Choice, PlayStyle, ResolutionPolicy, RoomConfig, RoomError, RoomHandle, RoomId,
        RoomManager, RoomSnapshot, Status,
    };
    pub use knockout_transport::{Connection, ConnectionId, Transport, TransportError};
}
