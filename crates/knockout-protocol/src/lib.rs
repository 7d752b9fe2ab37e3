//! Wire protocol for Knockout.
//!
//! This crate defines what clients and the server say to each other:
//!
//! - **Types** ([`ClientMessage`], [`ServerMessage`], [`ClientId`],
//!   [`Phase`], [`TimerKind`]): the records that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how those records are
//!   converted to and from bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! ```text
//! Transport (bytes) → Protocol (ClientMessage) → Room (game state)
//! Room (ServerMessage) → Protocol (bytes) → Transport
//! ```
//!
//! The protocol layer knows nothing about rooms or connections.

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{ClientId, ClientMessage, Phase, ServerMessage, TimerKind};
