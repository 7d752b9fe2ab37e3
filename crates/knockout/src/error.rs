//! Unified error type for the Knockout server.

use knockout_protocol::ProtocolError;
use knockout_room::RoomError;
use knockout_transport::TransportError;

/// Top-level error that wraps every crate-specific error.
///
/// The `#[from]` attribute on each variant lets `?` convert sub-crate
/// errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum KnockoutError {
    /// A transport-level error (bind, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, unexpected message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A room-level error (full, not found, unavailable).
    #[error(transparent)]
    Room(#[from] RoomError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let knockout_err: KnockoutError = err.into();
        assert!(matches!(knockout_err, KnockoutError::Transport(_)));
        assert!(knockout_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidMessage("bad".into());
        let knockout_err: KnockoutError = err.into();
        assert!(matches!(knockout_err, KnockoutError::Protocol(_)));
    }

    #[test]
    fn test_from_room_error() {
        let err = RoomError::NotFound(knockout_room::RoomId(1));
        let knockout_err: KnockoutError = err.into();
        assert!(matches!(knockout_err, KnockoutError::Room(_)));
        assert_eq!(knockout_err.to_string(), "room R-1 not found");
    }
}
