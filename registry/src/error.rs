//! Error types for registry operations.
//!
//! Expected races (duplicate connect, disconnect after removal) are ordinary
//! return values and never show up here. Only caller-contract violations and
//! collaborator delivery failures are errors.

use crate::record::SocketId;

/// Errors surfaced to the immediate caller of a registry operation.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The socket did not advertise a required identity field.
    #[error("invalid argument: socket {socket_id} has empty {field}")]
    InvalidArgument {
        field: &'static str,
        socket_id: SocketId,
    },
}

/// Delivery failure reported by a collaborator socket.
///
/// These never propagate past the dispatch task that observed them.
#[derive(Debug, thiserror::Error)]
pub enum SocketError {
    #[error("socket closed")]
    Closed,

    #[error("send failed: {0}")]
    Send(String),
}
