use crate::domain::{ConnectionId, PeerId};
use quizsync_core::SessionError;

/// Transport and session-driver errors
#[derive(Debug, thiserror::Error)]
pub enum P2PError {
    #[error("Identifier already taken: {0}")]
    IdTaken(PeerId),

    #[error("Registration failed: {0}")]
    RegistrationFailed(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Peer unavailable: {0}")]
    PeerUnavailable(PeerId),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Connection closed: {0}")]
    ConnectionClosed(ConnectionId),

    #[error("Transport destroyed")]
    Destroyed,

    #[error("Only the host or a solo device can do this")]
    NotHost,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl P2PError {
    /// The "identifier taken" outcome of a registration attempt
    pub fn is_id_taken(&self) -> bool {
        matches!(self, P2PError::IdTaken(_))
    }
}

pub type Result<T> = std::result::Result<T, P2PError>;

/// Inbound traffic that is dropped with a diagnostic
///
/// None of these close the connection.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    Malformed(String),

    #[error("Unknown message type: {0}")]
    UnknownTag(String),

    #[error("Message on unknown connection {0}")]
    UnknownConnection(ConnectionId),

    #[error("Duplicate initial sync on {0}")]
    DuplicateInitialSync(ConnectionId),

    #[error("Initial sync on {0}, which does not expect one")]
    UnexpectedInitialSync(ConnectionId),

    #[error("{tag} on {connection} before initial sync")]
    NotSynced {
        connection: ConnectionId,
        tag: &'static str,
    },

    #[error("Rejected by session: {0}")]
    Rejected(#[from] SessionError),
}
