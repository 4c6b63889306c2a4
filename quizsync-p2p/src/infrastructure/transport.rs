use crate::domain::{ConnectionId, DeviceDescriptor, Direction, PeerId};
use crate::infrastructure::error::{P2PError, Result};

/// Events surfaced by a transport on `poll_events`
#[derive(Debug)]
pub enum TransportEvent {
    /// This device now owns the identifier passed to `register`
    Registered { id: PeerId },

    /// Registration failed; `P2PError::IdTaken` means another device owns it
    RegistrationFailed { error: P2PError },

    /// Open handshake completed on a logical connection
    ConnectionOpened {
        connection: ConnectionId,
        remote: PeerId,
        descriptor: DeviceDescriptor,
        direction: Direction,
    },

    /// An outbound `connect` did not open
    ConnectFailed {
        connection: ConnectionId,
        error: P2PError,
    },

    /// One message, as sent by the remote
    Data {
        connection: ConnectionId,
        data: Vec<u8>,
    },

    /// Remote closed the connection or it dropped
    Closed { connection: ConnectionId },

    /// Connection-level failure; the connection is unusable afterwards
    Error {
        connection: ConnectionId,
        error: P2PError,
    },
}

/// Peer-to-peer data-channel primitives
///
/// Implementations deliver messages on one connection reliably and in send
/// order. Outcomes of `register` and `connect` arrive as events, so a caller
/// never blocks on the network. Closing a connection locally does not produce
/// a `Closed` event for the closing side.
pub trait Transport {
    /// Claim `id` so other devices can connect to it
    fn register(&mut self, id: &PeerId) -> Result<()>;

    /// Open a connection to the device that registered `remote`
    fn connect(&mut self, remote: &PeerId) -> Result<ConnectionId>;

    fn send(&mut self, connection: ConnectionId, data: Vec<u8>) -> Result<()>;

    fn close(&mut self, connection: ConnectionId);

    fn poll_events(&mut self) -> Vec<TransportEvent>;

    /// Release the identity and close every connection
    fn destroy(&mut self);

    /// Registered identifier, or the anonymous one while not hosting
    fn local_id(&self) -> Option<PeerId>;
}
