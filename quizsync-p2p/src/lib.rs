// Domain layer (connections, identities, wire messages)
pub mod domain;

// Application layer (negotiation, replication, liveness, routing)
pub mod application;

// Infrastructure layer (transports)
pub mod infrastructure;

// Re-exports for convenience
pub use application::{
    MessageRouter, RoleNegotiator, SessionReplicator, SyncConfig, SyncEvent, SyncSession,
    SyncSessionBuilder, SyncView,
};
pub use domain::{
    rendezvous_id, ConnectionId, DeviceDescriptor, DeviceKind, DeviceRole, IceServer, Message,
    PeerDescriptor, PeerId,
};
pub use infrastructure::error::{P2PError, ProtocolError, Result};
pub use infrastructure::{
    EndpointId, MatchboxConfig, MatchboxTransport, MemoryNetwork, MemoryTransport, Transport,
    TransportEvent, DEFAULT_SIGNALLING_SERVER,
};
