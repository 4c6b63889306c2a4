mod connection;
mod device;
mod ice_server;
mod identity;
mod message;
mod peer;

pub use connection::{ConnectionId, ConnectionSet, Direction, PeerConnection, Probe, SyncPhase};
pub use device::{DeviceDescriptor, DeviceKind, DeviceRole, PeerDescriptor};
pub use ice_server::IceServer;
pub use identity::rendezvous_id;
pub use message::Message;
pub use peer::PeerId;
