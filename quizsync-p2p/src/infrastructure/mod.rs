pub mod error;
pub mod matchbox;
pub mod memory;
pub mod transport;

pub use error::{P2PError, ProtocolError, Result};
pub use matchbox::{MatchboxConfig, MatchboxTransport, DEFAULT_SIGNALLING_SERVER};
pub use memory::{EndpointId, MemoryNetwork, MemoryTransport};
pub use transport::{Transport, TransportEvent};
