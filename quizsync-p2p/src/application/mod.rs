mod config;
mod events;
pub mod liveness;
pub mod negotiator;
pub mod replicator;
pub mod router;
pub mod runtime;

pub use config::SyncConfig;
pub use events::SyncEvent;
pub use liveness::{LivenessMonitor, LivenessTick};
pub use negotiator::{
    JoinAttempt, NegotiationAction, NegotiationEvent, NegotiationState, RoleNegotiator,
};
pub use replicator::{Inbound, SessionReplicator};
pub use router::{Dispatch, MessageRouter};
pub use runtime::{EventQueue, QueueError, SyncSession, SyncSessionBuilder, SyncView};
