mod builder;
mod event_queue;
mod sync_session;

pub use builder::SyncSessionBuilder;
pub use event_queue::{EventQueue, QueueError};
pub use sync_session::{SyncSession, SyncView};
