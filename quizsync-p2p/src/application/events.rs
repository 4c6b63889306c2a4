use crate::domain::{DeviceRole, PeerDescriptor, PeerId};
use quizsync_core::{QuestionId, Verdict};

/// Events emitted by a synchronized session for the UI layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// This device took a role in the star topology
    RoleAssumed(DeviceRole),
    /// Synchronization gave up; the session keeps running locally
    EnteredSolo { reason: String },
    /// Another device connected
    PeerConnected(PeerDescriptor),
    /// A device went away
    PeerDisconnected { remote: PeerId },
    /// Counters were received from the host
    Synced { remote: PeerId },
    /// Session state changed, locally or from a peer
    StateChanged,
    /// The current question was evaluated
    AnswerChecked {
        question_id: QuestionId,
        verdict: Verdict,
    },
}
