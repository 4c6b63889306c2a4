use crate::domain::DeviceDescriptor;
use instant::Duration;

/// Configuration for a synchronized session
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Interval between liveness rounds
    pub ping_interval: Duration,

    /// How long a ping may stay unanswered
    pub ping_timeout: Duration,

    /// How long a client waits for InitialSync after its link opens
    pub sync_timeout: Duration,

    /// Consecutive failed negotiation rounds before falling back to solo mode
    pub max_election_rounds: u32,

    /// Name and kind announced to other devices
    pub device: DeviceDescriptor,

    /// Capacity of the UI event queue
    pub event_queue_size: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(5),
            ping_timeout: Duration::from_secs(3),
            sync_timeout: Duration::from_secs(10),
            max_election_rounds: 5,
            device: DeviceDescriptor::default(),
            event_queue_size: 256,
        }
    }
}

impl SyncConfig {
    pub fn new(device: DeviceDescriptor) -> Self {
        Self {
            device,
            ..Default::default()
        }
    }

    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    pub fn with_ping_timeout(mut self, timeout: Duration) -> Self {
        self.ping_timeout = timeout;
        self
    }

    pub fn with_sync_timeout(mut self, timeout: Duration) -> Self {
        self.sync_timeout = timeout;
        self
    }

    pub fn with_max_election_rounds(mut self, rounds: u32) -> Self {
        self.max_election_rounds = rounds.max(1);
        self
    }

    pub fn with_event_queue_size(mut self, size: usize) -> Self {
        self.event_queue_size = size;
        self
    }
}
