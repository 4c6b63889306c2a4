use crate::domain::{DeviceDescriptor, PeerId};
use instant::Instant;
use std::collections::BTreeMap;
use std::fmt;

/// Transport-assigned handle of one logical connection
///
/// Never reused: a reconnect to the same remote gets a new id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Opened by the remote (seen by a host)
    Inbound,
    /// Opened by this device (a client's link to its host)
    Outbound,
}

/// Replication phase of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Connecting,
    /// Client side only: link is open, state not yet received
    AwaitingInitialSync,
    Synced,
}

/// An outstanding liveness probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Probe {
    pub nonce: u64,
    pub deadline: Instant,
}

/// One open connection to another device
#[derive(Debug, Clone)]
pub struct PeerConnection {
    pub id: ConnectionId,
    pub remote: PeerId,
    pub descriptor: DeviceDescriptor,
    pub direction: Direction,
    pub phase: SyncPhase,
    pub opened_at: Instant,
    pub last_pong: Option<Instant>,
    pub probe: Option<Probe>,
}

impl PeerConnection {
    pub fn new(
        id: ConnectionId,
        remote: PeerId,
        descriptor: DeviceDescriptor,
        direction: Direction,
        opened_at: Instant,
    ) -> Self {
        Self {
            id,
            remote,
            descriptor,
            direction,
            phase: SyncPhase::Connecting,
            opened_at,
            last_pong: None,
            probe: None,
        }
    }

    pub fn is_synced(&self) -> bool {
        self.phase == SyncPhase::Synced
    }

    /// Clear the outstanding probe if `nonce` answers it
    ///
    /// Returns false for stale or unsolicited pongs.
    pub fn record_pong(&mut self, nonce: u64, at: Instant) -> bool {
        match self.probe {
            Some(probe) if probe.nonce == nonce => {
                self.probe = None;
                self.last_pong = Some(at);
                true
            }
            _ => false,
        }
    }

    /// Probe deadline passed without a matching pong
    pub fn probe_expired(&self, now: Instant) -> bool {
        self.probe.is_some_and(|probe| now >= probe.deadline)
    }
}

/// The active connection set, ordered by connection id
#[derive(Debug, Default)]
pub struct ConnectionSet {
    connections: BTreeMap<ConnectionId, PeerConnection>,
}

impl ConnectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, connection: PeerConnection) {
        self.connections.insert(connection.id, connection);
    }

    /// Remove a connection; `None` if it was already gone
    pub fn remove(&mut self, id: ConnectionId) -> Option<PeerConnection> {
        self.connections.remove(&id)
    }

    pub fn get(&self, id: ConnectionId) -> Option<&PeerConnection> {
        self.connections.get(&id)
    }

    pub fn get_mut(&mut self, id: ConnectionId) -> Option<&mut PeerConnection> {
        self.connections.get_mut(&id)
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PeerConnection> {
        self.connections.values()
    }

    pub fn ids(&self) -> Vec<ConnectionId> {
        self.connections.keys().copied().collect()
    }

    /// Synced connections, optionally excluding one
    pub fn synced_except(&self, except: Option<ConnectionId>) -> Vec<ConnectionId> {
        self.connections
            .values()
            .filter(|c| c.is_synced() && Some(c.id) != except)
            .map(|c| c.id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
