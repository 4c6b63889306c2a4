use crate::domain::{ConnectionId, ConnectionSet, Probe};
use instant::{Duration, Instant};

/// Work produced by one liveness tick
#[derive(Debug, Default, PartialEq, Eq)]
pub struct LivenessTick {
    /// New probes to arm and announce with a Ping
    pub probes: Vec<(ConnectionId, Probe)>,
    /// Connections whose probe went unanswered
    pub expired: Vec<ConnectionId>,
}

impl LivenessTick {
    pub fn is_empty(&self) -> bool {
        self.probes.is_empty() && self.expired.is_empty()
    }
}

/// Heartbeat schedule over the active connection set
///
/// Reads the connection set but never mutates it; the session applies the
/// tick through the replicator.
#[derive(Debug, Clone)]
pub struct LivenessMonitor {
    interval: Duration,
    timeout: Duration,
    next_round: Option<Instant>,
    next_nonce: u64,
}

impl LivenessMonitor {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            timeout,
            next_round: None,
            next_nonce: 1,
        }
    }

    pub fn start(&mut self, now: Instant) {
        self.next_round = Some(now + self.interval);
    }

    /// Cancel the heartbeat
    pub fn stop(&mut self) {
        self.next_round = None;
    }

    pub fn is_running(&self) -> bool {
        self.next_round.is_some()
    }

    pub fn tick(&mut self, now: Instant, connections: &ConnectionSet) -> LivenessTick {
        let mut tick = LivenessTick::default();
        let Some(next_round) = self.next_round else {
            return tick;
        };

        tick.expired = connections
            .iter()
            .filter(|c| c.probe_expired(now))
            .map(|c| c.id)
            .collect();

        if now >= next_round {
            for connection in connections.iter() {
                if connection.probe.is_some() {
                    continue;
                }
                let probe = Probe {
                    nonce: self.next_nonce,
                    deadline: now + self.timeout,
                };
                self.next_nonce += 1;
                tick.probes.push((connection.id, probe));
            }
            self.next_round = Some(now + self.interval);
        }

        if !tick.is_empty() {
            tracing::trace!(
                "💓 Liveness: {} probes, {} expired",
                tick.probes.len(),
                tick.expired.len()
            );
        }
        tick
    }
}
