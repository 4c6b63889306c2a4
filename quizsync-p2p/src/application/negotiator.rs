//! Host/client role negotiation.
//!
//! A pure state machine: events in, actions out. The session driver performs
//! the actions against the transport and feeds the outcomes back as events.

use crate::domain::{ConnectionId, DeviceRole};

/// Why the device is joining rather than hosting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinAttempt {
    /// Registration found the identifier taken
    Initial,
    /// The link to the host dropped; one retry to the same identifier
    Reconnect,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NegotiationState {
    Idle,
    Registering,
    Hosting,
    Joining {
        connection: Option<ConnectionId>,
        attempt: JoinAttempt,
    },
    /// Link to the host is open; waiting for its initial sync
    Syncing {
        connection: ConnectionId,
        attempt: JoinAttempt,
    },
    Joined {
        connection: ConnectionId,
        attempt: JoinAttempt,
    },
    /// No synchronization; terminal until restarted
    Solo {
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NegotiationEvent {
    Start,
    /// Synchronization is switched off for this session
    Disabled,
    RegisterSucceeded,
    RegisterFailed {
        taken: bool,
        reason: String,
    },
    ConnectIssued(ConnectionId),
    LinkOpened(ConnectionId),
    /// The host's initial sync arrived on this link
    Synced(ConnectionId),
    /// A connect attempt failed before opening; `None` if no id was assigned
    LinkFailed(Option<ConnectionId>),
    /// An open link closed, timed out or never delivered its initial sync
    LinkClosed(ConnectionId),
    Stop,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NegotiationAction {
    /// Register the rendezvous identifier
    Register,
    /// Connect to the rendezvous identifier
    Connect,
    AssumeRole(DeviceRole),
    EnterSolo { reason: String },
}

/// Decides whether this device hosts or joins, and re-elects on host loss
#[derive(Debug, Clone)]
pub struct RoleNegotiator {
    state: NegotiationState,
    failed_rounds: u32,
    max_rounds: u32,
}

impl RoleNegotiator {
    /// `max_rounds` consecutive failed rounds send the device into solo mode
    pub fn new(max_rounds: u32) -> Self {
        Self {
            state: NegotiationState::Idle,
            failed_rounds: 0,
            max_rounds: max_rounds.max(1),
        }
    }

    pub fn state(&self) -> &NegotiationState {
        &self.state
    }

    pub fn failed_rounds(&self) -> u32 {
        self.failed_rounds
    }

    /// Role for presentation; a client stays a client while reconnecting
    pub fn role(&self) -> Option<DeviceRole> {
        match self.state {
            NegotiationState::Hosting => Some(DeviceRole::Host),
            NegotiationState::Joined { .. }
            | NegotiationState::Syncing { .. }
            | NegotiationState::Joining {
                attempt: JoinAttempt::Reconnect,
                ..
            } => Some(DeviceRole::Client),
            _ => None,
        }
    }

    pub fn is_solo(&self) -> bool {
        matches!(self.state, NegotiationState::Solo { .. })
    }

    /// The connection a pending join is waiting on
    pub fn expects(&self, connection: ConnectionId) -> bool {
        matches!(
            self.state,
            NegotiationState::Joining { connection: Some(c), .. } if c == connection
        )
    }

    /// The open link to the host, if this device is a client
    pub fn host_link(&self) -> Option<ConnectionId> {
        match self.state {
            NegotiationState::Joined { connection, .. } => Some(connection),
            _ => None,
        }
    }

    pub fn on_event(&mut self, event: NegotiationEvent) -> Vec<NegotiationAction> {
        let state = std::mem::replace(&mut self.state, NegotiationState::Idle);
        let previous = state.clone();

        let (next, actions) = match (state, event) {
            (_, NegotiationEvent::Stop) => (NegotiationState::Idle, vec![]),

            (NegotiationState::Idle, NegotiationEvent::Start) => {
                (NegotiationState::Registering, vec![NegotiationAction::Register])
            }
            (NegotiationState::Idle, NegotiationEvent::Disabled) => {
                let reason = "synchronization disabled".to_string();
                (
                    NegotiationState::Solo {
                        reason: reason.clone(),
                    },
                    vec![NegotiationAction::EnterSolo { reason }],
                )
            }

            (NegotiationState::Registering, NegotiationEvent::RegisterSucceeded) => {
                self.failed_rounds = 0;
                (
                    NegotiationState::Hosting,
                    vec![NegotiationAction::AssumeRole(DeviceRole::Host)],
                )
            }
            (NegotiationState::Registering, NegotiationEvent::RegisterFailed { taken: true, .. }) => (
                NegotiationState::Joining {
                    connection: None,
                    attempt: JoinAttempt::Initial,
                },
                vec![NegotiationAction::Connect],
            ),
            (
                NegotiationState::Registering,
                NegotiationEvent::RegisterFailed {
                    taken: false,
                    reason,
                },
            ) => (
                NegotiationState::Solo {
                    reason: reason.clone(),
                },
                vec![NegotiationAction::EnterSolo { reason }],
            ),

            (NegotiationState::Joining { connection: None, attempt }, NegotiationEvent::ConnectIssued(c)) => (
                NegotiationState::Joining {
                    connection: Some(c),
                    attempt,
                },
                vec![],
            ),
            (
                NegotiationState::Joining {
                    connection: Some(c),
                    attempt,
                },
                NegotiationEvent::LinkOpened(opened),
            ) if c == opened => (
                NegotiationState::Syncing {
                    connection: c,
                    attempt,
                },
                vec![NegotiationAction::AssumeRole(DeviceRole::Client)],
            ),
            (NegotiationState::Joining { connection, attempt }, NegotiationEvent::LinkFailed(failed))
                if failed.is_none() || failed == connection =>
            {
                self.round_failed(attempt)
            }
            (
                NegotiationState::Joining {
                    connection: Some(c),
                    attempt,
                },
                NegotiationEvent::LinkClosed(closed),
            ) if c == closed => self.round_failed(attempt),

            // A round only counts as won once the host's state arrived
            (NegotiationState::Syncing { connection, attempt }, NegotiationEvent::Synced(synced))
                if connection == synced =>
            {
                self.failed_rounds = 0;
                (NegotiationState::Joined { connection, attempt }, vec![])
            }
            (NegotiationState::Syncing { connection, attempt }, NegotiationEvent::LinkClosed(closed))
                if connection == closed =>
            {
                self.round_failed(attempt)
            }

            (
                NegotiationState::Joined {
                    connection,
                    attempt: JoinAttempt::Reconnect,
                },
                NegotiationEvent::LinkClosed(closed),
            ) if connection == closed => self.round_failed(JoinAttempt::Reconnect),
            (
                NegotiationState::Joined {
                    connection,
                    attempt: JoinAttempt::Initial,
                },
                NegotiationEvent::LinkClosed(closed),
            ) if connection == closed => {
                (
                    NegotiationState::Joining {
                        connection: None,
                        attempt: JoinAttempt::Reconnect,
                    },
                    vec![NegotiationAction::Connect],
                )
            }

            // Everything else, including a host losing a client, leaves the state alone
            (state, _) => (state, vec![]),
        };

        if next != previous {
            tracing::debug!("Negotiation: {:?} -> {:?}", previous, next);
        }
        self.state = next;
        actions
    }

    /// A join attempt did not produce a usable link: re-run registration,
    /// or give up once too many rounds in a row failed
    fn round_failed(&mut self, attempt: JoinAttempt) -> (NegotiationState, Vec<NegotiationAction>) {
        self.failed_rounds += 1;
        if self.failed_rounds >= self.max_rounds {
            let reason = format!(
                "no host reachable after {} negotiation rounds",
                self.failed_rounds
            );
            return (
                NegotiationState::Solo {
                    reason: reason.clone(),
                },
                vec![NegotiationAction::EnterSolo { reason }],
            );
        }

        tracing::debug!(
            "Join attempt ({:?}) failed, round {}/{}: registering again",
            attempt,
            self.failed_rounds,
            self.max_rounds
        );
        (NegotiationState::Registering, vec![NegotiationAction::Register])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn taken() -> NegotiationEvent {
        NegotiationEvent::RegisterFailed {
            taken: true,
            reason: "taken".to_string(),
        }
    }

    fn joined(negotiator: &mut RoleNegotiator, c: u64) {
        negotiator.on_event(NegotiationEvent::Start);
        negotiator.on_event(taken());
        negotiator.on_event(NegotiationEvent::ConnectIssued(ConnectionId(c)));
        negotiator.on_event(NegotiationEvent::LinkOpened(ConnectionId(c)));
        negotiator.on_event(NegotiationEvent::Synced(ConnectionId(c)));
    }

    #[test]
    fn test_registration_success_hosts() {
        let mut negotiator = RoleNegotiator::new(5);

        assert_eq!(
            negotiator.on_event(NegotiationEvent::Start),
            vec![NegotiationAction::Register]
        );
        assert_eq!(
            negotiator.on_event(NegotiationEvent::RegisterSucceeded),
            vec![NegotiationAction::AssumeRole(DeviceRole::Host)]
        );
        assert_eq!(negotiator.role(), Some(DeviceRole::Host));
    }

    #[test]
    fn test_taken_identifier_joins() {
        let mut negotiator = RoleNegotiator::new(5);
        negotiator.on_event(NegotiationEvent::Start);

        assert_eq!(negotiator.on_event(taken()), vec![NegotiationAction::Connect]);
        assert_eq!(negotiator.role(), None);

        negotiator.on_event(NegotiationEvent::ConnectIssued(ConnectionId(4)));
        assert!(negotiator.expects(ConnectionId(4)));

        assert_eq!(
            negotiator.on_event(NegotiationEvent::LinkOpened(ConnectionId(4))),
            vec![NegotiationAction::AssumeRole(DeviceRole::Client)]
        );
        assert_eq!(negotiator.role(), Some(DeviceRole::Client));
        assert_eq!(negotiator.host_link(), None);

        assert!(negotiator
            .on_event(NegotiationEvent::Synced(ConnectionId(4)))
            .is_empty());
        assert_eq!(negotiator.host_link(), Some(ConnectionId(4)));
    }

    #[test]
    fn test_other_registration_error_goes_solo() {
        let mut negotiator = RoleNegotiator::new(5);
        negotiator.on_event(NegotiationEvent::Start);

        let actions = negotiator.on_event(NegotiationEvent::RegisterFailed {
            taken: false,
            reason: "signalling server down".to_string(),
        });

        assert_eq!(
            actions,
            vec![NegotiationAction::EnterSolo {
                reason: "signalling server down".to_string()
            }]
        );
        assert!(negotiator.is_solo());
    }

    #[test]
    fn test_unreachable_host_retries_registration() {
        let mut negotiator = RoleNegotiator::new(5);
        negotiator.on_event(NegotiationEvent::Start);
        negotiator.on_event(taken());
        negotiator.on_event(NegotiationEvent::ConnectIssued(ConnectionId(1)));

        assert_eq!(
            negotiator.on_event(NegotiationEvent::LinkFailed(Some(ConnectionId(1)))),
            vec![NegotiationAction::Register]
        );
        assert_eq!(negotiator.state(), &NegotiationState::Registering);
    }

    #[test]
    fn test_lost_host_reconnects_once_then_reelects() {
        let mut negotiator = RoleNegotiator::new(5);
        joined(&mut negotiator, 1);

        assert_eq!(
            negotiator.on_event(NegotiationEvent::LinkClosed(ConnectionId(1))),
            vec![NegotiationAction::Connect]
        );
        assert_eq!(negotiator.role(), Some(DeviceRole::Client));

        negotiator.on_event(NegotiationEvent::ConnectIssued(ConnectionId(2)));
        assert_eq!(
            negotiator.on_event(NegotiationEvent::LinkFailed(Some(ConnectionId(2)))),
            vec![NegotiationAction::Register]
        );

        assert_eq!(
            negotiator.on_event(NegotiationEvent::RegisterSucceeded),
            vec![NegotiationAction::AssumeRole(DeviceRole::Host)]
        );
    }

    #[test]
    fn test_successful_reconnect_stays_client() {
        let mut negotiator = RoleNegotiator::new(5);
        joined(&mut negotiator, 1);

        negotiator.on_event(NegotiationEvent::LinkClosed(ConnectionId(1)));
        negotiator.on_event(NegotiationEvent::ConnectIssued(ConnectionId(2)));
        negotiator.on_event(NegotiationEvent::LinkOpened(ConnectionId(2)));
        negotiator.on_event(NegotiationEvent::Synced(ConnectionId(2)));

        assert_eq!(negotiator.host_link(), Some(ConnectionId(2)));
        assert_eq!(negotiator.failed_rounds(), 0);
        assert_eq!(
            negotiator.state(),
            &NegotiationState::Joined {
                connection: ConnectionId(2),
                attempt: JoinAttempt::Reconnect,
            }
        );
    }

    #[test]
    fn test_second_loss_after_reconnect_reelects() {
        let mut negotiator = RoleNegotiator::new(5);
        joined(&mut negotiator, 1);
        negotiator.on_event(NegotiationEvent::LinkClosed(ConnectionId(1)));
        negotiator.on_event(NegotiationEvent::ConnectIssued(ConnectionId(2)));
        negotiator.on_event(NegotiationEvent::LinkOpened(ConnectionId(2)));
        negotiator.on_event(NegotiationEvent::Synced(ConnectionId(2)));

        assert_eq!(
            negotiator.on_event(NegotiationEvent::LinkClosed(ConnectionId(2))),
            vec![NegotiationAction::Register]
        );
        assert_eq!(negotiator.state(), &NegotiationState::Registering);
    }

    #[test]
    fn test_link_closed_before_sync_fails_the_round() {
        let mut negotiator = RoleNegotiator::new(5);
        negotiator.on_event(NegotiationEvent::Start);
        negotiator.on_event(taken());
        negotiator.on_event(NegotiationEvent::ConnectIssued(ConnectionId(1)));
        negotiator.on_event(NegotiationEvent::LinkOpened(ConnectionId(1)));

        assert_eq!(
            negotiator.on_event(NegotiationEvent::LinkClosed(ConnectionId(1))),
            vec![NegotiationAction::Register]
        );
        assert_eq!(negotiator.failed_rounds(), 1);
    }

    #[test]
    fn test_reconnect_that_never_syncs_reelects() {
        let mut negotiator = RoleNegotiator::new(5);
        joined(&mut negotiator, 1);
        negotiator.on_event(NegotiationEvent::LinkClosed(ConnectionId(1)));
        negotiator.on_event(NegotiationEvent::ConnectIssued(ConnectionId(2)));
        negotiator.on_event(NegotiationEvent::LinkOpened(ConnectionId(2)));

        assert_eq!(
            negotiator.on_event(NegotiationEvent::LinkClosed(ConnectionId(2))),
            vec![NegotiationAction::Register]
        );
    }

    #[test]
    fn test_links_that_never_sync_end_in_solo() {
        let mut negotiator = RoleNegotiator::new(3);
        negotiator.on_event(NegotiationEvent::Start);

        let mut last = vec![];
        for round in 1..=3u64 {
            negotiator.on_event(taken());
            negotiator.on_event(NegotiationEvent::ConnectIssued(ConnectionId(round)));
            negotiator.on_event(NegotiationEvent::LinkOpened(ConnectionId(round)));
            last = negotiator.on_event(NegotiationEvent::LinkClosed(ConnectionId(round)));
        }

        assert!(matches!(last.as_slice(), [NegotiationAction::EnterSolo { .. }]));
        assert!(negotiator.is_solo());
    }

    #[test]
    fn test_sync_on_a_stale_link_is_ignored() {
        let mut negotiator = RoleNegotiator::new(5);
        negotiator.on_event(NegotiationEvent::Start);
        negotiator.on_event(taken());
        negotiator.on_event(NegotiationEvent::ConnectIssued(ConnectionId(2)));
        negotiator.on_event(NegotiationEvent::LinkOpened(ConnectionId(2)));

        negotiator.on_event(NegotiationEvent::Synced(ConnectionId(1)));

        assert_eq!(negotiator.host_link(), None);
    }

    #[test]
    fn test_host_ignores_client_loss() {
        let mut negotiator = RoleNegotiator::new(5);
        negotiator.on_event(NegotiationEvent::Start);
        negotiator.on_event(NegotiationEvent::RegisterSucceeded);

        assert!(negotiator
            .on_event(NegotiationEvent::LinkClosed(ConnectionId(7)))
            .is_empty());
        assert_eq!(negotiator.role(), Some(DeviceRole::Host));
    }

    #[test]
    fn test_stale_link_events_are_ignored() {
        let mut negotiator = RoleNegotiator::new(5);
        joined(&mut negotiator, 3);

        assert!(negotiator
            .on_event(NegotiationEvent::LinkClosed(ConnectionId(1)))
            .is_empty());
        assert_eq!(negotiator.host_link(), Some(ConnectionId(3)));
    }

    #[test]
    fn test_bounded_rounds_end_in_solo() {
        let mut negotiator = RoleNegotiator::new(2);
        negotiator.on_event(NegotiationEvent::Start);

        negotiator.on_event(taken());
        negotiator.on_event(NegotiationEvent::LinkFailed(None));
        assert_eq!(negotiator.state(), &NegotiationState::Registering);

        negotiator.on_event(taken());
        let actions = negotiator.on_event(NegotiationEvent::LinkFailed(None));

        assert!(matches!(
            actions.as_slice(),
            [NegotiationAction::EnterSolo { .. }]
        ));
        assert!(negotiator.is_solo());
    }

    #[test]
    fn test_disabled_sync_is_solo() {
        let mut negotiator = RoleNegotiator::new(5);
        let actions = negotiator.on_event(NegotiationEvent::Disabled);

        assert!(matches!(
            actions.as_slice(),
            [NegotiationAction::EnterSolo { .. }]
        ));
        assert_eq!(negotiator.role(), None);
    }

    #[test]
    fn test_stop_resets() {
        let mut negotiator = RoleNegotiator::new(5);
        joined(&mut negotiator, 1);

        negotiator.on_event(NegotiationEvent::Stop);

        assert_eq!(negotiator.state(), &NegotiationState::Idle);
        assert_eq!(negotiator.role(), None);
    }
}
