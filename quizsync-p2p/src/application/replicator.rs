use crate::application::router::Dispatch;
use crate::domain::{
    ConnectionId, ConnectionSet, DeviceRole, Direction, Message, PeerConnection, Probe, SyncPhase,
};
use crate::infrastructure::error::ProtocolError;
use instant::{Duration, Instant};
use quizsync_core::{QuizSession, SessionError, Timestamp, Verdict};
use rand::Rng;

/// Result of applying one inbound message
#[derive(Debug, Default)]
pub struct Inbound {
    /// Replies and relays to send
    pub dispatches: Vec<Dispatch>,
    /// Session state was mutated
    pub changed: bool,
    /// Set when the message checked the current question
    pub verdict: Option<Verdict>,
    /// Set when the connection completed its initial sync
    pub synced: bool,
}

/// Owner of the session state and the active connection set
///
/// Every mutation of either goes through here; the negotiator and the
/// liveness monitor only read the connection set and ask for changes.
#[derive(Debug)]
pub struct SessionReplicator {
    session: QuizSession,
    connections: ConnectionSet,
}

impl SessionReplicator {
    pub fn new(session: QuizSession) -> Self {
        Self {
            session,
            connections: ConnectionSet::new(),
        }
    }

    pub fn session(&self) -> &QuizSession {
        &self.session
    }

    pub fn connections(&self) -> &ConnectionSet {
        &self.connections
    }

    /// Host side: adopt a new client and queue its two-message sync
    pub fn accept_inbound(&mut self, mut connection: PeerConnection) -> Vec<Dispatch> {
        let id = connection.id;
        connection.phase = SyncPhase::Synced;
        tracing::info!("🤝 Accepted {} from {}", id, connection.remote);
        self.connections.insert(connection);

        vec![
            Dispatch::To(id, Message::InitialSync(self.session.snapshot())),
            Dispatch::To(
                id,
                Message::QuestionUpdate {
                    question: self.session.presented(),
                },
            ),
        ]
    }

    /// Client side: hold the link to the host until InitialSync arrives
    pub fn open_outbound(&mut self, mut connection: PeerConnection) {
        connection.phase = SyncPhase::AwaitingInitialSync;
        tracing::info!("🔗 Linked to host {} on {}", connection.remote, connection.id);
        self.connections.insert(connection);
    }

    pub fn handle_message(
        &mut self,
        from: ConnectionId,
        message: Message,
        role: Option<DeviceRole>,
        now: Instant,
    ) -> Result<Inbound, ProtocolError> {
        let connection = self
            .connections
            .get_mut(from)
            .ok_or(ProtocolError::UnknownConnection(from))?;
        let relay = role == Some(DeviceRole::Host);
        let mut inbound = Inbound::default();

        match message {
            Message::Ping { nonce } => {
                inbound
                    .dispatches
                    .push(Dispatch::To(from, Message::Pong { nonce }));
            }
            Message::Pong { nonce } => {
                if !connection.record_pong(nonce, now) {
                    tracing::debug!("Ignoring stale pong {} on {}", nonce, from);
                }
            }
            Message::InitialSync(snapshot) => {
                if connection.direction == Direction::Inbound {
                    return Err(ProtocolError::UnexpectedInitialSync(from));
                }
                if connection.phase != SyncPhase::AwaitingInitialSync {
                    return Err(ProtocolError::DuplicateInitialSync(from));
                }
                self.session.apply_snapshot(snapshot);
                connection.phase = SyncPhase::Synced;
                inbound.changed = true;
                inbound.synced = true;
                tracing::info!(
                    "📥 Initial sync on {}: {} correct, {} wrong",
                    from,
                    self.session.state().correct_count(),
                    self.session.state().wrong_count()
                );
            }
            Message::QuestionUpdate { question } => {
                if !connection.is_synced() {
                    return Err(ProtocolError::NotSynced {
                        connection: from,
                        tag: "question_update",
                    });
                }
                self.session.apply_question_update(question.clone())?;
                inbound.changed = true;
                if relay {
                    inbound.dispatches.push(Dispatch::Broadcast {
                        message: Message::QuestionUpdate { question },
                        except: Some(from),
                    });
                }
            }
            Message::AnswerChecked { question_id } => {
                if !connection.is_synced() {
                    return Err(ProtocolError::NotSynced {
                        connection: from,
                        tag: "answer_checked",
                    });
                }
                inbound.verdict = self.session.apply_remote_check(question_id)?;
                inbound.changed = inbound.verdict.is_some();
                if relay && inbound.changed {
                    inbound.dispatches.push(Dispatch::Broadcast {
                        message: Message::AnswerChecked { question_id },
                        except: Some(from),
                    });
                }
            }
        }

        Ok(inbound)
    }

    pub fn toggle_answer(&mut self, index: usize) -> Result<Vec<Dispatch>, SessionError> {
        self.session.toggle_answer(index)?;
        Ok(self.question_broadcast())
    }

    pub fn set_selection(
        &mut self,
        indices: impl IntoIterator<Item = usize>,
    ) -> Result<Vec<Dispatch>, SessionError> {
        self.session.set_selection(indices)?;
        Ok(self.question_broadcast())
    }

    /// Check locally; only a first check is announced
    pub fn check_answer(&mut self) -> Result<(Option<Verdict>, Vec<Dispatch>), SessionError> {
        let verdict = self.session.check_answer()?;
        let dispatches = match (verdict, self.session.state().current()) {
            (Some(_), Some(current)) => vec![Dispatch::Broadcast {
                message: Message::AnswerChecked {
                    question_id: current.question_id,
                },
                except: None,
            }],
            _ => Vec::new(),
        };
        Ok((verdict, dispatches))
    }

    pub fn next_question<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Vec<Dispatch> {
        self.session.next_question(rng);
        self.question_broadcast()
    }

    /// Replace the state with fresh progress
    ///
    /// Nothing is broadcast; synced peers must be re-synced from scratch.
    pub fn reset<R: Rng + ?Sized>(&mut self, now: Timestamp, rng: &mut R) {
        self.session.reset(now, rng);
    }

    fn question_broadcast(&self) -> Vec<Dispatch> {
        vec![Dispatch::Broadcast {
            message: Message::QuestionUpdate {
                question: self.session.presented(),
            },
            except: None,
        }]
    }

    pub fn arm_probe(&mut self, connection: ConnectionId, probe: Probe) -> bool {
        match self.connections.get_mut(connection) {
            Some(c) => {
                c.probe = Some(probe);
                true
            }
            None => false,
        }
    }

    /// Drop a connection from the active set
    ///
    /// Returns `None` when it was already removed, so callers react to each
    /// loss exactly once. Any outstanding probe goes with it.
    pub fn remove_connection(&mut self, connection: ConnectionId) -> Option<PeerConnection> {
        let removed = self.connections.remove(connection);
        if let Some(c) = &removed {
            tracing::debug!("Removed {} ({})", c.id, c.remote);
        }
        removed
    }

    /// Outbound links still waiting for InitialSync after `timeout`
    pub fn awaiting_sync_expired(&self, now: Instant, timeout: Duration) -> Vec<ConnectionId> {
        self.connections
            .iter()
            .filter(|c| {
                c.phase == SyncPhase::AwaitingInitialSync
                    && now >= c.opened_at + timeout
            })
            .map(|c| c.id)
            .collect()
    }
}
