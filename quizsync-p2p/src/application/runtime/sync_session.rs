use crate::application::config::SyncConfig;
use crate::application::events::SyncEvent;
use crate::application::liveness::LivenessMonitor;
use crate::application::negotiator::{
    NegotiationAction, NegotiationEvent, NegotiationState, RoleNegotiator,
};
use crate::application::replicator::SessionReplicator;
use crate::application::router::{Dispatch, MessageRouter};
use crate::application::runtime::EventQueue;
use crate::domain::{
    ConnectionId, ConnectionSet, DeviceDescriptor, DeviceRole, Direction, Message, PeerConnection,
    PeerDescriptor, PeerId,
};
use crate::infrastructure::error::{P2PError, Result};
use crate::infrastructure::transport::{Transport, TransportEvent};
use instant::Instant;
use quizsync_core::{Progress, QuestionId, QuizSession, SessionView, Timestamp, Verdict};
use rand::rngs::StdRng;
use std::collections::VecDeque;

/// What the UI needs to draw one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncView {
    pub session: SessionView,
    pub role: Option<DeviceRole>,
    pub solo: bool,
    pub peers: Vec<PeerDescriptor>,
}

/// One device's synchronized quiz session
///
/// Single-threaded and poll-driven: transport callbacks and timers are
/// processed sequentially inside `poll`, so the session state is never
/// shared and never locked.
pub struct SyncSession<T: Transport> {
    transport: T,
    rendezvous: PeerId,
    negotiator: RoleNegotiator,
    replicator: SessionReplicator,
    liveness: LivenessMonitor,
    router: MessageRouter,
    config: SyncConfig,
    events: EventQueue,
    rng: StdRng,
    sync_enabled: bool,
}

impl<T: Transport> SyncSession<T> {
    pub(crate) fn new(
        transport: T,
        rendezvous: PeerId,
        session: QuizSession,
        config: SyncConfig,
        rng: StdRng,
        sync_enabled: bool,
    ) -> Self {
        Self {
            transport,
            rendezvous,
            negotiator: RoleNegotiator::new(config.max_election_rounds),
            replicator: SessionReplicator::new(session),
            liveness: LivenessMonitor::new(config.ping_interval, config.ping_timeout),
            router: MessageRouter::new(),
            events: EventQueue::new(config.event_queue_size),
            config,
            rng,
            sync_enabled,
        }
    }

    pub fn start(&mut self) {
        self.start_at(Instant::now());
    }

    /// Begin negotiating a role, or go solo when sync is disabled
    pub fn start_at(&mut self, now: Instant) {
        if !self.sync_enabled {
            let actions = self.negotiator.on_event(NegotiationEvent::Disabled);
            self.apply_actions(actions);
            return;
        }

        tracing::info!("🚀 Starting sync session on {}", self.rendezvous);
        self.liveness.start(now);
        let actions = self.negotiator.on_event(NegotiationEvent::Start);
        self.apply_actions(actions);
    }

    pub fn poll(&mut self) -> usize {
        self.poll_at(Instant::now())
    }

    /// Process pending transport events and due timers
    ///
    /// Returns the number of transport events handled.
    pub fn poll_at(&mut self, now: Instant) -> usize {
        let events = self.transport.poll_events();
        let processed = events.len();
        for event in events {
            self.handle_transport_event(event, now);
        }

        for connection in self
            .replicator
            .awaiting_sync_expired(now, self.config.sync_timeout)
        {
            tracing::warn!("⏰ No initial sync on {}, dropping link", connection);
            self.drop_connection(connection);
        }

        let tick = self.liveness.tick(now, self.replicator.connections());
        for (connection, probe) in tick.probes {
            if self.replicator.arm_probe(connection, probe) {
                self.send(connection, &Message::Ping { nonce: probe.nonce });
            }
        }
        for connection in tick.expired {
            tracing::warn!("💔 {} missed its pong, closing", connection);
            self.drop_connection(connection);
        }

        processed
    }

    fn handle_transport_event(&mut self, event: TransportEvent, now: Instant) {
        match event {
            TransportEvent::Registered { id } => {
                tracing::info!("📛 Registered as {}", id);
                let actions = self.negotiator.on_event(NegotiationEvent::RegisterSucceeded);
                self.apply_actions(actions);
            }
            TransportEvent::RegistrationFailed { error } => {
                let taken = error.is_id_taken();
                if taken {
                    tracing::info!("🔒 {} is taken, joining as client", self.rendezvous);
                } else {
                    tracing::warn!("⚠️ Registration failed: {}", error);
                }
                let actions = self.negotiator.on_event(NegotiationEvent::RegisterFailed {
                    taken,
                    reason: error.to_string(),
                });
                self.apply_actions(actions);
            }
            TransportEvent::ConnectionOpened {
                connection,
                remote,
                descriptor,
                direction,
            } => self.on_connection_opened(connection, remote, descriptor, direction, now),
            TransportEvent::ConnectFailed { connection, error } => {
                tracing::warn!("⚠️ Connect {} failed: {}", connection, error);
                let actions = self
                    .negotiator
                    .on_event(NegotiationEvent::LinkFailed(Some(connection)));
                self.apply_actions(actions);
            }
            TransportEvent::Data { connection, data } => self.on_data(connection, &data, now),
            TransportEvent::Closed { connection } => {
                tracing::info!("🔌 {} closed by remote", connection);
                self.on_connection_lost(connection);
            }
            TransportEvent::Error { connection, error } => {
                tracing::warn!("⚠️ {} failed: {}", connection, error);
                self.transport.close(connection);
                self.on_connection_lost(connection);
            }
        }
    }

    fn on_connection_opened(
        &mut self,
        connection: ConnectionId,
        remote: PeerId,
        descriptor: DeviceDescriptor,
        direction: Direction,
        now: Instant,
    ) {
        let link = PeerConnection::new(connection, remote, descriptor, direction, now);
        let peer = peer_descriptor(&link);

        match direction {
            Direction::Inbound if self.negotiator.role() == Some(DeviceRole::Host) => {
                let dispatches = self.replicator.accept_inbound(link);
                self.dispatch(dispatches);
                self.emit(SyncEvent::PeerConnected(peer));
            }
            Direction::Outbound if self.negotiator.expects(connection) => {
                self.replicator.open_outbound(link);
                self.emit(SyncEvent::PeerConnected(peer));
                let actions = self
                    .negotiator
                    .on_event(NegotiationEvent::LinkOpened(connection));
                self.apply_actions(actions);
            }
            _ => {
                tracing::warn!(
                    "⚠️ Refusing {:?} {} from {} in state {:?}",
                    direction,
                    connection,
                    peer.remote,
                    self.negotiator.state()
                );
                self.transport.close(connection);
            }
        }
    }

    fn on_data(&mut self, connection: ConnectionId, data: &[u8], now: Instant) {
        let message = match self.router.decode(data) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!("⚠️ Dropping message on {}: {}", connection, e);
                return;
            }
        };

        if message.is_heartbeat() {
            tracing::trace!("📥 {} on {}", message.tag(), connection);
        } else {
            tracing::debug!("📥 {} on {}", message.tag(), connection);
        }

        let checked: Option<QuestionId> = match &message {
            Message::AnswerChecked { question_id } => Some(*question_id),
            _ => None,
        };

        let role = self.negotiator.role();
        let inbound = match self
            .replicator
            .handle_message(connection, message, role, now)
        {
            Ok(inbound) => inbound,
            Err(e) => {
                tracing::warn!("⚠️ Dropping message on {}: {}", connection, e);
                return;
            }
        };

        if inbound.synced {
            if let Some(remote) = self
                .replicator
                .connections()
                .get(connection)
                .map(|c| c.remote.clone())
            {
                self.emit(SyncEvent::Synced { remote });
            }
            let actions = self
                .negotiator
                .on_event(NegotiationEvent::Synced(connection));
            self.apply_actions(actions);
        }
        if inbound.changed {
            self.emit(SyncEvent::StateChanged);
        }
        if let (Some(question_id), Some(verdict)) = (checked, inbound.verdict) {
            self.emit(SyncEvent::AnswerChecked {
                question_id,
                verdict,
            });
        }
        self.dispatch(inbound.dispatches);
    }

    /// Forget a connection that is gone, reacting at most once per connection
    fn on_connection_lost(&mut self, connection: ConnectionId) {
        match self.replicator.remove_connection(connection) {
            Some(lost) => {
                self.emit(SyncEvent::PeerDisconnected {
                    remote: lost.remote,
                });
                let actions = self
                    .negotiator
                    .on_event(NegotiationEvent::LinkClosed(connection));
                self.apply_actions(actions);
            }
            None if self.negotiator.expects(connection) => {
                let actions = self
                    .negotiator
                    .on_event(NegotiationEvent::LinkFailed(Some(connection)));
                self.apply_actions(actions);
            }
            None => {}
        }
    }

    fn drop_connection(&mut self, connection: ConnectionId) {
        self.transport.close(connection);
        self.on_connection_lost(connection);
    }

    fn apply_actions(&mut self, actions: Vec<NegotiationAction>) {
        let mut pending: VecDeque<NegotiationAction> = actions.into();

        while let Some(action) = pending.pop_front() {
            match action {
                NegotiationAction::Register => {
                    tracing::debug!("Registering {}", self.rendezvous);
                    if let Err(e) = self.transport.register(&self.rendezvous) {
                        tracing::warn!("⚠️ Register failed: {}", e);
                        pending.extend(self.negotiator.on_event(
                            NegotiationEvent::RegisterFailed {
                                taken: e.is_id_taken(),
                                reason: e.to_string(),
                            },
                        ));
                    }
                }
                NegotiationAction::Connect => match self.transport.connect(&self.rendezvous) {
                    Ok(connection) => {
                        tracing::debug!("Connecting to {} on {}", self.rendezvous, connection);
                        pending.extend(
                            self.negotiator
                                .on_event(NegotiationEvent::ConnectIssued(connection)),
                        );
                    }
                    Err(e) => {
                        tracing::warn!("⚠️ Connect to {} failed: {}", self.rendezvous, e);
                        pending.extend(self.negotiator.on_event(NegotiationEvent::LinkFailed(None)));
                    }
                },
                NegotiationAction::AssumeRole(role) => {
                    tracing::info!("👑 Acting as {} for {}", role, self.rendezvous);
                    self.emit(SyncEvent::RoleAssumed(role));
                }
                NegotiationAction::EnterSolo { reason } => {
                    tracing::warn!("🏝️ Continuing in solo mode: {}", reason);
                    self.liveness.stop();
                    for connection in self.replicator.connections().ids() {
                        self.transport.close(connection);
                        if let Some(lost) = self.replicator.remove_connection(connection) {
                            self.emit(SyncEvent::PeerDisconnected {
                                remote: lost.remote,
                            });
                        }
                    }
                    self.emit(SyncEvent::EnteredSolo { reason });
                }
            }
        }
    }

    fn dispatch(&mut self, dispatches: Vec<Dispatch>) {
        let sends = self.router.route(dispatches, self.replicator.connections());
        for (connection, message) in sends {
            self.send(connection, &message);
        }
    }

    /// Send one message; a failed send is treated like a dropped link
    fn send(&mut self, connection: ConnectionId, message: &Message) {
        if !self.replicator.connections().contains(connection) {
            return;
        }
        let result = self
            .router
            .encode(message)
            .and_then(|bytes| self.transport.send(connection, bytes));

        match result {
            Ok(()) => tracing::trace!("📤 {} on {}", message.tag(), connection),
            Err(e) => {
                tracing::warn!("⚠️ Sending {} on {} failed: {}", message.tag(), connection, e);
                self.drop_connection(connection);
            }
        }
    }

    fn emit(&mut self, event: SyncEvent) {
        if let Err(e) = self.events.push(event) {
            tracing::warn!("⚠️ Dropping session event: {}", e);
        }
    }

    pub fn toggle_answer(&mut self, index: usize) -> Result<()> {
        let dispatches = self.replicator.toggle_answer(index)?;
        self.dispatch(dispatches);
        self.emit(SyncEvent::StateChanged);
        Ok(())
    }

    pub fn set_selection(&mut self, indices: impl IntoIterator<Item = usize>) -> Result<()> {
        let dispatches = self.replicator.set_selection(indices)?;
        self.dispatch(dispatches);
        self.emit(SyncEvent::StateChanged);
        Ok(())
    }

    /// Evaluate the current question; `None` if it was already checked
    pub fn check_answer(&mut self) -> Result<Option<Verdict>> {
        let (verdict, dispatches) = self.replicator.check_answer()?;
        self.dispatch(dispatches);

        if let Some(verdict) = verdict {
            if let Some(current) = self.replicator.session().state().current() {
                let question_id = current.question_id;
                self.emit(SyncEvent::AnswerChecked {
                    question_id,
                    verdict,
                });
            }
            self.emit(SyncEvent::StateChanged);
        }
        Ok(verdict)
    }

    pub fn next_question(&mut self) {
        let dispatches = self.replicator.next_question(&mut self.rng);
        self.dispatch(dispatches);
        self.emit(SyncEvent::StateChanged);
    }

    /// Start over with fresh progress
    ///
    /// Clients are disconnected so that they reconnect and receive the new
    /// state through a fresh initial sync.
    pub fn reset_progress(&mut self, now: Timestamp) -> Result<()> {
        let allowed =
            self.negotiator.role() == Some(DeviceRole::Host) || self.negotiator.is_solo();
        if !allowed {
            return Err(P2PError::NotHost);
        }

        self.replicator.reset(now, &mut self.rng);
        tracing::info!("🔄 Progress reset");

        for connection in self.replicator.connections().ids() {
            self.drop_connection(connection);
        }
        self.emit(SyncEvent::StateChanged);
        Ok(())
    }

    pub fn view(&self, now: Timestamp) -> SyncView {
        SyncView {
            session: self.replicator.session().view(now),
            role: self.role(),
            solo: self.is_solo(),
            peers: self.peers(),
        }
    }

    pub fn role(&self) -> Option<DeviceRole> {
        self.negotiator.role()
    }

    pub fn is_solo(&self) -> bool {
        self.negotiator.is_solo()
    }

    pub fn negotiation(&self) -> &NegotiationState {
        self.negotiator.state()
    }

    pub fn peers(&self) -> Vec<PeerDescriptor> {
        self.replicator
            .connections()
            .iter()
            .map(peer_descriptor)
            .collect()
    }

    pub fn connections(&self) -> &ConnectionSet {
        self.replicator.connections()
    }

    pub fn session(&self) -> &QuizSession {
        self.replicator.session()
    }

    pub fn progress(&self, now: Timestamp) -> Progress {
        self.replicator.session().to_progress(now)
    }

    pub fn rendezvous(&self) -> &PeerId {
        &self.rendezvous
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn drain_events(&mut self) -> Vec<SyncEvent> {
        self.events.drain()
    }

    /// Destroy the local identity; every connection and the heartbeat stop
    pub fn shutdown(&mut self) {
        tracing::info!("👋 Shutting down sync session {}", self.rendezvous);
        self.liveness.stop();
        self.negotiator.on_event(NegotiationEvent::Stop);
        for connection in self.replicator.connections().ids() {
            self.replicator.remove_connection(connection);
        }
        self.transport.destroy();
    }
}

fn peer_descriptor(connection: &PeerConnection) -> PeerDescriptor {
    PeerDescriptor {
        remote: connection.remote.clone(),
        name: connection.descriptor.name.clone(),
        kind: connection.descriptor.kind,
        role: match connection.direction {
            Direction::Outbound => DeviceRole::Host,
            Direction::Inbound => DeviceRole::Client,
        },
    }
}
