use crate::domain::{ConnectionId, DeviceDescriptor, Direction, IceServer, PeerId};
use crate::infrastructure::error::{P2PError, Result};
use crate::infrastructure::transport::{Transport, TransportEvent};
use instant::{Duration, Instant};
use matchbox_socket::{ChannelConfig, PeerState, WebRtcSocket, WebRtcSocketBuilder};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::Instrument;

type RemotePeer = matchbox_socket::PeerId;

pub const DEFAULT_SIGNALLING_SERVER: &str = "wss://match.konnektoren.help";

/// Settings for the matchbox WebRTC transport
#[derive(Debug, Clone)]
pub struct MatchboxConfig {
    pub signalling_server: String,
    pub ice_servers: Vec<IceServer>,
    /// How long a room must stay free of other claimants before we own it
    pub registration_window: Duration,
    /// How long a client waits for a hosting peer to show up
    pub connect_timeout: Duration,
}

impl Default for MatchboxConfig {
    fn default() -> Self {
        Self {
            signalling_server: DEFAULT_SIGNALLING_SERVER.to_string(),
            ice_servers: IceServer::default_stun_servers(),
            registration_window: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl MatchboxConfig {
    pub fn new(signalling_server: impl Into<String>) -> Self {
        Self {
            signalling_server: signalling_server.into(),
            ..Default::default()
        }
    }

    pub fn with_ice_servers(mut self, servers: Vec<IceServer>) -> Self {
        self.ice_servers = servers;
        self
    }

    pub fn with_registration_window(mut self, window: Duration) -> Self {
        self.registration_window = window;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Signalling room for a rendezvous identifier
    pub fn room_url(&self, id: &PeerId) -> String {
        format!("{}/{}", self.signalling_server.trim_end_matches('/'), id)
    }
}

/// What a peer in the room is currently doing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Status {
    Registering { ticket: u64 },
    Hosting,
    Joining,
    Idle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "control", rename_all = "snake_case")]
enum Control {
    Hello {
        descriptor: DeviceDescriptor,
        status: Status,
    },
    Bye,
}

/// Adapter framing: one prefix byte, then either control JSON or a payload
#[derive(Debug, Clone, PartialEq, Eq)]
enum Frame {
    Control(Control),
    Data(Vec<u8>),
}

const FRAME_CONTROL: u8 = 0;
const FRAME_DATA: u8 = 1;

fn encode_frame(frame: &Frame) -> Result<Box<[u8]>> {
    let mut bytes = Vec::new();
    match frame {
        Frame::Control(control) => {
            bytes.push(FRAME_CONTROL);
            bytes.extend(serde_json::to_vec(control)?);
        }
        Frame::Data(payload) => {
            bytes.push(FRAME_DATA);
            bytes.extend_from_slice(payload);
        }
    }
    Ok(bytes.into_boxed_slice())
}

fn decode_frame(bytes: &[u8]) -> Option<Frame> {
    match bytes.split_first()? {
        (&FRAME_CONTROL, rest) => serde_json::from_slice(rest).ok().map(Frame::Control),
        (&FRAME_DATA, rest) => Some(Frame::Data(rest.to_vec())),
        _ => None,
    }
}

/// Whether a registering device must give up the room to `other`
///
/// An existing host always wins; between two registrants the lower ticket
/// wins, so exactly one of them keeps registering.
fn yields_to(own_ticket: u64, other: Status) -> bool {
    match other {
        Status::Hosting => true,
        Status::Registering { ticket } => ticket < own_ticket,
        Status::Joining | Status::Idle => false,
    }
}

#[derive(Debug)]
enum Phase {
    Idle,
    Registering {
        id: PeerId,
        deadline: Instant,
        ticket: u64,
    },
    Hosting {
        id: PeerId,
    },
    Member,
}

#[derive(Debug, Clone, Copy)]
struct PendingConnect {
    connection: ConnectionId,
    deadline: Instant,
}

/// Transport over matchbox WebRTC rooms
///
/// The rendezvous identifier names a signalling room. Registering means
/// joining the room and holding it for `registration_window` without
/// meeting a host or a lower-ticket registrant. Logical connections start
/// with a hello exchange and end with a bye, so a client can reconnect to
/// the same host without a new WebRTC link.
pub struct MatchboxTransport {
    config: MatchboxConfig,
    descriptor: DeviceDescriptor,
    socket: Option<WebRtcSocket>,
    room: Option<PeerId>,
    own_id: Option<PeerId>,
    phase: Phase,
    peers: HashMap<RemotePeer, (DeviceDescriptor, Status)>,
    links: HashMap<ConnectionId, RemotePeer>,
    pending: Option<PendingConnect>,
    events: Vec<TransportEvent>,
    next_connection: u64,
}

impl MatchboxTransport {
    pub fn new(config: MatchboxConfig, descriptor: DeviceDescriptor) -> Self {
        Self {
            config,
            descriptor,
            socket: None,
            room: None,
            own_id: None,
            phase: Phase::Idle,
            peers: HashMap::new(),
            links: HashMap::new(),
            pending: None,
            events: Vec::new(),
            next_connection: 0,
        }
    }

    fn allocate(&mut self) -> ConnectionId {
        self.next_connection += 1;
        ConnectionId(self.next_connection)
    }

    fn status(&self) -> Status {
        match &self.phase {
            Phase::Registering { ticket, .. } => Status::Registering { ticket: *ticket },
            Phase::Hosting { .. } => Status::Hosting,
            Phase::Member if self.pending.is_some() => Status::Joining,
            Phase::Member | Phase::Idle => Status::Idle,
        }
    }

    /// Join the signalling room for `id`, leaving any previous room
    fn open_room(&mut self, id: &PeerId) -> Result<()> {
        self.leave_room();

        let url = self.config.room_url(id);
        tracing::info!("📡 Joining signalling room: {}", url);

        let (socket, loop_fut) = WebRtcSocketBuilder::new(url)
            .ice_server(IceServer::to_rtc_config(&self.config.ice_servers))
            .add_channel(ChannelConfig::reliable())
            .build();

        let matchbox_span = tracing::info_span!("matchbox::webrtc_loop");

        #[cfg(target_arch = "wasm32")]
        wasm_bindgen_futures::spawn_local(
            async move {
                let _ = loop_fut.await;
            }
            .instrument(matchbox_span),
        );

        #[cfg(not(target_arch = "wasm32"))]
        {
            #[cfg(feature = "native")]
            {
                let handle = tokio::runtime::Handle::try_current().map_err(|e| {
                    P2PError::ConnectionFailed(format!("no async runtime available: {}", e))
                })?;
                handle.spawn(
                    async move {
                        if let Err(e) = loop_fut.await {
                            tracing::warn!("⚠️ Matchbox message loop ended: {:?}", e);
                        }
                    }
                    .instrument(matchbox_span),
                );
            }

            #[cfg(not(feature = "native"))]
            compile_error!("Non-WASM builds require the 'native' feature to be enabled");
        }

        self.socket = Some(socket);
        self.room = Some(id.clone());
        Ok(())
    }

    /// Drop the socket; open links are reported closed
    fn leave_room(&mut self) {
        let mut closed: Vec<ConnectionId> = self.links.keys().copied().collect();
        closed.sort();
        for (connection, peer) in self.links.drain() {
            if let Some(socket) = self.socket.as_mut() {
                send_frame(socket, peer, &Frame::Control(Control::Bye));
            }
            tracing::debug!("Leaving room closes {}", connection);
        }
        for connection in closed {
            self.events.push(TransportEvent::Closed { connection });
        }
        if let Some(pending) = self.pending.take() {
            self.events.push(TransportEvent::ConnectFailed {
                connection: pending.connection,
                error: P2PError::ConnectionFailed("left signalling room".to_string()),
            });
        }

        self.socket = None;
        self.room = None;
        self.own_id = None;
        self.peers.clear();
        self.phase = Phase::Idle;
    }

    fn send_hello(&mut self, peer: RemotePeer) {
        let hello = Frame::Control(Control::Hello {
            descriptor: self.descriptor.clone(),
            status: self.status(),
        });
        if let Some(socket) = self.socket.as_mut() {
            send_frame(socket, peer, &hello);
        }
    }

    fn announce(&mut self) {
        let peers: Vec<RemotePeer> = match self.socket.as_ref() {
            Some(socket) => socket.connected_peers().collect(),
            None => return,
        };
        for peer in peers {
            self.send_hello(peer);
        }
    }

    fn close_links_to(&mut self, peer: RemotePeer) {
        let closed: Vec<ConnectionId> = self
            .links
            .iter()
            .filter(|(_, p)| **p == peer)
            .map(|(c, _)| *c)
            .collect();
        for connection in closed {
            self.links.remove(&connection);
            self.events.push(TransportEvent::Closed { connection });
        }
    }

    fn handle_hello(&mut self, peer: RemotePeer, descriptor: DeviceDescriptor, status: Status) {
        self.peers.insert(peer, (descriptor.clone(), status));

        match &self.phase {
            Phase::Registering { id, ticket, .. } => {
                if yields_to(*ticket, status) {
                    tracing::info!("🔒 Room {} is claimed by {}", id, peer);
                    let id = id.clone();
                    self.phase = Phase::Member;
                    self.events.push(TransportEvent::RegistrationFailed {
                        error: P2PError::IdTaken(id),
                    });
                }
            }
            Phase::Hosting { .. } => match status {
                Status::Joining => {
                    if self.links.values().any(|p| *p == peer) {
                        return;
                    }
                    let connection = self.allocate();
                    self.links.insert(connection, peer);
                    self.events.push(TransportEvent::ConnectionOpened {
                        connection,
                        remote: PeerId::from(peer),
                        descriptor,
                        direction: Direction::Inbound,
                    });
                }
                Status::Registering { .. } => self.send_hello(peer),
                Status::Hosting => {
                    tracing::warn!("⚠️ Peer {} also claims to host this room", peer);
                }
                Status::Idle => {}
            },
            Phase::Member | Phase::Idle => {}
        }
    }

    fn complete_pending(&mut self, now: Instant) {
        let Some(pending) = self.pending else {
            return;
        };

        let host = self
            .peers
            .iter()
            .find(|(_, (_, status))| *status == Status::Hosting)
            .map(|(peer, (descriptor, _))| (*peer, descriptor.clone()));

        match host {
            Some((peer, descriptor)) => {
                self.pending = None;
                self.links.insert(pending.connection, peer);
                let remote = self.room.clone().unwrap_or_else(|| PeerId::from(peer));
                // status is Idle again now that nothing is pending
                let hello = Frame::Control(Control::Hello {
                    descriptor: self.descriptor.clone(),
                    status: Status::Joining,
                });
                if let Some(socket) = self.socket.as_mut() {
                    send_frame(socket, peer, &hello);
                }
                self.events.push(TransportEvent::ConnectionOpened {
                    connection: pending.connection,
                    remote,
                    descriptor,
                    direction: Direction::Outbound,
                });
            }
            None if now >= pending.deadline => {
                self.pending = None;
                self.events.push(TransportEvent::ConnectFailed {
                    connection: pending.connection,
                    error: P2PError::ConnectionFailed("no host answered".to_string()),
                });
            }
            None => {}
        }
    }

    fn receive(&mut self) {
        let Some(socket) = self.socket.as_mut() else {
            return;
        };

        if self.own_id.is_none() {
            self.own_id = socket.id().map(PeerId::from);
        }

        let changes = socket.update_peers();
        let packets = socket.channel_mut(0).receive();

        for (peer, state) in changes {
            match state {
                PeerState::Connected => {
                    tracing::debug!("WebRTC peer connected: {}", peer);
                    self.send_hello(peer);
                }
                PeerState::Disconnected => {
                    tracing::debug!("WebRTC peer disconnected: {}", peer);
                    self.peers.remove(&peer);
                    self.close_links_to(peer);
                }
            }
        }

        for (peer, packet) in packets {
            match decode_frame(&packet) {
                Some(Frame::Control(Control::Hello { descriptor, status })) => {
                    self.handle_hello(peer, descriptor, status);
                }
                Some(Frame::Control(Control::Bye)) => self.close_links_to(peer),
                Some(Frame::Data(data)) => {
                    let link = self
                        .links
                        .iter()
                        .find(|(_, p)| **p == peer)
                        .map(|(c, _)| *c);
                    match link {
                        Some(connection) => {
                            self.events.push(TransportEvent::Data { connection, data })
                        }
                        None => tracing::trace!("Dropping data from unlinked peer {}", peer),
                    }
                }
                None => tracing::warn!("⚠️ Malformed frame from {}", peer),
            }
        }
    }
}

fn send_frame(socket: &mut WebRtcSocket, peer: RemotePeer, frame: &Frame) {
    match encode_frame(frame) {
        Ok(bytes) => socket.channel_mut(0).send(bytes, peer),
        Err(e) => tracing::error!("❌ Failed to encode frame: {}", e),
    }
}

impl Transport for MatchboxTransport {
    fn register(&mut self, id: &PeerId) -> Result<()> {
        self.open_room(id)?;
        self.phase = Phase::Registering {
            id: id.clone(),
            deadline: Instant::now() + self.config.registration_window,
            ticket: rand::random(),
        };
        Ok(())
    }

    fn connect(&mut self, remote: &PeerId) -> Result<ConnectionId> {
        if self.room.as_ref() != Some(remote) {
            self.open_room(remote)?;
        }
        if matches!(self.phase, Phase::Idle) {
            self.phase = Phase::Member;
        }

        let connection = self.allocate();
        self.pending = Some(PendingConnect {
            connection,
            deadline: Instant::now() + self.config.connect_timeout,
        });
        self.complete_pending(Instant::now());
        Ok(connection)
    }

    fn send(&mut self, connection: ConnectionId, data: Vec<u8>) -> Result<()> {
        let peer = *self
            .links
            .get(&connection)
            .ok_or(P2PError::ConnectionClosed(connection))?;
        let socket = self.socket.as_mut().ok_or(P2PError::Destroyed)?;
        let bytes = encode_frame(&Frame::Data(data))?;
        socket.channel_mut(0).send(bytes, peer);
        Ok(())
    }

    fn close(&mut self, connection: ConnectionId) {
        if let Some(peer) = self.links.remove(&connection) {
            if let Some(socket) = self.socket.as_mut() {
                send_frame(socket, peer, &Frame::Control(Control::Bye));
            }
        }
    }

    fn poll_events(&mut self) -> Vec<TransportEvent> {
        self.receive();

        let now = Instant::now();
        if let Phase::Registering { id, deadline, .. } = &self.phase {
            if now >= *deadline {
                let id = id.clone();
                tracing::info!("👑 Registered as {}", id);
                self.phase = Phase::Hosting { id: id.clone() };
                self.events.push(TransportEvent::Registered { id });
                self.announce();
            }
        }
        self.complete_pending(now);

        std::mem::take(&mut self.events)
    }

    fn destroy(&mut self) {
        self.leave_room();
        self.events.clear();
    }

    fn local_id(&self) -> Option<PeerId> {
        match &self.phase {
            Phase::Hosting { id } => Some(id.clone()),
            _ => self.own_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DeviceKind;

    #[test]
    fn test_room_url_joins_cleanly() {
        let config = MatchboxConfig::new("wss://signal.example.com/");
        assert_eq!(
            config.room_url(&PeerId::new("quiz_alice")),
            "wss://signal.example.com/quiz_alice"
        );
    }

    #[test]
    fn test_frames_decode_to_what_was_encoded() {
        let hello = Frame::Control(Control::Hello {
            descriptor: DeviceDescriptor::new("phone", DeviceKind::Mobile),
            status: Status::Registering { ticket: 9 },
        });
        let data = Frame::Data(br#"{"type":"ping","nonce":1}"#.to_vec());

        for frame in [hello, data, Frame::Control(Control::Bye)] {
            let bytes = encode_frame(&frame).unwrap();
            assert_eq!(decode_frame(&bytes), Some(frame));
        }
    }

    #[test]
    fn test_garbage_frames_are_rejected() {
        assert_eq!(decode_frame(&[]), None);
        assert_eq!(decode_frame(&[7, 1, 2]), None);
        assert_eq!(decode_frame(&[FRAME_CONTROL, b'{']), None);
    }

    #[test]
    fn test_exactly_one_registrant_keeps_the_room() {
        let (a, b) = (10, 20);
        assert!(!yields_to(a, Status::Registering { ticket: b }));
        assert!(yields_to(b, Status::Registering { ticket: a }));
        assert!(yields_to(a, Status::Hosting));
        assert!(!yields_to(a, Status::Idle));
    }

    #[test]
    fn test_unregistered_transport_has_no_identity() {
        let transport = MatchboxTransport::new(MatchboxConfig::default(), DeviceDescriptor::default());
        assert!(transport.local_id().is_none());
    }
}
