use crate::domain::{ConnectionId, DeviceDescriptor, Direction, PeerId};
use crate::infrastructure::error::{P2PError, Result};
use crate::infrastructure::transport::{Transport, TransportEvent};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

/// Handle of one device attached to a `MemoryNetwork`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EndpointId(u64);

#[derive(Debug)]
struct Endpoint {
    anonymous: PeerId,
    registered: Option<PeerId>,
    descriptor: DeviceDescriptor,
    inbox: VecDeque<TransportEvent>,
    silenced: bool,
    alive: bool,
}

impl Endpoint {
    fn peer_id(&self) -> PeerId {
        self.registered
            .clone()
            .unwrap_or_else(|| self.anonymous.clone())
    }
}

#[derive(Debug, Clone, Copy)]
struct Link {
    owner: EndpointId,
    peer: ConnectionId,
}

/// Shared state of the in-process network
#[derive(Debug, Default)]
struct Broker {
    endpoints: HashMap<EndpointId, Endpoint>,
    registry: HashMap<PeerId, EndpointId>,
    links: HashMap<ConnectionId, Link>,
    next_endpoint: u64,
    next_connection: u64,
}

impl Broker {
    fn push(&mut self, to: EndpointId, event: TransportEvent) {
        let Some(endpoint) = self.endpoints.get_mut(&to) else {
            return;
        };
        if !endpoint.alive {
            return;
        }
        if endpoint.silenced && matches!(event, TransportEvent::Data { .. }) {
            tracing::trace!("🔇 Dropping data for silenced endpoint {:?}", to);
            return;
        }
        endpoint.inbox.push_back(event);
    }

    fn next_connection(&mut self) -> ConnectionId {
        self.next_connection += 1;
        ConnectionId(self.next_connection)
    }

    fn register(&mut self, from: EndpointId, id: &PeerId) {
        match self.registry.get(id) {
            Some(owner) if *owner != from => {
                tracing::debug!("🔒 {} already registered", id);
                self.push(
                    from,
                    TransportEvent::RegistrationFailed {
                        error: P2PError::IdTaken(id.clone()),
                    },
                );
            }
            _ => {
                self.registry.insert(id.clone(), from);
                if let Some(endpoint) = self.endpoints.get_mut(&from) {
                    endpoint.registered = Some(id.clone());
                }
                self.push(from, TransportEvent::Registered { id: id.clone() });
            }
        }
    }

    fn connect(&mut self, from: EndpointId, remote: &PeerId) -> ConnectionId {
        let connection = self.next_connection();

        let target = self.registry.get(remote).copied().filter(|t| *t != from);
        let Some(target) = target else {
            self.push(
                from,
                TransportEvent::ConnectFailed {
                    connection,
                    error: P2PError::PeerUnavailable(remote.clone()),
                },
            );
            return connection;
        };

        let (Some(source), Some(host)) = (self.endpoints.get(&from), self.endpoints.get(&target))
        else {
            return connection;
        };
        let source_id = source.peer_id();
        let source_descriptor = source.descriptor.clone();
        let target_descriptor = host.descriptor.clone();

        let accepted = self.next_connection();
        self.links.insert(
            connection,
            Link {
                owner: from,
                peer: accepted,
            },
        );
        self.links.insert(
            accepted,
            Link {
                owner: target,
                peer: connection,
            },
        );

        self.push(
            from,
            TransportEvent::ConnectionOpened {
                connection,
                remote: remote.clone(),
                descriptor: target_descriptor,
                direction: Direction::Outbound,
            },
        );
        self.push(
            target,
            TransportEvent::ConnectionOpened {
                connection: accepted,
                remote: source_id,
                descriptor: source_descriptor,
                direction: Direction::Inbound,
            },
        );

        connection
    }

    fn send(&mut self, from: EndpointId, connection: ConnectionId, data: Vec<u8>) -> Result<()> {
        let link = self
            .links
            .get(&connection)
            .copied()
            .filter(|link| link.owner == from)
            .ok_or(P2PError::ConnectionClosed(connection))?;
        let peer = self
            .links
            .get(&link.peer)
            .copied()
            .ok_or(P2PError::ConnectionClosed(connection))?;

        self.push(
            peer.owner,
            TransportEvent::Data {
                connection: link.peer,
                data,
            },
        );
        Ok(())
    }

    /// Tear down a link; the remote side always hears about it
    fn close(&mut self, from: EndpointId, connection: ConnectionId, notify_self: bool) {
        let Some(link) = self.links.get(&connection).copied() else {
            return;
        };
        if link.owner != from {
            return;
        }
        self.links.remove(&connection);

        if let Some(peer) = self.links.remove(&link.peer) {
            self.push(
                peer.owner,
                TransportEvent::Closed {
                    connection: link.peer,
                },
            );
        }
        if notify_self {
            self.push(from, TransportEvent::Closed { connection });
        }
    }

    fn owned_links(&self, endpoint: EndpointId) -> Vec<ConnectionId> {
        let mut owned: Vec<ConnectionId> = self
            .links
            .iter()
            .filter(|(_, link)| link.owner == endpoint)
            .map(|(id, _)| *id)
            .collect();
        owned.sort();
        owned
    }

    fn destroy(&mut self, endpoint: EndpointId) {
        for connection in self.owned_links(endpoint) {
            self.close(endpoint, connection, false);
        }
        self.registry.retain(|_, owner| *owner != endpoint);
        if let Some(ep) = self.endpoints.get_mut(&endpoint) {
            ep.alive = false;
            ep.registered = None;
            ep.inbox.clear();
        }
    }
}

/// In-process network with matchbox-like semantics
///
/// Registration is serialized by the broker lock, so when several devices
/// race for one identifier exactly one of them wins.
#[derive(Debug, Clone, Default)]
pub struct MemoryNetwork {
    broker: Arc<Mutex<Broker>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    fn broker(&self) -> MutexGuard<'_, Broker> {
        self.broker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Attach a new device
    pub fn endpoint(&self, descriptor: DeviceDescriptor) -> MemoryTransport {
        let mut broker = self.broker();
        broker.next_endpoint += 1;
        let id = EndpointId(broker.next_endpoint);
        broker.endpoints.insert(
            id,
            Endpoint {
                anonymous: PeerId::random(),
                registered: None,
                descriptor,
                inbox: VecDeque::new(),
                silenced: false,
                alive: true,
            },
        );
        MemoryTransport {
            id,
            network: self.clone(),
        }
    }

    /// Drop every data packet addressed to `endpoint` until unsilenced
    pub fn set_silenced(&self, endpoint: EndpointId, silenced: bool) {
        if let Some(ep) = self.broker().endpoints.get_mut(&endpoint) {
            ep.silenced = silenced;
        }
    }

    /// Cut every link of `endpoint`; both sides see `Closed`, identity survives
    pub fn sever(&self, endpoint: EndpointId) {
        let mut broker = self.broker();
        for connection in broker.owned_links(endpoint) {
            broker.close(endpoint, connection, true);
        }
    }

    /// Simulate a crashed device: links drop, identifier is released
    pub fn kill(&self, endpoint: EndpointId) {
        self.broker().destroy(endpoint);
    }

    /// Number of open logical links, counting each direction once
    pub fn link_count(&self) -> usize {
        self.broker().links.len() / 2
    }

    pub fn is_registered(&self, id: &PeerId) -> bool {
        self.broker().registry.contains_key(id)
    }
}

/// One device's view of a `MemoryNetwork`
#[derive(Debug)]
pub struct MemoryTransport {
    id: EndpointId,
    network: MemoryNetwork,
}

impl MemoryTransport {
    pub fn endpoint_id(&self) -> EndpointId {
        self.id
    }

    pub fn network(&self) -> &MemoryNetwork {
        &self.network
    }

    fn ensure_alive(&self) -> Result<()> {
        let alive = self
            .network
            .broker()
            .endpoints
            .get(&self.id)
            .is_some_and(|ep| ep.alive);
        if alive {
            Ok(())
        } else {
            Err(P2PError::Destroyed)
        }
    }
}

impl Transport for MemoryTransport {
    fn register(&mut self, id: &PeerId) -> Result<()> {
        self.ensure_alive()?;
        self.network.broker().register(self.id, id);
        Ok(())
    }

    fn connect(&mut self, remote: &PeerId) -> Result<ConnectionId> {
        self.ensure_alive()?;
        Ok(self.network.broker().connect(self.id, remote))
    }

    fn send(&mut self, connection: ConnectionId, data: Vec<u8>) -> Result<()> {
        self.network.broker().send(self.id, connection, data)
    }

    fn close(&mut self, connection: ConnectionId) {
        self.network.broker().close(self.id, connection, false);
    }

    fn poll_events(&mut self) -> Vec<TransportEvent> {
        let mut broker = self.network.broker();
        let events = match broker.endpoints.get_mut(&self.id) {
            Some(endpoint) => endpoint.inbox.drain(..).collect(),
            None => Vec::new(),
        };
        events
    }

    fn destroy(&mut self) {
        self.network.broker().destroy(self.id);
    }

    fn local_id(&self) -> Option<PeerId> {
        let broker = self.network.broker();
        let id = broker
            .endpoints
            .get(&self.id)
            .filter(|ep| ep.alive)
            .map(Endpoint::peer_id);
        id
    }
}
