mod support;

use instant::Duration;
use quizsync_p2p::application::{MessageRouter, NegotiationState, SyncEvent};
use quizsync_p2p::domain::{DeviceDescriptor, DeviceKind, DeviceRole, Message};
use quizsync_p2p::infrastructure::MemoryTransport;
use quizsync_p2p::{SyncConfig, Transport, TransportEvent};
use support::{count_disconnects, q1_progress, rendezvous, DeviceFixture, STEP};

/// Holds the rendezvous identifier and accepts every link, but never sends its state
fn stalled_host(fixture: &DeviceFixture) -> MemoryTransport {
    let mut host = fixture
        .network
        .endpoint(DeviceDescriptor::new("stalled", DeviceKind::Unknown));
    host.register(&rendezvous()).unwrap();
    assert!(matches!(
        host.poll_events().as_slice(),
        [TransportEvent::Registered { .. }]
    ));
    host
}

/// Tick the fixture while `host` answers every ping; returns the host's other events
fn tick_answering_pings(
    fixture: &mut DeviceFixture,
    host: &mut MemoryTransport,
    duration: Duration,
) -> Vec<TransportEvent> {
    let router = MessageRouter::new();
    let mut seen = Vec::new();

    for _ in 0..duration.as_millis() / STEP.as_millis() {
        fixture.tick(1);
        for event in host.poll_events() {
            match event {
                TransportEvent::Data { connection, data } => {
                    if let Ok(Message::Ping { nonce }) = router.decode(&data) {
                        let pong = router.encode(&Message::Pong { nonce }).unwrap();
                        let _ = host.send(connection, pong);
                    }
                }
                other => seen.push(other),
            }
        }
    }
    seen
}

fn links_opened(events: &[TransportEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, TransportEvent::ConnectionOpened { .. }))
        .count()
}

fn links_closed(events: &[TransportEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, TransportEvent::Closed { .. }))
        .count()
}

#[test]
fn test_first_device_hosts() {
    let mut fixture = DeviceFixture::new(1);
    fixture.start_staggered();

    assert_eq!(fixture.hosts(), vec![0]);
    assert!(fixture.network.is_registered(&rendezvous()));
    assert!(fixture
        .drain(0)
        .contains(&SyncEvent::RoleAssumed(DeviceRole::Host)));
}

#[test]
fn test_simultaneous_registration_elects_one_host() {
    let mut fixture = DeviceFixture::new(2);
    fixture.start_all();
    fixture.tick(3);

    assert_eq!(fixture.hosts().len(), 1);
    assert_eq!(fixture.clients().len(), 1);

    let client = fixture.clients()[0];
    assert!(fixture.devices[client].connections().iter().all(|c| c.is_synced()));
    fixture.assert_converged(fixture.hosts()[0]);
}

#[test]
fn test_many_devices_racing_form_one_star() {
    let mut fixture = DeviceFixture::new(4);
    fixture.start_all();
    fixture.tick(3);

    let hosts = fixture.hosts();
    assert_eq!(hosts.len(), 1);
    assert_eq!(fixture.clients().len(), 3);
    assert_eq!(fixture.devices[hosts[0]].connections().len(), 3);
    assert_eq!(fixture.network.link_count(), 3);
}

#[test]
fn test_client_takes_over_when_host_crashes() {
    let mut fixture = DeviceFixture::with_progress(2, Some(q1_progress()));
    fixture.start_staggered();
    fixture.devices[0].set_selection([0]).unwrap();
    fixture.devices[0].check_answer().unwrap();
    fixture.tick(2);
    let counters = fixture.snapshot(1);

    fixture.crash(0);
    fixture.tick(5);

    assert_eq!(fixture.hosts(), vec![1]);
    assert!(fixture.network.is_registered(&rendezvous()));
    assert_eq!(fixture.snapshot(1), counters);
}

#[test]
fn test_survivors_re_elect_a_single_host() {
    let mut fixture = DeviceFixture::new(3);
    fixture.start_staggered();

    fixture.crash(0);
    fixture.tick(6);

    let hosts = fixture.hosts();
    assert_eq!(hosts.len(), 1);
    assert_eq!(fixture.clients().len(), 1);
    fixture.assert_converged(hosts[0]);
}

#[test]
fn test_transport_failure_falls_back_to_solo() {
    let mut fixture = DeviceFixture::new(1);
    let endpoint = fixture.devices[0].transport().endpoint_id();
    fixture.network.kill(endpoint);

    fixture.start(0);
    fixture.tick(1);

    assert!(fixture.devices[0].is_solo());
    assert!(matches!(
        fixture.devices[0].negotiation(),
        NegotiationState::Solo { .. }
    ));
    assert!(fixture
        .drain(0)
        .iter()
        .any(|e| matches!(e, SyncEvent::EnteredSolo { .. })));

    // The session keeps working locally
    fixture.devices[0].next_question();
    assert!(fixture.devices[0].reset_progress(fixture.wall).is_ok());
}

#[test]
fn test_late_device_joins_the_new_host() {
    let mut fixture = DeviceFixture::new(3);
    fixture.start(0);
    fixture.tick(5);
    fixture.start(1);
    fixture.tick(5);

    fixture.crash(0);
    fixture.tick(5);
    assert_eq!(fixture.hosts(), vec![1]);

    fixture.start(2);
    fixture.tick(5);
    assert_eq!(fixture.clients(), vec![2]);
    fixture.assert_converged(1);
}

#[test]
fn test_host_that_never_syncs_ends_in_solo() {
    let mut fixture = DeviceFixture::new(1);
    let mut host = stalled_host(&fixture);

    fixture.start(0);
    fixture.advance(Duration::from_secs(120));

    let rounds = SyncConfig::default().max_election_rounds as usize;
    assert!(fixture.devices[0].is_solo());
    assert_eq!(fixture.devices[0].role(), None);
    assert_eq!(links_opened(&host.poll_events()), rounds);
    assert_eq!(fixture.network.link_count(), 0);

    let events = fixture.drain(0);
    assert!(!events
        .iter()
        .any(|e| matches!(e, SyncEvent::Synced { .. })));
    assert!(events
        .iter()
        .any(|e| matches!(e, SyncEvent::EnteredSolo { .. })));
}

#[test]
fn test_missing_initial_sync_drops_the_link_and_reelects() {
    let mut fixture = DeviceFixture::new(1);
    let mut host = stalled_host(&fixture);
    fixture.start(0);

    let seen = tick_answering_pings(&mut fixture, &mut host, Duration::from_millis(9_500));
    assert_eq!(links_opened(&seen), 1);
    assert_eq!(links_closed(&seen), 0);
    assert!(matches!(
        fixture.devices[0].negotiation(),
        NegotiationState::Syncing { .. }
    ));
    assert!(fixture.devices[0]
        .connections()
        .iter()
        .all(|c| !c.is_synced() && c.last_pong.is_some()));
    let first = fixture.devices[0].connections().ids();

    // Past the sync timeout: the link is dropped and a new round connects again
    let seen = tick_answering_pings(&mut fixture, &mut host, Duration::from_millis(1_500));
    assert_eq!(links_closed(&seen), 1);
    assert_eq!(links_opened(&seen), 1);
    assert_eq!(count_disconnects(&fixture.drain(0)), 1);
    assert_ne!(fixture.devices[0].connections().ids(), first);
    assert!(!matches!(
        fixture.devices[0].negotiation(),
        NegotiationState::Joined { .. }
    ));

    let seen = tick_answering_pings(&mut fixture, &mut host, Duration::from_secs(60));
    assert!(fixture.devices[0].is_solo());
    assert_eq!(
        links_opened(&seen) + 2,
        SyncConfig::default().max_election_rounds as usize
    );
}
