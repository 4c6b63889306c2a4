use cucumber::{given, then, when};
use quizsync_p2p::application::NegotiationState;
use quizsync_p2p::{DeviceRole, SyncEvent};
use quizsync_tests::QuizWorld;

// ===== Given Steps =====

#[given(expr = "device {string} is online")]
async fn device_is_online(world: &mut QuizWorld, name: String) {
    world.start(&name);
    world.tick(5);
}

#[given(expr = "devices {string} and {string} are online")]
async fn two_devices_online(world: &mut QuizWorld, first: String, second: String) {
    device_is_online(world, first).await;
    device_is_online(world, second).await;
}

#[given(expr = "devices {string}, {string} and {string} are online")]
async fn three_devices_online(world: &mut QuizWorld, first: String, second: String, third: String) {
    two_devices_online(world, first, second).await;
    device_is_online(world, third).await;
}

#[given(expr = "{string} cannot reach the signalling server")]
async fn cannot_reach_signalling(world: &mut QuizWorld, name: String) {
    let index = world.add_device(&name);
    let endpoint = world.devices[index].transport().endpoint_id();
    world.network.kill(endpoint);
}

// ===== When Steps =====

#[when(expr = "devices {string}, {string} and {string} start at the same moment")]
async fn devices_start_together(world: &mut QuizWorld, first: String, second: String, third: String) {
    for name in [&first, &second, &third] {
        world.add_device(name);
    }
    for name in [&first, &second, &third] {
        world.start(name);
    }
    world.tick(3);
}

#[when(expr = "{string} starts")]
async fn device_starts(world: &mut QuizWorld, name: String) {
    world.start(&name);
    world.tick(1);
}

#[when(expr = "{string} comes online")]
async fn device_comes_online(world: &mut QuizWorld, name: String) {
    device_is_online(world, name).await;
}

#[when(expr = "{string} crashes")]
async fn device_crashes(world: &mut QuizWorld, name: String) {
    world.crash(&name);
}

#[when("a moment passes")]
async fn moment_passes(world: &mut QuizWorld) {
    world.tick(10);
}

// ===== Then Steps =====

#[then(expr = "{string} is the host")]
async fn is_host(world: &mut QuizWorld, name: String) {
    assert_eq!(
        world.device(&name).role(),
        Some(DeviceRole::Host),
        "{} should be hosting",
        name
    );
}

#[then(expr = "{string} is a client")]
async fn is_client(world: &mut QuizWorld, name: String) {
    assert_eq!(world.device(&name).role(), Some(DeviceRole::Client));
}

#[then("exactly one device is the host")]
async fn exactly_one_host(world: &mut QuizWorld) {
    let hosts = world.with_role(DeviceRole::Host);
    assert_eq!(hosts.len(), 1, "hosts: {:?}", hosts);
}

#[then(expr = "there is/are {int} client(s)")]
async fn client_count(world: &mut QuizWorld, count: usize) {
    assert_eq!(world.with_role(DeviceRole::Client).len(), count);
}

#[then(expr = "{string} is synchronized")]
async fn is_synchronized(world: &mut QuizWorld, name: String) {
    let device = world.device(&name);
    assert!(!device.connections().is_empty(), "{} has no connections", name);
    assert!(device.connections().iter().all(|c| c.is_synced()));
}

#[then(expr = "{string} studies alone")]
async fn studies_alone(world: &mut QuizWorld, name: String) {
    let index = world.index(&name);
    assert!(world.devices[index].is_solo());
    assert!(matches!(
        world.devices[index].negotiation(),
        NegotiationState::Solo { .. }
    ));
    assert!(world.events[index]
        .iter()
        .any(|e| matches!(e, SyncEvent::EnteredSolo { .. })));
}

#[then(expr = "{string} has {int} connected device(s)")]
async fn connected_devices(world: &mut QuizWorld, name: String, count: usize) {
    assert_eq!(world.device(&name).peers().len(), count);
}
