use cucumber::{then, when};
use instant::Duration;
use quizsync_tests::QuizWorld;

#[when(expr = "{string} goes silent")]
async fn goes_silent(world: &mut QuizWorld, name: String) {
    world.set_silenced(&name, true);
}

#[when(expr = "{string} is heard again")]
async fn heard_again(world: &mut QuizWorld, name: String) {
    world.set_silenced(&name, false);
}

#[when(expr = "{int} seconds pass")]
async fn seconds_pass(world: &mut QuizWorld, seconds: u64) {
    world.advance(Duration::from_secs(seconds));
}

#[then(expr = "{string} has seen {int} device(s) leave")]
async fn seen_leave(world: &mut QuizWorld, name: String, count: usize) {
    assert_eq!(world.disconnects_seen(&name), count);
}

#[then(expr = "{string} has no connections")]
async fn no_connections(world: &mut QuizWorld, name: String) {
    assert!(world.device(&name).connections().is_empty());
}

#[then(expr = "{string} hears back from every device")]
async fn answers_heartbeats(world: &mut QuizWorld, name: String) {
    assert!(world
        .device(&name)
        .connections()
        .iter()
        .all(|c| c.last_pong.is_some()));
}
