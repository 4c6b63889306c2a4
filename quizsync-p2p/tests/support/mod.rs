#![allow(dead_code)]

use instant::{Duration, Instant};
use quizsync_core::{
    Answer, Progress, Question, QuestionId, Quiz, QuizSession, Recurrence, Settings, SessionId,
    SyncSnapshot, Timestamp,
};
use quizsync_p2p::application::SyncEvent;
use quizsync_p2p::domain::{rendezvous_id, DeviceDescriptor, DeviceKind, DeviceRole, PeerId};
use quizsync_p2p::infrastructure::{MemoryNetwork, MemoryTransport};
use quizsync_p2p::{SyncConfig, SyncSession, SyncSessionBuilder};
use rand::rngs::StdRng;
use rand::SeedableRng;

pub const STEP: Duration = Duration::from_millis(100);

/// Route protocol logs to the test harness; `RUST_LOG=quizsync_p2p=debug` to see them
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn capitals() -> Quiz {
    Quiz::new(
        "Capitals",
        vec![
            Question::new(
                1,
                "Capital of France?",
                vec![Answer::correct("Paris"), Answer::wrong("Lyon")],
            ),
            Question::new(
                2,
                "Capital of Italy?",
                vec![Answer::wrong("Milan"), Answer::correct("Rome")],
            ),
            Question::new(
                3,
                "Capitals on the Danube?",
                vec![
                    Answer::correct("Vienna"),
                    Answer::correct("Budapest"),
                    Answer::wrong("Prague"),
                ],
            ),
        ],
    )
}

/// Two-question progress with q1 on screen
pub fn q1_progress() -> Progress {
    Progress {
        current_question_id: Some(QuestionId(1)),
        correct_count: 0,
        wrong_count: 0,
        study_time_seconds: 0,
        recurrences: vec![
            Recurrence::new(1u32, 1),
            Recurrence::new(2u32, 1),
            Recurrence::new(3u32, 0),
        ],
    }
}

pub fn rendezvous() -> PeerId {
    rendezvous_id(&SessionId::new("capitals"), "anna")
}

/// Fixture of N devices of one user over an in-process network
///
/// Time is explicit: every tick advances the shared clock by `STEP` and
/// polls each running device in index order.
pub struct DeviceFixture {
    pub network: MemoryNetwork,
    pub devices: Vec<SyncSession<MemoryTransport>>,
    pub now: Instant,
    pub wall: Timestamp,
    running: Vec<bool>,
}

impl DeviceFixture {
    pub fn new(count: usize) -> Self {
        Self::with_progress(count, None)
    }

    /// The first device starts from `progress`; the rest start fresh
    pub fn with_progress(count: usize, progress: Option<Progress>) -> Self {
        init_tracing();
        let network = MemoryNetwork::new();
        let wall = Timestamp::from_millis(1_700_000_000_000);
        let mut devices = Vec::new();

        for i in 0..count {
            let stored = if i == 0 { progress.clone() } else { None };
            devices.push(Self::device(&network, i, stored, wall));
        }

        Self {
            network,
            devices,
            now: Instant::now(),
            wall,
            running: vec![false; count],
        }
    }

    fn device(
        network: &MemoryNetwork,
        index: usize,
        progress: Option<Progress>,
        wall: Timestamp,
    ) -> SyncSession<MemoryTransport> {
        let seed = 100 + index as u64;
        let mut rng = StdRng::seed_from_u64(seed);
        let settings = Settings::default().with_sync(true);
        let session = QuizSession::start(capitals(), settings, progress, wall, &mut rng);

        let descriptor = DeviceDescriptor::new(format!("device-{}", index), DeviceKind::Desktop);
        SyncSessionBuilder::new(session, rendezvous())
            .config(SyncConfig::new(descriptor.clone()))
            .seed(seed)
            .build(network.endpoint(descriptor))
    }

    /// Start one device without polling anything
    pub fn start(&mut self, index: usize) {
        self.devices[index].start_at(self.now);
        self.running[index] = true;
    }

    pub fn start_all(&mut self) {
        for i in 0..self.devices.len() {
            self.start(i);
        }
    }

    /// Start devices one after another, letting each settle
    pub fn start_staggered(&mut self) {
        for i in 0..self.devices.len() {
            self.start(i);
            self.tick(5);
        }
    }

    pub fn tick(&mut self, count: usize) {
        for _ in 0..count {
            self.now += STEP;
            for (device, running) in self.devices.iter_mut().zip(&self.running) {
                if *running {
                    device.poll_at(self.now);
                }
            }
        }
    }

    /// Tick until `duration` of fixture time has passed
    pub fn advance(&mut self, duration: Duration) {
        let steps = (duration.as_millis() / STEP.as_millis()) as usize;
        self.tick(steps.max(1));
    }

    /// Crash a device: identity released, links dropped, no more polling
    pub fn crash(&mut self, index: usize) {
        self.devices[index].shutdown();
        self.running[index] = false;
    }

    pub fn hosts(&self) -> Vec<usize> {
        self.indices_with_role(DeviceRole::Host)
    }

    pub fn clients(&self) -> Vec<usize> {
        self.indices_with_role(DeviceRole::Client)
    }

    fn indices_with_role(&self, role: DeviceRole) -> Vec<usize> {
        (0..self.devices.len())
            .filter(|i| self.running[*i] && self.devices[*i].role() == Some(role))
            .collect()
    }

    pub fn snapshot(&self, index: usize) -> SyncSnapshot {
        self.devices[index].session().snapshot()
    }

    /// Every running device agrees with device `reference`
    pub fn assert_converged(&self, reference: usize) {
        let expected = self.snapshot(reference);
        let presented = self.devices[reference].session().presented();
        for (i, device) in self.devices.iter().enumerate() {
            if !self.running[i] {
                continue;
            }
            assert_eq!(
                device.session().snapshot(),
                expected,
                "device {} counters differ from device {}",
                i,
                reference
            );
            assert_eq!(
                device.session().presented(),
                presented,
                "device {} shows a different question than device {}",
                i,
                reference
            );
        }
    }

    pub fn drain(&mut self, index: usize) -> Vec<SyncEvent> {
        self.devices[index].drain_events()
    }
}

pub fn count_disconnects(events: &[SyncEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, SyncEvent::PeerDisconnected { .. }))
        .count()
}
