use cucumber::World;
use instant::{Duration, Instant};
use quizsync_core::{
    Answer, Progress, Question, QuestionId, Quiz, QuizSession, Recurrence, SessionId, Settings,
    Timestamp,
};
use quizsync_p2p::{
    rendezvous_id, DeviceDescriptor, DeviceKind, DeviceRole, MemoryNetwork, MemoryTransport,
    SyncConfig, SyncEvent, SyncSession, SyncSessionBuilder,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::fmt;

/// Virtual time advanced per tick
pub const STEP: Duration = Duration::from_millis(100);

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

/// Stored progress of the first device: France on screen, Danube mastered
pub fn stored_progress() -> Progress {
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

/// All devices of user "anna" studying the "capitals" session
#[derive(World)]
pub struct QuizWorld {
    pub network: MemoryNetwork,
    pub devices: Vec<SyncSession<MemoryTransport>>,
    pub names: HashMap<String, usize>,
    pub running: Vec<bool>,
    /// Events drained from each device so far
    pub events: Vec<Vec<SyncEvent>>,
    pub now: Instant,
    pub wall: Timestamp,

    /// Last failed user action
    pub last_error: Option<String>,
}

impl Default for QuizWorld {
    fn default() -> Self {
        Self {
            network: MemoryNetwork::new(),
            devices: Vec::new(),
            names: HashMap::new(),
            running: Vec::new(),
            events: Vec::new(),
            now: Instant::now(),
            wall: Timestamp::from_millis(1_700_000_000_000),
            last_error: None,
        }
    }
}

impl fmt::Debug for QuizWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let roles: Vec<_> = self
            .names
            .iter()
            .map(|(name, i)| (name.clone(), self.devices[*i].role(), self.running[*i]))
            .collect();
        f.debug_struct("QuizWorld")
            .field("devices", &roles)
            .field("last_error", &self.last_error)
            .finish()
    }
}

impl QuizWorld {
    /// Create a device; the first one starts from stored progress
    pub fn add_device(&mut self, name: &str) -> usize {
        if let Some(index) = self.names.get(name) {
            return *index;
        }

        let index = self.devices.len();
        let seed = 100 + index as u64;
        let mut rng = StdRng::seed_from_u64(seed);
        let progress = (index == 0).then(stored_progress);
        let settings = Settings::default().with_sync(true);
        let session = QuizSession::start(capitals(), settings, progress, self.wall, &mut rng);

        let descriptor = DeviceDescriptor::new(name, DeviceKind::Desktop);
        let rendezvous = rendezvous_id(&SessionId::new("capitals"), "anna");
        let device = SyncSessionBuilder::new(session, rendezvous)
            .config(SyncConfig::new(descriptor.clone()))
            .seed(seed)
            .build(self.network.endpoint(descriptor));

        self.devices.push(device);
        self.running.push(false);
        self.events.push(Vec::new());
        self.names.insert(name.to_string(), index);
        index
    }

    pub fn index(&self, name: &str) -> usize {
        *self
            .names
            .get(name)
            .unwrap_or_else(|| panic!("Device '{}' not found", name))
    }

    pub fn device(&self, name: &str) -> &SyncSession<MemoryTransport> {
        &self.devices[self.index(name)]
    }

    pub fn device_mut(&mut self, name: &str) -> &mut SyncSession<MemoryTransport> {
        let index = self.index(name);
        &mut self.devices[index]
    }

    pub fn start(&mut self, name: &str) {
        let index = self.add_device(name);
        self.devices[index].start_at(self.now);
        self.running[index] = true;
    }

    pub fn tick(&mut self, count: usize) {
        for _ in 0..count {
            self.now += STEP;
            for (i, device) in self.devices.iter_mut().enumerate() {
                if self.running[i] {
                    device.poll_at(self.now);
                }
                self.events[i].extend(device.drain_events());
            }
        }
    }

    pub fn advance(&mut self, duration: Duration) {
        let steps = (duration.as_millis() / STEP.as_millis()) as usize;
        self.tick(steps.max(1));
    }

    pub fn crash(&mut self, name: &str) {
        let index = self.index(name);
        self.devices[index].shutdown();
        self.running[index] = false;
    }

    pub fn set_silenced(&mut self, name: &str, silenced: bool) {
        let endpoint = self.device(name).transport().endpoint_id();
        self.network.set_silenced(endpoint, silenced);
    }

    /// Names of running devices holding `role`
    pub fn with_role(&self, role: DeviceRole) -> Vec<String> {
        let mut names: Vec<String> = self
            .names
            .iter()
            .filter(|(_, i)| self.running[**i] && self.devices[**i].role() == Some(role))
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn running_devices(&self) -> impl Iterator<Item = &SyncSession<MemoryTransport>> {
        self.devices
            .iter()
            .zip(&self.running)
            .filter(|(_, running)| **running)
            .map(|(device, _)| device)
    }

    /// Display position of the answer with this text on the device's screen
    pub fn answer_index(&self, name: &str, text: &str) -> usize {
        self.device(name)
            .view(self.wall)
            .session
            .question
            .and_then(|q| q.answers.into_iter().find(|a| a.text == text))
            .map(|a| a.index)
            .unwrap_or_else(|| panic!("'{}' does not show the answer '{}'", name, text))
    }

    pub fn disconnects_seen(&self, name: &str) -> usize {
        self.events[self.index(name)]
            .iter()
            .filter(|e| matches!(e, SyncEvent::PeerDisconnected { .. }))
            .count()
    }

    pub fn record<T, E: fmt::Display>(&mut self, result: Result<T, E>) {
        self.last_error = result.err().map(|e| e.to_string());
    }
}
