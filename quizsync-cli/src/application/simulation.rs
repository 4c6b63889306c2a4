//! Several devices of one user on an in-process network.
//!
//! Runs on a virtual clock so a host takeover that takes seconds of
//! liveness timeouts finishes instantly.

use instant::{Duration, Instant};
use quizsync_core::{Answer, Question, Quiz, QuizSession, SessionId, Settings, Timestamp};
use quizsync_p2p::{
    rendezvous_id, DeviceDescriptor, DeviceKind, DeviceRole, MemoryNetwork, MemoryTransport,
    SyncConfig, SyncSession, SyncSessionBuilder,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

const STEP: Duration = Duration::from_millis(100);

/// Knobs for a simulated run
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub devices: usize,
    pub seed: u64,
    /// Crash the host after the first answer to show a takeover
    pub crash_host: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            devices: 3,
            seed: 7,
            crash_host: true,
        }
    }
}

/// What each device looked like at the end
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceReport {
    pub name: String,
    pub role: Option<DeviceRole>,
    pub alive: bool,
    pub correct_count: u32,
    pub wrong_count: u32,
    pub current: Option<String>,
}

pub fn demo_quiz() -> Quiz {
    Quiz::new(
        "European capitals",
        vec![
            Question::new(
                1,
                "Capital of France?",
                vec![Answer::correct("Paris"), Answer::wrong("Lyon"), Answer::wrong("Nice")],
            ),
            Question::new(
                2,
                "Capital of Spain?",
                vec![Answer::correct("Madrid"), Answer::wrong("Sevilla")],
            ),
            Question::new(
                3,
                "Capital of Italy?",
                vec![Answer::correct("Rome"), Answer::wrong("Milan"), Answer::wrong("Turin")],
            ),
        ],
    )
}

struct Simulation {
    devices: Vec<SyncSession<MemoryTransport>>,
    alive: Vec<bool>,
    now: Instant,
    wall: Timestamp,
}

impl Simulation {
    fn tick(&mut self, count: usize) {
        for _ in 0..count {
            self.now += STEP;
            for (device, alive) in self.devices.iter_mut().zip(&self.alive) {
                if *alive {
                    device.poll_at(self.now);
                }
            }
        }
    }

    fn advance(&mut self, duration: Duration) {
        let ticks = (duration.as_millis() / STEP.as_millis()) as usize + 1;
        self.tick(ticks);
    }

    fn host(&self) -> Option<usize> {
        self.devices
            .iter()
            .zip(&self.alive)
            .position(|(d, alive)| *alive && d.role() == Some(DeviceRole::Host))
    }

    fn log_roles(&self, phase: &str) {
        for (device, alive) in self.devices.iter().zip(&self.alive) {
            if *alive {
                tracing::info!(
                    "🧪 [{}] {:?} is {:?}",
                    phase,
                    device.transport().endpoint_id(),
                    device.role()
                );
            }
        }
    }
}

/// Run the scripted scenario and report every device's final state
pub fn simulate(config: &SimulationConfig) -> crate::Result<Vec<DeviceReport>> {
    let network = MemoryNetwork::new();
    let session_id = SessionId::new("capitals");
    let rendezvous = rendezvous_id(&session_id, "demo");
    let settings = Settings::default().with_sync(true);
    let mut rng = StdRng::seed_from_u64(config.seed);

    let names: Vec<String> = (0..config.devices).map(|i| format!("device-{}", i + 1)).collect();
    let devices = names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let descriptor = DeviceDescriptor::new(name.clone(), DeviceKind::Desktop);
            let session = QuizSession::start(demo_quiz(), settings, None, Timestamp::now(), &mut rng);
            SyncSessionBuilder::new(session, rendezvous.clone())
                .config(SyncConfig::new(descriptor.clone()))
                .seed(config.seed + i as u64)
                .build(network.endpoint(descriptor))
        })
        .collect();

    let mut sim = Simulation {
        devices,
        alive: vec![true; config.devices],
        now: Instant::now(),
        wall: Timestamp::now(),
    };

    for i in 0..config.devices {
        let now = sim.now;
        sim.devices[i].start_at(now);
        sim.tick(5);
    }
    sim.tick(10);
    sim.log_roles("formed");

    // The last device answers the first question it sees, right or wrong
    if let Some(last) = sim.devices.last_mut() {
        last.toggle_answer(0)?;
        last.check_answer()?;
    }
    sim.tick(5);

    if config.crash_host {
        if let Some(host) = sim.host() {
            tracing::info!("🧪 Crashing host {}", names[host]);
            sim.devices[host].shutdown();
            sim.alive[host] = false;
            let timeout = SyncConfig::default().ping_interval + SyncConfig::default().ping_timeout;
            sim.advance(timeout + Duration::from_secs(2));
            sim.log_roles("after takeover");
        }
    }

    let wall = sim.wall;
    Ok(sim
        .devices
        .iter()
        .zip(&sim.alive)
        .zip(names)
        .map(|((device, alive), name)| {
            let view = device.view(wall).session;
            DeviceReport {
                name,
                role: device.role(),
                alive: *alive,
                correct_count: view.correct_count,
                wrong_count: view.wrong_count,
                current: view.question.map(|q| q.text),
            }
        })
        .collect())
}
