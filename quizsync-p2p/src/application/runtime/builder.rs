use crate::application::config::SyncConfig;
use crate::application::runtime::SyncSession;
use crate::domain::{rendezvous_id, PeerId};
use crate::infrastructure::transport::Transport;
use quizsync_core::{Bootstrap, QuizSession, SessionId};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Builder for a `SyncSession` over any transport
pub struct SyncSessionBuilder {
    session: QuizSession,
    rendezvous: PeerId,
    config: SyncConfig,
    seed: Option<u64>,
    sync_enabled: bool,
}

impl SyncSessionBuilder {
    pub fn new(session: QuizSession, rendezvous: PeerId) -> Self {
        let sync_enabled = session.settings().sync_enabled;
        Self {
            session,
            rendezvous,
            config: SyncConfig::default(),
            seed: None,
            sync_enabled,
        }
    }

    /// Start from a bootstrapped session; the rendezvous id is derived from
    /// the session and user
    pub fn from_bootstrap(bootstrap: Bootstrap, session_id: &SessionId, user: &str) -> Self {
        let rendezvous = rendezvous_id(session_id, user);
        Self::new(bootstrap.session, rendezvous).sync_enabled(bootstrap.sync_enabled)
    }

    pub fn config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Fix the question picker's randomness
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn sync_enabled(mut self, enabled: bool) -> Self {
        self.sync_enabled = enabled;
        self
    }

    pub fn build<T: Transport>(self, transport: T) -> SyncSession<T> {
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        tracing::debug!(
            "Building sync session {} (sync {})",
            self.rendezvous,
            if self.sync_enabled { "on" } else { "off" }
        );

        SyncSession::new(
            transport,
            self.rendezvous,
            self.session,
            self.config,
            rng,
            self.sync_enabled,
        )
    }
}
