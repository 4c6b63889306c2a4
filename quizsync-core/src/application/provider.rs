use crate::domain::{Progress, Quiz, SessionId, Settings};
use std::collections::HashMap;

/// Errors reported by quiz content and progress collaborators
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("No quiz found for session {0}")]
    NotFound(SessionId),

    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("Stored data is corrupt: {0}")]
    Corrupt(String),
}

/// Source of quiz content and per-user settings
pub trait QuizProvider {
    fn fetch_quiz(&self, session: &SessionId) -> Result<Quiz, ProviderError>;

    fn fetch_user_settings(&self) -> Result<Settings, ProviderError>;
}

/// Persistence for session progress
///
/// `sync` selects the copy shared between the user's devices instead of the
/// device-local one.
pub trait ProgressStore {
    fn load_progress(
        &self,
        session: &SessionId,
        sync: bool,
    ) -> Result<Option<Progress>, ProviderError>;

    fn save_progress(&mut self, session: &SessionId, progress: &Progress)
        -> Result<(), ProviderError>;

    fn reset_progress(&mut self, session: &SessionId) -> Result<(), ProviderError>;
}

/// Quiz provider backed by a map, for tests and simulations
#[derive(Debug, Clone, Default)]
pub struct InMemoryQuizProvider {
    quizzes: HashMap<SessionId, Quiz>,
    settings: Option<Settings>,
}

impl InMemoryQuizProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quiz(mut self, session: SessionId, quiz: Quiz) -> Self {
        self.quizzes.insert(session, quiz);
        self
    }

    /// Without settings, `fetch_user_settings` reports the service as unavailable
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = Some(settings);
        self
    }
}

impl QuizProvider for InMemoryQuizProvider {
    fn fetch_quiz(&self, session: &SessionId) -> Result<Quiz, ProviderError> {
        self.quizzes
            .get(session)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(session.clone()))
    }

    fn fetch_user_settings(&self) -> Result<Settings, ProviderError> {
        self.settings
            .ok_or_else(|| ProviderError::Unavailable("no settings configured".to_string()))
    }
}

/// Progress store with a device-local and a shared map
///
/// Saves go to both copies, loads pick one by the `sync` flag.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProgressStore {
    local: HashMap<SessionId, Progress>,
    shared: HashMap<SessionId, Progress>,
}

impl InMemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_local(mut self, session: SessionId, progress: Progress) -> Self {
        self.local.insert(session, progress);
        self
    }

    pub fn with_shared(mut self, session: SessionId, progress: Progress) -> Self {
        self.shared.insert(session, progress);
        self
    }
}

impl ProgressStore for InMemoryProgressStore {
    fn load_progress(
        &self,
        session: &SessionId,
        sync: bool,
    ) -> Result<Option<Progress>, ProviderError> {
        let map = if sync { &self.shared } else { &self.local };
        Ok(map.get(session).cloned())
    }

    fn save_progress(
        &mut self,
        session: &SessionId,
        progress: &Progress,
    ) -> Result<(), ProviderError> {
        self.local.insert(session.clone(), progress.clone());
        self.shared.insert(session.clone(), progress.clone());
        Ok(())
    }

    fn reset_progress(&mut self, session: &SessionId) -> Result<(), ProviderError> {
        self.local.remove(session);
        self.shared.remove(session);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::QuestionId;

    #[test]
    fn test_missing_quiz_is_not_found() {
        let provider = InMemoryQuizProvider::new();
        let session = SessionId::new("s1");
        assert_eq!(
            provider.fetch_quiz(&session),
            Err(ProviderError::NotFound(session))
        );
    }

    #[test]
    fn test_store_picks_copy_by_sync_flag() {
        let session = SessionId::new("s1");
        let store = InMemoryProgressStore::new()
            .with_local(
                session.clone(),
                Progress {
                    correct_count: 1,
                    ..Default::default()
                },
            )
            .with_shared(
                session.clone(),
                Progress {
                    correct_count: 5,
                    ..Default::default()
                },
            );

        assert_eq!(store.load_progress(&session, false).unwrap().unwrap().correct_count, 1);
        assert_eq!(store.load_progress(&session, true).unwrap().unwrap().correct_count, 5);
    }

    #[test]
    fn test_save_then_reset() {
        let session = SessionId::new("s1");
        let mut store = InMemoryProgressStore::new();
        let progress = Progress {
            current_question_id: Some(QuestionId(3)),
            ..Default::default()
        };

        store.save_progress(&session, &progress).unwrap();
        assert_eq!(store.load_progress(&session, true).unwrap(), Some(progress));

        store.reset_progress(&session).unwrap();
        assert_eq!(store.load_progress(&session, false).unwrap(), None);
    }
}
