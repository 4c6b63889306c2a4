use crate::application::{ProgressStore, QuizProvider};
use crate::domain::{Quiz, QuizSession, SessionId, Settings, Timestamp};
use rand::Rng;

/// Result of starting a session from its collaborators
#[derive(Debug, Clone)]
pub struct Bootstrap {
    pub session: QuizSession,
    /// Whether peer synchronization should run for this session
    pub sync_enabled: bool,
}

/// Load settings, quiz content and progress, degrading instead of failing
///
/// - settings unavailable: `Settings::default()` (sync off)
/// - quiz unavailable: empty session with sync off
/// - progress unavailable: fresh progress
pub fn bootstrap<P, S, R>(
    provider: &P,
    store: &S,
    session_id: &SessionId,
    now: Timestamp,
    rng: &mut R,
) -> Bootstrap
where
    P: QuizProvider + ?Sized,
    S: ProgressStore + ?Sized,
    R: Rng + ?Sized,
{
    let settings = provider.fetch_user_settings().unwrap_or_else(|e| {
        tracing::warn!("⚠️ Settings unavailable, using defaults: {}", e);
        Settings::default()
    });

    let (quiz, sync_enabled) = match provider.fetch_quiz(session_id) {
        Ok(quiz) => (quiz, settings.sync_enabled),
        Err(e) => {
            tracing::warn!("⚠️ Quiz {} unavailable, starting empty session: {}", session_id, e);
            (Quiz::empty(), false)
        }
    };

    let progress = match store.load_progress(session_id, sync_enabled) {
        Ok(progress) => progress,
        Err(e) => {
            tracing::warn!("⚠️ Progress for {} unavailable, starting fresh: {}", session_id, e);
            None
        }
    };

    tracing::info!(
        "📚 Session {} ready ({} questions, sync {})",
        session_id,
        quiz.questions.len(),
        if sync_enabled { "on" } else { "off" }
    );

    Bootstrap {
        session: QuizSession::start(quiz, settings, progress, now, rng),
        sync_enabled,
    }
}
