pub mod application;
pub mod domain;

pub use application::{
    bootstrap, Bootstrap, InMemoryProgressStore, InMemoryQuizProvider, ProgressStore,
    ProviderError, QuizProvider,
};
pub use domain::{
    Answer, CurrentQuestion, PresentedQuestion, Progress, Question, QuestionId, Quiz, QuizSession,
    Recurrence, Recurrences, SessionError, SessionId, SessionState, SessionView, Settings,
    SyncSnapshot, Timestamp, Verdict,
};
