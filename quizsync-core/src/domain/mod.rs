pub mod progress;
pub mod quiz;
pub mod session;
pub mod settings;
pub mod timestamp;

pub use progress::{Progress, Recurrence, Recurrences};
pub use quiz::{Answer, Question, QuestionId, Quiz, SessionId};
pub use session::{
    AnswerView, CurrentQuestion, PresentedQuestion, QuestionView, QuizSession, SessionError,
    SessionState, SessionView, SyncSnapshot, Verdict,
};
pub use settings::Settings;
pub use timestamp::Timestamp;
