use quizsync_core::{PresentedQuestion, QuestionId, SyncSnapshot};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Wire message exchanged between devices
///
/// Only `InitialSync` carries a full snapshot; every other message carries
/// just what the recipient needs to derive the same state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// Counters, recurrences and start anchor for a newly joined device
    InitialSync(SyncSnapshot),

    /// The visible question and its selection; `None` once the session finished
    QuestionUpdate { question: Option<PresentedQuestion> },

    /// The current question was checked on the sending side
    AnswerChecked { question_id: QuestionId },

    Ping { nonce: u64 },

    Pong { nonce: u64 },
}

impl Message {
    /// Every tag the router accepts
    pub const TAGS: [&'static str; 5] = [
        "initial_sync",
        "question_update",
        "answer_checked",
        "ping",
        "pong",
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            Message::InitialSync(_) => "initial_sync",
            Message::QuestionUpdate { .. } => "question_update",
            Message::AnswerChecked { .. } => "answer_checked",
            Message::Ping { .. } => "ping",
            Message::Pong { .. } => "pong",
        }
    }

    /// Ping and Pong never touch session state
    pub fn is_heartbeat(&self) -> bool {
        matches!(self, Message::Ping { .. } | Message::Pong { .. })
    }
}
