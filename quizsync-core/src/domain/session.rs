use crate::domain::{
    Progress, QuestionId, Quiz, Recurrence, Recurrences, Settings, Timestamp,
};
use rand::seq::SliceRandom;
use rand::Rng;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Errors raised by session operations
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("No question is currently presented")]
    NoCurrentQuestion,

    #[error("Question {0} is not part of this quiz")]
    UnknownQuestion(QuestionId),

    #[error("Question {0} was already checked")]
    AlreadyChecked(QuestionId),

    #[error("Answer index {index} out of range (question has {len} answers)")]
    AnswerOutOfRange { index: usize, len: usize },

    #[error("Answer order for question {0} is not a permutation of its answers")]
    InvalidAnswerOrder(QuestionId),

    #[error("Check targets question {received}, but {expected} is presented")]
    QuestionMismatch {
        expected: QuestionId,
        received: QuestionId,
    },
}

/// Outcome of evaluating a selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Correct,
    Wrong,
}

/// The question instance currently shown to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentQuestion {
    pub question_id: QuestionId,
    /// Display order of the answers, generated once when the question became current
    pub answer_order: Vec<usize>,
    /// Selected answer indices (indices into the question definition, not display positions)
    pub selected: BTreeSet<usize>,
    pub checked: bool,
}

impl CurrentQuestion {
    /// Map a display position to the answer index it shows
    pub fn answer_at_position(&self, position: usize) -> Option<usize> {
        self.answer_order.get(position).copied()
    }

    pub fn presented(&self) -> PresentedQuestion {
        PresentedQuestion {
            question_id: self.question_id,
            answer_order: self.answer_order.clone(),
            selected: self.selected.iter().copied().collect(),
        }
    }
}

/// Wire form of the visible question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PresentedQuestion {
    pub question_id: QuestionId,
    pub answer_order: Vec<usize>,
    #[serde(default)]
    pub selected: Vec<usize>,
}

/// Full counter snapshot handed to a newly joined device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SyncSnapshot {
    pub current_question_id: Option<QuestionId>,
    pub correct_count: u32,
    pub wrong_count: u32,
    pub recurrences: Vec<Recurrence>,
    pub started_at: Timestamp,
    #[serde(default)]
    pub finished: bool,
}

/// Replicated session payload
///
/// At most one question is current at a time; recurrence counters are
/// unsigned and never drop below zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    current: Option<CurrentQuestion>,
    recurrences: Recurrences,
    correct_count: u32,
    wrong_count: u32,
    started_at: Timestamp,
    finished: bool,
}

impl SessionState {
    pub fn new(recurrences: Recurrences, started_at: Timestamp) -> Self {
        Self {
            current: None,
            recurrences,
            correct_count: 0,
            wrong_count: 0,
            started_at,
            finished: false,
        }
    }

    pub fn current(&self) -> Option<&CurrentQuestion> {
        self.current.as_ref()
    }

    pub fn recurrences(&self) -> &Recurrences {
        &self.recurrences
    }

    pub fn correct_count(&self) -> u32 {
        self.correct_count
    }

    pub fn wrong_count(&self) -> u32 {
        self.wrong_count
    }

    pub fn started_at(&self) -> Timestamp {
        self.started_at
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn elapsed_seconds(&self, now: Timestamp) -> u64 {
        now.seconds_since(self.started_at)
    }
}

/// One answer as the UI should render it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerView {
    pub index: usize,
    pub text: String,
    pub selected: bool,
    /// Revealed only after the question was checked
    pub correct: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionView {
    pub question_id: QuestionId,
    pub text: String,
    pub answers: Vec<AnswerView>,
    pub checked: bool,
}

/// Read model for the presentation layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionView {
    pub question: Option<QuestionView>,
    pub correct_count: u32,
    pub wrong_count: u32,
    pub elapsed_seconds: u64,
    pub remaining: u32,
    pub finished: bool,
}

/// Session aggregate root: quiz content, settings and the replicated state
#[derive(Debug, Clone)]
pub struct QuizSession {
    quiz: Quiz,
    settings: Settings,
    state: SessionState,
}

impl QuizSession {
    /// Start a session from stored progress, or fresh when there is none
    pub fn start<R: Rng + ?Sized>(
        quiz: Quiz,
        settings: Settings,
        progress: Option<Progress>,
        now: Timestamp,
        rng: &mut R,
    ) -> Self {
        let recurrences = match &progress {
            Some(progress) => {
                let stored = Recurrences::from_list(&progress.recurrences);
                let list: Vec<Recurrence> = quiz
                    .question_ids()
                    .map(|id| Recurrence {
                        question_id: id,
                        count: stored.get(id).unwrap_or(settings.initial_recurrences),
                    })
                    .collect();
                Recurrences::from_list(&list)
            }
            None => Recurrences::fresh(quiz.question_ids(), settings.initial_recurrences),
        };

        let mut state = SessionState::new(recurrences, now);
        let mut resume = None;
        if let Some(progress) = progress {
            state.correct_count = progress.correct_count;
            state.wrong_count = progress.wrong_count;
            state.started_at = now.minus_seconds(progress.study_time_seconds);
            resume = progress.current_question_id;
        }

        let mut session = Self {
            quiz,
            settings,
            state,
        };

        match resume.filter(|id| session.state.recurrences.is_eligible(*id)) {
            Some(id) => {
                tracing::debug!("Resuming session at question {}", id);
                session.present(id, rng);
            }
            None => {
                session.next_question(rng);
            }
        }

        session
    }

    pub fn quiz(&self) -> &Quiz {
        &self.quiz
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Pick uniformly among questions whose recurrence count is above zero
    pub fn pick_question<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<QuestionId> {
        let eligible: Vec<QuestionId> = self
            .state
            .recurrences
            .eligible()
            .into_iter()
            .filter(|id| self.quiz.question(*id).is_some())
            .collect();
        eligible.choose(rng).copied()
    }

    /// Advance to a freshly picked question, or finish when none is eligible
    pub fn next_question<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<&CurrentQuestion> {
        match self.pick_question(rng) {
            Some(id) => self.present(id, rng),
            None => {
                tracing::info!("No eligible questions left, session finished");
                self.state.current = None;
                self.state.finished = true;
                None
            }
        }
    }

    fn present<R: Rng + ?Sized>(&mut self, id: QuestionId, rng: &mut R) -> Option<&CurrentQuestion> {
        let len = self.quiz.question(id)?.answers.len();
        let mut answer_order: Vec<usize> = (0..len).collect();
        answer_order.shuffle(rng);

        self.state.finished = false;
        self.state.current = Some(CurrentQuestion {
            question_id: id,
            answer_order,
            selected: BTreeSet::new(),
            checked: false,
        });
        self.state.current.as_ref()
    }

    /// Flip the selection of one answer (by definition index)
    pub fn toggle_answer(&mut self, index: usize) -> Result<(), SessionError> {
        let (current, len) = self.editable_current()?;
        if index >= len {
            return Err(SessionError::AnswerOutOfRange { index, len });
        }
        if !current.selected.remove(&index) {
            current.selected.insert(index);
        }
        Ok(())
    }

    /// Replace the whole selection
    pub fn set_selection(
        &mut self,
        indices: impl IntoIterator<Item = usize>,
    ) -> Result<(), SessionError> {
        let (current, len) = self.editable_current()?;
        let selected: BTreeSet<usize> = indices.into_iter().collect();
        if let Some(&index) = selected.iter().find(|&&i| i >= len) {
            return Err(SessionError::AnswerOutOfRange { index, len });
        }
        current.selected = selected;
        Ok(())
    }

    fn editable_current(&mut self) -> Result<(&mut CurrentQuestion, usize), SessionError> {
        let current = self
            .state
            .current
            .as_mut()
            .ok_or(SessionError::NoCurrentQuestion)?;
        if current.checked {
            return Err(SessionError::AlreadyChecked(current.question_id));
        }
        let len = self
            .quiz
            .question(current.question_id)
            .ok_or(SessionError::UnknownQuestion(current.question_id))?
            .answers
            .len();
        Ok((current, len))
    }

    /// Evaluate the current selection
    ///
    /// Returns `Ok(None)` when the question was already checked; counters are
    /// only ever touched once per question instance.
    pub fn check_answer(&mut self) -> Result<Option<Verdict>, SessionError> {
        let current = self
            .state
            .current
            .as_mut()
            .ok_or(SessionError::NoCurrentQuestion)?;
        if current.checked {
            return Ok(None);
        }

        let id = current.question_id;
        let question = self
            .quiz
            .question(id)
            .ok_or(SessionError::UnknownQuestion(id))?;

        let verdict = if question.is_correct_selection(&current.selected) {
            Verdict::Correct
        } else {
            Verdict::Wrong
        };
        current.checked = true;

        match verdict {
            Verdict::Correct => {
                self.state.correct_count = self.state.correct_count.saturating_add(1);
                self.state.recurrences.decrement(id);
            }
            Verdict::Wrong => {
                self.state.wrong_count = self.state.wrong_count.saturating_add(1);
                self.state
                    .recurrences
                    .increase(id, self.settings.wrong_answer_penalty);
            }
        }

        tracing::debug!("Checked question {}: {:?}", id, verdict);
        Ok(Some(verdict))
    }

    /// Evaluate a check that another device performed on `question_id`
    pub fn apply_remote_check(
        &mut self,
        question_id: QuestionId,
    ) -> Result<Option<Verdict>, SessionError> {
        let current = self
            .state
            .current
            .as_ref()
            .ok_or(SessionError::NoCurrentQuestion)?;
        if current.question_id != question_id {
            return Err(SessionError::QuestionMismatch {
                expected: current.question_id,
                received: question_id,
            });
        }
        self.check_answer()
    }

    /// Replace the current question and selection; `None` means finished
    ///
    /// A replaced question is always unchecked.
    pub fn apply_question_update(
        &mut self,
        question: Option<PresentedQuestion>,
    ) -> Result<(), SessionError> {
        let Some(presented) = question else {
            self.state.current = None;
            self.state.finished = true;
            return Ok(());
        };

        let id = presented.question_id;
        let len = self
            .quiz
            .question(id)
            .ok_or(SessionError::UnknownQuestion(id))?
            .answers
            .len();

        let mut sorted = presented.answer_order.clone();
        sorted.sort_unstable();
        if sorted != (0..len).collect::<Vec<_>>() {
            return Err(SessionError::InvalidAnswerOrder(id));
        }
        if let Some(&index) = presented.selected.iter().find(|&&i| i >= len) {
            return Err(SessionError::AnswerOutOfRange { index, len });
        }

        self.state.finished = false;
        self.state.current = Some(CurrentQuestion {
            question_id: id,
            answer_order: presented.answer_order,
            selected: presented.selected.into_iter().collect(),
            checked: false,
        });
        Ok(())
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        SyncSnapshot {
            current_question_id: self.state.current.as_ref().map(|c| c.question_id),
            correct_count: self.state.correct_count,
            wrong_count: self.state.wrong_count,
            recurrences: self.state.recurrences.to_list(),
            started_at: self.state.started_at,
            finished: self.state.finished,
        }
    }

    /// Replace counters, recurrences and the start anchor in one step
    ///
    /// A locally held question that differs from the sender's is dropped until
    /// the following question update arrives.
    pub fn apply_snapshot(&mut self, snapshot: SyncSnapshot) {
        self.state.recurrences = Recurrences::from_list(&snapshot.recurrences);
        self.state.correct_count = snapshot.correct_count;
        self.state.wrong_count = snapshot.wrong_count;
        self.state.started_at = snapshot.started_at;
        self.state.finished = snapshot.finished;

        let local = self.state.current.as_ref().map(|c| c.question_id);
        if local != snapshot.current_question_id {
            self.state.current = None;
        }
    }

    pub fn presented(&self) -> Option<PresentedQuestion> {
        self.state.current.as_ref().map(CurrentQuestion::presented)
    }

    /// Supersede the state with fresh progress
    pub fn reset<R: Rng + ?Sized>(&mut self, now: Timestamp, rng: &mut R) {
        let recurrences =
            Recurrences::fresh(self.quiz.question_ids(), self.settings.initial_recurrences);
        self.state = SessionState::new(recurrences, now);
        self.next_question(rng);
    }

    pub fn to_progress(&self, now: Timestamp) -> Progress {
        Progress {
            current_question_id: self.state.current.as_ref().map(|c| c.question_id),
            correct_count: self.state.correct_count,
            wrong_count: self.state.wrong_count,
            study_time_seconds: self.state.elapsed_seconds(now),
            recurrences: self.state.recurrences.to_list(),
        }
    }

    pub fn view(&self, now: Timestamp) -> SessionView {
        let question = self.state.current.as_ref().and_then(|current| {
            let question = self.quiz.question(current.question_id)?;
            let answers = current
                .answer_order
                .iter()
                .filter_map(|&index| {
                    question.answers.get(index).map(|answer| AnswerView {
                        index,
                        text: answer.text.clone(),
                        selected: current.selected.contains(&index),
                        correct: current.checked.then_some(answer.correct),
                    })
                })
                .collect();
            Some(QuestionView {
                question_id: current.question_id,
                text: question.text.clone(),
                answers,
                checked: current.checked,
            })
        });

        SessionView {
            question,
            correct_count: self.state.correct_count,
            wrong_count: self.state.wrong_count,
            elapsed_seconds: self.state.elapsed_seconds(now),
            remaining: self.state.recurrences.remaining(),
            finished: self.state.finished,
        }
    }
}
