use crate::domain::QuestionId;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Remaining repetitions for one question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Recurrence {
    pub question_id: QuestionId,
    pub count: u32,
}

impl Recurrence {
    pub fn new(question_id: impl Into<QuestionId>, count: u32) -> Self {
        Self {
            question_id: question_id.into(),
            count,
        }
    }
}

/// Persisted session progress, as exchanged with the progress store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Progress {
    #[serde(default)]
    pub current_question_id: Option<QuestionId>,
    #[serde(default)]
    pub correct_count: u32,
    #[serde(default)]
    pub wrong_count: u32,
    #[serde(default)]
    pub study_time_seconds: u64,
    #[serde(default)]
    pub recurrences: Vec<Recurrence>,
}

/// Recurrence counters ordered by question id
///
/// Counts are unsigned, so a counter can never go negative; decrements floor
/// at zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recurrences(BTreeMap<QuestionId, u32>);

impl Recurrences {
    /// Every question starts with the same count
    pub fn fresh(ids: impl IntoIterator<Item = QuestionId>, initial: u32) -> Self {
        Self(ids.into_iter().map(|id| (id, initial)).collect())
    }

    pub fn from_list(list: &[Recurrence]) -> Self {
        Self(list.iter().map(|r| (r.question_id, r.count)).collect())
    }

    pub fn to_list(&self) -> Vec<Recurrence> {
        self.0
            .iter()
            .map(|(&question_id, &count)| Recurrence { question_id, count })
            .collect()
    }

    pub fn get(&self, id: QuestionId) -> Option<u32> {
        self.0.get(&id).copied()
    }

    pub fn contains(&self, id: QuestionId) -> bool {
        self.0.contains_key(&id)
    }

    pub fn is_eligible(&self, id: QuestionId) -> bool {
        self.get(id).is_some_and(|count| count > 0)
    }

    /// Question ids with a count above zero, in id order
    pub fn eligible(&self) -> Vec<QuestionId> {
        self.0
            .iter()
            .filter(|(_, &count)| count > 0)
            .map(|(&id, _)| id)
            .collect()
    }

    pub fn decrement(&mut self, id: QuestionId) {
        if let Some(count) = self.0.get_mut(&id) {
            *count = count.saturating_sub(1);
        }
    }

    pub fn increase(&mut self, id: QuestionId, by: u32) {
        let count = self.0.entry(id).or_insert(0);
        *count = count.saturating_add(by);
    }

    pub fn remaining(&self) -> u32 {
        self.0.values().fold(0u32, |acc, c| acc.saturating_add(*c))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decrement_floors_at_zero() {
        let mut recurrences = Recurrences::fresh([QuestionId(1)], 1);
        recurrences.decrement(QuestionId(1));
        recurrences.decrement(QuestionId(1));
        assert_eq!(recurrences.get(QuestionId(1)), Some(0));
    }

    #[test]
    fn test_eligible_excludes_mastered() {
        let recurrences = Recurrences::from_list(&[
            Recurrence::new(3, 2),
            Recurrence::new(1, 0),
            Recurrence::new(2, 1),
        ]);
        assert_eq!(recurrences.eligible(), vec![QuestionId(2), QuestionId(3)]);
        assert_eq!(recurrences.remaining(), 3);
    }

    #[test]
    fn test_list_is_ordered_by_id() {
        let recurrences = Recurrences::from_list(&[Recurrence::new(9, 1), Recurrence::new(4, 2)]);
        let ids: Vec<_> = recurrences.to_list().iter().map(|r| r.question_id).collect();
        assert_eq!(ids, vec![QuestionId(4), QuestionId(9)]);
    }

    #[test]
    fn test_increase_applies_penalty() {
        let mut recurrences = Recurrences::fresh([QuestionId(1)], 0);
        recurrences.increase(QuestionId(1), 3);
        assert!(recurrences.is_eligible(QuestionId(1)));
        assert_eq!(recurrences.get(QuestionId(1)), Some(3));
    }

    #[test]
    fn test_progress_defaults_from_sparse_json() {
        let progress: Progress = serde_json::from_str(r#"{"correct_count":4}"#).unwrap();
        assert_eq!(progress.correct_count, 4);
        assert!(progress.current_question_id.is_none());
        assert!(progress.recurrences.is_empty());
    }
}
