use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Per-user study settings
///
/// `Settings::default()` is the degraded configuration used when the settings
/// service is unreachable: synchronization off, one repetition per question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Settings {
    /// Whether this user's devices replicate the session between each other
    pub sync_enabled: bool,

    /// Recurrence count assigned to every question of a fresh session
    pub initial_recurrences: u32,

    /// Amount added to a question's recurrence count after a wrong answer
    pub wrong_answer_penalty: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sync_enabled: false,
            initial_recurrences: 1,
            wrong_answer_penalty: 1,
        }
    }
}

impl Settings {
    pub fn with_sync(mut self, enabled: bool) -> Self {
        self.sync_enabled = enabled;
        self
    }

    pub fn with_initial_recurrences(mut self, count: u32) -> Self {
        self.initial_recurrences = count;
        self
    }

    pub fn with_wrong_answer_penalty(mut self, penalty: u32) -> Self {
        self.wrong_answer_penalty = penalty;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_degraded() {
        let settings = Settings::default();
        assert!(!settings.sync_enabled);
        assert_eq!(settings.initial_recurrences, 1);
        assert_eq!(settings.wrong_answer_penalty, 1);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"sync_enabled":true}"#).unwrap();
        assert!(settings.sync_enabled);
        assert_eq!(settings.wrong_answer_penalty, 1);
    }
}
