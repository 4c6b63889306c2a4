//! JSON-file collaborators for the command line device.
//!
//! Layout of a quiz directory:
//!
//! ```text
//! quizzes/
//!   settings.json        user settings (optional)
//!   <session>.json       one quiz per session id
//! ```
//!
//! Progress is kept next to it as `<session>.local.json` and
//! `<session>.shared.json`.

use quizsync_core::{Progress, ProgressStore, ProviderError, Quiz, QuizProvider, SessionId, Settings};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, ProviderError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(ProviderError::Unavailable(format!(
                "{}: {}",
                path.display(),
                e
            )))
        }
    };
    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|e| ProviderError::Corrupt(format!("{}: {}", path.display(), e)))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ProviderError> {
    let contents = serde_json::to_string_pretty(value)
        .map_err(|e| ProviderError::Corrupt(e.to_string()))?;
    std::fs::write(path, contents)
        .map_err(|e| ProviderError::Unavailable(format!("{}: {}", path.display(), e)))
}

/// Quiz content read from a directory of JSON files
#[derive(Debug, Clone)]
pub struct FileQuizProvider {
    dir: PathBuf,
    settings: Option<Settings>,
}

impl FileQuizProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            settings: None,
        }
    }

    /// Use these settings instead of `settings.json`
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = Some(settings);
        self
    }

    fn quiz_path(&self, session: &SessionId) -> PathBuf {
        self.dir.join(format!("{}.json", session.as_str()))
    }
}

impl QuizProvider for FileQuizProvider {
    fn fetch_quiz(&self, session: &SessionId) -> Result<Quiz, ProviderError> {
        read_json(&self.quiz_path(session))?.ok_or_else(|| ProviderError::NotFound(session.clone()))
    }

    fn fetch_user_settings(&self) -> Result<Settings, ProviderError> {
        if let Some(settings) = self.settings {
            return Ok(settings);
        }
        read_json(&self.dir.join("settings.json"))?
            .ok_or_else(|| ProviderError::Unavailable("no settings.json".to_string()))
    }
}

/// Progress persisted as JSON files, one local and one shared copy per session
#[derive(Debug, Clone)]
pub struct FileProgressStore {
    dir: PathBuf,
}

impl FileProgressStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, session: &SessionId, sync: bool) -> PathBuf {
        let copy = if sync { "shared" } else { "local" };
        self.dir.join(format!("{}.{}.json", session.as_str(), copy))
    }
}

impl ProgressStore for FileProgressStore {
    fn load_progress(
        &self,
        session: &SessionId,
        sync: bool,
    ) -> Result<Option<Progress>, ProviderError> {
        read_json(&self.path(session, sync))
    }

    fn save_progress(
        &mut self,
        session: &SessionId,
        progress: &Progress,
    ) -> Result<(), ProviderError> {
        write_json(&self.path(session, false), progress)?;
        write_json(&self.path(session, true), progress)?;
        tracing::trace!("💾 Saved progress for {}", session);
        Ok(())
    }

    fn reset_progress(&mut self, session: &SessionId) -> Result<(), ProviderError> {
        for sync in [false, true] {
            match std::fs::remove_file(self.path(session, sync)) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(ProviderError::Unavailable(e.to_string())),
            }
        }
        tracing::info!("🗑️ Progress for {} reset", session);
        Ok(())
    }
}
