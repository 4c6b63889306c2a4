pub mod error;
pub mod files;
pub mod observability;

pub use error::{CliError, Result};
pub use files::{FileProgressStore, FileQuizProvider};
pub use observability::LogConfig;
