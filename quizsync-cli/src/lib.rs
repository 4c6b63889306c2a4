pub mod application;
pub mod infrastructure;

pub use application::{execute, Flow, UserCommand};
pub use infrastructure::{CliError, FileProgressStore, FileQuizProvider, LogConfig, Result};
