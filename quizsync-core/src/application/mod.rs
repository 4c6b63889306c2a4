mod bootstrap;
mod provider;

pub use bootstrap::{bootstrap, Bootstrap};
pub use provider::{
    InMemoryProgressStore, InMemoryQuizProvider, ProgressStore, ProviderError, QuizProvider,
};
