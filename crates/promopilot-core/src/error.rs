//! Error types shared across PromoPilot crates.

use thiserror::Error;

/// Top-level error for the automation core.
#[derive(Debug, Error)]
pub enum PromoPilotError {
    #[error("config error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("scheduler error: {0}")]
    Scheduler(String),

    #[error("no executor registered for task kind '{0}'")]
    UnknownTaskKind(String),

    #[error("automation rule not found: {0}")]
    RuleNotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PromoPilotError>;
