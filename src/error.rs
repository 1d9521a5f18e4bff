//! Error types for the bot

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BotError>;

#[derive(Error, Debug)]
pub enum BotError {
    /// No or insufficient draw history this cycle; skip and retry next tick.
    #[error("draw history unavailable: {0}")]
    DataUnavailable(String),

    /// A draw id that does not parse as prefix + numeric suffix.
    #[error("malformed draw id: {0}")]
    MalformedId(String),

    /// A store read or write failed; the cycle's remaining writes are aborted.
    #[error("persistence failure: {0}")]
    Persistence(String),

    /// The external wager executor failed or was unreachable.
    #[error("wager execution failed: {0}")]
    WagerExecution(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for BotError {
    fn from(e: std::io::Error) -> Self {
        BotError::Persistence(e.to_string())
    }
}

impl From<serde_json::Error> for BotError {
    fn from(e: serde_json::Error) -> Self {
        BotError::Persistence(e.to_string())
    }
}
