//! Error taxonomy for session building, storage and feedback

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RankError {
    /// The page could not be loaded. Fatal to the whole session build.
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    /// The exploration policy was asked to sample from nothing.
    #[error("no candidates to sample from")]
    EmptyCandidatePool,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("action must be like|skip|block, got '{0}'")]
    InvalidFeedbackAction(String),

    #[error(transparent)]
    Storage(#[from] rusqlite::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("store lock poisoned")]
    Lock,
}

impl From<envy::Error> for RankError {
    fn from(e: envy::Error) -> Self {
        RankError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RankError>;
