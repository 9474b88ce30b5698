//! Error types for schedule synthesis and publishing.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScheduleError {
    /// A collaborator could not be reached or rejected our credentials.
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// A timestamp or upstream payload was malformed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A required configuration key is missing or has an invalid value.
    #[error("Config error: {0}")]
    Config(String),

    /// The controller update failed or returned a non-success status.
    #[error("Publish error: {0}")]
    Publish(String),

    /// The persisted publish state could not be read or written.
    #[error("State file error: {0}")]
    State(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ScheduleError>;
