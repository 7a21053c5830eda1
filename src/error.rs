use thiserror::Error;

/// Errors surfaced by the coaching pipeline and its collaborators.
#[derive(Error, Debug)]
pub enum CoachError {
    /// The camera / pose source could not be acquired. Fatal to the run.
    #[error("pose source unavailable: {0}")]
    SourceUnavailable(String),

    /// The pose source failed after the run started.
    #[error("pose source failed: {0}")]
    Source(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("replay frame {line}: {message}")]
    Replay { line: usize, message: String },

    #[error("backend request failed: {0}")]
    Backend(String),

    #[error("backend timed out after {timeout_ms}ms")]
    BackendTimeout { timeout_ms: u64 },
}

pub type Result<T> = std::result::Result<T, CoachError>;
