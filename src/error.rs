use indicatif::style::TemplateError;
use thiserror::Error;

pub type CoingymResult<T> = Result<T, CoingymError>;

#[derive(Debug, Error)]
pub enum CoingymError {
    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Env(#[from] EnvError),

    #[error(transparent)]
    Io(#[from] IoError),
}

/// Errors occurring within agent logic, the replay buffer or the Q-network.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Invalid input to agent: {0}")]
    InvalidInput(String),

    #[error("Replay buffer holds {have} experiences but a batch of {needed} was requested")]
    InsufficientExperiences { needed: usize, have: usize },

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),
}

/// Errors related to dataset loading, validation and domain checks.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("Missing column '{0}' in market data")]
    MissingColumn(String),

    #[error("Data frame error: {0}")]
    DataFrame(String),

    #[error("Market data is not in chronological order: {0}")]
    NotChronological(String),

    #[error("Non-finite value in column '{col}' at row {row}")]
    NonFinite { col: String, row: usize },

    #[error("Market data has {0} rows, need at least 2")]
    InsufficientRows(usize),
}

/// Errors related to the gym environment configuration and execution loop.
#[derive(Debug, Error)]
pub enum EnvError {
    #[error("step() called on a terminal environment; call reset() first")]
    SteppedPastTerminal,

    #[error("Invalid environment state: {0}")]
    InvalidState(String),

    #[error("Invalid environment configuration: {0}")]
    InvalidConfig(String),

    #[error("Progress bar error")]
    ProgressBar(#[from] TemplateError),
}

/// Errors related to file I/O and serialization of run artifacts.
#[derive(Debug, Error)]
pub enum IoError {
    #[error("IO operation failed")]
    Io(#[from] std::io::Error),

    #[error("Serialization failed")]
    Json(#[from] serde_json::Error),

    #[error("File system error: {0}")]
    FileSystem(String),

    #[error("Failed to write data: {0}")]
    WriteFailed(String),

    #[error("Failed to read data: {0}")]
    ReadFailed(String),
}
