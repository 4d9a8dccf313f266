use thiserror::Error;

pub type Result<T> = std::result::Result<T, DispatchError>;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("HTTP request failed: {0}")]
    HttpClient(#[from] reqwest::Error),
    #[error("Downstream rejected transaction with status {status}: {body}")]
    DownstreamRejected { status: u16, body: String },
    #[error("Channel error: {0}")]
    ChannelError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Batch not found: {0}")]
    BatchNotFound(String),
    #[error("Batch {0} is still being processed")]
    BatchInFlight(String),
    #[error("Batch {0} aborted: {1}")]
    BatchAborted(String, String),
    #[error("Batch {0} already has a stored result")]
    AlreadySaved(String),
    #[error("Batch {0} was never claimed")]
    NotClaimed(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
}
