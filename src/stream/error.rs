use thiserror::Error;
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("sample rate must be a positive, finite number of hertz")]
    InvalidSampleRate,
    #[error("channel count mismatch: expected {expected}, got {actual}")]
    ChannelMismatch { expected: usize, actual: usize },
    #[error("channel {index} out of range for a {channels}-channel stream")]
    InvalidChannel { index: usize, channels: usize },
    #[error("unsupported filter kind `{0}`")]
    UnsupportedFilter(String),
    #[error("invalid filter parameters: {0}")]
    InvalidFilter(String),
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),
    #[error("a recording session is already active (`{0}`)")]
    AlreadyRecording(String),
    #[error("recorder has no open session")]
    NoSession,
    #[error("recorder session mismatch: open `{open}`, asked to finalize `{requested}`")]
    SessionMismatch { open: String, requested: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0} thread panicked")]
    WorkerPanicked(&'static str),
}
