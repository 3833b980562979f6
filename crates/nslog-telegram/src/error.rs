/// Failure of a single remote call
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("{0}")]
    Other(String),
}

/// Failure of a dispatch job as seen by its submitter
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("invalid dispatcher configuration: {0}")]
    Config(String),

    #[error("dispatch queue is full")]
    QueueFull,

    #[error("dispatcher is closed")]
    Closed,

    #[error("chunk {chunk_index} failed: {message}")]
    Delivery { chunk_index: usize, message: String },
}
