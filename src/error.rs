use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum BridgeError {
    #[error("Invalid port {0}: must be between 1024 and 65535")]
    InvalidPort(u16),

    #[error("Invalid update interval {0}s: must be between 1 and 3600 seconds")]
    InvalidUpdateInterval(u64),

    #[error("Failed to bind UDP listener on port {port}: {source}")]
    BindFailed {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
