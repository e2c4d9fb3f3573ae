use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),
}

/// Failure reported by a signaling transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("signaling channel is not open")]
    NotOpen,

    #[error("{operation} rejected: {reason}")]
    Rejected {
        operation: &'static str,
        reason: String,
    },
}

impl TransportError {
    pub fn rejected(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::Rejected {
            operation,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// A required field was missing or an entity was malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    /// An inbound resource was refused by local policy.
    #[error("rejected by policy: {0}")]
    PolicyRejection(String),

    /// The owning session is gone.
    #[error("session closed")]
    Closed,
}

impl SessionError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TetherError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl From<TransportError> for TetherError {
    fn from(err: TransportError) -> Self {
        Self::Session(SessionError::Transport(err))
    }
}
