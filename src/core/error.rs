use thiserror::Error;

#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("Unknown metric: {0}")]
    UnknownMetric(String),

    #[error("A turn is already in flight for {0}")]
    TurnInProgress(crate::core::types::TurnTarget),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}

impl SandboxError {
    /// Auth failures invalidate the stored credential instead of being retried
    pub fn is_auth(&self) -> bool {
        matches!(self, SandboxError::Auth(_))
    }
}

pub type Result<T> = std::result::Result<T, SandboxError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{StateId, TurnTarget};

    #[test]
    fn test_auth_is_distinguishable() {
        assert!(SandboxError::Auth("Invalid token".into()).is_auth());
        assert!(!SandboxError::Transport("reset".into()).is_auth());
        assert!(!SandboxError::Api { status: 500, message: "boom".into() }.is_auth());
    }

    #[test]
    fn test_turn_in_progress_message() {
        let err = SandboxError::TurnInProgress(TurnTarget::Nation(StateId(7)));
        assert_eq!(err.to_string(), "A turn is already in flight for state 7");
    }
}
