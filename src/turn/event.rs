//! Lifecycle events of a streamed turn or creation request
//!
//! One JSON object per line, discriminated by `type`.

use crate::core::types::StateId;
use crate::snapshot::document::Snapshot;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    /// Human-readable progress message
    Status {
        #[serde(default)]
        message: String,
    },
    /// Creation flow only: id of the nation being founded
    StateCreated { id: StateId },
    /// The snapshot produced by this turn
    StateSnapshotComplete {
        #[serde(alias = "snapshot")]
        state_snapshot: Snapshot,
    },
    Error(ErrorEvent),
    /// Terminal success marker
    Complete {},
    /// Keep-alive while the simulation runs
    Heartbeat {},
    #[serde(other)]
    Unknown,
}

impl TurnEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            TurnEvent::Status { .. } => "status",
            TurnEvent::StateCreated { .. } => "state_created",
            TurnEvent::StateSnapshotComplete { .. } => "state_snapshot_complete",
            TurnEvent::Error(_) => "error",
            TurnEvent::Complete {} => "complete",
            TurnEvent::Heartbeat {} => "heartbeat",
            TurnEvent::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ErrorEvent {
    pub message: String,
    /// Explicit category; older servers omit it
    #[serde(default)]
    pub category: Option<ErrorCategory>,
}

impl ErrorEvent {
    pub fn new(message: impl Into<String>, category: Option<ErrorCategory>) -> Self {
        Self {
            message: message.into(),
            category,
        }
    }

    /// The explicit category, or one inferred from the message when absent
    pub fn effective_category(&self) -> ErrorCategory {
        match self.category {
            Some(category) => category,
            None if self.message.to_lowercase().contains("credits") => ErrorCategory::InsufficientCredits,
            None => ErrorCategory::Simulation,
        }
    }

    pub fn is_credits_exhausted(&self) -> bool {
        self.effective_category() == ErrorCategory::InsufficientCredits
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    #[serde(alias = "credits")]
    InsufficientCredits,
    Simulation,
    #[serde(other)]
    Other,
}
