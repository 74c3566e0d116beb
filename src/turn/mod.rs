//! Turn and nation-creation streaming protocol

pub mod client;
pub mod decoder;
pub mod event;
pub mod handler;
pub mod progress;
pub mod request;

pub use client::{CancelHandle, ChunkSource, PendingTurn, StreamEnd, TurnOutcome, TurnPhase, TurnStreamClient, TurnTransport};
pub use decoder::{decode_all, EventDecoder, LineBuffer};
pub use event::{ErrorCategory, ErrorEvent, TurnEvent};
pub use handler::{Redirect, SeriesUpdater, TurnHandler};
pub use progress::TurnProgress;
pub use request::{QuestionAnswer, Rating, TurnRequest, POLICY_QUESTIONS};
