//! States Sandbox - client core for an LLM-driven nation simulation
//!
//! Turn streaming protocol, metric resolution over snapshot documents, and
//! leaderboard ranking.

pub mod api;
pub mod core;
pub mod metrics;
pub mod snapshot;
pub mod turn;
