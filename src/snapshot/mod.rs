//! Snapshots, per-nation histories, and leaderboard ranking

pub mod document;
pub mod nation;
pub mod ranking;
pub mod series;

pub use document::{Snapshot, SnapshotDate, SnapshotRecord};
pub use nation::{Nation, NationRecord};
pub use ranking::{owned_by, rank_by, Rankable, Ranked, RankingEngine, RankingWindow};
pub use series::{percent_change_between, percent_change_of, SnapshotSeries};
