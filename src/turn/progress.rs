//! Elapsed-time indicator for a running turn

use std::time::{Duration, Instant};

/// Informational only; a slow turn is never cancelled
#[derive(Debug, Clone, Copy)]
pub struct TurnProgress {
    started: Instant,
    expected: Duration,
}

impl TurnProgress {
    pub fn start(expected: Duration) -> Self {
        Self::started_at(Instant::now(), expected)
    }

    pub fn started_at(started: Instant, expected: Duration) -> Self {
        Self { started, expected }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Share of the expected duration used so far, capped at 1.0
    pub fn fraction(&self) -> f32 {
        fraction_of(self.elapsed(), self.expected)
    }

    /// `m:ss`
    pub fn format_elapsed(&self) -> String {
        format_clock(self.elapsed())
    }
}

pub fn fraction_of(elapsed: Duration, expected: Duration) -> f32 {
    if expected.is_zero() {
        return 1.0;
    }
    (elapsed.as_secs_f32() / expected.as_secs_f32()).min(1.0)
}

pub fn format_clock(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{}:{:02}", secs / 60, secs % 60)
}
