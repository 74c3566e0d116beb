//! Consumers of turn events

use crate::core::config::ClientConfig;
use crate::snapshot::series::SnapshotSeries;
use crate::turn::event::TurnEvent;
use std::time::Duration;

/// Receives every decoded frame, in order, one at a time
pub trait TurnHandler {
    fn on_event(&mut self, event: &TurnEvent);
}

impl<F> TurnHandler for F
where
    F: FnMut(&TurnEvent),
{
    fn on_event(&mut self, event: &TurnEvent) {
        self(event)
    }
}

/// Where to send the user once credits run out, and after how long
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub target: String,
    pub delay: Duration,
}

/// Applies a turn's events to a nation's history
///
/// The produced snapshot is prepended exactly once; a repeated
/// `state_snapshot_complete` in the same stream is ignored.
#[derive(Debug)]
pub struct SeriesUpdater<'a> {
    series: &'a mut SnapshotSeries,
    redirect_target: String,
    redirect_delay: Duration,
    prepended: bool,
    pub last_status: Option<String>,
    /// Delta report of the new snapshot
    pub report: Option<String>,
    /// Error messages worth showing the user
    pub notices: Vec<String>,
    pub redirect: Option<Redirect>,
}

impl<'a> SeriesUpdater<'a> {
    pub fn new(series: &'a mut SnapshotSeries, config: &ClientConfig) -> Self {
        Self {
            series,
            redirect_target: config.credits_redirect.clone(),
            redirect_delay: config.redirect_delay(),
            prepended: false,
            last_status: None,
            report: None,
            notices: Vec::new(),
            redirect: None,
        }
    }

    /// Whether this turn's snapshot has been added
    pub fn prepended(&self) -> bool {
        self.prepended
    }
}

impl TurnHandler for SeriesUpdater<'_> {
    fn on_event(&mut self, event: &TurnEvent) {
        match event {
            TurnEvent::Status { message } => self.last_status = Some(message.clone()),
            TurnEvent::StateSnapshotComplete { state_snapshot } => {
                if self.prepended {
                    tracing::warn!("Ignoring repeated snapshot for {}", state_snapshot.date);
                    return;
                }
                self.report = state_snapshot.report().map(str::to_string);
                self.series.prepend(state_snapshot.clone());
                self.prepended = true;
            }
            TurnEvent::Error(error) => {
                self.notices.push(error.message.clone());
                if error.is_credits_exhausted() && self.redirect.is_none() {
                    tracing::info!("Credits exhausted, redirecting to {}", self.redirect_target);
                    self.redirect = Some(Redirect {
                        target: self.redirect_target.clone(),
                        delay: self.redirect_delay,
                    });
                }
            }
            TurnEvent::StateCreated { .. } | TurnEvent::Complete {} | TurnEvent::Heartbeat {} | TurnEvent::Unknown => {}
        }
    }
}
