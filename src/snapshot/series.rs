//! A nation's snapshot history

use crate::core::error::Result;
use crate::metrics::format::format_percent_change;
use crate::metrics::path::resolve;
use crate::metrics::registry::{MetricDefinition, MetricKind, MetricRegistry};
use crate::snapshot::document::{Snapshot, SnapshotDate};

/// Snapshots of one nation, newest first
///
/// Entries are never edited. A completed turn prepends; a refetch replaces
/// the whole list.
#[derive(Debug, Clone, Default)]
pub struct SnapshotSeries {
    snapshots: Vec<Snapshot>,
}

impl SnapshotSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a list already ordered newest first (the API's order)
    pub fn from_newest_first(snapshots: Vec<Snapshot>) -> Self {
        Self { snapshots }
    }

    /// Build from any order; the newest date ends up first
    pub fn from_unordered(mut snapshots: Vec<Snapshot>) -> Self {
        snapshots.sort_by(|a, b| b.date.cmp(&a.date));
        Self { snapshots }
    }

    /// Add the snapshot produced by a completed turn
    pub fn prepend(&mut self, snapshot: Snapshot) {
        self.snapshots.insert(0, snapshot);
    }

    /// Swap in a freshly fetched history
    pub fn replace(&mut self, snapshots: Vec<Snapshot>) {
        self.snapshots = snapshots;
    }

    pub fn latest(&self) -> Option<&Snapshot> {
        self.snapshots.first()
    }

    pub fn previous(&self) -> Option<&Snapshot> {
        self.snapshots.get(1)
    }

    /// Newest first
    pub fn iter(&self) -> impl Iterator<Item = &Snapshot> {
        self.snapshots.iter()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Oldest first; same-date snapshots keep their relative order
    pub fn history(&self) -> Vec<&Snapshot> {
        let mut ordered: Vec<&Snapshot> = self.snapshots.iter().collect();
        ordered.sort_by(|a, b| a.date.cmp(&b.date));
        ordered
    }

    /// Change of a registered metric from the previous to the latest snapshot
    pub fn percent_change(&self, metric_id: &str) -> Result<String> {
        let metric = MetricRegistry::global().definition(metric_id)?;
        Ok(percent_change_of(self.previous(), self.latest(), metric))
    }

    /// Change of the metric at `path` from the previous to the latest snapshot
    pub fn percent_change_at(&self, path: &str) -> String {
        percent_change_between(self.previous(), self.latest(), path)
    }

    /// `(date, value)` points, oldest first, for a line chart
    pub fn chart_points(&self, metric_id: &str) -> Result<Vec<(SnapshotDate, f64)>> {
        let metric = MetricRegistry::global().definition(metric_id)?;
        Ok(self
            .history()
            .into_iter()
            .map(|s| (s.date, metric.resolve(&s.document).sort_value()))
            .collect())
    }
}

/// Signed percent change of the metric at `path` going from `from` to `to`
///
/// `"0%"` if either snapshot is missing, either value cannot be resolved,
/// or the base value is zero.
pub fn percent_change_between(from: Option<&Snapshot>, to: Option<&Snapshot>, path: &str) -> String {
    let (Some(from), Some(to)) = (from, to) else {
        return "0%".into();
    };
    match (resolve(&from.document, path), resolve(&to.document, path)) {
        (Ok(base), Ok(current)) => format_percent_change(base.value, current.value),
        _ => "0%".into(),
    }
}

/// Same as [`percent_change_between`] for a metric definition
///
/// Derived metrics compare their computed values (a failed guard counts as 0).
pub fn percent_change_of(from: Option<&Snapshot>, to: Option<&Snapshot>, metric: &MetricDefinition) -> String {
    match &metric.kind {
        MetricKind::Direct { path } => percent_change_between(from, to, path),
        MetricKind::Derived(derivation) => {
            let (Some(from), Some(to)) = (from, to) else {
                return "0%".into();
            };
            let base = derivation.evaluate(&from.document, metric.name);
            let current = derivation.evaluate(&to.document, metric.name);
            format_percent_change(base.value, current.value)
        }
    }
}
