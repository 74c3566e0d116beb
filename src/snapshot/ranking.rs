//! Leaderboard ranking of nations by one metric

use crate::core::error::Result;
use crate::core::types::UserId;
use crate::metrics::registry::{MetricDefinition, MetricRegistry};
use crate::metrics::value::MetricValue;
use crate::snapshot::document::Snapshot;
use crate::snapshot::nation::Nation;
use std::cmp::Ordering;

/// Anything with a latest snapshot can be ranked
pub trait Rankable {
    fn latest_snapshot(&self) -> Option<&Snapshot>;
}

impl Rankable for Nation {
    fn latest_snapshot(&self) -> Option<&Snapshot> {
        self.series.latest()
    }
}

/// One row of a ranking
#[derive(Debug, Clone)]
pub struct Ranked<'a, E> {
    pub entity: &'a E,
    /// 1-based position after sorting
    pub rank: usize,
    pub value: MetricValue,
}

pub struct RankingEngine<'r> {
    registry: &'r MetricRegistry,
}

impl<'r> RankingEngine<'r> {
    pub fn new(registry: &'r MetricRegistry) -> Self {
        Self { registry }
    }

    /// Rank `entities` by metric `metric_id`
    ///
    /// Missing or invalid values count as 0. Ties keep input order and get
    /// consecutive ranks.
    pub fn rank<'a, E: Rankable>(&self, entities: &'a [E], metric_id: &str) -> Result<Vec<Ranked<'a, E>>> {
        let metric = self.registry.definition(metric_id)?;
        Ok(rank_by(entities, metric))
    }
}

/// Rank against an already looked-up definition
pub fn rank_by<'a, E: Rankable>(entities: &'a [E], metric: &MetricDefinition) -> Vec<Ranked<'a, E>> {
    let mut rows: Vec<(&'a E, MetricValue)> = entities
        .iter()
        .map(|e| {
            let value = match e.latest_snapshot() {
                Some(snapshot) => metric.resolve(&snapshot.document),
                None => MetricValue::empty(metric.name),
            };
            (e, value)
        })
        .collect();

    let sign = metric.order.sign();
    rows.sort_by(|(_, a), (_, b)| {
        let diff = (b.sort_value() - a.sort_value()) * sign;
        diff.partial_cmp(&0.0).unwrap_or(Ordering::Equal)
    });

    rows.into_iter()
        .enumerate()
        .map(|(i, (entity, value))| Ranked {
            entity,
            rank: i + 1,
            value,
        })
        .collect()
}

/// Rows belonging to `owner`, keeping their global rank
pub fn owned_by<'r, 'a>(ranked: &'r [Ranked<'a, Nation>], owner: UserId) -> Vec<&'r Ranked<'a, Nation>> {
    ranked.iter().filter(|r| r.entity.owner_id == owner).collect()
}

/// Top and bottom of a ranking with the middle elided
#[derive(Debug)]
pub struct RankingWindow<'r, T> {
    pub top: &'r [T],
    /// Rows hidden between `top` and `bottom`
    pub elided: usize,
    pub bottom: &'r [T],
}

impl<'r, T> RankingWindow<'r, T> {
    /// Keep `edge` rows at each end; rows are never shown twice
    pub fn new(ranked: &'r [T], edge: usize) -> Self {
        let len = ranked.len();
        let top_end = edge.min(len);
        let bottom_start = len.saturating_sub(edge).max(top_end);
        Self {
            top: &ranked[..top_end],
            elided: bottom_start - top_end,
            bottom: &ranked[bottom_start..],
        }
    }

    pub fn has_gap(&self) -> bool {
        self.elided > 0
    }
}
