//! Nations (called "states" on the wire) and their snapshot histories

use crate::core::types::{StateId, UserId};
use crate::snapshot::document::{Snapshot, SnapshotRecord};
use crate::snapshot::series::SnapshotSeries;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Nation as the API sends it
#[derive(Debug, Clone, Deserialize)]
pub struct NationRecord {
    pub id: StateId,
    pub name: String,
    pub user_id: UserId,
    #[serde(default)]
    pub flag_svg: Option<String>,
    #[serde(default)]
    pub latest_snapshot: Option<SnapshotRecord>,
    /// Everything else the server attaches (timestamps, cache markers, ...)
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

/// A simulated nation and the snapshots loaded for it
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "NationRecord")]
pub struct Nation {
    pub id: StateId,
    pub name: String,
    pub owner_id: UserId,
    /// SVG source of the flag
    pub flag: Option<String>,
    pub metadata: Map<String, Value>,
    pub series: SnapshotSeries,
}

impl Nation {
    pub fn new(id: StateId, name: impl Into<String>, owner_id: UserId) -> Self {
        Self {
            id,
            name: name.into(),
            owner_id,
            flag: None,
            metadata: Map::new(),
            series: SnapshotSeries::new(),
        }
    }

    pub fn with_snapshots(mut self, newest_first: Vec<Snapshot>) -> Self {
        self.series = SnapshotSeries::from_newest_first(newest_first);
        self
    }

    /// Official name from the latest snapshot, falling back to the record name
    pub fn display_name(&self) -> &str {
        self.series
            .latest()
            .and_then(|s| {
                s.document
                    .pointer("/government/government_metadata/country_official_name/value")
                    .and_then(Value::as_str)
            })
            .unwrap_or(&self.name)
    }

    pub fn government_type(&self) -> Option<&str> {
        self.series.latest().and_then(|s| {
            s.document
                .pointer("/government/government_metadata/government_type/value")
                .and_then(Value::as_str)
        })
    }

    pub fn is_owned_by(&self, user: UserId) -> bool {
        self.owner_id == user
    }
}

impl From<NationRecord> for Nation {
    fn from(record: NationRecord) -> Self {
        let series = match record.latest_snapshot.map(Snapshot::try_from) {
            Some(Ok(snapshot)) => SnapshotSeries::from_newest_first(vec![snapshot]),
            Some(Err(e)) => {
                tracing::warn!("Ignoring unreadable snapshot of state {}: {}", record.id, e);
                SnapshotSeries::new()
            }
            None => SnapshotSeries::new(),
        };

        Self {
            id: record.id,
            name: record.name,
            owner_id: record.user_id,
            flag: record.flag_svg,
            metadata: record.metadata,
            series,
        }
    }
}
