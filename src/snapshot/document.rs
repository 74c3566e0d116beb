//! Immutable dated snapshots of a nation's simulated state

use crate::core::types::StateId;
use crate::metrics::path::{resolve, PathError};
use crate::metrics::value::MetricValue;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Calendar date of a snapshot (simulation time, not wall-clock)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SnapshotDate {
    year: i32,
    month: u32,
    day: u32,
}

impl SnapshotDate {
    /// Fails for a month outside 1..=12 or a day the month does not have
    pub fn new(year: i32, month: u32, day: u32) -> Result<Self, String> {
        if !(1..=12).contains(&month) || day == 0 || day > days_in_month(year, month) {
            return Err(format!("Invalid snapshot date: {:04}-{:02}-{:02}", year, month, day));
        }
        Ok(Self { year, month, day })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn day(&self) -> u32 {
        self.day
    }

    /// `Jan 2025`
    pub fn month_label(&self) -> String {
        let month = (self.month as usize)
            .checked_sub(1)
            .and_then(|i| MONTHS.get(i))
            .copied()
            .unwrap_or("???");
        format!("{} {}", month, self.year)
    }

    /// Year shifted by `offset`
    pub fn year_label(&self, offset: i32) -> String {
        (self.year + offset).to_string()
    }
}

impl FromStr for SnapshotDate {
    type Err = String;

    /// Accepts `YYYY-MM-DD`, `YYYY-MM`, or a timestamp starting with a date
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let date_part = s.trim().split(['T', ' ']).next().unwrap_or("");
        let mut parts = date_part.split('-');

        let year = parts
            .next()
            .and_then(|p| p.parse::<i32>().ok())
            .ok_or_else(|| format!("Invalid snapshot date: {}", s))?;
        let month = parts
            .next()
            .and_then(|p| p.parse::<u32>().ok())
            .filter(|m| (1..=12).contains(m))
            .ok_or_else(|| format!("Invalid snapshot date: {}", s))?;
        let day = match parts.next() {
            Some(p) => p
                .parse::<u32>()
                .map_err(|_| format!("Invalid snapshot date: {}", s))?,
            None => 1,
        };

        if parts.next().is_some() {
            return Err(format!("Invalid snapshot date: {}", s));
        }

        Self::new(year, month, day).map_err(|_| format!("Invalid snapshot date: {}", s))
    }
}

fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        2 if (year % 4 == 0 && year % 100 != 0) || year % 400 == 0 => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

impl TryFrom<String> for SnapshotDate {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<SnapshotDate> for String {
    fn from(date: SnapshotDate) -> Self {
        date.to_string()
    }
}

impl fmt::Display for SnapshotDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

/// Snapshot as the API sends it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotRecord {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub state_id: Option<StateId>,
    #[serde(default)]
    pub date: Option<String>,
    pub json_state: Value,
    #[serde(default, alias = "delta_report")]
    pub markdown_delta_report: Option<String>,
}

/// One nation's full simulated state at one point in time
///
/// Never mutated after construction; a turn produces a new one.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "SnapshotRecord")]
pub struct Snapshot {
    pub id: Option<i64>,
    pub state_id: Option<StateId>,
    pub date: SnapshotDate,
    pub document: Value,
    pub delta_report: Option<String>,
    /// What is coming up in the next period
    pub events: Vec<String>,
    /// Policy questions raised by the upcoming events
    pub events_policy: Vec<String>,
}

impl Snapshot {
    pub fn new(date: SnapshotDate, document: Value) -> Self {
        let events = string_list(&document, "events");
        let events_policy = string_list(&document, "events_policy");
        Self {
            id: None,
            state_id: None,
            date,
            document,
            delta_report: None,
            events,
            events_policy,
        }
    }

    pub fn with_delta_report(mut self, report: impl Into<String>) -> Self {
        self.delta_report = Some(report.into());
        self
    }

    /// Metric at a dotted path
    pub fn resolve(&self, path: &str) -> Result<MetricValue, PathError> {
        resolve(&self.document, path)
    }

    /// Non-blank delta report, if the turn produced one
    pub fn report(&self) -> Option<&str> {
        self.delta_report.as_deref().filter(|r| !r.trim().is_empty())
    }
}

impl TryFrom<SnapshotRecord> for Snapshot {
    type Error = String;

    fn try_from(record: SnapshotRecord) -> Result<Self, Self::Error> {
        let date = record
            .date
            .as_deref()
            .or_else(|| record.json_state.get("date").and_then(Value::as_str))
            .ok_or_else(|| "Snapshot has no date".to_string())?
            .parse::<SnapshotDate>()?;

        let mut snapshot = Snapshot::new(date, record.json_state);
        snapshot.id = record.id;
        snapshot.state_id = record.state_id;
        snapshot.delta_report = record.markdown_delta_report;
        Ok(snapshot)
    }
}

fn string_list(document: &Value, field: &str) -> Vec<String> {
    document
        .get(field)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_date_parsing() {
        assert_eq!("2025-03-01".parse::<SnapshotDate>().unwrap(), SnapshotDate::new(2025, 3, 1).unwrap());
        assert_eq!("2025-03".parse::<SnapshotDate>().unwrap(), SnapshotDate::new(2025, 3, 1).unwrap());
        assert_eq!(
            "2025-03-14T08:00:00Z".parse::<SnapshotDate>().unwrap(),
            SnapshotDate::new(2025, 3, 14).unwrap()
        );
        assert!("2025-13-01".parse::<SnapshotDate>().is_err());
        assert!("March 2025".parse::<SnapshotDate>().is_err());
    }

    #[test]
    fn test_out_of_range_month_rejected() {
        assert!(SnapshotDate::new(2025, 0, 1).is_err());
        assert!(SnapshotDate::new(2025, 13, 1).is_err());
        assert!("2025-00-01".parse::<SnapshotDate>().is_err());
        assert!("2025-13".parse::<SnapshotDate>().is_err());
    }

    #[test]
    fn test_day_checked_against_month_length() {
        assert!("2025-02-30".parse::<SnapshotDate>().is_err());
        assert!("2025-02-31".parse::<SnapshotDate>().is_err());
        assert!("2025-04-31".parse::<SnapshotDate>().is_err());
        assert!("2025-01-00".parse::<SnapshotDate>().is_err());
        assert!(SnapshotDate::new(2025, 2, 29).is_err());
        assert!(SnapshotDate::new(1900, 2, 29).is_err());

        assert_eq!("2024-02-29".parse::<SnapshotDate>().unwrap().day(), 29);
        assert!(SnapshotDate::new(2000, 2, 29).is_ok());
        assert!(SnapshotDate::new(2025, 12, 31).is_ok());
    }

    #[test]
    fn test_invalid_record_date_rejected() {
        let result: Result<Snapshot, _> =
            serde_json::from_value(json!({"date": "2025-02-31", "json_state": {}}));
        assert!(result.is_err());
    }

    #[test]
    fn test_date_ordering_is_chronological() {
        let a = SnapshotDate::new(2024, 12, 31).unwrap();
        let b = SnapshotDate::new(2025, 1, 1).unwrap();
        assert!(a < b);
    }

    #[test]
    fn test_date_labels() {
        let date = SnapshotDate::new(2025, 1, 1).unwrap();
        assert_eq!(date.month_label(), "Jan 2025");
        assert_eq!(date.year_label(5), "2030");
        assert_eq!(date.to_string(), "2025-01-01");
    }

    #[test]
    fn test_record_conversion_reads_document_fields() {
        let record: SnapshotRecord = serde_json::from_value(json!({
            "id": 9,
            "state_id": 3,
            "json_state": {
                "date": "2025-02-01",
                "events": ["Drought in the north"],
                "events_policy": ["How should the government respond to the drought?"]
            },
            "markdown_delta_report": "# February\nRain never came."
        }))
        .unwrap();
        let snapshot = Snapshot::try_from(record).unwrap();
        assert_eq!(snapshot.id, Some(9));
        assert_eq!(snapshot.state_id, Some(StateId(3)));
        assert_eq!(snapshot.date, SnapshotDate::new(2025, 2, 1).unwrap());
        assert_eq!(snapshot.events, vec!["Drought in the north".to_string()]);
        assert_eq!(snapshot.events_policy.len(), 1);
        assert_eq!(snapshot.report(), Some("# February\nRain never came."));
    }

    #[test]
    fn test_record_date_overrides_document() {
        let snapshot: Snapshot = serde_json::from_value(json!({
            "date": "2025-04-01",
            "json_state": {"date": "1999-01-01"}
        }))
        .unwrap();
        assert_eq!(snapshot.date, SnapshotDate::new(2025, 4, 1).unwrap());
    }

    #[test]
    fn test_missing_date_rejected() {
        let result: Result<Snapshot, _> = serde_json::from_value(json!({"json_state": {}}));
        assert!(result.is_err());
    }

    #[test]
    fn test_blank_report_is_none() {
        let snapshot = Snapshot::new(SnapshotDate::new(2025, 1, 1).unwrap(), json!({})).with_delta_report("  \n");
        assert_eq!(snapshot.report(), None);
    }
}
