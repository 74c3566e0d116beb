//! Metric resolution over snapshot documents: path lookup, definitions,
//! derived metrics, and display formatting.

pub mod format;
pub mod path;
pub mod registry;
pub mod value;

pub use format::{format_compact, format_percent_change, format_value};
pub use path::{resolve, resolve_or_empty, PathError};
pub use registry::{Derivation, Guard, MetricDefinition, MetricKind, MetricRegistry, SortOrder};
pub use value::{MetricValue, Unit};
