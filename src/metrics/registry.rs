//! Metric definitions and lookup
//!
//! A metric is either read straight from a snapshot path (`Direct`) or
//! computed from several paths (`Derived`). Derived metrics are a closed,
//! data-described set: source paths, guards, and a plain combining function.
//! A failed guard yields a zero sentinel instead of `NaN` so that one bad
//! snapshot cannot scramble a ranking.

use crate::core::error::{Result, SandboxError};
use crate::metrics::format::{format_value, format_whole_dollars};
use crate::metrics::path::{resolve, resolve_or_empty};
use crate::metrics::value::{MetricValue, Unit};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;

/// Below this population a per-capita figure is considered meaningless
pub const MIN_PER_CAPITA_POPULATION: f64 = 1_000_000.0;

pub const GDP_PATH: &str = "economy.economic_metrics.gross_domestic_product_gdp";
pub const POPULATION_PATH: &str = "people.people_metrics.total_population";

/// Which direction is "better" for a metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Lower is better (corruption, unemployment, ...)
    Asc,
    /// Higher is better
    Desc,
}

impl SortOrder {
    /// Multiplier applied to `b - a` when ranking
    pub fn sign(self) -> f64 {
        match self {
            SortOrder::Desc => 1.0,
            SortOrder::Asc => -1.0,
        }
    }
}

/// Validity condition over a derived metric's sources (indices into `sources`)
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Guard {
    NonZero(usize),
    AtLeast { source: usize, min: f64 },
}

impl Guard {
    fn holds(&self, values: &[MetricValue]) -> bool {
        match *self {
            Guard::NonZero(i) => values.get(i).map_or(false, |v| v.value != 0.0),
            Guard::AtLeast { source, min } => values.get(source).map_or(false, |v| v.value >= min),
        }
    }
}

/// How a derived metric is computed
#[derive(Debug, Clone)]
pub struct Derivation {
    /// Every source must resolve or the sentinel is returned
    pub sources: Vec<&'static str>,
    pub guards: Vec<Guard>,
    /// Pure combination of the resolved sources, in `sources` order
    pub combine: fn(&[MetricValue]) -> f64,
    pub unit: Option<Unit>,
    /// Human-readable rendering for `raw`
    pub render: fn(f64) -> String,
}

impl Derivation {
    /// Evaluate against a snapshot document; never returns a non-finite value
    pub fn evaluate(&self, document: &Value, key: &str) -> MetricValue {
        let mut values = Vec::with_capacity(self.sources.len());
        for path in &self.sources {
            match resolve(document, path) {
                Ok(v) if v.value.is_finite() => values.push(v),
                _ => return self.sentinel(key),
            }
        }

        if !self.guards.iter().all(|g| g.holds(&values)) {
            return self.sentinel(key);
        }

        let value = (self.combine)(&values);
        if !value.is_finite() {
            return self.sentinel(key);
        }
        MetricValue::new(value, self.unit.clone(), (self.render)(value), key)
    }

    /// The defined zero value returned whenever the computation is invalid
    pub fn sentinel(&self, key: &str) -> MetricValue {
        MetricValue::new(0.0, self.unit.clone(), (self.render)(0.0), key)
    }
}

#[derive(Debug, Clone)]
pub enum MetricKind {
    Direct { path: &'static str },
    Derived(Derivation),
}

#[derive(Debug, Clone)]
pub struct MetricDefinition {
    pub id: &'static str,
    pub name: &'static str,
    pub order: SortOrder,
    pub kind: MetricKind,
}

impl MetricDefinition {
    pub fn direct(id: &'static str, name: &'static str, path: &'static str, order: SortOrder) -> Self {
        Self {
            id,
            name,
            order,
            kind: MetricKind::Direct { path },
        }
    }

    pub fn derived(id: &'static str, name: &'static str, derivation: Derivation, order: SortOrder) -> Self {
        Self {
            id,
            name,
            order,
            kind: MetricKind::Derived(derivation),
        }
    }

    /// Snapshot paths this metric reads
    pub fn paths(&self) -> Vec<&'static str> {
        match &self.kind {
            MetricKind::Direct { path } => vec![*path],
            MetricKind::Derived(d) => d.sources.clone(),
        }
    }

    /// Resolve against a snapshot document; missing data gives an empty or
    /// sentinel value, never an error
    pub fn resolve(&self, document: &Value) -> MetricValue {
        match &self.kind {
            MetricKind::Direct { path } => resolve_or_empty(document, path),
            MetricKind::Derived(d) => d.evaluate(document, self.name),
        }
    }

    /// Text for a ranking row
    pub fn display(&self, document: &Value) -> String {
        match &self.kind {
            MetricKind::Direct { path } => match resolve(document, path) {
                Ok(v) => format_value(&v),
                Err(_) => String::new(),
            },
            MetricKind::Derived(d) => {
                let value = d.evaluate(document, self.name);
                if value.raw.is_empty() {
                    d.sentinel(self.name).raw
                } else {
                    value.raw
                }
            }
        }
    }
}

/// Registry of metric definitions indexed by id
#[derive(Debug, Default)]
pub struct MetricRegistry {
    definitions: Vec<MetricDefinition>,
    by_id: AHashMap<&'static str, usize>,
}

impl MetricRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition; ids must be unique
    pub fn register(&mut self, definition: MetricDefinition) -> Result<()> {
        if self.by_id.contains_key(definition.id) {
            return Err(SandboxError::Config(format!(
                "metric '{}' registered twice",
                definition.id
            )));
        }
        self.by_id.insert(definition.id, self.definitions.len());
        self.definitions.push(definition);
        Ok(())
    }

    /// Register in order, stopping at the first duplicate id
    pub fn register_all<I>(&mut self, definitions: I) -> Result<()>
    where
        I: IntoIterator<Item = MetricDefinition>,
    {
        for definition in definitions {
            self.register(definition)?;
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&MetricDefinition> {
        self.by_id.get(id).map(|&i| &self.definitions[i])
    }

    /// Like `get`, but an unknown id is an error
    pub fn definition(&self, id: &str) -> Result<&MetricDefinition> {
        self.get(id).ok_or_else(|| SandboxError::UnknownMetric(id.to_string()))
    }

    /// Definitions in registration order
    pub fn iter(&self) -> impl Iterator<Item = &MetricDefinition> {
        self.definitions.iter()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Resolve metric `id` against a snapshot document
    ///
    /// The only error is an unregistered id; missing data resolves to an
    /// empty (direct) or sentinel (derived) value.
    pub fn resolve_value(&self, document: &Value, id: &str) -> Result<MetricValue> {
        Ok(self.definition(id)?.resolve(document))
    }

    pub fn display_value(&self, document: &Value, id: &str) -> Result<String> {
        Ok(self.definition(id)?.display(document))
    }

    /// Every path any registered metric reads, de-duplicated, first-seen order
    ///
    /// Used as the allow-list for the snapshot collection query.
    pub fn required_paths(&self) -> Vec<&'static str> {
        let mut seen = ahash::AHashSet::new();
        self.definitions
            .iter()
            .flat_map(|d| d.paths())
            .filter(|p| seen.insert(*p))
            .collect()
    }

    /// The leaderboard metric table
    pub fn leaderboard() -> Self {
        use SortOrder::{Asc, Desc};

        let definitions = vec![
            MetricDefinition::direct("gdp", "GDP", GDP_PATH, Desc),
            MetricDefinition::derived("gdp_per_capita", "GDP per Capita", gdp_per_capita(), Desc),
            MetricDefinition::direct("population", "Population", POPULATION_PATH, Desc),
            MetricDefinition::direct(
                "approval",
                "Approval Rating",
                "government.government_metrics.overall_head_of_stategovernment_approval_rating",
                Desc,
            ),
            MetricDefinition::direct(
                "hdi",
                "Human Development Index",
                "people.people_metrics.human_development_index_hdi",
                Desc,
            ),
            MetricDefinition::direct(
                "happiness",
                "World Happiness Score",
                "people.people_metrics.gallup_world_happiness_score",
                Desc,
            ),
            MetricDefinition::direct(
                "social_mobility",
                "Social Mobility Index",
                "people.people_metrics.social_mobility_index",
                Desc,
            ),
            MetricDefinition::direct(
                "corruption",
                "Corruption Index",
                "government.government_metrics.corruption_perception_index_cpi",
                Asc,
            ),
            MetricDefinition::direct(
                "life_expectancy",
                "Life Expectancy",
                "health.life_expectancy.average_life_expectancy_at_birth",
                Desc,
            ),
            MetricDefinition::direct(
                "unemployment",
                "Unemployment Rate",
                "economy.economic_metrics.unemployment_rate",
                Asc,
            ),
            MetricDefinition::direct(
                "air_quality",
                "Air Quality Index",
                "geography_and_environment.environmental_metrics.air_quality_index",
                Asc,
            ),
            MetricDefinition::direct(
                "poverty_rate",
                "Poverty Rate",
                "economy.economic_metrics.poverty_rate",
                Asc,
            ),
            MetricDefinition::direct("gini", "Gini Coefficient", "economy.economic_metrics.gini_coefficient", Asc),
        ];

        let mut registry = Self::new();
        if let Err(e) = registry.register_all(definitions) {
            tracing::error!("Leaderboard metric table is inconsistent: {}", e);
        }
        registry
    }

    /// Process-wide leaderboard registry, built on first use
    pub fn global() -> &'static MetricRegistry {
        static REGISTRY: OnceLock<MetricRegistry> = OnceLock::new();
        REGISTRY.get_or_init(MetricRegistry::leaderboard)
    }
}

fn gdp_per_capita() -> Derivation {
    Derivation {
        sources: vec![GDP_PATH, POPULATION_PATH],
        guards: vec![
            Guard::NonZero(0),
            Guard::NonZero(1),
            Guard::AtLeast {
                source: 1,
                min: MIN_PER_CAPITA_POPULATION,
            },
        ],
        combine: |v| v[0].value / v[1].value,
        unit: Some(Unit::Usd),
        render: format_whole_dollars,
    }
}
