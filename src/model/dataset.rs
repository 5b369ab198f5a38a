//! Semantic model types
//!
//! A `Dataset` is the declarative registry entry the engine works against:
//! dimensions, measures, hierarchies, joins and an optional time
//! dimension. Datasets are pure data; the only behavior here is
//! construction and load-time validation. Once published through the
//! registry a dataset is immutable and shared behind an `Arc`.

use petgraph::algo::is_cyclic_directed;
use petgraph::graphmap::DiGraphMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::OnceLock;

use crate::model::error::ModelError;
use crate::table::Value;
use crate::timeseries::Grain;

/// Data kind of a dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataKind {
    /// Discrete labels (region, product, ...)
    Categorical,
    /// Numeric axis
    Numeric,
    /// Timestamps
    Temporal,
}

/// A grouping axis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    /// Logical name, unique within the dataset
    pub name: String,
    /// Source column expression in the physical table
    pub expr: String,
    /// Owning physical table
    pub table: String,
    /// Data kind
    pub kind: DataKind,
}

/// Aggregation functions a measure can declare
///
/// A closed set: unknown names fail when the declarative description is
/// parsed, so a dataset with a bad function is never published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggFn {
    /// Sum of non-NULL values (0 over zero rows)
    Sum,
    /// Count of non-NULL values
    Count,
    /// Count of distinct non-NULL values
    CountDistinct,
    /// Mean of non-NULL values (NULL over zero rows)
    Avg,
    /// Minimum non-NULL value (NULL over zero rows)
    Min,
    /// Maximum non-NULL value (NULL over zero rows)
    Max,
}

impl AggFn {
    /// Aggregate a group of cell values
    ///
    /// NULL measure values are ignored rather than propagated: `sum` and
    /// `count` over an empty or all-NULL group yield 0, while `avg`,
    /// `min` and `max` yield NULL.
    pub fn apply(&self, values: &[&Value]) -> Value {
        match self {
            AggFn::Sum => {
                let total: f64 = values.iter().filter_map(|v| v.as_number()).sum();
                Value::Number(total)
            }
            AggFn::Count => {
                let n = values.iter().filter(|v| !v.is_null()).count();
                Value::Number(n as f64)
            }
            AggFn::CountDistinct => {
                let mut seen: Vec<&Value> =
                    values.iter().filter(|v| !v.is_null()).copied().collect();
                seen.sort_by(|a, b| {
                    a.cmp_grouping(b, crate::table::NullOrder::Last)
                });
                seen.dedup();
                Value::Number(seen.len() as f64)
            }
            AggFn::Avg => {
                let nums: Vec<f64> = values.iter().filter_map(|v| v.as_number()).collect();
                if nums.is_empty() {
                    Value::Null
                } else {
                    Value::Number(nums.iter().sum::<f64>() / nums.len() as f64)
                }
            }
            AggFn::Min => values
                .iter()
                .filter_map(|v| v.as_number())
                .fold(None, |acc: Option<f64>, n| {
                    Some(acc.map_or(n, |a| a.min(n)))
                })
                .into(),
            AggFn::Max => values
                .iter()
                .filter_map(|v| v.as_number())
                .fold(None, |acc: Option<f64>, n| {
                    Some(acc.map_or(n, |a| a.max(n)))
                })
                .into(),
        }
    }

    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "sum" => Some(AggFn::Sum),
            "count" => Some(AggFn::Count),
            "count_distinct" => Some(AggFn::CountDistinct),
            "avg" | "average" => Some(AggFn::Avg),
            "min" => Some(AggFn::Min),
            "max" => Some(AggFn::Max),
            _ => None,
        }
    }
}

impl std::fmt::Display for AggFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AggFn::Sum => write!(f, "sum"),
            AggFn::Count => write!(f, "count"),
            AggFn::CountDistinct => write!(f, "count_distinct"),
            AggFn::Avg => write!(f, "avg"),
            AggFn::Min => write!(f, "min"),
            AggFn::Max => write!(f, "max"),
        }
    }
}

/// A numeric column with an associated aggregation function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measure {
    /// Logical name, unique within the dataset and disjoint from dimensions
    pub name: String,
    /// Source column expression
    pub expr: String,
    /// Aggregation function
    pub agg: AggFn,
}

/// An ordered drill-down path, coarsest to finest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hierarchy {
    /// Hierarchy name
    pub name: String,
    /// Dimension names, coarsest first
    pub levels: Vec<String>,
}

/// Join kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinKind {
    Inner,
    Left,
}

/// A registered join between two physical tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Join {
    /// Left table
    pub left: String,
    /// Right table
    pub right: String,
    /// Join kind
    pub kind: JoinKind,
    /// Equality conditions as (left column, right column) pairs
    pub on: Vec<(String, String)>,
}

/// Time-dimension configuration for the time-series engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeDimension {
    /// Name of the temporal dimension
    pub dimension: String,
    /// Grains this dataset supports
    pub grains: Vec<Grain>,
}

/// A declarative dataset: the unit of the semantic model
///
/// Created at config load, read-only during request processing, and
/// replaced wholesale on reload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    /// Unique dataset name
    pub name: String,
    /// Base physical table
    pub base_table: String,
    /// Registered joins (must form a DAG rooted at `base_table`)
    #[serde(default)]
    pub joins: Vec<Join>,
    /// Declared dimensions
    #[serde(default)]
    pub dimensions: Vec<Dimension>,
    /// Declared measures
    #[serde(default)]
    pub measures: Vec<Measure>,
    /// Declared hierarchies
    #[serde(default)]
    pub hierarchies: Vec<Hierarchy>,
    /// Optional time-dimension configuration
    #[serde(default)]
    pub time_dimension: Option<TimeDimension>,
}

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap())
}

impl Dataset {
    /// Start a dataset definition
    pub fn new(name: impl Into<String>, base_table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_table: base_table.into(),
            joins: Vec::new(),
            dimensions: Vec::new(),
            measures: Vec::new(),
            hierarchies: Vec::new(),
            time_dimension: None,
        }
    }

    /// Builder method: add a dimension
    pub fn dimension(
        mut self,
        name: impl Into<String>,
        table: impl Into<String>,
        kind: DataKind,
    ) -> Self {
        let name = name.into();
        self.dimensions.push(Dimension {
            expr: name.clone(),
            name,
            table: table.into(),
            kind,
        });
        self
    }

    /// Builder method: add a measure
    pub fn measure(mut self, name: impl Into<String>, agg: AggFn) -> Self {
        let name = name.into();
        self.measures.push(Measure {
            expr: name.clone(),
            name,
            agg,
        });
        self
    }

    /// Builder method: add a hierarchy
    pub fn hierarchy(mut self, name: impl Into<String>, levels: &[&str]) -> Self {
        self.hierarchies.push(Hierarchy {
            name: name.into(),
            levels: levels.iter().map(|s| s.to_string()).collect(),
        });
        self
    }

    /// Builder method: register a join
    pub fn join(
        mut self,
        left: impl Into<String>,
        right: impl Into<String>,
        kind: JoinKind,
        on: &[(&str, &str)],
    ) -> Self {
        self.joins.push(Join {
            left: left.into(),
            right: right.into(),
            kind,
            on: on
                .iter()
                .map(|(l, r)| (l.to_string(), r.to_string()))
                .collect(),
        });
        self
    }

    /// Builder method: set the time dimension
    pub fn time_dimension(mut self, dimension: impl Into<String>, grains: &[Grain]) -> Self {
        self.time_dimension = Some(TimeDimension {
            dimension: dimension.into(),
            grains: grains.to_vec(),
        });
        self
    }

    /// Look up a dimension by logical name
    pub fn find_dimension(&self, name: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.name == name)
    }

    /// Look up a measure by logical name
    pub fn find_measure(&self, name: &str) -> Option<&Measure> {
        self.measures.iter().find(|m| m.name == name)
    }

    /// Look up a hierarchy by name
    pub fn find_hierarchy(&self, name: &str) -> Option<&Hierarchy> {
        self.hierarchies.iter().find(|h| h.name == name)
    }

    /// Physical tables reachable from the base table via registered joins
    ///
    /// Includes the base table itself. Direction follows join declaration
    /// (left to right).
    pub fn reachable_tables(&self) -> HashSet<&str> {
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
        graph.add_node(self.base_table.as_str());
        for join in &self.joins {
            graph.add_edge(join.left.as_str(), join.right.as_str(), ());
        }

        let mut reachable = HashSet::new();
        let mut dfs = petgraph::visit::Dfs::new(&graph, self.base_table.as_str());
        while let Some(node) = dfs.next(&graph) {
            reachable.insert(node);
        }
        reachable
    }

    /// Validate the dataset; returns every problem found
    pub fn validate(&self) -> Result<(), Vec<ModelError>> {
        let mut errors = Vec::new();

        for name in std::iter::once(self.name.as_str())
            .chain(self.dimensions.iter().map(|d| d.name.as_str()))
            .chain(self.measures.iter().map(|m| m.name.as_str()))
        {
            if !identifier_pattern().is_match(name) {
                errors.push(ModelError::InvalidName(name.to_string()));
            }
        }

        let mut dim_names = HashSet::new();
        for dim in &self.dimensions {
            if !dim_names.insert(dim.name.as_str()) {
                errors.push(ModelError::DuplicateDimension {
                    dataset: self.name.clone(),
                    name: dim.name.clone(),
                });
            }
        }

        let mut measure_names = HashSet::new();
        for measure in &self.measures {
            if !measure_names.insert(measure.name.as_str()) {
                errors.push(ModelError::DuplicateMeasure {
                    dataset: self.name.clone(),
                    name: measure.name.clone(),
                });
            }
            if dim_names.contains(measure.name.as_str()) {
                errors.push(ModelError::NameCollision {
                    dataset: self.name.clone(),
                    name: measure.name.clone(),
                });
            }
        }

        for hierarchy in &self.hierarchies {
            if hierarchy.levels.is_empty() {
                errors.push(ModelError::EmptyHierarchy {
                    dataset: self.name.clone(),
                    hierarchy: hierarchy.name.clone(),
                });
            }
            for level in &hierarchy.levels {
                if !dim_names.contains(level.as_str()) {
                    errors.push(ModelError::UnknownHierarchyLevel {
                        dataset: self.name.clone(),
                        hierarchy: hierarchy.name.clone(),
                        level: level.clone(),
                    });
                }
            }
        }

        self.validate_joins(&mut errors);

        if let Some(time) = &self.time_dimension {
            match self.find_dimension(&time.dimension) {
                None => errors.push(ModelError::UnknownTimeDimension {
                    dataset: self.name.clone(),
                    name: time.dimension.clone(),
                }),
                Some(dim) if dim.kind != DataKind::Temporal => {
                    errors.push(ModelError::NotTemporal {
                        dataset: self.name.clone(),
                        name: time.dimension.clone(),
                    })
                }
                Some(_) => {}
            }
            if time.grains.is_empty() {
                errors.push(ModelError::NoGrains {
                    dataset: self.name.clone(),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_joins(&self, errors: &mut Vec<ModelError>) {
        if self.joins.is_empty() {
            return;
        }

        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
        graph.add_node(self.base_table.as_str());
        for join in &self.joins {
            graph.add_edge(join.left.as_str(), join.right.as_str(), ());
        }

        if is_cyclic_directed(&graph) {
            errors.push(ModelError::CyclicJoins {
                dataset: self.name.clone(),
            });
            return;
        }

        let reachable = self.reachable_tables();
        for join in &self.joins {
            for table in [join.left.as_str(), join.right.as_str()] {
                if !reachable.contains(table) {
                    errors.push(ModelError::UnreachableTable {
                        dataset: self.name.clone(),
                        table: table.to_string(),
                        base: self.base_table.clone(),
                    });
                }
            }
        }
    }
}
