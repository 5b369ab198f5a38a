//! Semantic model error types
//!
//! Configuration-time problems found while validating a dataset. A dataset
//! with any of these is never published; the registry reports the full
//! list and keeps serving the previous catalog.

use thiserror::Error;

/// Errors found while loading or validating a semantic model
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// The declarative description failed to parse (includes unknown
    /// aggregation function names, which the closed enum rejects)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Dataset, dimension or measure name is not a valid identifier
    #[error("Invalid name '{0}': must start with a letter or underscore")]
    InvalidName(String),

    /// Two dimensions share a name
    #[error("Dataset '{dataset}': duplicate dimension '{name}'")]
    DuplicateDimension { dataset: String, name: String },

    /// Two measures share a name
    #[error("Dataset '{dataset}': duplicate measure '{name}'")]
    DuplicateMeasure { dataset: String, name: String },

    /// A measure name collides with a dimension name
    #[error("Dataset '{dataset}': '{name}' is both a dimension and a measure")]
    NameCollision { dataset: String, name: String },

    /// A hierarchy has no levels
    #[error("Dataset '{dataset}': hierarchy '{hierarchy}' has no levels")]
    EmptyHierarchy { dataset: String, hierarchy: String },

    /// A hierarchy level is not a declared dimension
    #[error("Dataset '{dataset}': hierarchy '{hierarchy}' level '{level}' is not a dimension")]
    UnknownHierarchyLevel {
        dataset: String,
        hierarchy: String,
        level: String,
    },

    /// The join graph contains a cycle
    #[error("Dataset '{dataset}': join graph contains a cycle")]
    CyclicJoins { dataset: String },

    /// A joined table cannot be reached from the base table
    #[error("Dataset '{dataset}': table '{table}' is not reachable from base table '{base}'")]
    UnreachableTable {
        dataset: String,
        table: String,
        base: String,
    },

    /// The time dimension is not a declared dimension
    #[error("Dataset '{dataset}': time dimension '{name}' is not a dimension")]
    UnknownTimeDimension { dataset: String, name: String },

    /// The time dimension is not temporal
    #[error("Dataset '{dataset}': time dimension '{name}' is not temporal")]
    NotTemporal { dataset: String, name: String },

    /// A time dimension declares no supported grains
    #[error("Dataset '{dataset}': time dimension declares no grains")]
    NoGrains { dataset: String },

    /// Two datasets in one catalog share a name
    #[error("Duplicate dataset '{0}' in catalog")]
    DuplicateDataset(String),
}

/// Result type alias for single model checks
pub type ModelResult<T> = Result<T, ModelError>;
