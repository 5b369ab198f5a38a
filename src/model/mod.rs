//! Semantic Model
//!
//! Declarative registry of datasets: dimensions, measures, hierarchies,
//! joins and time-dimension configuration. Datasets are validated when
//! loaded, immutable once published, and replaced wholesale on reload.
//!
//! ## Components
//!
//! - **Dataset** and friends: pure-data model types with load-time validation
//! - **ModelRegistry**: versioned catalog with atomic snapshot swap
//! - **ModelError**: configuration-time error taxonomy

mod dataset;
mod error;
mod registry;

pub use dataset::{
    AggFn, DataKind, Dataset, Dimension, Hierarchy, Join, JoinKind, Measure, TimeDimension,
};
pub use error::{ModelError, ModelResult};
pub use registry::{Catalog, ModelRegistry};
