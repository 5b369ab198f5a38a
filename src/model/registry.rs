//! Model registry
//!
//! Holds the published catalog of datasets. The catalog is an immutable
//! snapshot behind `RwLock<Arc<Catalog>>`: a reload validates every
//! dataset, builds a complete replacement catalog, and swaps the pointer.
//! In-flight requests keep the `Arc` they cloned; new requests see the
//! new version. There is no partial publish: one bad dataset fails the
//! whole load and the previous catalog keeps serving.

use chrono::Utc;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use crate::model::dataset::Dataset;
use crate::model::error::ModelError;

/// An immutable catalog snapshot
#[derive(Debug, Clone)]
pub struct Catalog {
    /// Snapshot version, new on every publish
    pub version: Uuid,
    /// Publish time (Unix millis)
    pub loaded_at: i64,
    datasets: HashMap<String, Arc<Dataset>>,
}

impl Catalog {
    fn empty() -> Self {
        Self {
            version: Uuid::new_v4(),
            loaded_at: Utc::now().timestamp_millis(),
            datasets: HashMap::new(),
        }
    }

    /// Look up a dataset
    pub fn dataset(&self, name: &str) -> Option<Arc<Dataset>> {
        self.datasets.get(name).cloned()
    }

    /// Names of all published datasets, sorted
    pub fn dataset_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.datasets.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of datasets in the snapshot
    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    /// Check if the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }
}

/// Declarative form of a whole catalog, as loaded from TOML
#[derive(Debug, Deserialize)]
struct CatalogSpec {
    #[serde(default)]
    datasets: Vec<Dataset>,
}

/// Thread-safe registry with atomic catalog replacement
pub struct ModelRegistry {
    current: RwLock<Arc<Catalog>>,
}

impl ModelRegistry {
    /// Create a registry with an empty catalog
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(Catalog::empty())),
        }
    }

    /// Validate and publish a full set of datasets
    ///
    /// Either every dataset validates and the catalog is swapped, or the
    /// complete error list is returned and nothing changes.
    pub fn publish(&self, datasets: Vec<Dataset>) -> Result<Uuid, Vec<ModelError>> {
        let mut errors = Vec::new();
        let mut map: HashMap<String, Arc<Dataset>> = HashMap::new();

        for dataset in datasets {
            if let Err(mut errs) = dataset.validate() {
                errors.append(&mut errs);
            }
            if map.contains_key(&dataset.name) {
                errors.push(ModelError::DuplicateDataset(dataset.name.clone()));
            }
            map.insert(dataset.name.clone(), Arc::new(dataset));
        }

        if !errors.is_empty() {
            tracing::warn!(errors = errors.len(), "Rejected semantic model publish");
            return Err(errors);
        }

        let catalog = Catalog {
            version: Uuid::new_v4(),
            loaded_at: Utc::now().timestamp_millis(),
            datasets: map,
        };
        let version = catalog.version;

        let mut guard = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Arc::new(catalog);
        drop(guard);

        tracing::info!(version = %version, "Published semantic model catalog");
        Ok(version)
    }

    /// Parse a TOML catalog description and publish it
    pub fn load_toml(&self, text: &str) -> Result<Uuid, Vec<ModelError>> {
        let spec: CatalogSpec =
            toml::from_str(text).map_err(|e| vec![ModelError::Parse(e.to_string())])?;
        self.publish(spec.datasets)
    }

    /// Current catalog snapshot
    ///
    /// Callers hold this `Arc` for the whole request; later reloads do
    /// not affect it.
    pub fn snapshot(&self) -> Arc<Catalog> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Convenience lookup against the current snapshot
    pub fn dataset(&self, name: &str) -> Option<Arc<Dataset>> {
        self.snapshot().dataset(name)
    }

    /// Version of the current snapshot
    pub fn version(&self) -> Uuid {
        self.snapshot().version
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}
