//! Lookup of other datasets referenced by `merge`

use std::collections::HashMap;

use ml_prep_core::{Dataset, DatasetMetadata, Error, Result};

/// Identifier of a dataset in a catalog
pub type DatasetId = u64;

/// Source of datasets and their metadata, keyed by id
pub trait DatasetCatalog {
    /// Metadata of a dataset, or `None` if the id is unknown
    fn metadata(&self, id: DatasetId) -> Option<DatasetMetadata>;

    /// Load the parsed dataset
    fn load(&self, id: DatasetId) -> Result<Dataset>;

    /// Check if the catalog knows an id
    fn contains(&self, id: DatasetId) -> bool {
        self.metadata(id).is_some()
    }
}

/// Catalog holding parsed datasets in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    entries: HashMap<DatasetId, (Dataset, DatasetMetadata)>,
}

impl InMemoryCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a dataset, replacing any previous entry with the same id
    pub fn insert(&mut self, id: DatasetId, dataset: impl Into<Dataset>, metadata: DatasetMetadata) {
        self.entries.insert(id, (dataset.into(), metadata));
    }

    /// Number of datasets
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl DatasetCatalog for InMemoryCatalog {
    fn metadata(&self, id: DatasetId) -> Option<DatasetMetadata> {
        self.entries.get(&id).map(|(_, metadata)| metadata.clone())
    }

    fn load(&self, id: DatasetId) -> Result<Dataset> {
        self.entries
            .get(&id)
            .map(|(dataset, _)| dataset.clone())
            .ok_or_else(|| Error::InvalidDataFile(format!("dataset #{id} not found")))
    }

    fn contains(&self, id: DatasetId) -> bool {
        self.entries.contains_key(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ml_prep_core::metadata::{MetadataDetails, TimeseriesMetadata};
    use ml_prep_core::{Sample, TimeseriesDataset, Timestep};
    use std::collections::BTreeMap;

    #[test]
    fn test_insert_and_load() {
        let data = TimeseriesDataset::new(
            vec![Sample::new(vec![Timestep::new(vec![1.0], vec![])])],
            1,
            0,
        )
        .unwrap();
        let meta = DatasetMetadata::new(MetadataDetails::Timeseries(TimeseriesMetadata {
            data_rows: 1,
            empty_rows: 0,
            min_timesteps: 1,
            max_timesteps: 1,
            input_size: 1,
            output_size: 0,
            binary_input: true,
            binary_output: false,
            classes: BTreeMap::new(),
        }));

        let mut catalog = InMemoryCatalog::new();
        catalog.insert(7, data.clone(), meta.clone());

        assert!(catalog.contains(7));
        assert!(!catalog.contains(8));
        assert_eq!(catalog.metadata(7), Some(meta));
        assert_eq!(catalog.load(7).unwrap(), Dataset::Timeseries(data));
        assert!(catalog.load(8).is_err());
    }
}
