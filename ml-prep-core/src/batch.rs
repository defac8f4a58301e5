//! Batch construction for training
//!
//! Timeseries samples are bucketed by exact timestep count so every batch is
//! a dense `[sample, timestep, feature]` array without padding. Tabular data
//! is cut into consecutive row windows.

use std::collections::BTreeMap;

use ndarray::{s, Array3, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::dataset::{TabularDataset, TimeseriesDataset};

/// Batch sizing options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchOptions {
    /// Upper bound on rows or samples per batch
    pub max_batch_size: usize,

    /// Lower bound on the number of batches for tabular data
    pub min_batches: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            max_batch_size: 128,
            min_batches: 1,
        }
    }
}

/// Pick a batch size not above `max_batch_size` yielding at least `min_batches` batches
///
/// Returns `(batch_size, num_batches)`. A dataset too small to honour
/// `min_batches` at the maximum size gets `floor(N / min_batches)` sized
/// batches instead (at least 1). That size is not always the largest one
/// meeting `min_batches`: 10 rows with 4 minimum batches give `(2, 5)`,
/// not `(3, 4)`. An empty dataset has zero batches.
pub fn calculate_batch_size(
    dataset_size: usize,
    max_batch_size: usize,
    min_batches: usize,
) -> (usize, usize) {
    let max_batch_size = max_batch_size.max(1);
    if dataset_size == 0 {
        return (max_batch_size, 0);
    }
    let num_batches = dataset_size.div_ceil(max_batch_size);
    if num_batches >= min_batches {
        return (max_batch_size, num_batches);
    }
    let batch_size = (dataset_size / min_batches).max(1);
    (batch_size, dataset_size.div_ceil(batch_size))
}

/// Samples sharing one timestep count
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestepBucket {
    /// Timesteps per sample
    pub timesteps: usize,

    /// Indices of the samples in the dataset
    pub sample_indices: Vec<usize>,
}

/// A dense batch of equal-length timeseries samples
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceBatch {
    /// Indices of the samples in the dataset
    pub sample_indices: Vec<usize>,

    /// Values laid out as `[sample, timestep, inputs ++ outputs]`
    pub data: Array3<f64>,

    /// Number of leading input features on the last axis
    pub input_size: usize,
}

impl SequenceBatch {
    /// Timesteps per sample
    pub fn timesteps(&self) -> usize {
        self.data.len_of(Axis(1))
    }

    /// Copy laid out as `[timestep, sample, feature]`
    pub fn to_time_major(&self) -> Array3<f64> {
        self.data.view().permuted_axes([1, 0, 2]).to_owned()
    }

    /// Input features of every sample and timestep
    pub fn inputs(&self) -> Array3<f64> {
        self.data.slice(s![.., .., ..self.input_size]).to_owned()
    }

    /// Output features of every sample and timestep
    pub fn outputs(&self) -> Array3<f64> {
        self.data.slice(s![.., .., self.input_size..]).to_owned()
    }
}

/// A window of consecutive tabular rows
#[derive(Debug, Clone, PartialEq)]
pub struct TabularBatch<'a> {
    /// Feature rows
    pub features: ArrayView2<'a, f64>,

    /// Matching output rows
    pub outputs: Option<ArrayView2<'a, f64>>,
}

/// Builds training batches from prepared datasets
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchConstructor {
    options: BatchOptions,
}

impl BatchConstructor {
    /// Create a new batch constructor
    pub fn new(options: BatchOptions) -> Self {
        Self { options }
    }

    /// Group samples by timestep count, ascending
    pub fn buckets(&self, dataset: &TimeseriesDataset) -> Vec<TimestepBucket> {
        let mut by_length: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (index, sample) in dataset.samples().iter().enumerate() {
            by_length.entry(sample.len()).or_default().push(index);
        }
        by_length
            .into_iter()
            .map(|(timesteps, sample_indices)| TimestepBucket {
                timesteps,
                sample_indices,
            })
            .collect()
    }

    /// Dense batches of at most `max_batch_size` equal-length samples
    pub fn timeseries_batches(&self, dataset: &TimeseriesDataset) -> Vec<SequenceBatch> {
        let max_batch_size = self.options.max_batch_size.max(1);
        let features = dataset.input_size() + dataset.output_size();
        let mut batches = Vec::new();
        for bucket in self.buckets(dataset) {
            for chunk in bucket.sample_indices.chunks(max_batch_size) {
                let mut data = Array3::zeros((chunk.len(), bucket.timesteps, features));
                for (row, &index) in chunk.iter().enumerate() {
                    let sample = &dataset.samples()[index];
                    for (t, step) in sample.timesteps.iter().enumerate() {
                        let values = step.inputs.iter().chain(&step.outputs);
                        for (f, &value) in values.enumerate() {
                            data[[row, t, f]] = value;
                        }
                    }
                }
                batches.push(SequenceBatch {
                    sample_indices: chunk.to_vec(),
                    data,
                    input_size: dataset.input_size(),
                });
            }
        }
        tracing::debug!(
            samples = dataset.num_samples(),
            batches = batches.len(),
            "built timeseries batches"
        );
        batches
    }

    /// Consecutive row windows sized by [`calculate_batch_size`]
    pub fn tabular_batches<'a>(&self, dataset: &'a TabularDataset) -> Vec<TabularBatch<'a>> {
        let rows = dataset.num_rows();
        let (batch_size, num_batches) =
            calculate_batch_size(rows, self.options.max_batch_size, self.options.min_batches);
        (0..num_batches)
            .map(|i| {
                let start = i * batch_size;
                let end = (start + batch_size).min(rows);
                TabularBatch {
                    features: dataset.features().slice(s![start..end, ..]),
                    outputs: dataset
                        .outputs()
                        .map(|block| block.values.slice(s![start..end, ..])),
                }
            })
            .collect()
    }
}
