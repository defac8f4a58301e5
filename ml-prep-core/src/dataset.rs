//! In-memory datasets
//!
//! Datasets are immutable values: every transformation builds a new one, so
//! a failing stage never corrupts its input.

use ndarray::{concatenate, s, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::column::ColumnInfo;
use crate::error::{Error, Result};
use crate::metadata::DataType;

/// Prediction targets split off a tabular dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputBlock {
    /// Output column descriptions
    pub columns: Vec<ColumnInfo>,

    /// Output values, one row per dataset row
    pub values: Array2<f64>,
}

impl OutputBlock {
    /// Create a new output block
    pub fn new(columns: Vec<ColumnInfo>, values: Array2<f64>) -> Result<Self> {
        if columns.len() != values.ncols() {
            return Err(Error::ShapeMismatch(format!(
                "{} output columns described but {} present",
                columns.len(),
                values.ncols()
            )));
        }
        Ok(Self { columns, values })
    }
}

/// Rectangular numeric dataset parsed from delimited text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabularDataset {
    /// Feature column descriptions
    columns: Vec<ColumnInfo>,

    /// Feature values, rows x columns
    features: Array2<f64>,

    /// Output block once outputs have been selected
    outputs: Option<OutputBlock>,
}

impl TabularDataset {
    /// Create a new dataset without outputs
    pub fn new(columns: Vec<ColumnInfo>, features: Array2<f64>) -> Result<Self> {
        if columns.len() != features.ncols() {
            return Err(Error::ShapeMismatch(format!(
                "{} columns described but {} present",
                columns.len(),
                features.ncols()
            )));
        }
        Ok(Self {
            columns,
            features,
            outputs: None,
        })
    }

    /// Attach an output block with one row per feature row
    pub fn with_outputs(mut self, outputs: OutputBlock) -> Result<Self> {
        if outputs.values.nrows() != self.features.nrows() {
            return Err(Error::ShapeMismatch(format!(
                "{} output rows for {} feature rows",
                outputs.values.nrows(),
                self.features.nrows()
            )));
        }
        self.outputs = Some(outputs);
        Ok(self)
    }

    /// Feature column descriptions
    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    /// Feature matrix
    pub fn features(&self) -> &Array2<f64> {
        &self.features
    }

    /// Output block, if outputs were selected
    pub fn outputs(&self) -> Option<&OutputBlock> {
        self.outputs.as_ref()
    }

    /// Number of rows
    pub fn num_rows(&self) -> usize {
        self.features.nrows()
    }

    /// Number of feature columns
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Check if the dataset has no rows
    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    /// Positions of feature columns that originate from the given source column
    pub fn positions_of(&self, source_index: usize) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, column)| column.source_index == source_index)
            .map(|(position, _)| position)
            .collect()
    }

    /// Decompose into columns, features and outputs
    pub fn into_parts(self) -> (Vec<ColumnInfo>, Array2<f64>, Option<OutputBlock>) {
        (self.columns, self.features, self.outputs)
    }

    /// New dataset holding the given rows, in order; features and outputs stay aligned
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        Self {
            columns: self.columns.clone(),
            features: self.features.select(Axis(0), indices),
            outputs: self.outputs.as_ref().map(|block| OutputBlock {
                columns: block.columns.clone(),
                values: block.values.select(Axis(0), indices),
            }),
        }
    }

    /// New dataset holding rows `start..end`
    pub fn slice_rows(&self, start: usize, end: usize) -> Self {
        let end = end.min(self.num_rows());
        let start = start.min(end);
        Self {
            columns: self.columns.clone(),
            features: self.features.slice(s![start..end, ..]).to_owned(),
            outputs: self.outputs.as_ref().map(|block| OutputBlock {
                columns: block.columns.clone(),
                values: block.values.slice(s![start..end, ..]).to_owned(),
            }),
        }
    }

    /// Rows of `self` followed by rows of `other`
    ///
    /// Column descriptions are taken from `self`; `other` must already be
    /// encoded against them.
    pub fn append_rows(&self, other: &Self) -> Result<Self> {
        if self.num_columns() != other.num_columns() {
            return Err(Error::ShapeMismatch(format!(
                "cannot append {} columns to {} columns",
                other.num_columns(),
                self.num_columns()
            )));
        }
        let features = concatenate(Axis(0), &[self.features.view(), other.features.view()])
            .map_err(|e| Error::ShapeMismatch(e.to_string()))?;
        let outputs = match (&self.outputs, &other.outputs) {
            (None, None) => None,
            (Some(left), Some(right)) => {
                let values = concatenate(Axis(0), &[left.values.view(), right.values.view()])
                    .map_err(|e| Error::ShapeMismatch(e.to_string()))?;
                Some(OutputBlock {
                    columns: left.columns.clone(),
                    values,
                })
            }
            _ => {
                return Err(Error::ShapeMismatch(
                    "only one of the datasets has outputs".to_string(),
                ))
            }
        };
        Ok(Self {
            columns: self.columns.clone(),
            features,
            outputs,
        })
    }
}

/// One step of a timeseries sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timestep {
    /// Input values
    pub inputs: Vec<f64>,

    /// Output values, empty for input-only data
    pub outputs: Vec<f64>,
}

impl Timestep {
    /// Create a new timestep
    pub fn new(inputs: Vec<f64>, outputs: Vec<f64>) -> Self {
        Self { inputs, outputs }
    }
}

/// A variable-length sequence of timesteps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Timesteps in order
    pub timesteps: Vec<Timestep>,
}

impl Sample {
    /// Create a new sample
    pub fn new(timesteps: Vec<Timestep>) -> Self {
        Self { timesteps }
    }

    /// Number of timesteps
    pub fn len(&self) -> usize {
        self.timesteps.len()
    }

    /// Check if the sample has no timesteps
    pub fn is_empty(&self) -> bool {
        self.timesteps.is_empty()
    }
}

/// Dataset of multi-timestep samples with a fixed input/output split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeseriesDataset {
    /// Samples in order
    samples: Vec<Sample>,

    /// Inputs per timestep
    input_size: usize,

    /// Outputs per timestep
    output_size: usize,

    /// Whether every input is exactly 0 or 1
    binary_input: bool,

    /// Whether every output is exactly 0 or 1
    binary_output: bool,
}

impl TimeseriesDataset {
    /// Create a new dataset, checking every timestep against the declared sizes
    pub fn new(samples: Vec<Sample>, input_size: usize, output_size: usize) -> Result<Self> {
        for (index, sample) in samples.iter().enumerate() {
            for step in &sample.timesteps {
                if step.inputs.len() != input_size || step.outputs.len() != output_size {
                    return Err(Error::ShapeMismatch(format!(
                        "sample {} has a timestep with {} inputs and {} outputs, expected {} and {}",
                        index,
                        step.inputs.len(),
                        step.outputs.len(),
                        input_size,
                        output_size
                    )));
                }
            }
        }
        let binary_input = all_binary(samples.iter().flat_map(|s| &s.timesteps).flat_map(|t| &t.inputs));
        let binary_output = all_binary(samples.iter().flat_map(|s| &s.timesteps).flat_map(|t| &t.outputs));
        Ok(Self {
            samples,
            input_size,
            output_size,
            binary_input,
            binary_output,
        })
    }

    /// Samples in order
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Number of samples
    pub fn num_samples(&self) -> usize {
        self.samples.len()
    }

    /// Check if the dataset has no samples
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Inputs per timestep
    pub fn input_size(&self) -> usize {
        self.input_size
    }

    /// Outputs per timestep
    pub fn output_size(&self) -> usize {
        self.output_size
    }

    /// Whether every input is exactly 0 or 1
    pub fn binary_input(&self) -> bool {
        self.binary_input
    }

    /// Whether every output is exactly 0 or 1
    pub fn binary_output(&self) -> bool {
        self.binary_output
    }

    /// Iterate over every timestep of every sample
    pub fn timesteps(&self) -> impl Iterator<Item = &Timestep> {
        self.samples.iter().flat_map(|sample| &sample.timesteps)
    }

    /// Decompose into samples
    pub fn into_samples(self) -> Vec<Sample> {
        self.samples
    }

    /// New dataset holding the given samples, in order
    pub fn select_samples(&self, indices: &[usize]) -> Self {
        Self {
            samples: indices.iter().map(|&i| self.samples[i].clone()).collect(),
            ..self.clone_shape()
        }
    }

    /// New dataset holding samples `start..end`
    pub fn slice_samples(&self, start: usize, end: usize) -> Self {
        let end = end.min(self.samples.len());
        let start = start.min(end);
        Self {
            samples: self.samples[start..end].to_vec(),
            ..self.clone_shape()
        }
    }

    /// Samples of `self` followed by samples of `other`
    pub fn append_samples(&self, other: &Self) -> Result<Self> {
        if self.input_size != other.input_size || self.output_size != other.output_size {
            return Err(Error::ShapeMismatch(format!(
                "cannot append {}/{} timesteps to {}/{} timesteps",
                other.input_size, other.output_size, self.input_size, self.output_size
            )));
        }
        let mut samples = self.samples.clone();
        samples.extend(other.samples.iter().cloned());
        Ok(Self {
            samples,
            input_size: self.input_size,
            output_size: self.output_size,
            binary_input: self.binary_input && other.binary_input,
            binary_output: self.binary_output && other.binary_output,
        })
    }

    fn clone_shape(&self) -> Self {
        Self {
            samples: Vec::new(),
            input_size: self.input_size,
            output_size: self.output_size,
            binary_input: self.binary_input,
            binary_output: self.binary_output,
        }
    }
}

/// True iff there is at least one value and every value is exactly 0 or 1
pub fn all_binary<'a>(values: impl IntoIterator<Item = &'a f64>) -> bool {
    let mut seen = false;
    for &value in values {
        if value != 0.0 && value != 1.0 {
            return false;
        }
        seen = true;
    }
    seen
}

/// A parsed dataset of either kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Dataset {
    /// Tabular data
    Tabular(TabularDataset),
    /// Timeseries data
    Timeseries(TimeseriesDataset),
}

impl Dataset {
    /// Data type of this dataset
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Tabular(_) => DataType::General,
            Self::Timeseries(_) => DataType::Timeseries,
        }
    }

    /// Number of rows or samples
    pub fn num_rows(&self) -> usize {
        match self {
            Self::Tabular(data) => data.num_rows(),
            Self::Timeseries(data) => data.num_samples(),
        }
    }

    /// Tabular view, if this is tabular data
    pub fn as_tabular(&self) -> Option<&TabularDataset> {
        match self {
            Self::Tabular(data) => Some(data),
            Self::Timeseries(_) => None,
        }
    }

    /// Timeseries view, if this is timeseries data
    pub fn as_timeseries(&self) -> Option<&TimeseriesDataset> {
        match self {
            Self::Timeseries(data) => Some(data),
            Self::Tabular(_) => None,
        }
    }
}

impl From<TabularDataset> for Dataset {
    fn from(data: TabularDataset) -> Self {
        Self::Tabular(data)
    }
}

impl From<TimeseriesDataset> for Dataset {
    fn from(data: TimeseriesDataset) -> Self {
        Self::Timeseries(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::ColumnType;
    use ndarray::array;

    fn tabular() -> TabularDataset {
        let columns = vec![
            ColumnInfo::new("a", 0, ColumnType::Integer),
            ColumnInfo::new("b", 1, ColumnType::Float),
        ];
        let outputs = OutputBlock::new(
            vec![ColumnInfo::new("y", 2, ColumnType::Integer)],
            array![[0.0], [1.0], [2.0]],
        )
        .unwrap();
        TabularDataset::new(columns, array![[1.0, 0.5], [2.0, 1.5], [3.0, 2.5]])
            .unwrap()
            .with_outputs(outputs)
            .unwrap()
    }

    #[test]
    fn test_select_rows_keeps_outputs_aligned() {
        let data = tabular();
        let picked = data.select_rows(&[2, 0]);
        assert_eq!(picked.features(), &array![[3.0, 2.5], [1.0, 0.5]]);
        assert_eq!(picked.outputs().unwrap().values, array![[2.0], [0.0]]);
    }

    #[test]
    fn test_slice_and_append() {
        let data = tabular();
        let head = data.slice_rows(0, 1);
        let tail = data.slice_rows(1, 10);
        assert_eq!(head.num_rows(), 1);
        assert_eq!(tail.num_rows(), 2);
        assert_eq!(head.append_rows(&tail).unwrap(), data);
    }

    #[test]
    fn test_shape_checks() {
        let columns = vec![ColumnInfo::new("a", 0, ColumnType::Integer)];
        let err = TabularDataset::new(columns, array![[1.0, 2.0]]).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ShapeMismatch);

        let samples = vec![Sample::new(vec![Timestep::new(vec![1.0], vec![])])];
        assert!(TimeseriesDataset::new(samples, 2, 0).is_err());
    }

    #[test]
    fn test_binary_flags() {
        let samples = vec![Sample::new(vec![
            Timestep::new(vec![0.0, 1.0], vec![1.0]),
            Timestep::new(vec![1.0, 0.5], vec![0.0]),
        ])];
        let data = TimeseriesDataset::new(samples, 2, 1).unwrap();
        assert!(!data.binary_input());
        assert!(data.binary_output());

        let no_outputs = TimeseriesDataset::new(
            vec![Sample::new(vec![Timestep::new(vec![1.0], vec![])])],
            1,
            0,
        )
        .unwrap();
        assert!(!no_outputs.binary_output());
    }
}
