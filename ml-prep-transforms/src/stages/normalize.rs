//! Min-max normalization of features
//!
//! Fitting records per-feature ranges; applying them maps each value to
//! `(v - min) / (max - min)` clamped to `[0, 1]`. A constant feature maps to
//! zero. Outputs are never touched.

use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use ml_prep_core::{Error, Result, Sample, TabularDataset, TimeseriesDataset, Timestep};

/// Fitted per-feature ranges
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinMax {
    /// Minimum of each feature
    pub min: Vec<f64>,

    /// Maximum of each feature
    pub max: Vec<f64>,
}

impl MinMax {
    /// Fit ranges over the columns of a matrix
    pub fn fit(matrix: ArrayView2<'_, f64>) -> Self {
        let (min, max) = matrix
            .axis_iter(Axis(1))
            .map(|column| range(column.iter().copied()))
            .unzip();
        Self { min, max }
    }

    /// Fit ranges over every timestep input
    pub fn fit_timeseries(dataset: &TimeseriesDataset) -> Self {
        let (min, max) = (0..dataset.input_size())
            .map(|feature| range(dataset.timesteps().map(|step| step.inputs[feature])))
            .unzip();
        Self { min, max }
    }

    /// Number of features
    pub fn len(&self) -> usize {
        self.min.len()
    }

    /// Check if no features were fitted
    pub fn is_empty(&self) -> bool {
        self.min.is_empty()
    }

    /// Scale one value of a feature
    pub fn scale(&self, feature: usize, value: f64) -> f64 {
        let delta = self.max[feature] - self.min[feature];
        if delta == 0.0 {
            return 0.0;
        }
        ((value - self.min[feature]) / delta).clamp(0.0, 1.0)
    }

    fn check_width(&self, width: usize) -> Result<()> {
        if width != self.len() {
            return Err(Error::filter_execution(
                "normalize",
                format!("fitted {} features but the data has {width}", self.len()),
            ));
        }
        Ok(())
    }

    /// Scale tabular features with these ranges
    pub fn apply_tabular(&self, dataset: &TabularDataset) -> Result<TabularDataset> {
        self.check_width(dataset.num_columns())?;
        let mut features: Array2<f64> = dataset.features().clone();
        for (feature, mut column) in features.axis_iter_mut(Axis(1)).enumerate() {
            column.mapv_inplace(|value| self.scale(feature, value));
        }
        let (columns, _, outputs) = dataset.clone().into_parts();
        let normalized = TabularDataset::new(columns, features)?;
        match outputs {
            Some(outputs) => normalized.with_outputs(outputs),
            None => Ok(normalized),
        }
    }

    /// Scale timeseries inputs with these ranges
    pub fn apply_timeseries(&self, dataset: &TimeseriesDataset) -> Result<TimeseriesDataset> {
        self.check_width(dataset.input_size())?;
        let samples = dataset
            .samples()
            .iter()
            .map(|sample| {
                Sample::new(
                    sample
                        .timesteps
                        .iter()
                        .map(|step| {
                            let inputs = step
                                .inputs
                                .iter()
                                .enumerate()
                                .map(|(feature, &value)| self.scale(feature, value))
                                .collect();
                            Timestep::new(inputs, step.outputs.clone())
                        })
                        .collect(),
                )
            })
            .collect();
        TimeseriesDataset::new(samples, dataset.input_size(), dataset.output_size())
    }
}

/// Fit and apply in one go
pub fn normalize_tabular(dataset: &TabularDataset) -> Result<(TabularDataset, MinMax)> {
    let ranges = MinMax::fit(dataset.features().view());
    Ok((ranges.apply_tabular(dataset)?, ranges))
}

/// Fit and apply in one go
pub fn normalize_timeseries(dataset: &TimeseriesDataset) -> Result<(TimeseriesDataset, MinMax)> {
    let ranges = MinMax::fit_timeseries(dataset);
    Ok((ranges.apply_timeseries(dataset)?, ranges))
}

/// Minimum and maximum, `(0, 0)` for no values
fn range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values
        .fold(None, |acc: Option<(f64, f64)>, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
        .unwrap_or((0.0, 0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ml_prep_core::{ColumnInfo, ColumnType, OutputBlock};
    use ndarray::array;

    #[test]
    fn test_tabular_min_max() {
        let columns = vec![
            ColumnInfo::new("a", 0, ColumnType::Float),
            ColumnInfo::new("b", 1, ColumnType::Integer),
        ];
        let data = TabularDataset::new(columns, array![[1.0, 4.0], [3.0, 4.0], [2.0, 4.0]])
            .unwrap()
            .with_outputs(
                OutputBlock::new(
                    vec![ColumnInfo::new("y", 2, ColumnType::Integer)],
                    array![[7.0], [8.0], [9.0]],
                )
                .unwrap(),
            )
            .unwrap();

        let (normalized, ranges) = normalize_tabular(&data).unwrap();
        assert_eq!(ranges.min, vec![1.0, 4.0]);
        assert_eq!(ranges.max, vec![3.0, 4.0]);
        assert_eq!(normalized.features(), &array![[0.0, 0.0], [1.0, 0.0], [0.5, 0.0]]);
        assert_eq!(normalized.outputs().unwrap().values, array![[7.0], [8.0], [9.0]]);
    }

    #[test]
    fn test_replayed_ranges_clamp() {
        let ranges = MinMax {
            min: vec![0.0],
            max: vec![10.0],
        };
        assert_eq!(ranges.scale(0, -5.0), 0.0);
        assert_eq!(ranges.scale(0, 5.0), 0.5);
        assert_eq!(ranges.scale(0, 50.0), 1.0);
    }

    #[test]
    fn test_timeseries_inputs_only() {
        let samples = vec![
            Sample::new(vec![Timestep::new(vec![2.0, 1.0], vec![3.0])]),
            Sample::new(vec![
                Timestep::new(vec![4.0, 1.0], vec![5.0]),
                Timestep::new(vec![6.0, 1.0], vec![6.0]),
            ]),
        ];
        let data = TimeseriesDataset::new(samples, 2, 1).unwrap();
        let (normalized, ranges) = normalize_timeseries(&data).unwrap();
        assert_eq!(ranges.min, vec![2.0, 1.0]);
        assert_eq!(normalized.samples()[1].timesteps[0].inputs, vec![0.5, 0.0]);
        assert_eq!(normalized.samples()[1].timesteps[1].outputs, vec![6.0]);
    }

    #[test]
    fn test_width_mismatch() {
        let ranges = MinMax {
            min: vec![0.0],
            max: vec![1.0],
        };
        let data = TabularDataset::new(Vec::new(), Array2::zeros((2, 0))).unwrap();
        assert!(ranges.apply_tabular(&data).is_err());
    }
}
