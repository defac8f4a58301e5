//! Quantile thermometer coding of timeseries
//!
//! Every input feature is replaced by `K + 1` bits for `K` breakpoints: the
//! first bit is always set and bit `i` is set when the value reaches the
//! `i`-th breakpoint. Outputs become a one-hot code over the distinct output
//! vectors seen while fitting.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use ml_prep_core::{Error, Result, Sample, TimeseriesDataset, Timestep};

/// Percentiles used as breakpoints
pub const QUANTILE_PERCENTS: [f64; 3] = [25.0, 50.0, 75.0];

/// Bits produced per input feature
pub const BITS_PER_FEATURE: usize = QUANTILE_PERCENTS.len() + 1;

/// Fitted quantizer state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quantiles {
    /// Breakpoints of each input feature, ascending
    pub breakpoints: Vec<Vec<f64>>,

    /// Distinct output vectors in sorted order; position is the one-hot index
    pub output_alphabet: Vec<Vec<f64>>,
}

impl Quantiles {
    /// Number of input features
    pub fn input_size(&self) -> usize {
        self.breakpoints.len()
    }

    /// Width of the coded inputs
    pub fn coded_input_size(&self) -> usize {
        self.breakpoints.iter().map(|points| points.len() + 1).sum()
    }
}

/// Linear-interpolation percentile of sorted values
///
/// The rank is `p / 100 * (n - 1)`; an empty slice yields zero.
pub fn percentile(sorted: &[f64], percent: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = (percent / 100.0).clamp(0.0, 1.0) * (n - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            let fraction = rank - lower as f64;
            sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
        }
    }
}

/// Fits and applies thermometer coding
#[derive(Debug, Clone, Copy, Default)]
pub struct Quantizer;

impl Quantizer {
    /// Compute breakpoints and the output alphabet
    pub fn fit(dataset: &TimeseriesDataset) -> Result<Quantiles> {
        if dataset.timesteps().next().is_none() {
            return Err(Error::filter_execution("binarize", "no timesteps to fit"));
        }
        let breakpoints = (0..dataset.input_size())
            .map(|feature| {
                let mut values: Vec<f64> = dataset.timesteps().map(|t| t.inputs[feature]).collect();
                values.sort_by(f64::total_cmp);
                QUANTILE_PERCENTS
                    .iter()
                    .map(|&percent| percentile(&values, percent))
                    .collect()
            })
            .collect();

        let mut output_alphabet: Vec<Vec<f64>> = if dataset.output_size() == 0 {
            Vec::new()
        } else {
            dataset.timesteps().map(|t| t.outputs.clone()).collect()
        };
        output_alphabet.sort_by(|a, b| compare_vectors(a, b));
        output_alphabet.dedup_by(|a, b| compare_vectors(a, b) == Ordering::Equal);

        Ok(Quantiles {
            breakpoints,
            output_alphabet,
        })
    }

    /// Code a dataset with fitted state
    pub fn apply(dataset: &TimeseriesDataset, quantiles: &Quantiles) -> Result<TimeseriesDataset> {
        if dataset.input_size() != quantiles.input_size() {
            return Err(Error::filter_execution(
                "binarize",
                format!(
                    "quantiles fitted for {} inputs but the data has {}",
                    quantiles.input_size(),
                    dataset.input_size()
                ),
            ));
        }
        let output_size = if dataset.output_size() == 0 {
            0
        } else {
            quantiles.output_alphabet.len()
        };

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
                                .zip(&quantiles.breakpoints)
                                .flat_map(|(&value, points)| encode_value(value, points))
                                .collect();
                            let outputs = if output_size == 0 {
                                Vec::new()
                            } else {
                                one_hot(&step.outputs, &quantiles.output_alphabet)
                            };
                            Timestep::new(inputs, outputs)
                        })
                        .collect(),
                )
            })
            .collect();

        TimeseriesDataset::new(samples, quantiles.coded_input_size(), output_size)
            .map_err(|e| Error::filter_execution("binarize", e.to_string()))
    }

    /// Fit on a dataset and code it
    pub fn fit_apply(dataset: &TimeseriesDataset) -> Result<(TimeseriesDataset, Quantiles)> {
        let quantiles = Self::fit(dataset)?;
        Ok((Self::apply(dataset, &quantiles)?, quantiles))
    }
}

/// Thermometer bits of one value; a value equal to a breakpoint sets its bit
pub fn encode_value(value: f64, breakpoints: &[f64]) -> impl Iterator<Item = f64> + '_ {
    std::iter::once(1.0).chain(
        breakpoints
            .iter()
            .map(move |&point| if value >= point { 1.0 } else { 0.0 }),
    )
}

fn one_hot(outputs: &[f64], alphabet: &[Vec<f64>]) -> Vec<f64> {
    let hit = alphabet
        .binary_search_by(|probe| compare_vectors(probe, outputs))
        .ok();
    (0..alphabet.len())
        .map(|index| if Some(index) == hit { 1.0 } else { 0.0 })
        .collect()
}

fn compare_vectors(a: &[f64], b: &[f64]) -> Ordering {
    a.iter()
        .zip(b)
        .map(|(x, y)| x.total_cmp(y))
        .find(|ordering| ordering.is_ne())
        .unwrap_or_else(|| a.len().cmp(&b.len()))
}
