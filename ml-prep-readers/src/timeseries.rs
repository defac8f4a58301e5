//! Timeseries text parsing
//!
//! Each non-empty line is one sample: `;`-separated timesteps, each of the
//! form `inputs` or `inputs|outputs` with comma-separated numbers. The first
//! timestep of the file fixes how many inputs and outputs every timestep has.

use std::collections::BTreeMap;

use ml_prep_core::metadata::{MetadataDetails, TimeseriesMetadata};
use ml_prep_core::notify::{plural, ProgressThrottle};
use ml_prep_core::{DatasetMetadata, Error, Notifier, Result, Sample, TimeseriesDataset, Timestep};

use crate::common::ReaderOptions;
use crate::source::RawSource;
use crate::tokenizer::parse_number;

/// Parses timeseries text into a [`TimeseriesDataset`] and its metadata
#[derive(Debug, Clone, Default)]
pub struct TimeseriesParser {
    options: ReaderOptions,
}

/// Running profile of the parsed samples
#[derive(Debug)]
struct Profile {
    dims: Option<(usize, usize)>,
    empty_rows: usize,
    min_timesteps: usize,
    max_timesteps: usize,
    one_hot: bool,
    classes: BTreeMap<String, u64>,
}

impl Profile {
    fn new() -> Self {
        Self {
            dims: None,
            empty_rows: 0,
            min_timesteps: usize::MAX,
            max_timesteps: 0,
            one_hot: true,
            classes: BTreeMap::new(),
        }
    }

    fn observe_outputs(&mut self, outputs: &[f64]) {
        if !self.one_hot {
            return;
        }
        let ones: Vec<usize> = outputs
            .iter()
            .enumerate()
            .filter(|(_, v)| **v == 1.0)
            .map(|(i, _)| i)
            .collect();
        let rest_zero = outputs.iter().all(|&v| v == 0.0 || v == 1.0);
        match ones.as_slice() {
            [class] if rest_zero => *self.classes.entry(class.to_string()).or_insert(0) += 1,
            _ => {
                self.one_hot = false;
                self.classes.clear();
            }
        }
    }
}

impl TimeseriesParser {
    /// Create a new timeseries parser
    pub fn new(options: ReaderOptions) -> Self {
        Self { options }
    }

    /// Parse a whole source, stopping at the first malformed line
    pub fn parse(
        &self,
        source: &RawSource,
        notifier: &dyn Notifier,
    ) -> Result<(TimeseriesDataset, DatasetMetadata)> {
        let mut profile = Profile::new();
        let mut samples = Vec::new();
        let mut throttle = ProgressThrottle::new(self.options.progress_interval());

        for (index, line) in source.lines().iter().enumerate() {
            let line_number = index + 1;
            throttle.lines_parsed(notifier, line_number);

            let cleaned: String = line
                .chars()
                .filter(|c| !matches!(c, ' ' | '\t' | '\r'))
                .collect();
            if cleaned.is_empty() {
                profile.empty_rows += 1;
                continue;
            }

            let sample = match parse_line(&cleaned, line_number, &mut profile, notifier) {
                Ok(sample) => sample,
                Err(message) => {
                    notifier.send(&message);
                    return Err(Error::InvalidTimeseries(message));
                }
            };
            profile.min_timesteps = profile.min_timesteps.min(sample.len());
            profile.max_timesteps = profile.max_timesteps.max(sample.len());
            samples.push(sample);
        }

        let Some((input_size, output_size)) = profile.dims else {
            let message = "File contains no data.";
            notifier.send(message);
            return Err(Error::InvalidTimeseries(message.to_string()));
        };

        notifier.send(&format!("Found {}.", plural(samples.len(), "sample")));
        let dataset = TimeseriesDataset::new(samples, input_size, output_size)?;
        let classes = if profile.one_hot && output_size > 0 {
            profile.classes
        } else {
            BTreeMap::new()
        };
        let metadata = DatasetMetadata::new(MetadataDetails::Timeseries(TimeseriesMetadata {
            data_rows: dataset.num_samples(),
            empty_rows: profile.empty_rows,
            min_timesteps: profile.min_timesteps,
            max_timesteps: profile.max_timesteps,
            input_size,
            output_size,
            binary_input: dataset.binary_input(),
            binary_output: dataset.binary_output(),
            classes,
        }));

        tracing::info!(
            samples = dataset.num_samples(),
            input_size,
            output_size,
            "parsed timeseries dataset"
        );
        Ok((dataset, metadata))
    }
}

/// Parse one cleaned, non-empty line into a sample
fn parse_line(
    line: &str,
    line_number: usize,
    profile: &mut Profile,
    notifier: &dyn Notifier,
) -> std::result::Result<Sample, String> {
    let malformed =
        || format!("Not allowed character or improperly formatted timeseries on line {line_number}.");

    let body = line.strip_suffix(';').unwrap_or(line);
    let mut timesteps = Vec::new();
    for (index, step) in body.split(';').enumerate() {
        let mut parts = step.split('|');
        let inputs = parts.next().and_then(parse_values).ok_or_else(malformed)?;
        let outputs = match parts.next() {
            Some(part) => parse_values(part).ok_or_else(malformed)?,
            None => Vec::new(),
        };
        if parts.next().is_some() {
            return Err(malformed());
        }

        match profile.dims {
            None => {
                notifier.send(&format!(
                    "First timestep has {} inputs and {} outputs. Applying this requirement to the entire file.",
                    inputs.len(),
                    outputs.len()
                ));
                profile.dims = Some((inputs.len(), outputs.len()));
            }
            Some((input_size, output_size))
                if inputs.len() != input_size || outputs.len() != output_size =>
            {
                return Err(format!(
                    "Oops! Timestep {} on line {} has {} inputs and {} outputs.",
                    index + 1,
                    line_number,
                    inputs.len(),
                    outputs.len()
                ));
            }
            Some(_) => {}
        }

        profile.observe_outputs(&outputs);
        timesteps.push(Timestep::new(inputs, outputs));
    }
    Ok(Sample::new(timesteps))
}

/// Comma-separated numbers; any empty or non-numeric item fails the whole list
fn parse_values(part: &str) -> Option<Vec<f64>> {
    part.split(',').map(parse_number).collect()
}
