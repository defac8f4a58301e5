//! Filter pipeline execution
//!
//! A [`FilterPipeline`] is built from an already validated stage list and
//! runs it left to right. Each stage builds a new dataset; the first failure
//! aborts the run and no partial result is returned.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use ml_prep_core::{Dataset, DatasetMetadata, Error, Result, TabularDataset, TimeseriesDataset};
use ml_prep_shuffle::Seed;

use crate::catalog::{DatasetCatalog, DatasetId};
use crate::filter::{FilterKind, FilterStage};
use crate::quantize::{Quantiles, Quantizer};
use crate::stages::normalize::{normalize_tabular, normalize_timeseries, MinMax};
use crate::stages::{balance, columns, merge, rows};
use crate::validate::FilterValidator;

/// Pipeline configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Seed for shuffle and balance; a fresh entropy seed is drawn when unset
    pub seed: Option<u64>,
}

/// Statistics about a pipeline run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Number of stages executed
    pub stages_applied: usize,

    /// Rows or samples before the first stage
    pub rows_in: usize,

    /// Rows or samples after the last stage
    pub rows_out: usize,

    /// Seed actually used
    pub seed: u64,

    /// Total execution time
    pub execution_time: Duration,
}

/// Result of a pipeline run
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Transformed dataset
    pub dataset: Dataset,

    /// Quantizer state when `binarize` ran
    pub quantiles: Option<Quantiles>,

    /// Fitted ranges when `normalize` ran
    pub normalization: Option<MinMax>,

    /// Run statistics
    pub stats: PipelineStats,
}

/// Column transformation recorded so merged datasets can replay it
#[derive(Debug, Clone)]
enum AppliedTransform {
    Ignore(Vec<usize>),
    Outputs(Vec<usize>),
    Permute(Vec<usize>),
    Normalize(MinMax),
    Binarize(Quantiles),
}

/// An ordered list of validated filter stages
#[derive(Debug, Clone, Default)]
pub struct FilterPipeline {
    stages: Vec<FilterStage>,
    config: PipelineConfig,
}

impl FilterPipeline {
    /// Create a pipeline from stages that already passed validation
    pub fn new(stages: Vec<FilterStage>, config: PipelineConfig) -> Self {
        Self { stages, config }
    }

    /// Validate a JSON filter list against the source and build a pipeline
    pub fn from_spec(
        spec: &Value,
        source: &DatasetMetadata,
        source_id: Option<DatasetId>,
        catalog: &dyn DatasetCatalog,
        config: PipelineConfig,
    ) -> Result<Self> {
        let stages = FilterValidator::new(source, source_id, catalog).validate(spec)?;
        Ok(Self::new(stages, config))
    }

    /// Stages in execution order
    pub fn stages(&self) -> &[FilterStage] {
        &self.stages
    }

    /// Pipeline configuration
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage over a freshly parsed dataset
    pub fn run(&self, dataset: &Dataset, catalog: &dyn DatasetCatalog) -> Result<PipelineOutput> {
        let started = Instant::now();
        let seed = Seed::or_entropy(self.config.seed);
        let mut run = Run {
            source: dataset,
            catalog,
            seed,
            applied: Vec::new(),
        };

        let mut current = dataset.clone();
        for stage in &self.stages {
            let kind = stage.kind();
            let before = current.num_rows();
            current = run
                .apply(stage, &current)
                .map_err(|err| into_stage_error(kind, err))?;
            tracing::debug!(
                stage = kind.name(),
                before,
                after = current.num_rows(),
                "applied filter"
            );
        }

        let mut quantiles = None;
        let mut normalization = None;
        for transform in run.applied {
            match transform {
                AppliedTransform::Binarize(q) => quantiles = Some(q),
                AppliedTransform::Normalize(ranges) => normalization = Some(ranges),
                _ => {}
            }
        }

        let stats = PipelineStats {
            stages_applied: self.stages.len(),
            rows_in: dataset.num_rows(),
            rows_out: current.num_rows(),
            seed: seed.value(),
            execution_time: started.elapsed(),
        };
        tracing::info!(
            stages = stats.stages_applied,
            rows_in = stats.rows_in,
            rows_out = stats.rows_out,
            "filter pipeline finished"
        );
        Ok(PipelineOutput {
            dataset: current,
            quantiles,
            normalization,
            stats,
        })
    }
}

/// Mutable state of one pipeline run
struct Run<'a> {
    source: &'a Dataset,
    catalog: &'a dyn DatasetCatalog,
    seed: Seed,
    applied: Vec<AppliedTransform>,
}

impl Run<'_> {
    fn apply(&mut self, stage: &FilterStage, current: &Dataset) -> Result<Dataset> {
        let kind = stage.kind();
        let dataset = match (stage, current) {
            (FilterStage::Ignore(params), Dataset::Tabular(data)) => {
                self.applied.push(AppliedTransform::Ignore(params.columns.clone()));
                columns::ignore(data, &params.columns)?.into()
            }
            (FilterStage::Outputs(params), Dataset::Tabular(data)) => {
                self.applied.push(AppliedTransform::Outputs(params.columns.clone()));
                columns::select_outputs(data, &params.columns)?.into()
            }
            (FilterStage::Permute(params), Dataset::Tabular(data)) => {
                self.applied.push(AppliedTransform::Permute(params.columns.clone()));
                columns::permute(data, &params.columns)?.into()
            }
            (FilterStage::Normalize, Dataset::Tabular(data)) => {
                let (normalized, ranges) = normalize_tabular(data)?;
                self.applied.push(AppliedTransform::Normalize(ranges));
                normalized.into()
            }
            (FilterStage::Normalize, Dataset::Timeseries(data)) => {
                let (normalized, ranges) = normalize_timeseries(data)?;
                self.applied.push(AppliedTransform::Normalize(ranges));
                normalized.into()
            }
            (FilterStage::Binarize, Dataset::Timeseries(data)) => {
                let (coded, quantiles) = Quantizer::fit_apply(data)?;
                self.applied.push(AppliedTransform::Binarize(quantiles));
                coded.into()
            }
            (FilterStage::Balance(params), Dataset::Tabular(data)) => {
                let mut rng = self.seed.derive("balance").to_rng();
                balance::balance(data, params.sample, &mut rng)?.into()
            }
            (FilterStage::Shuffle, _) => {
                let mut rng = self.seed.derive("shuffle").to_rng();
                rows::shuffle(current, &mut rng)
            }
            (FilterStage::Split(params), _) => rows::split(current, *params),
            (FilterStage::Merge(params), _) => {
                let mut merged = current.clone();
                for &id in &params.datas {
                    let other = self.replayed(id)?;
                    merged = append(&merged, &other)?;
                }
                merged
            }
            (_, data) => {
                return Err(Error::filter_execution(
                    kind.name(),
                    format!("not supported for {} data", data.data_type()),
                ))
            }
        };
        Ok(dataset)
    }

    /// Load a dataset to merge and bring it to the source's current encoding
    fn replayed(&self, id: DatasetId) -> Result<Dataset> {
        match (self.catalog.load(id)?, self.source) {
            (Dataset::Tabular(other), Dataset::Tabular(source)) => {
                let aligned = merge::align_to(&other, source)?;
                Ok(self.replay_tabular(aligned)?.into())
            }
            (Dataset::Timeseries(other), Dataset::Timeseries(_)) => {
                Ok(self.replay_timeseries(other)?.into())
            }
            (other, source) => Err(Error::filter_execution(
                "merge",
                format!(
                    "dataset #{id} holds {} data but the source holds {} data",
                    other.data_type(),
                    source.data_type()
                ),
            )),
        }
    }

    fn replay_tabular(&self, mut data: TabularDataset) -> Result<TabularDataset> {
        for transform in &self.applied {
            data = match transform {
                AppliedTransform::Ignore(cols) => columns::ignore(&data, cols)?,
                AppliedTransform::Outputs(cols) => columns::select_outputs(&data, cols)?,
                AppliedTransform::Permute(cols) => columns::permute(&data, cols)?,
                AppliedTransform::Normalize(ranges) => ranges.apply_tabular(&data)?,
                AppliedTransform::Binarize(_) => data,
            };
        }
        Ok(data)
    }

    fn replay_timeseries(&self, mut data: TimeseriesDataset) -> Result<TimeseriesDataset> {
        for transform in &self.applied {
            data = match transform {
                AppliedTransform::Normalize(ranges) => ranges.apply_timeseries(&data)?,
                AppliedTransform::Binarize(quantiles) => Quantizer::apply(&data, quantiles)?,
                _ => data,
            };
        }
        Ok(data)
    }
}

fn append(left: &Dataset, right: &Dataset) -> Result<Dataset> {
    match (left, right) {
        (Dataset::Tabular(a), Dataset::Tabular(b)) => Ok(a.append_rows(b)?.into()),
        (Dataset::Timeseries(a), Dataset::Timeseries(b)) => Ok(a.append_samples(b)?.into()),
        _ => Err(Error::filter_execution("merge", "datasets of different types")),
    }
}

/// Attribute any failure to the stage that raised it
fn into_stage_error(kind: FilterKind, err: Error) -> Error {
    match err {
        Error::FilterExecution { .. } => err,
        other => Error::filter_execution(kind.name(), other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::filter::{BalanceParams, ColumnsParams, MergeParams, SplitParams};
    use crate::stages::balance::BalanceStrategy;
    use ml_prep_core::metadata::{MetadataDetails, TimeseriesMetadata};
    use ml_prep_core::{ClassTable, ColumnInfo, ColumnType, ErrorKind, Sample, Timestep};
    use ndarray::array;
    use std::collections::BTreeMap;

    fn fruit(labels: &[&str], rows: ndarray::Array2<f64>) -> TabularDataset {
        let mut classes = ClassTable::new(10);
        for label in labels {
            classes.get_or_insert(label);
        }
        TabularDataset::new(
            vec![
                ColumnInfo::new("weight", 0, ColumnType::Float),
                ColumnInfo::new("fruit", 1, ColumnType::Text).with_classes(classes),
                ColumnInfo::new("ripe", 2, ColumnType::Integer),
            ],
            rows,
        )
        .unwrap()
    }

    fn series(values: &[f64]) -> TimeseriesDataset {
        let samples = values
            .iter()
            .map(|&v| Sample::new(vec![Timestep::new(vec![v], vec![])]))
            .collect();
        TimeseriesDataset::new(samples, 1, 0).unwrap()
    }

    fn series_meta() -> DatasetMetadata {
        DatasetMetadata::new(MetadataDetails::Timeseries(TimeseriesMetadata {
            data_rows: 1,
            empty_rows: 0,
            min_timesteps: 1,
            max_timesteps: 1,
            input_size: 1,
            output_size: 0,
            binary_input: false,
            binary_output: false,
            classes: BTreeMap::new(),
        }))
    }

    fn pipeline(stages: Vec<FilterStage>) -> FilterPipeline {
        FilterPipeline::new(stages, PipelineConfig { seed: Some(42) })
    }

    #[test]
    fn test_tabular_merge_replays_column_transforms() {
        let source = fruit(&["apple", "pear"], array![[100.0, 0.0, 1.0], [300.0, 1.0, 0.0]]);
        let other = fruit(&["pear", "plum"], array![[200.0, 0.0, 1.0], [500.0, 1.0, 1.0]]);
        let mut catalog = InMemoryCatalog::new();
        catalog.insert(2, other, series_meta());

        let output = pipeline(vec![
            FilterStage::Outputs(ColumnsParams { columns: vec![2] }),
            FilterStage::Permute(ColumnsParams { columns: vec![1] }),
            FilterStage::Normalize,
            FilterStage::Merge(MergeParams { datas: vec![2] }),
        ])
        .run(&source.into(), &catalog)
        .unwrap();

        let data = output.dataset.as_tabular().unwrap();
        assert_eq!(data.num_rows(), 4);
        // weight, fruit=apple, fruit=pear; plum is unknown to the source and the
        // merged weights reuse the source range [100, 300]
        assert_eq!(
            data.features(),
            &array![
                [0.0, 1.0, 0.0],
                [1.0, 0.0, 1.0],
                [0.5, 0.0, 1.0],
                [1.0, 0.0, 0.0],
            ]
        );
        assert_eq!(
            data.outputs().unwrap().values.column(0).to_vec(),
            vec![1.0, 0.0, 1.0, 1.0]
        );
        assert_eq!(output.normalization.unwrap().max, vec![300.0, 1.0, 1.0]);
        assert_eq!(output.stats.rows_in, 2);
        assert_eq!(output.stats.rows_out, 4);
    }

    #[test]
    fn test_timeseries_merge_reuses_quantiles() {
        let mut catalog = InMemoryCatalog::new();
        catalog.insert(2, series(&[100.0]), series_meta());
        let output = pipeline(vec![
            FilterStage::Binarize,
            FilterStage::Merge(MergeParams { datas: vec![2] }),
        ])
        .run(&series(&[1.0, 2.0, 3.0, 4.0, 5.0]).into(), &catalog)
        .unwrap();

        let data = output.dataset.as_timeseries().unwrap();
        assert_eq!(data.num_samples(), 6);
        assert_eq!(data.samples()[5].timesteps[0].inputs, vec![1.0, 1.0, 1.0, 1.0]);
        assert_eq!(output.quantiles.unwrap().breakpoints, vec![vec![2.0, 3.0, 4.0]]);
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let data: Dataset = series(&(0..30).map(f64::from).collect::<Vec<_>>()).into();
        let stages = vec![
            FilterStage::Shuffle,
            FilterStage::Split(SplitParams { start: 0, end: 50 }),
        ];
        let catalog = InMemoryCatalog::new();
        let a = pipeline(stages.clone()).run(&data, &catalog).unwrap();
        let b = pipeline(stages).run(&data, &catalog).unwrap();
        assert_eq!(a.dataset, b.dataset);
        assert_eq!(a.dataset.num_rows(), 15);
        assert_eq!(a.stats.seed, 42);
    }

    #[test]
    fn test_failure_names_stage() {
        let data = fruit(&["apple"], array![[1.0, 0.0, 1.0]]);
        let err = pipeline(vec![FilterStage::Balance(BalanceParams {
            sample: BalanceStrategy::Uniform,
        })])
        .run(&data.into(), &InMemoryCatalog::new())
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FilterExecution);
        assert!(err.to_string().starts_with("filter balance failed"));

        let err = pipeline(vec![FilterStage::Binarize])
            .run(&fruit(&[], array![[1.0, 0.0, 1.0]]).into(), &InMemoryCatalog::new())
            .unwrap_err();
        assert!(err.to_string().contains("not supported for tabular data"));
    }

    #[test]
    fn test_from_spec_validates_first() {
        let spec = serde_json::json!([{"name": "merge", "datas": [1, 1]}]);
        let err = FilterPipeline::from_spec(
            &spec,
            &series_meta(),
            Some(5),
            &InMemoryCatalog::new(),
            PipelineConfig::default(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FilterValidation);
    }

    #[test]
    fn test_config_defaults() {
        let config: PipelineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.seed, None);
    }
}
