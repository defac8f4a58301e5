//! End-to-end runs: parse text, validate a filter list, run it, batch and store the result

use ml_prep_core::{
    calculate_batch_size, BatchConstructor, BatchOptions, Dataset, DatasetMetadata, Delimiter,
    ErrorKind, NullNotifier, Result, TabularDataset, TimeseriesDataset,
};
use ml_prep_readers::{RawSource, TabularParser, TimeseriesParser};
use ml_prep_transforms::{
    DatasetCatalog, DatasetId, FilterPipeline, InMemoryCatalog, PipelineConfig, PreparedDataset,
};
use serde_json::{json, Value};
use tempfile::NamedTempFile;

const FRUIT: &str = "weight,color,origin,label
1.5,red,north,0
2.5,green,south,1
3.5,red,north,1
4.5,green,south,2
5.5,red,south,1
";

const MORE_FRUIT: &str = "weight,color,origin,label
0.5,green,east,2
9.5,yellow,north,0
";

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn tabular(text: &str) -> (TabularDataset, DatasetMetadata) {
    TabularParser::default()
        .parse(&RawSource::from_text(text), &NullNotifier)
        .unwrap()
}

fn timeseries(text: &str) -> (TimeseriesDataset, DatasetMetadata) {
    TimeseriesParser::default()
        .parse(&RawSource::from_text(text), &NullNotifier)
        .unwrap()
}

fn seeded() -> PipelineConfig {
    PipelineConfig { seed: Some(11) }
}

#[test]
fn header_and_empty_row_are_detected() {
    let (data, meta) = tabular("a,b,c\n\n1,2,3\n5,6,7\n");
    let summary = meta.tabular().unwrap();
    assert_eq!(summary.delimiter, Delimiter::Comma);
    assert!(summary.with_header);
    assert_eq!(summary.data_rows, 2);
    assert_eq!(summary.empty_rows, 1);
    assert_eq!(data.num_rows(), 2);
}

#[test]
fn timeseries_shape_and_binary_flags() {
    let (data, meta) = timeseries("1,2,3|0,1;2,3,4|1,0\n1,2.,3|0,1;2,3,4|1,0");
    let summary = meta.timeseries().unwrap();
    assert_eq!(summary.input_size, 3);
    assert_eq!(summary.output_size, 2);
    assert!(!summary.binary_input);
    assert!(summary.binary_output);
    assert_eq!(data.num_samples(), 2);
}

#[test]
fn batch_size_honours_minimum_batches() {
    assert_eq!(calculate_batch_size(1000, 350, 4), (250, 4));
}

#[test]
fn undersampling_keeps_one_row_per_class() {
    init_tracing();
    let (data, meta) = tabular(FRUIT);
    let catalog = InMemoryCatalog::new();
    let spec = json!([
        {"name": "outputs", "columns": [3]},
        {"name": "balance", "sample": "undersampling"},
    ]);

    let output = FilterPipeline::from_spec(&spec, &meta, Some(1), &catalog, seeded())
        .unwrap()
        .run(&data.into(), &catalog)
        .unwrap();

    let balanced = output.dataset.as_tabular().unwrap();
    let mut labels = balanced.outputs().unwrap().values.column(0).to_vec();
    labels.sort_by(f64::total_cmp);
    assert_eq!(labels, vec![0.0, 1.0, 2.0]);
    assert_eq!(balanced.num_columns(), 3);
}

/// Catalog that fails the test if any dataset is loaded
struct UntouchableCatalog(InMemoryCatalog);

impl DatasetCatalog for UntouchableCatalog {
    fn metadata(&self, id: DatasetId) -> Option<DatasetMetadata> {
        self.0.metadata(id)
    }

    fn load(&self, id: DatasetId) -> Result<Dataset> {
        panic!("dataset #{id} loaded during validation")
    }
}

#[test]
fn duplicate_merge_ids_fail_before_any_rows_are_read() {
    let (_, meta) = tabular(FRUIT);
    let (other, other_meta) = tabular(MORE_FRUIT);
    let mut inner = InMemoryCatalog::new();
    inner.insert(2, other, other_meta);
    let catalog = UntouchableCatalog(inner);

    let spec = json!([{"name": "merge", "datas": [2, 2]}]);
    let err = FilterPipeline::from_spec(&spec, &meta, Some(1), &catalog, seeded()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FilterValidation);
    assert!(err.to_string().contains("The elements of this field must be unique"));
}

#[test]
fn merged_rows_share_the_source_encoding() {
    init_tracing();
    let (data, meta) = tabular(FRUIT);
    let (other, other_meta) = tabular(MORE_FRUIT);
    let mut catalog = InMemoryCatalog::new();
    catalog.insert(2, other, other_meta);

    let spec = json!([
        {"name": "ignore", "columns": ["2"]},
        {"name": "outputs", "columns": [3]},
        {"name": "permute", "columns": [1]},
        {"name": "merge", "datas": [2]},
        {"name": "normalize"},
    ]);
    let output = FilterPipeline::from_spec(&spec, &meta, Some(1), &catalog, seeded())
        .unwrap()
        .run(&data.into(), &catalog)
        .unwrap();

    let merged = output.dataset.as_tabular().unwrap();
    let names: Vec<&str> = merged.columns().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["weight", "color=red", "color=green"]);
    assert_eq!(merged.num_rows(), 7);
    // green is known to the source, yellow is not
    assert_eq!(merged.features().row(5).to_vec(), vec![0.0, 0.0, 1.0]);
    assert_eq!(merged.features().row(6).to_vec(), vec![1.0, 0.0, 0.0]);
    assert_eq!(output.normalization.unwrap().min[0], 0.5);
}

#[test]
fn merge_rejects_different_structure() {
    let (_, meta) = tabular(FRUIT);
    let (other, other_meta) = tabular("a,b\n1,x\n2,y\n");
    let mut catalog = InMemoryCatalog::new();
    catalog.insert(4, other, other_meta);

    let spec = json!([{"name": "merge", "datas": [4]}]);
    let err = FilterPipeline::from_spec(&spec, &meta, Some(1), &catalog, seeded()).unwrap_err();
    assert!(err
        .to_string()
        .contains("data files #1 and #4 have different structure, merge not possible"));
}

#[test]
fn binarized_timeseries_batches_and_snapshot() {
    init_tracing();
    let (data, meta) = timeseries(
        "1,2|0,1;2,3|1,0\n3,4|0,1\n5,6|1,0;7,8|0,1;9,10|0,1\n2,1|1,0;4,3|0,1\n",
    );
    let catalog = InMemoryCatalog::new();
    let spec = json!([
        {"name": "shuffle"},
        {"name": "binarize"},
        {"name": "split", "start": 0, "end": 100},
    ]);
    let output = FilterPipeline::from_spec(&spec, &meta, None, &catalog, seeded())
        .unwrap()
        .run(&data.into(), &catalog)
        .unwrap();

    let coded = output.dataset.as_timeseries().unwrap();
    assert_eq!(coded.input_size(), 8);
    assert_eq!(coded.output_size(), 2);
    assert!(coded.binary_input());
    assert_eq!(output.stats.rows_out, 4);

    let batches = BatchConstructor::new(BatchOptions {
        max_batch_size: 1,
        min_batches: 1,
    })
    .timeseries_batches(coded);
    let lengths: Vec<usize> = batches.iter().map(|b| b.timesteps()).collect();
    assert_eq!(lengths, vec![1, 2, 2, 3]);

    let file = NamedTempFile::new().unwrap();
    let snapshot = PreparedDataset::from(output);
    snapshot.write_to(file.reopen().unwrap()).unwrap();
    let restored = PreparedDataset::read_from(file.reopen().unwrap()).unwrap();
    assert_eq!(restored, snapshot);
    assert!(restored.quantiles.is_some());
}

#[test]
fn invalid_filter_lists_are_rejected() {
    let (_, meta) = tabular(FRUIT);
    let catalog = InMemoryCatalog::new();
    let cases: Vec<(Value, &str)> = vec![
        (json!([{"name": "binarize"}]), "can't be applied to tabular data"),
        (json!([{"name": "split", "start": 80, "end": 20}]), "start must be less than end"),
        (
            json!([{"name": "shuffle"}, {"name": "outputs", "columns": [3]}]),
            "filter outputs can't be applied in this order",
        ),
        (json!([{"name": "permute", "columns": [0]}]), "not categorical"),
    ];
    for (spec, expected) in cases {
        let err = FilterPipeline::from_spec(&spec, &meta, Some(1), &catalog, seeded()).unwrap_err();
        assert!(err.to_string().contains(expected), "{err} should mention {expected}");
    }
}
