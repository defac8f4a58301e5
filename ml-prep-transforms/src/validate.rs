//! Filter list validation
//!
//! Checks run in a fixed order and stop at the first failure: record shape
//! and names, parameter decoding, stage ordering, data-type support, then
//! stage-specific checks against the source metadata and the catalog.
//! Nothing here touches dataset rows.

use std::collections::{BTreeSet, HashSet};

use serde_json::Value;

use ml_prep_core::metadata::{ColumnSummary, TabularMetadata};
use ml_prep_core::{ColumnType, DatasetMetadata, FilterValidationError};

use crate::catalog::{DatasetCatalog, DatasetId};
use crate::filter::{FilterKind, FilterStage, MergeParams, SplitParams};

/// Most datasets a single `merge` may append
pub const MAX_MERGE_DATASETS: usize = 10;

type ValidationResult<T> = std::result::Result<T, FilterValidationError>;

/// Validates a JSON filter list against a source dataset
pub struct FilterValidator<'a> {
    source: &'a DatasetMetadata,
    source_id: Option<DatasetId>,
    catalog: &'a dyn DatasetCatalog,
}

impl<'a> FilterValidator<'a> {
    /// Create a validator for the given source dataset
    pub fn new(
        source: &'a DatasetMetadata,
        source_id: Option<DatasetId>,
        catalog: &'a dyn DatasetCatalog,
    ) -> Self {
        Self {
            source,
            source_id,
            catalog,
        }
    }

    /// Validate a filter list and decode it into stages
    pub fn validate(&self, spec: &Value) -> ValidationResult<Vec<FilterStage>> {
        let records = spec.as_array().ok_or_else(|| {
            FilterValidationError::InvalidFormat("filters must be a list".to_string())
        })?;

        let mut kinds = Vec::with_capacity(records.len());
        let mut seen = HashSet::new();
        for record in records {
            let object = record.as_object().ok_or_else(|| {
                FilterValidationError::InvalidFormat("each filter must be an object".to_string())
            })?;
            let name = object
                .get("name")
                .and_then(Value::as_str)
                .ok_or(FilterValidationError::MissingName)?;
            let kind = FilterKind::from_name(name)
                .ok_or_else(|| FilterValidationError::UnknownFilter(name.to_string()))?;
            if !seen.insert(kind) {
                return Err(FilterValidationError::DuplicateFilter(name.to_string()));
            }
            kinds.push((kind, object));
        }

        let stages = kinds
            .into_iter()
            .map(|(kind, object)| FilterStage::decode(kind, object))
            .collect::<ValidationResult<Vec<_>>>()?;

        check_order(&stages)?;

        let data_type = self.source.data_type();
        if let Some(stage) = stages.iter().find(|stage| !stage.kind().supports(data_type)) {
            return Err(FilterValidationError::UnsupportedDataType {
                filter: stage.kind().name().to_string(),
                data_type,
            });
        }

        for stage in &stages {
            self.check_stage(stage, &stages)?;
        }

        tracing::debug!(stages = stages.len(), %data_type, "filter list validated");
        Ok(stages)
    }

    fn check_stage(&self, stage: &FilterStage, stages: &[FilterStage]) -> ValidationResult<()> {
        match stage {
            FilterStage::Split(params) => check_split(*params),
            FilterStage::Merge(params) => self.check_merge(params),
            FilterStage::Ignore(params) => {
                let meta = self.tabular(FilterKind::Ignore)?;
                check_columns_exist(FilterKind::Ignore, &params.columns, meta)?;
                let ignored: BTreeSet<usize> = params.columns.iter().copied().collect();
                if ignored.len() >= meta.num_columns {
                    return Err(FilterValidationError::invalid_parameters(
                        "ignore",
                        "You can't ignore all columns",
                    ));
                }
                Ok(())
            }
            FilterStage::Outputs(params) => {
                let meta = self.tabular(FilterKind::Outputs)?;
                check_columns_exist(FilterKind::Outputs, &params.columns, meta)?;
                check_outputs(&params.columns, ignored_columns(stages), meta)
            }
            FilterStage::Permute(params) => {
                let meta = self.tabular(FilterKind::Permute)?;
                check_columns_exist(FilterKind::Permute, &params.columns, meta)?;
                check_permute(&params.columns, stages, meta)
            }
            FilterStage::Normalize | FilterStage::Shuffle | FilterStage::Binarize | FilterStage::Balance(_) => {
                Ok(())
            }
        }
    }

    fn tabular(&self, kind: FilterKind) -> ValidationResult<&TabularMetadata> {
        self.source
            .tabular()
            .ok_or_else(|| FilterValidationError::UnsupportedDataType {
                filter: kind.name().to_string(),
                data_type: self.source.data_type(),
            })
    }

    fn check_merge(&self, params: &MergeParams) -> ValidationResult<()> {
        let invalid = |message: String| FilterValidationError::invalid_parameters("merge", message);

        if params.datas.is_empty() {
            return Err(invalid("This field must contain at least one element".to_string()));
        }
        if params.datas.len() > MAX_MERGE_DATASETS {
            return Err(invalid(format!(
                "This field can contain at most {MAX_MERGE_DATASETS} elements"
            )));
        }
        let unique: HashSet<DatasetId> = params.datas.iter().copied().collect();
        let repeats_source = self.source_id.is_some_and(|id| unique.contains(&id));
        if unique.len() != params.datas.len() || repeats_source {
            return Err(invalid("The elements of this field must be unique".to_string()));
        }

        let missing: Vec<String> = params
            .datas
            .iter()
            .filter(|&&id| !self.catalog.contains(id))
            .map(ToString::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(invalid(format!("Elements {} not found", missing.join(", "))));
        }

        let signature = self.source.signature();
        let source_label = self
            .source_id
            .map_or_else(|| "source".to_string(), |id| id.to_string());
        for &id in &params.datas {
            let other = self.catalog.metadata(id).and_then(|meta| meta.signature());
            if signature.is_none() || other != signature {
                return Err(invalid(format!(
                    "data files #{source_label} and #{id} have different structure, merge not possible"
                )));
            }
        }
        Ok(())
    }
}

/// Walk the stages keeping the set of filters still allowed
fn check_order(stages: &[FilterStage]) -> ValidationResult<()> {
    let mut allowed: BTreeSet<FilterKind> = FilterKind::ALL.into_iter().collect();
    let mut applied = BTreeSet::new();
    for stage in stages {
        let kind = stage.kind();
        if !allowed.contains(&kind) {
            return Err(FilterValidationError::InvalidFilterOrder(kind.name().to_string()));
        }
        applied.insert(kind);
        let after: BTreeSet<FilterKind> = kind.allowed_after().iter().copied().collect();
        allowed = allowed
            .intersection(&after)
            .filter(|kind| !applied.contains(kind))
            .copied()
            .collect();
    }
    Ok(())
}

fn check_split(params: SplitParams) -> ValidationResult<()> {
    let invalid = |message: &str| FilterValidationError::invalid_parameters("split", message);
    if params.start > 99 {
        return Err(invalid("start must be between 0 and 99"));
    }
    if params.end == 0 || params.end > 100 {
        return Err(invalid("end must be between 1 and 100"));
    }
    if params.start >= params.end {
        return Err(invalid("start must be less than end"));
    }
    Ok(())
}

fn check_columns_exist(
    kind: FilterKind,
    columns: &[usize],
    meta: &TabularMetadata,
) -> ValidationResult<()> {
    let missing: Vec<String> = columns
        .iter()
        .filter(|&&column| column >= meta.num_columns)
        .map(ToString::to_string)
        .collect();
    if !missing.is_empty() {
        return Err(FilterValidationError::invalid_parameters(
            kind.name(),
            format!("This columns doesn't exist: {}", missing.join(", ")),
        ));
    }
    Ok(())
}

fn ignored_columns(stages: &[FilterStage]) -> &[usize] {
    stages
        .iter()
        .find(|stage| stage.kind() == FilterKind::Ignore)
        .and_then(FilterStage::columns)
        .unwrap_or(&[])
}

fn check_outputs(columns: &[usize], ignored: &[usize], meta: &TabularMetadata) -> ValidationResult<()> {
    let invalid = |message: String| FilterValidationError::invalid_parameters("outputs", message);

    let clashing: Vec<String> = columns
        .iter()
        .filter(|column| ignored.contains(column))
        .map(ToString::to_string)
        .collect();
    if !clashing.is_empty() {
        return Err(invalid(format!(
            "You can't select an ignored columns({}) in output columns filter",
            clashing.join(", ")
        )));
    }

    let types: HashSet<ColumnType> = columns.iter().map(|&c| meta.columns[c].dtype).collect();
    let mixed_numeric = types.len() > 1 && types.contains(&ColumnType::Float);
    if mixed_numeric {
        return Err(invalid(
            "You can't select columns with different types as outputs".to_string(),
        ));
    }

    let inputs_left = (0..meta.num_columns)
        .filter(|c| !columns.contains(c) && !ignored.contains(c))
        .count();
    if inputs_left == 0 {
        return Err(invalid("No input columns left".to_string()));
    }
    Ok(())
}

fn check_permute(columns: &[usize], stages: &[FilterStage], meta: &TabularMetadata) -> ValidationResult<()> {
    let invalid = |message: String| FilterValidationError::invalid_parameters("permute", message);
    let outputs = stages
        .iter()
        .find(|stage| stage.kind() == FilterKind::Outputs)
        .and_then(FilterStage::columns)
        .unwrap_or(&[]);
    let ignored = ignored_columns(stages);

    for &column in columns {
        if ignored.contains(&column) {
            return Err(invalid(format!("Column {column} is ignored")));
        }
        if outputs.contains(&column) {
            return Err(invalid(format!("Column {column} is selected as output")));
        }
        if !is_categorical(&meta.columns[column]) {
            return Err(invalid(format!("Column {column} is not categorical")));
        }
    }
    Ok(())
}

fn is_categorical(summary: &ColumnSummary) -> bool {
    match summary.dtype {
        ColumnType::Text => true,
        ColumnType::Integer => summary.unique.is_some() && !summary.locked,
        ColumnType::Float => false,
    }
}
