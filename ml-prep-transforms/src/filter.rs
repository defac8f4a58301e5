//! Filter vocabulary and stage decoding
//!
//! A filter list arrives as JSON records `{ "name": ..., ...parameters }`.
//! Each record decodes into one [`FilterStage`]; unknown parameters are
//! rejected.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use ml_prep_core::{DataType, FilterValidationError};

use crate::catalog::DatasetId;
use crate::stages::balance::BalanceStrategy;

/// Every filter the pipeline knows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    /// Append other datasets
    Merge,
    /// Min-max scale features
    Normalize,
    /// Randomly permute rows
    Shuffle,
    /// Quantile thermometer coding of timeseries
    Binarize,
    /// Keep a percentage range of rows
    Split,
    /// Resample rows per output class
    Balance,
    /// Drop columns
    Ignore,
    /// One-hot expand categorical columns
    Permute,
    /// Move columns into the output block
    Outputs,
}

impl FilterKind {
    /// All filters
    pub const ALL: [FilterKind; 9] = [
        Self::Merge,
        Self::Normalize,
        Self::Shuffle,
        Self::Binarize,
        Self::Split,
        Self::Balance,
        Self::Ignore,
        Self::Permute,
        Self::Outputs,
    ];

    /// Name used in filter specs
    pub fn name(self) -> &'static str {
        match self {
            Self::Merge => "merge",
            Self::Normalize => "normalize",
            Self::Shuffle => "shuffle",
            Self::Binarize => "binarize",
            Self::Split => "split",
            Self::Balance => "balance",
            Self::Ignore => "ignore",
            Self::Permute => "permute",
            Self::Outputs => "outputs",
        }
    }

    /// Look up a filter by name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Filters that may come after this one
    pub fn allowed_after(self) -> &'static [FilterKind] {
        use FilterKind::{
            Balance, Binarize, Ignore, Merge, Normalize, Outputs, Permute, Shuffle, Split,
        };
        match self {
            Ignore => &[Outputs, Permute, Split, Merge, Balance, Normalize, Shuffle],
            Merge => &[Shuffle, Normalize, Split, Balance, Binarize],
            Normalize => &[Merge, Shuffle, Split, Balance, Binarize],
            Shuffle => &[Merge, Normalize, Split, Balance, Binarize],
            Binarize => &[Merge, Normalize, Split, Balance, Shuffle],
            Split => &[Merge, Normalize, Shuffle, Balance, Binarize],
            Balance => &[Merge, Normalize, Split, Shuffle, Binarize],
            Permute => &[Normalize, Shuffle, Merge, Balance, Split],
            Outputs => &[Normalize, Shuffle, Merge, Balance, Permute, Split],
        }
    }

    /// Whether the filter applies to the given data type
    pub fn supports(self, data_type: DataType) -> bool {
        match data_type {
            DataType::General => self != Self::Binarize,
            DataType::Timeseries => matches!(
                self,
                Self::Merge | Self::Normalize | Self::Shuffle | Self::Split | Self::Binarize
            ),
            DataType::Images => false,
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parameters of `merge`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MergeParams {
    /// Datasets appended after the source, in order
    pub datas: Vec<DatasetId>,
}

/// Parameters of `split`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SplitParams {
    /// First percentage of rows kept
    pub start: u32,
    /// Percentage where the kept range ends (exclusive)
    pub end: u32,
}

/// Parameters of `balance`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BalanceParams {
    /// Resampling strategy
    pub sample: BalanceStrategy,
}

/// Column reference as written in a spec: a number or a numeric string
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
enum ColumnRef {
    Index(usize),
    Text(String),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawColumnsParams {
    columns: Vec<ColumnRef>,
}

/// Parameters of `ignore`, `permute` and `outputs`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnsParams {
    /// Source column positions
    pub columns: Vec<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NoParams {}

/// One decoded pipeline stage
#[derive(Debug, Clone, PartialEq)]
pub enum FilterStage {
    /// Append other datasets
    Merge(MergeParams),
    /// Min-max scale features
    Normalize,
    /// Randomly permute rows
    Shuffle,
    /// Quantile thermometer coding
    Binarize,
    /// Keep a percentage range of rows
    Split(SplitParams),
    /// Resample rows per output class
    Balance(BalanceParams),
    /// Drop columns
    Ignore(ColumnsParams),
    /// One-hot expand columns
    Permute(ColumnsParams),
    /// Move columns into the output block
    Outputs(ColumnsParams),
}

impl FilterStage {
    /// Which filter this stage is
    pub fn kind(&self) -> FilterKind {
        match self {
            Self::Merge(_) => FilterKind::Merge,
            Self::Normalize => FilterKind::Normalize,
            Self::Shuffle => FilterKind::Shuffle,
            Self::Binarize => FilterKind::Binarize,
            Self::Split(_) => FilterKind::Split,
            Self::Balance(_) => FilterKind::Balance,
            Self::Ignore(_) => FilterKind::Ignore,
            Self::Permute(_) => FilterKind::Permute,
            Self::Outputs(_) => FilterKind::Outputs,
        }
    }

    /// Columns referenced by column-selecting stages
    pub fn columns(&self) -> Option<&[usize]> {
        match self {
            Self::Ignore(params) | Self::Permute(params) | Self::Outputs(params) => {
                Some(&params.columns)
            }
            _ => None,
        }
    }

    /// Decode the parameters of a record whose name is already known
    pub fn decode(kind: FilterKind, record: &Map<String, Value>) -> Result<Self, FilterValidationError> {
        let mut params = record.clone();
        params.remove("name");
        let params = Value::Object(params);
        let stage = match kind {
            FilterKind::Merge => Self::Merge(decode_params(kind, params)?),
            FilterKind::Split => Self::Split(decode_params(kind, params)?),
            FilterKind::Balance => Self::Balance(decode_params(kind, params)?),
            FilterKind::Ignore => Self::Ignore(decode_columns(kind, params)?),
            FilterKind::Permute => Self::Permute(decode_columns(kind, params)?),
            FilterKind::Outputs => Self::Outputs(decode_columns(kind, params)?),
            FilterKind::Normalize | FilterKind::Shuffle | FilterKind::Binarize => {
                decode_params::<NoParams>(kind, params)?;
                match kind {
                    FilterKind::Normalize => Self::Normalize,
                    FilterKind::Shuffle => Self::Shuffle,
                    _ => Self::Binarize,
                }
            }
        };
        Ok(stage)
    }
}

fn decode_params<T: DeserializeOwned>(kind: FilterKind, params: Value) -> Result<T, FilterValidationError> {
    serde_json::from_value(params)
        .map_err(|e| FilterValidationError::invalid_parameters(kind.name(), e.to_string()))
}

fn decode_columns(kind: FilterKind, params: Value) -> Result<ColumnsParams, FilterValidationError> {
    let raw: RawColumnsParams = decode_params(kind, params)?;
    let columns = raw
        .columns
        .into_iter()
        .map(|column| match column {
            ColumnRef::Index(index) => Ok(index),
            ColumnRef::Text(text) => text.trim().parse().map_err(|_| {
                FilterValidationError::invalid_parameters(
                    kind.name(),
                    format!("column {text:?} is not a column number"),
                )
            }),
        })
        .collect::<Result<Vec<_>, _>>()?;
    if columns.is_empty() {
        return Err(FilterValidationError::invalid_parameters(
            kind.name(),
            "This field must contain at least one element",
        ));
    }
    Ok(ColumnsParams { columns })
}
