//! Derived dataset metadata
//!
//! Metadata is computed once by a parser and never mutated afterwards. It is
//! versioned: a cached value whose version differs from
//! [`METADATA_VERSION`] must be re-derived from the data.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::column::ColumnType;
use crate::error::Result;

/// Version of the metadata layout produced by this crate
pub const METADATA_VERSION: u32 = 3;

/// Kind of data held by a dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataType {
    /// Delimited tabular data
    General,
    /// Multi-timestep sequences
    Timeseries,
    /// Archive of class-labelled images
    Images,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::General => "tabular",
            Self::Timeseries => "timeseries",
            Self::Images => "images",
        };
        f.write_str(name)
    }
}

/// Field separator chosen by the sniffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Delimiter {
    /// Comma, surrounding whitespace trimmed
    Comma,
    /// Runs of spaces and tabs
    Whitespace,
}

impl Delimiter {
    /// Pattern describing how fields are split
    pub fn pattern(self) -> &'static str {
        match self {
            Self::Comma => r"\s*,\s*",
            Self::Whitespace => r"\s+",
        }
    }
}

/// Statistics for one tabular column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSummary {
    /// Column name
    pub name: String,

    /// Inferred type
    pub dtype: ColumnType,

    /// Known class values in code order (empty for non-categorical columns)
    pub classes: Vec<String>,

    /// Number of distinct classes, if the column is categorical
    pub unique: Option<usize>,

    /// Whether the class table stopped growing
    pub locked: bool,

    /// Minimum value (numeric columns)
    pub min: Option<f64>,

    /// Maximum value (numeric columns)
    pub max: Option<f64>,

    /// Mean value (numeric columns)
    pub mean: Option<f64>,

    /// Sample standard deviation (numeric columns)
    pub stdev: Option<f64>,

    /// Histogram counts
    pub histogram: Vec<u64>,

    /// Histogram bin edges, one more than the number of counts
    pub bins: Vec<f64>,
}

/// Classification summary of the designated output column
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LastColumnSummary {
    /// Minimum value
    pub min: Option<f64>,

    /// Maximum value
    pub max: Option<f64>,

    /// Number of distinct values, dropped once it gets too large
    pub unique: Option<usize>,

    /// Per-class counts, dropped for non-integer or high-cardinality columns
    pub classes: Option<BTreeMap<String, u64>>,

    /// Per-class fraction of rows
    pub distribution: Option<BTreeMap<String, f64>>,
}

/// Location of a rejected row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidCell {
    /// 1-based line number in the source
    pub row: usize,

    /// 1-based column of the first offending field
    pub column: usize,
}

/// Metadata of a tabular dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabularMetadata {
    /// Rows kept in the dataset
    pub data_rows: usize,

    /// Blank lines
    pub empty_rows: usize,

    /// Rows rejected for field count or unparseable values
    pub invalid_rows: usize,

    /// Number of columns
    pub num_columns: usize,

    /// Field separator
    pub delimiter: Delimiter,

    /// Whether the first row held column names
    pub with_header: bool,

    /// Per-column statistics
    pub columns: Vec<ColumnSummary>,

    /// Summary of the last column
    pub last_column: LastColumnSummary,

    /// Rejected rows
    pub invalid_cells: Vec<InvalidCell>,
}

/// Metadata of a timeseries dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeseriesMetadata {
    /// Number of samples
    pub data_rows: usize,

    /// Blank lines
    pub empty_rows: usize,

    /// Shortest sample
    pub min_timesteps: usize,

    /// Longest sample
    pub max_timesteps: usize,

    /// Inputs per timestep
    pub input_size: usize,

    /// Outputs per timestep
    pub output_size: usize,

    /// Whether every input is exactly 0 or 1
    pub binary_input: bool,

    /// Whether every output is exactly 0 or 1
    pub binary_output: bool,

    /// Counts of one-hot output classes, empty unless every output is one-hot
    pub classes: BTreeMap<String, u64>,
}

/// Metadata of an image archive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImagesMetadata {
    /// Number of images found
    pub data_rows: usize,

    /// Image count per class directory
    pub classes: BTreeMap<String, u64>,
}

/// Type-specific part of the metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "data_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetadataDetails {
    /// Tabular dataset
    General(TabularMetadata),
    /// Timeseries dataset
    Timeseries(TimeseriesMetadata),
    /// Image archive
    Images(ImagesMetadata),
}

/// Structural fingerprint used to decide whether datasets can be merged
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeSignature {
    /// Column types in order
    General(Vec<ColumnType>),
    /// Shape and binary flags
    Timeseries {
        /// Whether inputs are binary
        binary_input: bool,
        /// Whether outputs are binary
        binary_output: bool,
        /// Inputs per timestep
        input_size: usize,
        /// Outputs per timestep
        output_size: usize,
    },
}

/// Derived, immutable description of a dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    /// Layout version
    pub version: u32,

    /// Size of the source in bytes, if known
    pub size: Option<u64>,

    /// Member path when the data came from an archive
    pub archive_path: Option<String>,

    /// Type-specific metadata
    #[serde(flatten)]
    pub details: MetadataDetails,
}

impl DatasetMetadata {
    /// Create current-version metadata
    pub fn new(details: MetadataDetails) -> Self {
        Self {
            version: METADATA_VERSION,
            size: None,
            archive_path: None,
            details,
        }
    }

    /// Data type of the described dataset
    pub fn data_type(&self) -> DataType {
        match self.details {
            MetadataDetails::General(_) => DataType::General,
            MetadataDetails::Timeseries(_) => DataType::Timeseries,
            MetadataDetails::Images(_) => DataType::Images,
        }
    }

    /// Number of rows, samples or images
    pub fn data_rows(&self) -> usize {
        match &self.details {
            MetadataDetails::General(meta) => meta.data_rows,
            MetadataDetails::Timeseries(meta) => meta.data_rows,
            MetadataDetails::Images(meta) => meta.data_rows,
        }
    }

    /// Tabular part, if any
    pub fn tabular(&self) -> Option<&TabularMetadata> {
        match &self.details {
            MetadataDetails::General(meta) => Some(meta),
            _ => None,
        }
    }

    /// Timeseries part, if any
    pub fn timeseries(&self) -> Option<&TimeseriesMetadata> {
        match &self.details {
            MetadataDetails::Timeseries(meta) => Some(meta),
            _ => None,
        }
    }

    /// Structural fingerprint for merge compatibility; images cannot be merged
    pub fn signature(&self) -> Option<MergeSignature> {
        match &self.details {
            MetadataDetails::General(meta) => Some(MergeSignature::General(
                meta.columns.iter().map(|column| column.dtype).collect(),
            )),
            MetadataDetails::Timeseries(meta) => Some(MergeSignature::Timeseries {
                binary_input: meta.binary_input,
                binary_output: meta.binary_output,
                input_size: meta.input_size,
                output_size: meta.output_size,
            }),
            MetadataDetails::Images(_) => None,
        }
    }

    /// Whether this metadata was produced by the current layout
    pub fn is_current(&self) -> bool {
        self.version == METADATA_VERSION
    }

    /// Reuse cached metadata if current, otherwise derive it again
    pub fn refresh_if_stale<F>(cached: Option<Self>, derive: F) -> Result<Self>
    where
        F: FnOnce() -> Result<Self>,
    {
        match cached {
            Some(meta) if meta.is_current() => Ok(meta),
            Some(meta) => {
                tracing::debug!(
                    cached = meta.version,
                    current = METADATA_VERSION,
                    "metadata version mismatch, re-deriving"
                );
                derive()
            }
            None => derive(),
        }
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeseries_meta() -> DatasetMetadata {
        DatasetMetadata::new(MetadataDetails::Timeseries(TimeseriesMetadata {
            data_rows: 2,
            empty_rows: 0,
            min_timesteps: 2,
            max_timesteps: 2,
            input_size: 3,
            output_size: 2,
            binary_input: false,
            binary_output: true,
            classes: BTreeMap::from([("0".to_string(), 2), ("1".to_string(), 2)]),
        }))
    }

    #[test]
    fn test_json_round_trip_keeps_tag() {
        let meta = timeseries_meta();
        let json = meta.to_json().unwrap();
        assert!(json.contains("\"data_type\":\"TIMESERIES\""));
        let restored = DatasetMetadata::from_json(&json).unwrap();
        assert_eq!(restored, meta);
        assert_eq!(restored.data_type(), DataType::Timeseries);
    }

    #[test]
    fn test_refresh_if_stale() {
        let current = timeseries_meta();
        let reused = DatasetMetadata::refresh_if_stale(Some(current.clone()), || {
            panic!("current metadata must not be re-derived")
        })
        .unwrap();
        assert_eq!(reused, current);

        let mut stale = current.clone();
        stale.version = METADATA_VERSION - 1;
        let mut derived = false;
        let refreshed = DatasetMetadata::refresh_if_stale(Some(stale), || {
            derived = true;
            Ok(current.clone())
        })
        .unwrap();
        assert!(derived);
        assert!(refreshed.is_current());
    }

    #[test]
    fn test_signature() {
        let meta = timeseries_meta();
        assert_eq!(
            meta.signature(),
            Some(MergeSignature::Timeseries {
                binary_input: false,
                binary_output: true,
                input_size: 3,
                output_size: 2,
            })
        );
    }
}
