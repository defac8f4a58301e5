//! Filter pipeline for parsed datasets
//!
//! A JSON filter list is validated against the source dataset's metadata,
//! decoded into typed stages and run left to right. Stages select outputs,
//! drop or one-hot expand columns, merge other datasets, shuffle, split,
//! balance classes, normalize features and quantize timeseries. The result
//! can be stored as a versioned snapshot.

#![warn(missing_docs)]

pub mod catalog;
pub mod filter;
pub mod pipeline;
pub mod quantize;
pub mod snapshot;
pub mod stages;
pub mod validate;

pub use catalog::{DatasetCatalog, DatasetId, InMemoryCatalog};
pub use filter::{BalanceParams, ColumnsParams, FilterKind, FilterStage, MergeParams, SplitParams};
pub use pipeline::{FilterPipeline, PipelineConfig, PipelineOutput, PipelineStats};
pub use quantize::{Quantiles, Quantizer};
pub use snapshot::{PreparedDataset, DATASET_VERSION};
pub use stages::balance::BalanceStrategy;
pub use stages::normalize::MinMax;
pub use validate::FilterValidator;

// Re-export core types
pub use ml_prep_core::{Error, Result};
