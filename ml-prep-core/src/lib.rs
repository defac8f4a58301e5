//! Core data model for ML dataset preparation
//!
//! This crate provides the pieces shared by the parsers and the filter
//! pipeline: the error taxonomy, progress notification, the column and
//! class-table model, in-memory datasets, versioned metadata, descriptive
//! statistics and training batch construction.

#![warn(missing_docs)]

pub mod batch;
pub mod column;
pub mod dataset;
pub mod error;
pub mod metadata;
pub mod notify;
pub mod stats;

// Re-export key types for convenience
pub use batch::{calculate_batch_size, BatchConstructor, BatchOptions, SequenceBatch, TabularBatch};
pub use column::{ClassTable, ColumnInfo, ColumnType};
pub use dataset::{Dataset, OutputBlock, Sample, TabularDataset, TimeseriesDataset, Timestep};
pub use error::{Error, ErrorKind, FilterValidationError, FormatError, Result};
pub use metadata::{DataType, DatasetMetadata, Delimiter, MetadataDetails, METADATA_VERSION};
pub use notify::{CollectingNotifier, Notifier, NullNotifier, TracingNotifier};
pub use stats::{LastColumnCounter, RunningStats, StatisticsCollector};
