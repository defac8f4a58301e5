//! Prepared dataset snapshots
//!
//! The output of a pipeline run is stored as a versioned bincode blob so the
//! same filter list does not have to run twice. A snapshot whose version does
//! not match [`DATASET_VERSION`] is rebuilt.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use ml_prep_core::{Dataset, Result};

use crate::pipeline::PipelineOutput;
use crate::quantize::Quantiles;
use crate::stages::normalize::MinMax;

/// Layout version of prepared dataset snapshots
pub const DATASET_VERSION: u32 = 1;

/// A transformed dataset together with the state needed to reuse it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreparedDataset {
    /// Layout version
    pub version: u32,

    /// Transformed dataset
    pub dataset: Dataset,

    /// Quantizer state when `binarize` ran
    pub quantiles: Option<Quantiles>,

    /// Fitted ranges when `normalize` ran
    pub normalization: Option<MinMax>,
}

impl PreparedDataset {
    /// Current-version snapshot of a pipeline result
    pub fn new(dataset: Dataset, quantiles: Option<Quantiles>, normalization: Option<MinMax>) -> Self {
        Self {
            version: DATASET_VERSION,
            dataset,
            quantiles,
            normalization,
        }
    }

    /// Whether this snapshot was written by the current layout
    pub fn is_current(&self) -> bool {
        self.version == DATASET_VERSION
    }

    /// Serialize to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserialize from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// Write to a writer
    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        bincode::serialize_into(writer, self)?;
        Ok(())
    }

    /// Read from a reader
    pub fn read_from<R: Read>(reader: R) -> Result<Self> {
        Ok(bincode::deserialize_from(reader)?)
    }

    /// Reuse a stored snapshot if it is readable and current, otherwise prepare anew
    pub fn load_or_prepare<F>(stored: Option<&[u8]>, prepare: F) -> Result<Self>
    where
        F: FnOnce() -> Result<Self>,
    {
        match stored.map(Self::from_bytes) {
            Some(Ok(snapshot)) if snapshot.is_current() => Ok(snapshot),
            Some(Ok(snapshot)) => {
                tracing::debug!(
                    stored = snapshot.version,
                    current = DATASET_VERSION,
                    "snapshot version mismatch, preparing again"
                );
                prepare()
            }
            Some(Err(err)) => {
                tracing::warn!(error = %err, "unreadable snapshot, preparing again");
                prepare()
            }
            None => prepare(),
        }
    }
}

impl From<PipelineOutput> for PreparedDataset {
    fn from(output: PipelineOutput) -> Self {
        Self::new(output.dataset, output.quantiles, output.normalization)
    }
}
