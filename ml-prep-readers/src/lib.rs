//! Parsers for user-supplied datasets
//!
//! This crate turns decoded text into datasets and metadata: it sniffs the
//! layout of delimited files, parses tabular and timeseries text, and picks
//! the right parser for a file or an extracted archive.

#![warn(missing_docs)]

pub mod common;
pub mod csv;
pub mod sniffer;
pub mod source;
pub mod timeseries;
pub mod tokenizer;

pub use common::{FileFormat, ReaderOptions, SourceFormat};
pub use csv::TabularParser;
pub use sniffer::{FormatSniffer, SniffResult};
pub use source::{parse_archive, parse_file, ArchiveMember, ParsedSource, RawSource};
pub use timeseries::TimeseriesParser;

// Re-export core types
pub use ml_prep_core::{Error, Result};
