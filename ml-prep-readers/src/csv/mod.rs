//! Delimited (CSV-like) tabular data
//!
//! Fields are split by comma or whitespace as chosen by the
//! [`FormatSniffer`](crate::sniffer::FormatSniffer); rows that do not fit the
//! inferred shape or types are reported and skipped.

mod parser;

pub use parser::TabularParser;
