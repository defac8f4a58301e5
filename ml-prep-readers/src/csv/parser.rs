//! Tabular parser converting delimited lines to a typed numeric dataset

use ndarray::Array2;

use ml_prep_core::metadata::{InvalidCell, MetadataDetails, TabularMetadata};
use ml_prep_core::notify::{plural, ProgressThrottle};
use ml_prep_core::{
    ClassTable, ColumnInfo, ColumnType, DatasetMetadata, Error, FormatError, Notifier, Result,
    StatisticsCollector, TabularDataset,
};

use crate::common::ReaderOptions;
use crate::sniffer::{FormatSniffer, SniffResult};
use crate::source::RawSource;
use crate::tokenizer::{parse_integer, parse_number, split_fields};

/// Parses delimited text into a [`TabularDataset`] and its metadata
#[derive(Debug, Clone, Default)]
pub struct TabularParser {
    options: ReaderOptions,
}

/// A coerced field waiting to be committed to the matrix
enum Cell<'a> {
    Integer(i64),
    Float(f64),
    Text(&'a str),
}

impl TabularParser {
    /// Create a new tabular parser
    pub fn new(options: ReaderOptions) -> Self {
        Self { options }
    }

    /// Parse a whole source, reporting progress through `notifier`
    pub fn parse(
        &self,
        source: &RawSource,
        notifier: &dyn Notifier,
    ) -> Result<(TabularDataset, DatasetMetadata)> {
        let lines = source.lines();
        let sniffed = match FormatSniffer::new(&self.options).sniff(lines) {
            Ok(sniffed) => sniffed,
            Err(err) => return Err(report_sniff_failure(err, notifier)),
        };

        notifier.send(match sniffed.delimiter {
            ml_prep_core::Delimiter::Comma => "Parsing CSV with comma as delimiter.",
            ml_prep_core::Delimiter::Whitespace => "Parsing CSV with whitespace (tab) as delimiter.",
        });
        notifier.send(&format!(
            "Found {} fields in first row, assume all the rows have this number of fields.",
            sniffed.num_columns
        ));
        notifier.send("Parsing...");

        let mut columns = self.columns(&sniffed);
        let num_columns = sniffed.num_columns;
        let mut values: Vec<f64> = Vec::with_capacity(lines.len() * num_columns);
        let mut data_rows = 0;
        let mut empty_rows = 0;
        let mut invalid_cells = Vec::new();
        let mut throttle = ProgressThrottle::new(self.options.progress_interval());

        let start = usize::from(sniffed.has_header);
        for (index, line) in lines.iter().enumerate().skip(start) {
            let line_number = index + 1;
            throttle.lines_parsed(notifier, line_number);
            if line.trim().is_empty() {
                empty_rows += 1;
                continue;
            }
            let fields = split_fields(line, sniffed.delimiter);
            match coerce_row(&fields, &sniffed.column_types) {
                Ok(cells) => {
                    for (cell, column) in cells.into_iter().zip(columns.iter_mut()) {
                        values.push(commit(cell, column));
                    }
                    data_rows += 1;
                }
                Err(column) => invalid_cells.push(InvalidCell {
                    row: line_number,
                    column,
                }),
            }
        }

        notifier.send("Analyzing data...");
        notifier.send(if sniffed.has_header {
            "The dataset appears to have a header."
        } else {
            "No header found, first row contains data."
        });
        if !invalid_cells.is_empty() {
            notifier.send(&format!(
                "Found {} with invalid values:",
                plural(invalid_cells.len(), "row")
            ));
            for cell in &invalid_cells {
                notifier.send(&format!("- row {}, column {}", cell.row, cell.column));
            }
        }

        let all_text = columns.iter().all(|c| c.column_type == ColumnType::Text);
        if data_rows == 0 || (data_rows <= 1 && all_text) {
            let err = FormatError::EmptyOrMalformedDataset;
            notifier.send(&err.to_string());
            return Err(err.into());
        }
        notifier.send(&format!("Found {}.", plural(data_rows, "sample")));

        let features = Array2::from_shape_vec((data_rows, num_columns), values)
            .map_err(|e| Error::ShapeMismatch(e.to_string()))?;
        let dataset = TabularDataset::new(columns, features)?;

        let (summaries, last_column) =
            StatisticsCollector::new(self.options.histogram_bins).collect(&dataset);
        let metadata = DatasetMetadata::new(MetadataDetails::General(TabularMetadata {
            data_rows,
            empty_rows,
            invalid_rows: invalid_cells.len(),
            num_columns,
            delimiter: sniffed.delimiter,
            with_header: sniffed.has_header,
            columns: summaries,
            last_column,
            invalid_cells,
        }));

        tracing::info!(
            rows = data_rows,
            columns = num_columns,
            empty = empty_rows,
            invalid = metadata.tabular().map_or(0, |m| m.invalid_rows),
            "parsed tabular dataset"
        );
        Ok((dataset, metadata))
    }

    /// Column descriptions with empty class tables for categorical types
    fn columns(&self, sniffed: &SniffResult) -> Vec<ColumnInfo> {
        sniffed
            .column_types
            .iter()
            .enumerate()
            .map(|(index, &column_type)| {
                let name = if sniffed.has_header {
                    sniffed.first_row[index].clone()
                } else {
                    (index + 1).to_string()
                };
                let column = ColumnInfo::new(name, index, column_type);
                if column_type.is_categorical() {
                    column.with_classes(ClassTable::new(self.options.lock_threshold))
                } else {
                    column
                }
            })
            .collect()
    }
}

/// Send the failure and its explanation, then hand the error back
fn report_sniff_failure(err: Error, notifier: &dyn Notifier) -> Error {
    notifier.send(&err.to_string());
    if matches!(
        err,
        Error::Format(FormatError::InvalidDelimiter | FormatError::TooFewColumns { .. })
    ) {
        notifier.send("This means your file isn't properly formatted");
        notifier.send("(or you submitted another type of file).");
    }
    err
}

/// Coerce every field or return the 1-based column of the first bad one
fn coerce_row<'a>(fields: &'a [String], types: &[ColumnType]) -> std::result::Result<Vec<Cell<'a>>, usize> {
    if fields.len() != types.len() {
        return Err(fields.len().min(types.len()) + 1);
    }
    fields
        .iter()
        .zip(types)
        .enumerate()
        .map(|(index, (field, column_type))| {
            let cell = match column_type {
                ColumnType::Integer => parse_integer(field).map(Cell::Integer),
                ColumnType::Float => parse_number(field).map(Cell::Float),
                ColumnType::Text => Some(Cell::Text(field.as_str())),
            };
            cell.ok_or(index + 1)
        })
        .collect()
}

/// Store a coerced field, growing the column's class table
fn commit(cell: Cell<'_>, column: &mut ColumnInfo) -> f64 {
    match cell {
        Cell::Integer(value) => {
            if let Some(classes) = &mut column.classes {
                classes.get_or_insert(&value.to_string());
            }
            value as f64
        }
        Cell::Float(value) => value,
        Cell::Text(value) => match &mut column.classes {
            Some(classes) => f64::from(classes.get_or_insert(value)),
            None => 0.0,
        },
    }
}
