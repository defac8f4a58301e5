//! Delimiter, header and column type inference for delimited text

use ml_prep_core::{ColumnType, Delimiter, FormatError, Result};

use crate::common::ReaderOptions;
use crate::tokenizer::{classify, parse_integer, parse_number, split_fields, FieldKind};

/// Byte order mark some editors put in front of the first line
const BOM: char = '\u{feff}';

/// Outcome of sniffing the first lines of a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SniffResult {
    /// Field separator
    pub delimiter: Delimiter,

    /// Whether the first row holds column names
    pub has_header: bool,

    /// Number of fields in the first row
    pub num_columns: usize,

    /// Inferred type per column
    pub column_types: Vec<ColumnType>,

    /// Fields of the first row
    pub first_row: Vec<String>,
}

/// Infers delimiter, header presence and column types without a schema
#[derive(Debug, Clone)]
pub struct FormatSniffer {
    type_inference_rows: usize,
}

impl FormatSniffer {
    /// Create a new sniffer
    pub fn new(options: &ReaderOptions) -> Self {
        Self {
            type_inference_rows: options.type_inference_rows.max(1),
        }
    }

    /// Sniff the format from the leading lines of a file
    pub fn sniff<S: AsRef<str>>(&self, lines: &[S]) -> Result<SniffResult> {
        let first = lines
            .first()
            .map(|line| line.as_ref().trim_start_matches(BOM))
            .unwrap_or_default();
        if first.trim().is_empty() {
            return Err(FormatError::EmptyFirstRow.into());
        }

        let (delimiter, first_row) = detect_delimiter(first)?;
        let num_columns = first_row.len();

        // Leading data rows with the right shape drive type inference
        let prefix: Vec<Vec<String>> = lines
            .iter()
            .skip(1)
            .map(AsRef::as_ref)
            .filter(|line| !line.trim().is_empty())
            .map(|line| split_fields(line, delimiter))
            .filter(|fields| fields.len() == num_columns)
            .take(self.type_inference_rows)
            .collect();

        let types_after = infer_column_types(num_columns, prefix.iter());
        let has_header = prefix
            .first()
            .is_some_and(|second| looks_like_header(&first_row, second, &types_after));

        let column_types = if has_header {
            types_after
        } else {
            let rows = std::iter::once(&first_row).chain(prefix.iter().take(self.type_inference_rows - 1));
            infer_column_types(num_columns, rows)
        };

        tracing::debug!(?delimiter, has_header, num_columns, "sniffed format");
        Ok(SniffResult {
            delimiter,
            has_header,
            num_columns,
            column_types,
            first_row,
        })
    }
}

impl Default for FormatSniffer {
    fn default() -> Self {
        Self::new(&ReaderOptions::default())
    }
}

/// Pick comma if it splits the first row into at least two fields, else whitespace
fn detect_delimiter(first: &str) -> Result<(Delimiter, Vec<String>)> {
    let mut found = None;

    if first.contains(',') {
        let mut fields = split_fields(first, Delimiter::Comma);
        if first.matches(',').count() == 1 {
            fields.retain(|field| !field.is_empty());
        }
        if fields.len() >= 2 {
            return Ok((Delimiter::Comma, fields));
        }
        found = Some(fields.len());
    }

    if first.trim().contains(char::is_whitespace) {
        let fields = split_fields(first, Delimiter::Whitespace);
        if fields.len() >= 2 {
            return Ok((Delimiter::Whitespace, fields));
        }
        found = Some(fields.len());
    }

    match found {
        Some(found) => Err(FormatError::TooFewColumns { found }.into()),
        None => Err(FormatError::InvalidDelimiter.into()),
    }
}

/// Infer one type per column; empty fields carry no evidence
pub fn infer_column_types<'a, I>(num_columns: usize, rows: I) -> Vec<ColumnType>
where
    I: Iterator<Item = &'a Vec<String>>,
{
    let mut seen = vec![false; num_columns];
    let mut types = vec![ColumnType::Integer; num_columns];
    for row in rows {
        for (index, field) in row.iter().enumerate().take(num_columns) {
            let Some(kind) = evidence(field) else {
                continue;
            };
            seen[index] = true;
            types[index] = widen(types[index], kind);
        }
    }
    types
        .into_iter()
        .zip(seen)
        .map(|(column_type, seen)| if seen { column_type } else { ColumnType::Text })
        .collect()
}

/// Lexical class a field contributes to inference
///
/// Integers beyond `i64` count as floats. Empty fields and numbers that
/// overflow `f64` contribute nothing.
fn evidence(field: &str) -> Option<FieldKind> {
    match classify(field) {
        FieldKind::Empty => None,
        FieldKind::Integer if parse_integer(field).is_some() => Some(FieldKind::Integer),
        FieldKind::Integer | FieldKind::Float => parse_number(field).map(|_| FieldKind::Float),
        FieldKind::Text => Some(FieldKind::Text),
    }
}

fn widen(current: ColumnType, kind: FieldKind) -> ColumnType {
    match (current, kind) {
        (ColumnType::Text, _) | (_, FieldKind::Text) => ColumnType::Text,
        (ColumnType::Float, _) | (_, FieldKind::Float) => ColumnType::Float,
        _ => ColumnType::Integer,
    }
}

/// Whether a field is valid under a column type
pub fn fits(field: &str, column_type: ColumnType) -> bool {
    match (column_type, classify(field)) {
        (ColumnType::Text, _) => true,
        (ColumnType::Integer, FieldKind::Integer) => parse_integer(field).is_some(),
        (ColumnType::Float, FieldKind::Integer | FieldKind::Float) => parse_number(field).is_some(),
        _ => false,
    }
}

/// The first row is a header when some field breaks its column's type
/// while the next row's field fits it
fn looks_like_header(first: &[String], second: &[String], types: &[ColumnType]) -> bool {
    first
        .iter()
        .zip(second)
        .zip(types)
        .any(|((head, next), &column_type)| {
            column_type != ColumnType::Text && !fits(head, column_type) && fits(next, column_type)
        })
}
