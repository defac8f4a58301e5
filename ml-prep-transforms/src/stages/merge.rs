//! Encoding alignment for merged tabular data
//!
//! Every tabular file builds its own class tables, so the same text value can
//! carry different codes in two files. Before rows are appended, the merged
//! file is re-encoded against the source's tables.

use ndarray::Array1;

use ml_prep_core::{ColumnType, Error, Result, TabularDataset};

use super::assemble;

/// Re-encode `other` with the column descriptions of `reference`
///
/// Both datasets must be raw parse results with the same column types.
/// Text values unknown to the reference map to its out-of-vocabulary code.
pub fn align_to(other: &TabularDataset, reference: &TabularDataset) -> Result<TabularDataset> {
    if other.num_columns() != reference.num_columns() {
        return Err(Error::filter_execution(
            "merge",
            format!(
                "{} columns cannot be merged into {} columns",
                other.num_columns(),
                reference.num_columns()
            ),
        ));
    }

    let mut columns: Vec<Array1<f64>> = Vec::with_capacity(other.num_columns());
    for (position, (theirs, ours)) in other.columns().iter().zip(reference.columns()).enumerate() {
        if theirs.column_type != ours.column_type {
            return Err(Error::filter_execution(
                "merge",
                format!(
                    "column {} is {} in one file and {} in the other",
                    position + 1,
                    theirs.column_type,
                    ours.column_type
                ),
            ));
        }
        let stored = other.features().column(position);
        let aligned = match (ours.column_type, &ours.classes) {
            (ColumnType::Text, Some(classes)) => stored
                .iter()
                .map(|&code| {
                    let code = match theirs.class_key(code) {
                        Some(label) => classes.code(&label),
                        None => classes.oov_code(),
                    };
                    f64::from(code)
                })
                .collect(),
            _ => stored.to_owned(),
        };
        columns.push(aligned);
    }

    TabularDataset::new(reference.columns().to_vec(), assemble(other.num_rows(), &columns))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ml_prep_core::{ClassTable, ColumnInfo};
    use ndarray::array;

    fn text_dataset(labels: &[&str], codes: Vec<f64>) -> TabularDataset {
        let mut classes = ClassTable::new(10);
        for label in labels {
            classes.get_or_insert(label);
        }
        let rows = codes.len();
        let features = ndarray::Array2::from_shape_vec((rows, 1), codes).unwrap();
        TabularDataset::new(
            vec![ColumnInfo::new("color", 0, ColumnType::Text).with_classes(classes)],
            features,
        )
        .unwrap()
    }

    #[test]
    fn test_codes_follow_reference_table() {
        let reference = text_dataset(&["red", "blue"], vec![0.0, 1.0]);
        let other = text_dataset(&["blue", "green", "red"], vec![0.0, 1.0, 2.0]);
        let aligned = align_to(&other, &reference).unwrap();
        assert_eq!(aligned.features(), &array![[1.0], [2.0], [0.0]]);
        assert_eq!(aligned.columns(), reference.columns());
    }

    #[test]
    fn test_type_mismatch() {
        let reference = text_dataset(&["a"], vec![0.0]);
        let other = TabularDataset::new(
            vec![ColumnInfo::new("n", 0, ColumnType::Float)],
            array![[0.5]],
        )
        .unwrap();
        assert!(align_to(&other, &reference).is_err());
    }
}
