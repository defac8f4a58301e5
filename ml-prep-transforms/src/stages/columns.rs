//! Column-level stages for tabular data: ignore, outputs and permute
//!
//! Columns are addressed by their position in the source file, which stays
//! stable while earlier stages drop or expand columns.

use std::collections::HashSet;

use ndarray::{Array1, Axis};

use ml_prep_core::{ColumnInfo, ColumnType, Error, OutputBlock, Result, TabularDataset};

use super::assemble;

/// Drop the given source columns from the features
pub fn ignore(dataset: &TabularDataset, columns: &[usize]) -> Result<TabularDataset> {
    let ignored: HashSet<usize> = columns.iter().copied().collect();
    let keep: Vec<usize> = dataset
        .columns()
        .iter()
        .enumerate()
        .filter(|(_, column)| !ignored.contains(&column.source_index))
        .map(|(position, _)| position)
        .collect();
    rebuild(dataset, &keep, dataset.outputs().cloned())
}

/// Move the given source columns, in the given order, into the output block
pub fn select_outputs(dataset: &TabularDataset, columns: &[usize]) -> Result<TabularDataset> {
    if dataset.outputs().is_some() {
        return Err(Error::filter_execution("outputs", "outputs are already selected"));
    }
    let mut picked = Vec::with_capacity(columns.len());
    for &source in columns {
        let positions = dataset.positions_of(source);
        if positions.is_empty() {
            return Err(Error::filter_execution(
                "outputs",
                format!("column {source} is not present"),
            ));
        }
        picked.extend(positions);
    }

    let values = dataset.features().select(Axis(1), &picked);
    let output_columns = picked.iter().map(|&p| dataset.columns()[p].clone()).collect();
    let outputs = OutputBlock::new(output_columns, values)?;

    let keep: Vec<usize> = (0..dataset.num_columns())
        .filter(|position| !picked.contains(position))
        .collect();
    rebuild(dataset, &keep, Some(outputs))
}

/// One-hot expand the given categorical source columns in place
///
/// A column with `n` known classes becomes `n` binary columns named
/// `name=value`; values outside the table become all zeros.
pub fn permute(dataset: &TabularDataset, columns: &[usize]) -> Result<TabularDataset> {
    let expand: HashSet<usize> = columns.iter().copied().collect();
    let rows = dataset.num_rows();
    let mut new_columns = Vec::new();
    let mut values: Vec<Array1<f64>> = Vec::new();

    for (position, column) in dataset.columns().iter().enumerate() {
        let stored = dataset.features().column(position);
        if !expand.contains(&column.source_index) {
            new_columns.push(column.clone());
            values.push(stored.to_owned());
            continue;
        }
        let classes = match &column.classes {
            Some(classes) if column.is_categorical() => classes,
            _ => {
                return Err(Error::filter_execution(
                    "permute",
                    format!("column {} is not categorical", column.name),
                ))
            }
        };

        let codes: Vec<Option<usize>> = stored
            .iter()
            .map(|&value| match column.column_type {
                ColumnType::Text => Some(value as usize).filter(|&code| code < classes.len()),
                _ => column
                    .class_key(value)
                    .and_then(|key| classes.get_index(&key))
                    .map(|code| code as usize),
            })
            .collect();

        for (code, label) in classes.values().enumerate() {
            new_columns.push(ColumnInfo::new(
                format!("{}={}", column.name, label),
                column.source_index,
                ColumnType::Integer,
            ));
            values.push(
                codes
                    .iter()
                    .map(|&c| if c == Some(code) { 1.0 } else { 0.0 })
                    .collect(),
            );
        }
    }

    let features = assemble(rows, &values);
    let permuted = TabularDataset::new(new_columns, features)?;
    match dataset.outputs() {
        Some(outputs) => permuted.with_outputs(outputs.clone()),
        None => Ok(permuted),
    }
}

/// Dataset with only the feature columns at `keep`
fn rebuild(
    dataset: &TabularDataset,
    keep: &[usize],
    outputs: Option<OutputBlock>,
) -> Result<TabularDataset> {
    let columns = keep.iter().map(|&p| dataset.columns()[p].clone()).collect();
    let features = dataset.features().select(Axis(1), keep);
    let rebuilt = TabularDataset::new(columns, features)?;
    match outputs {
        Some(outputs) => rebuilt.with_outputs(outputs),
        None => Ok(rebuilt),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ml_prep_core::ClassTable;
    use ndarray::array;

    fn colors() -> TabularDataset {
        let mut colors = ClassTable::new(10);
        for value in ["red", "green", "blue"] {
            colors.get_or_insert(value);
        }
        let mut sizes = ClassTable::new(10);
        for value in ["1", "3"] {
            sizes.get_or_insert(value);
        }
        let columns = vec![
            ColumnInfo::new("weight", 0, ColumnType::Float),
            ColumnInfo::new("color", 1, ColumnType::Text).with_classes(colors),
            ColumnInfo::new("size", 2, ColumnType::Integer).with_classes(sizes),
            ColumnInfo::new("label", 3, ColumnType::Integer),
        ];
        TabularDataset::new(
            columns,
            array![
                [0.5, 0.0, 1.0, 0.0],
                [1.5, 2.0, 3.0, 1.0],
                [2.5, 3.0, 7.0, 0.0],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_ignore_by_source_index() {
        let data = ignore(&colors(), &[0, 2]).unwrap();
        let names: Vec<&str> = data.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["color", "label"]);
        assert_eq!(data.features().column(1).to_vec(), vec![0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_outputs_move_out_of_features() {
        let data = select_outputs(&colors(), &[3]).unwrap();
        assert_eq!(data.num_columns(), 3);
        let outputs = data.outputs().unwrap();
        assert_eq!(outputs.columns[0].name, "label");
        assert_eq!(outputs.values, array![[0.0], [1.0], [0.0]]);
        assert!(select_outputs(&data, &[0]).is_err());
    }

    #[test]
    fn test_permute_text_and_integer() {
        let data = permute(&colors(), &[1, 2]).unwrap();
        let names: Vec<&str> = data.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["weight", "color=red", "color=green", "color=blue", "size=1", "size=3", "label"]
        );
        // code 3 is out of vocabulary and the integer 7 was never seen
        assert_eq!(
            data.features(),
            &array![
                [0.5, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0],
                [1.5, 0.0, 0.0, 1.0, 0.0, 1.0, 1.0],
                [2.5, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            ]
        );
        assert_eq!(data.positions_of(1), vec![1, 2, 3]);
    }

    #[test]
    fn test_permute_rejects_continuous_column() {
        let err = permute(&colors(), &[0]).unwrap_err();
        assert_eq!(err.kind(), ml_prep_core::ErrorKind::FilterExecution);
    }

    #[test]
    fn test_ignore_then_outputs_then_permute() {
        let data = ignore(&colors(), &[0]).unwrap();
        let data = select_outputs(&data, &[3]).unwrap();
        let data = permute(&data, &[1]).unwrap();
        assert_eq!(data.num_columns(), 4);
        assert_eq!(data.outputs().unwrap().values.column(0).to_vec(), vec![0.0, 1.0, 0.0]);
    }
}
