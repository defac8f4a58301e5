//! Class balancing of tabular rows
//!
//! Rows are grouped by their output values. Each strategy decides how many
//! rows every class contributes and draws them with the seeded sampler.

use std::collections::HashMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use ml_prep_core::{Error, Result, TabularDataset};
use ml_prep_shuffle::{sample_with_replacement, sample_without_replacement};

/// How `balance` resamples classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BalanceStrategy {
    /// Shrink every class to the size of the smallest one
    Undersampling,
    /// Grow every class to the size of the largest one
    Oversampling,
    /// Resample every class to the mean class size
    Uniform,
}

/// Row indices of each output class, classes in first-seen order
pub fn group_by_output(dataset: &TabularDataset) -> Result<Vec<Vec<usize>>> {
    let outputs = dataset
        .outputs()
        .ok_or_else(|| Error::filter_execution("balance", "outputs must be selected before balance"))?;

    let mut index: HashMap<Vec<u64>, usize> = HashMap::new();
    let mut classes: Vec<Vec<usize>> = Vec::new();
    for (row, values) in outputs.values.rows().into_iter().enumerate() {
        let key: Vec<u64> = values.iter().map(|v| v.to_bits()).collect();
        let class = *index.entry(key).or_insert_with(|| {
            classes.push(Vec::new());
            classes.len() - 1
        });
        classes[class].push(row);
    }
    Ok(classes)
}

/// Resample rows so output classes are balanced
pub fn balance<R: Rng + ?Sized>(
    dataset: &TabularDataset,
    strategy: BalanceStrategy,
    rng: &mut R,
) -> Result<TabularDataset> {
    let classes = group_by_output(dataset)?;
    if classes.is_empty() {
        return Ok(dataset.clone());
    }
    let smallest = classes.iter().map(Vec::len).min().unwrap_or(0);
    let largest = classes.iter().map(Vec::len).max().unwrap_or(0);

    let rows: Vec<usize> = match strategy {
        BalanceStrategy::Undersampling => {
            let mut rows: Vec<usize> = classes
                .iter()
                .flat_map(|class| sample_without_replacement(class, smallest, rng))
                .collect();
            rows.sort_unstable();
            rows
        }
        BalanceStrategy::Oversampling => {
            let mut rows: Vec<usize> = (0..dataset.num_rows()).collect();
            for class in &classes {
                rows.extend(sample_with_replacement(class, largest - class.len(), rng));
            }
            rows
        }
        BalanceStrategy::Uniform => {
            let target = uniform_target(dataset.num_rows(), classes.len());
            classes
                .iter()
                .flat_map(|class| sample_with_replacement(class, target, rng))
                .collect()
        }
    };

    tracing::debug!(
        ?strategy,
        classes = classes.len(),
        before = dataset.num_rows(),
        after = rows.len(),
        "balanced dataset"
    );
    Ok(dataset.select_rows(&rows))
}

/// Mean class size, rounded, at least one
pub fn uniform_target(rows: usize, classes: usize) -> usize {
    if classes == 0 {
        return 0;
    }
    ((rows as f64 / classes as f64).round() as usize).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ml_prep_core::{ColumnInfo, ColumnType, OutputBlock};
    use ml_prep_shuffle::Seed;
    use ndarray::Array2;
    use proptest::prelude::*;
    use test_case::test_case;

    fn labelled(labels: &[u8]) -> TabularDataset {
        let rows = labels.len();
        let features = Array2::from_shape_fn((rows, 1), |(r, _)| r as f64);
        let outputs = Array2::from_shape_fn((rows, 1), |(r, _)| f64::from(labels[r]));
        TabularDataset::new(vec![ColumnInfo::new("x", 0, ColumnType::Integer)], features)
            .unwrap()
            .with_outputs(
                OutputBlock::new(vec![ColumnInfo::new("y", 1, ColumnType::Integer)], outputs)
                    .unwrap(),
            )
            .unwrap()
    }

    fn class_sizes(data: &TabularDataset) -> Vec<usize> {
        group_by_output(data).unwrap().iter().map(Vec::len).collect()
    }

    #[test]
    fn test_requires_outputs() {
        let data = TabularDataset::new(
            vec![ColumnInfo::new("x", 0, ColumnType::Integer)],
            Array2::zeros((2, 1)),
        )
        .unwrap();
        let err = balance(&data, BalanceStrategy::Uniform, &mut Seed::new(1).to_rng()).unwrap_err();
        assert_eq!(err.kind(), ml_prep_core::ErrorKind::FilterExecution);
    }

    #[test]
    fn test_undersampling_keeps_row_order() {
        let data = labelled(&[0, 1, 1, 1, 0, 1]);
        let balanced = balance(&data, BalanceStrategy::Undersampling, &mut Seed::new(9).to_rng()).unwrap();
        assert_eq!(class_sizes(&balanced), vec![2, 2]);
        let rows = balanced.features().column(0).to_vec();
        assert!(rows.windows(2).all(|w| w[0] < w[1]));
        assert!(rows.contains(&0.0) && rows.contains(&4.0));
    }

    #[test]
    fn test_oversampling_keeps_originals() {
        let data = labelled(&[0, 1, 1, 1]);
        let balanced = balance(&data, BalanceStrategy::Oversampling, &mut Seed::new(2).to_rng()).unwrap();
        assert_eq!(balanced.num_rows(), 6);
        assert_eq!(balanced.slice_rows(0, 4), data);
        assert_eq!(class_sizes(&balanced), vec![3, 3]);
    }

    #[test_case(10, 3 => 3)]
    #[test_case(11, 2 => 6)]
    #[test_case(1, 5 => 1)]
    #[test_case(0, 0 => 0)]
    fn test_uniform_target(rows: usize, classes: usize) -> usize {
        uniform_target(rows, classes)
    }

    proptest! {
        #[test]
        fn prop_balance_covers_every_class(
            labels in prop::collection::vec(0u8..4, 1..80),
            seed in any::<u64>(),
        ) {
            let data = labelled(&labels);
            let before = class_sizes(&data);
            let smallest = *before.iter().min().unwrap();
            let largest = *before.iter().max().unwrap();
            let mut rng = Seed::new(seed).to_rng();

            let under = balance(&data, BalanceStrategy::Undersampling, &mut rng).unwrap();
            prop_assert!(class_sizes(&under).iter().all(|&n| n == smallest));
            prop_assert_eq!(class_sizes(&under).len(), before.len());

            let over = balance(&data, BalanceStrategy::Oversampling, &mut rng).unwrap();
            prop_assert!(class_sizes(&over).iter().all(|&n| n == largest));

            let uniform = balance(&data, BalanceStrategy::Uniform, &mut rng).unwrap();
            let target = uniform_target(labels.len(), before.len());
            prop_assert!(class_sizes(&uniform).iter().all(|&n| n == target));
        }
    }
}
