//! Row-level stages: shuffle and split
//!
//! Both work on row indices only, so features and outputs (or whole
//! timeseries samples) move together.

use rand::Rng;

use ml_prep_core::Dataset;
use ml_prep_shuffle::permutation;

use crate::filter::SplitParams;

/// Randomly reorder rows
pub fn shuffle<R: Rng + ?Sized>(dataset: &Dataset, rng: &mut R) -> Dataset {
    let order = permutation(dataset.num_rows(), rng);
    select(dataset, &order)
}

/// Row range `[floor(n * start / 100), floor(n * end / 100))`
pub fn split_range(rows: usize, params: SplitParams) -> (usize, usize) {
    let bound = |percent: u32| rows * percent.min(100) as usize / 100;
    let start = bound(params.start);
    (start, bound(params.end).max(start))
}

/// Keep the rows inside the split range
pub fn split(dataset: &Dataset, params: SplitParams) -> Dataset {
    let (start, end) = split_range(dataset.num_rows(), params);
    match dataset {
        Dataset::Tabular(data) => data.slice_rows(start, end).into(),
        Dataset::Timeseries(data) => data.slice_samples(start, end).into(),
    }
}

/// Rows at the given indices, in order
pub fn select(dataset: &Dataset, indices: &[usize]) -> Dataset {
    match dataset {
        Dataset::Tabular(data) => data.select_rows(indices).into(),
        Dataset::Timeseries(data) => data.select_samples(indices).into(),
    }
}
