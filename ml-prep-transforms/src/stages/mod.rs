//! Individual filter stages
//!
//! Every stage is a function from a dataset to a new dataset; the pipeline
//! decides which one runs and in what order.

pub mod balance;
pub mod columns;
pub mod merge;
pub mod normalize;
pub mod rows;

use ndarray::{Array1, Array2};

/// Build a matrix from columns of equal length
pub(crate) fn assemble(rows: usize, columns: &[Array1<f64>]) -> Array2<f64> {
    let mut matrix = Array2::zeros((rows, columns.len()));
    for (position, column) in columns.iter().enumerate() {
        matrix.column_mut(position).assign(column);
    }
    matrix
}
