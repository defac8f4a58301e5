//! Descriptive statistics over tabular datasets
//!
//! Statistics are gathered in two passes. The first pass folds a
//! [`RunningStats`] per column; its min/max fix the histogram edges used by
//! the second pass. Both passes are plain accumulators with a `merge`
//! operation, so they can be filled chunk by chunk and combined.

use std::collections::{BTreeMap, BTreeSet};

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

use crate::column::{format_integer, ColumnInfo, ColumnType};
use crate::dataset::TabularDataset;
use crate::metadata::{ColumnSummary, LastColumnSummary};

/// Default number of histogram bins
pub const DEFAULT_HISTOGRAM_BINS: usize = 10;

/// Above this many distinct values the last column is not reported as classes
pub const CLASS_LIMIT: usize = 200;

/// Above this many distinct values the last column's distinct count is dropped
pub const UNIQUE_LIMIT: usize = 1000;

/// Count, extremes, mean and variance accumulated with Welford's method
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunningStats {
    count: u64,
    min: f64,
    max: f64,
    mean: f64,
    m2: f64,
}

impl RunningStats {
    /// Create an empty accumulator
    pub fn new() -> Self {
        Self {
            count: 0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            mean: 0.0,
            m2: 0.0,
        }
    }

    /// Add one observation
    pub fn add(&mut self, value: f64) {
        self.count += 1;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    /// Combine two partial accumulators
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        if self.count == 0 {
            return *other;
        }
        if other.count == 0 {
            return *self;
        }
        let count = self.count + other.count;
        let delta = other.mean - self.mean;
        let mean = self.mean + delta * other.count as f64 / count as f64;
        let m2 = self.m2
            + other.m2
            + delta * delta * (self.count as f64 * other.count as f64) / count as f64;
        Self {
            count,
            min: self.min.min(other.min),
            max: self.max.max(other.max),
            mean,
            m2,
        }
    }

    /// Number of observations
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Smallest observation
    pub fn min(&self) -> Option<f64> {
        (self.count > 0).then_some(self.min)
    }

    /// Largest observation
    pub fn max(&self) -> Option<f64> {
        (self.count > 0).then_some(self.max)
    }

    /// Arithmetic mean
    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then_some(self.mean)
    }

    /// Sample variance (n - 1 denominator); 0 for a single observation
    pub fn variance(&self) -> Option<f64> {
        match self.count {
            0 => None,
            1 => Some(0.0),
            n => Some(self.m2 / (n - 1) as f64),
        }
    }

    /// Sample standard deviation
    pub fn stdev(&self) -> Option<f64> {
        self.variance().map(f64::sqrt)
    }
}

impl Default for RunningStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed-width histogram over a known range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    min: f64,
    max: f64,
    width: f64,
    counts: Vec<u64>,
}

impl Histogram {
    /// Create a histogram with `bins` buckets spanning `min..=max`
    ///
    /// A degenerate range uses a bin width of 1.
    pub fn new(min: f64, max: f64, bins: usize) -> Self {
        let bins = bins.max(1);
        let width = if max > min {
            (max - min) / bins as f64
        } else {
            1.0
        };
        Self {
            min,
            max,
            width,
            counts: vec![0; bins],
        }
    }

    /// Count one value; out-of-range values land in the nearest edge bucket
    pub fn add(&mut self, value: f64) {
        let last = self.counts.len() - 1;
        let position = ((value - self.min) / self.width).floor();
        let bucket = if position <= 0.0 {
            0
        } else {
            (position as usize).min(last)
        };
        self.counts[bucket] += 1;
    }

    /// Combine two histograms built over the same range
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        let mut merged = self.clone();
        for (count, extra) in merged.counts.iter_mut().zip(&other.counts) {
            *count += extra;
        }
        merged
    }

    /// Bucket counts
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Bucket edges, one more than the number of buckets; the last edge is the maximum
    pub fn edges(&self) -> Vec<f64> {
        let bins = self.counts.len();
        let mut edges: Vec<f64> = (0..=bins).map(|i| self.min + i as f64 * self.width).collect();
        if self.max > self.min {
            edges[bins] = self.max;
        }
        edges
    }
}

/// First pass: per-column running statistics
#[derive(Debug, Clone, PartialEq)]
pub struct FirstPass {
    columns: Vec<RunningStats>,
}

impl FirstPass {
    /// Create an accumulator for `num_columns` columns
    pub fn new(num_columns: usize) -> Self {
        Self {
            columns: vec![RunningStats::new(); num_columns],
        }
    }

    /// Fold one row
    pub fn observe(&mut self, row: ArrayView1<'_, f64>) {
        for (stats, &value) in self.columns.iter_mut().zip(row.iter()) {
            stats.add(value);
        }
    }

    /// Combine two partial first passes
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            columns: self
                .columns
                .iter()
                .zip(&other.columns)
                .map(|(left, right)| left.merge(right))
                .collect(),
        }
    }

    /// Per-column results
    pub fn columns(&self) -> &[RunningStats] {
        &self.columns
    }

    /// Start the second pass with histogram edges taken from this pass
    pub fn second_pass(&self, bins: usize) -> SecondPass {
        SecondPass {
            histograms: self
                .columns
                .iter()
                .map(|stats| match (stats.min(), stats.max()) {
                    (Some(min), Some(max)) => Some(Histogram::new(min, max, bins)),
                    _ => None,
                })
                .collect(),
        }
    }
}

/// Second pass: per-column histograms
#[derive(Debug, Clone, PartialEq)]
pub struct SecondPass {
    histograms: Vec<Option<Histogram>>,
}

impl SecondPass {
    /// Fold one row
    pub fn observe(&mut self, row: ArrayView1<'_, f64>) {
        for (histogram, &value) in self.histograms.iter_mut().zip(row.iter()) {
            if let Some(histogram) = histogram {
                histogram.add(value);
            }
        }
    }

    /// Combine two partial second passes started from the same first pass
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            histograms: self
                .histograms
                .iter()
                .zip(&other.histograms)
                .map(|(left, right)| match (left, right) {
                    (Some(left), Some(right)) => Some(left.merge(right)),
                    (left, _) => left.clone(),
                })
                .collect(),
        }
    }

    /// Per-column histograms; `None` for columns without observations
    pub fn histograms(&self) -> &[Option<Histogram>] {
        &self.histograms
    }
}

/// Classification profile of the designated output column
#[derive(Debug, Clone, PartialEq)]
pub struct LastColumnCounter {
    total: u64,
    min: Option<f64>,
    max: Option<f64>,
    distinct: Option<BTreeSet<String>>,
    classes: Option<BTreeMap<String, u64>>,
}

impl LastColumnCounter {
    /// Create an empty counter
    pub fn new() -> Self {
        Self {
            total: 0,
            min: None,
            max: None,
            distinct: Some(BTreeSet::new()),
            classes: Some(BTreeMap::new()),
        }
    }

    /// Observe a numeric value; a non-integer value disables class counts
    pub fn update(&mut self, value: f64) {
        self.track_range(value);
        if value.fract() == 0.0 {
            self.count(format_integer(value));
        } else {
            self.classes = None;
            self.track_distinct(value.to_string());
        }
    }

    /// Observe a text label stored under the given class code
    pub fn update_label(&mut self, label: &str, code: f64) {
        self.track_range(code);
        self.count(label.to_string());
    }

    /// Observe the stored value of a column cell
    pub fn update_cell(&mut self, column: &ColumnInfo, stored: f64) {
        match (column.column_type, column.class_key(stored)) {
            (ColumnType::Text, Some(label)) => self.update_label(&label, stored),
            _ => self.update(stored),
        }
    }

    fn track_range(&mut self, value: f64) {
        self.total += 1;
        self.min = Some(self.min.map_or(value, |min| min.min(value)));
        self.max = Some(self.max.map_or(value, |max| max.max(value)));
    }

    fn count(&mut self, key: String) {
        self.track_distinct(key.clone());
        if let Some(classes) = &mut self.classes {
            *classes.entry(key).or_insert(0) += 1;
            if classes.len() > CLASS_LIMIT {
                self.classes = None;
            }
        }
    }

    fn track_distinct(&mut self, key: String) {
        if let Some(distinct) = &mut self.distinct {
            distinct.insert(key);
            if distinct.len() > UNIQUE_LIMIT {
                self.distinct = None;
            }
        }
    }

    /// Combine two partial counters
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        let min = match (self.min, other.min) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        let max = match (self.max, other.max) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        let distinct = match (&self.distinct, &other.distinct) {
            (Some(a), Some(b)) => {
                let union: BTreeSet<String> = a.union(b).cloned().collect();
                (union.len() <= UNIQUE_LIMIT).then_some(union)
            }
            _ => None,
        };
        let classes = match (&self.classes, &other.classes) {
            (Some(a), Some(b)) => {
                let mut union = a.clone();
                for (key, count) in b {
                    *union.entry(key.clone()).or_insert(0) += count;
                }
                (union.len() <= CLASS_LIMIT).then_some(union)
            }
            _ => None,
        };
        Self {
            total: self.total + other.total,
            min,
            max,
            distinct,
            classes,
        }
    }

    /// Summary of everything observed so far
    pub fn get_result(&self) -> LastColumnSummary {
        let classes = self.classes.clone().filter(|_| self.total > 0);
        let distribution = classes.as_ref().map(|classes| {
            classes
                .iter()
                .map(|(key, &count)| (key.clone(), count as f64 / self.total as f64))
                .collect()
        });
        LastColumnSummary {
            min: self.min,
            max: self.max,
            unique: self.distinct.as_ref().map(BTreeSet::len),
            classes,
            distribution,
        }
    }
}

impl Default for LastColumnCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Computes column summaries for a tabular dataset
#[derive(Debug, Clone, Copy)]
pub struct StatisticsCollector {
    bins: usize,
}

impl StatisticsCollector {
    /// Create a collector producing histograms with `bins` buckets
    pub fn new(bins: usize) -> Self {
        Self { bins: bins.max(1) }
    }

    /// Per-column summaries and the last-column profile
    pub fn collect(&self, dataset: &TabularDataset) -> (Vec<ColumnSummary>, LastColumnSummary) {
        let features = dataset.features();
        let columns = dataset.columns();

        let mut first = FirstPass::new(columns.len());
        for row in features.rows() {
            first.observe(row);
        }

        let mut second = first.second_pass(self.bins);
        let mut last = LastColumnCounter::new();
        let last_column = columns.last();
        for row in features.rows() {
            second.observe(row);
            if let (Some(column), Some(&value)) = (last_column, row.iter().last()) {
                last.update_cell(column, value);
            }
        }

        let summaries = columns
            .iter()
            .zip(first.columns())
            .zip(second.histograms())
            .map(|((column, stats), histogram)| summarize(column, stats, histogram.as_ref()))
            .collect();

        tracing::debug!(
            columns = columns.len(),
            rows = features.nrows(),
            "collected column statistics"
        );
        (summaries, last.get_result())
    }
}

impl Default for StatisticsCollector {
    fn default() -> Self {
        Self::new(DEFAULT_HISTOGRAM_BINS)
    }
}

fn summarize(column: &ColumnInfo, stats: &RunningStats, histogram: Option<&Histogram>) -> ColumnSummary {
    let numeric = column.column_type != ColumnType::Text;
    let classes: Vec<String> = column
        .classes
        .as_ref()
        .map(|table| table.values().map(str::to_string).collect())
        .unwrap_or_default();
    ColumnSummary {
        name: column.name.clone(),
        dtype: column.column_type,
        unique: column.classes.as_ref().map(|table| table.len()),
        classes,
        locked: column.is_locked(),
        min: stats.min().filter(|_| numeric),
        max: stats.max().filter(|_| numeric),
        mean: stats.mean().filter(|_| numeric),
        stdev: stats.stdev().filter(|_| numeric),
        histogram: histogram.map(|h| h.counts().to_vec()).unwrap_or_default(),
        bins: histogram.map(Histogram::edges).unwrap_or_default(),
    }
}
