// ✂️ Splitter - Per-country train/test partitions
//
// For each country:
//   start     = index of the first row with a next_months_revenue value
//   end       = index of the last such row
//   train_end = start + round(train_size * (end - start))
//   train     = rows [start, train_end]
//   test      = rows [train_end, end]
//
// The row at train_end lands in BOTH partitions. A country with no labelled
// row falls back to its first and last index instead of failing. Rows whose
// country is missing belong to no group and are never split.

use crate::collaborators::{COUNTRY_COLUMN, INDEX_COLUMN, LABEL_COLUMN};
use crate::config::SplitConfig;
use anyhow::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Fraction of each country's labelled span that goes to training
pub const DEFAULT_TRAIN_SIZE: f64 = 0.8;

const FIRST_LABELLED: &str = "first_labelled";
const LAST_LABELLED: &str = "last_labelled";
const FIRST_ROW: &str = "first_row";
const LAST_ROW: &str = "last_row";

/// SplitError - Frames or settings the splitter refuses
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SplitError {
    #[error("train_size must be between 0 and 1, got {0}")]
    InvalidTrainSize(f64),

    #[error("index column has {unique} distinct values over {rows} rows")]
    DuplicateIndex { rows: usize, unique: usize },
}

// ============================================================================
// SPLIT RANGE
// ============================================================================

/// SplitRange - Index values bounding one country's partitions (all inclusive)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitRange {
    pub start: i64,
    pub train_end: i64,
    pub end: i64,
}

impl SplitRange {
    /// Place `train_end` inside `[start, end]`
    ///
    /// Halves round to even (`round(2.5) == 2`).
    pub fn compute(start: i64, end: i64, train_size: f64) -> Self {
        let offset = (train_size * (end - start) as f64).round_ties_even() as i64;
        SplitRange {
            start,
            train_end: start + offset,
            end,
        }
    }

    pub fn is_ordered(&self) -> bool {
        self.start <= self.train_end && self.train_end <= self.end
    }
}

/// Reject train sizes outside [0, 1] (NaN included)
pub fn validate_train_size(train_size: f64) -> Result<(), SplitError> {
    if (0.0..=1.0).contains(&train_size) {
        Ok(())
    } else {
        Err(SplitError::InvalidTrainSize(train_size))
    }
}

// ============================================================================
// SPLIT
// ============================================================================

fn index_values(df: &DataFrame, name: &str) -> Result<Vec<Option<i64>>> {
    Ok(df
        .column(name)?
        .as_materialized_series()
        .cast(&DataType::Int64)?
        .i64()?
        .into_iter()
        .collect())
}

/// Compute the split range of every country, countries in ascending order
pub fn split_ranges(df: &DataFrame, train_size: f64) -> Result<Vec<(String, SplitRange)>> {
    validate_train_size(train_size)?;

    df.column(COUNTRY_COLUMN)?;
    df.column(LABEL_COLUMN)?;
    let index = df.column(INDEX_COLUMN)?.as_materialized_series();

    // Index values bound row ranges, so they must name one row each
    let unique = index.n_unique()?;
    if unique != df.height() {
        return Err(SplitError::DuplicateIndex {
            rows: df.height(),
            unique,
        }
        .into());
    }

    let idx = col(INDEX_COLUMN).cast(DataType::Int64);
    let label = col(LABEL_COLUMN).cast(DataType::Float64);
    let labelled = label.clone().is_not_null().and(label.is_not_nan());

    let grouped = df
        .clone()
        .lazy()
        .filter(col(COUNTRY_COLUMN).is_not_null())
        .with_column(col(COUNTRY_COLUMN).cast(DataType::String))
        .group_by([col(COUNTRY_COLUMN)])
        .agg([
            idx.clone().filter(labelled.clone()).first().alias(FIRST_LABELLED),
            idx.clone().filter(labelled).last().alias(LAST_LABELLED),
            idx.clone().first().alias(FIRST_ROW),
            idx.last().alias(LAST_ROW),
        ])
        .sort([COUNTRY_COLUMN], SortMultipleOptions::default())
        .collect()?;

    let countries: Vec<Option<String>> = grouped
        .column(COUNTRY_COLUMN)?
        .as_materialized_series()
        .str()?
        .into_iter()
        .map(|c| c.map(str::to_string))
        .collect();
    let first_labelled = index_values(&grouped, FIRST_LABELLED)?;
    let last_labelled = index_values(&grouped, LAST_LABELLED)?;
    let first_row = index_values(&grouped, FIRST_ROW)?;
    let last_row = index_values(&grouped, LAST_ROW)?;

    let mut ranges = Vec::with_capacity(grouped.height());
    for (i, country) in countries.into_iter().enumerate() {
        let Some(country) = country else {
            continue;
        };

        if first_labelled[i].is_none() {
            warn!(
                country = %country,
                "no labelled rows, falling back to the full span of the country"
            );
        }

        let (Some(start), Some(end)) = (
            first_labelled[i].or(first_row[i]),
            last_labelled[i].or(last_row[i]),
        ) else {
            continue;
        };

        let range = SplitRange::compute(start, end, train_size);
        debug_assert!(range.is_ordered());
        debug!(
            country = %country,
            start = range.start,
            train_end = range.train_end,
            end = range.end,
            "split range"
        );
        ranges.push((country, range));
    }

    Ok(ranges)
}

/// Rows whose index lies in `[from, to]`
fn index_between(df: &DataFrame, from: i64, to: i64) -> LazyFrame {
    let idx = col(INDEX_COLUMN).cast(DataType::Int64);
    df.clone()
        .lazy()
        .filter(idx.clone().gt_eq(lit(from)).and(idx.lt_eq(lit(to))))
}

/// Split a processed frame into train and test partitions, country by country
///
/// # Arguments
/// * `df` - Frame with `index`, `country` and `next_months_revenue` columns
/// * `train_size` - Fraction in [0, 1] (see `DEFAULT_TRAIN_SIZE`)
///
/// # Returns
/// * `Ok((train, test))` - Rows keep their original index values
/// * `Err(anyhow::Error)` - Missing column, repeated index or out-of-range train_size
pub fn train_test_split(df: &DataFrame, train_size: f64) -> Result<(DataFrame, DataFrame)> {
    let ranges = split_ranges(df, train_size)?;
    if ranges.is_empty() {
        return Ok((df.clear(), df.clear()));
    }

    let mut train = Vec::with_capacity(ranges.len());
    let mut test = Vec::with_capacity(ranges.len());
    for (_, range) in &ranges {
        train.push(index_between(df, range.start, range.train_end));
        test.push(index_between(df, range.train_end, range.end));
    }

    let train = concat(train, UnionArgs::default())?.collect()?;
    let test = concat(test, UnionArgs::default())?.collect()?;
    info!(
        "✂️  Split {} countries: {} train rows, {} test rows",
        ranges.len(),
        train.height(),
        test.height()
    );

    Ok((train, test))
}

/// `train_test_split` driven by configuration
pub fn train_test_split_with(df: &DataFrame, config: &SplitConfig) -> Result<(DataFrame, DataFrame)> {
    config.validate()?;
    train_test_split(df, config.train_size)
}

// ============================================================================
// TESTS
// ============================================================================
