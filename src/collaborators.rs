// 🔌 Collaborators - Seams for the external data-science library
// Fetching raw records, building a per-country time series and engineering
// features all live outside this crate. The ingestor only sees these traits.

use anyhow::Result;
use chrono::NaiveDate;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Column holding the entity identifier
pub const COUNTRY_COLUMN: &str = "country";

/// Column holding the time key of every series
pub const DATE_COLUMN: &str = "date";

/// Column holding the forward-looking target label
pub const LABEL_COLUMN: &str = "next_months_revenue";

/// Row label column of the processed frame (first column on disk)
pub const INDEX_COLUMN: &str = "index";

// ============================================================================
// CORE TYPES
// ============================================================================

/// FeatureMode - Which side of the model the features are built for
///
/// `Training` lets the engineer drop rows whose target is not yet reliable;
/// ingestion always asks for `Inference` so that every date is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureMode {
    Training,
    Inference,
}

/// FeatureError - Engineered output that cannot be joined back onto its series
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeatureError {
    #[error("engineered {what} has {actual} values for {expected} feature rows")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("series column 'date' must hold dates to join engineered features, found {0}")]
    DateKeyType(String),
}

/// EngineeredFeatures - Output of feature engineering for one country
///
/// `labels` and `dates` are aligned row-for-row with `features`.
#[derive(Debug, Clone)]
pub struct EngineeredFeatures {
    pub features: DataFrame,
    pub labels: Vec<Option<f64>>,
    pub dates: Vec<NaiveDate>,
}

impl EngineeredFeatures {
    pub fn new(features: DataFrame, labels: Vec<Option<f64>>, dates: Vec<NaiveDate>) -> Self {
        EngineeredFeatures {
            features,
            labels,
            dates,
        }
    }

    /// Dates and labels must line up with the feature rows
    ///
    /// A feature frame without columns has no height of its own and takes the
    /// length of `dates`.
    pub fn validate(&self) -> Result<(), FeatureError> {
        let expected = if self.features.width() == 0 {
            self.dates.len()
        } else {
            self.features.height()
        };
        if self.dates.len() != expected {
            return Err(FeatureError::LengthMismatch {
                what: "dates",
                expected,
                actual: self.dates.len(),
            });
        }
        if self.labels.len() != expected {
            return Err(FeatureError::LengthMismatch {
                what: "labels",
                expected,
                actual: self.labels.len(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// COLLABORATOR TRAITS
// ============================================================================

/// RecordSource - Loads every raw record under a location into one frame
pub trait RecordSource {
    /// Fetch raw records
    ///
    /// # Arguments
    /// * `dir_raw` - Location of the raw JSON records
    ///
    /// # Returns
    /// * `Ok(DataFrame)` - One row per record, with at least `country` and `date`
    /// * `Err(anyhow::Error)` - If the location is unreadable or malformed
    fn fetch_data(&self, dir_raw: &Path) -> Result<DataFrame>;
}

/// TimeSeriesConverter - Turns the raw records of one country into a time series
pub trait TimeSeriesConverter {
    /// Convert raw records for `country` into a date-keyed series
    ///
    /// The returned frame must carry a `date` column of dtype Date, one row per time point.
    fn convert_to_ts(&self, raw: &DataFrame, country: &str) -> Result<DataFrame>;
}

/// FeatureEngineer - Builds engineered features and the target label
pub trait FeatureEngineer {
    /// Engineer features for one country's time series
    fn engineer_features(&self, ts: &DataFrame, mode: FeatureMode) -> Result<EngineeredFeatures>;

    /// Engineer version (for log lines)
    fn version(&self) -> &str {
        "1.0.0"
    }
}
