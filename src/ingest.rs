// 📥 Ingestor - Raw records → processed frame on disk
//
// Pipeline:
//   1. fetch raw records                      (RecordSource)
//   2. one time series per country            (TimeSeriesConverter)
//   3. engineered features + target label,    (FeatureEngineer, inference mode)
//      left-joined back onto the series by date
//   4. tag rows with their country
//   5. concatenate, fresh row index 0..n
//   6. write to disk                          (persist::write_table)
//
// Countries are processed in order of first appearance in the raw records,
// so the output is deterministic for a given input. Records without a
// country belong to no series and are left out.

use crate::collaborators::{
    EngineeredFeatures, FeatureEngineer, FeatureError, FeatureMode, RecordSource,
    TimeSeriesConverter, COUNTRY_COLUMN, DATE_COLUMN, INDEX_COLUMN, LABEL_COLUMN,
};
use crate::config::IngestConfig;
use crate::persist::{write_table, WriteMode};
use anyhow::Result;
use polars::prelude::*;
use std::path::Path;
use tracing::{debug, info, warn};

/// Temporary column pinning the series order through the join
const ROW_ORDER_COLUMN: &str = "__row_order";

/// Ingestor - Owns the three collaborators and runs the pipeline
pub struct Ingestor {
    source: Box<dyn RecordSource>,
    converter: Box<dyn TimeSeriesConverter>,
    engineer: Box<dyn FeatureEngineer>,
}

impl Ingestor {
    pub fn new(
        source: impl RecordSource + 'static,
        converter: impl TimeSeriesConverter + 'static,
        engineer: impl FeatureEngineer + 'static,
    ) -> Self {
        Ingestor {
            source: Box::new(source),
            converter: Box::new(converter),
            engineer: Box::new(engineer),
        }
    }

    /// Read raw records, process them and persist the result
    ///
    /// # Arguments
    /// * `dir_raw` - Location of the raw JSON records
    /// * `path_processed` - Destination of the delimited table
    /// * `mode` - Overwrite or append to an existing file
    ///
    /// # Returns
    /// * `Ok(DataFrame)` - The processed frame that was written
    /// * `Err(anyhow::Error)` - Collaborator, lookup or I/O failure, unchanged
    pub fn ingest(&self, dir_raw: &Path, path_processed: &Path, mode: WriteMode) -> Result<DataFrame> {
        let processed = self.process(dir_raw)?;
        let report = write_table(path_processed, &processed, mode)?;
        info!("💾 {}", report.summary());
        Ok(processed)
    }

    /// Same as `ingest`, with locations and mode taken from configuration
    pub fn ingest_with_config(&self, config: &IngestConfig) -> Result<DataFrame> {
        config.validate()?;
        self.ingest(&config.dir_raw, &config.path_processed, config.write_mode)
    }

    /// Steps 1-5: build the processed frame in memory
    pub fn process(&self, dir_raw: &Path) -> Result<DataFrame> {
        let raw = self.source.fetch_data(dir_raw)?;
        let countries = unique_countries(&raw)?;
        info!(
            "📥 Fetched {} raw records for {} countries from {}",
            raw.height(),
            countries.len(),
            dir_raw.display()
        );

        // Convert to time series
        let mut series: Vec<(String, DataFrame)> = Vec::with_capacity(countries.len());
        for country in countries {
            let ts = self.converter.convert_to_ts(&raw, &country)?;
            series.push((country, ts));
        }

        // Add engineered features
        let mut processed = Vec::with_capacity(series.len());
        for (country, ts) in series {
            let merged = merge_engineered_features(&ts, self.engineer.as_ref())?;
            debug!(
                country = %country,
                rows = merged.height(),
                engineer = self.engineer.version(),
                "merged engineered features"
            );
            processed.push(
                merged
                    .lazy()
                    .with_column(lit(country.as_str()).alias(COUNTRY_COLUMN)),
            );
        }

        if processed.is_empty() {
            warn!(dir_raw = %dir_raw.display(), "no country in raw records, nothing to process");
            return Ok(DataFrame::empty());
        }

        let table = concat_lf_diagonal(processed, UnionArgs::default())?
            .with_row_index(INDEX_COLUMN, None)
            .collect()?;
        info!("✓ Processed frame: {} rows, {} columns", table.height(), table.width());

        Ok(table)
    }
}

/// Distinct non-null countries, in order of first appearance
fn unique_countries(raw: &DataFrame) -> Result<Vec<String>> {
    let countries = raw
        .column(COUNTRY_COLUMN)?
        .as_materialized_series()
        .unique_stable()?
        .cast(&DataType::String)?;
    let countries: Vec<String> = countries
        .str()?
        .into_iter()
        .flatten()
        .map(str::to_string)
        .collect();
    Ok(countries)
}

/// Engineer features for one series and left-join them back on `date`
///
/// Every row of `ts` is kept, in its original order; engineered rows whose
/// date is not in `ts` are dropped.
pub fn merge_engineered_features(ts: &DataFrame, engineer: &dyn FeatureEngineer) -> Result<DataFrame> {
    let engineered = engineer.engineer_features(ts, FeatureMode::Inference)?;
    engineered.validate()?;

    let key_type = ts.column(DATE_COLUMN)?.dtype();
    if key_type != &DataType::Date {
        return Err(FeatureError::DateKeyType(key_type.to_string()).into());
    }

    let EngineeredFeatures {
        mut features,
        labels,
        dates,
    } = engineered;
    features.with_column(Series::new(DATE_COLUMN.into(), dates))?;
    features.with_column(Series::new(LABEL_COLUMN.into(), labels))?;

    let merged = ts
        .clone()
        .lazy()
        .with_row_index(ROW_ORDER_COLUMN, None)
        .join(
            features.lazy(),
            [col(DATE_COLUMN)],
            [col(DATE_COLUMN)],
            JoinArgs::new(JoinType::Left),
        )
        .sort([ROW_ORDER_COLUMN], SortMultipleOptions::default().with_maintain_order(true))
        .collect()?
        .drop(ROW_ORDER_COLUMN)?;

    Ok(merged)
}

// ============================================================================
// TESTS
// ============================================================================
