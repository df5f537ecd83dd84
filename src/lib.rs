// Revenue Ingest - Core Library
// Raw revenue records → per-country time series with engineered features,
// persisted as a delimited table and split into train/test per country.

pub mod collaborators;
pub mod persist;
pub mod ingest;
pub mod split;
pub mod config;
pub mod logging;

// Re-export commonly used types
pub use collaborators::{
    EngineeredFeatures, FeatureEngineer, FeatureError, FeatureMode, RecordSource,
    TimeSeriesConverter, COUNTRY_COLUMN, DATE_COLUMN, INDEX_COLUMN, LABEL_COLUMN,
};
pub use persist::{read_table, write_table, PersistReport, WriteMode};
pub use ingest::{merge_engineered_features, Ingestor};
pub use split::{
    split_ranges, train_test_split, train_test_split_with, SplitError, SplitRange,
    DEFAULT_TRAIN_SIZE,
};
pub use config::{IngestConfig, PipelineConfig, SplitConfig};
pub use logging::init_logging;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
