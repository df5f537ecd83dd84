// ⚙️ Pipeline Configuration - TOML
//
// ```toml
// [ingest]
// dir_raw = "data/raw"
// path_processed = "data/processed/revenue.csv"
// write_mode = "append"      # optional, default "overwrite"
//
// [split]
// train_size = 0.8           # optional
// ```

use crate::persist::WriteMode;
use crate::split::{validate_train_size, DEFAULT_TRAIN_SIZE};
use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_train_size() -> f64 {
    DEFAULT_TRAIN_SIZE
}

/// Where raw records come from and where the processed frame goes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestConfig {
    pub dir_raw: PathBuf,
    pub path_processed: PathBuf,
    #[serde(default)]
    pub write_mode: WriteMode,
}

impl IngestConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.dir_raw.as_os_str().is_empty(), "ingest.dir_raw must not be empty");
        ensure!(
            !self.path_processed.as_os_str().is_empty(),
            "ingest.path_processed must not be empty"
        );
        Ok(())
    }
}

/// Train/test split settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Fraction of each country's labelled span used for training (0.0 to 1.0)
    #[serde(default = "default_train_size")]
    pub train_size: f64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        SplitConfig {
            train_size: DEFAULT_TRAIN_SIZE,
        }
    }
}

impl SplitConfig {
    pub fn validate(&self) -> Result<()> {
        Ok(validate_train_size(self.train_size)?)
    }
}

/// PipelineConfig - Both stages in one file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub ingest: IngestConfig,
    #[serde(default)]
    pub split: SplitConfig,
}

impl PipelineConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: PipelineConfig = toml::from_str(text).context("Failed to parse pipeline config")?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        self.ingest.validate()?;
        self.split.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_apply() {
        let config = PipelineConfig::from_toml_str(
            r#"
            [ingest]
            dir_raw = "data/raw"
            path_processed = "data/processed.csv"
            "#,
        )
        .unwrap();

        assert_eq!(config.ingest.write_mode, WriteMode::Overwrite);
        assert_eq!(config.split.train_size, 0.8);
    }

    #[test]
    fn test_full_config() {
        let config = PipelineConfig::from_toml_str(
            r#"
            [ingest]
            dir_raw = "raw"
            path_processed = "out.csv"
            write_mode = "append"

            [split]
            train_size = 0.6
            "#,
        )
        .unwrap();

        assert_eq!(config.ingest.write_mode, WriteMode::Append);
        assert_eq!(config.split, SplitConfig { train_size: 0.6 });
    }

    #[test]
    fn test_rejects_bad_train_size() {
        let err = PipelineConfig::from_toml_str(
            r#"
            [ingest]
            dir_raw = "raw"
            path_processed = "out.csv"

            [split]
            train_size = 1.2
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("train_size"));
    }

    #[test]
    fn test_rejects_unknown_write_mode() {
        let result = PipelineConfig::from_toml_str(
            r#"
            [ingest]
            dir_raw = "raw"
            path_processed = "out.csv"
            write_mode = "merge"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_empty_paths() {
        let config = IngestConfig {
            dir_raw: PathBuf::new(),
            path_processed: PathBuf::from("out.csv"),
            write_mode: WriteMode::Overwrite,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pipeline.toml");
        std::fs::write(
            &path,
            "[ingest]\ndir_raw = \"raw\"\npath_processed = \"out.csv\"\n",
        )
        .unwrap();

        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.ingest.dir_raw, PathBuf::from("raw"));

        assert!(PipelineConfig::load(&dir.path().join("missing.toml")).is_err());
    }
}
