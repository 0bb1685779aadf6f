use crate::error::{ProcessingError, Result};
use crate::utils::constants::{
    DEFAULT_CLEANED_DATA_PATH, DEFAULT_CONFIG_FILE, DEFAULT_CV_FOLDS, DEFAULT_ENCODERS_PATH,
    DEFAULT_LABELED_DATA_PATH, DEFAULT_MIN_SAMPLES_SPLIT, DEFAULT_MODEL_PATH,
    DEFAULT_N_ESTIMATORS, DEFAULT_RANDOM_SEED, DEFAULT_RAW_DATA_PATH, DEFAULT_TEST_SIZE,
    ENV_PREFIX,
};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Application settings. Layered as: built-in defaults, then the optional
/// TOML file, then `AQI__SECTION__KEY` environment variables. Command-line
/// flags are applied on top by the CLI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub paths: PathsConfig,
    pub training: TrainingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub raw_data: PathBuf,
    pub cleaned_data: PathBuf,
    pub labeled_data: PathBuf,
    pub model: PathBuf,
    pub encoders: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_data: PathBuf::from(DEFAULT_RAW_DATA_PATH),
            cleaned_data: PathBuf::from(DEFAULT_CLEANED_DATA_PATH),
            labeled_data: PathBuf::from(DEFAULT_LABELED_DATA_PATH),
            model: PathBuf::from(DEFAULT_MODEL_PATH),
            encoders: PathBuf::from(DEFAULT_ENCODERS_PATH),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub n_estimators: usize,
    pub seed: u64,
    pub test_size: f64,
    /// Stratified folds for cross-validation; below 2 disables it
    pub cv_folds: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            n_estimators: DEFAULT_N_ESTIMATORS,
            seed: DEFAULT_RANDOM_SEED,
            test_size: DEFAULT_TEST_SIZE,
            cv_folds: DEFAULT_CV_FOLDS,
            max_depth: None,
            min_samples_split: DEFAULT_MIN_SAMPLES_SPLIT,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(ProcessingError::Config(
                "training.n_estimators must be at least 1".to_string(),
            ));
        }
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(ProcessingError::Config(format!(
                "training.test_size must be in (0, 1), got {}",
                self.test_size
            )));
        }
        if self.min_samples_split < 2 {
            return Err(ProcessingError::Config(
                "training.min_samples_split must be at least 2".to_string(),
            ));
        }
        if self.max_depth == Some(0) {
            return Err(ProcessingError::Config(
                "training.max_depth must be positive when set".to_string(),
            ));
        }
        Ok(())
    }
}

impl AppConfig {
    /// Load settings. An explicit `path` must exist; without one, `aqi.toml`
    /// in the working directory is read if present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file_source = match path {
            Some(p) => {
                if !p.exists() {
                    return Err(ProcessingError::Config(format!(
                        "config file not found: {}",
                        p.display()
                    )));
                }
                File::from(p).required(true)
            }
            None => File::from(Path::new(DEFAULT_CONFIG_FILE)).required(false),
        };

        let settings = Config::builder()
            .add_source(file_source)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: AppConfig = settings.try_deserialize()?;
        config.training.validate()?;
        debug!("Loaded configuration: {:?}", config);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.training.n_estimators, 100);
        assert_eq!(config.training.seed, 42);
        assert_eq!(config.training.cv_folds, 5);
        assert_eq!(config.paths.model, PathBuf::from("models/pollution_classifier.bin"));
        assert!(config.training.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.toml");
        fs::write(
            &path,
            "[training]\nn_estimators = 12\n\n[paths]\nmodel = \"out/model.bin\"\n",
        )
        .unwrap();

        let config = AppConfig::load(Some(path.as_path())).unwrap();
        assert_eq!(config.training.n_estimators, 12);
        assert_eq!(config.training.seed, 42);
        assert_eq!(config.paths.model, PathBuf::from("out/model.bin"));
        assert_eq!(config.paths.encoders, PathBuf::from("models/label_encoders.bin"));
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let result = AppConfig::load(Some(temp_dir.path().join("absent.toml").as_path()));
        assert!(matches!(result, Err(ProcessingError::Config(_))));
    }

    #[test]
    fn test_invalid_training_values_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.toml");
        fs::write(&path, "[training]\ntest_size = 1.5\n").unwrap();
        assert!(AppConfig::load(Some(path.as_path())).is_err());
    }
}
