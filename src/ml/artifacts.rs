//! On-disk model and encoder artifacts.
//!
//! Both files are bincode. The model artifact records the feature order it
//! was fit with and a format version; loading refuses anything that does not
//! match the running build.

use crate::error::{ProcessingError, Result};
use crate::ml::encoder::LabelEncoder;
use crate::ml::random_forest::RandomForest;
use crate::models::{Category, Pollutant};
use crate::utils::constants::{ARTIFACT_VERSION, FEATURE_ORDER};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub version: u32,
    pub feature_order: Vec<String>,
    pub trained_at: DateTime<Utc>,
    pub training_rows: usize,
    pub test_accuracy: Option<f64>,
    pub forest: RandomForest,
}

impl ModelArtifact {
    pub fn new(forest: RandomForest, training_rows: usize, test_accuracy: Option<f64>) -> Self {
        Self {
            version: ARTIFACT_VERSION,
            feature_order: FEATURE_ORDER.iter().map(|s| s.to_string()).collect(),
            trained_at: Utc::now(),
            training_rows,
            test_accuracy,
            forest,
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_bincode(path, self)?;
        info!("Saved model to {}", path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let artifact: Self = read_bincode(path)?;
        artifact.check_compatible()?;
        Ok(artifact)
    }

    fn check_compatible(&self) -> Result<()> {
        if self.version != ARTIFACT_VERSION {
            return Err(ProcessingError::Model(format!(
                "model artifact version {} is not supported (expected {})",
                self.version, ARTIFACT_VERSION
            )));
        }
        if self.feature_order.len() != FEATURE_ORDER.len()
            || self.feature_order.iter().zip(FEATURE_ORDER).any(|(a, b)| a != b)
        {
            return Err(ProcessingError::Model(format!(
                "model was fit with features {:?}, expected {:?}",
                self.feature_order, FEATURE_ORDER
            )));
        }
        Ok(())
    }
}

/// The two categorical encoders the model depends on. They are only valid
/// together with the model they were fit alongside.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderPair {
    pub pollutant: LabelEncoder<Pollutant>,
    pub label: LabelEncoder<Category>,
}

impl EncoderPair {
    pub fn save(&self, path: &Path) -> Result<()> {
        write_bincode(path, self)?;
        info!("Saved encoders to {}", path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        read_bincode(path)
    }
}

fn write_bincode<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut writer = BufWriter::new(File::create(path)?);
    bincode::serialize_into(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

fn read_bincode<T: DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Err(ProcessingError::MissingData(format!(
            "artifact not found: {}",
            path.display()
        )));
    }
    let reader = BufReader::new(File::open(path)?);
    Ok(bincode::deserialize_from(reader)?)
}
