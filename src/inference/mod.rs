//! Model-based classification of a (pollutant, min, max) reading.
//!
//! The context owns a fitted classifier and the encoder pair it was trained
//! with, loaded once and shared read-only. It encodes the pollutant, builds
//! the feature vector in training order, and decodes the predicted label.

use crate::error::{ProcessingError, Result};
use crate::ml::{feature_vector, Classifier, EncoderPair, ModelArtifact, RandomForest};
use crate::models::{Category, Pollutant};
use crate::utils::constants::FEATURE_ORDER;
use rayon::prelude::*;
use std::path::Path;
use tracing::{info, warn};

/// One query for batch prediction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictionInput {
    pub pollutant: Pollutant,
    pub pollutant_min: f64,
    pub pollutant_max: f64,
}

pub struct InferenceContext<M: Classifier = RandomForest> {
    model: M,
    encoders: EncoderPair,
}

impl InferenceContext<RandomForest> {
    /// Load the model and encoder artifacts produced by a training run.
    pub fn load(model_path: &Path, encoders_path: &Path) -> Result<Self> {
        let artifact = ModelArtifact::load(model_path)?;
        let encoders = EncoderPair::load(encoders_path)?;
        info!(
            "Loaded model trained {} on {} rows ({} trees)",
            artifact.trained_at.format("%Y-%m-%d %H:%M UTC"),
            artifact.training_rows,
            artifact.forest.n_trees()
        );
        Self::new(artifact.forest, encoders)
    }
}

impl<M: Classifier> InferenceContext<M> {
    pub fn new(model: M, encoders: EncoderPair) -> Result<Self> {
        if model.n_features() != FEATURE_ORDER.len() {
            return Err(ProcessingError::Model(format!(
                "model expects {} features, readings provide {}",
                model.n_features(),
                FEATURE_ORDER.len()
            )));
        }
        if model.n_classes() != encoders.label.n_classes() {
            return Err(ProcessingError::Model(format!(
                "model has {} classes but the label encoder has {}",
                model.n_classes(),
                encoders.label.n_classes()
            )));
        }
        Ok(Self { model, encoders })
    }

    pub fn encoders(&self) -> &EncoderPair {
        &self.encoders
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Predict the category for a pollutant's min/max pair.
    ///
    /// Non-finite or negative bounds are rejected. `min > max` is accepted
    /// with a warning; the model was trained on whatever the data held.
    pub fn predict(&self, pollutant: Pollutant, pollutant_min: f64, pollutant_max: f64) -> Result<Category> {
        validate_bounds(pollutant_min, pollutant_max)?;

        let code = self.encoders.pollutant.transform(&pollutant)?;
        let features = feature_vector(pollutant_min, pollutant_max, code);
        let class = self.model.predict(&features);
        self.encoders.label.inverse_transform(class)
    }

    /// As [`predict`](Self::predict), taking the pollutant identifier as text.
    /// An identifier that is not a known pollutant is reported the same way as
    /// one the encoder never saw.
    pub fn predict_raw(&self, pollutant_id: &str, pollutant_min: f64, pollutant_max: f64) -> Result<Category> {
        let pollutant: Pollutant = pollutant_id.parse().map_err(|_| ProcessingError::UnknownCategory {
            encoder: self.encoders.pollutant.name().to_string(),
            value: pollutant_id.to_string(),
        })?;
        self.predict(pollutant, pollutant_min, pollutant_max)
    }

    /// Predict many inputs in parallel. The first failure is returned.
    pub fn predict_batch(&self, inputs: &[PredictionInput]) -> Result<Vec<Category>> {
        inputs
            .par_iter()
            .map(|input| self.predict(input.pollutant, input.pollutant_min, input.pollutant_max))
            .collect()
    }
}

fn validate_bounds(pollutant_min: f64, pollutant_max: f64) -> Result<()> {
    for (name, value) in [("pollutant_min", pollutant_min), ("pollutant_max", pollutant_max)] {
        if !value.is_finite() {
            return Err(ProcessingError::InvalidInput(format!("{} must be a finite number", name)));
        }
        if value < 0.0 {
            return Err(ProcessingError::InvalidInput(format!(
                "{} must not be negative, got {}",
                name, value
            )));
        }
    }
    if pollutant_min > pollutant_max {
        warn!(
            "pollutant_min {} exceeds pollutant_max {}; predicting anyway",
            pollutant_min, pollutant_max
        );
    }
    Ok(())
}
