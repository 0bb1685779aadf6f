pub mod artifacts;
pub mod decision_tree;
pub mod encoder;
pub mod metrics;
pub mod random_forest;
pub mod trainer;

pub use artifacts::{EncoderPair, ModelArtifact};
pub use decision_tree::{DecisionTree, MaxFeatures, TreeParams};
pub use encoder::LabelEncoder;
pub use metrics::{ClassificationReport, ClassMetrics};
pub use random_forest::{ForestParams, ForestPrediction, RandomForest};
pub use trainer::{TrainingOutcome, TrainingPipeline, TrainingReport};

/// A fitted model mapping a feature vector to a class index.
pub trait Classifier: Send + Sync {
    fn n_features(&self) -> usize;
    fn n_classes(&self) -> usize;
    fn predict(&self, features: &[f64]) -> usize;
}

/// Model input for one reading, in `FEATURE_ORDER`.
pub fn feature_vector(pollutant_min: f64, pollutant_max: f64, pollutant_code: usize) -> Vec<f64> {
    vec![pollutant_min, pollutant_max, pollutant_code as f64]
}
