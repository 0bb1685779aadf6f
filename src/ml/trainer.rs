use crate::config::TrainingConfig;
use crate::error::{ProcessingError, Result};
use crate::ml::artifacts::{EncoderPair, ModelArtifact};
use crate::ml::decision_tree::{MaxFeatures, TreeParams};
use crate::ml::encoder::LabelEncoder;
use crate::ml::metrics::{accuracy, stratified_k_fold, train_test_split, ClassificationReport};
use crate::ml::random_forest::{ForestParams, RandomForest};
use crate::ml::feature_vector;
use crate::models::LabeledReading;
use crate::processors::labeler::training_rows;
use crate::utils::progress::ProgressReporter;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Everything a training run produces.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub model: ModelArtifact,
    pub encoders: EncoderPair,
    pub report: TrainingReport,
}

#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub input_rows: usize,
    pub excluded_rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub test_accuracy: f64,
    pub classification: ClassificationReport,
    /// Per-fold accuracy; empty when cross-validation was skipped
    pub cv_scores: Vec<f64>,
    pub n_trees: usize,
    pub avg_tree_depth: f64,
    pub total_nodes: usize,
    pub duration: Duration,
}

impl TrainingReport {
    pub fn cv_mean(&self) -> Option<f64> {
        if self.cv_scores.is_empty() {
            None
        } else {
            Some(self.cv_scores.iter().sum::<f64>() / self.cv_scores.len() as f64)
        }
    }

    pub fn summary(&self) -> String {
        let mut summary = String::new();

        summary.push_str("Training Summary\n");
        summary.push_str("================\n");
        summary.push_str(&format!("Input rows: {}\n", self.input_rows));
        summary.push_str(&format!("Excluded (Unknown label): {}\n", self.excluded_rows));
        summary.push_str(&format!(
            "Train / test rows: {} / {}\n",
            self.train_rows, self.test_rows
        ));
        summary.push_str(&format!(
            "Forest: {} trees, avg depth {:.1}, {} nodes\n",
            self.n_trees, self.avg_tree_depth, self.total_nodes
        ));
        summary.push_str(&format!("Training time: {:.2}s\n", self.duration.as_secs_f64()));
        summary.push_str(&format!("\nTest accuracy: {:.4}\n\n", self.test_accuracy));
        summary.push_str(&self.classification.format());

        match self.cv_mean() {
            Some(mean) => {
                let scores: Vec<String> =
                    self.cv_scores.iter().map(|s| format!("{:.4}", s)).collect();
                summary.push_str(&format!(
                    "\nCross-validation scores ({} folds): [{}]\n",
                    self.cv_scores.len(),
                    scores.join(", ")
                ));
                summary.push_str(&format!("Mean CV accuracy: {:.4}\n", mean));
            }
            None => summary.push_str("\nCross-validation: skipped\n"),
        }

        summary
    }
}

/// Fits encoders and a random forest on labeled readings.
pub struct TrainingPipeline {
    config: TrainingConfig,
    show_progress: bool,
}

impl TrainingPipeline {
    pub fn new(config: TrainingConfig) -> Self {
        Self {
            config,
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn forest_params(&self) -> ForestParams {
        ForestParams {
            n_estimators: self.config.n_estimators,
            seed: self.config.seed,
            bootstrap: true,
            tree: TreeParams {
                max_depth: self.config.max_depth,
                min_samples_split: self.config.min_samples_split,
                max_features: MaxFeatures::Sqrt,
            },
        }
    }

    pub fn train(&self, labeled: &[LabeledReading]) -> Result<TrainingOutcome> {
        self.config.validate()?;
        let start = Instant::now();

        let rows = training_rows(labeled);
        let excluded_rows = labeled.len() - rows.len();
        if excluded_rows > 0 {
            info!("Excluding {} rows without a usable label", excluded_rows);
        }
        if rows.len() < 2 {
            return Err(ProcessingError::Model(format!(
                "need at least 2 labeled rows to train, got {}",
                rows.len()
            )));
        }

        let encoders = EncoderPair {
            pollutant: LabelEncoder::fit("pollutant", rows.iter().map(|r| r.pollutant_id)),
            label: LabelEncoder::fit("label", rows.iter().map(|r| r.pollution_level)),
        };
        debug!(
            "Encoders: {} pollutants, {} labels",
            encoders.pollutant.n_classes(),
            encoders.label.n_classes()
        );

        let mut samples = Vec::with_capacity(rows.len());
        let mut targets = Vec::with_capacity(rows.len());
        for row in &rows {
            let code = encoders.pollutant.transform(&row.pollutant_id)?;
            samples.push(feature_vector(row.pollutant_min, row.pollutant_max, code));
            targets.push(encoders.label.transform(&row.pollution_level)?);
        }
        let n_classes = encoders.label.n_classes();
        let params = self.forest_params();

        let (train_idx, test_idx) = train_test_split(samples.len(), self.config.test_size, self.config.seed)?;
        let (train_x, train_y) = subset(&samples, &targets, &train_idx);
        let (test_x, test_y) = subset(&samples, &targets, &test_idx);
        info!(
            "Training random forest ({} trees) on {} rows, holding out {}",
            params.n_estimators,
            train_x.len(),
            test_x.len()
        );

        let progress = ProgressReporter::new(
            params.n_estimators as u64,
            "Fitting trees",
            !self.show_progress,
        );
        let forest = RandomForest::fit(&train_x, &train_y, n_classes, &params, Some(&progress))?;
        progress.finish_with_message("Forest fitted");

        let predicted = forest.predict_batch(&test_x);
        let class_names: Vec<String> = encoders
            .label
            .classes()
            .iter()
            .map(|c| c.to_string())
            .collect();
        let classification = ClassificationReport::new(&test_y, &predicted, &class_names);
        let test_accuracy = classification.accuracy;
        info!("Test accuracy: {:.4}", test_accuracy);

        let cv_scores = self.cross_validate(&samples, &targets, n_classes, &params)?;

        let report = TrainingReport {
            input_rows: labeled.len(),
            excluded_rows,
            train_rows: train_x.len(),
            test_rows: test_x.len(),
            test_accuracy,
            classification,
            cv_scores,
            n_trees: forest.n_trees(),
            avg_tree_depth: forest.avg_depth(),
            total_nodes: forest.total_nodes(),
            duration: start.elapsed(),
        };

        let model = ModelArtifact::new(forest, train_x.len(), Some(test_accuracy));

        Ok(TrainingOutcome {
            model,
            encoders,
            report,
        })
    }

    fn cross_validate(
        &self,
        samples: &[Vec<f64>],
        targets: &[usize],
        n_classes: usize,
        params: &ForestParams,
    ) -> Result<Vec<f64>> {
        let k = self.config.cv_folds;
        if k < 2 {
            return Ok(Vec::new());
        }
        if samples.len() < k {
            warn!(
                "Skipping cross-validation: {} rows is fewer than {} folds",
                samples.len(),
                k
            );
            return Ok(Vec::new());
        }

        let folds = stratified_k_fold(targets, k, self.config.seed)?;
        let mut scores = Vec::with_capacity(k);
        for (fold, (train_idx, valid_idx)) in folds.iter().enumerate() {
            let (train_x, train_y) = subset(samples, targets, train_idx);
            let (valid_x, valid_y) = subset(samples, targets, valid_idx);
            let forest = RandomForest::fit(&train_x, &train_y, n_classes, params, None)?;
            let score = accuracy(&valid_y, &forest.predict_batch(&valid_x));
            debug!("Fold {}: accuracy {:.4}", fold + 1, score);
            scores.push(score);
        }
        Ok(scores)
    }
}

fn subset(samples: &[Vec<f64>], targets: &[usize], indices: &[usize]) -> (Vec<Vec<f64>>, Vec<usize>) {
    indices
        .iter()
        .map(|&i| (samples[i].clone(), targets[i]))
        .unzip()
}
