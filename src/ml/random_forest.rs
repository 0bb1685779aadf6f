//! Bootstrap-aggregated ensemble of CART trees.
//!
//! Each tree is fit on a bootstrap sample with √features considered per
//! split. Prediction averages the trees' leaf class distributions and takes
//! the most probable class. Trees are independent, so fitting and batch
//! prediction run on the rayon pool; every tree derives its own RNG from the
//! base seed and its index, which keeps results independent of scheduling.

use crate::error::{ProcessingError, Result};
use crate::ml::decision_tree::{argmax, check_training_set, DecisionTree, MaxFeatures, TreeParams};
use crate::ml::Classifier;
use crate::utils::constants::{DEFAULT_N_ESTIMATORS, DEFAULT_RANDOM_SEED};
use crate::utils::progress::ProgressReporter;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub seed: u64,
    pub bootstrap: bool,
    pub tree: TreeParams,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: DEFAULT_N_ESTIMATORS,
            seed: DEFAULT_RANDOM_SEED,
            bootstrap: true,
            tree: TreeParams {
                max_features: MaxFeatures::Sqrt,
                ..TreeParams::default()
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    n_features: usize,
    n_classes: usize,
}

/// Forest prediction with the per-class detail behind it.
#[derive(Debug, Clone, PartialEq)]
pub struct ForestPrediction {
    pub class: usize,
    /// Mean of the trees' leaf distributions.
    pub probabilities: Vec<f64>,
    /// Hard vote count per class.
    pub votes: Vec<usize>,
    /// Probability of the winning class.
    pub confidence: f64,
}

impl RandomForest {
    pub fn fit(
        samples: &[Vec<f64>],
        labels: &[usize],
        n_classes: usize,
        params: &ForestParams,
        progress: Option<&ProgressReporter>,
    ) -> Result<Self> {
        let n_features = check_training_set(samples, labels, n_classes)?;
        if params.n_estimators == 0 {
            return Err(ProcessingError::Model("n_estimators must be at least 1".to_string()));
        }

        let n = samples.len();
        let trees = (0..params.n_estimators)
            .into_par_iter()
            .map(|tree_index| {
                let mut rng = StdRng::seed_from_u64(tree_seed(params.seed, tree_index));
                let indices: Vec<usize> = if params.bootstrap {
                    (0..n).map(|_| rng.gen_range(0..n)).collect()
                } else {
                    (0..n).collect()
                };
                let tree =
                    DecisionTree::fit_indices(samples, labels, &indices, n_classes, params.tree, &mut rng);

                if let Some(p) = progress {
                    p.increment(1);
                }
                tree
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            trees,
            n_features,
            n_classes,
        })
    }

    /// Build a forest from already-fitted trees.
    pub fn from_trees(trees: Vec<DecisionTree>) -> Result<Self> {
        let first = trees
            .first()
            .ok_or_else(|| ProcessingError::Model("empty forest".to_string()))?;
        let n_features = first.n_features();
        let n_classes = first.n_classes();
        if trees
            .iter()
            .any(|t| t.n_features() != n_features || t.n_classes() != n_classes)
        {
            return Err(ProcessingError::Model(
                "inconsistent feature or class counts across trees".to_string(),
            ));
        }
        Ok(Self {
            trees,
            n_features,
            n_classes,
        })
    }

    pub fn predict_with_votes(&self, features: &[f64]) -> ForestPrediction {
        let mut probabilities = vec![0.0; self.n_classes];
        let mut votes = vec![0usize; self.n_classes];

        for tree in &self.trees {
            for (total, p) in probabilities.iter_mut().zip(tree.predict_proba(features)) {
                *total += p;
            }
            let class = tree.predict_class(features);
            if class < self.n_classes {
                votes[class] += 1;
            }
        }

        let n_trees = self.trees.len().max(1) as f64;
        for p in &mut probabilities {
            *p /= n_trees;
        }

        let class = argmax(&probabilities);
        let confidence = probabilities.get(class).copied().unwrap_or(0.0);

        ForestPrediction {
            class,
            probabilities,
            votes,
            confidence,
        }
    }

    pub fn predict_batch(&self, samples: &[Vec<f64>]) -> Vec<usize> {
        samples.par_iter().map(|s| self.predict(s)).collect()
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn tree_at(&self, index: usize) -> &DecisionTree {
        &self.trees[index]
    }

    pub fn avg_depth(&self) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        let total: usize = self.trees.iter().map(DecisionTree::depth).sum();
        total as f64 / self.trees.len() as f64
    }

    pub fn total_nodes(&self) -> usize {
        self.trees.iter().map(DecisionTree::n_nodes).sum()
    }
}

impl Classifier for RandomForest {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn predict(&self, features: &[f64]) -> usize {
        self.predict_with_votes(features).class
    }
}

fn tree_seed(seed: u64, tree_index: usize) -> u64 {
    seed ^ (tree_index as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn banded_data() -> (Vec<Vec<f64>>, Vec<usize>) {
        let samples: Vec<Vec<f64>> = (0..60)
            .map(|i| vec![i as f64, i as f64 + 5.0, 0.0])
            .collect();
        let labels: Vec<usize> = (0..60).map(|i| i / 20).collect();
        (samples, labels)
    }

    #[test]
    fn test_forest_learns_bands() {
        let (samples, labels) = banded_data();
        let params = ForestParams {
            n_estimators: 25,
            ..ForestParams::default()
        };
        let forest = RandomForest::fit(&samples, &labels, 3, &params, None).unwrap();

        assert_eq!(forest.n_trees(), 25);
        assert_eq!(forest.n_features(), 3);
        assert_eq!(forest.n_classes(), 3);
        assert_eq!(forest.predict(&[5.0, 10.0, 0.0]), 0);
        assert_eq!(forest.predict(&[30.0, 35.0, 0.0]), 1);
        assert_eq!(forest.predict(&[55.0, 60.0, 0.0]), 2);

        let detail = forest.predict_with_votes(&[55.0, 60.0, 0.0]);
        assert_eq!(detail.class, 2);
        assert_eq!(detail.votes.iter().sum::<usize>(), 25);
        assert!(detail.confidence > 0.5);
        assert!((detail.probabilities.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_fit_is_deterministic_for_seed() {
        let (samples, labels) = banded_data();
        let params = ForestParams {
            n_estimators: 10,
            ..ForestParams::default()
        };
        let a = RandomForest::fit(&samples, &labels, 3, &params, None).unwrap();
        let b = RandomForest::fit(&samples, &labels, 3, &params, None).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_batch_matches_single() {
        let (samples, labels) = banded_data();
        let params = ForestParams {
            n_estimators: 10,
            ..ForestParams::default()
        };
        let forest = RandomForest::fit(&samples, &labels, 3, &params, None).unwrap();
        let batch = forest.predict_batch(&samples);
        let single: Vec<usize> = samples.iter().map(|s| forest.predict(s)).collect();
        assert_eq!(batch, single);
    }

    #[test]
    fn test_rejects_zero_estimators_and_empty_forest() {
        let (samples, labels) = banded_data();
        let params = ForestParams {
            n_estimators: 0,
            ..ForestParams::default()
        };
        assert!(RandomForest::fit(&samples, &labels, 3, &params, None).is_err());
        assert!(RandomForest::from_trees(Vec::new()).is_err());
    }
}
