//! CART classification tree.
//!
//! Nodes live in a flat vector; a split sends samples with
//! `feature <= threshold` left. Splits minimise weighted Gini impurity over
//! midpoints between consecutive distinct feature values. Leaves keep the
//! class distribution of the training samples that reached them, so a forest
//! can average probabilities rather than count hard votes.

use crate::error::{ProcessingError, Result};
use crate::ml::Classifier;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// How many features to consider at each split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaxFeatures {
    All,
    /// `max(1, floor(sqrt(n_features)))`
    Sqrt,
}

impl MaxFeatures {
    fn resolve(self, n_features: usize) -> usize {
        match self {
            MaxFeatures::All => n_features,
            MaxFeatures::Sqrt => ((n_features as f64).sqrt() as usize).max(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub max_features: MaxFeatures,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            max_features: MaxFeatures::All,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        class: usize,
        proba: Vec<f64>,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

impl TreeNode {
    pub fn is_leaf(&self) -> bool {
        matches!(self, TreeNode::Leaf { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<TreeNode>,
    n_features: usize,
    n_classes: usize,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

struct TreeBuilder<'a, R: Rng> {
    samples: &'a [Vec<f64>],
    labels: &'a [usize],
    n_classes: usize,
    n_features: usize,
    params: TreeParams,
    rng: &'a mut R,
    nodes: Vec<TreeNode>,
}

impl DecisionTree {
    /// Fit on all samples.
    pub fn fit<R: Rng>(
        samples: &[Vec<f64>],
        labels: &[usize],
        n_classes: usize,
        params: TreeParams,
        rng: &mut R,
    ) -> Result<Self> {
        let indices: Vec<usize> = (0..samples.len()).collect();
        Self::fit_indices(samples, labels, &indices, n_classes, params, rng)
    }

    /// Fit on the rows named by `indices`. Repeated indices weigh a row
    /// more, which is how bootstrap samples are expressed.
    pub fn fit_indices<R: Rng>(
        samples: &[Vec<f64>],
        labels: &[usize],
        indices: &[usize],
        n_classes: usize,
        params: TreeParams,
        rng: &mut R,
    ) -> Result<Self> {
        let n_features = check_training_set(samples, labels, n_classes)?;
        if indices.is_empty() {
            return Err(ProcessingError::Model("cannot fit a tree on zero samples".to_string()));
        }
        if let Some(&bad) = indices.iter().find(|&&i| i >= samples.len()) {
            return Err(ProcessingError::Model(format!("sample index {} out of range", bad)));
        }

        let mut builder = TreeBuilder {
            samples,
            labels,
            n_classes,
            n_features,
            params,
            rng,
            nodes: Vec::new(),
        };
        builder.build(indices.to_vec(), 0);

        Ok(Self {
            nodes: builder.nodes,
            n_features,
            n_classes,
        })
    }

    /// Class distribution of the leaf `features` falls into.
    pub fn predict_proba(&self, features: &[f64]) -> &[f64] {
        let mut idx = 0usize;
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf { proba, .. } => return proba,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let value = features.get(*feature).copied().unwrap_or(0.0);
                    idx = if value <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn predict_class(&self, features: &[f64]) -> usize {
        let mut idx = 0usize;
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf { class, .. } => return *class,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let value = features.get(*feature).copied().unwrap_or(0.0);
                    idx = if value <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    pub fn node_at(&self, index: usize) -> &TreeNode {
        &self.nodes[index]
    }

    /// Longest root-to-leaf path.
    pub fn depth(&self) -> usize {
        if self.nodes.is_empty() {
            return 0;
        }
        let mut max_depth = 0;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((idx, depth)) = stack.pop() {
            match &self.nodes[idx] {
                TreeNode::Leaf { .. } => max_depth = max_depth.max(depth),
                TreeNode::Split { left, right, .. } => {
                    stack.push((*left, depth + 1));
                    stack.push((*right, depth + 1));
                }
            }
        }
        max_depth
    }
}

impl Classifier for DecisionTree {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn predict(&self, features: &[f64]) -> usize {
        self.predict_class(features)
    }
}

impl<R: Rng> TreeBuilder<'_, R> {
    fn build(&mut self, indices: Vec<usize>, depth: usize) -> usize {
        let counts = self.class_counts(&indices);
        let n = indices.len();
        let impurity = gini(&counts, n);

        let depth_reached = self.params.max_depth.is_some_and(|max| depth >= max);
        if impurity == 0.0 || n < self.params.min_samples_split.max(2) || depth_reached {
            return self.push_leaf(&counts, n);
        }

        let Some(split) = self.best_split(&indices) else {
            return self.push_leaf(&counts, n);
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| self.samples[i][split.feature] <= split.threshold);

        let node = self.nodes.len();
        self.nodes.push(TreeNode::Leaf {
            class: 0,
            proba: Vec::new(),
        });
        let left = self.build(left_idx, depth + 1);
        let right = self.build(right_idx, depth + 1);
        self.nodes[node] = TreeNode::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        node
    }

    fn push_leaf(&mut self, counts: &[usize], n: usize) -> usize {
        let proba: Vec<f64> = counts.iter().map(|&c| c as f64 / n as f64).collect();
        let class = argmax(&proba);
        self.nodes.push(TreeNode::Leaf { class, proba });
        self.nodes.len() - 1
    }

    fn class_counts(&self, indices: &[usize]) -> Vec<usize> {
        let mut counts = vec![0usize; self.n_classes];
        for &i in indices {
            counts[self.labels[i]] += 1;
        }
        counts
    }

    /// Features are visited in random order. At least `max_features` are
    /// evaluated; the search continues past that only while no valid split
    /// has been found.
    fn best_split(&mut self, indices: &[usize]) -> Option<BestSplit> {
        let mut features: Vec<usize> = (0..self.n_features).collect();
        features.shuffle(&mut *self.rng);
        let max_features = self.params.max_features.resolve(self.n_features);

        let mut best: Option<BestSplit> = None;
        for (visited, &feature) in features.iter().enumerate() {
            if visited >= max_features && best.is_some() {
                break;
            }
            if let Some(candidate) = self.best_split_on(indices, feature) {
                if best.as_ref().map_or(true, |b| candidate.impurity < b.impurity) {
                    best = Some(candidate);
                }
            }
        }
        best
    }

    fn best_split_on(&self, indices: &[usize], feature: usize) -> Option<BestSplit> {
        let mut sorted: Vec<(f64, usize)> = indices
            .iter()
            .map(|&i| (self.samples[i][feature], self.labels[i]))
            .collect();
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

        let n = sorted.len();
        let mut left = vec![0usize; self.n_classes];
        let mut right = vec![0usize; self.n_classes];
        for &(_, label) in &sorted {
            right[label] += 1;
        }

        let mut best: Option<BestSplit> = None;
        for pos in 0..n - 1 {
            let (value, label) = sorted[pos];
            left[label] += 1;
            right[label] -= 1;

            let next = sorted[pos + 1].0;
            if next <= value {
                continue;
            }

            let n_left = pos + 1;
            let n_right = n - n_left;
            let impurity = (n_left as f64 * gini(&left, n_left)
                + n_right as f64 * gini(&right, n_right))
                / n as f64;

            if best.as_ref().map_or(true, |b| impurity < b.impurity) {
                let mut threshold = value + (next - value) / 2.0;
                if threshold >= next {
                    threshold = value;
                }
                best = Some(BestSplit {
                    feature,
                    threshold,
                    impurity,
                });
            }
        }
        best
    }
}

fn gini(counts: &[usize], n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    1.0 - counts
        .iter()
        .map(|&c| {
            let p = c as f64 / n;
            p * p
        })
        .sum::<f64>()
}

/// Index of the largest value; ties resolve to the lowest index.
pub(crate) fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate() {
        if v > values[best] {
            best = i;
        }
    }
    best
}

/// Checks shapes and returns the feature count.
pub(crate) fn check_training_set(
    samples: &[Vec<f64>],
    labels: &[usize],
    n_classes: usize,
) -> Result<usize> {
    if samples.is_empty() {
        return Err(ProcessingError::Model("training set is empty".to_string()));
    }
    if samples.len() != labels.len() {
        return Err(ProcessingError::Model(format!(
            "{} samples but {} labels",
            samples.len(),
            labels.len()
        )));
    }
    let n_features = samples[0].len();
    if n_features == 0 || samples.iter().any(|s| s.len() != n_features) {
        return Err(ProcessingError::Model("inconsistent feature counts".to_string()));
    }
    if samples.iter().flatten().any(|v| !v.is_finite()) {
        return Err(ProcessingError::Model("training features must be finite".to_string()));
    }
    if let Some(&bad) = labels.iter().find(|&&l| l >= n_classes) {
        return Err(ProcessingError::Model(format!(
            "label {} out of range for {} classes",
            bad, n_classes
        )));
    }
    Ok(n_features)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn test_single_threshold() {
        let samples = vec![vec![0.1], vec![0.3], vec![0.7], vec![0.9]];
        let labels = vec![0, 0, 1, 1];
        let tree = DecisionTree::fit(&samples, &labels, 2, TreeParams::default(), &mut rng()).unwrap();

        assert_eq!(tree.predict(&[0.2]), 0);
        assert_eq!(tree.predict(&[0.8]), 1);
        assert_eq!(tree.predict(&[0.5]), 0); // <= midpoint goes left
        assert_eq!(tree.n_nodes(), 3);
        assert_eq!(tree.n_leaves(), 2);
        assert_eq!(tree.depth(), 1);
        match tree.node_at(0) {
            TreeNode::Split { feature, threshold, .. } => {
                assert_eq!(*feature, 0);
                assert!((threshold - 0.5).abs() < 1e-12);
            }
            leaf => panic!("expected split at root, got {:?}", leaf),
        }
    }

    #[test]
    fn test_fits_training_data_exactly() {
        // Three bands on feature 0; feature 1 is noise.
        let samples: Vec<Vec<f64>> = (0..30)
            .map(|i| vec![i as f64, ((i * 7) % 5) as f64])
            .collect();
        let labels: Vec<usize> = (0..30).map(|i| i / 10).collect();

        let tree = DecisionTree::fit(&samples, &labels, 3, TreeParams::default(), &mut rng()).unwrap();

        for (sample, &label) in samples.iter().zip(&labels) {
            assert_eq!(tree.predict(sample), label);
        }
        assert_eq!(tree.predict(&[100.0, 0.0]), 2);
    }

    #[test]
    fn test_constant_feature_falls_back_to_other_features() {
        // Feature 0 is constant; Sqrt resolves to one feature, so the builder
        // must continue to feature 1 whenever feature 0 is drawn first.
        let samples: Vec<Vec<f64>> = (0..20).map(|i| vec![5.0, i as f64]).collect();
        let labels: Vec<usize> = (0..20).map(|i| usize::from(i >= 10)).collect();
        let params = TreeParams {
            max_features: MaxFeatures::Sqrt,
            ..TreeParams::default()
        };

        for seed in 0..10 {
            let mut rng = StdRng::seed_from_u64(seed);
            let tree = DecisionTree::fit(&samples, &labels, 2, params, &mut rng).unwrap();
            assert_eq!(tree.predict(&[5.0, 3.0]), 0);
            assert_eq!(tree.predict(&[5.0, 15.0]), 1);
        }
    }

    #[test]
    fn test_identical_samples_with_mixed_labels_make_a_leaf() {
        let samples = vec![vec![1.0], vec![1.0], vec![1.0]];
        let labels = vec![0, 1, 1];
        let tree = DecisionTree::fit(&samples, &labels, 2, TreeParams::default(), &mut rng()).unwrap();

        assert_eq!(tree.n_nodes(), 1);
        assert_eq!(tree.predict(&[1.0]), 1);
        let proba = tree.predict_proba(&[1.0]);
        assert!((proba[0] - 1.0 / 3.0).abs() < 1e-12);
        assert!((proba[1] - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_max_depth_limits_growth() {
        let samples: Vec<Vec<f64>> = (0..40).map(|i| vec![i as f64]).collect();
        let labels: Vec<usize> = (0..40).map(|i| (i / 5) % 4).collect();
        let params = TreeParams {
            max_depth: Some(2),
            ..TreeParams::default()
        };
        let tree = DecisionTree::fit(&samples, &labels, 4, params, &mut rng()).unwrap();
        assert!(tree.depth() <= 2);
    }

    #[test]
    fn test_bootstrap_indices() {
        let samples = vec![vec![0.0], vec![1.0], vec![2.0]];
        let labels = vec![0, 1, 1];
        let tree =
            DecisionTree::fit_indices(&samples, &labels, &[1, 1, 2], 2, TreeParams::default(), &mut rng())
                .unwrap();
        // Only class 1 was drawn.
        assert_eq!(tree.predict(&[0.0]), 1);

        assert!(DecisionTree::fit_indices(&samples, &labels, &[5], 2, TreeParams::default(), &mut rng()).is_err());
    }

    #[test]
    fn test_rejects_bad_training_sets() {
        let mut r = rng();
        assert!(DecisionTree::fit(&[], &[], 2, TreeParams::default(), &mut r).is_err());
        assert!(DecisionTree::fit(&[vec![1.0]], &[0, 1], 2, TreeParams::default(), &mut r).is_err());
        assert!(DecisionTree::fit(&[vec![1.0], vec![1.0, 2.0]], &[0, 1], 2, TreeParams::default(), &mut r).is_err());
        assert!(DecisionTree::fit(&[vec![f64::NAN]], &[0], 2, TreeParams::default(), &mut r).is_err());
        assert!(DecisionTree::fit(&[vec![1.0]], &[3], 2, TreeParams::default(), &mut r).is_err());
    }
}
