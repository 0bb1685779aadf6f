//! Evaluation helpers: accuracy, confusion matrix, per-class report and
//! the index splits used for hold-out and cross-validation.

use crate::error::{ProcessingError, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeMap;

pub fn accuracy(truth: &[usize], predicted: &[usize]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let correct = truth
        .iter()
        .zip(predicted)
        .filter(|(t, p)| t == p)
        .count();
    correct as f64 / truth.len() as f64
}

/// `matrix[truth][predicted]`
pub fn confusion_matrix(truth: &[usize], predicted: &[usize], n_classes: usize) -> Vec<Vec<usize>> {
    let mut matrix = vec![vec![0usize; n_classes]; n_classes];
    for (&t, &p) in truth.iter().zip(predicted) {
        if t < n_classes && p < n_classes {
            matrix[t][p] += 1;
        }
    }
    matrix
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassMetrics {
    pub name: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationReport {
    pub classes: Vec<ClassMetrics>,
    pub accuracy: f64,
    pub confusion: Vec<Vec<usize>>,
}

impl ClassificationReport {
    pub fn new(truth: &[usize], predicted: &[usize], class_names: &[String]) -> Self {
        let n_classes = class_names.len();
        let confusion = confusion_matrix(truth, predicted, n_classes);

        let classes = class_names
            .iter()
            .enumerate()
            .map(|(c, name)| {
                let tp = confusion[c][c];
                let support: usize = confusion[c].iter().sum();
                let predicted_c: usize = confusion.iter().map(|row| row[c]).sum();

                let precision = ratio(tp, predicted_c);
                let recall = ratio(tp, support);
                let f1 = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };

                ClassMetrics {
                    name: name.clone(),
                    precision,
                    recall,
                    f1,
                    support,
                }
            })
            .collect();

        Self {
            classes,
            accuracy: accuracy(truth, predicted),
            confusion,
        }
    }

    pub fn total_support(&self) -> usize {
        self.classes.iter().map(|c| c.support).sum()
    }

    /// Unweighted mean of (precision, recall, f1) over classes with support.
    pub fn macro_avg(&self) -> (f64, f64, f64) {
        let present: Vec<&ClassMetrics> = self.classes.iter().filter(|c| c.support > 0).collect();
        if present.is_empty() {
            return (0.0, 0.0, 0.0);
        }
        let n = present.len() as f64;
        (
            present.iter().map(|c| c.precision).sum::<f64>() / n,
            present.iter().map(|c| c.recall).sum::<f64>() / n,
            present.iter().map(|c| c.f1).sum::<f64>() / n,
        )
    }

    pub fn weighted_avg(&self) -> (f64, f64, f64) {
        let total = self.total_support();
        if total == 0 {
            return (0.0, 0.0, 0.0);
        }
        let w = |f: fn(&ClassMetrics) -> f64| {
            self.classes
                .iter()
                .map(|c| f(c) * c.support as f64)
                .sum::<f64>()
                / total as f64
        };
        (
            w(|c: &ClassMetrics| c.precision),
            w(|c: &ClassMetrics| c.recall),
            w(|c: &ClassMetrics| c.f1),
        )
    }

    pub fn format(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "{:<14} {:>9} {:>9} {:>9} {:>9}\n",
            "", "precision", "recall", "f1-score", "support"
        ));
        for c in &self.classes {
            out.push_str(&format!(
                "{:<14} {:>9.2} {:>9.2} {:>9.2} {:>9}\n",
                c.name, c.precision, c.recall, c.f1, c.support
            ));
        }
        let total = self.total_support();
        out.push('\n');
        out.push_str(&format!(
            "{:<14} {:>9} {:>9} {:>9.2} {:>9}\n",
            "accuracy", "", "", self.accuracy, total
        ));
        let (p, r, f) = self.macro_avg();
        out.push_str(&format!(
            "{:<14} {:>9.2} {:>9.2} {:>9.2} {:>9}\n",
            "macro avg", p, r, f, total
        ));
        let (p, r, f) = self.weighted_avg();
        out.push_str(&format!(
            "{:<14} {:>9.2} {:>9.2} {:>9.2} {:>9}\n",
            "weighted avg", p, r, f, total
        ));

        out.push_str("\nConfusion matrix (rows = actual, columns = predicted):\n");
        for (name, row) in self.classes.iter().zip(&self.confusion) {
            let cells: Vec<String> = row.iter().map(|v| format!("{:>6}", v)).collect();
            out.push_str(&format!("{:<14} {}\n", name.name, cells.join("")));
        }
        out
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Shuffled hold-out split. Returns `(train, test)` index sets; the test set
/// gets `ceil(n * test_size)` rows and the train set is never empty.
pub fn train_test_split(n: usize, test_size: f64, seed: u64) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(ProcessingError::Config(format!(
            "test_size must be in (0, 1), got {}",
            test_size
        )));
    }
    if n < 2 {
        return Err(ProcessingError::Model(format!(
            "need at least 2 rows to split, got {}",
            n
        )));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let n_test = ((n as f64 * test_size).ceil() as usize).clamp(1, n - 1);
    let train = indices.split_off(n_test);
    Ok((train, indices))
}

/// Stratified k-fold over `labels`. Each class's rows are shuffled and dealt
/// round-robin across folds. Returns `(train, validation)` per fold.
pub fn stratified_k_fold(
    labels: &[usize],
    k: usize,
    seed: u64,
) -> Result<Vec<(Vec<usize>, Vec<usize>)>> {
    if k < 2 {
        return Err(ProcessingError::Config(format!("cv folds must be at least 2, got {}", k)));
    }
    if labels.len() < k {
        return Err(ProcessingError::Model(format!(
            "{} rows cannot fill {} folds",
            labels.len(),
            k
        )));
    }

    let mut by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, &label) in labels.iter().enumerate() {
        by_class.entry(label).or_default().push(i);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut folds: Vec<Vec<usize>> = vec![Vec::new(); k];
    let mut next = 0;
    for rows in by_class.values_mut() {
        rows.shuffle(&mut rng);
        for &row in rows.iter() {
            folds[next % k].push(row);
            next += 1;
        }
    }

    Ok((0..k)
        .map(|f| {
            let validation = folds[f].clone();
            let train = folds
                .iter()
                .enumerate()
                .filter(|(g, _)| *g != f)
                .flat_map(|(_, rows)| rows.iter().copied())
                .collect();
            (train, validation)
        })
        .collect())
}
