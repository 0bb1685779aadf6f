use crate::models::{Category, LabeledReading, PollutantReading};
use crate::thresholds::ThresholdTable;
use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelReport {
    pub total_records: usize,
    pub counts: BTreeMap<Category, usize>,
}

impl LabelReport {
    pub fn count(&self, category: Category) -> usize {
        self.counts.get(&category).copied().unwrap_or(0)
    }

    pub fn trainable_records(&self) -> usize {
        self.total_records - self.count(Category::Unknown)
    }

    pub fn summary(&self) -> String {
        let mut summary = String::new();
        summary.push_str("=== Label Distribution ===\n");
        for category in Category::SEVERITY_ORDER
            .into_iter()
            .chain(std::iter::once(Category::Unknown))
        {
            summary.push_str(&format!("{:<14} {:>8}\n", category.as_str(), self.count(category)));
        }
        summary.push_str(&format!(
            "Trainable: {} of {}\n",
            self.trainable_records(),
            self.total_records
        ));
        summary
    }
}

/// Applies the threshold table to each reading's average concentration.
///
/// Labels come from `pollutant_avg` only. The model trained on these labels
/// is queried with min/max pairs; the two representations are kept apart.
pub struct Labeler<'a> {
    table: &'a ThresholdTable,
}

impl<'a> Labeler<'a> {
    pub fn new(table: &'a ThresholdTable) -> Self {
        Self { table }
    }

    pub fn label_reading(&self, reading: PollutantReading) -> LabeledReading {
        let category = self
            .table
            .classify_value(reading.pollutant_id, reading.pollutant_avg)
            .category;
        reading.with_label(category)
    }

    pub fn label_dataset(&self, readings: Vec<PollutantReading>) -> (Vec<LabeledReading>, LabelReport) {
        let labeled: Vec<LabeledReading> = readings
            .into_par_iter()
            .map(|reading| self.label_reading(reading))
            .collect();

        let mut report = LabelReport {
            total_records: labeled.len(),
            counts: BTreeMap::new(),
        };
        for reading in &labeled {
            *report.counts.entry(reading.pollution_level).or_default() += 1;
        }

        info!(
            "Labeled {} readings ({} unknown)",
            report.total_records,
            report.count(Category::Unknown)
        );

        (labeled, report)
    }
}

impl Default for Labeler<'static> {
    fn default() -> Self {
        Self::new(ThresholdTable::standard())
    }
}

/// Label a dataset with the standard CPCB table.
pub fn label_dataset(readings: Vec<PollutantReading>) -> (Vec<LabeledReading>, LabelReport) {
    Labeler::default().label_dataset(readings)
}

/// Rows usable for training: a known label and finite bounds. `Unknown` rows
/// remain in the full dataset for display.
pub fn training_rows(labeled: &[LabeledReading]) -> Vec<&LabeledReading> {
    labeled.iter().filter(|r| r.is_trainable()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Pollutant, PollutantReadingBuilder};

    fn reading(pollutant: Pollutant, min: f64, max: f64, avg: f64) -> PollutantReading {
        PollutantReadingBuilder::new()
            .location("India", "Uttar Pradesh", "Lucknow", "Talkatora")
            .coordinates(26.83, 80.89)
            .pollutant(pollutant)
            .values(min, max, avg)
            .build()
            .unwrap()
    }

    #[test]
    fn test_labels_use_average_not_bounds() {
        // min and max both Severe, avg Good: the label follows the average.
        let (labeled, _) = label_dataset(vec![reading(Pollutant::Pm25, 300.0, 400.0, 25.0)]);
        assert_eq!(labeled[0].pollution_level, Category::Good);
    }

    #[test]
    fn test_label_dataset_preserves_order_and_counts() {
        let readings = vec![
            reading(Pollutant::Pm25, 10.0, 40.0, 30.0),
            reading(Pollutant::Pm25, 20.0, 50.0, 31.0),
            reading(Pollutant::Co, 1.0, 1.2, 1.05),
            reading(Pollutant::No2, 300.0, 500.0, 450.0),
        ];

        let (labeled, report) = label_dataset(readings);

        let levels: Vec<Category> = labeled.iter().map(|r| r.pollution_level).collect();
        assert_eq!(
            levels,
            vec![Category::Good, Category::Satisfactory, Category::Unknown, Category::Severe]
        );
        assert_eq!(report.total_records, 4);
        assert_eq!(report.count(Category::Unknown), 1);
        assert_eq!(report.trainable_records(), 3);
        assert!(report.summary().contains("Trainable: 3 of 4"));
    }

    #[test]
    fn test_training_rows_exclude_unknown() {
        let readings = vec![
            reading(Pollutant::Co, 1.0, 1.2, 1.05),
            reading(Pollutant::Co, 1.0, 1.2, 1.0),
        ];
        let (labeled, _) = label_dataset(readings);

        let rows = training_rows(&labeled);
        assert_eq!(labeled.len(), 2);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].pollution_level, Category::Good);
    }
}
