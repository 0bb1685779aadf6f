use crate::models::{Pollutant, PollutantReading};
use std::collections::BTreeMap;
use validator::Validate;

#[derive(Debug, Clone, Default)]
pub struct IntegrityReport {
    pub total_records: usize,
    pub clean_records: usize,
    pub violations: Vec<ReadingViolation>,
    pub pollutant_statistics: BTreeMap<Pollutant, PollutantStatistics>,
}

#[derive(Debug, Clone)]
pub struct ReadingViolation {
    pub station: String,
    pub pollutant: Pollutant,
    pub violation_type: ViolationType,
    pub details: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationType {
    MinGreaterThanMax,
    AvgOutsideRange,
    NegativeValue,
    CoordinatesOutOfRange,
}

#[derive(Debug, Clone, Default)]
pub struct PollutantStatistics {
    pub total_records: usize,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    avg_sum: f64,
    avg_count: usize,
}

impl PollutantStatistics {
    pub fn mean_avg(&self) -> Option<f64> {
        (self.avg_count > 0).then(|| self.avg_sum / self.avg_count as f64)
    }
}

/// Reports suspicious readings without rejecting them: upstream data does not
/// guarantee `min <= avg <= max`, and cleaning keeps such rows.
pub struct IntegrityChecker {
    tolerance: f64,
}

impl IntegrityChecker {
    pub fn new() -> Self {
        Self { tolerance: 0.01 }
    }

    pub fn with_tolerance(tolerance: f64) -> Self {
        Self { tolerance }
    }

    pub fn check_integrity(&self, readings: &[PollutantReading]) -> IntegrityReport {
        let mut report = IntegrityReport {
            total_records: readings.len(),
            ..Default::default()
        };

        for reading in readings {
            let before = report.violations.len();
            self.check_reading(reading, &mut report);
            if report.violations.len() == before {
                report.clean_records += 1;
            }

            let stats = report
                .pollutant_statistics
                .entry(reading.pollutant_id)
                .or_default();
            stats.total_records += 1;
            if reading.pollutant_min.is_finite() {
                stats.min_value = Some(
                    stats
                        .min_value
                        .map_or(reading.pollutant_min, |v| v.min(reading.pollutant_min)),
                );
            }
            if reading.pollutant_max.is_finite() {
                stats.max_value = Some(
                    stats
                        .max_value
                        .map_or(reading.pollutant_max, |v| v.max(reading.pollutant_max)),
                );
            }
            if reading.pollutant_avg.is_finite() {
                stats.avg_sum += reading.pollutant_avg;
                stats.avg_count += 1;
            }
        }

        report
    }

    fn check_reading(&self, reading: &PollutantReading, report: &mut IntegrityReport) {
        let mut push = |violation_type: ViolationType, details: String| {
            report.violations.push(ReadingViolation {
                station: reading.station.clone(),
                pollutant: reading.pollutant_id,
                violation_type,
                details,
            });
        };

        if reading.validate().is_err() {
            push(
                ViolationType::CoordinatesOutOfRange,
                format!(
                    "coordinates ({}, {}) are outside valid ranges",
                    reading.latitude, reading.longitude
                ),
            );
        }

        let values = [
            (reading.pollutant_min, "min"),
            (reading.pollutant_max, "max"),
            (reading.pollutant_avg, "avg"),
        ];
        for (value, name) in values {
            if value < 0.0 {
                push(
                    ViolationType::NegativeValue,
                    format!("{} {} value {} is negative", reading.pollutant_id, name, value),
                );
            }
        }

        if reading.pollutant_min > reading.pollutant_max + self.tolerance {
            push(
                ViolationType::MinGreaterThanMax,
                format!(
                    "{} min {} > max {}",
                    reading.pollutant_id, reading.pollutant_min, reading.pollutant_max
                ),
            );
        } else if reading.pollutant_avg < reading.pollutant_min - self.tolerance
            || reading.pollutant_avg > reading.pollutant_max + self.tolerance
        {
            push(
                ViolationType::AvgOutsideRange,
                format!(
                    "{} avg {} outside [{}, {}]",
                    reading.pollutant_id,
                    reading.pollutant_avg,
                    reading.pollutant_min,
                    reading.pollutant_max
                ),
            );
        }
    }

    /// Generate a summary report
    pub fn generate_summary(&self, report: &IntegrityReport) -> String {
        let mut summary = String::new();

        summary.push_str("=== Integrity Check Report ===\n");
        summary.push_str(&format!("Total Records: {}\n", report.total_records));
        summary.push_str(&format!(
            "Clean Records: {} ({:.1}%)\n",
            report.clean_records,
            percentage(report.clean_records, report.total_records)
        ));
        summary.push_str(&format!("Violations: {}\n", report.violations.len()));

        if !report.pollutant_statistics.is_empty() {
            summary.push_str("\nPer Pollutant:\n");
            for (pollutant, stats) in &report.pollutant_statistics {
                summary.push_str(&format!(
                    "  {:<6} {:>6} records, range {} to {}, mean avg {}\n",
                    pollutant.as_str(),
                    stats.total_records,
                    format_optional(stats.min_value),
                    format_optional(stats.max_value),
                    format_optional(stats.mean_avg()),
                ));
            }
        }

        if !report.violations.is_empty() {
            summary.push_str("\nTop 10 Violations:\n");
            for (i, violation) in report.violations.iter().take(10).enumerate() {
                summary.push_str(&format!(
                    "  {}. {}: {}\n",
                    i + 1,
                    violation.station,
                    violation.details
                ));
            }
        }

        summary
    }
}

impl Default for IntegrityChecker {
    fn default() -> Self {
        Self::new()
    }
}

fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * part as f64 / total as f64
    }
}

fn format_optional(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.2}", v))
}
