use crate::models::{Pollutant, PollutantReading, RawRecord};
use crate::processors::{IntegrityChecker, IntegrityReport};
use crate::utils::constants::{CLEAN_DECIMALS, MISSING_MARKERS};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Essential columns in the order they are checked. A row missing any of
/// them is dropped.
pub const ESSENTIAL_COLUMNS: [&str; 8] = [
    "pollutant_id",
    "pollutant_avg",
    "country",
    "state",
    "city",
    "station",
    "latitude",
    "longitude",
];

#[derive(Debug, Clone, Default)]
pub struct CleaningReport {
    pub rows_read: usize,
    pub rows_kept: usize,
    /// Dropped rows keyed by the first missing essential column.
    pub dropped_missing: BTreeMap<&'static str, usize>,
    pub dropped_unknown_pollutant: usize,
    pub imputed_min: usize,
    pub imputed_max: usize,
    pub mean_min: Option<f64>,
    pub mean_max: Option<f64>,
    pub integrity: IntegrityReport,
}

impl CleaningReport {
    pub fn rows_dropped(&self) -> usize {
        self.rows_read - self.rows_kept
    }

    pub fn summary(&self) -> String {
        let mut summary = String::new();
        summary.push_str("=== Cleaning Report ===\n");
        summary.push_str(&format!("Rows read: {}\n", self.rows_read));
        summary.push_str(&format!("Rows kept: {}\n", self.rows_kept));
        summary.push_str(&format!("Rows dropped: {}\n", self.rows_dropped()));
        for (column, count) in &self.dropped_missing {
            summary.push_str(&format!("  - missing {}: {}\n", column, count));
        }
        if self.dropped_unknown_pollutant > 0 {
            summary.push_str(&format!(
                "  - unrecognized pollutant: {}\n",
                self.dropped_unknown_pollutant
            ));
        }
        summary.push_str(&format!(
            "Imputed pollutant_min: {} (mean {})\n",
            self.imputed_min,
            self.mean_min.map_or_else(|| "n/a".to_string(), |m| format!("{:.2}", m))
        ));
        summary.push_str(&format!(
            "Imputed pollutant_max: {} (mean {})\n",
            self.imputed_max,
            self.mean_max.map_or_else(|| "n/a".to_string(), |m| format!("{:.2}", m))
        ));
        summary
    }
}

/// Row kept after the essential-field check, before imputation.
struct PartialReading {
    country: String,
    state: String,
    city: String,
    station: String,
    latitude: f64,
    longitude: f64,
    pollutant_id: Pollutant,
    pollutant_min: Option<f64>,
    pollutant_max: Option<f64>,
    pollutant_avg: f64,
}

/// Drops incomplete rows, mean-imputes pollutant bounds and rounds values.
pub struct DataCleaner {
    decimals: i32,
}

impl DataCleaner {
    pub fn new() -> Self {
        Self {
            decimals: CLEAN_DECIMALS,
        }
    }

    pub fn with_decimals(decimals: i32) -> Self {
        Self { decimals }
    }

    pub fn clean(&self, raw: Vec<RawRecord>) -> (Vec<PollutantReading>, CleaningReport) {
        let mut report = CleaningReport {
            rows_read: raw.len(),
            ..Default::default()
        };

        let partial: Vec<PartialReading> = raw
            .into_iter()
            .filter_map(|record| self.retain_essential(record, &mut report))
            .collect();

        // Means are taken over retained rows only, before rounding.
        report.mean_min = column_mean(partial.iter().filter_map(|r| r.pollutant_min));
        report.mean_max = column_mean(partial.iter().filter_map(|r| r.pollutant_max));

        let fill_min = report.mean_min.unwrap_or(f64::NAN);
        let fill_max = report.mean_max.unwrap_or(f64::NAN);
        report.imputed_min = partial.iter().filter(|r| r.pollutant_min.is_none()).count();
        report.imputed_max = partial.iter().filter(|r| r.pollutant_max.is_none()).count();

        let readings: Vec<PollutantReading> = partial
            .into_iter()
            .map(|row| {
                let pollutant_min = row.pollutant_min.unwrap_or(fill_min);
                let pollutant_max = row.pollutant_max.unwrap_or(fill_max);

                PollutantReading {
                    country: row.country,
                    state: row.state,
                    city: row.city,
                    station: row.station,
                    latitude: self.round(row.latitude),
                    longitude: self.round(row.longitude),
                    pollutant_id: row.pollutant_id,
                    pollutant_min: self.round(pollutant_min),
                    pollutant_max: self.round(pollutant_max),
                    pollutant_avg: self.round(row.pollutant_avg),
                }
            })
            .collect();

        report.rows_kept = readings.len();
        report.integrity = IntegrityChecker::new().check_integrity(&readings);

        info!(
            "Cleaned {} rows: kept {}, dropped {}",
            report.rows_read,
            report.rows_kept,
            report.rows_dropped()
        );

        (readings, report)
    }

    fn retain_essential(
        &self,
        record: RawRecord,
        report: &mut CleaningReport,
    ) -> Option<PartialReading> {
        let pollutant_text = present_text(record.pollutant_id);
        let country = present_text(record.country);
        let state = present_text(record.state);
        let city = present_text(record.city);
        let station = present_text(record.station);
        let pollutant_avg = present_number(record.pollutant_avg);
        let latitude = present_number(record.latitude);
        let longitude = present_number(record.longitude);

        let missing = [
            pollutant_text.is_none(),
            pollutant_avg.is_none(),
            country.is_none(),
            state.is_none(),
            city.is_none(),
            station.is_none(),
            latitude.is_none(),
            longitude.is_none(),
        ];
        if let Some(index) = missing.iter().position(|m| *m) {
            *report.dropped_missing.entry(ESSENTIAL_COLUMNS[index]).or_default() += 1;
            return None;
        }

        let pollutant_text = pollutant_text?;
        let pollutant_id = match pollutant_text.parse::<Pollutant>() {
            Ok(pollutant) => pollutant,
            Err(_) => {
                debug!("Dropping row with unrecognized pollutant '{}'", pollutant_text);
                report.dropped_unknown_pollutant += 1;
                return None;
            }
        };

        Some(PartialReading {
            country: country?,
            state: state?,
            city: city?,
            station: station?,
            latitude: latitude?,
            longitude: longitude?,
            pollutant_id,
            pollutant_min: present_number(record.pollutant_min),
            pollutant_max: present_number(record.pollutant_max),
            pollutant_avg: pollutant_avg?,
        })
    }

    fn round(&self, value: f64) -> f64 {
        let factor = 10f64.powi(self.decimals);
        (value * factor).round() / factor
    }
}

impl Default for DataCleaner {
    fn default() -> Self {
        Self::new()
    }
}

fn present_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && !MISSING_MARKERS.iter().any(|m| m.eq_ignore_ascii_case(v)))
}

fn present_number(value: Option<f64>) -> Option<f64> {
    value.filter(|v| !v.is_nan())
}

fn column_mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(
        city: Option<&str>,
        pollutant: Option<&str>,
        min: Option<f64>,
        max: Option<f64>,
        avg: Option<f64>,
    ) -> RawRecord {
        RawRecord {
            country: Some("India".to_string()),
            state: Some("Karnataka".to_string()),
            city: city.map(str::to_string),
            station: Some("Hebbal".to_string()),
            last_update: Some("21-02-2025 10:00:00".to_string()),
            latitude: Some(13.029_167),
            longitude: Some(77.585_514),
            pollutant_id: pollutant.map(str::to_string),
            pollutant_min: min,
            pollutant_max: max,
            pollutant_avg: avg,
        }
    }

    #[test]
    fn test_drops_rows_missing_essentials() {
        let rows = vec![
            raw(Some("Bengaluru"), Some("PM10"), Some(10.0), Some(90.0), Some(50.0)),
            raw(None, Some("PM10"), Some(10.0), Some(90.0), Some(50.0)),
            raw(Some("Bengaluru"), None, Some(10.0), Some(90.0), Some(50.0)),
            raw(Some("Bengaluru"), Some("NO2"), Some(1.0), Some(2.0), None),
            raw(Some("NA"), Some("NO2"), Some(1.0), Some(2.0), Some(1.5)),
        ];

        let (readings, report) = DataCleaner::new().clean(rows);

        assert_eq!(readings.len(), 1);
        assert_eq!(report.rows_read, 5);
        assert_eq!(report.rows_kept, 1);
        assert_eq!(report.rows_dropped(), 4);
        assert_eq!(report.dropped_missing.get("city"), Some(&2));
        assert_eq!(report.dropped_missing.get("pollutant_id"), Some(&1));
        assert_eq!(report.dropped_missing.get("pollutant_avg"), Some(&1));
    }

    #[test]
    fn test_drops_unrecognized_pollutant() {
        let rows = vec![
            raw(Some("Pune"), Some("BENZENE"), Some(1.0), Some(2.0), Some(1.5)),
            raw(Some("Pune"), Some("OZONE"), Some(10.0), Some(20.0), Some(15.0)),
        ];
        let (readings, report) = DataCleaner::new().clean(rows);
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].pollutant_id, Pollutant::Ozone);
        assert_eq!(report.dropped_unknown_pollutant, 1);
    }

    #[test]
    fn test_pollutant_identifier_case_matters() {
        let rows = vec![
            raw(Some("Pune"), Some("pm2.5"), Some(10.0), Some(20.0), Some(15.0)),
            raw(Some("Pune"), Some("Ozone"), Some(10.0), Some(20.0), Some(15.0)),
            raw(Some("Pune"), Some("PM2.5"), Some(10.0), Some(20.0), Some(15.0)),
        ];
        let (readings, report) = DataCleaner::new().clean(rows);
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].pollutant_id, Pollutant::Pm25);
        assert_eq!(report.dropped_unknown_pollutant, 2);
    }

    #[test]
    fn test_mean_imputation_over_retained_rows() {
        let rows = vec![
            raw(Some("Pune"), Some("PM2.5"), Some(10.0), Some(100.0), Some(40.0)),
            raw(Some("Pune"), Some("PM2.5"), Some(20.0), None, Some(40.0)),
            raw(Some("Pune"), Some("PM2.5"), None, Some(50.0), Some(40.0)),
            // Dropped: its min must not contribute to the mean.
            raw(None, Some("PM2.5"), Some(1000.0), Some(1000.0), Some(40.0)),
        ];

        let (readings, report) = DataCleaner::new().clean(rows);

        assert_eq!(readings.len(), 3);
        assert_eq!(report.imputed_min, 1);
        assert_eq!(report.imputed_max, 1);
        assert_eq!(report.mean_min, Some(15.0));
        assert_eq!(report.mean_max, Some(75.0));
        assert_eq!(readings[1].pollutant_max, 75.0);
        assert_eq!(readings[2].pollutant_min, 15.0);
    }

    #[test]
    fn test_rounds_to_two_decimals() {
        let rows = vec![
            raw(Some("Pune"), Some("CO"), Some(0.123_4), Some(1.987_6), Some(1.005_1)),
            raw(Some("Pune"), Some("CO"), None, Some(2.0), Some(1.0)),
        ];
        let (readings, _) = DataCleaner::new().clean(rows);

        assert_eq!(readings[0].pollutant_min, 0.12);
        assert_eq!(readings[0].pollutant_max, 1.99);
        assert_eq!(readings[0].pollutant_avg, 1.01);
        assert_eq!(readings[0].latitude, 13.03);
        assert_eq!(readings[0].longitude, 77.59);
        // Imputed from the unrounded mean of the single present value.
        assert_eq!(readings[1].pollutant_min, 0.12);
    }

    #[test]
    fn test_all_missing_column_stays_nan() {
        let rows = vec![raw(Some("Pune"), Some("SO2"), None, Some(8.0), Some(5.0))];
        let (readings, report) = DataCleaner::new().clean(rows);
        assert!(readings[0].pollutant_min.is_nan());
        assert_eq!(report.mean_min, None);
        assert!(report.summary().contains("Rows kept: 1"));
    }
}
