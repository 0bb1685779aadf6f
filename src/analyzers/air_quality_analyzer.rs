use crate::error::{ProcessingError, Result};
use crate::inference::InferenceContext;
use crate::ml::Classifier;
use crate::models::{Category, Pollutant, PollutantReading};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

/// One station row as shown on the summary table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationSummary {
    pub city: String,
    pub station: String,
    pub pollutant: Pollutant,
    pub pollutant_min: f64,
    pub pollutant_max: f64,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapMarker {
    #[serde(flatten)]
    pub station: StationSummary,
    pub level: Category,
    pub color: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CityDefaults {
    pub pollutant_min: f64,
    pub pollutant_max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insights {
    /// City with the most `Severe` predictions, if any
    pub most_severe_city: Option<(String, usize)>,
    /// City with the most `Good` predictions, if any
    pub most_good_city: Option<(String, usize)>,
    pub most_common_pollutant: Option<(Pollutant, usize)>,
}

impl Insights {
    pub fn summary(&self) -> String {
        let mut summary = String::new();
        match &self.most_severe_city {
            Some((city, n)) => summary.push_str(&format!("City with most 'Severe' readings: {} ({})\n", city, n)),
            None => summary.push_str("City with most 'Severe' readings: none\n"),
        }
        match &self.most_good_city {
            Some((city, n)) => summary.push_str(&format!("City with most 'Good' readings: {} ({})\n", city, n)),
            None => summary.push_str("City with most 'Good' readings: none\n"),
        }
        match &self.most_common_pollutant {
            Some((pollutant, n)) => {
                summary.push_str(&format!("Most common pollutant: {} ({} readings)\n", pollutant, n))
            }
            None => summary.push_str("Most common pollutant: none\n"),
        }
        summary
    }
}

/// Read-only views over a cleaned dataset, for the dashboard and report
/// commands.
pub struct AirQualityAnalyzer<'a> {
    readings: &'a [PollutantReading],
}

impl<'a> AirQualityAnalyzer<'a> {
    pub fn new(readings: &'a [PollutantReading]) -> Self {
        Self { readings }
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Distinct city names, sorted.
    pub fn cities(&self) -> Vec<String> {
        self.readings
            .iter()
            .map(|r| r.city.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn city_pollutants(&self, city: &str) -> Vec<Pollutant> {
        self.readings
            .iter()
            .filter(|r| r.city == city)
            .map(|r| r.pollutant_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Mean min and max for a city and pollutant, used to prefill inputs.
    pub fn city_defaults(&self, city: &str, pollutant: Pollutant) -> Option<CityDefaults> {
        let (sum_min, sum_max, n) = self
            .readings
            .iter()
            .filter(|r| r.city == city && r.pollutant_id == pollutant)
            .fold((0.0, 0.0, 0usize), |(a, b, n), r| {
                (a + r.pollutant_min, b + r.pollutant_max, n + 1)
            });
        if n == 0 {
            return None;
        }
        Some(CityDefaults {
            pollutant_min: sum_min / n as f64,
            pollutant_max: sum_max / n as f64,
        })
    }

    pub fn city_readings(&self, city: &str) -> Vec<&'a PollutantReading> {
        self.readings.iter().filter(|r| r.city == city).collect()
    }

    pub fn station_summary(&self) -> Vec<StationSummary> {
        self.readings
            .iter()
            .map(|r| StationSummary {
                city: r.city.clone(),
                station: r.station.clone(),
                pollutant: r.pollutant_id,
                pollutant_min: r.pollutant_min,
                pollutant_max: r.pollutant_max,
                latitude: r.latitude,
                longitude: r.longitude,
            })
            .collect()
    }

    /// Model prediction for every reading, in dataset order. A reading whose
    /// bounds cannot be scored (NaN after imputation, negative) comes back as
    /// `Unknown`. A pollutant the encoders never saw is an error: the model
    /// and the dataset disagree.
    pub fn predicted_levels<M: Classifier>(
        &self,
        context: &InferenceContext<M>,
    ) -> Result<Vec<Category>> {
        self.readings
            .par_iter()
            .map(|r| {
                match context.predict(r.pollutant_id, r.pollutant_min, r.pollutant_max) {
                    Err(ProcessingError::InvalidInput(reason)) => {
                        warn!("No prediction for {} / {}: {}", r.station, r.pollutant_id, reason);
                        Ok(Category::Unknown)
                    }
                    other => other,
                }
            })
            .collect()
    }

    pub fn map_markers(&self, levels: &[Category]) -> Result<Vec<MapMarker>> {
        self.check_levels(levels)?;
        Ok(self
            .station_summary()
            .into_iter()
            .zip(levels)
            .map(|(station, &level)| MapMarker {
                station,
                level,
                color: level.marker_color(),
            })
            .collect())
    }

    /// Count per category, in severity order. Categories with no readings
    /// are listed with zero; `Unknown` is appended only when present.
    pub fn category_distribution(levels: &[Category]) -> Vec<(Category, usize)> {
        let mut counts: BTreeMap<Category, usize> = BTreeMap::new();
        for level in levels {
            *counts.entry(*level).or_default() += 1;
        }

        let mut distribution: Vec<(Category, usize)> = Category::SEVERITY_ORDER
            .iter()
            .map(|c| (*c, counts.get(c).copied().unwrap_or(0)))
            .collect();
        if let Some(&unknown) = counts.get(&Category::Unknown) {
            distribution.push((Category::Unknown, unknown));
        }
        distribution
    }

    pub fn insights(&self, levels: &[Category]) -> Result<Insights> {
        self.check_levels(levels)?;

        let mut severe: BTreeMap<&str, usize> = BTreeMap::new();
        let mut good: BTreeMap<&str, usize> = BTreeMap::new();
        // Keyed by name first so ties resolve alphabetically
        let mut pollutants: BTreeMap<(&'static str, Pollutant), usize> = BTreeMap::new();

        for (reading, level) in self.readings.iter().zip(levels) {
            match level {
                Category::Severe => *severe.entry(reading.city.as_str()).or_default() += 1,
                Category::Good => *good.entry(reading.city.as_str()).or_default() += 1,
                _ => {}
            }
            *pollutants
                .entry((reading.pollutant_id.as_str(), reading.pollutant_id))
                .or_default() += 1;
        }

        Ok(Insights {
            most_severe_city: first_max(severe).map(|(city, n)| (city.to_string(), n)),
            most_good_city: first_max(good).map(|(city, n)| (city.to_string(), n)),
            most_common_pollutant: first_max(pollutants).map(|((_, p), n)| (p, n)),
        })
    }

    /// Mean `pollutant_avg` per pollutant.
    pub fn pollutant_averages(&self) -> BTreeMap<Pollutant, f64> {
        let mut sums: BTreeMap<Pollutant, (f64, usize)> = BTreeMap::new();
        for r in self.readings {
            let entry = sums.entry(r.pollutant_id).or_insert((0.0, 0));
            entry.0 += r.pollutant_avg;
            entry.1 += 1;
        }
        sums.into_iter()
            .map(|(p, (sum, n))| (p, sum / n as f64))
            .collect()
    }

    /// Cities ranked by mean `pollutant_avg` for one pollutant, highest first.
    pub fn top_cities(&self, pollutant: Pollutant, limit: usize) -> Vec<(String, f64)> {
        let mut sums: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
        for r in self.readings.iter().filter(|r| r.pollutant_id == pollutant) {
            let entry = sums.entry(r.city.as_str()).or_insert((0.0, 0));
            entry.0 += r.pollutant_avg;
            entry.1 += 1;
        }

        let mut ranked: Vec<(String, f64)> = sums
            .into_iter()
            .map(|(city, (sum, n))| (city.to_string(), sum / n as f64))
            .collect();
        // Stable sort keeps alphabetical order among equal means
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(limit);
        ranked
    }

    pub fn generate_summary(&self) -> String {
        let mut summary = String::new();
        summary.push_str("Air Quality Dataset Summary\n");
        summary.push_str("===========================\n");
        summary.push_str(&format!("Readings: {}\n", self.readings.len()));
        summary.push_str(&format!("Cities: {}\n", self.cities().len()));
        let stations: BTreeSet<(&str, &str)> = self
            .readings
            .iter()
            .map(|r| (r.city.as_str(), r.station.as_str()))
            .collect();
        summary.push_str(&format!("Stations: {}\n\n", stations.len()));

        summary.push_str("Mean pollutant_avg by pollutant:\n");
        for (pollutant, mean) in self.pollutant_averages() {
            summary.push_str(&format!("  {:<6} {:>9.2} {}\n", pollutant.as_str(), mean, pollutant.units()));
        }
        summary
    }

    fn check_levels(&self, levels: &[Category]) -> Result<()> {
        if levels.len() != self.readings.len() {
            return Err(ProcessingError::InvalidInput(format!(
                "{} predicted levels for {} readings",
                levels.len(),
                self.readings.len()
            )));
        }
        Ok(())
    }
}

/// Entry with the highest count; ties go to the smallest key.
fn first_max<K: Ord, V>(counts: impl IntoIterator<Item = (K, V)>) -> Option<(K, V)>
where
    V: Ord + Copy,
{
    let mut best: Option<(K, V)> = None;
    for (key, value) in counts {
        let better = match &best {
            None => true,
            Some((best_key, best_value)) => {
                value > *best_value || (value == *best_value && key < *best_key)
            }
        };
        if better {
            best = Some((key, value));
        }
    }
    best
}
