use crate::models::{Category, Pollutant};
use crate::thresholds::ThresholdTable;
use serde::Serialize;

/// Why a reading came back `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnclassifiedReason {
    UnknownPollutant,
    MissingValue,
    /// The value is negative or sits between two published breakpoints
    /// (e.g. CO 1.05, PM2.5 30.5).
    BetweenRanges,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub category: Category,
    pub reason: Option<UnclassifiedReason>,
}

impl Classification {
    fn known(category: Category) -> Self {
        Self {
            category,
            reason: None,
        }
    }

    fn unknown(reason: UnclassifiedReason) -> Self {
        Self {
            category: Category::Unknown,
            reason: Some(reason),
        }
    }
}

impl ThresholdTable {
    /// Category of the first band containing `value`, inclusive at both ends.
    pub fn classify_value(&self, pollutant: Pollutant, value: f64) -> Classification {
        if value.is_nan() {
            return Classification::unknown(UnclassifiedReason::MissingValue);
        }

        let Some(bands) = self.ranges(pollutant) else {
            return Classification::unknown(UnclassifiedReason::UnknownPollutant);
        };

        bands
            .iter()
            .find(|band| band.contains(value))
            .map(|band| Classification::known(band.category))
            .unwrap_or_else(|| Classification::unknown(UnclassifiedReason::BetweenRanges))
    }

    /// Like [`ThresholdTable::classify_value`], for a raw pollutant identifier.
    pub fn classify_raw(&self, pollutant: &str, value: f64) -> Classification {
        match pollutant.parse::<Pollutant>() {
            Ok(pollutant) => self.classify_value(pollutant, value),
            Err(_) if value.is_nan() => Classification::unknown(UnclassifiedReason::MissingValue),
            Err(_) => Classification::unknown(UnclassifiedReason::UnknownPollutant),
        }
    }
}

/// Rule-based classification of a raw `(pollutant_id, value)` pair against the
/// CPCB table. Unrecognized pollutants and NaN values yield `Unknown`.
pub fn classify(pollutant: &str, value: f64) -> Category {
    classify_detailed(pollutant, value).category
}

pub fn classify_detailed(pollutant: &str, value: f64) -> Classification {
    ThresholdTable::standard().classify_raw(pollutant, value)
}

pub fn classify_pollutant(pollutant: Pollutant, value: f64) -> Category {
    ThresholdTable::standard()
        .classify_value(pollutant, value)
        .category
}

/// Threshold-based classification for a min/max pair: the midpoint stands in
/// for the per-record average the table is applied to during labeling.
pub fn classify_range(pollutant: Pollutant, value_min: f64, value_max: f64) -> Category {
    classify_pollutant(pollutant, (value_min + value_max) / 2.0)
}

/// [`classify_range`] for a raw pollutant identifier. An unrecognized
/// identifier yields `Unknown` with its reason rather than an error.
pub fn classify_range_detailed(pollutant: &str, value_min: f64, value_max: f64) -> Classification {
    classify_detailed(pollutant, (value_min + value_max) / 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pm25_breakpoints() {
        assert_eq!(classify("PM2.5", 0.0), Category::Good);
        assert_eq!(classify("PM2.5", 30.0), Category::Good);
        assert_eq!(classify("PM2.5", 31.0), Category::Satisfactory);
        assert_eq!(classify("PM2.5", 90.0), Category::Moderate);
        assert_eq!(classify("PM2.5", 120.0), Category::Poor);
        assert_eq!(classify("PM2.5", 250.0), Category::VeryPoor);
        assert_eq!(classify("PM2.5", 251.0), Category::Severe);
        assert_eq!(classify("PM2.5", 10_000.0), Category::Severe);
    }

    #[test]
    fn test_co_decimal_breakpoints() {
        assert_eq!(classify("CO", 1.0), Category::Good);
        assert_eq!(classify("CO", 1.1), Category::Satisfactory);
        assert_eq!(classify("CO", 10.0), Category::Moderate);
        assert_eq!(classify("CO", 10.1), Category::Poor);
        assert_eq!(classify("CO", 34.1), Category::Severe);
    }

    #[test]
    fn test_gap_between_ranges_is_unknown() {
        let result = classify_detailed("CO", 1.05);
        assert_eq!(result.category, Category::Unknown);
        assert_eq!(result.reason, Some(UnclassifiedReason::BetweenRanges));

        assert_eq!(classify("PM2.5", 30.5), Category::Unknown);
        assert_eq!(classify("NH3", 200.99), Category::Unknown);
    }

    #[test]
    fn test_negative_value_is_unknown() {
        let result = classify_detailed("NO2", -1.0);
        assert_eq!(result.category, Category::Unknown);
        assert_eq!(result.reason, Some(UnclassifiedReason::BetweenRanges));
    }

    #[test]
    fn test_missing_value_and_unknown_pollutant() {
        assert_eq!(classify("PM10", f64::NAN), Category::Unknown);
        assert_eq!(classify("UNKNOWN_POLLUTANT", 10.0), Category::Unknown);
        assert_eq!(classify("UNKNOWN_POLLUTANT", f64::NAN), Category::Unknown);

        assert_eq!(
            classify_detailed("PM10", f64::NAN).reason,
            Some(UnclassifiedReason::MissingValue)
        );
        assert_eq!(
            classify_detailed("BENZENE", 3.0).reason,
            Some(UnclassifiedReason::UnknownPollutant)
        );
        assert_eq!(classify_detailed("SO2", 20.0).reason, None);
    }

    #[test]
    fn test_every_value_lands_in_its_band_or_a_gap() {
        let table = ThresholdTable::standard();
        for pollutant in Pollutant::ALL {
            let bands = table.ranges(pollutant).unwrap();
            let max = table.max_boundary(pollutant).unwrap();
            let step = if pollutant == Pollutant::Co { 0.05 } else { 0.5 };
            let steps = (max / step).ceil() as usize + 2;

            for i in 0..=steps {
                let value = i as f64 * step;
                let result = table.classify_value(pollutant, value);
                let matching: Vec<_> = bands.iter().filter(|b| b.contains(value)).collect();

                match result.category {
                    Category::Unknown => {
                        assert!(matching.is_empty(), "{} {} matched a band", pollutant, value);
                        assert_eq!(result.reason, Some(UnclassifiedReason::BetweenRanges));
                    }
                    category => {
                        assert_eq!(matching.len(), 1, "{} {} matched {} bands", pollutant, value, matching.len());
                        assert_eq!(matching[0].category, category);
                    }
                }
            }
        }
    }

    #[test]
    fn test_integer_values_never_fall_in_gaps() {
        for pollutant in Pollutant::ALL.into_iter().filter(|p| *p != Pollutant::Co) {
            for value in 0..2000 {
                assert!(classify_pollutant(pollutant, value as f64).is_known());
            }
        }
    }

    #[test]
    fn test_classify_range_uses_midpoint() {
        assert_eq!(classify_range(Pollutant::Pm25, 20.0, 40.0), Category::Good);
        assert_eq!(classify_range(Pollutant::Pm25, 100.0, 420.0), Category::Severe);
        assert_eq!(classify_range(Pollutant::Pm10, 40.0, 62.0), Category::Satisfactory);
    }

    #[test]
    fn test_classify_range_midpoint_in_gap() {
        assert_eq!(classify_range(Pollutant::Pm25, 30.0, 31.0), Category::Unknown);
        assert_eq!(classify_range(Pollutant::Co, 1.0, 1.1), Category::Unknown);

        let detailed = classify_range_detailed("PM2.5", 30.0, 31.0);
        assert_eq!(detailed.category, Category::Unknown);
        assert_eq!(detailed.reason, Some(UnclassifiedReason::BetweenRanges));
    }

    #[test]
    fn test_classify_range_unrecognized_pollutant() {
        let detailed = classify_range_detailed("FOO", 10.0, 20.0);
        assert_eq!(detailed.category, Category::Unknown);
        assert_eq!(detailed.reason, Some(UnclassifiedReason::UnknownPollutant));
        assert_eq!(classify_range_detailed("NO2", 10.0, 20.0).category, Category::Good);
    }

    #[test]
    fn test_identifiers_must_match_exactly() {
        assert_eq!(classify("pm2.5", 10.0), Category::Unknown);
        assert_eq!(classify(" PM2.5 ", 10.0), Category::Unknown);
        assert_eq!(classify("Ozone", 10.0), Category::Unknown);
        assert_eq!(
            classify_detailed("pm2.5", 10.0).reason,
            Some(UnclassifiedReason::UnknownPollutant)
        );
        assert_eq!(classify("PM2.5", 10.0), Category::Good);
    }
}
