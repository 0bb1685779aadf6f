use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{ProcessingError, Result};
use crate::models::{Category, Pollutant};

/// One row of the raw monitoring export, before cleaning. Every field is
/// optional; unparsable numbers deserialize as missing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRecord {
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub station: Option<String>,
    #[serde(default)]
    pub last_update: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub pollutant_id: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub pollutant_min: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub pollutant_max: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub pollutant_avg: Option<f64>,
}

/// A cleaned reading for one station and pollutant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct PollutantReading {
    #[validate(length(min = 1))]
    pub country: String,

    #[validate(length(min = 1))]
    pub state: String,

    #[validate(length(min = 1))]
    pub city: String,

    #[validate(length(min = 1))]
    pub station: String,

    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,

    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,

    pub pollutant_id: Pollutant,

    pub pollutant_min: f64,

    pub pollutant_max: f64,

    pub pollutant_avg: f64,
}

impl PollutantReading {
    pub fn value_span(&self) -> f64 {
        self.pollutant_max - self.pollutant_min
    }

    pub fn has_ordered_bounds(&self) -> bool {
        self.pollutant_min <= self.pollutant_max
    }

    pub fn with_label(self, pollution_level: Category) -> LabeledReading {
        LabeledReading {
            country: self.country,
            state: self.state,
            city: self.city,
            station: self.station,
            latitude: self.latitude,
            longitude: self.longitude,
            pollutant_id: self.pollutant_id,
            pollutant_min: self.pollutant_min,
            pollutant_max: self.pollutant_max,
            pollutant_avg: self.pollutant_avg,
            pollution_level,
        }
    }
}

/// A cleaned reading with its threshold-derived `pollution_level`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledReading {
    pub country: String,
    pub state: String,
    pub city: String,
    pub station: String,
    pub latitude: f64,
    pub longitude: f64,
    pub pollutant_id: Pollutant,
    pub pollutant_min: f64,
    pub pollutant_max: f64,
    pub pollutant_avg: f64,
    pub pollution_level: Category,
}

impl LabeledReading {
    pub fn is_trainable(&self) -> bool {
        self.pollution_level.is_known()
            && self.pollutant_min.is_finite()
            && self.pollutant_max.is_finite()
    }
}

pub struct PollutantReadingBuilder {
    country: Option<String>,
    state: Option<String>,
    city: Option<String>,
    station: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    pollutant_id: Option<Pollutant>,
    values: Option<(f64, f64, f64)>,
}

impl Default for PollutantReadingBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PollutantReadingBuilder {
    pub fn new() -> Self {
        Self {
            country: None,
            state: None,
            city: None,
            station: None,
            latitude: None,
            longitude: None,
            pollutant_id: None,
            values: None,
        }
    }

    pub fn location(mut self, country: &str, state: &str, city: &str, station: &str) -> Self {
        self.country = Some(country.to_string());
        self.state = Some(state.to_string());
        self.city = Some(city.to_string());
        self.station = Some(station.to_string());
        self
    }

    pub fn coordinates(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }

    pub fn pollutant(mut self, pollutant: Pollutant) -> Self {
        self.pollutant_id = Some(pollutant);
        self
    }

    pub fn values(mut self, min: f64, max: f64, avg: f64) -> Self {
        self.values = Some((min, max, avg));
        self
    }

    pub fn build(self) -> Result<PollutantReading> {
        let (pollutant_min, pollutant_max, pollutant_avg) = self
            .values
            .ok_or_else(|| ProcessingError::MissingData("pollutant values".to_string()))?;

        let reading = PollutantReading {
            country: self.country.ok_or_else(|| ProcessingError::MissingData("country".to_string()))?,
            state: self.state.ok_or_else(|| ProcessingError::MissingData("state".to_string()))?,
            city: self.city.ok_or_else(|| ProcessingError::MissingData("city".to_string()))?,
            station: self.station.ok_or_else(|| ProcessingError::MissingData("station".to_string()))?,
            latitude: self.latitude.ok_or_else(|| ProcessingError::MissingData("latitude".to_string()))?,
            longitude: self.longitude.ok_or_else(|| ProcessingError::MissingData("longitude".to_string()))?,
            pollutant_id: self
                .pollutant_id
                .ok_or_else(|| ProcessingError::MissingData("pollutant_id".to_string()))?,
            pollutant_min,
            pollutant_max,
            pollutant_avg,
        };

        reading.validate()?;
        Ok(reading)
    }
}
