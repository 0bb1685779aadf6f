use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ProcessingError;

/// Pollutants reported by CPCB monitoring stations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Pollutant {
    #[serde(rename = "PM2.5")]
    Pm25,
    #[serde(rename = "PM10")]
    Pm10,
    #[serde(rename = "NO2")]
    No2,
    #[serde(rename = "SO2")]
    So2,
    #[serde(rename = "OZONE")]
    Ozone,
    #[serde(rename = "CO")]
    Co,
    #[serde(rename = "NH3")]
    Nh3,
}

impl Pollutant {
    pub const ALL: [Pollutant; 7] = [
        Pollutant::Pm25,
        Pollutant::Pm10,
        Pollutant::No2,
        Pollutant::So2,
        Pollutant::Ozone,
        Pollutant::Co,
        Pollutant::Nh3,
    ];

    /// Identifier as it appears in the `pollutant_id` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Pollutant::Pm25 => "PM2.5",
            Pollutant::Pm10 => "PM10",
            Pollutant::No2 => "NO2",
            Pollutant::So2 => "SO2",
            Pollutant::Ozone => "OZONE",
            Pollutant::Co => "CO",
            Pollutant::Nh3 => "NH3",
        }
    }

    pub fn units(&self) -> &'static str {
        match self {
            Pollutant::Co => "mg/m³",
            _ => "µg/m³",
        }
    }
}

impl fmt::Display for Pollutant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Pollutant {
    type Err = ProcessingError;

    /// Exact match on the column identifier. Case and surrounding whitespace
    /// are significant.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Pollutant::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| ProcessingError::UnknownPollutant(s.to_string()))
    }
}
