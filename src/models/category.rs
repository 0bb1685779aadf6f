use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ProcessingError;

/// AQI category, ordered by increasing severity.
///
/// `Unknown` is a sentinel for readings the threshold table cannot place
/// (missing value, unrecognized pollutant, or a value between two ranges).
/// It sorts after every real category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    Good,
    Satisfactory,
    Moderate,
    Poor,
    #[serde(rename = "Very Poor")]
    VeryPoor,
    Severe,
    Unknown,
}

impl Category {
    /// Real categories in severity order. Reports that enumerate categories
    /// iterate this array.
    pub const SEVERITY_ORDER: [Category; 6] = [
        Category::Good,
        Category::Satisfactory,
        Category::Moderate,
        Category::Poor,
        Category::VeryPoor,
        Category::Severe,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Good => "Good",
            Category::Satisfactory => "Satisfactory",
            Category::Moderate => "Moderate",
            Category::Poor => "Poor",
            Category::VeryPoor => "Very Poor",
            Category::Severe => "Severe",
            Category::Unknown => "Unknown",
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Category::Unknown)
    }

    /// Map marker colour for this category.
    pub fn marker_color(&self) -> &'static str {
        match self {
            Category::Good => "green",
            Category::Satisfactory => "lightgreen",
            Category::Moderate => "orange",
            Category::Poor => "red",
            Category::VeryPoor => "darkred",
            Category::Severe => "black",
            Category::Unknown => "gray",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ProcessingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Category::SEVERITY_ORDER
            .into_iter()
            .chain(std::iter::once(Category::Unknown))
            .find(|c| c.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ProcessingError::InvalidFormat(format!("Unknown AQI category: '{}'", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Category::Good < Category::Satisfactory);
        assert!(Category::Poor < Category::VeryPoor);
        assert!(Category::VeryPoor < Category::Severe);
        assert!(Category::Severe < Category::Unknown);

        let mut sorted = Category::SEVERITY_ORDER.to_vec();
        sorted.reverse();
        sorted.sort();
        assert_eq!(sorted, Category::SEVERITY_ORDER.to_vec());
    }

    #[test]
    fn test_display_and_parse() {
        assert_eq!(Category::VeryPoor.to_string(), "Very Poor");
        assert_eq!("very poor".parse::<Category>().unwrap(), Category::VeryPoor);
        assert_eq!("Unknown".parse::<Category>().unwrap(), Category::Unknown);
        assert!("Hazardous".parse::<Category>().is_err());
    }

    #[test]
    fn test_marker_colors() {
        assert_eq!(Category::Good.marker_color(), "green");
        assert_eq!(Category::Severe.marker_color(), "black");
        assert_eq!(Category::Unknown.marker_color(), "gray");
    }
}
