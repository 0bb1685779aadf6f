//! CPCB breakpoint table shared by label generation, rule-based
//! classification and threshold display.

pub mod classifier;

pub use classifier::{
    classify, classify_detailed, classify_pollutant, classify_range, classify_range_detailed,
    Classification, UnclassifiedReason,
};

use crate::error::{ProcessingError, Result};
use crate::models::{Category, Pollutant};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::OnceLock;

pub const CPCB_TABLE_VERSION: &str = "CPCB-NAQI-2014";

/// Largest allowed distance between one range's `high` and the next range's
/// `low`. The published table uses integer or one-decimal breakpoints, so
/// adjacent ranges are separated by exactly one reporting unit.
const MAX_BREAKPOINT_STEP: f64 = 1.0;

/// One inclusive breakpoint band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThresholdRange {
    pub low: f64,
    pub high: f64,
    pub category: Category,
}

impl ThresholdRange {
    pub const fn new(low: f64, high: f64, category: Category) -> Self {
        Self { low, high, category }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.low <= value && value <= self.high
    }

    pub fn is_unbounded(&self) -> bool {
        self.high == f64::INFINITY
    }
}

/// A row of the threshold table as shown to users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThresholdDisplayRow {
    #[serde(rename = "Min")]
    pub min: String,
    #[serde(rename = "Max")]
    pub max: String,
    #[serde(rename = "Label")]
    pub label: String,
}

#[derive(Debug, Clone)]
pub struct ThresholdTable {
    version: String,
    ranges: BTreeMap<Pollutant, Vec<ThresholdRange>>,
}

impl ThresholdTable {
    /// Build a table, checking every pollutant's ranges.
    pub fn new(
        version: impl Into<String>,
        ranges: BTreeMap<Pollutant, Vec<ThresholdRange>>,
    ) -> Result<Self> {
        for (pollutant, bands) in &ranges {
            validate_ranges(*pollutant, bands)?;
        }

        Ok(Self {
            version: version.into(),
            ranges,
        })
    }

    /// The process-wide CPCB table. Built and checked on first use.
    pub fn standard() -> &'static ThresholdTable {
        static TABLE: OnceLock<ThresholdTable> = OnceLock::new();
        TABLE.get_or_init(|| {
            ThresholdTable::new(CPCB_TABLE_VERSION, cpcb_ranges())
                .expect("CPCB threshold table violates its invariants")
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn ranges(&self, pollutant: Pollutant) -> Option<&[ThresholdRange]> {
        self.ranges.get(&pollutant).map(Vec::as_slice)
    }

    pub fn pollutants(&self) -> impl Iterator<Item = Pollutant> + '_ {
        self.ranges.keys().copied()
    }

    /// Highest finite breakpoint for a pollutant (the `low` of the open band).
    pub fn max_boundary(&self, pollutant: Pollutant) -> Option<f64> {
        self.ranges(pollutant)
            .and_then(|bands| bands.last())
            .map(|band| band.low)
    }

    /// Rows for display, with the open upper bound rendered as `∞`.
    pub fn display_rows(&self, pollutant: Pollutant) -> Vec<ThresholdDisplayRow> {
        self.ranges(pollutant)
            .unwrap_or_default()
            .iter()
            .map(|band| ThresholdDisplayRow {
                min: format_breakpoint(band.low),
                max: if band.is_unbounded() {
                    "∞".to_string()
                } else {
                    format_breakpoint(band.high)
                },
                label: band.category.to_string(),
            })
            .collect()
    }

    pub fn format_table(&self, pollutant: Pollutant) -> String {
        let mut table = String::new();
        table.push_str(&format!(
            "=== AQI Classification Table: {} ({}) ===\n",
            pollutant,
            pollutant.units()
        ));
        table.push_str(&format!("{:>10} {:>10}  {}\n", "Min", "Max", "Label"));
        for row in self.display_rows(pollutant) {
            table.push_str(&format!("{:>10} {:>10}  {}\n", row.min, row.max, row.label));
        }
        table
    }
}

fn format_breakpoint(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

fn validate_ranges(pollutant: Pollutant, bands: &[ThresholdRange]) -> Result<()> {
    let invalid = |message: String| ProcessingError::InvalidThresholds {
        pollutant: pollutant.to_string(),
        message,
    };

    if bands.len() != Category::SEVERITY_ORDER.len() {
        return Err(invalid(format!(
            "expected {} ranges, found {}",
            Category::SEVERITY_ORDER.len(),
            bands.len()
        )));
    }

    if bands[0].low != 0.0 {
        return Err(invalid(format!("first range starts at {}, not 0", bands[0].low)));
    }

    for (band, expected) in bands.iter().zip(Category::SEVERITY_ORDER) {
        if band.category != expected {
            return Err(invalid(format!(
                "range {}-{} is labeled {}, expected {}",
                band.low, band.high, band.category, expected
            )));
        }
        if band.low.is_nan() || band.high.is_nan() || band.low > band.high {
            return Err(invalid(format!("range {}-{} is inverted", band.low, band.high)));
        }
    }

    for pair in bands.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        if prev.is_unbounded() {
            return Err(invalid("only the last range may be unbounded".to_string()));
        }
        if next.low <= prev.high {
            return Err(invalid(format!(
                "range starting at {} overlaps range ending at {}",
                next.low, prev.high
            )));
        }
        if next.low - prev.high > MAX_BREAKPOINT_STEP + f64::EPSILON * next.low.abs().max(1.0) {
            return Err(invalid(format!(
                "gap between {} and {} exceeds one reporting unit",
                prev.high, next.low
            )));
        }
    }

    if bands.last().is_some_and(|band| !band.is_unbounded()) {
        return Err(invalid("last range must be unbounded".to_string()));
    }

    Ok(())
}

fn bands(breakpoints: [(f64, f64); 6]) -> Vec<ThresholdRange> {
    breakpoints
        .into_iter()
        .zip(Category::SEVERITY_ORDER)
        .map(|((low, high), category)| ThresholdRange::new(low, high, category))
        .collect()
}

/// Breakpoints of the Indian National AQI, per pollutant.
fn cpcb_ranges() -> BTreeMap<Pollutant, Vec<ThresholdRange>> {
    const INF: f64 = f64::INFINITY;

    BTreeMap::from([
        (
            Pollutant::Pm25,
            bands([(0.0, 30.0), (31.0, 60.0), (61.0, 90.0), (91.0, 120.0), (121.0, 250.0), (251.0, INF)]),
        ),
        (
            Pollutant::Pm10,
            bands([(0.0, 50.0), (51.0, 100.0), (101.0, 250.0), (251.0, 350.0), (351.0, 430.0), (431.0, INF)]),
        ),
        (
            Pollutant::No2,
            bands([(0.0, 40.0), (41.0, 80.0), (81.0, 180.0), (181.0, 280.0), (281.0, 400.0), (401.0, INF)]),
        ),
        (
            Pollutant::So2,
            bands([(0.0, 40.0), (41.0, 80.0), (81.0, 380.0), (381.0, 800.0), (801.0, 1600.0), (1601.0, INF)]),
        ),
        (
            Pollutant::Ozone,
            bands([(0.0, 50.0), (51.0, 100.0), (101.0, 168.0), (169.0, 208.0), (209.0, 748.0), (749.0, INF)]),
        ),
        (
            Pollutant::Co,
            bands([(0.0, 1.0), (1.1, 2.0), (2.1, 10.0), (10.1, 17.0), (17.1, 34.0), (34.1, INF)]),
        ),
        (
            Pollutant::Nh3,
            bands([(0.0, 200.0), (201.0, 400.0), (401.0, 800.0), (801.0, 1200.0), (1201.0, 1800.0), (1801.0, INF)]),
        ),
    ])
}
