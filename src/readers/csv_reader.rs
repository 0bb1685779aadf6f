use crate::error::{ProcessingError, Result};
use crate::models::{LabeledReading, PollutantReading, RawRecord};
use crate::utils::constants::DEFAULT_BUFFER_SIZE;
use encoding_rs::WINDOWS_1252;
use memmap2::Mmap;
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, warn};

/// Reads monitoring CSV files (raw, cleaned or labeled).
pub struct ReadingCsvReader {
    use_mmap: bool,
}

impl ReadingCsvReader {
    pub fn new() -> Self {
        Self { use_mmap: false }
    }

    pub fn with_mmap(use_mmap: bool) -> Self {
        Self { use_mmap }
    }

    /// Read the raw export. Rows are returned as-is; cleaning decides what to keep.
    pub fn read_raw(&self, path: &Path) -> Result<Vec<RawRecord>> {
        self.read_typed(path)
    }

    pub fn read_cleaned(&self, path: &Path) -> Result<Vec<PollutantReading>> {
        self.read_typed(path)
    }

    pub fn read_labeled(&self, path: &Path) -> Result<Vec<LabeledReading>> {
        self.read_typed(path)
    }

    fn read_typed<T: DeserializeOwned>(&self, path: &Path) -> Result<Vec<T>> {
        if !path.exists() {
            return Err(ProcessingError::MissingData(format!(
                "Input file not found: {}",
                path.display()
            )));
        }

        let bytes = if self.use_mmap {
            self.read_mmap(path)?
        } else {
            self.read_buffered(path)?
        };

        let content = decode_text(&bytes);
        let records = parse_records(content.as_bytes())?;
        debug!("Read {} rows from {}", records.len(), path.display());
        Ok(records)
    }

    fn read_buffered(&self, path: &Path) -> Result<Vec<u8>> {
        let file = File::open(path)?;
        let mut reader = BufReader::with_capacity(DEFAULT_BUFFER_SIZE, file);
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Ok(bytes)
    }

    fn read_mmap(&self, path: &Path) -> Result<Vec<u8>> {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(mmap.to_vec())
    }
}

impl Default for ReadingCsvReader {
    fn default() -> Self {
        Self::new()
    }
}

/// UTF-8 when valid, otherwise Windows-1252 (station names in some exports).
fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => {
            warn!("Input is not valid UTF-8, decoding as Windows-1252");
            let (text, _, _) = WINDOWS_1252.decode(bytes);
            text
        }
    }
}

fn parse_records<T: DeserializeOwned>(data: &[u8]) -> Result<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(data);

    let headers = reader.headers()?.clone();
    if headers.is_empty() {
        return Err(ProcessingError::InvalidFormat("CSV file has no header row".to_string()));
    }

    reader
        .deserialize()
        .map(|row| row.map_err(ProcessingError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, Pollutant};
    use std::io::Write;
    use tempfile::NamedTempFile;

    const RAW_HEADER: &str = "country,state,city,station,last_update,latitude,longitude,pollutant_id,pollutant_min,pollutant_max,pollutant_avg";

    #[test]
    fn test_read_raw_file() -> Result<()> {
        let mut temp_file = NamedTempFile::new()?;
        writeln!(temp_file, "{}", RAW_HEADER)?;
        writeln!(
            temp_file,
            "India,Delhi,Delhi,\"Anand Vihar, Delhi - DPCC\",21-02-2025 10:00:00,28.6468,77.316,PM2.5,45,210,120"
        )?;
        writeln!(temp_file, "India,Bihar,Patna,Samanpura,,25.5941,85.1376,CO,NA,,12")?;

        let records = ReadingCsvReader::new().read_raw(temp_file.path())?;

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].station.as_deref(), Some("Anand Vihar, Delhi - DPCC"));
        assert_eq!(records[0].pollutant_avg, Some(120.0));
        assert_eq!(records[1].last_update, None);
        assert_eq!(records[1].pollutant_min, None);
        assert_eq!(records[1].pollutant_max, None);
        assert_eq!(records[1].pollutant_avg, Some(12.0));

        Ok(())
    }

    #[test]
    fn test_read_raw_without_last_update_column() -> Result<()> {
        let mut temp_file = NamedTempFile::new()?;
        writeln!(temp_file, "country,state,city,station,latitude,longitude,pollutant_id,pollutant_min,pollutant_max,pollutant_avg")?;
        writeln!(temp_file, "India,Goa,Panaji,Panaji,15.4909,73.8278,NO2,5,12,8")?;

        let records = ReadingCsvReader::with_mmap(true).read_raw(temp_file.path())?;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].pollutant_id.as_deref(), Some("NO2"));
        Ok(())
    }

    #[test]
    fn test_read_labeled_file() -> Result<()> {
        let mut temp_file = NamedTempFile::new()?;
        writeln!(temp_file, "country,state,city,station,latitude,longitude,pollutant_id,pollutant_min,pollutant_max,pollutant_avg,pollution_level")?;
        writeln!(temp_file, "India,Delhi,Delhi,ITO,28.63,77.24,PM10,180,420,300,Poor")?;
        writeln!(temp_file, "India,Delhi,Delhi,ITO,28.63,77.24,CO,1,1.2,1.05,Unknown")?;

        let records = ReadingCsvReader::new().read_labeled(temp_file.path())?;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].pollutant_id, Pollutant::Pm10);
        assert_eq!(records[0].pollution_level, Category::Poor);
        assert_eq!(records[1].pollution_level, Category::Unknown);
        Ok(())
    }

    #[test]
    fn test_windows_1252_fallback() -> Result<()> {
        let mut temp_file = NamedTempFile::new()?;
        temp_file.write_all(b"country,state,city,station,latitude,longitude,pollutant_id,pollutant_min,pollutant_max,pollutant_avg\n")?;
        temp_file.write_all(b"India,Kerala,Kochi,Caf\xe9 Road,9.93,76.26,SO2,2,9,4\n")?;

        let records = ReadingCsvReader::new().read_raw(temp_file.path())?;
        assert_eq!(records[0].station.as_deref(), Some("Café Road"));
        Ok(())
    }

    #[test]
    fn test_missing_file() {
        let result = ReadingCsvReader::new().read_raw(Path::new("does/not/exist.csv"));
        assert!(matches!(result, Err(ProcessingError::MissingData(_))));
    }
}
