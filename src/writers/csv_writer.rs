use crate::error::Result;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// Writes serializable rows as CSV with a header taken from the field names.
pub struct CsvWriter {
    delimiter: u8,
}

impl CsvWriter {
    pub fn new() -> Self {
        Self { delimiter: b',' }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Write rows to `path`, creating parent directories. Returns the row count.
    pub fn write<T, I>(&self, rows: I, path: &Path) -> Result<usize>
    where
        T: Serialize,
        I: IntoIterator<Item = T>,
    {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = BufWriter::new(File::create(path)?);
        let count = self.write_to(rows, file)?;
        debug!("Wrote {} rows to {}", count, path.display());
        Ok(count)
    }

    pub fn write_to<T, I, W>(&self, rows: I, writer: W) -> Result<usize>
    where
        T: Serialize,
        I: IntoIterator<Item = T>,
        W: Write,
    {
        let mut csv_writer = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .from_writer(writer);

        let mut count = 0;
        for row in rows {
            csv_writer.serialize(row)?;
            count += 1;
        }
        csv_writer.flush()?;
        Ok(count)
    }
}

impl Default for CsvWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, Pollutant, PollutantReadingBuilder};
    use crate::readers::ReadingCsvReader;
    use tempfile::TempDir;

    #[test]
    fn test_labeled_rows_round_trip_through_reader() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("processed").join("labeled.csv");

        let reading = PollutantReadingBuilder::new()
            .location("India", "Karnataka", "Bengaluru", "Hebbal")
            .coordinates(13.03, 77.59)
            .pollutant(Pollutant::Ozone)
            .values(12.0, 80.5, 40.25)
            .build()
            .unwrap();
        let labeled = vec![reading.with_label(Category::Satisfactory)];

        assert_eq!(CsvWriter::new().write(&labeled, &path).unwrap(), 1);

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("country,state,city,station,latitude,longitude,pollutant_id"));
        assert!(content.contains("OZONE"));
        assert!(content.contains("Satisfactory"));

        let back = ReadingCsvReader::new().read_labeled(&path).unwrap();
        assert_eq!(back, labeled);
    }

    #[test]
    fn test_custom_delimiter() {
        let mut buffer = Vec::new();
        let rows = vec![("a", 1), ("b", 2)];
        let count = CsvWriter::new().with_delimiter(b';').write_to(rows, &mut buffer).unwrap();
        assert_eq!(count, 2);
        assert_eq!(String::from_utf8(buffer).unwrap(), "a;1\nb;2\n");
    }
}
