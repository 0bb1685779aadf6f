use crate::error::{ProcessingError, Result};
use crate::models::{Category, LabeledReading, Pollutant};
use crate::utils::constants::{
    COMPRESSION_GZIP, COMPRESSION_LZ4, COMPRESSION_NONE, COMPRESSION_SNAPPY, COMPRESSION_ZSTD,
    DEFAULT_ROW_GROUP_SIZE,
};
use arrow::array::*;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, GzipLevel, ZstdLevel};
use parquet::file::properties::WriterProperties;
use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;

/// Writes labeled readings as a flat Parquet table, one row per reading.
pub struct ParquetWriter {
    compression: Compression,
    row_group_size: usize,
}

impl ParquetWriter {
    pub fn new() -> Self {
        Self {
            compression: Compression::SNAPPY,
            row_group_size: DEFAULT_ROW_GROUP_SIZE,
        }
    }

    pub fn with_compression(mut self, compression: &str) -> Result<Self> {
        self.compression = match compression.to_lowercase().as_str() {
            COMPRESSION_SNAPPY => Compression::SNAPPY,
            COMPRESSION_GZIP => Compression::GZIP(GzipLevel::default()),
            COMPRESSION_LZ4 => Compression::LZ4,
            COMPRESSION_ZSTD => Compression::ZSTD(ZstdLevel::default()),
            COMPRESSION_NONE => Compression::UNCOMPRESSED,
            _ => {
                return Err(ProcessingError::Config(format!(
                    "Unsupported compression: {}",
                    compression
                )))
            }
        };
        Ok(self)
    }

    pub fn with_row_group_size(mut self, size: usize) -> Self {
        self.row_group_size = size;
        self
    }

    /// Write labeled readings to a Parquet file
    pub fn write_readings(&self, readings: &[LabeledReading], path: &Path) -> Result<()> {
        self.write_readings_batched(readings, path, readings.len().max(1))
    }

    /// Write readings in batches for memory efficiency
    pub fn write_readings_batched(
        &self,
        readings: &[LabeledReading],
        path: &Path,
        batch_size: usize,
    ) -> Result<()> {
        if readings.is_empty() {
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let schema = Self::schema();
        let file = File::create(path)?;
        let props = WriterProperties::builder()
            .set_compression(self.compression)
            .set_max_row_group_size(self.row_group_size)
            .build();

        let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(props))?;
        for chunk in readings.chunks(batch_size.max(1)) {
            let batch = Self::readings_to_batch(chunk, schema.clone())?;
            writer.write(&batch)?;
        }
        writer.close()?;

        Ok(())
    }

    fn schema() -> Arc<Schema> {
        let fields = vec![
            Field::new("country", DataType::Utf8, false),
            Field::new("state", DataType::Utf8, false),
            Field::new("city", DataType::Utf8, false),
            Field::new("station", DataType::Utf8, false),
            Field::new("latitude", DataType::Float64, false),
            Field::new("longitude", DataType::Float64, false),
            Field::new("pollutant_id", DataType::Utf8, false),
            Field::new("pollutant_min", DataType::Float64, false),
            Field::new("pollutant_max", DataType::Float64, false),
            Field::new("pollutant_avg", DataType::Float64, false),
            Field::new("pollution_level", DataType::Utf8, false),
        ];

        Arc::new(Schema::new(fields))
    }

    fn readings_to_batch(readings: &[LabeledReading], schema: Arc<Schema>) -> Result<RecordBatch> {
        let strings = |f: fn(&LabeledReading) -> &str| -> ArrayRef {
            Arc::new(StringArray::from_iter_values(readings.iter().map(f)))
        };
        let floats = |f: fn(&LabeledReading) -> f64| -> ArrayRef {
            Arc::new(Float64Array::from_iter_values(readings.iter().map(f)))
        };

        let batch = RecordBatch::try_new(
            schema,
            vec![
                strings(|r| r.country.as_str()),
                strings(|r| r.state.as_str()),
                strings(|r| r.city.as_str()),
                strings(|r| r.station.as_str()),
                floats(|r| r.latitude),
                floats(|r| r.longitude),
                strings(|r| r.pollutant_id.as_str()),
                floats(|r| r.pollutant_min),
                floats(|r| r.pollutant_max),
                floats(|r| r.pollutant_avg),
                strings(|r| r.pollution_level.as_str()),
            ],
        )?;

        Ok(batch)
    }

    /// Read labeled readings back, up to `limit` rows (0 reads all).
    pub fn read_readings(&self, path: &Path, limit: usize) -> Result<Vec<LabeledReading>> {
        let file = File::open(path)?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)?
            .with_batch_size(8192)
            .build()?;

        let mut readings = Vec::new();
        for batch_result in reader {
            let batch = batch_result?;
            let country = string_column(&batch, "country")?;
            let state = string_column(&batch, "state")?;
            let city = string_column(&batch, "city")?;
            let station = string_column(&batch, "station")?;
            let latitude = float_column(&batch, "latitude")?;
            let longitude = float_column(&batch, "longitude")?;
            let pollutant_id = string_column(&batch, "pollutant_id")?;
            let pollutant_min = float_column(&batch, "pollutant_min")?;
            let pollutant_max = float_column(&batch, "pollutant_max")?;
            let pollutant_avg = float_column(&batch, "pollutant_avg")?;
            let pollution_level = string_column(&batch, "pollution_level")?;

            for i in 0..batch.num_rows() {
                if limit > 0 && readings.len() >= limit {
                    return Ok(readings);
                }
                readings.push(LabeledReading {
                    country: country.value(i).to_string(),
                    state: state.value(i).to_string(),
                    city: city.value(i).to_string(),
                    station: station.value(i).to_string(),
                    latitude: latitude.value(i),
                    longitude: longitude.value(i),
                    pollutant_id: pollutant_id.value(i).parse::<Pollutant>()?,
                    pollutant_min: pollutant_min.value(i),
                    pollutant_max: pollutant_max.value(i),
                    pollutant_avg: pollutant_avg.value(i),
                    pollution_level: pollution_level.value(i).parse::<Category>()?,
                });
            }
        }

        Ok(readings)
    }

    pub fn get_file_info(&self, path: &Path) -> Result<ParquetFileInfo> {
        use parquet::file::reader::{FileReader, SerializedFileReader};

        let file = File::open(path)?;
        let reader = SerializedFileReader::new(file)?;
        let metadata = reader.metadata();

        let row_groups = metadata.num_row_groups();
        let total_rows = metadata.file_metadata().num_rows();
        let file_size = fs::metadata(path)?.len();
        let row_group_sizes = (0..row_groups)
            .map(|i| metadata.row_group(i).num_rows())
            .collect();

        Ok(ParquetFileInfo {
            total_rows,
            row_groups: row_groups as i32,
            row_group_sizes,
            file_size,
            compression: self.compression,
        })
    }
}

fn string_column<'b>(batch: &'b RecordBatch, name: &str) -> Result<&'b StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| ProcessingError::InvalidFormat(format!("missing or invalid {} column", name)))
}

fn float_column<'b>(batch: &'b RecordBatch, name: &str) -> Result<&'b Float64Array> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<Float64Array>())
        .ok_or_else(|| ProcessingError::InvalidFormat(format!("missing or invalid {} column", name)))
}

impl Default for ParquetWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct ParquetFileInfo {
    pub total_rows: i64,
    pub row_groups: i32,
    pub row_group_sizes: Vec<i64>,
    pub file_size: u64,
    pub compression: Compression,
}

impl ParquetFileInfo {
    pub fn summary(&self) -> String {
        format!(
            "Parquet File Summary:\n\
            - Total rows: {}\n\
            - Row groups: {}\n\
            - File size: {:.2} MB\n\
            - Compression: {:?}\n\
            - Avg rows per group: {:.0}",
            self.total_rows,
            self.row_groups,
            self.file_size as f64 / 1_048_576.0,
            self.compression,
            self.total_rows as f64 / self.row_groups.max(1) as f64
        )
    }
}
