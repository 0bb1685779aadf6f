/// Default file locations, relative to the working directory
pub const DEFAULT_RAW_DATA_PATH: &str = "data/raw/air_quality_india.csv";
pub const DEFAULT_CLEANED_DATA_PATH: &str = "data/processed/air_quality_cleaned.csv";
pub const DEFAULT_LABELED_DATA_PATH: &str = "data/processed/air_quality_labeled.csv";
pub const DEFAULT_MODEL_PATH: &str = "models/pollution_classifier.bin";
pub const DEFAULT_ENCODERS_PATH: &str = "models/label_encoders.bin";
pub const DEFAULT_CONFIG_FILE: &str = "aqi.toml";

/// Environment variable prefix for configuration overrides (e.g. AQI__TRAINING__SEED)
pub const ENV_PREFIX: &str = "AQI";

/// Cleaning
pub const CLEAN_DECIMALS: i32 = 2;
pub const MISSING_MARKERS: [&str; 6] = ["NA", "N/A", "NaN", "null", "None", "-"];

/// Model features, in the column order the classifier is fit with
pub const FEATURE_ORDER: [&str; 3] = ["pollutant_min", "pollutant_max", "pollutant_id"];

/// Training defaults
pub const DEFAULT_N_ESTIMATORS: usize = 100;
pub const DEFAULT_RANDOM_SEED: u64 = 42;
pub const DEFAULT_TEST_SIZE: f64 = 0.2;
pub const DEFAULT_CV_FOLDS: usize = 5;
pub const DEFAULT_MIN_SAMPLES_SPLIT: usize = 2;

/// Artifact format version, bumped when the serialized layout changes
pub const ARTIFACT_VERSION: u32 = 1;

/// Map defaults (geographic centre of India)
pub const MAP_CENTER: (f64, f64) = (22.9734, 78.6569);

/// Reporting
pub const DEFAULT_TOP_CITIES: usize = 10;

/// I/O
pub const DEFAULT_BUFFER_SIZE: usize = 8192 * 16; // 128KB
pub const DEFAULT_ROW_GROUP_SIZE: usize = 10000;
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Parquet compression options
pub const COMPRESSION_SNAPPY: &str = "snappy";
pub const COMPRESSION_GZIP: &str = "gzip";
pub const COMPRESSION_LZ4: &str = "lz4";
pub const COMPRESSION_ZSTD: &str = "zstd";
pub const COMPRESSION_NONE: &str = "none";
