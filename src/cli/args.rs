use crate::utils::constants::DEFAULT_TOP_CITIES;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "aqi-processor")]
#[command(about = "Air-quality data cleaner, CPCB labeler and pollution-level classifier")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Log file path")]
    pub log_file: Option<PathBuf>,

    #[arg(long, global = true, help = "Configuration file [default: aqi.toml if present]")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, default_value_t = num_cpus::get())]
    pub max_workers: usize,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Clean the raw CSV: drop incomplete rows, impute min/max, round values
    Clean {
        #[arg(short, long, help = "Raw input CSV [default: from config]")]
        input: Option<PathBuf>,

        #[arg(short, long, help = "Cleaned output CSV [default: from config]")]
        output: Option<PathBuf>,

        #[arg(long, help = "Memory-map the input file")]
        use_mmap: bool,

        #[arg(long, help = "Report only, do not write output")]
        validate_only: bool,
    },

    /// Assign CPCB pollution levels to cleaned readings
    Label {
        #[arg(short, long, help = "Cleaned input CSV [default: from config]")]
        input: Option<PathBuf>,

        #[arg(short, long, help = "Labeled output CSV [default: from config]")]
        output: Option<PathBuf>,

        #[command(flatten)]
        parquet: ParquetArgs,
    },

    /// Train the classifier on labeled readings
    Train {
        #[arg(short, long, help = "Labeled input (CSV, or .parquet) [default: from config]")]
        input: Option<PathBuf>,

        #[command(flatten)]
        training: TrainingArgs,
    },

    /// Run clean, label and train in sequence
    Pipeline {
        #[arg(short, long, help = "Raw input CSV [default: from config]")]
        input: Option<PathBuf>,

        #[command(flatten)]
        parquet: ParquetArgs,

        #[command(flatten)]
        training: TrainingArgs,
    },

    /// Rule-based classification of a single concentration
    Classify {
        #[arg(short, long)]
        pollutant: String,

        #[arg(long, allow_negative_numbers = true)]
        value: f64,
    },

    /// Predict the pollution level from a min/max pair
    Predict {
        #[arg(short, long)]
        pollutant: String,

        #[arg(long, allow_negative_numbers = true)]
        min: f64,

        #[arg(long, allow_negative_numbers = true)]
        max: f64,

        #[arg(long, value_enum, default_value_t = Method::Model)]
        method: Method,
    },

    /// Show the CPCB breakpoint table
    Thresholds {
        #[arg(short, long, help = "Single pollutant [default: all]")]
        pollutant: Option<String>,
    },

    /// City view: pollutants, default inputs and an optional prediction
    City {
        #[arg(short, long)]
        city: String,

        #[arg(short, long)]
        pollutant: Option<String>,

        #[arg(long, help = "Minimum value [default: city mean]")]
        min: Option<f64>,

        #[arg(long, help = "Maximum value [default: city mean]")]
        max: Option<f64>,

        #[arg(long, help = "Export the city's cleaned readings to this directory")]
        export: Option<PathBuf>,

        #[arg(long, help = "Cleaned data CSV [default: from config]")]
        data: Option<PathBuf>,
    },

    /// Station markers with predicted levels, as JSON
    Map {
        #[arg(short, long, help = "Output JSON file [default: stdout]")]
        output: Option<PathBuf>,

        #[arg(long, help = "Cleaned data CSV [default: from config]")]
        data: Option<PathBuf>,
    },

    /// Category distribution and quick insights over predicted levels
    Insights {
        #[arg(long, help = "Cleaned data CSV [default: from config]")]
        data: Option<PathBuf>,

        #[arg(long, help = "Print JSON instead of text")]
        json: bool,
    },

    /// Mean pollutant levels and top cities
    Analyze {
        #[arg(short, long, help = "Pollutant for the city ranking [default: every pollutant]")]
        pollutant: Option<String>,

        #[arg(long, default_value_t = DEFAULT_TOP_CITIES)]
        top: usize,

        #[arg(long, help = "Cleaned data CSV [default: from config]")]
        data: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Method {
    /// Trained random forest
    Model,
    /// CPCB breakpoints on the min/max midpoint
    Threshold,
}

#[derive(Args, Debug, Clone, Default)]
pub struct TrainingArgs {
    #[arg(long, help = "Model artifact path [default: from config]")]
    pub model: Option<PathBuf>,

    #[arg(long, help = "Encoder artifact path [default: from config]")]
    pub encoders: Option<PathBuf>,

    #[arg(long)]
    pub n_estimators: Option<usize>,

    #[arg(long)]
    pub seed: Option<u64>,

    #[arg(long)]
    pub test_size: Option<f64>,

    #[arg(long, help = "Cross-validation folds (0 disables)")]
    pub cv_folds: Option<usize>,

    #[arg(long)]
    pub max_depth: Option<usize>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ParquetArgs {
    #[arg(
        long,
        help = "Also write labeled readings as Parquet [default: output/aqi-labeled-{YYMMDD}.parquet]"
    )]
    pub parquet: bool,

    #[arg(long)]
    pub parquet_file: Option<PathBuf>,

    #[arg(short, long, default_value = "snappy")]
    pub compression: String,
}
