pub mod constants;
pub mod filename;
pub mod logging;
pub mod progress;

pub use constants::*;
pub use filename::{city_export_filename, generate_default_labeled_parquet_filename};
pub use logging::init_logging;
pub use progress::ProgressReporter;
