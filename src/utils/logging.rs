use crate::error::{ProcessingError, Result};
use std::fs::File;
use std::path::Path;
use std::sync::Mutex;
use tracing::Level;

/// Install the global tracing subscriber. Verbose raises the level to DEBUG;
/// a log file receives plain (uncoloured) output instead of stderr.
pub fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    let builder = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(verbose);

    let result = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file = File::create(path)?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    };

    result.map_err(|e| ProcessingError::Config(format!("Failed to initialize logging: {}", e)))
}
