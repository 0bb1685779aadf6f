pub mod analyzers;
pub mod cli;
pub mod config;
pub mod error;
pub mod inference;
pub mod ml;
pub mod models;
pub mod processors;
pub mod readers;
pub mod thresholds;
pub mod utils;
pub mod writers;

pub use error::{ProcessingError, Result};
