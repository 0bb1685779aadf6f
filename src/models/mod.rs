pub mod category;
pub mod pollutant;
pub mod reading;

pub use category::Category;
pub use pollutant::Pollutant;
pub use reading::{LabeledReading, PollutantReading, PollutantReadingBuilder, RawRecord};
