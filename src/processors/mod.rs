pub mod cleaner;
pub mod integrity_checker;
pub mod labeler;

pub use cleaner::{CleaningReport, DataCleaner};
pub use integrity_checker::{IntegrityChecker, IntegrityReport, ReadingViolation, ViolationType};
pub use labeler::{label_dataset, training_rows, LabelReport, Labeler};
