use chrono::{Datelike, Local};
use std::path::{Path, PathBuf};

/// Default labeled Parquet filename with format: aqi-labeled-{YYMMDD}.parquet
pub fn generate_default_labeled_parquet_filename() -> PathBuf {
    let now = Local::now();
    let year = now.year() % 100; // Get last 2 digits of year
    let month = now.month();
    let day = now.day();

    let filename = format!("aqi-labeled-{:02}{:02}{:02}.parquet", year, month, day);
    PathBuf::from("output").join(filename)
}

/// City export filename: `{city}_air_quality.csv`, with path separators and
/// spaces replaced.
pub fn city_export_filename(dir: &Path, city: &str) -> PathBuf {
    let safe: String = city
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    dir.join(format!("{}_air_quality.csv", safe))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_default_labeled_parquet_filename() {
        let filename = generate_default_labeled_parquet_filename();
        let filename_str = filename.to_string_lossy();

        assert!(filename_str.starts_with("output/"));

        let parts: Vec<&str> = filename_str.split('/').collect();
        assert_eq!(parts.len(), 2);
        assert!(parts[1].starts_with("aqi-labeled-"));
        assert!(parts[1].ends_with(".parquet"));
        // aqi-labeled- + YYMMDD + .parquet
        assert_eq!(parts[1].len(), 12 + 6 + 8);
    }

    #[test]
    fn test_city_export_filename() {
        let path = city_export_filename(Path::new("exports"), "Navi Mumbai");
        assert_eq!(path, PathBuf::from("exports/Navi_Mumbai_air_quality.csv"));

        let path = city_export_filename(Path::new("."), "../etc");
        assert_eq!(path.file_name().unwrap(), "___etc_air_quality.csv");
    }
}
