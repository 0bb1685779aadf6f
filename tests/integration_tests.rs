use aqi_processor::analyzers::AirQualityAnalyzer;
use aqi_processor::config::TrainingConfig;
use aqi_processor::inference::InferenceContext;
use aqi_processor::ml::TrainingPipeline;
use aqi_processor::models::{Category, Pollutant};
use aqi_processor::processors::{DataCleaner, Labeler};
use aqi_processor::readers::ReadingCsvReader;
use aqi_processor::thresholds::{classify, classify_pollutant, ThresholdTable};
use aqi_processor::writers::CsvWriter;
use aqi_processor::ProcessingError;
use pretty_assertions::assert_eq;
use std::fmt::Write as _;
use std::fs;
use tempfile::TempDir;

const RAW_HEADER: &str =
    "country,state,city,station,last_update,latitude,longitude,pollutant_id,pollutant_min,pollutant_max,pollutant_avg\n";

/// 100 PM2.5 readings spread over [0, 297] plus two rows cleaning must drop.
fn raw_csv() -> String {
    let mut csv = String::from(RAW_HEADER);
    for i in 0..100 {
        let v = i as f64 * 3.0;
        let city = ["Delhi", "Kanpur", "Patna", "Agra"][i % 4];
        writeln!(
            csv,
            "India,State,{city},Station {i},21-02-2024 10:00:00,26.{i:02},80.{i:02},PM2.5,{v},{v},{v}"
        )
        .unwrap();
    }
    csv.push_str("India,State,,Orphan,21-02-2024 10:00:00,26.0,80.0,PM2.5,10,12,11\n");
    csv.push_str("India,State,Delhi,Dusty,21-02-2024 10:00:00,26.0,80.0,DUST,10,12,11\n");
    csv
}

fn near_boundary(value: f64, pollutant: Pollutant, margin: f64) -> bool {
    ThresholdTable::standard()
        .ranges(pollutant)
        .unwrap()
        .iter()
        .flat_map(|r| [r.low, r.high])
        .filter(|b| b.is_finite())
        .any(|b| (value - b).abs() <= margin)
}

#[test]
fn test_end_to_end_pipeline() {
    let temp_dir = TempDir::new().unwrap();
    let raw_path = temp_dir.path().join("raw.csv");
    fs::write(&raw_path, raw_csv()).unwrap();

    // Clean
    let raw = ReadingCsvReader::new().read_raw(&raw_path).unwrap();
    let (readings, clean_report) = DataCleaner::new().clean(raw);
    assert_eq!(clean_report.rows_read, 102);
    assert_eq!(readings.len(), 100);
    assert_eq!(clean_report.dropped_unknown_pollutant, 1);

    let cleaned_path = temp_dir.path().join("processed").join("cleaned.csv");
    CsvWriter::new().write(&readings, &cleaned_path).unwrap();
    assert_eq!(ReadingCsvReader::new().read_cleaned(&cleaned_path).unwrap(), readings);

    // Label
    let (labeled, label_report) = Labeler::default().label_dataset(readings.clone());
    assert_eq!(label_report.count(Category::Unknown), 0);
    for reading in &labeled {
        assert_eq!(
            reading.pollution_level,
            classify_pollutant(reading.pollutant_id, reading.pollutant_avg)
        );
    }

    // Train and persist
    let config = TrainingConfig {
        n_estimators: 30,
        cv_folds: 3,
        ..TrainingConfig::default()
    };
    let outcome = TrainingPipeline::new(config).train(&labeled).unwrap();
    assert_eq!(outcome.report.train_rows, 80);
    assert_eq!(outcome.report.test_rows, 20);

    let model_path = temp_dir.path().join("models").join("pollution_classifier.bin");
    let encoders_path = temp_dir.path().join("models").join("label_encoders.bin");
    outcome.model.save(&model_path).unwrap();
    outcome.encoders.save(&encoders_path).unwrap();

    // Infer from reloaded artifacts
    let context = InferenceContext::load(&model_path, &encoders_path).unwrap();
    let in_memory = InferenceContext::new(outcome.model.forest.clone(), outcome.encoders.clone()).unwrap();

    let mut checked = 0;
    let mut agree = 0;
    for reading in &labeled {
        let v = reading.pollutant_avg;
        let predicted = context.predict(Pollutant::Pm25, v, v).unwrap();
        assert_eq!(predicted, in_memory.predict(Pollutant::Pm25, v, v).unwrap());
        if near_boundary(v, Pollutant::Pm25, 3.0) {
            continue;
        }
        checked += 1;
        if predicted == reading.pollution_level {
            agree += 1;
        }
    }
    assert!(checked > 50);
    assert!(
        agree as f64 / checked as f64 >= 0.9,
        "model agreed with thresholds on {}/{} readings",
        agree,
        checked
    );

    // A pollutant absent from training cannot be encoded
    match context.predict(Pollutant::No2, 10.0, 20.0) {
        Err(ProcessingError::UnknownCategory { encoder, value }) => {
            assert_eq!(encoder, "pollutant");
            assert_eq!(value, "NO2");
        }
        other => panic!("expected UnknownCategory, got {:?}", other),
    }

    // Dashboard views over the same data
    let analyzer = AirQualityAnalyzer::new(&readings);
    assert_eq!(analyzer.cities(), vec!["Agra", "Delhi", "Kanpur", "Patna"]);
    let levels = analyzer.predicted_levels(&context).unwrap();
    let distribution = AirQualityAnalyzer::category_distribution(&levels);
    assert_eq!(distribution.iter().map(|(_, n)| n).sum::<usize>(), 100);
    assert_eq!(analyzer.map_markers(&levels).unwrap().len(), 100);
}

#[test]
fn test_classification_properties() {
    let table = ThresholdTable::standard();

    for pollutant in Pollutant::ALL {
        // Every non-negative integer classifies, and severity never decreases
        let mut previous = Category::Good;
        for v in 0..=2000 {
            let category = classify_pollutant(pollutant, v as f64);
            if pollutant != Pollutant::Co {
                assert!(category.is_known(), "{} {} -> {}", pollutant, v, category);
            }
            if category.is_known() {
                assert!(category >= previous, "{} {} went from {} to {}", pollutant, v, previous, category);
                previous = category;
            }
        }

        // Values past the last lower bound are Severe
        let top = table.max_boundary(pollutant).unwrap();
        assert_eq!(classify_pollutant(pollutant, top), Category::Severe);
        assert_eq!(classify_pollutant(pollutant, top * 10.0), Category::Severe);
        assert_eq!(classify_pollutant(pollutant, f64::NAN), Category::Unknown);
    }

    assert_eq!(classify("PM2.5", 30.0), Category::Good);
    assert_eq!(classify("PM2.5", 31.0), Category::Satisfactory);
    assert_eq!(classify("CO", 1.05), Category::Unknown);
    assert_eq!(classify("CO", 34.1), Category::Severe);
    assert_eq!(classify("XYZ", 10.0), Category::Unknown);
    assert_eq!(classify("PM10", -1.0), Category::Unknown);
}
