use crate::analyzers::AirQualityAnalyzer;
use crate::cli::args::{Cli, Commands, Method, ParquetArgs, TrainingArgs};
use crate::config::{AppConfig, TrainingConfig};
use crate::error::{ProcessingError, Result};
use crate::inference::InferenceContext;
use crate::ml::TrainingPipeline;
use crate::models::{LabeledReading, Pollutant, PollutantReading};
use crate::processors::{DataCleaner, Labeler};
use crate::readers::ReadingCsvReader;
use crate::thresholds::{classify_detailed, classify_range, classify_range_detailed, ThresholdTable};
use crate::utils::constants::{DEFAULT_CHUNK_SIZE, MAP_CENTER};
use crate::utils::filename::{city_export_filename, generate_default_labeled_parquet_filename};
use crate::utils::logging::init_logging;
use crate::utils::progress::ProgressReporter;
use crate::writers::{CsvWriter, ParquetWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub async fn run(cli: Cli) -> Result<()> {
    init_logging(cli.verbose, cli.log_file.as_deref())?;

    let config = AppConfig::load(cli.config.as_deref())?;
    configure_thread_pool(cli.max_workers);

    match cli.command {
        Commands::Clean {
            input,
            output,
            use_mmap,
            validate_only,
        } => {
            let input = input.unwrap_or_else(|| config.paths.raw_data.clone());
            let output = output.unwrap_or_else(|| config.paths.cleaned_data.clone());

            let readings = clean_step(&input, use_mmap)?;
            if validate_only {
                println!("Validation complete - no output file written");
                return Ok(());
            }

            let written = CsvWriter::new().write(&readings, &output)?;
            println!("Wrote {} cleaned readings to {}", written, output.display());
        }

        Commands::Label {
            input,
            output,
            parquet,
        } => {
            let input = input.unwrap_or_else(|| config.paths.cleaned_data.clone());
            let output = output.unwrap_or_else(|| config.paths.labeled_data.clone());

            println!("Reading cleaned data: {}", input.display());
            let readings = ReadingCsvReader::new().read_cleaned(&input)?;
            label_step(readings, &output, &parquet)?;
        }

        Commands::Train { input, training } => {
            let input = input.unwrap_or_else(|| config.paths.labeled_data.clone());
            let labeled = read_labeled(&input)?;
            train_step(&labeled, &config, &training)?;
        }

        Commands::Pipeline {
            input,
            parquet,
            training,
        } => {
            let input = input.unwrap_or_else(|| config.paths.raw_data.clone());

            println!("[1/3] Cleaning");
            let readings = clean_step(&input, false)?;
            let cleaned_path = &config.paths.cleaned_data;
            CsvWriter::new().write(&readings, cleaned_path)?;
            println!("Cleaned data saved to {}", cleaned_path.display());

            println!("\n[2/3] Labeling");
            let labeled = label_step(readings, &config.paths.labeled_data, &parquet)?;

            println!("\n[3/3] Training");
            train_step(&labeled, &config, &training)?;

            println!("\nPipeline complete!");
        }

        Commands::Classify { pollutant, value } => {
            let classification = classify_detailed(&pollutant, value);
            println!("Pollutant: {}", pollutant);
            println!("Value: {}", value);
            println!("Threshold-based level: {}", classification.category);
            if let Some(reason) = classification.reason {
                println!("Reason: {:?}", reason);
            }
        }

        Commands::Predict {
            pollutant,
            min,
            max,
            method,
        } => {
            match method {
                Method::Model => {
                    let context = load_context(&config.paths.model, &config.paths.encoders).await?;
                    let level = context.predict_raw(&pollutant, min, max)?;
                    println!("Model prediction: {}", level);
                }
                Method::Threshold => {
                    let classification = classify_range_detailed(&pollutant, min, max);
                    println!("Threshold-based classification: {}", classification.category);
                    if let Some(reason) = classification.reason {
                        println!("Reason: {:?}", reason);
                    }
                }
            }
        }

        Commands::Thresholds { pollutant } => {
            let table = ThresholdTable::standard();
            println!("Breakpoint table {}\n", table.version());
            match pollutant {
                Some(p) => println!("{}", table.format_table(parse_pollutant(&p)?)),
                None => {
                    for p in table.pollutants() {
                        println!("{}", table.format_table(p));
                    }
                }
            }
        }

        Commands::City {
            city,
            pollutant,
            min,
            max,
            export,
            data,
        } => {
            let data = data.unwrap_or_else(|| config.paths.cleaned_data.clone());
            let readings = load_readings(data).await?;
            let analyzer = AirQualityAnalyzer::new(&readings);

            let pollutants = analyzer.city_pollutants(&city);
            if pollutants.is_empty() {
                return Err(ProcessingError::InvalidInput(format!(
                    "no readings for city '{}'",
                    city
                )));
            }
            let names: Vec<&str> = pollutants.iter().map(|p| p.as_str()).collect();
            println!("City: {}", city);
            println!("Pollutants: {}", names.join(", "));

            let selected = match pollutant {
                Some(p) => parse_pollutant(&p)?,
                None => pollutants[0],
            };
            if let Some(defaults) = analyzer.city_defaults(&city, selected) {
                let min = min.unwrap_or(defaults.pollutant_min);
                let max = max.unwrap_or(defaults.pollutant_max);
                println!("\n{}: min {:.2}, max {:.2}", selected, min, max);
                println!("Threshold-based level: {}", classify_range(selected, min, max));

                match load_context(&config.paths.model, &config.paths.encoders).await {
                    Ok(context) => match context.predict(selected, min, max) {
                        Ok(level) => println!("Model prediction: {}", level),
                        Err(e) => println!("Model prediction unavailable: {}", e),
                    },
                    Err(e) => warn!("Model not loaded: {}", e),
                }
            } else {
                println!("\nNo {} readings for {}", selected, city);
            }

            if let Some(dir) = export {
                let path = city_export_filename(&dir, &city);
                let rows = analyzer.city_readings(&city);
                let written = CsvWriter::new().write(rows, &path)?;
                println!("\nExported {} readings to {}", written, path.display());
            }
        }

        Commands::Map { output, data } => {
            let data = data.unwrap_or_else(|| config.paths.cleaned_data.clone());
            let (readings, context) = load_dataset_and_model(data, &config).await?;
            let analyzer = AirQualityAnalyzer::new(&readings);

            let levels = analyzer.predicted_levels(&context)?;
            let markers = analyzer.map_markers(&levels)?;
            let map = serde_json::json!({
                "center": { "latitude": MAP_CENTER.0, "longitude": MAP_CENTER.1 },
                "markers": markers,
            });
            let json = serde_json::to_string_pretty(&map)?;

            match output {
                Some(path) => {
                    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&path, json)?;
                    println!("Wrote {} markers to {}", markers.len(), path.display());
                }
                None => println!("{}", json),
            }
        }

        Commands::Insights { data, json } => {
            let data = data.unwrap_or_else(|| config.paths.cleaned_data.clone());
            let (readings, context) = load_dataset_and_model(data, &config).await?;
            let analyzer = AirQualityAnalyzer::new(&readings);

            let levels = analyzer.predicted_levels(&context)?;
            let distribution = AirQualityAnalyzer::category_distribution(&levels);
            let insights = analyzer.insights(&levels)?;

            if json {
                let distribution: Vec<_> = distribution
                    .iter()
                    .map(|(category, count)| serde_json::json!({ "level": category, "count": count }))
                    .collect();
                let body = serde_json::json!({
                    "distribution": distribution,
                    "insights": insights,
                });
                println!("{}", serde_json::to_string_pretty(&body)?);
            } else {
                println!("Predicted level distribution ({} readings):", levels.len());
                for (category, count) in &distribution {
                    println!("  {:<13} {:>7}", category.as_str(), count);
                }
                println!("\n{}", insights.summary());
            }
        }

        Commands::Analyze {
            pollutant,
            top,
            data,
        } => {
            let data = data.unwrap_or_else(|| config.paths.cleaned_data.clone());
            let readings = load_readings(data).await?;
            let analyzer = AirQualityAnalyzer::new(&readings);
            println!("{}", analyzer.generate_summary());

            let pollutants = match pollutant {
                Some(p) => vec![parse_pollutant(&p)?],
                None => Pollutant::ALL.to_vec(),
            };
            for p in pollutants {
                let ranked = analyzer.top_cities(p, top);
                if ranked.is_empty() {
                    println!("{} data not available in dataset.\n", p);
                    continue;
                }
                println!("Top {} cities by average {}:", ranked.len(), p);
                for (i, (city, mean)) in ranked.iter().enumerate() {
                    println!("  {:>2}. {:<24} {:>9.2} {}", i + 1, city, mean, p.units());
                }
                println!();
            }
        }
    }

    Ok(())
}

fn configure_thread_pool(max_workers: usize) {
    if let Err(e) = rayon::ThreadPoolBuilder::new()
        .num_threads(max_workers.max(1))
        .build_global()
    {
        debug!("Keeping existing rayon pool: {}", e);
    }
}

fn parse_pollutant(value: &str) -> Result<Pollutant> {
    value.parse()
}

fn clean_step(input: &Path, use_mmap: bool) -> Result<Vec<PollutantReading>> {
    println!("Reading raw data: {}", input.display());
    let progress = ProgressReporter::new_spinner("Cleaning data...", false);

    let raw = ReadingCsvReader::with_mmap(use_mmap).read_raw(input)?;
    let (readings, report) = DataCleaner::new().clean(raw);

    progress.finish_with_message(&format!("Cleaned {} readings", readings.len()));
    println!("\n{}", report.summary());
    Ok(readings)
}

fn label_step(
    readings: Vec<PollutantReading>,
    output: &Path,
    parquet: &ParquetArgs,
) -> Result<Vec<LabeledReading>> {
    let progress = ProgressReporter::new_spinner("Labeling readings...", false);
    let (labeled, report) = Labeler::default().label_dataset(readings);
    progress.finish_with_message(&format!("Labeled {} readings", labeled.len()));
    println!("\n{}", report.summary());

    let written = CsvWriter::new().write(&labeled, output)?;
    println!("Wrote {} labeled readings to {}", written, output.display());

    if parquet.parquet || parquet.parquet_file.is_some() {
        let path = parquet
            .parquet_file
            .clone()
            .unwrap_or_else(generate_default_labeled_parquet_filename);
        let writer = ParquetWriter::new().with_compression(&parquet.compression)?;
        writer.write_readings_batched(&labeled, &path, DEFAULT_CHUNK_SIZE)?;
        println!("\n{}", writer.get_file_info(&path)?.summary());
    }

    Ok(labeled)
}

fn read_labeled(path: &Path) -> Result<Vec<LabeledReading>> {
    println!("Reading labeled data: {}", path.display());
    let is_parquet = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("parquet"))
        .unwrap_or(false);
    if is_parquet {
        ParquetWriter::new().read_readings(path, 0)
    } else {
        ReadingCsvReader::new().read_labeled(path)
    }
}

fn training_config(base: &TrainingConfig, args: &TrainingArgs) -> TrainingConfig {
    let mut config = base.clone();
    if let Some(n) = args.n_estimators {
        config.n_estimators = n;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(test_size) = args.test_size {
        config.test_size = test_size;
    }
    if let Some(folds) = args.cv_folds {
        config.cv_folds = folds;
    }
    if args.max_depth.is_some() {
        config.max_depth = args.max_depth;
    }
    config
}

fn train_step(labeled: &[LabeledReading], config: &AppConfig, args: &TrainingArgs) -> Result<()> {
    let training = training_config(&config.training, args);
    let model_path = args.model.clone().unwrap_or_else(|| config.paths.model.clone());
    let encoders_path = args
        .encoders
        .clone()
        .unwrap_or_else(|| config.paths.encoders.clone());

    let outcome = TrainingPipeline::new(training).with_progress(true).train(labeled)?;
    println!("\n{}", outcome.report.summary());

    outcome.model.save(&model_path)?;
    outcome.encoders.save(&encoders_path)?;
    println!("Model saved to {}", model_path.display());
    println!("Encoders saved to {}", encoders_path.display());
    Ok(())
}

async fn load_readings(path: PathBuf) -> Result<Vec<PollutantReading>> {
    tokio::task::spawn_blocking(move || ReadingCsvReader::new().read_cleaned(&path)).await?
}

async fn load_context(model: &Path, encoders: &Path) -> Result<InferenceContext> {
    let model = model.to_path_buf();
    let encoders = encoders.to_path_buf();
    tokio::task::spawn_blocking(move || InferenceContext::load(&model, &encoders)).await?
}

/// Load the cleaned dataset and the model artifacts concurrently.
async fn load_dataset_and_model(
    data: PathBuf,
    config: &AppConfig,
) -> Result<(Vec<PollutantReading>, InferenceContext)> {
    let (readings, context) = tokio::try_join!(
        load_readings(data),
        load_context(&config.paths.model, &config.paths.encoders)
    )?;
    info!("Loaded {} readings and model", readings.len());
    Ok((readings, context))
}
