use anyhow::Result;
use clap::{Arg, Command};
use cx_race_ratings::{Config, Cyclocross24Source, JsonFileSource, RaceSource, RaceStore, RatingPipeline};
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("CX Race Ratings")
        .version("0.1.0")
        .author("TigreRoll")
        .about("Rates cyclocross races from finishing-time gaps")
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .help("Race ratings file to merge into (default: races.json)")
        )
        .arg(
            Arg::new("input")
                .short('i')
                .long("input")
                .value_name("FILE")
                .help("Read raw races from a JSON file instead of the website")
        )
        .arg(
            Arg::new("limit")
                .short('n')
                .long("limit")
                .value_name("NUM")
                .help("Maximum number of races to process")
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file")
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .help("Rate races and print the records without saving")
                .action(clap::ArgAction::SetTrue)
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue)
        )
        .get_matches();

    let verbose = matches.get_flag("verbose");
    let dry_run = matches.get_flag("dry-run");

    // Load configuration before logging so the configured level applies
    let (mut config, load_error) = match matches.get_one::<String>("config") {
        Some(path) => (Config::from_file(&PathBuf::from(path))?, None),
        None => match Config::load() {
            Ok(config) => (config, None),
            Err(e) => (Config::default(), Some(e)),
        },
    };

    // Initialize logging
    let default_filter = if verbose {
        "cx_race_ratings=debug,info".to_string()
    } else {
        format!("cx_race_ratings={},warn", config.output.log_level)
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .init();

    if let Some(e) = load_error {
        warn!("Failed to load config, using defaults: {}", e);
    }

    if let Some(output) = matches.get_one::<String>("output") {
        config.output.races_file = PathBuf::from(output);
    }
    let limit = match matches.get_one::<String>("limit") {
        Some(limit) => Some(limit.parse::<usize>()?),
        None => None,
    };
    if let Some(limit) = limit {
        config.fetch.max_races = limit;
    }

    config.validate()?;

    info!("🚲 CX Race Ratings starting...");
    for line in config.summary().lines() {
        info!("{}", line);
    }

    let source: Box<dyn RaceSource> = match matches.get_one::<String>("input") {
        Some(input) => Box::new(JsonFileSource::new(input)),
        None => Box::new(Cyclocross24Source::new(config.fetch.clone())?),
    };

    let start_time = std::time::Instant::now();
    let mut races = source.fetch_races().await.map_err(|e| {
        error!("Source {} failed: {:#}", source.name(), e);
        e
    })?;
    if let Some(limit) = limit {
        races.truncate(limit);
    }

    let pipeline = RatingPipeline::from_config(&config);
    let report = pipeline.rate_all(&races);

    if dry_run {
        println!("{}", serde_json::to_string_pretty(&report.records)?);
        info!("🧪 Dry run, {} not modified", config.output.races_file.display());
        return Ok(());
    }

    let store = RaceStore::new(config.output.races_file.clone());
    let collection = store.merge_and_save(report.records).await?;

    info!("🎉 Completed in {:.2}s", start_time.elapsed().as_secs_f64());
    info!("✅ Saved {} races to {}", collection.len(), store.path().display());

    Ok(())
}
