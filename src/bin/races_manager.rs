use anyhow::Result;
use clap::{Parser, Subcommand};
use cx_race_ratings::ratings::{build_gap_sequence, engine, RawGap};
use cx_race_ratings::store::RaceStore;
use cx_race_ratings::Config;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "races-manager")]
#[command(about = "Race ratings file utility")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, default_value = "races.json")]
    file: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// List stored races, newest first
    List {
        /// Show at most this many races
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show statistics for the stored races
    Stats,
    /// Rate an ad-hoc list of gaps, second place first
    Score {
        /// Gap values such as "0:03", "s.t." or "12"
        #[arg(required = true, allow_hyphen_values = true)]
        gaps: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("info")
        .init();

    let cli = Cli::parse();
    let store = RaceStore::new(cli.file);

    match cli.command {
        Commands::List { limit } => {
            let collection = store.load().await;

            if collection.is_empty() {
                info!("📭 No stored races found");
                return Ok(());
            }

            info!("📚 {} stored races:", collection.len());
            for race in collection.races.iter().take(limit.unwrap_or(usize::MAX)) {
                info!(
                    "  {} {:<30} {:<24} {:<12} {}",
                    race.date,
                    race.venue,
                    race.series,
                    race.category,
                    "★".repeat(race.rating as usize)
                );
            }
        }

        Commands::Stats => {
            let stats = store.stats().await;
            info!("📊 Race Statistics:");
            info!("  Total races: {}", stats.total_races);
            if let Some(last_updated) = stats.last_updated {
                info!("  Last updated: {}", last_updated);
            }
            if let (Some(oldest), Some(newest)) = (stats.oldest, stats.newest) {
                info!("  Date range: {} .. {}", oldest, newest);
            }
            for (series, count) in &stats.by_series {
                info!("  {}: {}", series, count);
            }
            for (category, count) in &stats.by_category {
                info!("  {}: {}", category, count);
            }
            for (stars, count) in &stats.by_stars {
                info!("  {} star(s): {}", stars, count);
            }
        }

        Commands::Score { gaps } => {
            let threshold = Config::load()
                .map(|c| c.rating.implausible_threshold)
                .unwrap_or(cx_race_ratings::ratings::DEFAULT_IMPLAUSIBLE_THRESHOLD);
            let raw: Vec<RawGap> = gaps.into_iter().map(RawGap::from).collect();

            match build_gap_sequence(&raw, threshold) {
                Ok(sequence) => {
                    let rating = engine::score(&sequence);
                    info!("Gaps: {:?}", sequence.as_slice());
                    info!("Close finishers: {}", engine::close_finishers(&sequence));
                    info!("Score: {} -> {} stars", rating.score, rating.stars);
                }
                Err(e) => warn!("⚠️ Not ratable: {}", e),
            }
        }
    }

    Ok(())
}
