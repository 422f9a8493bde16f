/// Raw races read from a local JSON file
use super::{RaceSource, RawRace};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::info;

/// Reads a JSON array of raw races, for offline runs and replays
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RaceSource for JsonFileSource {
    fn name(&self) -> &str {
        "json-file"
    }

    async fn fetch_races(&self) -> Result<Vec<RawRace>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("reading raw races from {}", self.path.display()))?;
        let races: Vec<RawRace> =
            serde_json::from_str(&content).with_context(|| format!("parsing raw races in {}", self.path.display()))?;

        info!("📄 Read {} raw races from {}", races.len(), self.path.display());
        Ok(races)
    }
}
