/// Race result sources
///
/// A source delivers raw per-race data: identity, metadata labels and the
/// ordered raw gap fields of the finishers behind the winner. Sources are
/// interchangeable behind [`RaceSource`].

pub mod cyclocross24;
pub mod json_file;

pub use cyclocross24::Cyclocross24Source;
pub use json_file::JsonFileSource;

use crate::ratings::{RaceMetadata, RawGap};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};

/// Raw data for one race as delivered by a source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRace {
    /// Source-specific race identifier
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(flatten)]
    pub metadata: RaceMetadata,
    /// Gap fields in finishing order, second place first
    #[serde(default)]
    pub raw_gaps: Vec<RawGap>,
}

/// Supplies raw races to the rating pipeline
#[async_trait]
pub trait RaceSource: Send + Sync {
    /// Human readable source name
    fn name(&self) -> &str;

    /// Fetch every race the source currently offers.
    ///
    /// Failures on individual races are logged and skipped; an error means
    /// the source as a whole was unusable.
    async fn fetch_races(&self) -> Result<Vec<RawRace>>;
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(u64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(text) => text,
        Id::Number(number) => number.to_string(),
    })
}
