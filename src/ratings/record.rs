/// Race records and the assembler that builds them
use super::{RatingError, RatingScore, Result, TrackingList};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Longest venue name kept in a record, in characters
pub const DEFAULT_MAX_VENUE_LEN: usize = 30;

/// Descriptive fields of a race as reported by the source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceMetadata {
    pub date: NaiveDate,
    pub venue: String,
    #[serde(default)]
    pub country: String,
    /// Free-text series label
    pub series: String,
    /// Free-text category label
    pub category: String,
}

/// One rated race, as persisted.
///
/// Field order is the on-disk key order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceRecord {
    pub date: NaiveDate,
    pub venue: String,
    pub country: String,
    pub series: String,
    pub category: String,
    pub rating: u8,
}

/// Merge key of a race record
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RaceIdentity {
    pub date: NaiveDate,
    pub venue: String,
    pub category: String,
}

impl RaceRecord {
    pub fn identity(&self) -> RaceIdentity {
        RaceIdentity {
            date: self.date,
            venue: self.venue.clone(),
            category: self.category.clone(),
        }
    }
}

/// Packages rated races into records, keeping untracked races out
#[derive(Debug, Clone)]
pub struct RaceAssembler {
    series: TrackingList,
    categories: TrackingList,
    max_venue_len: usize,
}

impl RaceAssembler {
    pub fn new(series: TrackingList, categories: TrackingList, max_venue_len: usize) -> Self {
        Self {
            series,
            categories,
            max_venue_len,
        }
    }

    /// Canonical series and category for a race, if both are tracked
    pub fn resolve(&self, metadata: &RaceMetadata) -> Option<(&str, &str)> {
        let series = self.series.resolve(&metadata.series)?;
        let category = self.categories.resolve(&metadata.category)?;
        Some((series, category))
    }

    /// Build the record for a rated race
    pub fn assemble(&self, metadata: &RaceMetadata, rating: &RatingScore) -> Result<RaceRecord> {
        let (series, category) = self.resolve(metadata).ok_or_else(|| RatingError::UntrackedRace {
            series: metadata.series.clone(),
            category: metadata.category.clone(),
        })?;

        Ok(RaceRecord {
            date: metadata.date,
            venue: truncate_chars(metadata.venue.trim(), self.max_venue_len),
            country: metadata.country.trim().to_string(),
            series: series.to_string(),
            category: category.to_string(),
            rating: rating.stars,
        })
    }
}

impl Default for RaceAssembler {
    fn default() -> Self {
        Self::new(
            TrackingList::default_series(),
            TrackingList::default_categories(),
            DEFAULT_MAX_VENUE_LEN,
        )
    }
}

fn truncate_chars(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect::<String>().trim_end().to_string()
}
