use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::ratings::{build_gap_sequence, score, RaceAssembler, RaceRecord, RatingError, RatingScore};
use crate::source::RawRace;

/// What happened to a single race
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RaceOutcome {
    /// Scored and packaged for persistence
    Rated { record: RaceRecord, score: RatingScore },
    /// Too few distinct gaps to rate; nothing is written for this race
    InsufficientData { usable: usize },
    /// Series or category not tracked; nothing is written for this race
    Untracked { series: String, category: String },
}

/// Overall results of a rating pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineReport {
    pub total: usize,
    pub rated: usize,
    pub insufficient_data: usize,
    pub untracked: usize,
    /// Records ready to merge, in source order
    pub records: Vec<RaceRecord>,
}

impl PipelineReport {
    pub fn skipped(&self) -> usize {
        self.insufficient_data + self.untracked
    }
}

/// Turns raw races into race records: gaps, score, then assembly
#[derive(Debug, Clone)]
pub struct RatingPipeline {
    assembler: RaceAssembler,
    implausible_threshold: u32,
}

impl RatingPipeline {
    pub fn new(assembler: RaceAssembler, implausible_threshold: u32) -> Self {
        Self {
            assembler,
            implausible_threshold,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.tracking.assembler(), config.rating.implausible_threshold)
    }

    /// Rate a single race. Each race depends only on its own data.
    pub fn rate_race(&self, race: &RawRace) -> RaceOutcome {
        let gaps = match build_gap_sequence(&race.raw_gaps, self.implausible_threshold) {
            Ok(gaps) => gaps,
            Err(RatingError::InsufficientData { usable }) => return RaceOutcome::InsufficientData { usable },
            Err(e) => {
                warn!("Race {} gaps unusable: {}", race.id, e);
                return RaceOutcome::InsufficientData { usable: 0 };
            }
        };

        let rating = score(&gaps);
        debug!("Race {} gaps {:?} -> score {}", race.id, gaps.as_slice(), rating.score);

        match self.assembler.assemble(&race.metadata, &rating) {
            Ok(record) => RaceOutcome::Rated { record, score: rating },
            Err(_) => RaceOutcome::Untracked {
                series: race.metadata.series.clone(),
                category: race.metadata.category.clone(),
            },
        }
    }

    /// Rate every race; failures stay with their race
    pub fn rate_all(&self, races: &[RawRace]) -> PipelineReport {
        let mut report = PipelineReport {
            total: races.len(),
            ..PipelineReport::default()
        };

        for race in races {
            match self.rate_race(race) {
                RaceOutcome::Rated { record, score } => {
                    info!("  ✓ {} ({}): {} stars [score {}]", record.venue, record.category, record.rating, score.score);
                    report.rated += 1;
                    report.records.push(record);
                }
                RaceOutcome::InsufficientData { usable } => {
                    warn!("  ⚠️ Race {} skipped: only {} usable gap(s)", race.id, usable);
                    report.insufficient_data += 1;
                }
                RaceOutcome::Untracked { series, category } => {
                    debug!("Race {} not tracked (series {:?}, category {:?})", race.id, series, category);
                    report.untracked += 1;
                }
            }
        }

        info!(
            "📊 Rated {} of {} races ({} insufficient data, {} untracked)",
            report.rated, report.total, report.insufficient_data, report.untracked
        );

        report
    }
}

impl Default for RatingPipeline {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratings::{RaceMetadata, RawGap};
    use chrono::NaiveDate;

    fn raw_race(id: &str, series: &str, category: &str, gaps: &[&str]) -> RawRace {
        RawRace {
            id: id.to_string(),
            metadata: RaceMetadata {
                date: NaiveDate::from_ymd_opt(2025, 12, 21).unwrap(),
                venue: "Namur".to_string(),
                country: "BEL".to_string(),
                series: series.to_string(),
                category: category.to_string(),
            },
            raw_gaps: gaps.iter().map(|g| RawGap::from(*g)).collect(),
        }
    }

    #[test]
    fn test_rate_race() {
        let outcome = RatingPipeline::default().rate_race(&raw_race("1", "UCI World Cup", "Men Elite", &["s.t.", "0:05"]));

        match outcome {
            RaceOutcome::Rated { record, score } => {
                assert_eq!(score, RatingScore { score: 82, stars: 5 });
                assert_eq!(record.rating, 5);
                assert_eq!(record.category, "Elite Men");
            }
            other => panic!("expected rated race, got {:?}", other),
        }
    }

    #[test]
    fn test_insufficient_data_is_not_a_rating() {
        let outcome = RatingPipeline::default().rate_race(&raw_race("2", "UCI World Cup", "Elite Men", &["0:05", "abc"]));
        assert_eq!(outcome, RaceOutcome::InsufficientData { usable: 1 });
    }

    #[test]
    fn test_insufficient_data_reports_usable_count() {
        let pipeline = RatingPipeline::default();

        let none_usable = raw_race("5", "UCI World Cup", "Elite Men", &["DNF", "1:02:11"]);
        assert_eq!(pipeline.rate_race(&none_usable), RaceOutcome::InsufficientData { usable: 0 });

        let one_distinct = raw_race("6", "UCI World Cup", "Elite Men", &["s.t.", "0", "-", "1e3"]);
        assert_eq!(pipeline.rate_race(&one_distinct), RaceOutcome::InsufficientData { usable: 1 });
    }

    #[test]
    fn test_untracked_race_with_extreme_gaps() {
        let outcome = RatingPipeline::default().rate_race(&raw_race("3", "Kermiscross", "Elite Men", &["0", "1", "2"]));
        assert!(matches!(outcome, RaceOutcome::Untracked { .. }));
    }

    #[test]
    fn test_rate_all_isolates_failures() {
        let races = vec![
            raw_race("1", "UCI World Cup", "Elite Men", &["0:45", "1:10"]),
            raw_race("2", "UCI World Cup", "Elite Men", &["5"]),
            raw_race("3", "Superprestige", "Junior Men", &["0", "3"]),
            raw_race("4", "Superprestige", "Elite Women", &["0:02", "0:08", "0:15"]),
        ];

        let report = RatingPipeline::default().rate_all(&races);
        assert_eq!(report.total, 4);
        assert_eq!(report.rated, 2);
        assert_eq!(report.insufficient_data, 1);
        assert_eq!(report.untracked, 1);
        assert_eq!(report.skipped(), 2);
        assert_eq!(report.records.len(), 2);
        assert_eq!(report.records[0].rating, 1);
        assert_eq!(report.records[1].series, "Superprestige");
    }
}
