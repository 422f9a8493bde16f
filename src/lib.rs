/// CX Race Ratings
///
/// Rates cyclocross races from the finishing-time gaps between the top riders
/// and keeps the ratings in a single JSON document keyed by race.

pub mod config;
pub mod ratings;
pub mod store;
pub mod source;
pub mod pipeline;

// Re-export main types for easy access
pub use crate::config::{Config, ConfigBuilder};
pub use crate::ratings::{RaceAssembler, RaceRecord, RatingError, RatingScore, RawGap};
pub use crate::store::{PersistedCollection, RaceStore};
pub use crate::source::{Cyclocross24Source, JsonFileSource, RaceSource, RawRace};
pub use crate::pipeline::{PipelineReport, RaceOutcome, RatingPipeline};
