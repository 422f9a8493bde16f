/// Race rating core
///
/// This module turns the raw time gaps of a race into an excitement rating and
/// packages the result as a persisted race record.

pub mod gaps;
pub mod engine;
pub mod tracking;
pub mod record;

// Re-export main types
pub use gaps::{build_gap_sequence, normalize_gap, GapSequence, DEFAULT_IMPLAUSIBLE_THRESHOLD};
pub use engine::{score, RatingScore};
pub use tracking::{TrackedName, TrackingList};
pub use record::{RaceAssembler, RaceIdentity, RaceMetadata, RaceRecord};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result type for rating operations
pub type Result<T> = std::result::Result<T, RatingError>;

/// Per-race conditions raised by the rating core.
///
/// None of these are fatal to a run: a rejected gap drops one rider, the
/// other two drop one race.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RatingError {
    #[error("Unparseable gap value: {0:?}")]
    GapRejected(String),

    #[error("Insufficient gap data: {usable} distinct usable gap(s), need at least 2")]
    InsufficientData { usable: usize },

    #[error("Untracked race: series {series:?}, category {category:?}")]
    UntrackedRace { series: String, category: String },
}

/// A single time-gap field as supplied by a results source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawGap {
    /// Whole seconds already parsed by the source
    Seconds(i64),
    /// Any other numeric value
    Number(f64),
    /// Clock string, bare integer string or same-time marker
    Text(String),
}

impl From<&str> for RawGap {
    fn from(value: &str) -> Self {
        RawGap::Text(value.to_string())
    }
}

impl From<String> for RawGap {
    fn from(value: String) -> Self {
        RawGap::Text(value)
    }
}

impl From<i64> for RawGap {
    fn from(value: i64) -> Self {
        RawGap::Seconds(value)
    }
}

impl fmt::Display for RawGap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawGap::Seconds(s) => write!(f, "{}", s),
            RawGap::Number(n) => write!(f, "{}", n),
            RawGap::Text(t) => write!(f, "{}", t),
        }
    }
}
