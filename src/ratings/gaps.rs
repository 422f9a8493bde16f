/// Gap normalization and gap sequence building
use super::{RatingError, RawGap, Result};
use std::collections::HashSet;
use tracing::debug;

/// Gaps at or above this many seconds are race times, not gaps
pub const DEFAULT_IMPLAUSIBLE_THRESHOLD: u32 = 3000;

/// Notations meaning "same time as the rider ahead"
const SAME_TIME_MARKERS: &[&str] = &["", "-", "s.t.", "s.t", "st", "same time", "\"\"", ",,", "0"];

/// Ordered, deduplicated gaps of a race, second place first.
///
/// Only [`build_gap_sequence`] creates one, so it always holds at least two values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GapSequence(Vec<u32>);

impl GapSequence {
    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Gap between the winner and second place
    pub fn gap_to_second(&self) -> u32 {
        self.0[0]
    }

    /// Gap between the winner and the next distinct finisher
    pub fn gap_to_third(&self) -> u32 {
        self.0[1]
    }

    pub fn into_inner(self) -> Vec<u32> {
        self.0
    }
}

/// Normalize one raw gap to whole seconds behind the leader
pub fn normalize_gap(raw: &RawGap) -> Result<u32> {
    match raw {
        RawGap::Seconds(s) => u32::try_from(*s).map_err(|_| RatingError::GapRejected(raw.to_string())),
        RawGap::Number(n) => whole_seconds(*n).ok_or_else(|| RatingError::GapRejected(raw.to_string())),
        RawGap::Text(text) => normalize_gap_text(text),
    }
}

fn normalize_gap_text(text: &str) -> Result<u32> {
    let cleaned = text.trim();
    let cleaned = cleaned.strip_prefix('+').unwrap_or(cleaned).trim();

    if SAME_TIME_MARKERS.iter().any(|m| cleaned.eq_ignore_ascii_case(m)) {
        return Ok(0);
    }

    if cleaned.contains(':') {
        return parse_clock(cleaned).ok_or_else(|| RatingError::GapRejected(text.to_string()));
    }

    plain_seconds(cleaned).ok_or_else(|| RatingError::GapRejected(text.to_string()))
}

/// Parse "12" or an integer-valued decimal like "12.0"
fn plain_seconds(value: &str) -> Option<u32> {
    let whole = match value.split_once('.') {
        Some((whole, fraction)) if !fraction.is_empty() && fraction.bytes().all(|b| b == b'0') => whole,
        Some(_) => return None,
        None => value,
    };

    if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    whole.parse::<u32>().ok()
}

/// Parse "M:SS" or "H:MM:SS"
fn parse_clock(clock: &str) -> Option<u32> {
    let fields = clock
        .split(':')
        .map(|part| part.trim().parse::<u32>().ok())
        .collect::<Option<Vec<u32>>>()?;

    match fields.as_slice() {
        [m, s] => m.checked_mul(60)?.checked_add(*s),
        [h, m, s] => h.checked_mul(3600)?.checked_add(m.checked_mul(60)?)?.checked_add(*s),
        _ => None,
    }
}

fn whole_seconds(value: f64) -> Option<u32> {
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value <= u32::MAX as f64 {
        Some(value as u32)
    } else {
        None
    }
}

/// Build the gap sequence of a race from its raw per-rider gaps.
///
/// Rejected values are skipped, values at or above `implausible_threshold`
/// are dropped, and repeated values collapse to their first occurrence.
pub fn build_gap_sequence<'a, I>(raw_gaps: I, implausible_threshold: u32) -> Result<GapSequence>
where
    I: IntoIterator<Item = &'a RawGap>,
{
    let mut seen = HashSet::new();
    let mut gaps = Vec::new();

    for raw in raw_gaps {
        let gap = match normalize_gap(raw) {
            Ok(gap) => gap,
            Err(e) => {
                debug!("Skipping gap: {}", e);
                continue;
            }
        };

        if gap >= implausible_threshold {
            debug!("Dropping implausible gap of {}s", gap);
            continue;
        }

        if seen.insert(gap) {
            gaps.push(gap);
        }
    }

    if gaps.len() < 2 {
        return Err(RatingError::InsufficientData { usable: gaps.len() });
    }

    Ok(GapSequence(gaps))
}
