/// Excitement rating engine
use super::GapSequence;
use serde::{Deserialize, Serialize};

/// Points for the gap to second place, first matching band wins.
/// `(upper bound in seconds, points)`
const GAP_TO_SECOND_BANDS: &[(u32, u32)] = &[(0, 40), (3, 35), (10, 25), (20, 15), (30, 10), (60, 5)];

/// Points for the gap to the next distinct finisher
const GAP_TO_THIRD_BANDS: &[(u32, u32)] = &[(5, 30), (15, 20), (30, 10), (60, 5)];

/// Only the first entries of the sequence count towards the close-finish bonus
const CLOSE_FINISH_WINDOW: usize = 10;
const CLOSE_FINISH_SECONDS: u32 = 10;
const CLOSE_FINISH_POINTS: u32 = 6;
const CLOSE_FINISH_CAP: u32 = 30;

/// Minimum score for each star count, highest first
const STAR_THRESHOLDS: &[(u32, u8)] = &[(80, 5), (60, 4), (40, 3), (20, 2)];

/// Score and star rating of a race
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingScore {
    /// Summed points, 0 to 100
    pub score: u32,
    /// Star rating, 1 to 5
    pub stars: u8,
}

fn band_points(gap: u32, bands: &[(u32, u32)]) -> u32 {
    bands
        .iter()
        .find(|(limit, _)| gap <= *limit)
        .map(|(_, points)| *points)
        .unwrap_or(0)
}

/// Number of values in the leading window that are within the close-finish margin
pub fn close_finishers(gaps: &GapSequence) -> usize {
    gaps.as_slice()
        .iter()
        .take(CLOSE_FINISH_WINDOW)
        .filter(|gap| **gap <= CLOSE_FINISH_SECONDS)
        .count()
}

/// Convert a 0-100 score to stars
pub fn stars_for_score(score: u32) -> u8 {
    STAR_THRESHOLDS
        .iter()
        .find(|(min, _)| score >= *min)
        .map(|(_, stars)| *stars)
        .unwrap_or(1)
}

/// Rate a race from its gap sequence
pub fn score(gaps: &GapSequence) -> RatingScore {
    let second = band_points(gaps.gap_to_second(), GAP_TO_SECOND_BANDS);
    let third = band_points(gaps.gap_to_third(), GAP_TO_THIRD_BANDS);
    let bonus = (close_finishers(gaps) as u32 * CLOSE_FINISH_POINTS).min(CLOSE_FINISH_CAP);

    let score = second + third + bonus;
    RatingScore {
        score,
        stars: stars_for_score(score),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratings::{build_gap_sequence, RawGap, DEFAULT_IMPLAUSIBLE_THRESHOLD};

    fn seq(values: &[i64]) -> GapSequence {
        let raw: Vec<RawGap> = values.iter().map(|v| RawGap::Seconds(*v)).collect();
        build_gap_sequence(&raw, DEFAULT_IMPLAUSIBLE_THRESHOLD).unwrap()
    }

    #[test]
    fn test_photo_finish_is_five_stars() {
        let rating = score(&seq(&[0, 5]));
        assert_eq!(rating, RatingScore { score: 82, stars: 5 });
    }

    #[test]
    fn test_processional_race_is_one_star() {
        let rating = score(&seq(&[45, 70]));
        assert_eq!(rating, RatingScore { score: 5, stars: 1 });
    }

    #[test]
    fn test_bands_are_first_match() {
        assert_eq!(band_points(0, GAP_TO_SECOND_BANDS), 40);
        assert_eq!(band_points(3, GAP_TO_SECOND_BANDS), 35);
        assert_eq!(band_points(4, GAP_TO_SECOND_BANDS), 25);
        assert_eq!(band_points(60, GAP_TO_SECOND_BANDS), 5);
        assert_eq!(band_points(61, GAP_TO_SECOND_BANDS), 0);

        assert_eq!(band_points(0, GAP_TO_THIRD_BANDS), 30);
        assert_eq!(band_points(15, GAP_TO_THIRD_BANDS), 20);
        assert_eq!(band_points(31, GAP_TO_THIRD_BANDS), 5);
        assert_eq!(band_points(900, GAP_TO_THIRD_BANDS), 0);
    }

    #[test]
    fn test_close_finish_bonus_is_capped() {
        // 12 distinct gaps, the first 10 are all within 10s
        let gaps = seq(&[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 10]);
        assert_eq!(close_finishers(&gaps), 10);
        assert_eq!(score(&gaps), RatingScore { score: 100, stars: 5 });
    }

    #[test]
    fn test_close_finish_window_ignores_later_entries() {
        let gaps = seq(&[20, 30, 40, 50, 60, 70, 80, 90, 100, 110, 1, 2]);
        assert_eq!(close_finishers(&gaps), 0);
        // 15 + 10 + 0
        assert_eq!(score(&gaps), RatingScore { score: 25, stars: 2 });
    }

    #[test]
    fn test_mid_table_race() {
        // 25 + 20 + two close finishers
        let gaps = seq(&[8, 12, 10, 45]);
        assert_eq!(close_finishers(&gaps), 2);
        assert_eq!(score(&gaps), RatingScore { score: 57, stars: 3 });
    }

    #[test]
    fn test_star_thresholds() {
        assert_eq!(stars_for_score(100), 5);
        assert_eq!(stars_for_score(80), 5);
        assert_eq!(stars_for_score(79), 4);
        assert_eq!(stars_for_score(60), 4);
        assert_eq!(stars_for_score(40), 3);
        assert_eq!(stars_for_score(39), 2);
        assert_eq!(stars_for_score(20), 2);
        assert_eq!(stars_for_score(19), 1);
        assert_eq!(stars_for_score(0), 1);
    }
}
