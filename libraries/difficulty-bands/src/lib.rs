//! Difficulty band table mapping raw word difficulty onto the scaled
//! learner-ability domain.
//!
//! The table is an ordered list of bands. Each band owns a contiguous slice
//! of the raw-difficulty domain and a contiguous slice of the scaled score
//! domain, and the full list partitions both domains with no gaps or
//! overlaps. Everything downstream (calibration, session building, score
//! aggregation) talks about learner ability in scaled units and about words
//! in raw units, and this crate is the only place the two are converted.
//!
//! # Example
//!
//! ```
//! use difficulty_bands::BandTable;
//!
//! let table = BandTable::builtin();
//! let band = table.band_for_difficulty(450).unwrap();
//! assert_eq!(band.label, "a2");
//! ```

use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

/// Number of items in a study session when the caller does not ask for a
/// specific size.
pub const DEFAULT_SESSION_SIZE: usize = 5;

/// How many slots of a session are reserved for reviewing weak words, when
/// enough reviewable words exist.
pub const REVIEW_WORD_TARGET: usize = 3;

/// Width, in raw-difficulty units, of the window centered on a learner's
/// ability from which new words are drawn.
pub const NEIGHBOR_WINDOW: u32 = 450;

/// Ability score assigned at signup, before any calibration or study data
/// exists. Sits inside the second band of the builtin table.
pub const DEFAULT_USER_SCORE: f64 = 20.0;

/// An inclusive integer range. Used for both the raw and scaled sides of a
/// band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub min: u32,
    pub max: u32,
}

impl Span {
    pub fn contains(&self, value: u32) -> bool {
        self.min <= value && value <= self.max
    }

    /// Number of integer values covered, inclusive of both ends.
    pub fn width(&self) -> u32 {
        self.max - self.min + 1
    }
}

/// One difficulty band: a labeled pairing of a raw-difficulty slice with the
/// scaled score slice it maps to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Band {
    pub label: String,
    pub raw: Span,
    pub scaled: Span,
}

#[derive(Debug, thiserror::Error)]
pub enum BandTableError {
    #[error("band table source is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("band table is empty")]
    Empty,
    #[error("band {index} ({label:?}) is malformed: {reason}")]
    Malformed {
        index: usize,
        label: String,
        reason: String,
    },
}

/// The validated, immutable band table. Construct once at startup and pass
/// by reference to the scheduler components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Band>", into = "Vec<Band>")]
pub struct BandTable {
    bands: Vec<Band>,
}

static BUILTIN: LazyLock<BandTable> = LazyLock::new(|| {
    BandTable::from_json(include_str!("../bands.json"))
        .expect("embedded band table must be valid")
});

impl BandTable {
    /// Validate and adopt an ordered list of bands.
    pub fn new(bands: Vec<Band>) -> Result<Self, BandTableError> {
        if bands.is_empty() {
            return Err(BandTableError::Empty);
        }

        let malformed = |index: usize, reason: &str| BandTableError::Malformed {
            index,
            label: bands[index].label.clone(),
            reason: reason.to_string(),
        };

        for (i, band) in bands.iter().enumerate() {
            if band.raw.min > band.raw.max {
                return Err(malformed(i, "raw range is inverted"));
            }
            if band.scaled.min > band.scaled.max {
                return Err(malformed(i, "scaled range is inverted"));
            }
            if i > 0 {
                let prev = &bands[i - 1];
                if band.raw.min != prev.raw.max + 1 {
                    return Err(malformed(
                        i,
                        "raw range does not continue the previous band",
                    ));
                }
                if band.scaled.min != prev.scaled.max + 1 {
                    return Err(malformed(
                        i,
                        "scaled range does not continue the previous band",
                    ));
                }
            }
        }

        Ok(Self { bands })
    }

    /// Parse and validate a band table from its JSON source.
    pub fn from_json(source: &str) -> Result<Self, BandTableError> {
        let bands: Vec<Band> = serde_json::from_str(source)?;
        Self::new(bands)
    }

    /// The table shipped with the application, embedded at compile time.
    /// Parsed and validated once per process.
    pub fn builtin() -> &'static BandTable {
        &BUILTIN
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    /// Inclusive bounds of the scaled score domain.
    pub fn score_range(&self) -> (f64, f64) {
        (
            self.bands.first().map(|b| b.scaled.min).unwrap_or(0) as f64,
            self.bands.last().map(|b| b.scaled.max).unwrap_or(0) as f64,
        )
    }

    /// Inclusive bounds of the raw difficulty domain.
    pub fn difficulty_range(&self) -> (u32, u32) {
        (
            self.bands.first().map(|b| b.raw.min).unwrap_or(0),
            self.bands.last().map(|b| b.raw.max).unwrap_or(0),
        )
    }

    /// Sum of per-band weights, where a band's weight is the width of its
    /// raw range. Used as the normalizer when aggregating survived
    /// difficulty into an ability score.
    pub fn total_difficulty_score(&self) -> f64 {
        self.bands.iter().map(|b| b.raw.width() as f64).sum()
    }

    /// The band owning a raw difficulty value, or `None` if the value falls
    /// outside the table. Out-of-table difficulties indicate corrupt corpus
    /// data and are never silently clamped.
    pub fn band_for_difficulty(&self, raw: u32) -> Option<&Band> {
        self.bands.iter().find(|b| b.raw.contains(raw))
    }

    /// Position of the band owning a raw difficulty value.
    pub fn band_index_for_difficulty(&self, raw: u32) -> Option<usize> {
        self.bands.iter().position(|b| b.raw.contains(raw))
    }

    /// The band owning a scaled score. Scores are continuous, so a value
    /// between two bands' integer endpoints (say 30.5 between `16..=30` and
    /// `31..=50`) belongs to the higher band: the first band whose scaled
    /// maximum is at or above the value.
    pub fn band_for_score(&self, score: f64) -> Option<&Band> {
        self.band_index_for_score(score).map(|i| &self.bands[i])
    }

    /// Position of the band owning a scaled score.
    pub fn band_index_for_score(&self, score: f64) -> Option<usize> {
        let (min, max) = self.score_range();
        if !(min..=max).contains(&score) {
            return None;
        }
        self.bands.iter().position(|b| b.scaled.max as f64 >= score)
    }

    /// Clamp a score into the scaled domain. The tolerant counterpart of
    /// [`Self::band_for_score`], for boundaries that must never fail.
    pub fn clamp_score(&self, score: f64) -> f64 {
        let (min, max) = self.score_range();
        score.clamp(min, max)
    }

    /// Map a scaled score to its raw-difficulty counterpart by linear
    /// interpolation inside the containing band.
    pub fn score_to_difficulty(&self, score: f64) -> Option<u32> {
        let band = self.band_for_score(score)?;
        let scaled_width = (band.scaled.max - band.scaled.min) as f64;
        let position = if scaled_width == 0.0 {
            0.0
        } else {
            ((score - band.scaled.min as f64) / scaled_width).clamp(0.0, 1.0)
        };
        let raw_width = (band.raw.max - band.raw.min) as f64;
        Some(band.raw.min + (position * raw_width).round() as u32)
    }

    /// Map a raw difficulty to its scaled counterpart by linear
    /// interpolation inside the containing band.
    pub fn difficulty_to_score(&self, raw: u32) -> Option<f64> {
        let band = self.band_for_difficulty(raw)?;
        let raw_width = (band.raw.max - band.raw.min) as f64;
        let position = if raw_width == 0.0 {
            0.0
        } else {
            (raw - band.raw.min) as f64 / raw_width
        };
        let scaled_width = (band.scaled.max - band.scaled.min) as f64;
        Some(band.scaled.min as f64 + position * scaled_width)
    }
}

impl TryFrom<Vec<Band>> for BandTable {
    type Error = BandTableError;

    fn try_from(bands: Vec<Band>) -> Result<Self, Self::Error> {
        Self::new(bands)
    }
}

impl From<BandTable> for Vec<Band> {
    fn from(table: BandTable) -> Self {
        table.bands
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn band(label: &str, raw: (u32, u32), scaled: (u32, u32)) -> Band {
        Band {
            label: label.to_string(),
            raw: Span {
                min: raw.0,
                max: raw.1,
            },
            scaled: Span {
                min: scaled.0,
                max: scaled.1,
            },
        }
    }

    #[test]
    fn builtin_table_is_valid() {
        let table = BandTable::builtin();
        assert_eq!(table.bands().len(), 6);
        assert_eq!(table.score_range(), (1.0, 100.0));
        assert_eq!(table.difficulty_range(), (1, 3000));
        assert_eq!(table.total_difficulty_score(), 3000.0);
    }

    #[test]
    fn every_difficulty_has_exactly_one_band() {
        let table = BandTable::builtin();
        let (min, max) = table.difficulty_range();
        for raw in min..=max {
            let owners = table
                .bands()
                .iter()
                .filter(|b| b.raw.contains(raw))
                .count();
            assert_eq!(owners, 1, "difficulty {raw} owned by {owners} bands");
        }
    }

    #[test]
    fn every_score_has_exactly_one_band() {
        let table = BandTable::builtin();
        // Probe on a fine grid, including the cracks between integer
        // endpoints of adjacent bands.
        let mut score = 1.0;
        while score <= 100.0 {
            let band = table.band_for_score(score);
            assert!(band.is_some(), "score {score} has no band");
            score += 0.25;
        }
        assert!(table.band_for_score(0.5).is_none());
        assert!(table.band_for_score(100.1).is_none());
    }

    #[test]
    fn score_between_band_endpoints_goes_to_higher_band() {
        let table = BandTable::builtin();
        assert_eq!(table.band_for_score(30.0).unwrap().label, "a2");
        assert_eq!(table.band_for_score(30.5).unwrap().label, "b1");
        assert_eq!(table.band_for_score(31.0).unwrap().label, "b1");
    }

    #[test]
    fn interpolation_maps_band_edges_to_band_edges() {
        let table = BandTable::builtin();
        assert_eq!(table.score_to_difficulty(1.0), Some(1));
        assert_eq!(table.score_to_difficulty(100.0), Some(3000));
        assert_eq!(table.difficulty_to_score(1), Some(1.0));
        assert_eq!(table.difficulty_to_score(3000), Some(100.0));
        // Midpoint of b1's scaled range lands near the midpoint of its raw
        // range.
        let mid = table.score_to_difficulty(40.5).unwrap();
        assert!((890..=910).contains(&mid), "got {mid}");
    }

    #[test]
    fn rejects_empty_table() {
        assert!(matches!(
            BandTable::new(vec![]),
            Err(BandTableError::Empty)
        ));
    }

    #[test]
    fn rejects_raw_gap() {
        let result = BandTable::new(vec![
            band("low", (1, 100), (1, 50)),
            band("high", (102, 200), (51, 100)),
        ]);
        assert!(matches!(result, Err(BandTableError::Malformed { index: 1, .. })));
    }

    #[test]
    fn rejects_scaled_overlap() {
        let result = BandTable::new(vec![
            band("low", (1, 100), (1, 50)),
            band("high", (101, 200), (50, 100)),
        ]);
        assert!(matches!(result, Err(BandTableError::Malformed { index: 1, .. })));
    }

    #[test]
    fn rejects_inverted_range() {
        let result = BandTable::new(vec![band("bad", (100, 1), (1, 50))]);
        assert!(matches!(result, Err(BandTableError::Malformed { index: 0, .. })));
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(
            BandTable::from_json("not json"),
            Err(BandTableError::Parse(_))
        ));
    }

    #[test]
    fn out_of_table_difficulty_is_not_clamped() {
        let table = BandTable::builtin();
        assert!(table.band_for_difficulty(0).is_none());
        assert!(table.band_for_difficulty(3001).is_none());
    }
}
