//! Adaptive session scheduling for vocabulary study.
//!
//! Everything in this crate is a pure, synchronous computation over
//! already-fetched data: callers load a learner's confidence rows and the
//! word corpus however they like, hand them in, and get back plans, ids,
//! and scores. The pieces, leaf to root:
//!
//! - [`mastery`] turns a learner's confidence history into a single ability
//!   score on the band table's scaled domain.
//! - [`calibration`] drives the adaptive initial test that estimates a new
//!   learner's ability in a handful of questions.
//! - [`session`] builds a study session mixing spaced-repetition review of
//!   weak words with new words drawn from the learner's ability
//!   neighborhood.
//! - [`resolver`] is the orchestration boundary: resume-or-create for
//!   sessions, score recalculation, and confidence reset.

pub mod calibration;
pub mod mastery;
pub mod resolver;
pub mod session;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a word in the corpus.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct WordId(pub u64);

/// Identifier of a calibration question.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct QuestionId(pub u64);

/// Identifier of a learner, as resolved by the authentication layer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct LearnerId(pub u64);

/// How confident the learner was about a word the last time it came up.
///
/// A closed set on purpose: the mastery mapping must stay exhaustive, so a
/// new level is a compile error everywhere it matters rather than a silent
/// zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    None,
    Forget,
    Iffy,
    Perfect,
}

impl Confidence {
    /// The numeric mastery weight a confidence level contributes when
    /// aggregating an ability score.
    pub fn mastery_weight(self) -> f64 {
        match self {
            Confidence::None => 0.0,
            Confidence::Forget => 0.0,
            Confidence::Iffy => 0.5,
            Confidence::Perfect => 1.0,
        }
    }
}

/// One (learner, word) confidence row. The latest row per word is the
/// active one; `auto_marked` records whether the system inferred it (and a
/// confidence reset may delete it) or the learner confirmed it themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceObservation {
    pub word_id: WordId,
    pub confidence: Confidence,
    pub raw_difficulty: u32,
    pub last_updated: DateTime<Utc>,
    pub auto_marked: bool,
}

/// A corpus word available for session building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordEntry {
    pub word_id: WordId,
    pub raw_difficulty: u32,
}

/// A question available to the initial calibration test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationQuestion {
    pub question_id: QuestionId,
    pub raw_difficulty: u32,
}

/// Domain errors reported by the strict scheduler boundaries. These mean
/// the stored data disagrees with the configured score space, never that a
/// learner asked for something unusual.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchedulerError {
    #[error("raw difficulty {0} falls outside every configured band")]
    DifficultyOutOfDomain(u32),
    #[error("score {0} falls outside the configured score range")]
    ScoreOutOfDomain(f64),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    // The wire shapes here are consumed by the HTTP layer; keep them
    // stable.

    #[test]
    fn confidence_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Confidence::Perfect).unwrap(), "\"perfect\"");
        assert_eq!(
            serde_json::from_str::<Confidence>("\"iffy\"").unwrap(),
            Confidence::Iffy
        );
    }

    #[test]
    fn observation_round_trips_through_json() {
        let obs = ConfidenceObservation {
            word_id: WordId(12),
            confidence: Confidence::Forget,
            raw_difficulty: 840,
            last_updated: Utc.with_ymd_and_hms(2024, 2, 2, 0, 0, 0).unwrap(),
            auto_marked: true,
        };
        let json = serde_json::to_string(&obs).unwrap();
        assert_eq!(serde_json::from_str::<ConfidenceObservation>(&json).unwrap(), obs);
    }

    #[test]
    fn ids_serialize_as_bare_numbers() {
        assert_eq!(serde_json::to_string(&WordId(3)).unwrap(), "3");
        assert_eq!(serde_json::to_string(&QuestionId(4)).unwrap(), "4");
    }

    #[test]
    fn mastery_mapping_matches_the_documented_table() {
        assert_eq!(Confidence::None.mastery_weight(), 0.0);
        assert_eq!(Confidence::Forget.mastery_weight(), 0.0);
        assert_eq!(Confidence::Iffy.mastery_weight(), 0.5);
        assert_eq!(Confidence::Perfect.mastery_weight(), 1.0);
    }
}
