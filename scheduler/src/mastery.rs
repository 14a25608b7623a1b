//! Aggregating a learner's confidence history into an ability score.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use chrono::{DateTime, Utc};
use difficulty_bands::{BandTable, DEFAULT_USER_SCORE};
use ordered_float::OrderedFloat;

use crate::{ConfidenceObservation, WordId};

/// Reduce a learner's confidence rows to a single ability score on the
/// table's scaled domain.
///
/// Each word contributes its mastery weight times its raw difficulty, so
/// surviving a hard word moves the score more than surviving an easy one.
/// The accumulated "difficulty survived" is normalized by the table's total
/// difficulty weight and mapped back through the band interpolation, which
/// keeps the result on the same scale calibration produces.
///
/// Pure and order-independent: only the latest row per word counts (ties on
/// `last_updated` resolved by higher mastery, then by user-confirmed over
/// auto-marked), and reordering the input never changes the result. No
/// observations at all yields the signup default, clamped into the table's
/// score range.
pub fn calculate_user_score(bands: &BandTable, observations: &[ConfidenceObservation]) -> f64 {
    let active = latest_per_word(observations);
    if active.is_empty() {
        return bands.clamp_score(DEFAULT_USER_SCORE);
    }

    let survived: f64 = active
        .values()
        .map(|obs| obs.confidence.mastery_weight() * obs.raw_difficulty as f64)
        .sum();
    let ratio = (survived / bands.total_difficulty_score()).clamp(0.0, 1.0);

    let (diff_min, diff_max) = bands.difficulty_range();
    let raw_point = diff_min + (ratio * (diff_max - diff_min) as f64).round() as u32;

    match bands.difficulty_to_score(raw_point) {
        Some(score) => bands.clamp_score(score),
        // Unreachable with a validated table; fall back rather than panic.
        None => bands.clamp_score(DEFAULT_USER_SCORE),
    }
}

/// Drop system-inferred rows, keeping only the ones the learner confirmed
/// themselves. This is the confidence-reset operation: auto-marked rows are
/// guesses and a reset discards them wholesale.
pub fn retain_confirmed(
    observations: Vec<ConfidenceObservation>,
) -> Vec<ConfidenceObservation> {
    observations
        .into_iter()
        .filter(|obs| !obs.auto_marked)
        .collect()
}

/// Collapse a row list to the active row per word: latest `last_updated`
/// wins, with a deterministic tie-break so the outcome cannot depend on
/// input order.
pub(crate) fn latest_per_word(
    observations: &[ConfidenceObservation],
) -> BTreeMap<WordId, &ConfidenceObservation> {
    fn rank(obs: &ConfidenceObservation) -> (DateTime<Utc>, OrderedFloat<f64>, bool) {
        (
            obs.last_updated,
            OrderedFloat(obs.confidence.mastery_weight()),
            !obs.auto_marked,
        )
    }

    let mut active: BTreeMap<WordId, &ConfidenceObservation> = BTreeMap::new();
    for obs in observations {
        match active.entry(obs.word_id) {
            Entry::Vacant(slot) => {
                slot.insert(obs);
            }
            Entry::Occupied(mut slot) => {
                if rank(obs) > rank(slot.get()) {
                    slot.insert(obs);
                }
            }
        }
    }
    active
}
