//! The adaptive initial test that estimates a new learner's ability.
//!
//! Works like a simplified item-response calibration: each question is
//! drawn from the difficulty band containing the current ability estimate,
//! the estimate moves up or down with each answer, and the final score is
//! aggregated from the full answer log.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use difficulty_bands::{BandTable, DEFAULT_USER_SCORE};
use serde::{Deserialize, Serialize};

use crate::{
    CalibrationQuestion, Confidence, ConfidenceObservation, QuestionId, SchedulerError, WordId,
    mastery,
};

/// What the selector has to offer: the next question to ask, or the signal
/// that every question has been used and the test is over. Completion is a
/// success-shaped outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CalibrationOutcome {
    Question(QuestionId),
    Complete,
}

/// Pick the next calibration question for a learner whose ability is
/// currently estimated at `estimated_score`.
///
/// The target band is the one containing the estimate; if every question
/// there has been answered, the search widens to adjacent bands, nearest
/// first, preferring at equal distance the band reachable with the smaller
/// score adjustment. Within a band the question closest in difficulty to
/// the estimate's interpolated raw point wins, ties to the lower id, so
/// repeated calls are fully deterministic.
///
/// Strict boundary: an estimate outside the score range or a corpus entry
/// with out-of-band difficulty is a domain error. Terminates after at most
/// one pass over the bands and never re-offers an answered id.
pub fn select_initial_test_question(
    bands: &BandTable,
    estimated_score: f64,
    answered: &BTreeSet<QuestionId>,
    corpus: &[CalibrationQuestion],
) -> Result<CalibrationOutcome, SchedulerError> {
    let target_idx = bands
        .band_index_for_score(estimated_score)
        .ok_or(SchedulerError::ScoreOutOfDomain(estimated_score))?;

    for question in corpus {
        if bands.band_for_difficulty(question.raw_difficulty).is_none() {
            return Err(SchedulerError::DifficultyOutOfDomain(question.raw_difficulty));
        }
    }

    let raw_target = bands
        .score_to_difficulty(estimated_score)
        .ok_or(SchedulerError::ScoreOutOfDomain(estimated_score))?;

    let all_bands = bands.bands();
    for distance in 0..all_bands.len() {
        // Candidate bands at this distance from the target, ordered by how
        // far the estimate would have to move to reach them.
        let mut ring: Vec<usize> = Vec::with_capacity(2);
        if let Some(below) = target_idx.checked_sub(distance) {
            ring.push(below);
        }
        let above = target_idx + distance;
        if distance > 0 && above < all_bands.len() {
            ring.push(above);
        }
        ring.sort_by(|a, b| {
            score_adjustment(bands, estimated_score, *a)
                .total_cmp(&score_adjustment(bands, estimated_score, *b))
                .then(a.cmp(b))
        });

        for band_idx in ring {
            let band = &all_bands[band_idx];
            let best = corpus
                .iter()
                .filter(|q| {
                    band.raw.contains(q.raw_difficulty) && !answered.contains(&q.question_id)
                })
                .min_by_key(|q| (q.raw_difficulty.abs_diff(raw_target), q.question_id));
            if let Some(question) = best {
                return Ok(CalibrationOutcome::Question(question.question_id));
            }
        }
    }

    Ok(CalibrationOutcome::Complete)
}

/// How far a score sits from a band's scaled range; zero when inside it.
fn score_adjustment(bands: &BandTable, score: f64, band_idx: usize) -> f64 {
    let band = &bands.bands()[band_idx];
    let min = band.scaled.min as f64;
    let max = band.scaled.max as f64;
    if score < min {
        min - score
    } else if score > max {
        score - max
    } else {
        0.0
    }
}

/// One graded answer in the initial test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationAnswer {
    pub question_id: QuestionId,
    pub raw_difficulty: u32,
    pub correct: bool,
}

/// In-progress calibration for one learner. Created on the first
/// calibration request, mutated after every answer, and consumed by
/// [`CalibrationState::finalize`] when the test ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationState {
    estimated_score: f64,
    answered_question_ids: BTreeSet<QuestionId>,
    answers: Vec<CalibrationAnswer>,
}

impl CalibrationState {
    pub fn new(bands: &BandTable) -> Self {
        Self {
            estimated_score: bands.clamp_score(DEFAULT_USER_SCORE),
            answered_question_ids: BTreeSet::new(),
            answers: Vec::new(),
        }
    }

    pub fn estimated_score(&self) -> f64 {
        self.estimated_score
    }

    pub fn answered_question_ids(&self) -> &BTreeSet<QuestionId> {
        &self.answered_question_ids
    }

    pub fn answers(&self) -> &[CalibrationAnswer] {
        &self.answers
    }

    /// The next question to ask, given the current estimate and everything
    /// already answered.
    pub fn next_question(
        &self,
        bands: &BandTable,
        corpus: &[CalibrationQuestion],
    ) -> Result<CalibrationOutcome, SchedulerError> {
        select_initial_test_question(
            bands,
            self.estimated_score,
            &self.answered_question_ids,
            corpus,
        )
    }

    /// Record a graded answer and nudge the estimate: half a band-width up
    /// when correct, half a band-width down when not, clamped to the score
    /// range. Grading the same question twice is ignored.
    pub fn record_answer(
        &mut self,
        bands: &BandTable,
        question: &CalibrationQuestion,
        correct: bool,
    ) {
        if !self.answered_question_ids.insert(question.question_id) {
            return;
        }
        self.answers.push(CalibrationAnswer {
            question_id: question.question_id,
            raw_difficulty: question.raw_difficulty,
            correct,
        });

        let step = bands
            .band_for_score(self.estimated_score)
            .map(|band| band.scaled.width() as f64 / 2.0)
            .unwrap_or(0.0);
        let delta = if correct { step } else { -step };
        self.estimated_score = bands.clamp_score(self.estimated_score + delta);
    }

    /// End the test: score the answer log as if each question were a word
    /// the learner either knew perfectly or forgot, via the mastery
    /// aggregator, so the result lands on the same scale as every later
    /// recalculation.
    pub fn finalize(self, bands: &BandTable) -> InitialTestResult {
        let observations: Vec<ConfidenceObservation> = self
            .answers
            .iter()
            .map(|answer| ConfidenceObservation {
                word_id: WordId(answer.question_id.0),
                confidence: if answer.correct {
                    Confidence::Perfect
                } else {
                    Confidence::Forget
                },
                raw_difficulty: answer.raw_difficulty,
                last_updated: DateTime::<Utc>::UNIX_EPOCH,
                auto_marked: true,
            })
            .collect();

        InitialTestResult {
            final_score: mastery::calculate_user_score(bands, &observations),
            questions_answered: observations.len(),
        }
    }
}

/// Outcome of a finished initial test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InitialTestResult {
    pub final_score: f64,
    pub questions_answered: usize,
}
