//! Building a study session: weak-word review first, then new words from
//! the learner's ability neighborhood.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use difficulty_bands::{BandTable, DEFAULT_SESSION_SIZE, NEIGHBOR_WINDOW, REVIEW_WORD_TARGET};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::{ConfidenceObservation, WordEntry, WordId, mastery};

/// Which pool a plan entry came from. Kept on every entry so callers can
/// recover the review/new partition after the fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanOrigin {
    Review,
    New,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanEntry {
    pub word_id: WordId,
    pub origin: PlanOrigin,
}

/// An ordered session plan: review entries first, then new entries. A
/// transient computation result; the resolver decides whether to persist
/// the session it describes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPlan {
    pub entries: Vec<PlanEntry>,
    pub session_size: usize,
}

impl SessionPlan {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn review_ids(&self) -> Vec<WordId> {
        self.ids_with_origin(PlanOrigin::Review)
    }

    pub fn new_ids(&self) -> Vec<WordId> {
        self.ids_with_origin(PlanOrigin::New)
    }

    fn ids_with_origin(&self, origin: PlanOrigin) -> Vec<WordId> {
        self.entries
            .iter()
            .filter(|e| e.origin == origin)
            .map(|e| e.word_id)
            .collect()
    }
}

/// A session-start request after boundary validation. Out-of-range or
/// missing values are normalized inside [`build_session`] rather than
/// rejected; an active learner always gets a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRequest {
    pub user_score: f64,
    pub review_ids: Option<Vec<WordId>>,
    pub session_size: Option<usize>,
}

/// Build a session plan for a learner.
///
/// Up to [`REVIEW_WORD_TARGET`] slots go to the weakest words in the review
/// pool (weakest recorded mastery first, ties to the oldest row), the rest
/// to unseen words sampled from a [`NEIGHBOR_WINDOW`]-wide raw-difficulty
/// window centered on the learner's ability. The window widens
/// symmetrically while it holds too few candidates; once the whole corpus
/// is in view a short session is returned rather than an error.
pub fn build_session(
    bands: &BandTable,
    corpus: &[WordEntry],
    observations: &[ConfidenceObservation],
    request: &SessionRequest,
) -> SessionPlan {
    let session_size = match request.session_size {
        Some(size) if size > 0 => size,
        Some(size) => {
            log::warn!("ignoring non-positive session size {size}, using default");
            DEFAULT_SESSION_SIZE
        }
        None => DEFAULT_SESSION_SIZE,
    };

    let score = bands.clamp_score(request.user_score);
    if score != request.user_score {
        log::warn!(
            "clamped out-of-range user score {} to {score}",
            request.user_score
        );
    }

    let active = mastery::latest_per_word(observations);

    // Review slots: weakest mastery first. A pool id with no recorded row
    // counts as fully forgotten.
    let mut review_pool: Vec<WordId> = request.review_ids.clone().unwrap_or_default();
    let mut pool_seen = BTreeSet::new();
    review_pool.retain(|id| pool_seen.insert(*id));
    review_pool.sort_by_key(|id| match active.get(id) {
        Some(obs) => (
            OrderedFloat(obs.confidence.mastery_weight()),
            obs.last_updated,
            *id,
        ),
        None => (OrderedFloat(0.0), DateTime::<Utc>::UNIX_EPOCH, *id),
    });

    let review_count = REVIEW_WORD_TARGET
        .min(session_size)
        .min(review_pool.len());
    review_pool.truncate(review_count);

    let mut entries: Vec<PlanEntry> = review_pool
        .iter()
        .map(|&word_id| PlanEntry {
            word_id,
            origin: PlanOrigin::Review,
        })
        .collect();

    let new_count = session_size - review_count;
    if new_count > 0 {
        let chosen: BTreeSet<WordId> = review_pool.iter().copied().collect();
        for word in pick_new_words(bands, corpus, &active, &chosen, score, new_count) {
            entries.push(PlanEntry {
                word_id: word.word_id,
                origin: PlanOrigin::New,
            });
        }
    }

    SessionPlan {
        entries,
        session_size,
    }
}

/// Sample `count` unseen words from the difficulty window around `score`,
/// widening symmetrically until satisfied or the corpus is exhausted.
fn pick_new_words(
    bands: &BandTable,
    corpus: &[WordEntry],
    active: &std::collections::BTreeMap<WordId, &ConfidenceObservation>,
    chosen: &BTreeSet<WordId>,
    score: f64,
    count: usize,
) -> Vec<WordEntry> {
    let (diff_min, diff_max) = bands.difficulty_range();
    let center = match bands.score_to_difficulty(score) {
        Some(raw) => raw,
        // Unreachable after clamping, but a session must never fail.
        None => diff_min,
    };

    let eligible: Vec<WordEntry> = corpus
        .iter()
        .filter(|word| {
            if bands.band_for_difficulty(word.raw_difficulty).is_none() {
                log::warn!(
                    "skipping word {:?}: difficulty {} outside every band",
                    word.word_id,
                    word.raw_difficulty
                );
                return false;
            }
            !active.contains_key(&word.word_id) && !chosen.contains(&word.word_id)
        })
        .copied()
        .collect();

    let half_step = NEIGHBOR_WINDOW / 2;
    let mut half_width = half_step;
    let candidates = loop {
        let lo = center.saturating_sub(half_width).max(diff_min);
        let hi = center.saturating_add(half_width).min(diff_max);
        let in_window: Vec<WordEntry> = eligible
            .iter()
            .filter(|word| (lo..=hi).contains(&word.raw_difficulty))
            .copied()
            .collect();
        if in_window.len() >= count || (lo == diff_min && hi == diff_max) {
            break in_window;
        }
        half_width += half_step;
    };

    window_sampler::sample_exact(candidates, count, |word| (word.word_id, center))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Confidence;
    use chrono::TimeZone;

    fn corpus() -> Vec<WordEntry> {
        (1..=300)
            .map(|i| WordEntry {
                word_id: WordId(i),
                raw_difficulty: (i * 10) as u32,
            })
            .collect()
    }

    fn obs(
        word: u64,
        confidence: Confidence,
        difficulty: u32,
        day: u32,
    ) -> ConfidenceObservation {
        ConfidenceObservation {
            word_id: WordId(word),
            confidence,
            raw_difficulty: difficulty,
            last_updated: Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
            auto_marked: false,
        }
    }

    fn request(score: f64) -> SessionRequest {
        SessionRequest {
            user_score: score,
            review_ids: None,
            session_size: None,
        }
    }

    #[test]
    fn default_session_is_all_new_words() {
        let bands = BandTable::builtin();
        let plan = build_session(bands, &corpus(), &[], &request(40.0));

        assert_eq!(plan.len(), DEFAULT_SESSION_SIZE);
        assert_eq!(plan.review_ids().len(), 0);
        assert_eq!(plan.new_ids().len(), DEFAULT_SESSION_SIZE);
    }

    #[test]
    fn session_mixes_three_weakest_reviews_with_new_words() {
        let bands = BandTable::builtin();
        let observations = vec![
            obs(1, Confidence::Forget, 10, 4),
            obs(2, Confidence::Forget, 20, 2),
            obs(3, Confidence::Iffy, 30, 1),
            obs(4, Confidence::Iffy, 40, 3),
        ];
        let req = SessionRequest {
            user_score: 40.0,
            review_ids: Some(vec![WordId(1), WordId(2), WordId(3), WordId(4)]),
            session_size: Some(5),
        };

        let plan = build_session(bands, &corpus(), &observations, &req);

        // The two forgotten words, then the older of the two iffy ones.
        assert_eq!(
            plan.review_ids(),
            vec![WordId(2), WordId(1), WordId(3)]
        );
        assert_eq!(plan.new_ids().len(), 2);
        assert_eq!(plan.len(), 5);
    }

    #[test]
    fn new_words_come_from_the_ability_neighborhood() {
        let bands = BandTable::builtin();
        let plan = build_session(bands, &corpus(), &[], &request(40.0));

        // Score 40 sits in b1; its interpolated raw point is 885, so an
        // unwidened window spans 660..=1110.
        let center = bands.score_to_difficulty(40.0).unwrap();
        for id in plan.new_ids() {
            let word = corpus().into_iter().find(|w| w.word_id == id).unwrap();
            assert!(
                word.raw_difficulty.abs_diff(center) <= NEIGHBOR_WINDOW / 2,
                "word {:?} at difficulty {} outside the window around {center}",
                id,
                word.raw_difficulty
            );
        }
    }

    #[test]
    fn window_widens_when_the_neighborhood_is_sparse() {
        let bands = BandTable::builtin();
        // Nothing near the b1 raw point; plenty far away.
        let sparse: Vec<WordEntry> = (1..=10)
            .map(|i| WordEntry {
                word_id: WordId(i),
                raw_difficulty: 2500 + (i as u32) * 10,
            })
            .collect();

        let plan = build_session(bands, &sparse, &[], &request(40.0));
        assert_eq!(plan.len(), DEFAULT_SESSION_SIZE);
    }

    #[test]
    fn exhausted_corpus_yields_a_short_session() {
        let bands = BandTable::builtin();
        let tiny = vec![
            WordEntry {
                word_id: WordId(1),
                raw_difficulty: 500,
            },
            WordEntry {
                word_id: WordId(2),
                raw_difficulty: 1500,
            },
        ];

        let plan = build_session(bands, &tiny, &[], &request(40.0));
        assert_eq!(plan.len(), 2);
    }

    #[test]
    fn plan_never_repeats_a_word() {
        let bands = BandTable::builtin();
        let observations: Vec<_> = (1..=10)
            .map(|i| obs(i, Confidence::Forget, (i * 10) as u32, 1))
            .collect();
        let req = SessionRequest {
            user_score: 10.0,
            review_ids: Some((1..=10).map(WordId).collect()),
            session_size: Some(8),
        };

        let plan = build_session(bands, &corpus(), &observations, &req);

        let mut ids: Vec<WordId> = plan.entries.iter().map(|e| e.word_id).collect();
        let before = ids.len();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), before);
    }

    #[test]
    fn seen_words_are_not_offered_as_new() {
        let bands = BandTable::builtin();
        let observations: Vec<_> = (80..=95)
            .map(|i| obs(i, Confidence::Perfect, (i * 10) as u32, 1))
            .collect();

        let plan = build_session(bands, &corpus(), &observations, &request(40.0));
        for id in plan.new_ids() {
            assert!(!(80..=95).contains(&id.0), "seen word {id:?} offered as new");
        }
    }

    #[test]
    fn out_of_range_score_is_clamped_not_rejected() {
        let bands = BandTable::builtin();
        let plan = build_session(bands, &corpus(), &[], &request(5000.0));
        assert_eq!(plan.len(), DEFAULT_SESSION_SIZE);
    }

    #[test]
    fn non_positive_session_size_falls_back_to_default() {
        let bands = BandTable::builtin();
        let req = SessionRequest {
            user_score: 40.0,
            review_ids: None,
            session_size: Some(0),
        };
        let plan = build_session(bands, &corpus(), &[], &req);
        assert_eq!(plan.session_size, DEFAULT_SESSION_SIZE);
    }

    #[test]
    fn review_ids_beyond_session_size_are_dropped() {
        let bands = BandTable::builtin();
        let observations: Vec<_> = (1..=6)
            .map(|i| obs(i, Confidence::Forget, (i * 10) as u32, 1))
            .collect();
        let req = SessionRequest {
            user_score: 40.0,
            review_ids: Some((1..=6).map(WordId).collect()),
            session_size: Some(2),
        };

        let plan = build_session(bands, &corpus(), &observations, &req);
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.review_ids().len(), 2);
        assert_eq!(plan.new_ids().len(), 0);
    }

    #[test]
    fn building_twice_is_deterministic() {
        let bands = BandTable::builtin();
        let observations = vec![obs(1, Confidence::Forget, 10, 1)];
        let req = SessionRequest {
            user_score: 40.0,
            review_ids: Some(vec![WordId(1)]),
            session_size: Some(5),
        };

        let first = build_session(bands, &corpus(), &observations, &req);
        let second = build_session(bands, &corpus(), &observations, &req);
        assert_eq!(first, second);
    }
}
