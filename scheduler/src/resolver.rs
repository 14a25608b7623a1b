//! Orchestration boundary: resume-or-create for sessions, score
//! recalculation, and confidence reset.
//!
//! The only decision owned here is the single resume-vs-create branch;
//! every numeric choice is delegated to the pure components. The store
//! trait's conditional insert is what makes concurrent session starts for
//! one learner safe: two racing callers both reach the store, but only one
//! insert lands and both observe the same stored plan.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use difficulty_bands::BandTable;
use serde::{Deserialize, Serialize};

use crate::session::{SessionPlan, SessionRequest, build_session};
use crate::{ConfidenceObservation, LearnerId, WordEntry, mastery};

/// Whether a resolved session already existed or was built by this call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionSource {
    Resumed,
    Created,
}

/// A session as the store holds it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSession {
    pub plan: SessionPlan,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedSession {
    pub source: SessionSource,
    pub plan: SessionPlan,
}

/// Persistence seam for in-progress sessions. Implementations must make
/// [`SessionStore::start_session`] atomic per learner; that conditional
/// insert is the single-writer guarantee.
pub trait SessionStore {
    fn active_session(&self, learner: LearnerId) -> Option<StoredSession>;

    /// Store `session` for `learner` unless one is already active. Returns
    /// the session that is active after the call, and whether this call is
    /// the one that inserted it.
    fn start_session(&self, learner: LearnerId, session: StoredSession) -> (StoredSession, bool);

    fn finish_session(&self, learner: LearnerId);
}

/// In-memory store, one active session per learner behind a mutex.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<LearnerId, StoredSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn active_session(&self, learner: LearnerId) -> Option<StoredSession> {
        self.sessions
            .lock()
            .expect("session store mutex poisoned")
            .get(&learner)
            .cloned()
    }

    fn start_session(&self, learner: LearnerId, session: StoredSession) -> (StoredSession, bool) {
        let mut sessions = self.sessions.lock().expect("session store mutex poisoned");
        match sessions.entry(learner) {
            Entry::Occupied(existing) => (existing.get().clone(), false),
            Entry::Vacant(slot) => (slot.insert(session).clone(), true),
        }
    }

    fn finish_session(&self, learner: LearnerId) {
        self.sessions
            .lock()
            .expect("session store mutex poisoned")
            .remove(&learner);
    }
}

/// Resume the learner's unfinished session if one exists, otherwise build
/// and store a new one. Idempotent: repeated calls during one unfinished
/// session return the stored plan unchanged, never a reshuffled one.
pub fn resolve_session<S: SessionStore>(
    store: &S,
    learner: LearnerId,
    bands: &BandTable,
    corpus: &[WordEntry],
    observations: &[ConfidenceObservation],
    request: &SessionRequest,
    now: DateTime<Utc>,
) -> ResolvedSession {
    if let Some(existing) = store.active_session(learner) {
        log::debug!("resuming unfinished session for learner {learner:?}");
        return ResolvedSession {
            source: SessionSource::Resumed,
            plan: existing.plan,
        };
    }

    let plan = build_session(bands, corpus, observations, request);
    let (stored, inserted) = store.start_session(
        learner,
        StoredSession {
            plan,
            started_at: now,
        },
    );

    ResolvedSession {
        source: if inserted {
            SessionSource::Created
        } else {
            // Lost the race to a concurrent start; their session wins.
            SessionSource::Resumed
        },
        plan: stored.plan,
    }
}

/// A learner's persisted ability score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LearnerProfile {
    pub learner_id: LearnerId,
    pub score: f64,
}

/// Reported to the caller after every recalculation, so score drift stays
/// diagnosable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreChange {
    pub before: f64,
    pub after: f64,
    pub diff: f64,
}

/// Recompute the learner's ability score from their confidence rows and
/// persist it on the profile.
pub fn recalculate(
    bands: &BandTable,
    profile: &mut LearnerProfile,
    observations: &[ConfidenceObservation],
) -> ScoreChange {
    let before = profile.score;
    let after = mastery::calculate_user_score(bands, observations);
    profile.score = after;
    log::debug!(
        "recalculated score for learner {:?}: {before} -> {after}",
        profile.learner_id
    );
    ScoreChange {
        before,
        after,
        diff: after - before,
    }
}

/// Confidence reset: discard auto-marked rows, keep learner-confirmed
/// ones, and recalculate the score from what remains. Returns the
/// surviving rows and the score change.
pub fn reset_confidence(
    bands: &BandTable,
    profile: &mut LearnerProfile,
    observations: Vec<ConfidenceObservation>,
) -> (Vec<ConfidenceObservation>, ScoreChange) {
    let kept = mastery::retain_confirmed(observations);
    let change = recalculate(bands, profile, &kept);
    (kept, change)
}
