//! Rotation suggestions
//!
//! Candidates are the active publishers available for the slot's
//! (date, label). Each gets a fairness score: the number of slots in the
//! trailing window before the slot's date whose assignment set includes
//! them. Candidates are ordered by ascending score with ties broken by a
//! shuffle, then placed greedily until capacity runs out:
//! - a paired candidate whose partner is also a candidate and unplaced is
//!   placed together with the partner when two slots remain
//! - otherwise a paired candidate is placed alone, with a note
//! - individuals take one slot
//! - minors are never suggested; they need an explicit guardian
//!
//! Suggestions are advisory and never persisted. The committer re-validates
//! whatever the client eventually submits.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use chrono::NaiveDate;
use poc_common::{AssignmentEntry, Category, Publisher};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use super::{with_timeout, RosterSettings};
use crate::db::{availability, shifts};
use crate::error::{Result, RosterError};

const SPLIT_COUPLE_NOTE: &str = "Paired publisher suggested individually";

/// A publisher eligible for the slot with their fairness score
#[derive(Debug, Clone)]
pub struct Candidate {
    pub publisher: Publisher,
    /// Slots assigned within the trailing window; lower goes first
    pub recent_assignments: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SuggestedEntry {
    #[serde(flatten)]
    pub entry: AssignmentEntry,
    pub names: String,
    pub slots: u32,
    pub recent_assignments: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Suggestion {
    pub shift_id: Uuid,
    pub date: NaiveDate,
    pub label: String,
    pub capacity: u32,
    pub entries: Vec<SuggestedEntry>,
    pub slots_used: u32,
    pub slots_free: u32,
}

/// Produces suggestions; owns the tie-breaking RNG
pub struct Suggester {
    rng: Mutex<StdRng>,
}

impl Suggester {
    /// A fixed seed makes tie-breaking reproducible across runs
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng: Mutex::new(rng),
        }
    }

    /// Suggest an assignment set for `shift_id`
    pub async fn suggest(
        &self,
        pool: &SqlitePool,
        settings: &RosterSettings,
        shift_id: Uuid,
    ) -> Result<Suggestion> {
        let (slot, candidates) = with_timeout(settings.db_timeout, async {
            let mut conn = pool.acquire().await?;

            let slot = shifts::get_shift(&mut conn, shift_id)
                .await?
                .ok_or_else(|| RosterError::NotFound(format!("Shift {}", shift_id)))?;

            let available =
                availability::available_publishers(&mut conn, slot.date, &slot.label).await?;

            let mut candidates = Vec::with_capacity(available.len());
            for publisher in available.into_iter().filter(|p| p.category != Category::Minor) {
                let recent_assignments = shifts::count_recent_assignments(
                    &mut conn,
                    publisher.id,
                    slot.date,
                    settings.fairness_window_days,
                )
                .await?;
                debug!(publisher_id = %publisher.id, recent_assignments, "Fairness score");
                candidates.push(Candidate {
                    publisher,
                    recent_assignments,
                });
            }

            Ok::<_, RosterError>((slot, candidates))
        })
        .await?;

        let ordered = {
            let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            order_by_fairness(candidates, &mut *rng)
        };

        let entries = plan(&ordered, slot.capacity);
        let slots_used: u32 = entries.iter().map(|e| e.slots).sum();

        debug!(
            shift_id = %shift_id,
            candidates = ordered.len(),
            suggested = entries.len(),
            slots_used,
            "Built suggestion"
        );

        Ok(Suggestion {
            shift_id,
            date: slot.date,
            label: slot.label,
            capacity: slot.capacity,
            entries,
            slots_used,
            slots_free: slot.capacity.saturating_sub(slots_used),
        })
    }
}

/// Ascending fairness score; equal scores end up in random relative order
pub fn order_by_fairness<R: Rng + ?Sized>(
    mut candidates: Vec<Candidate>,
    rng: &mut R,
) -> Vec<Candidate> {
    candidates.shuffle(rng);
    // Stable sort keeps the shuffled order within equal scores
    candidates.sort_by_key(|c| c.recent_assignments);
    candidates
}

/// Greedily fill `capacity` from fairness-ordered candidates
pub fn plan(ordered: &[Candidate], capacity: u32) -> Vec<SuggestedEntry> {
    let by_id: HashMap<Uuid, &Candidate> = ordered.iter().map(|c| (c.publisher.id, c)).collect();
    let mut placed: HashSet<Uuid> = HashSet::new();
    let mut remaining = capacity;
    let mut entries = Vec::new();

    for candidate in ordered {
        if remaining == 0 {
            break;
        }
        let publisher = &candidate.publisher;
        if placed.contains(&publisher.id) {
            continue;
        }

        match publisher.category {
            Category::Minor => continue,
            Category::Paired => {
                let partner = publisher
                    .pair_id
                    .and_then(|id| by_id.get(&id))
                    .filter(|p| {
                        !placed.contains(&p.publisher.id) && publisher.is_paired_with(&p.publisher)
                    });

                match partner {
                    Some(partner) if remaining >= 2 => {
                        entries.push(SuggestedEntry {
                            entry: AssignmentEntry::Couple {
                                publisher_id: publisher.id,
                                partner_id: partner.publisher.id,
                            },
                            names: format!("{} & {}", publisher.name, partner.publisher.name),
                            slots: 2,
                            recent_assignments: candidate.recent_assignments,
                            note: None,
                        });
                        placed.insert(partner.publisher.id);
                        remaining -= 2;
                    }
                    _ => {
                        entries.push(solo(candidate, Some(SPLIT_COUPLE_NOTE)));
                        remaining -= 1;
                    }
                }
            }
            Category::Individual => {
                entries.push(solo(candidate, None));
                remaining -= 1;
            }
        }

        placed.insert(publisher.id);
    }

    entries
}

fn solo(candidate: &Candidate, note: Option<&str>) -> SuggestedEntry {
    SuggestedEntry {
        entry: AssignmentEntry::Solo {
            publisher_id: candidate.publisher.id,
        },
        names: candidate.publisher.name.clone(),
        slots: 1,
        recent_assignments: candidate.recent_assignments,
        note: note.map(str::to_string),
    }
}
