//! Next-up queue for a (group, lift, round).
//!
//! The order is recomputed on every query from declared weights alone; it
//! never depends on previous outcomes, so an athlete who just failed can
//! legally reappear at the top of the same round.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use storage::models::AttemptStatus;
use storage::repository::{AttemptRepository, RoundCandidate};
use storage::Database;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct QueueEntry {
    pub registration_id: i64,
    pub declared_kg: f64,
    pub bodyweight: f64,
    pub start_ord: i64,
}

/// Sort the round's remaining candidates into platform order.
///
/// Lightest declaration first (the bar only goes up), heavier athlete
/// first on ties (their points handicap buys first choice at a shared
/// weight), nomination order as the final tiebreak. Athletes without a
/// declaration for the round, or with a zero declaration, are deferred;
/// athletes whose round attempt is already judged are out.
pub fn order_round(candidates: Vec<RoundCandidate>) -> Vec<QueueEntry> {
    let mut queue: Vec<QueueEntry> = candidates
        .into_iter()
        .filter_map(|c| {
            let declared = c.declared?;
            if declared <= 0.0 {
                return None;
            }
            if matches!(c.status, Some(s) if s != AttemptStatus::Pending) {
                return None;
            }
            Some(QueueEntry {
                registration_id: c.registration_id,
                declared_kg: declared,
                bodyweight: c.bodyweight.unwrap_or(0.0),
                start_ord: c.start_ord,
            })
        })
        .collect();

    queue.sort_by(|a, b| {
        a.declared_kg
            .total_cmp(&b.declared_kg)
            .then(b.bodyweight.total_cmp(&a.bodyweight))
            .then(a.start_ord.cmp(&b.start_ord))
    });

    queue
}

/// Queue of registrations still to attempt in this round; the first
/// element is on deck.
pub async fn queue_for(
    db: &Database,
    group_id: i64,
    lift_id: i64,
    round: i16,
) -> Result<Vec<QueueEntry>> {
    let candidates = AttemptRepository::new(db.pool())
        .round_candidates(group_id, lift_id, round)
        .await?;

    Ok(order_round(candidates))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(
        registration_id: i64,
        bodyweight: f64,
        start_ord: i64,
        declared: Option<f64>,
        status: Option<AttemptStatus>,
    ) -> RoundCandidate {
        RoundCandidate {
            registration_id,
            bodyweight: Some(bodyweight),
            start_ord,
            declared,
            status,
        }
    }

    fn ids(queue: &[QueueEntry]) -> Vec<i64> {
        queue.iter().map(|e| e.registration_id).collect()
    }

    const MARCO: i64 = 1;
    const IVAN: i64 = 2;
    const FABIO: i64 = 3;

    #[test]
    fn round_one_sorts_by_opener() {
        let queue = order_round(vec![
            candidate(FABIO, 80.0, 3, Some(95.0), Some(AttemptStatus::Pending)),
            candidate(MARCO, 70.0, 1, Some(85.0), Some(AttemptStatus::Pending)),
            candidate(IVAN, 75.0, 2, Some(90.0), Some(AttemptStatus::Pending)),
        ]);
        assert_eq!(ids(&queue), vec![MARCO, IVAN, FABIO]);
    }

    #[test]
    fn round_two_reorders_on_declarations() {
        // Marco 92, Ivan 100, Fabio 95.
        let queue = order_round(vec![
            candidate(MARCO, 70.0, 1, Some(92.0), Some(AttemptStatus::Pending)),
            candidate(IVAN, 75.0, 2, Some(100.0), Some(AttemptStatus::Pending)),
            candidate(FABIO, 80.0, 3, Some(95.0), Some(AttemptStatus::Pending)),
        ]);
        assert_eq!(ids(&queue), vec![MARCO, FABIO, IVAN]);
    }

    #[test]
    fn tied_weight_calls_heavier_athlete_first() {
        // Round 3: Marco and Fabio both at 97; Fabio is heavier.
        let queue = order_round(vec![
            candidate(MARCO, 70.0, 1, Some(97.0), Some(AttemptStatus::Pending)),
            candidate(FABIO, 80.0, 3, Some(97.0), Some(AttemptStatus::Pending)),
            candidate(IVAN, 75.0, 2, Some(100.0), Some(AttemptStatus::Pending)),
        ]);
        assert_eq!(ids(&queue), vec![FABIO, MARCO, IVAN]);
    }

    #[test]
    fn full_tie_falls_back_to_start_ord() {
        let queue = order_round(vec![
            candidate(2, 75.0, 5, Some(90.0), None),
            candidate(1, 75.0, 2, Some(90.0), None),
        ]);
        assert_eq!(ids(&queue), vec![1, 2]);
    }

    #[test]
    fn judged_and_deferred_athletes_are_excluded() {
        let queue = order_round(vec![
            candidate(1, 70.0, 1, Some(85.0), Some(AttemptStatus::Valid)),
            candidate(2, 75.0, 2, Some(90.0), Some(AttemptStatus::Invalid)),
            candidate(3, 80.0, 3, None, None),
            candidate(4, 81.0, 4, Some(0.0), Some(AttemptStatus::Pending)),
            candidate(5, 82.0, 5, Some(92.5), Some(AttemptStatus::Pending)),
        ]);
        assert_eq!(ids(&queue), vec![5]);
    }

    #[test]
    fn each_registration_appears_at_most_once() {
        let queue = order_round(vec![
            candidate(1, 70.0, 1, Some(85.0), None),
            candidate(2, 75.0, 2, Some(85.0), None),
            candidate(3, 80.0, 3, Some(100.0), None),
        ]);
        let mut seen = std::collections::HashSet::new();
        assert!(queue.iter().all(|e| seen.insert(e.registration_id)));
    }
}
