//! In-memory accumulator of judge votes, one ballot per attempt.
//!
//! Votes are never persisted: a process restart loses in-flight ballots
//! and judges re-submit. Finalized attempts are unaffected because their
//! outcome already lives in the store.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use std::sync::Mutex;
use utoipa::ToSchema;

use storage::models::AttemptStatus;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum JudgeRole {
    Head,
    Left,
    Right,
}

impl FromStr for JudgeRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "HEAD" => Ok(JudgeRole::Head),
            "LEFT" => Ok(JudgeRole::Left),
            "RIGHT" => Ok(JudgeRole::Right),
            other => Err(format!("unknown judge role: {other}")),
        }
    }
}

impl JudgeRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            JudgeRole::Head => "HEAD",
            JudgeRole::Left => "LEFT",
            JudgeRole::Right => "RIGHT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Vote {
    White,
    Red,
}

impl FromStr for Vote {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "WHITE" => Ok(Vote::White),
            "RED" => Ok(Vote::Red),
            other => Err(format!("unknown vote: {other}")),
        }
    }
}

/// Result of registering a vote. `complete` iff all three roles have
/// voted; the outcome is total once complete.
#[derive(Debug, Clone)]
pub struct TallyResult {
    pub complete: bool,
    pub outcome: Option<AttemptStatus>,
    pub snapshot: BTreeMap<JudgeRole, Vote>,
}

#[derive(Default)]
pub struct VoteTally {
    ballots: Mutex<HashMap<i64, BTreeMap<JudgeRole, Vote>>>,
}

impl VoteTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store or overwrite a vote. Duplicate roles replace the previous
    /// value (last writer wins, which doubles as correction).
    pub fn register_vote(&self, attempt_id: i64, role: JudgeRole, vote: Vote) -> TallyResult {
        let mut ballots = self.ballots.lock().expect("vote tally lock poisoned");
        let ballot = ballots.entry(attempt_id).or_default();
        ballot.insert(role, vote);

        let complete = ballot.len() == 3;
        TallyResult {
            complete,
            outcome: complete.then(|| majority(ballot)),
            snapshot: ballot.clone(),
        }
    }

    pub fn has_voted(&self, attempt_id: i64, role: JudgeRole) -> bool {
        self.ballots
            .lock()
            .expect("vote tally lock poisoned")
            .get(&attempt_id)
            .is_some_and(|b| b.contains_key(&role))
    }

    pub fn vote_count(&self, attempt_id: i64) -> usize {
        self.ballots
            .lock()
            .expect("vote tally lock poisoned")
            .get(&attempt_id)
            .map_or(0, |b| b.len())
    }

    pub fn clear(&self, attempt_id: i64) {
        self.ballots
            .lock()
            .expect("vote tally lock poisoned")
            .remove(&attempt_id);
    }

    pub fn clear_all(&self) {
        self.ballots
            .lock()
            .expect("vote tally lock poisoned")
            .clear();
    }

    /// Attempts with an open ballot and their vote counts; the director
    /// console uses this to re-prompt judges after a restartless recovery.
    pub fn open_ballots(&self) -> Vec<(i64, usize)> {
        self.ballots
            .lock()
            .expect("vote tally lock poisoned")
            .iter()
            .map(|(attempt_id, ballot)| (*attempt_id, ballot.len()))
            .collect()
    }
}

/// At least two whites make the lift; with three judges this is total.
fn majority(ballot: &BTreeMap<JudgeRole, Vote>) -> AttemptStatus {
    let whites = ballot.values().filter(|v| **v == Vote::White).count();
    if whites >= 2 {
        AttemptStatus::Valid
    } else {
        AttemptStatus::Invalid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incomplete_until_three_roles() {
        let tally = VoteTally::new();

        let r = tally.register_vote(42, JudgeRole::Head, Vote::White);
        assert!(!r.complete);
        assert!(r.outcome.is_none());

        let r = tally.register_vote(42, JudgeRole::Left, Vote::White);
        assert!(!r.complete);
        assert_eq!(tally.vote_count(42), 2);

        let r = tally.register_vote(42, JudgeRole::Right, Vote::Red);
        assert!(r.complete);
        assert_eq!(r.outcome, Some(AttemptStatus::Valid));
    }

    #[test]
    fn majority_of_reds_is_invalid() {
        let tally = VoteTally::new();
        tally.register_vote(7, JudgeRole::Head, Vote::Red);
        tally.register_vote(7, JudgeRole::Left, Vote::White);
        let r = tally.register_vote(7, JudgeRole::Right, Vote::Red);
        assert_eq!(r.outcome, Some(AttemptStatus::Invalid));
    }

    #[test]
    fn duplicate_role_overwrites_without_inflating_count() {
        let tally = VoteTally::new();
        tally.register_vote(9, JudgeRole::Head, Vote::White);
        tally.register_vote(9, JudgeRole::Left, Vote::White);
        tally.register_vote(9, JudgeRole::Right, Vote::White);

        // Head corrects to red: still 3 votes, outcome follows the new value.
        let r = tally.register_vote(9, JudgeRole::Head, Vote::Red);
        assert!(r.complete);
        assert_eq!(tally.vote_count(9), 3);
        assert_eq!(r.snapshot.get(&JudgeRole::Head), Some(&Vote::Red));
        assert_eq!(r.outcome, Some(AttemptStatus::Valid));

        let r = tally.register_vote(9, JudgeRole::Left, Vote::Red);
        assert_eq!(r.outcome, Some(AttemptStatus::Invalid));
    }

    #[test]
    fn clear_forgets_the_ballot() {
        let tally = VoteTally::new();
        tally.register_vote(11, JudgeRole::Head, Vote::White);
        assert!(tally.has_voted(11, JudgeRole::Head));

        tally.clear(11);
        assert!(!tally.has_voted(11, JudgeRole::Head));
        assert_eq!(tally.vote_count(11), 0);
    }

    #[test]
    fn ballots_are_independent_per_attempt() {
        let tally = VoteTally::new();
        tally.register_vote(1, JudgeRole::Head, Vote::White);
        tally.register_vote(2, JudgeRole::Head, Vote::Red);

        assert_eq!(tally.vote_count(1), 1);
        assert_eq!(tally.vote_count(2), 1);
        assert_eq!(tally.open_ballots().len(), 2);

        tally.clear_all();
        assert!(tally.open_ballots().is_empty());
    }

    #[test]
    fn role_and_vote_parsing() {
        assert_eq!("head".parse::<JudgeRole>(), Ok(JudgeRole::Head));
        assert_eq!("RIGHT".parse::<JudgeRole>(), Ok(JudgeRole::Right));
        assert!("center".parse::<JudgeRole>().is_err());

        assert_eq!("white".parse::<Vote>(), Ok(Vote::White));
        assert!("green".parse::<Vote>().is_err());
    }
}
