//! Push-event catalog and the publisher port.
//!
//! The state machine publishes through [`EventSink`] and never learns who
//! is listening; the realtime broker implements the sink and fans events
//! out to the channels returned by [`PushEvent::audience`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use storage::models::{AttemptStatus, CurrentState};

use crate::ordering::QueueEntry;
use crate::ranking::Rankings;
use crate::tally::{JudgeRole, Vote};

/// Who an event is addressed to within a meet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    /// Every session of the meet.
    Meet,
    /// Director sessions only.
    Director,
    /// Director and viewer sessions; judges are kept blind to each other.
    DirectorAndViewers,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PushEvent {
    #[serde(rename = "state.update")]
    StateUpdate { current: CurrentState },

    #[serde(rename = "queue.update")]
    QueueUpdate {
        lift_id: i64,
        round: i64,
        queue: Vec<QueueEntry>,
    },

    #[serde(rename = "weight.updated")]
    WeightUpdated {
        registration_id: i64,
        lift_id: i64,
        attempt_no: i16,
        weight_kg: f64,
    },

    #[serde(rename = "vote.progress")]
    VoteProgress { attempt_id: i64, votes_cast: usize },

    #[serde(rename = "attempt.result")]
    AttemptResult {
        attempt_id: i64,
        outcome: AttemptStatus,
        votes: BTreeMap<JudgeRole, Vote>,
    },

    #[serde(rename = "ranking.update")]
    RankingUpdate { rankings: Rankings },

    #[serde(rename = "timer.started")]
    TimerStarted {
        start_ts: DateTime<Utc>,
        duration_s: i64,
    },

    #[serde(rename = "timer.stopped")]
    TimerStopped,

    #[serde(rename = "meet.finished")]
    MeetFinished { reason: String },
}

impl PushEvent {
    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            PushEvent::StateUpdate { .. } => "state.update",
            PushEvent::QueueUpdate { .. } => "queue.update",
            PushEvent::WeightUpdated { .. } => "weight.updated",
            PushEvent::VoteProgress { .. } => "vote.progress",
            PushEvent::AttemptResult { .. } => "attempt.result",
            PushEvent::RankingUpdate { .. } => "ranking.update",
            PushEvent::TimerStarted { .. } => "timer.started",
            PushEvent::TimerStopped => "timer.stopped",
            PushEvent::MeetFinished { .. } => "meet.finished",
        }
    }

    pub fn audience(&self) -> Audience {
        match self {
            PushEvent::QueueUpdate { .. } => Audience::Director,
            PushEvent::VoteProgress { .. } => Audience::DirectorAndViewers,
            _ => Audience::Meet,
        }
    }
}

pub trait EventSink: Send + Sync {
    fn publish(&self, meet_id: i64, event: PushEvent);
}

/// Sink that drops everything; used when running headless commands.
pub struct NullSink;

impl EventSink for NullSink {
    fn publish(&self, _meet_id: i64, _event: PushEvent) {}
}
