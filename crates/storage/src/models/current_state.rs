use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Idle,
    Active,
    BetweenGroups,
    Finished,
}

/// The process-wide "what is happening now" singleton, persisted as the
/// single row with id = 1 and restored on restart.
///
/// Either every pointer is nil (meet idle) or the tuple is fully coherent
/// (meet active); the state machine is the only writer.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct CurrentState {
    pub phase: Phase,
    pub meet_id: Option<i64>,
    pub flight_id: Option<i64>,
    pub group_id: Option<i64>,
    pub lift_id: Option<i64>,
    pub round: Option<i64>,
    pub registration_id: Option<i64>,
    pub timer_started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub timer_duration_s: Option<i64>,
}

impl CurrentState {
    pub fn idle() -> Self {
        Self {
            phase: Phase::Idle,
            meet_id: None,
            flight_id: None,
            group_id: None,
            lift_id: None,
            round: None,
            registration_id: None,
            timer_started_at: None,
            timer_duration_s: None,
        }
    }
}
