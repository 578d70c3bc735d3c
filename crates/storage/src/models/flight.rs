use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Flight {
    pub flight_id: i64,
    pub meet_id: i64,
    pub name: String,
    pub ord: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Group {
    pub group_id: i64,
    pub flight_id: i64,
    pub name: String,
    pub ord: i64,
}

/// Pins a registration to a group with its nomination order, used as the
/// last-resort tiebreak in ordering and ranking.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct GroupEntry {
    pub group_entry_id: i64,
    pub group_id: i64,
    pub registration_id: i64,
    pub start_ord: i64,
}
