use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Meet {
    pub meet_id: i64,
    /// External code, unique across local and remote databases.
    pub code: String,
    pub name: String,
    pub meet_date: chrono::NaiveDate,
    pub level: String,
    pub regulation: Option<String>,
    pub meet_type_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct MeetType {
    pub meet_type_id: i64,
    pub name: String,
}
