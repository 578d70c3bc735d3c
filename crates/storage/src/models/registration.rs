use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// An (athlete, meet) pair with weigh-in data.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Registration {
    pub registration_id: i64,
    pub meet_id: i64,
    pub athlete_id: i64,
    pub bodyweight: Option<f64>,
    pub weight_cat_id: Option<i64>,
    pub age_cat_id: Option<i64>,
    pub rack_setting: Option<String>,
    pub belt_setting: Option<String>,
}

/// Declared weight for attempt #1 of a lift, recorded at weigh-in.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Opener {
    pub registration_id: i64,
    pub lift_id: i64,
    pub weight: f64,
}
