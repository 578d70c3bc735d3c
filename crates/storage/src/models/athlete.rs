use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Athlete sex as used by categories and the score formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
pub enum Sex {
    M,
    F,
}

impl std::str::FromStr for Sex {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "M" | "m" => Ok(Sex::M),
            "F" | "f" => Ok(Sex::F),
            other => Err(format!("unknown sex: {other}")),
        }
    }
}

/// An athlete, identified across databases by fiscal code (CF).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Athlete {
    pub athlete_id: i64,
    pub cf: String,
    pub first_name: String,
    pub last_name: String,
    pub sex: Sex,
    pub birth_date: chrono::NaiveDate,
    pub created_at: chrono::NaiveDateTime,
}
