use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// A lift discipline (SQ, PU, DIP, MU, MP). The meet-type fixes the
/// sequence in which lifts are contested.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Lift {
    pub lift_id: i64,
    pub code: String,
    pub name: String,
}
