use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::Sex;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct WeightCategory {
    pub weight_cat_id: i64,
    pub name: String,
    pub sex: Sex,
    pub min_kg: Option<f64>,
    pub max_kg: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct AgeCategory {
    pub age_cat_id: i64,
    pub name: String,
    pub min_age: Option<i64>,
    pub max_age: Option<i64>,
}
