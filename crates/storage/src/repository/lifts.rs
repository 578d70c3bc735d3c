use sqlx::SqlitePool;

use crate::error::{Result, StorageError};
use crate::models::Lift;

pub struct LiftRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> LiftRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_by_code(&self, code: &str) -> Result<Lift> {
        let lift = sqlx::query_as::<_, Lift>(
            "SELECT lift_id, code, name FROM lifts WHERE code = ?",
        )
        .bind(code)
        .fetch_optional(self.pool)
        .await?
        .ok_or(StorageError::NotFound)?;

        Ok(lift)
    }

    pub async fn list(&self) -> Result<Vec<Lift>> {
        let lifts = sqlx::query_as::<_, Lift>("SELECT lift_id, code, name FROM lifts ORDER BY lift_id")
            .fetch_all(self.pool)
            .await?;

        Ok(lifts)
    }
}
