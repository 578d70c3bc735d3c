use chrono::NaiveDate;
use sqlx::SqlitePool;

use crate::error::{Result, StorageError};
use crate::models::{Athlete, Sex};

pub struct AthleteRepository<'a> {
    pool: &'a SqlitePool,
}

const ATHLETE_COLUMNS: &str =
    "athlete_id, cf, first_name, last_name, sex, birth_date, created_at";

impl<'a> AthleteRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, athlete_id: i64) -> Result<Athlete> {
        let athlete = sqlx::query_as::<_, Athlete>(&format!(
            "SELECT {ATHLETE_COLUMNS} FROM athletes WHERE athlete_id = ?"
        ))
        .bind(athlete_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(StorageError::NotFound)?;

        Ok(athlete)
    }

    /// Resolve an athlete by fiscal code, the stable cross-database key.
    pub async fn find_by_cf(&self, cf: &str) -> Result<Athlete> {
        let athlete = sqlx::query_as::<_, Athlete>(&format!(
            "SELECT {ATHLETE_COLUMNS} FROM athletes WHERE cf = ?"
        ))
        .bind(cf)
        .fetch_optional(self.pool)
        .await?
        .ok_or(StorageError::NotFound)?;

        Ok(athlete)
    }

    pub async fn create(
        &self,
        cf: &str,
        first_name: &str,
        last_name: &str,
        sex: Sex,
        birth_date: NaiveDate,
    ) -> Result<Athlete> {
        let athlete = sqlx::query_as::<_, Athlete>(&format!(
            "INSERT INTO athletes (cf, first_name, last_name, sex, birth_date)
             VALUES (?, ?, ?, ?, ?)
             RETURNING {ATHLETE_COLUMNS}"
        ))
        .bind(cf)
        .bind(first_name)
        .bind(last_name)
        .bind(sex)
        .bind(birth_date)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            let err = StorageError::from(e);
            if err.is_unique_violation() {
                StorageError::ConstraintViolation(format!("athlete CF {cf} already exists"))
            } else {
                err
            }
        })?;

        Ok(athlete)
    }

    pub async fn list(&self) -> Result<Vec<Athlete>> {
        let athletes = sqlx::query_as::<_, Athlete>(&format!(
            "SELECT {ATHLETE_COLUMNS} FROM athletes ORDER BY last_name, first_name"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(athletes)
    }

    /// Every athlete registered to a meet; the sync resolver uploads these
    /// before touching any result row.
    pub async fn list_for_meet(&self, meet_id: i64) -> Result<Vec<Athlete>> {
        let athletes = sqlx::query_as::<_, Athlete>(
            "SELECT a.athlete_id, a.cf, a.first_name, a.last_name, a.sex,
                    a.birth_date, a.created_at
             FROM athletes a
             JOIN registrations r ON r.athlete_id = a.athlete_id
             WHERE r.meet_id = ?
             ORDER BY a.athlete_id",
        )
        .bind(meet_id)
        .fetch_all(self.pool)
        .await?;

        Ok(athletes)
    }
}
