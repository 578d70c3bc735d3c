use chrono::NaiveDate;
use sqlx::SqlitePool;

use crate::error::{Result, StorageError};
use crate::models::{Lift, Meet, MeetType};

pub struct MeetRepository<'a> {
    pool: &'a SqlitePool,
}

const MEET_COLUMNS: &str = "meet_id, code, name, meet_date, level, regulation, meet_type_id";

impl<'a> MeetRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> Result<Vec<Meet>> {
        let meets = sqlx::query_as::<_, Meet>(&format!(
            "SELECT {MEET_COLUMNS} FROM meets ORDER BY meet_date DESC, meet_id DESC"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(meets)
    }

    pub async fn find_by_id(&self, meet_id: i64) -> Result<Meet> {
        let meet = sqlx::query_as::<_, Meet>(&format!(
            "SELECT {MEET_COLUMNS} FROM meets WHERE meet_id = ?"
        ))
        .bind(meet_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(StorageError::NotFound)?;

        Ok(meet)
    }

    pub async fn find_by_code(&self, code: &str) -> Result<Meet> {
        let meet = sqlx::query_as::<_, Meet>(&format!(
            "SELECT {MEET_COLUMNS} FROM meets WHERE code = ?"
        ))
        .bind(code)
        .fetch_optional(self.pool)
        .await?
        .ok_or(StorageError::NotFound)?;

        Ok(meet)
    }

    pub async fn create(
        &self,
        code: &str,
        name: &str,
        meet_date: NaiveDate,
        level: &str,
        regulation: Option<&str>,
        meet_type_id: i64,
    ) -> Result<Meet> {
        let meet = sqlx::query_as::<_, Meet>(&format!(
            "INSERT INTO meets (code, name, meet_date, level, regulation, meet_type_id)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING {MEET_COLUMNS}"
        ))
        .bind(code)
        .bind(name)
        .bind(meet_date)
        .bind(level)
        .bind(regulation)
        .bind(meet_type_id)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            let err = StorageError::from(e);
            if err.is_unique_violation() {
                StorageError::ConstraintViolation(format!("meet code {code} already exists"))
            } else {
                err
            }
        })?;

        Ok(meet)
    }

    pub async fn meet_types(&self) -> Result<Vec<MeetType>> {
        let meet_types = sqlx::query_as::<_, MeetType>(
            "SELECT meet_type_id, name FROM meet_types ORDER BY name",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(meet_types)
    }

    /// The meet's lift sequence, in meet-type order.
    pub async fn lift_sequence(&self, meet_id: i64) -> Result<Vec<Lift>> {
        let lifts = sqlx::query_as::<_, Lift>(
            "SELECT l.lift_id, l.code, l.name
             FROM lifts l
             JOIN meet_type_lifts mtl ON mtl.lift_id = l.lift_id
             JOIN meets m ON m.meet_type_id = mtl.meet_type_id
             WHERE m.meet_id = ?
             ORDER BY mtl.ord",
        )
        .bind(meet_id)
        .fetch_all(self.pool)
        .await?;

        Ok(lifts)
    }
}
