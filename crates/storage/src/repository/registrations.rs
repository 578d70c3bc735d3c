use sqlx::SqlitePool;
use std::collections::HashMap;

use crate::ensure_half_kg;
use crate::error::{Result, StorageError};
use crate::models::{Opener, Registration};

pub struct RegistrationRepository<'a> {
    pool: &'a SqlitePool,
}

const REGISTRATION_COLUMNS: &str = "registration_id, meet_id, athlete_id, bodyweight, \
     weight_cat_id, age_cat_id, rack_setting, belt_setting";

impl<'a> RegistrationRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, registration_id: i64) -> Result<Registration> {
        let registration = sqlx::query_as::<_, Registration>(&format!(
            "SELECT {REGISTRATION_COLUMNS} FROM registrations WHERE registration_id = ?"
        ))
        .bind(registration_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(StorageError::NotFound)?;

        Ok(registration)
    }

    pub async fn create(&self, meet_id: i64, athlete_id: i64) -> Result<Registration> {
        let registration = sqlx::query_as::<_, Registration>(&format!(
            "INSERT INTO registrations (meet_id, athlete_id) VALUES (?, ?)
             RETURNING {REGISTRATION_COLUMNS}"
        ))
        .bind(meet_id)
        .bind(athlete_id)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            let err = StorageError::from(e);
            if err.is_unique_violation() {
                StorageError::ConstraintViolation(
                    "athlete is already registered for this meet".into(),
                )
            } else {
                err
            }
        })?;

        Ok(registration)
    }

    /// Record weigh-in data: bodyweight, assigned categories and the
    /// athlete's rack/belt settings.
    #[allow(clippy::too_many_arguments)]
    pub async fn weigh_in(
        &self,
        registration_id: i64,
        bodyweight: f64,
        weight_cat_id: Option<i64>,
        age_cat_id: Option<i64>,
        rack_setting: Option<&str>,
        belt_setting: Option<&str>,
    ) -> Result<Registration> {
        ensure_half_kg(bodyweight)?;

        let registration = sqlx::query_as::<_, Registration>(&format!(
            "UPDATE registrations
             SET bodyweight = ?, weight_cat_id = ?, age_cat_id = ?,
                 rack_setting = ?, belt_setting = ?
             WHERE registration_id = ?
             RETURNING {REGISTRATION_COLUMNS}"
        ))
        .bind(bodyweight)
        .bind(weight_cat_id)
        .bind(age_cat_id)
        .bind(rack_setting)
        .bind(belt_setting)
        .bind(registration_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(StorageError::NotFound)?;

        Ok(registration)
    }

    /// Record a declared opener. Also plants the PENDING attempt #1 row,
    /// which exists from weigh-in onwards.
    pub async fn set_opener(
        &self,
        registration_id: i64,
        lift_id: i64,
        weight: f64,
    ) -> Result<()> {
        ensure_half_kg(weight)?;

        let judged: Option<String> = sqlx::query_scalar(
            "SELECT status FROM attempts
             WHERE registration_id = ? AND lift_id = ? AND attempt_no = 1
             AND status != 'PENDING'",
        )
        .bind(registration_id)
        .bind(lift_id)
        .fetch_optional(self.pool)
        .await?;
        if judged.is_some() {
            return Err(StorageError::ConstraintViolation(
                "attempt 1 has already been judged".into(),
            ));
        }

        sqlx::query(
            "INSERT INTO openers (registration_id, lift_id, weight) VALUES (?, ?, ?)
             ON CONFLICT (registration_id, lift_id) DO UPDATE SET weight = excluded.weight",
        )
        .bind(registration_id)
        .bind(lift_id)
        .bind(weight)
        .execute(self.pool)
        .await?;

        sqlx::query(
            "INSERT INTO attempts (registration_id, lift_id, attempt_no, weight)
             VALUES (?, ?, 1, ?)
             ON CONFLICT (registration_id, lift_id, attempt_no)
                 DO UPDATE SET weight = excluded.weight",
        )
        .bind(registration_id)
        .bind(lift_id)
        .bind(weight)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    pub async fn openers_for(&self, registration_id: i64) -> Result<HashMap<i64, f64>> {
        let openers = sqlx::query_as::<_, Opener>(
            "SELECT registration_id, lift_id, weight FROM openers WHERE registration_id = ?",
        )
        .bind(registration_id)
        .fetch_all(self.pool)
        .await?;

        Ok(openers.into_iter().map(|o| (o.lift_id, o.weight)).collect())
    }
}
