use sqlx::{FromRow, SqlitePool};

use crate::ensure_half_kg;
use crate::error::{Result, StorageError};
use crate::models::{Attempt, AttemptStatus};

/// One row per group entry for a (group, lift, round) query, carrying
/// everything the ordering engine needs. Fetched in a single statement so
/// queue latency does not grow with group size.
#[derive(Debug, Clone, FromRow)]
pub struct RoundCandidate {
    pub registration_id: i64,
    pub bodyweight: Option<f64>,
    pub start_ord: i64,
    pub declared: Option<f64>,
    pub status: Option<AttemptStatus>,
}

pub struct AttemptRepository<'a> {
    pool: &'a SqlitePool,
}

const ATTEMPT_COLUMNS: &str =
    "attempt_id, registration_id, lift_id, attempt_no, weight, status";

impl<'a> AttemptRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, attempt_id: i64) -> Result<Attempt> {
        let attempt = sqlx::query_as::<_, Attempt>(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM attempts WHERE attempt_id = ?"
        ))
        .bind(attempt_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(StorageError::NotFound)?;

        Ok(attempt)
    }

    /// All attempts of a registration for a lift, in stable attempt_no order.
    pub async fn attempts_for(&self, registration_id: i64, lift_id: i64) -> Result<Vec<Attempt>> {
        let attempts = sqlx::query_as::<_, Attempt>(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM attempts
             WHERE registration_id = ? AND lift_id = ?
             ORDER BY attempt_no"
        ))
        .bind(registration_id)
        .bind(lift_id)
        .fetch_all(self.pool)
        .await?;

        Ok(attempts)
    }

    async fn find_slot(
        &self,
        registration_id: i64,
        lift_id: i64,
        attempt_no: i16,
    ) -> Result<Option<Attempt>> {
        let attempt = sqlx::query_as::<_, Attempt>(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM attempts
             WHERE registration_id = ? AND lift_id = ? AND attempt_no = ?"
        ))
        .bind(registration_id)
        .bind(lift_id)
        .bind(attempt_no)
        .fetch_optional(self.pool)
        .await?;

        Ok(attempt)
    }

    /// Upsert the declared weight for an attempt slot.
    ///
    /// Rejects out-of-range attempt numbers, a missing or still-open
    /// predecessor, and re-declaration into a judged slot. Declaring
    /// attempt 1 refreshes the opener row so the round-1 queue follows the
    /// correction.
    pub async fn declare(
        &self,
        registration_id: i64,
        lift_id: i64,
        attempt_no: i16,
        weight: f64,
    ) -> Result<Attempt> {
        if !(1..=4).contains(&attempt_no) {
            return Err(StorageError::BadInput(format!(
                "attempt_no must be between 1 and 4, got {attempt_no}"
            )));
        }
        ensure_half_kg(weight)?;

        if attempt_no > 1 {
            match self.find_slot(registration_id, lift_id, attempt_no - 1).await? {
                None => {
                    return Err(StorageError::ConstraintViolation(format!(
                        "attempt {} has not been declared yet",
                        attempt_no - 1
                    )));
                }
                Some(prev) if prev.status == AttemptStatus::Pending => {
                    return Err(StorageError::ConstraintViolation(format!(
                        "attempt {} is still open",
                        attempt_no - 1
                    )));
                }
                Some(_) => {}
            }
        }

        let attempt = match self.find_slot(registration_id, lift_id, attempt_no).await? {
            Some(existing) if existing.status != AttemptStatus::Pending => {
                return Err(StorageError::ConstraintViolation(format!(
                    "attempt {attempt_no} has already been judged"
                )));
            }
            Some(existing) => {
                sqlx::query_as::<_, Attempt>(&format!(
                    "UPDATE attempts SET weight = ? WHERE attempt_id = ?
                     RETURNING {ATTEMPT_COLUMNS}"
                ))
                .bind(weight)
                .bind(existing.attempt_id)
                .fetch_one(self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Attempt>(&format!(
                    "INSERT INTO attempts (registration_id, lift_id, attempt_no, weight)
                     VALUES (?, ?, ?, ?)
                     RETURNING {ATTEMPT_COLUMNS}"
                ))
                .bind(registration_id)
                .bind(lift_id)
                .bind(attempt_no)
                .bind(weight)
                .fetch_one(self.pool)
                .await?
            }
        };

        if attempt_no == 1 {
            sqlx::query(
                "INSERT INTO openers (registration_id, lift_id, weight) VALUES (?, ?, ?)
                 ON CONFLICT (registration_id, lift_id) DO UPDATE SET weight = excluded.weight",
            )
            .bind(registration_id)
            .bind(lift_id)
            .bind(weight)
            .execute(self.pool)
            .await?;
        }

        Ok(attempt)
    }

    /// Record the judged outcome. The status transition happens exactly
    /// once; the guard in the WHERE clause makes the check race-free.
    pub async fn finalize(&self, attempt_id: i64, outcome: AttemptStatus) -> Result<Attempt> {
        if outcome == AttemptStatus::Pending {
            return Err(StorageError::BadInput(
                "an attempt cannot be finalized back to PENDING".into(),
            ));
        }

        let attempt = sqlx::query_as::<_, Attempt>(&format!(
            "UPDATE attempts SET status = ?
             WHERE attempt_id = ? AND status = 'PENDING'
             RETURNING {ATTEMPT_COLUMNS}"
        ))
        .bind(outcome)
        .bind(attempt_id)
        .fetch_optional(self.pool)
        .await?;

        match attempt {
            Some(a) => Ok(a),
            None => {
                // Distinguish an unknown attempt from a double finalize.
                let existing = self.find_by_id(attempt_id).await?;
                Err(StorageError::ConstraintViolation(format!(
                    "attempt {attempt_id} already finalized as {:?}",
                    existing.status
                )))
            }
        }
    }

    /// Batched declared-weight lookup for one (group, lift, round).
    ///
    /// Round 1 reads declarations from openers; later rounds read the
    /// attempt row for that round. Either way the round-attempt status
    /// rides along so the caller can drop already-judged entries.
    pub async fn round_candidates(
        &self,
        group_id: i64,
        lift_id: i64,
        round: i16,
    ) -> Result<Vec<RoundCandidate>> {
        let sql = if round == 1 {
            "SELECT ge.registration_id, r.bodyweight, ge.start_ord,
                    o.weight AS declared, a.status
             FROM group_entries ge
             JOIN registrations r ON r.registration_id = ge.registration_id
             LEFT JOIN openers o
                 ON o.registration_id = ge.registration_id AND o.lift_id = ?2
             LEFT JOIN attempts a
                 ON a.registration_id = ge.registration_id
                 AND a.lift_id = ?2 AND a.attempt_no = ?3
             WHERE ge.group_id = ?1"
        } else {
            "SELECT ge.registration_id, r.bodyweight, ge.start_ord,
                    a.weight AS declared, a.status
             FROM group_entries ge
             JOIN registrations r ON r.registration_id = ge.registration_id
             LEFT JOIN attempts a
                 ON a.registration_id = ge.registration_id
                 AND a.lift_id = ?2 AND a.attempt_no = ?3
             WHERE ge.group_id = ?1"
        };

        let candidates = sqlx::query_as::<_, RoundCandidate>(sql)
            .bind(group_id)
            .bind(lift_id)
            .bind(round)
            .fetch_all(self.pool)
            .await?;

        Ok(candidates)
    }

    /// Best valid weight for a (registration, lift); 0 if none.
    pub async fn best_valid(&self, registration_id: i64, lift_id: i64) -> Result<f64> {
        let best: f64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(weight), 0.0)
             FROM attempts
             WHERE registration_id = ? AND lift_id = ? AND status = 'VALID'",
        )
        .bind(registration_id)
        .bind(lift_id)
        .fetch_one(self.pool)
        .await?;

        Ok(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{
        AthleteRepository, FlightRepository, MeetRepository, RegistrationRepository,
    };
    use crate::models::Sex;
    use crate::Database;

    async fn fixture() -> (Database, i64, i64) {
        let db = Database::in_memory().await.unwrap();
        db.run_migrations().await.unwrap();

        sqlx::query("INSERT INTO lifts (code, name) VALUES ('MU', 'Muscle-up')")
            .execute(db.pool())
            .await
            .unwrap();
        sqlx::query("INSERT INTO meet_types (name) VALUES ('Single lift')")
            .execute(db.pool())
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO meet_type_lifts (meet_type_id, lift_id, ord) VALUES (1, 1, 1)",
        )
        .execute(db.pool())
        .await
        .unwrap();

        let athlete = AthleteRepository::new(db.pool())
            .create(
                "RSSMRA90A01H501W",
                "Mario",
                "Rossi",
                Sex::M,
                chrono::NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
            )
            .await
            .unwrap();

        let meet = MeetRepository::new(db.pool())
            .create("TEST-2026", "Test Meet", chrono::NaiveDate::from_ymd_opt(2026, 6, 6).unwrap(), "regional", None, 1)
            .await
            .unwrap();

        let reg = RegistrationRepository::new(db.pool())
            .create(meet.meet_id, athlete.athlete_id)
            .await
            .unwrap();

        let flights = FlightRepository::new(db.pool());
        let flight = flights.create_flight(meet.meet_id, "A", 1).await.unwrap();
        let group = flights.create_group(flight.flight_id, "G1", 1).await.unwrap();
        flights
            .add_entry(group.group_id, reg.registration_id, 1)
            .await
            .unwrap();

        (db, reg.registration_id, 1)
    }

    #[tokio::test]
    async fn declare_then_read_back() {
        let (db, reg, lift) = fixture().await;
        let repo = AttemptRepository::new(db.pool());

        let a = repo.declare(reg, lift, 1, 85.0).await.unwrap();
        assert_eq!(a.attempt_no, 1);
        assert_eq!(a.weight, 85.0);
        assert_eq!(a.status, AttemptStatus::Pending);

        let all = repo.attempts_for(reg, lift).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].attempt_id, a.attempt_id);
    }

    #[tokio::test]
    async fn declare_rejects_out_of_range_and_unquantized() {
        let (db, reg, lift) = fixture().await;
        let repo = AttemptRepository::new(db.pool());

        assert!(matches!(
            repo.declare(reg, lift, 0, 85.0).await,
            Err(StorageError::BadInput(_))
        ));
        assert!(matches!(
            repo.declare(reg, lift, 5, 85.0).await,
            Err(StorageError::BadInput(_))
        ));
        assert!(matches!(
            repo.declare(reg, lift, 1, 85.3).await,
            Err(StorageError::BadInput(_))
        ));
    }

    #[tokio::test]
    async fn declare_requires_settled_predecessor() {
        let (db, reg, lift) = fixture().await;
        let repo = AttemptRepository::new(db.pool());

        // No attempt 1 yet.
        assert!(matches!(
            repo.declare(reg, lift, 2, 90.0).await,
            Err(StorageError::ConstraintViolation(_))
        ));

        let a1 = repo.declare(reg, lift, 1, 85.0).await.unwrap();

        // Attempt 1 still pending.
        assert!(matches!(
            repo.declare(reg, lift, 2, 90.0).await,
            Err(StorageError::ConstraintViolation(_))
        ));

        repo.finalize(a1.attempt_id, AttemptStatus::Valid).await.unwrap();
        let a2 = repo.declare(reg, lift, 2, 90.0).await.unwrap();
        assert_eq!(a2.attempt_no, 2);
    }

    #[tokio::test]
    async fn finalize_transitions_exactly_once() {
        let (db, reg, lift) = fixture().await;
        let repo = AttemptRepository::new(db.pool());

        let a = repo.declare(reg, lift, 1, 85.0).await.unwrap();
        let judged = repo.finalize(a.attempt_id, AttemptStatus::Invalid).await.unwrap();
        assert_eq!(judged.status, AttemptStatus::Invalid);

        assert!(matches!(
            repo.finalize(a.attempt_id, AttemptStatus::Valid).await,
            Err(StorageError::ConstraintViolation(_))
        ));
        assert!(matches!(
            repo.declare(reg, lift, 1, 87.5).await,
            Err(StorageError::ConstraintViolation(_))
        ));
    }

    #[tokio::test]
    async fn declaring_attempt_one_refreshes_opener() {
        let (db, reg, lift) = fixture().await;
        let repo = AttemptRepository::new(db.pool());

        repo.declare(reg, lift, 1, 85.0).await.unwrap();
        repo.declare(reg, lift, 1, 87.5).await.unwrap();

        let opener: f64 = sqlx::query_scalar(
            "SELECT weight FROM openers WHERE registration_id = ? AND lift_id = ?",
        )
        .bind(reg)
        .bind(lift)
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert_eq!(opener, 87.5);
    }

    #[tokio::test]
    async fn best_valid_ignores_pending_and_invalid() {
        let (db, reg, lift) = fixture().await;
        let repo = AttemptRepository::new(db.pool());

        assert_eq!(repo.best_valid(reg, lift).await.unwrap(), 0.0);

        let a1 = repo.declare(reg, lift, 1, 85.0).await.unwrap();
        repo.finalize(a1.attempt_id, AttemptStatus::Valid).await.unwrap();
        let a2 = repo.declare(reg, lift, 2, 92.5).await.unwrap();
        repo.finalize(a2.attempt_id, AttemptStatus::Invalid).await.unwrap();
        repo.declare(reg, lift, 3, 92.5).await.unwrap();

        assert_eq!(repo.best_valid(reg, lift).await.unwrap(), 85.0);
    }
}
