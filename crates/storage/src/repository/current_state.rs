use sqlx::SqlitePool;

use crate::error::{Result, StorageError};
use crate::models::CurrentState;

pub struct CurrentStateRepository<'a> {
    pool: &'a SqlitePool,
}

const STATE_COLUMNS: &str = "phase, meet_id, flight_id, group_id, lift_id, round, \
     registration_id, timer_started_at, timer_duration_s";

impl<'a> CurrentStateRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// The singleton row is seeded by the schema migration; a missing row
    /// means the database is corrupt.
    pub async fn get(&self) -> Result<CurrentState> {
        let state = sqlx::query_as::<_, CurrentState>(&format!(
            "SELECT {STATE_COLUMNS} FROM current_state WHERE id = 1"
        ))
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| {
            StorageError::ConstraintViolation("current_state singleton row is missing".into())
        })?;

        Ok(state)
    }

    pub async fn save(&self, state: &CurrentState) -> Result<()> {
        sqlx::query(
            "UPDATE current_state
             SET phase = ?, meet_id = ?, flight_id = ?, group_id = ?, lift_id = ?,
                 round = ?, registration_id = ?, timer_started_at = ?, timer_duration_s = ?
             WHERE id = 1",
        )
        .bind(state.phase)
        .bind(state.meet_id)
        .bind(state.flight_id)
        .bind(state.group_id)
        .bind(state.lift_id)
        .bind(state.round)
        .bind(state.registration_id)
        .bind(state.timer_started_at)
        .bind(state.timer_duration_s)
        .execute(self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Phase;
    use crate::Database;

    #[tokio::test]
    async fn singleton_round_trip() {
        let db = Database::in_memory().await.unwrap();
        db.run_migrations().await.unwrap();
        let repo = CurrentStateRepository::new(db.pool());

        let initial = repo.get().await.unwrap();
        assert_eq!(initial.phase, Phase::Idle);
        assert!(initial.meet_id.is_none());

        let mut state = CurrentState::idle();
        state.phase = Phase::Active;
        state.meet_id = Some(7);
        state.flight_id = Some(3);
        state.group_id = Some(9);
        state.lift_id = Some(1);
        state.round = Some(2);
        state.registration_id = Some(42);
        repo.save(&state).await.unwrap();

        let restored = repo.get().await.unwrap();
        assert_eq!(restored.phase, Phase::Active);
        assert_eq!(restored.meet_id, Some(7));
        assert_eq!(restored.round, Some(2));
        assert_eq!(restored.registration_id, Some(42));
    }
}
