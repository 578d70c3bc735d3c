use sqlx::SqlitePool;

use crate::error::{Result, StorageError};
use crate::models::{Flight, Group, GroupEntry};

pub struct FlightRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> FlightRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_flight(&self, flight_id: i64) -> Result<Flight> {
        let flight = sqlx::query_as::<_, Flight>(
            "SELECT flight_id, meet_id, name, ord FROM flights WHERE flight_id = ?",
        )
        .bind(flight_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(StorageError::NotFound)?;

        Ok(flight)
    }

    pub async fn flights_for_meet(&self, meet_id: i64) -> Result<Vec<Flight>> {
        let flights = sqlx::query_as::<_, Flight>(
            "SELECT flight_id, meet_id, name, ord FROM flights WHERE meet_id = ? ORDER BY ord",
        )
        .bind(meet_id)
        .fetch_all(self.pool)
        .await?;

        Ok(flights)
    }

    pub async fn find_group(&self, group_id: i64) -> Result<Group> {
        let group = sqlx::query_as::<_, Group>(
            "SELECT group_id, flight_id, name, ord FROM platform_groups WHERE group_id = ?",
        )
        .bind(group_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(StorageError::NotFound)?;

        Ok(group)
    }

    pub async fn groups_for_flight(&self, flight_id: i64) -> Result<Vec<Group>> {
        let groups = sqlx::query_as::<_, Group>(
            "SELECT group_id, flight_id, name, ord
             FROM platform_groups WHERE flight_id = ? ORDER BY ord",
        )
        .bind(flight_id)
        .fetch_all(self.pool)
        .await?;

        Ok(groups)
    }

    pub async fn first_group(&self, flight_id: i64) -> Result<Option<Group>> {
        let group = sqlx::query_as::<_, Group>(
            "SELECT group_id, flight_id, name, ord
             FROM platform_groups WHERE flight_id = ? ORDER BY ord LIMIT 1",
        )
        .bind(flight_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(group)
    }

    /// The next group of the flight after the given ord, if any.
    pub async fn group_after(&self, flight_id: i64, ord: i64) -> Result<Option<Group>> {
        let group = sqlx::query_as::<_, Group>(
            "SELECT group_id, flight_id, name, ord
             FROM platform_groups WHERE flight_id = ? AND ord > ? ORDER BY ord LIMIT 1",
        )
        .bind(flight_id)
        .bind(ord)
        .fetch_optional(self.pool)
        .await?;

        Ok(group)
    }

    pub async fn entries_for_group(&self, group_id: i64) -> Result<Vec<GroupEntry>> {
        let entries = sqlx::query_as::<_, GroupEntry>(
            "SELECT group_entry_id, group_id, registration_id, start_ord
             FROM group_entries WHERE group_id = ? ORDER BY start_ord",
        )
        .bind(group_id)
        .fetch_all(self.pool)
        .await?;

        Ok(entries)
    }

    pub async fn create_flight(&self, meet_id: i64, name: &str, ord: i64) -> Result<Flight> {
        let flight = sqlx::query_as::<_, Flight>(
            "INSERT INTO flights (meet_id, name, ord) VALUES (?, ?, ?)
             RETURNING flight_id, meet_id, name, ord",
        )
        .bind(meet_id)
        .bind(name)
        .bind(ord)
        .fetch_one(self.pool)
        .await?;

        Ok(flight)
    }

    pub async fn create_group(&self, flight_id: i64, name: &str, ord: i64) -> Result<Group> {
        let group = sqlx::query_as::<_, Group>(
            "INSERT INTO platform_groups (flight_id, name, ord) VALUES (?, ?, ?)
             RETURNING group_id, flight_id, name, ord",
        )
        .bind(flight_id)
        .bind(name)
        .bind(ord)
        .fetch_one(self.pool)
        .await?;

        Ok(group)
    }

    pub async fn add_entry(
        &self,
        group_id: i64,
        registration_id: i64,
        start_ord: i64,
    ) -> Result<GroupEntry> {
        let entry = sqlx::query_as::<_, GroupEntry>(
            "INSERT INTO group_entries (group_id, registration_id, start_ord)
             VALUES (?, ?, ?)
             RETURNING group_entry_id, group_id, registration_id, start_ord",
        )
        .bind(group_id)
        .bind(registration_id)
        .bind(start_ord)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            let err = StorageError::from(e);
            if err.is_unique_violation() {
                StorageError::ConstraintViolation(
                    "registration is already entered in this group".into(),
                )
            } else {
                err
            }
        })?;

        Ok(entry)
    }
}
