use sqlx::{FromRow, SqlitePool};

use crate::error::Result;
use crate::models::Sex;

/// Everything the ranking engine needs to know about one registration.
#[derive(Debug, Clone, FromRow)]
pub struct RankingRow {
    pub registration_id: i64,
    pub athlete_cf: String,
    pub first_name: String,
    pub last_name: String,
    pub sex: Sex,
    pub bodyweight: f64,
    pub weight_cat_id: Option<i64>,
    pub weight_cat_name: Option<String>,
    pub age_cat_id: Option<i64>,
    pub age_cat_name: Option<String>,
    pub start_ord: i64,
}

/// Best valid weight for one (registration, lift).
#[derive(Debug, Clone, FromRow)]
pub struct LiftBest {
    pub registration_id: i64,
    pub lift_id: i64,
    pub best: f64,
}

pub struct RankingRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> RankingRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn ranking_rows(&self, meet_id: i64) -> Result<Vec<RankingRow>> {
        let rows = sqlx::query_as::<_, RankingRow>(
            "SELECT r.registration_id,
                    a.cf AS athlete_cf, a.first_name, a.last_name, a.sex,
                    COALESCE(r.bodyweight, 0) AS bodyweight,
                    r.weight_cat_id, wc.name AS weight_cat_name,
                    r.age_cat_id, ac.name AS age_cat_name,
                    COALESCE(MIN(ge.start_ord), 0) AS start_ord
             FROM registrations r
             JOIN athletes a ON a.athlete_id = r.athlete_id
             LEFT JOIN weight_categories wc ON wc.weight_cat_id = r.weight_cat_id
             LEFT JOIN age_categories ac ON ac.age_cat_id = r.age_cat_id
             LEFT JOIN group_entries ge ON ge.registration_id = r.registration_id
             WHERE r.meet_id = ?
             GROUP BY r.registration_id
             ORDER BY r.registration_id",
        )
        .bind(meet_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Per-registration, per-lift max of VALID attempt weights, one query
    /// for the whole meet.
    pub async fn valid_bests(&self, meet_id: i64) -> Result<Vec<LiftBest>> {
        let bests = sqlx::query_as::<_, LiftBest>(
            "SELECT at.registration_id, at.lift_id, MAX(at.weight) AS best
             FROM attempts at
             JOIN registrations r ON r.registration_id = at.registration_id
             WHERE r.meet_id = ? AND at.status = 'VALID'
             GROUP BY at.registration_id, at.lift_id",
        )
        .bind(meet_id)
        .fetch_all(self.pool)
        .await?;

        Ok(bests)
    }
}
