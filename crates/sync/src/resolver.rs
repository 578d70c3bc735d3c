//! Uploads a finished meet into the remote archive.
//!
//! Identity is resolved by logical key only: athletes travel by CF, meets
//! by code, categories by name and lifts by code. Local autoincrement ids
//! never cross the boundary. Everything that concerns the meet itself is
//! written in one transaction; on failure the archive is unchanged.

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{Sqlite, Transaction};
use std::collections::HashMap;
use tracing::info;

use engine::ranking;
use storage::error::StorageError;
use storage::models::Athlete;
use storage::repository::{
    AthleteRepository, LiftBest, MeetRepository, RankingRepository, RankingRow,
};
use storage::Database;

use crate::archive::RemoteArchive;
use crate::error::{Result, SyncError};

#[derive(Debug, Default)]
pub struct SyncReport {
    pub athletes_upserted: usize,
    pub results_written: usize,
    pub records_promoted: usize,
}

pub struct SyncResolver<'a> {
    local: &'a Database,
    remote: &'a RemoteArchive,
}

impl<'a> SyncResolver<'a> {
    pub fn new(local: &'a Database, remote: &'a RemoteArchive) -> Self {
        Self { local, remote }
    }

    pub async fn sync_meet(&self, meet_code: &str, force: bool) -> Result<SyncReport> {
        let meet = MeetRepository::new(self.local.pool())
            .find_by_code(meet_code)
            .await
            .map_err(|e| match e {
                StorageError::NotFound => SyncError::UnknownMeet(meet_code.to_string()),
                other => SyncError::Storage(other),
            })?;

        let mut report = SyncReport::default();

        // Athlete identities are shared across meets, so they are upserted
        // up front and independently of the meet transaction.
        let athletes = AthleteRepository::new(self.local.pool())
            .list_for_meet(meet.meet_id)
            .await?;
        for athlete in &athletes {
            self.upsert_athlete(athlete).await?;
        }
        report.athletes_upserted = athletes.len();

        let already: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM meets WHERE code = ?)")
            .bind(meet_code)
            .fetch_one(self.remote.pool())
            .await?;
        if already && !force {
            return Err(SyncError::AlreadySynced(meet_code.to_string()));
        }

        let ranking_repo = RankingRepository::new(self.local.pool());
        let rows = ranking_repo.ranking_rows(meet.meet_id).await?;
        let bests = ranking_repo.valid_bests(meet.meet_id).await?;
        let lifts = MeetRepository::new(self.local.pool())
            .lift_sequence(meet.meet_id)
            .await?;
        let lift_codes: HashMap<i64, String> =
            lifts.into_iter().map(|l| (l.lift_id, l.code)).collect();
        let rankings = ranking::compute(rows.clone(), bests.clone());

        // Category placement per registration; OPEN athletes carry none.
        let placements: HashMap<i64, u32> = rankings
            .categories
            .iter()
            .flat_map(|c| c.entries.iter().map(|e| (e.registration_id, e.placement)))
            .collect();
        let scores: HashMap<i64, (f64, Decimal)> = rankings
            .absolute
            .iter()
            .map(|e| (e.registration_id, (e.total, e.ris)))
            .collect();

        let mut tx = self.remote.pool().begin().await?;

        if already {
            info!(meet = meet_code, "force sync: replacing archived meet");
            sqlx::query(
                "DELETE FROM result_lifts WHERE result_id IN
                     (SELECT result_id FROM results WHERE meet_code = ?)",
            )
            .bind(meet_code)
            .execute(&mut *tx)
            .await?;
            sqlx::query("DELETE FROM results WHERE meet_code = ?")
                .bind(meet_code)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM meets WHERE code = ?")
                .bind(meet_code)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query(
            "INSERT INTO meets (code, name, meet_date, level, regulation)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&meet.code)
        .bind(&meet.name)
        .bind(meet.meet_date)
        .bind(&meet.level)
        .bind(&meet.regulation)
        .execute(&mut *tx)
        .await?;

        report.records_promoted = self
            .promote_records(&mut tx, meet_code, &rows, &bests, &lift_codes)
            .await?;

        for row in &rows {
            let (total, ris) = scores
                .get(&row.registration_id)
                .copied()
                .unwrap_or((0.0, Decimal::ZERO));
            let result_id: i64 = sqlx::query_scalar(
                "INSERT INTO results (meet_code, athlete_cf, sex, bodyweight,
                     weight_cat_name, age_cat_name, total, ris, placement)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                 RETURNING result_id",
            )
            .bind(meet_code)
            .bind(&row.athlete_cf)
            .bind(row.sex)
            .bind(row.bodyweight)
            .bind(&row.weight_cat_name)
            .bind(&row.age_cat_name)
            .bind(total)
            .bind(decimal_to_f64(ris))
            .bind(placements.get(&row.registration_id).map(|p| *p as i64))
            .fetch_one(&mut *tx)
            .await?;

            for best in bests.iter().filter(|b| b.registration_id == row.registration_id) {
                let Some(code) = lift_codes.get(&best.lift_id) else {
                    continue;
                };
                sqlx::query(
                    "INSERT INTO result_lifts (result_id, lift_code, best_kg) VALUES (?, ?, ?)",
                )
                .bind(result_id)
                .bind(code)
                .bind(best.best)
                .execute(&mut *tx)
                .await?;
            }
            report.results_written += 1;
        }

        tx.commit().await?;

        info!(
            meet = meet_code,
            athletes = report.athletes_upserted,
            results = report.results_written,
            records = report.records_promoted,
            "meet archived"
        );
        Ok(report)
    }

    async fn upsert_athlete(&self, athlete: &Athlete) -> Result<()> {
        sqlx::query(
            "INSERT INTO athletes (cf, first_name, last_name, sex, birth_date)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT (cf) DO UPDATE SET
                 first_name = excluded.first_name,
                 last_name = excluded.last_name,
                 sex = excluded.sex,
                 birth_date = excluded.birth_date",
        )
        .bind(&athlete.cf)
        .bind(&athlete.first_name)
        .bind(&athlete.last_name)
        .bind(athlete.sex)
        .bind(athlete.birth_date)
        .execute(self.remote.pool())
        .await?;

        Ok(())
    }

    /// Promote records for every (weight category, age category, lift)
    /// with at least one valid attempt. Only a strictly greater weight
    /// replaces the standing record.
    async fn promote_records(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        meet_code: &str,
        rows: &[RankingRow],
        bests: &[LiftBest],
        lift_codes: &HashMap<i64, String>,
    ) -> Result<usize> {
        struct Candidate<'r> {
            weight: f64,
            bodyweight: f64,
            cf: &'r str,
        }

        let by_registration: HashMap<i64, &RankingRow> =
            rows.iter().map(|r| (r.registration_id, r)).collect();

        // Best candidate per (wc, ac, lift): max weight, lighter athlete
        // on a tied weight.
        let mut cells: HashMap<(String, String, String), Candidate> = HashMap::new();
        for best in bests {
            let Some(row) = by_registration.get(&best.registration_id) else {
                continue;
            };
            let (Some(wc), Some(ac)) = (&row.weight_cat_name, &row.age_cat_name) else {
                continue;
            };
            let Some(code) = lift_codes.get(&best.lift_id) else {
                continue;
            };
            let candidate = Candidate {
                weight: best.best,
                bodyweight: row.bodyweight,
                cf: &row.athlete_cf,
            };
            match cells.entry((wc.clone(), ac.clone(), code.clone())) {
                std::collections::hash_map::Entry::Occupied(mut slot) => {
                    let current = slot.get_mut();
                    if candidate.weight > current.weight
                        || (candidate.weight == current.weight
                            && candidate.bodyweight < current.bodyweight)
                    {
                        *current = candidate;
                    }
                }
                std::collections::hash_map::Entry::Vacant(slot) => {
                    slot.insert(candidate);
                }
            }
        }

        let today = Utc::now().date_naive();
        let mut promoted = 0;

        for ((wc, ac, lift_code), candidate) in cells {
            let standing: Option<f64> = sqlx::query_scalar(
                "SELECT weight FROM records
                 WHERE weight_cat_name = ? AND age_cat_name = ? AND lift_code = ?",
            )
            .bind(&wc)
            .bind(&ac)
            .bind(&lift_code)
            .fetch_optional(&mut **tx)
            .await?;

            if standing.is_some_and(|w| candidate.weight <= w) {
                continue;
            }

            sqlx::query(
                "INSERT INTO records (weight_cat_name, age_cat_name, lift_code,
                     weight, bodyweight, athlete_cf, meet_code, record_date)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT (weight_cat_name, age_cat_name, lift_code) DO UPDATE SET
                     weight = excluded.weight,
                     bodyweight = excluded.bodyweight,
                     athlete_cf = excluded.athlete_cf,
                     meet_code = excluded.meet_code,
                     record_date = excluded.record_date",
            )
            .bind(&wc)
            .bind(&ac)
            .bind(&lift_code)
            .bind(candidate.weight)
            .bind(candidate.bodyweight)
            .bind(candidate.cf)
            .bind(meet_code)
            .bind(today)
            .execute(&mut **tx)
            .await?;
            promoted += 1;
        }

        Ok(promoted)
    }
}

fn decimal_to_f64(decimal: Decimal) -> f64 {
    decimal.to_string().parse().unwrap_or(0.0)
}
