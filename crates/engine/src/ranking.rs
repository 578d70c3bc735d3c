//! Placements within category and the bodyweight-normalized absolute
//! score (RIS).
//!
//! RIS = total * 100 / (A + (K - A) / (1 + Q * e^(-B * (BW - v)))),
//! with sex-specific constants fixed by the current regulation.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;

use storage::models::Sex;
use storage::repository::{LiftBest, RankingRepository, RankingRow};
use storage::Database;

use crate::error::Result;

struct FormulaConstants {
    a: Decimal,
    k: Decimal,
    b: Decimal,
    v: Decimal,
    q: Decimal,
}

fn constants_for(sex: Sex) -> FormulaConstants {
    match sex {
        Sex::M => FormulaConstants {
            a: Decimal::new(338, 0),
            k: Decimal::new(549, 0),
            b: Decimal::new(11354, 5),
            v: Decimal::new(74_777, 3),
            q: Decimal::new(53096, 5),
        },
        Sex::F => FormulaConstants {
            a: Decimal::new(164, 0),
            k: Decimal::new(270, 0),
            b: Decimal::new(13776, 5),
            v: Decimal::new(57_855, 3),
            q: Decimal::new(37089, 5),
        },
    }
}

fn decimal_exp(x: Decimal) -> Decimal {
    let x_f64: f64 = x.to_string().parse().unwrap_or(0.0);
    Decimal::from_f64_retain(x_f64.exp()).unwrap_or(Decimal::ONE)
}

/// RIS rounded to two decimals; zero when either input is zero.
pub fn ris_score(total: f64, bodyweight: f64, sex: Sex) -> Decimal {
    if total <= 0.0 || bodyweight <= 0.0 {
        return Decimal::ZERO;
    }
    let total = Decimal::from_f64_retain(total).unwrap_or_default();
    let bodyweight = Decimal::from_f64_retain(bodyweight).unwrap_or_default();
    let constants = constants_for(sex);

    let exp_term = decimal_exp(-constants.b * (bodyweight - constants.v));
    let denominator =
        constants.a + (constants.k - constants.a) / (Decimal::ONE + constants.q * exp_term);

    ((total * Decimal::from(100)) / denominator).round_dp(2)
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RankedEntry {
    pub placement: u32,
    pub registration_id: i64,
    pub athlete_cf: String,
    pub first_name: String,
    pub last_name: String,
    pub bodyweight: f64,
    pub total: f64,
    pub ris: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CategoryRanking {
    pub sex: Sex,
    pub weight_cat_name: String,
    pub age_cat_name: String,
    pub entries: Vec<RankedEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Rankings {
    pub categories: Vec<CategoryRanking>,
    pub absolute: Vec<RankedEntry>,
}

/// Best valid weight per lift, summed into the meet total.
fn totals(bests: &[LiftBest]) -> HashMap<i64, f64> {
    let mut totals: HashMap<i64, f64> = HashMap::new();
    for best in bests {
        *totals.entry(best.registration_id).or_default() += best.best;
    }
    totals
}

/// Compute category placements and the absolute list from store rows.
///
/// Category-less registrations (either category missing) rank only in the
/// absolute list. Within a category the order is total DESC, bodyweight
/// ASC, start_ord ASC; placements are 1-based and never shared.
pub fn compute(rows: Vec<RankingRow>, bests: Vec<LiftBest>) -> Rankings {
    let totals = totals(&bests);

    let mut scored: Vec<(RankingRow, f64, Decimal)> = rows
        .into_iter()
        .map(|row| {
            let total = totals.get(&row.registration_id).copied().unwrap_or(0.0);
            let ris = ris_score(total, row.bodyweight, row.sex);
            (row, total, ris)
        })
        .collect();

    // Absolute list first: everyone, RIS descending.
    scored.sort_by(|(ra, ta, risa), (rb, tb, risb)| {
        risb.cmp(risa)
            .then(tb.total_cmp(ta))
            .then(ra.start_ord.cmp(&rb.start_ord))
    });
    let absolute: Vec<RankedEntry> = scored
        .iter()
        .enumerate()
        .map(|(i, (row, total, ris))| entry(i as u32 + 1, row, *total, *ris))
        .collect();

    // Category lists: only fully categorized athletes.
    let mut by_category: HashMap<(Sex, i64, i64), Vec<(RankingRow, f64, Decimal)>> =
        HashMap::new();
    for (row, total, ris) in scored {
        if let (Some(wc), Some(ac)) = (row.weight_cat_id, row.age_cat_id) {
            by_category
                .entry((row.sex, wc, ac))
                .or_default()
                .push((row, total, ris));
        }
    }

    let mut categories: Vec<CategoryRanking> = by_category
        .into_values()
        .map(|mut members| {
            members.sort_by(|(ra, ta, _), (rb, tb, _)| {
                tb.total_cmp(ta)
                    .then(ra.bodyweight.total_cmp(&rb.bodyweight))
                    .then(ra.start_ord.cmp(&rb.start_ord))
            });
            let first = &members[0].0;
            CategoryRanking {
                sex: first.sex,
                weight_cat_name: first.weight_cat_name.clone().unwrap_or_default(),
                age_cat_name: first.age_cat_name.clone().unwrap_or_default(),
                entries: members
                    .iter()
                    .enumerate()
                    .map(|(i, (row, total, ris))| entry(i as u32 + 1, row, *total, *ris))
                    .collect(),
            }
        })
        .collect();
    categories.sort_by(|a, b| {
        (a.sex as u8, &a.weight_cat_name, &a.age_cat_name).cmp(&(
            b.sex as u8,
            &b.weight_cat_name,
            &b.age_cat_name,
        ))
    });

    Rankings {
        categories,
        absolute,
    }
}

fn entry(placement: u32, row: &RankingRow, total: f64, ris: Decimal) -> RankedEntry {
    RankedEntry {
        placement,
        registration_id: row.registration_id,
        athlete_cf: row.athlete_cf.clone(),
        first_name: row.first_name.clone(),
        last_name: row.last_name.clone(),
        bodyweight: row.bodyweight,
        total,
        ris,
    }
}

/// Rankings for a whole meet, straight from the store.
pub async fn rankings_for(db: &Database, meet_id: i64) -> Result<Rankings> {
    let repo = RankingRepository::new(db.pool());
    let rows = repo.ranking_rows(meet_id).await?;
    let bests = repo.valid_bests(meet_id).await?;
    Ok(compute(rows, bests))
}
