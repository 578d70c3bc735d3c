//! Demo fixtures for local development: the standard lift catalog, the
//! four-lift meet-type, category tables and one small meet ready to run.

use chrono::NaiveDate;
use tracing::info;

use crate::error::Result;
use crate::models::Sex;
use crate::repository::{
    AthleteRepository, CategoryRepository, FlightRepository, MeetRepository,
    RegistrationRepository,
};
use crate::Database;

pub async fn seed(db: &Database) -> Result<()> {
    let pool = db.pool();

    let lifts = [
        ("MU", "Muscle-up"),
        ("PU", "Pull-up"),
        ("DIP", "Dip"),
        ("SQ", "Squat"),
        ("MP", "Military press"),
    ];
    for (code, name) in lifts {
        sqlx::query("INSERT OR IGNORE INTO lifts (code, name) VALUES (?, ?)")
            .bind(code)
            .bind(name)
            .execute(pool)
            .await?;
    }

    sqlx::query("INSERT OR IGNORE INTO meet_types (name) VALUES ('Streetlifting 4')")
        .execute(pool)
        .await?;
    let meet_type_id: i64 =
        sqlx::query_scalar("SELECT meet_type_id FROM meet_types WHERE name = 'Streetlifting 4'")
            .fetch_one(pool)
            .await?;
    for (ord, code) in ["MU", "PU", "DIP", "SQ"].iter().enumerate() {
        sqlx::query(
            "INSERT OR IGNORE INTO meet_type_lifts (meet_type_id, lift_id, ord)
             SELECT ?, lift_id, ? FROM lifts WHERE code = ?",
        )
        .bind(meet_type_id)
        .bind(ord as i64 + 1)
        .bind(code)
        .execute(pool)
        .await?;
    }

    let categories = CategoryRepository::new(pool);
    for (name, max) in [("-66", 66.0), ("-74", 74.0), ("-83", 83.0)] {
        let _ = categories.create_weight(name, Sex::M, None, Some(max)).await;
    }
    let _ = categories.create_weight("+83", Sex::M, Some(83.0), None).await;
    for (name, max) in [("-52", 52.0), ("-57", 57.0), ("-63", 63.0)] {
        let _ = categories.create_weight(name, Sex::F, None, Some(max)).await;
    }
    let _ = categories.create_age("Junior", Some(14), Some(23)).await;
    let _ = categories.create_age("Senior", Some(24), Some(39)).await;
    let _ = categories.create_age("Master", Some(40), None).await;

    let meets = MeetRepository::new(pool);
    if meets.find_by_code("DEMO-2026").await.is_ok() {
        info!("seed: demo meet already present, skipping");
        return Ok(());
    }

    let meet = meets
        .create(
            "DEMO-2026",
            "Demo Regional Meet",
            NaiveDate::from_ymd_opt(2026, 9, 12).expect("valid date"),
            "regional",
            Some("SL-2026"),
            meet_type_id,
        )
        .await?;

    let flights = FlightRepository::new(pool);
    let flight = flights.create_flight(meet.meet_id, "Morning", 1).await?;
    let g1 = flights.create_group(flight.flight_id, "-74 kg", 1).await?;
    let g2 = flights.create_group(flight.flight_id, "-83 kg", 2).await?;

    let athletes = AthleteRepository::new(pool);
    let registrations = RegistrationRepository::new(pool);
    let cat_74 = categories.weight_by_name("-74", Sex::M).await?;
    let cat_83 = categories.weight_by_name("-83", Sex::M).await?;

    let roster = [
        ("MRCBNC95A01F205X", "Marco", "Bianchi", 70.0, 85.0, cat_74.weight_cat_id, g1.group_id, 1),
        ("IVNVRD93B02L219K", "Ivan", "Verdi", 73.5, 90.0, cat_74.weight_cat_id, g1.group_id, 2),
        ("FBACRR91C03H501J", "Fabio", "Carrara", 80.0, 95.0, cat_83.weight_cat_id, g2.group_id, 1),
        ("LCAMRN94D04F839P", "Luca", "Marino", 82.5, 100.0, cat_83.weight_cat_id, g2.group_id, 2),
    ];

    let lift_ids: Vec<i64> = sqlx::query_scalar(
        "SELECT lift_id FROM meet_type_lifts WHERE meet_type_id = ? ORDER BY ord",
    )
    .bind(meet_type_id)
    .fetch_all(pool)
    .await?;

    for (cf, first, last, bodyweight, opener, weight_cat, group_id, start_ord) in roster {
        let athlete = athletes
            .create(cf, first, last, Sex::M, NaiveDate::from_ymd_opt(1993, 5, 20).expect("valid date"))
            .await?;
        let reg = registrations.create(meet.meet_id, athlete.athlete_id).await?;
        registrations
            .weigh_in(reg.registration_id, bodyweight, Some(weight_cat), None, Some("H4"), None)
            .await?;
        for lift_id in &lift_ids {
            registrations
                .set_opener(reg.registration_id, *lift_id, opener)
                .await?;
        }
        flights
            .add_entry(group_id, reg.registration_id, start_ord)
            .await?;
    }

    info!("seed: demo meet DEMO-2026 created");
    Ok(())
}
