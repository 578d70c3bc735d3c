//! Archive upload tests against two in-memory databases.

use chrono::NaiveDate;

use storage::models::{AttemptStatus, Sex};
use storage::repository::{
    AthleteRepository, AttemptRepository, CategoryRepository, FlightRepository, MeetRepository,
    RegistrationRepository,
};
use storage::Database;
use sync::{RemoteArchive, SyncError, SyncResolver};

/// Local meet with Fabio (bw 80, CF F1) going 100 kg valid on PU.
async fn local_fixture() -> Database {
    let db = Database::in_memory().await.unwrap();
    db.run_migrations().await.unwrap();
    let pool = db.pool();

    sqlx::query("INSERT INTO lifts (code, name) VALUES ('PU', 'Pull-up')")
        .execute(pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO meet_types (name) VALUES ('Pull-up only')")
        .execute(pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO meet_type_lifts (meet_type_id, lift_id, ord) VALUES (1, 1, 1)")
        .execute(pool)
        .await
        .unwrap();

    let categories = CategoryRepository::new(pool);
    let wc = categories
        .create_weight("-83", Sex::M, None, Some(83.0))
        .await
        .unwrap();
    let ac = categories.create_age("Senior", Some(24), Some(39)).await.unwrap();

    let meet = MeetRepository::new(pool)
        .create(
            "REG-2026-01",
            "Regional Finals",
            NaiveDate::from_ymd_opt(2026, 10, 3).unwrap(),
            "regional",
            None,
            1,
        )
        .await
        .unwrap();

    let athlete = AthleteRepository::new(pool)
        .create("F1", "Fabio", "Carrara", Sex::M, NaiveDate::from_ymd_opt(1991, 3, 3).unwrap())
        .await
        .unwrap();
    let reg = RegistrationRepository::new(pool)
        .create(meet.meet_id, athlete.athlete_id)
        .await
        .unwrap();
    RegistrationRepository::new(pool)
        .weigh_in(reg.registration_id, 80.0, Some(wc.weight_cat_id), Some(ac.age_cat_id), None, None)
        .await
        .unwrap();

    let flights = FlightRepository::new(pool);
    let flight = flights.create_flight(meet.meet_id, "A", 1).await.unwrap();
    let group = flights.create_group(flight.flight_id, "G1", 1).await.unwrap();
    flights.add_entry(group.group_id, reg.registration_id, 1).await.unwrap();

    let attempts = AttemptRepository::new(pool);
    let a1 = attempts.declare(reg.registration_id, 1, 1, 100.0).await.unwrap();
    attempts.finalize(a1.attempt_id, AttemptStatus::Valid).await.unwrap();

    db
}

async fn remote_fixture() -> RemoteArchive {
    let remote = RemoteArchive::in_memory().await.unwrap();
    remote.run_migrations().await.unwrap();
    remote
}

async fn remote_counts(remote: &RemoteArchive, meet_code: &str) -> (i64, i64) {
    let meets: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM meets WHERE code = ?")
        .bind(meet_code)
        .fetch_one(remote.pool())
        .await
        .unwrap();
    let results: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM results WHERE meet_code = ?")
        .bind(meet_code)
        .fetch_one(remote.pool())
        .await
        .unwrap();
    (meets, results)
}

#[tokio::test]
async fn sync_promotes_record_and_writes_result() {
    let local = local_fixture().await;
    let remote = remote_fixture().await;

    // Standing record below Fabio's 100.
    sqlx::query(
        "INSERT INTO records (weight_cat_name, age_cat_name, lift_code,
             weight, bodyweight, athlete_cf, meet_code, record_date)
         VALUES ('-83', 'Senior', 'PU', 95.0, 81.0, 'OLD', 'OLD-2025', '2025-05-05')",
    )
    .execute(remote.pool())
    .await
    .unwrap();

    let report = SyncResolver::new(&local, &remote)
        .sync_meet("REG-2026-01", false)
        .await
        .unwrap();
    assert_eq!(report.athletes_upserted, 1);
    assert_eq!(report.results_written, 1);
    assert_eq!(report.records_promoted, 1);

    let (weight, bodyweight, cf, meet_code): (f64, f64, String, String) = sqlx::query_as(
        "SELECT weight, bodyweight, athlete_cf, meet_code FROM records
         WHERE weight_cat_name = '-83' AND age_cat_name = 'Senior' AND lift_code = 'PU'",
    )
    .fetch_one(remote.pool())
    .await
    .unwrap();
    assert_eq!(weight, 100.0);
    assert_eq!(bodyweight, 80.0);
    assert_eq!(cf, "F1");
    assert_eq!(meet_code, "REG-2026-01");

    let (placement, total): (i64, f64) = sqlx::query_as(
        "SELECT placement, total FROM results WHERE meet_code = 'REG-2026-01' AND athlete_cf = 'F1'",
    )
    .fetch_one(remote.pool())
    .await
    .unwrap();
    assert_eq!(placement, 1);
    assert_eq!(total, 100.0);

    let best: f64 = sqlx::query_scalar(
        "SELECT rl.best_kg FROM result_lifts rl
         JOIN results r ON r.result_id = rl.result_id
         WHERE r.meet_code = 'REG-2026-01' AND rl.lift_code = 'PU'",
    )
    .fetch_one(remote.pool())
    .await
    .unwrap();
    assert_eq!(best, 100.0);
}

#[tokio::test]
async fn equal_or_lower_best_does_not_touch_the_record() {
    let local = local_fixture().await;
    let remote = remote_fixture().await;

    sqlx::query(
        "INSERT INTO records (weight_cat_name, age_cat_name, lift_code,
             weight, bodyweight, athlete_cf, meet_code, record_date)
         VALUES ('-83', 'Senior', 'PU', 100.0, 85.0, 'OLD', 'OLD-2025', '2025-05-05')",
    )
    .execute(remote.pool())
    .await
    .unwrap();

    let report = SyncResolver::new(&local, &remote)
        .sync_meet("REG-2026-01", false)
        .await
        .unwrap();
    assert_eq!(report.records_promoted, 0);

    // Tied at a lower bodyweight still does not promote.
    let cf: String = sqlx::query_scalar(
        "SELECT athlete_cf FROM records WHERE lift_code = 'PU'",
    )
    .fetch_one(remote.pool())
    .await
    .unwrap();
    assert_eq!(cf, "OLD");
}

#[tokio::test]
async fn second_sync_is_rejected_and_changes_nothing() {
    let local = local_fixture().await;
    let remote = remote_fixture().await;
    let resolver = SyncResolver::new(&local, &remote);

    resolver.sync_meet("REG-2026-01", false).await.unwrap();
    let before = remote_counts(&remote, "REG-2026-01").await;

    let err = resolver.sync_meet("REG-2026-01", false).await.unwrap_err();
    assert!(matches!(err, SyncError::AlreadySynced(_)));

    assert_eq!(remote_counts(&remote, "REG-2026-01").await, before);
}

#[tokio::test]
async fn force_replaces_the_archived_meet_without_duplicates() {
    let local = local_fixture().await;
    let remote = remote_fixture().await;
    let resolver = SyncResolver::new(&local, &remote);

    resolver.sync_meet("REG-2026-01", false).await.unwrap();
    resolver.sync_meet("REG-2026-01", true).await.unwrap();

    assert_eq!(remote_counts(&remote, "REG-2026-01").await, (1, 1));
}

#[tokio::test]
async fn unknown_meet_code_fails() {
    let local = local_fixture().await;
    let remote = remote_fixture().await;

    let err = SyncResolver::new(&local, &remote)
        .sync_meet("NOPE-0000", false)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::UnknownMeet(_)));
}
