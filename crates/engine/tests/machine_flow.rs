//! End-to-end competition-flow tests against an in-memory store.

use std::sync::{Arc, Mutex};

use chrono::NaiveDate;

use engine::events::{EventSink, PushEvent};
use engine::machine::StateMachine;
use engine::tally::{JudgeRole, Vote, VoteTally};
use engine::EngineError;
use storage::models::{AttemptStatus, Phase, Sex};
use storage::repository::{
    AthleteRepository, AttemptRepository, FlightRepository, MeetRepository,
    RegistrationRepository,
};
use storage::Database;

#[derive(Default)]
struct RecordingSink(Mutex<Vec<(i64, PushEvent)>>);

impl EventSink for RecordingSink {
    fn publish(&self, meet_id: i64, event: PushEvent) {
        self.0.lock().unwrap().push((meet_id, event));
    }
}

impl RecordingSink {
    fn names(&self) -> Vec<&'static str> {
        self.0.lock().unwrap().iter().map(|(_, e)| e.name()).collect()
    }

    fn events(&self) -> Vec<PushEvent> {
        self.0.lock().unwrap().iter().map(|(_, e)| e.clone()).collect()
    }

    fn drain(&self) {
        self.0.lock().unwrap().clear();
    }
}

struct Fixture {
    db: Database,
    machine: StateMachine,
    sink: Arc<RecordingSink>,
    meet_id: i64,
    flight_id: i64,
    lift_ids: Vec<i64>,
    /// registration ids per group, in start_ord order
    groups: Vec<Vec<i64>>,
}

/// Build a meet with the given lifts and groups. Each athlete is
/// (first_name, bodyweight, opener); a zero opener leaves the athlete
/// without declarations.
async fn fixture(lifts: &[&str], groups: &[&[(&str, f64, f64)]]) -> Fixture {
    let db = Database::in_memory().await.unwrap();
    db.run_migrations().await.unwrap();
    let pool = db.pool();

    sqlx::query("INSERT INTO meet_types (name) VALUES ('Test format')")
        .execute(pool)
        .await
        .unwrap();
    let mut lift_ids = Vec::new();
    for (ord, code) in lifts.iter().enumerate() {
        sqlx::query("INSERT INTO lifts (code, name) VALUES (?, ?)")
            .bind(code)
            .bind(*code)
            .execute(pool)
            .await
            .unwrap();
        let lift_id: i64 = sqlx::query_scalar("SELECT lift_id FROM lifts WHERE code = ?")
            .bind(code)
            .fetch_one(pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO meet_type_lifts (meet_type_id, lift_id, ord) VALUES (1, ?, ?)")
            .bind(lift_id)
            .bind(ord as i64 + 1)
            .execute(pool)
            .await
            .unwrap();
        lift_ids.push(lift_id);
    }

    let meet = MeetRepository::new(pool)
        .create(
            "FLOW-2026",
            "Flow Test",
            NaiveDate::from_ymd_opt(2026, 6, 6).unwrap(),
            "regional",
            None,
            1,
        )
        .await
        .unwrap();
    let flight = FlightRepository::new(pool)
        .create_flight(meet.meet_id, "A", 1)
        .await
        .unwrap();

    let athletes = AthleteRepository::new(pool);
    let registrations = RegistrationRepository::new(pool);
    let flights = FlightRepository::new(pool);

    let mut group_regs = Vec::new();
    let mut cf_counter = 0;
    for (gord, members) in groups.iter().enumerate() {
        let group = flights
            .create_group(flight.flight_id, &format!("G{}", gord + 1), gord as i64 + 1)
            .await
            .unwrap();
        let mut regs = Vec::new();
        for (sord, (name, bodyweight, opener)) in members.iter().enumerate() {
            cf_counter += 1;
            let athlete = athletes
                .create(
                    &format!("CF{cf_counter:03}"),
                    name,
                    "Tester",
                    Sex::M,
                    NaiveDate::from_ymd_opt(1995, 3, 3).unwrap(),
                )
                .await
                .unwrap();
            let reg = registrations
                .create(meet.meet_id, athlete.athlete_id)
                .await
                .unwrap();
            registrations
                .weigh_in(reg.registration_id, *bodyweight, None, None, None, None)
                .await
                .unwrap();
            if *opener > 0.0 {
                for lift_id in &lift_ids {
                    registrations
                        .set_opener(reg.registration_id, *lift_id, *opener)
                        .await
                        .unwrap();
                }
            }
            flights
                .add_entry(group.group_id, reg.registration_id, sord as i64 + 1)
                .await
                .unwrap();
            regs.push(reg.registration_id);
        }
        group_regs.push(regs);
    }

    let sink = Arc::new(RecordingSink::default());
    let machine = StateMachine::new(
        db.clone(),
        Arc::new(VoteTally::new()),
        sink.clone() as Arc<dyn EventSink>,
    );

    Fixture {
        db,
        machine,
        sink,
        meet_id: meet.meet_id,
        flight_id: flight.flight_id,
        lift_ids,
        groups: group_regs,
    }
}

impl Fixture {
    async fn attempt_id(&self, registration_id: i64, lift_id: i64, attempt_no: i16) -> i64 {
        AttemptRepository::new(self.db.pool())
            .attempts_for(registration_id, lift_id)
            .await
            .unwrap()
            .into_iter()
            .find(|a| a.attempt_no == attempt_no)
            .unwrap()
            .attempt_id
    }

    /// Three whites: the attempt passes and is finalized.
    async fn pass(&self, attempt_id: i64) {
        for role in [JudgeRole::Head, JudgeRole::Left, JudgeRole::Right] {
            self.machine
                .cast_vote(self.meet_id, attempt_id, role, Vote::White)
                .await
                .unwrap();
        }
    }
}

#[tokio::test]
async fn initialize_calls_lightest_opener_first() {
    let f = fixture(
        &["MU"],
        &[&[("Marco", 70.0, 85.0), ("Ivan", 75.0, 90.0), ("Fabio", 80.0, 95.0)]],
    )
    .await;

    let state = f
        .machine
        .initialize(f.meet_id, f.flight_id, f.lift_ids[0])
        .await
        .unwrap();

    assert_eq!(state.phase, Phase::Active);
    assert_eq!(state.round, Some(1));
    assert_eq!(state.registration_id, Some(f.groups[0][0])); // Marco
    assert_eq!(f.sink.names(), vec!["state.update", "queue.update"]);
}

#[tokio::test]
async fn initialize_without_openers_is_not_ready() {
    let f = fixture(&["MU"], &[&[("Marco", 70.0, 0.0)]]).await;

    let err = f
        .machine
        .initialize(f.meet_id, f.flight_id, f.lift_ids[0])
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotReady(_)));
}

#[tokio::test]
async fn majority_vote_finalizes_attempt_and_clears_ballot() {
    let f = fixture(&["MU"], &[&[("Marco", 70.0, 85.0)]]).await;
    f.machine
        .initialize(f.meet_id, f.flight_id, f.lift_ids[0])
        .await
        .unwrap();
    f.sink.drain();

    let attempt_id = f.attempt_id(f.groups[0][0], f.lift_ids[0], 1).await;
    f.machine
        .cast_vote(f.meet_id, attempt_id, JudgeRole::Head, Vote::White)
        .await
        .unwrap();
    f.machine
        .cast_vote(f.meet_id, attempt_id, JudgeRole::Left, Vote::White)
        .await
        .unwrap();
    let result = f
        .machine
        .cast_vote(f.meet_id, attempt_id, JudgeRole::Right, Vote::Red)
        .await
        .unwrap();

    assert!(result.complete);
    assert_eq!(result.outcome, Some(AttemptStatus::Valid));

    let attempt = AttemptRepository::new(f.db.pool())
        .find_by_id(attempt_id)
        .await
        .unwrap();
    assert_eq!(attempt.status, AttemptStatus::Valid);
    assert_eq!(f.machine.tally().vote_count(attempt_id), 0);

    let events = f.sink.events();
    let result_event = events
        .iter()
        .find_map(|e| match e {
            PushEvent::AttemptResult { attempt_id: id, outcome, votes } => {
                Some((*id, *outcome, votes.clone()))
            }
            _ => None,
        })
        .expect("attempt.result was broadcast");
    assert_eq!(result_event.0, attempt_id);
    assert_eq!(result_event.1, AttemptStatus::Valid);
    assert_eq!(result_event.2.get(&JudgeRole::Head), Some(&Vote::White));
    assert_eq!(result_event.2.get(&JudgeRole::Right), Some(&Vote::Red));
    assert!(events.iter().any(|e| matches!(e, PushEvent::RankingUpdate { .. })));
}

#[tokio::test]
async fn voting_on_a_judged_attempt_is_a_conflict() {
    let f = fixture(&["MU"], &[&[("Marco", 70.0, 85.0)]]).await;
    f.machine
        .initialize(f.meet_id, f.flight_id, f.lift_ids[0])
        .await
        .unwrap();

    let attempt_id = f.attempt_id(f.groups[0][0], f.lift_ids[0], 1).await;
    f.pass(attempt_id).await;

    let err = f
        .machine
        .cast_vote(f.meet_id, attempt_id, JudgeRole::Head, Vote::Red)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::StateConflict(_)));
}

#[tokio::test]
async fn single_athlete_meet_finishes_after_three_rounds() {
    let f = fixture(&["MU"], &[&[("Marco", 70.0, 85.0)]]).await;
    let reg = f.groups[0][0];
    let lift = f.lift_ids[0];
    f.machine.initialize(f.meet_id, f.flight_id, lift).await.unwrap();

    for round in 1..=3i16 {
        let attempt_id = f.attempt_id(reg, lift, round).await;
        f.pass(attempt_id).await;
        if round < 3 {
            f.machine
                .declare_weight(f.meet_id, reg, lift, round + 1, 85.0 + round as f64 * 5.0)
                .await
                .unwrap();
        }
        let state = f.machine.next(f.meet_id).await.unwrap();
        if round < 3 {
            assert_eq!(state.phase, Phase::Active);
            assert_eq!(state.round, Some(round as i64 + 1));
            assert_eq!(state.registration_id, Some(reg));
        } else {
            assert_eq!(state.phase, Phase::Finished);
            assert!(state.registration_id.is_none());
        }
    }

    assert!(f
        .sink
        .events()
        .iter()
        .any(|e| matches!(e, PushEvent::MeetFinished { .. })));

    // NEXT after completion is a no-op.
    let state = f.machine.next(f.meet_id).await.unwrap();
    assert_eq!(state.phase, Phase::Finished);
}

#[tokio::test]
async fn next_advances_to_next_group_same_lift() {
    let f = fixture(
        &["MU"],
        &[
            &[("Marco", 70.0, 85.0), ("Ivan", 75.0, 90.0), ("Fabio", 80.0, 95.0)],
            &[("Luca", 81.0, 97.5), ("Paolo", 79.0, 92.5), ("Dario", 83.0, 100.0)],
        ],
    )
    .await;
    let lift = f.lift_ids[0];
    f.machine.initialize(f.meet_id, f.flight_id, lift).await.unwrap();

    // G1 takes round 1 in opener order; no later declarations, so rounds
    // 2 and 3 defer everyone and the flight moves on to G2.
    for reg in &f.groups[0] {
        let attempt_id = f.attempt_id(*reg, lift, 1).await;
        f.pass(attempt_id).await;
        f.machine.next(f.meet_id).await.unwrap();
    }

    let state = f.machine.current().await.unwrap();
    assert_eq!(state.phase, Phase::BetweenGroups);
    assert_eq!(state.round, Some(1));
    assert_eq!(state.lift_id, Some(lift));
    // Paolo has the lightest opener of G2.
    assert_eq!(state.registration_id, Some(f.groups[1][1]));
}

#[tokio::test]
async fn next_advances_to_next_lift_after_last_group() {
    let f = fixture(&["MU", "PU"], &[&[("Marco", 70.0, 85.0)]]).await;
    let reg = f.groups[0][0];
    f.machine.initialize(f.meet_id, f.flight_id, f.lift_ids[0]).await.unwrap();

    let attempt_id = f.attempt_id(reg, f.lift_ids[0], 1).await;
    f.pass(attempt_id).await;
    let state = f.machine.next(f.meet_id).await.unwrap();

    // Rounds 2-3 of MU deferred, no further group: the meet moves to PU.
    assert_eq!(state.lift_id, Some(f.lift_ids[1]));
    assert_eq!(state.round, Some(1));
    assert_eq!(state.phase, Phase::BetweenGroups);
    assert_eq!(state.registration_id, Some(reg));
}

#[tokio::test]
async fn declaration_into_live_round_republishes_queue() {
    let f = fixture(
        &["MU"],
        &[&[("Marco", 70.0, 85.0), ("Ivan", 75.0, 90.0)]],
    )
    .await;
    let lift = f.lift_ids[0];
    f.machine.initialize(f.meet_id, f.flight_id, lift).await.unwrap();
    f.sink.drain();

    // Ivan drops his opener below Marco's: he is now up first.
    f.machine
        .declare_weight(f.meet_id, f.groups[0][1], lift, 1, 82.5)
        .await
        .unwrap();

    let events = f.sink.events();
    assert_eq!(events[0].name(), "weight.updated");
    let queue = events
        .iter()
        .find_map(|e| match e {
            PushEvent::QueueUpdate { queue, .. } => Some(queue.clone()),
            _ => None,
        })
        .expect("queue.update follows a live-round declaration");
    assert_eq!(queue[0].registration_id, f.groups[0][1]);
}

#[tokio::test]
async fn next_in_idle_is_a_conflict() {
    let f = fixture(&["MU"], &[&[("Marco", 70.0, 85.0)]]).await;
    let err = f.machine.next(f.meet_id).await.unwrap_err();
    assert!(matches!(err, EngineError::StateConflict(_)));
}

#[tokio::test]
async fn timer_round_trip() {
    let f = fixture(&["MU"], &[&[("Marco", 70.0, 85.0)]]).await;

    let err = f.machine.timer_start(f.meet_id, 60).await.unwrap_err();
    assert!(matches!(err, EngineError::StateConflict(_)));

    f.machine.initialize(f.meet_id, f.flight_id, f.lift_ids[0]).await.unwrap();
    let state = f.machine.timer_start(f.meet_id, 60).await.unwrap();
    assert_eq!(state.timer_duration_s, Some(60));
    assert!(state.timer_started_at.is_some());

    let state = f.machine.timer_stop(f.meet_id).await.unwrap();
    assert!(state.timer_started_at.is_none());

    let names = f.sink.names();
    assert!(names.contains(&"timer.started"));
    assert!(names.contains(&"timer.stopped"));
}

#[tokio::test]
async fn reset_returns_to_idle() {
    let f = fixture(&["MU"], &[&[("Marco", 70.0, 85.0)]]).await;
    f.machine.initialize(f.meet_id, f.flight_id, f.lift_ids[0]).await.unwrap();

    let state = f.machine.reset(f.meet_id).await.unwrap();
    assert_eq!(state.phase, Phase::Idle);
    assert!(state.meet_id.is_none());

    let err = f.machine.next(f.meet_id).await.unwrap_err();
    assert!(matches!(err, EngineError::StateConflict(_)));
}
