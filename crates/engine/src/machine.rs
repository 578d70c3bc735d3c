//! The attempt state machine: owner of the persisted CurrentState
//! singleton and the only writer of competition flow.
//!
//! Commands for the same meet execute in a total order behind a per-meet
//! lock; commands for different meets run in parallel. Every command
//! publishes its effects through the [`EventSink`] port in a fixed order:
//! state-update, then queue-update, then ranking-update.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use storage::error::StorageError;
use storage::models::{Attempt, AttemptStatus, CurrentState, Phase};
use storage::repository::{
    AttemptRepository, CurrentStateRepository, FlightRepository, MeetRepository,
    RegistrationRepository,
};
use storage::Database;

use crate::error::{EngineError, Result};
use crate::events::{EventSink, PushEvent};
use crate::ordering::{self, QueueEntry};
use crate::ranking;
use crate::tally::{JudgeRole, TallyResult, Vote, VoteTally};

const TRANSIENT_RETRIES: usize = 3;

pub struct StateMachine {
    db: Database,
    tally: Arc<VoteTally>,
    sink: Arc<dyn EventSink>,
    locks: Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>,
}

impl StateMachine {
    pub fn new(db: Database, tally: Arc<VoteTally>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            db,
            tally,
            sink,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn tally(&self) -> &Arc<VoteTally> {
        &self.tally
    }

    fn meet_lock(&self, meet_id: i64) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .lock()
            .expect("meet lock registry poisoned")
            .entry(meet_id)
            .or_default()
            .clone()
    }

    pub async fn current(&self) -> Result<CurrentState> {
        Ok(CurrentStateRepository::new(self.db.pool()).get().await?)
    }

    /// Queue snapshot for the live (group, lift, round), empty when idle.
    pub async fn current_queue(&self) -> Result<Vec<QueueEntry>> {
        let state = self.current().await?;
        match (state.group_id, state.lift_id, state.round) {
            (Some(group_id), Some(lift_id), Some(round)) => {
                ordering::queue_for(&self.db, group_id, lift_id, round as i16).await
            }
            _ => Ok(Vec::new()),
        }
    }

    /// Put the first athlete of the flight's first group on the platform.
    pub async fn initialize(&self, meet_id: i64, flight_id: i64, lift_id: i64) -> Result<CurrentState> {
        let lock = self.meet_lock(meet_id);
        let _guard = lock.lock().await;

        let meet = MeetRepository::new(self.db.pool()).find_by_id(meet_id).await?;
        let flight = FlightRepository::new(self.db.pool()).find_flight(flight_id).await?;
        if flight.meet_id != meet_id {
            return Err(EngineError::BadInput(format!(
                "flight {flight_id} does not belong to meet {}",
                meet.code
            )));
        }
        let lifts = MeetRepository::new(self.db.pool()).lift_sequence(meet_id).await?;
        if !lifts.iter().any(|l| l.lift_id == lift_id) {
            return Err(EngineError::BadInput(format!(
                "lift {lift_id} is not part of the meet-type for {}",
                meet.code
            )));
        }

        let group = FlightRepository::new(self.db.pool())
            .first_group(flight_id)
            .await?
            .ok_or_else(|| EngineError::NotReady("flight has no groups".into()))?;

        let queue = ordering::queue_for(&self.db, group.group_id, lift_id, 1).await?;
        let first = queue.first().ok_or_else(|| {
            EngineError::NotReady("first group has no entries with declared openers".into())
        })?;

        let state = CurrentState {
            phase: Phase::Active,
            meet_id: Some(meet_id),
            flight_id: Some(flight_id),
            group_id: Some(group.group_id),
            lift_id: Some(lift_id),
            round: Some(1),
            registration_id: Some(first.registration_id),
            timer_started_at: None,
            timer_duration_s: None,
        };
        self.save(&state).await?;

        info!(meet = %meet.code, flight = %flight.name, "meet initialized");
        self.sink.publish(meet_id, PushEvent::StateUpdate { current: state.clone() });
        self.sink.publish(
            meet_id,
            PushEvent::QueueUpdate { lift_id, round: 1, queue },
        );

        Ok(state)
    }

    /// Record a declared weight. Legal while another athlete is live:
    /// round r+1 declarations come in during round r.
    pub async fn declare_weight(
        &self,
        meet_id: i64,
        registration_id: i64,
        lift_id: i64,
        attempt_no: i16,
        weight_kg: f64,
    ) -> Result<Attempt> {
        let lock = self.meet_lock(meet_id);
        let _guard = lock.lock().await;

        let registration = RegistrationRepository::new(self.db.pool())
            .find_by_id(registration_id)
            .await?;
        if registration.meet_id != meet_id {
            return Err(EngineError::BadInput(format!(
                "registration {registration_id} does not belong to meet {meet_id}"
            )));
        }

        let db = self.db.clone();
        let attempt = with_retries(move || {
            let db = db.clone();
            async move {
                AttemptRepository::new(db.pool())
                    .declare(registration_id, lift_id, attempt_no, weight_kg)
                    .await
            }
        })
        .await?;

        self.sink.publish(
            meet_id,
            PushEvent::WeightUpdated { registration_id, lift_id, attempt_no, weight_kg },
        );

        // A declaration into the live round reshuffles the platform order.
        let state = self.current().await?;
        if state.meet_id == Some(meet_id)
            && state.lift_id == Some(lift_id)
            && state.round == Some(attempt_no as i64)
        {
            if let Some(group_id) = state.group_id {
                let queue = ordering::queue_for(&self.db, group_id, lift_id, attempt_no).await?;
                self.sink.publish(
                    meet_id,
                    PushEvent::QueueUpdate { lift_id, round: attempt_no as i64, queue },
                );
            }
        }

        Ok(attempt)
    }

    /// Register one judge's vote; a completed ballot finalizes the attempt.
    pub async fn cast_vote(
        &self,
        meet_id: i64,
        attempt_id: i64,
        role: JudgeRole,
        vote: Vote,
    ) -> Result<TallyResult> {
        let lock = self.meet_lock(meet_id);
        let _guard = lock.lock().await;

        let attempt = AttemptRepository::new(self.db.pool()).find_by_id(attempt_id).await?;
        self.ensure_attempt_in_meet(&attempt, meet_id).await?;
        if attempt.status != AttemptStatus::Pending {
            return Err(EngineError::StateConflict(format!(
                "attempt {attempt_id} is already judged"
            )));
        }

        let result = self.tally.register_vote(attempt_id, role, vote);
        self.sink.publish(
            meet_id,
            PushEvent::VoteProgress { attempt_id, votes_cast: result.snapshot.len() },
        );

        if let Some(outcome) = result.outcome {
            self.finalize_locked(meet_id, attempt_id, outcome, result.snapshot.clone())
                .await?;
        }

        Ok(result)
    }

    /// Persist a completed ballot's outcome. Never advances the platform;
    /// that stays on the director's NEXT.
    pub async fn finalize_from_tally(
        &self,
        meet_id: i64,
        attempt_id: i64,
        outcome: AttemptStatus,
        votes: BTreeMap<JudgeRole, Vote>,
    ) -> Result<Attempt> {
        let lock = self.meet_lock(meet_id);
        let _guard = lock.lock().await;
        self.finalize_locked(meet_id, attempt_id, outcome, votes).await
    }

    async fn finalize_locked(
        &self,
        meet_id: i64,
        attempt_id: i64,
        outcome: AttemptStatus,
        votes: BTreeMap<JudgeRole, Vote>,
    ) -> Result<Attempt> {
        let db = self.db.clone();
        let attempt = with_retries(move || {
            let db = db.clone();
            async move { AttemptRepository::new(db.pool()).finalize(attempt_id, outcome).await }
        })
        .await?;
        self.tally.clear(attempt_id);

        self.sink.publish(
            meet_id,
            PushEvent::AttemptResult { attempt_id, outcome, votes },
        );

        let rankings = ranking::rankings_for(&self.db, meet_id).await?;
        self.sink.publish(meet_id, PushEvent::RankingUpdate { rankings });

        Ok(attempt)
    }

    /// Advance the current-registration pointer.
    ///
    /// Retries the queue at the current round, then later rounds of the
    /// group, then the flight's next group (round 1, same lift), then the
    /// next lift of the meet-type (first group, round 1). When everything
    /// is exhausted the flight is finished.
    pub async fn next(&self, meet_id: i64) -> Result<CurrentState> {
        let lock = self.meet_lock(meet_id);
        let _guard = lock.lock().await;

        let mut state = self.current().await?;
        match state.phase {
            Phase::Idle => {
                return Err(EngineError::StateConflict("no meet is initialized".into()));
            }
            // Retried NEXT after completion is harmless.
            Phase::Finished => return Ok(state),
            Phase::Active | Phase::BetweenGroups => {}
        }
        if state.meet_id != Some(meet_id) {
            return Err(EngineError::StateConflict(
                "another meet is on the platform".into(),
            ));
        }

        let flight_id = pointer(state.flight_id, "flight")?;
        let start_group = pointer(state.group_id, "group")?;
        let start_lift = pointer(state.lift_id, "lift")?;
        let mut round = pointer(state.round, "round")? as i16;

        let flights = FlightRepository::new(self.db.pool());
        let mut group = flights.find_group(start_group).await?;
        let mut lift_id = start_lift;
        let lifts = MeetRepository::new(self.db.pool()).lift_sequence(meet_id).await?;

        loop {
            let queue = ordering::queue_for(&self.db, group.group_id, lift_id, round).await?;
            if let Some(first) = queue.first() {
                let crossed_boundary = group.group_id != start_group || lift_id != start_lift;
                state.phase = if crossed_boundary {
                    Phase::BetweenGroups
                } else {
                    Phase::Active
                };
                state.group_id = Some(group.group_id);
                state.lift_id = Some(lift_id);
                state.round = Some(round as i64);
                state.registration_id = Some(first.registration_id);
                state.timer_started_at = None;
                state.timer_duration_s = None;
                self.save(&state).await?;

                self.sink.publish(meet_id, PushEvent::StateUpdate { current: state.clone() });
                self.sink.publish(
                    meet_id,
                    PushEvent::QueueUpdate { lift_id, round: round as i64, queue },
                );
                return Ok(state);
            }

            if round < 3 {
                round += 1;
                continue;
            }

            if let Some(next_group) = flights.group_after(flight_id, group.ord).await? {
                group = next_group;
                round = 1;
                continue;
            }

            let position = lifts
                .iter()
                .position(|l| l.lift_id == lift_id)
                .ok_or_else(|| EngineError::Fatal("current lift left the meet-type".into()))?;
            if let Some(next_lift) = lifts.get(position + 1) {
                lift_id = next_lift.lift_id;
                group = flights
                    .first_group(flight_id)
                    .await?
                    .ok_or_else(|| EngineError::Fatal("flight lost its groups".into()))?;
                round = 1;
                continue;
            }

            state.phase = Phase::Finished;
            state.group_id = None;
            state.lift_id = None;
            state.round = None;
            state.registration_id = None;
            state.timer_started_at = None;
            state.timer_duration_s = None;
            self.save(&state).await?;

            info!(meet_id, "flight complete");
            self.sink.publish(meet_id, PushEvent::StateUpdate { current: state.clone() });
            self.sink.publish(
                meet_id,
                PushEvent::MeetFinished { reason: "flight complete".into() },
            );
            return Ok(state);
        }
    }

    pub async fn timer_start(&self, meet_id: i64, duration_s: i64) -> Result<CurrentState> {
        if duration_s <= 0 {
            return Err(EngineError::BadInput("timer duration must be positive".into()));
        }
        let lock = self.meet_lock(meet_id);
        let _guard = lock.lock().await;

        let mut state = self.active_state(meet_id).await?;
        let start_ts = Utc::now();
        state.timer_started_at = Some(start_ts);
        state.timer_duration_s = Some(duration_s);
        self.save(&state).await?;

        self.sink.publish(meet_id, PushEvent::TimerStarted { start_ts, duration_s });
        Ok(state)
    }

    pub async fn timer_stop(&self, meet_id: i64) -> Result<CurrentState> {
        let lock = self.meet_lock(meet_id);
        let _guard = lock.lock().await;

        let mut state = self.active_state(meet_id).await?;
        state.timer_started_at = None;
        state.timer_duration_s = None;
        self.save(&state).await?;

        self.sink.publish(meet_id, PushEvent::TimerStopped);
        Ok(state)
    }

    /// Operator recovery hatch: back to IDLE, ballots dropped.
    pub async fn reset(&self, meet_id: i64) -> Result<CurrentState> {
        let lock = self.meet_lock(meet_id);
        let _guard = lock.lock().await;

        let state = CurrentState::idle();
        self.save(&state).await?;
        self.tally.clear_all();

        warn!(meet_id, "state machine reset to idle");
        self.sink.publish(meet_id, PushEvent::StateUpdate { current: state.clone() });
        Ok(state)
    }

    async fn active_state(&self, meet_id: i64) -> Result<CurrentState> {
        let state = self.current().await?;
        if state.phase == Phase::Idle {
            return Err(EngineError::StateConflict("no meet is initialized".into()));
        }
        if state.meet_id != Some(meet_id) {
            return Err(EngineError::StateConflict(
                "another meet is on the platform".into(),
            ));
        }
        Ok(state)
    }

    async fn ensure_attempt_in_meet(&self, attempt: &Attempt, meet_id: i64) -> Result<()> {
        let registration = RegistrationRepository::new(self.db.pool())
            .find_by_id(attempt.registration_id)
            .await?;
        if registration.meet_id != meet_id {
            return Err(EngineError::BadInput(format!(
                "attempt {} does not belong to meet {meet_id}",
                attempt.attempt_id
            )));
        }
        Ok(())
    }

    async fn save(&self, state: &CurrentState) -> Result<()> {
        let db = self.db.clone();
        let state = state.clone();
        with_retries(move || {
            let db = db.clone();
            let state = state.clone();
            async move { CurrentStateRepository::new(db.pool()).save(&state).await }
        })
        .await
    }
}

fn pointer<T>(value: Option<T>, what: &str) -> Result<T> {
    value.ok_or_else(|| EngineError::Fatal(format!("current_state is missing its {what} pointer")))
}

/// Retry busy-database failures a few times before surfacing Transient.
async fn with_retries<T, F, Fut>(mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, StorageError>>,
{
    let mut delay = Duration::from_millis(20);
    let mut last: Option<StorageError> = None;
    for _ in 0..TRANSIENT_RETRIES {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_busy() => {
                last = Some(e);
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(EngineError::Transient(
        last.map(|e| e.to_string()).unwrap_or_else(|| "database busy".into()),
    ))
}
