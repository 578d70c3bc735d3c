//! Realtime session broker: tracks judge, director and viewer sessions
//! per meet and fans push events out to the channels each role is
//! entitled to.
//!
//! Delivery is non-blocking per session. A session whose buffer is full
//! is closed rather than served stale state; the client reconnects and
//! reads a fresh snapshot. A slow viewer therefore never holds up judges.

pub mod stream;

use actix_web::web::Bytes;
use std::collections::HashMap;
use std::sync::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use engine::events::{Audience, EventSink, PushEvent};
use engine::JudgeRole;

const DEFAULT_SESSION_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRole {
    Judge { judge_id: i64, role: JudgeRole },
    Director,
    Viewer,
}

impl SessionRole {
    fn receives(&self, audience: Audience) -> bool {
        match audience {
            Audience::Meet => true,
            Audience::Director => matches!(self, SessionRole::Director),
            // Judges stay blind to the running count so they cannot
            // influence each other.
            Audience::DirectorAndViewers => {
                matches!(self, SessionRole::Director | SessionRole::Viewer)
            }
        }
    }
}

struct SessionHandle {
    role: SessionRole,
    tx: mpsc::Sender<Bytes>,
}

/// An open session: keep the sender for priming frames, hand the receiver
/// to the SSE stream.
pub struct Session {
    pub session_id: Uuid,
    pub tx: mpsc::Sender<Bytes>,
    pub rx: mpsc::Receiver<Bytes>,
}

pub struct Broker {
    capacity: usize,
    meets: RwLock<HashMap<i64, HashMap<Uuid, SessionHandle>>>,
}

impl Default for Broker {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_BUFFER)
    }
}

impl Broker {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            meets: RwLock::new(HashMap::new()),
        }
    }

    pub fn subscribe(&self, meet_id: i64, role: SessionRole) -> Session {
        let (tx, rx) = mpsc::channel(self.capacity);
        let session_id = Uuid::new_v4();

        self.meets
            .write()
            .expect("broker registry poisoned")
            .entry(meet_id)
            .or_default()
            .insert(session_id, SessionHandle { role, tx: tx.clone() });

        info!(meet_id, %session_id, ?role, "session joined");
        Session { session_id, tx, rx }
    }

    /// Idempotent: disconnecting twice is fine, and commands already
    /// accepted from the session still complete.
    pub fn unsubscribe(&self, meet_id: i64, session_id: Uuid) {
        let mut meets = self.meets.write().expect("broker registry poisoned");
        if let Some(sessions) = meets.get_mut(&meet_id) {
            if sessions.remove(&session_id).is_some() {
                debug!(meet_id, %session_id, "session left");
            }
            if sessions.is_empty() {
                meets.remove(&meet_id);
            }
        }
    }

    pub fn session_count(&self, meet_id: i64) -> usize {
        self.meets
            .read()
            .expect("broker registry poisoned")
            .get(&meet_id)
            .map_or(0, |sessions| sessions.len())
    }
}

/// Wire framing: one SSE event per push event.
pub fn sse_frame(event: &PushEvent) -> Option<Bytes> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Bytes::from(format!("event: {}\ndata: {}\n\n", event.name(), json))),
        Err(e) => {
            warn!("failed to serialize push event: {e}");
            None
        }
    }
}

impl EventSink for Broker {
    fn publish(&self, meet_id: i64, event: PushEvent) {
        let Some(frame) = sse_frame(&event) else {
            return;
        };
        let audience = event.audience();

        let mut meets = self.meets.write().expect("broker registry poisoned");
        let Some(sessions) = meets.get_mut(&meet_id) else {
            return;
        };

        sessions.retain(|session_id, handle| {
            if !handle.role.receives(audience) {
                return true;
            }
            match handle.tx.try_send(frame.clone()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(meet_id, %session_id, "session cannot keep up, closing");
                    false
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::models::CurrentState;

    fn state_update() -> PushEvent {
        PushEvent::StateUpdate { current: CurrentState::idle() }
    }

    fn queue_update() -> PushEvent {
        PushEvent::QueueUpdate { lift_id: 1, round: 1, queue: vec![] }
    }

    fn vote_progress() -> PushEvent {
        PushEvent::VoteProgress { attempt_id: 42, votes_cast: 2 }
    }

    fn judge() -> SessionRole {
        SessionRole::Judge { judge_id: 1, role: JudgeRole::Head }
    }

    #[tokio::test]
    async fn meet_events_reach_every_role() {
        let broker = Broker::default();
        let mut director = broker.subscribe(1, SessionRole::Director);
        let mut viewer = broker.subscribe(1, SessionRole::Viewer);
        let mut judge = broker.subscribe(1, judge());

        broker.publish(1, state_update());

        assert!(director.rx.try_recv().is_ok());
        assert!(viewer.rx.try_recv().is_ok());
        assert!(judge.rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn queue_updates_are_director_only() {
        let broker = Broker::default();
        let mut director = broker.subscribe(1, SessionRole::Director);
        let mut viewer = broker.subscribe(1, SessionRole::Viewer);
        let mut judge = broker.subscribe(1, judge());

        broker.publish(1, queue_update());

        assert!(director.rx.try_recv().is_ok());
        assert!(viewer.rx.try_recv().is_err());
        assert!(judge.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn vote_progress_never_reaches_judges() {
        let broker = Broker::default();
        let mut director = broker.subscribe(1, SessionRole::Director);
        let mut viewer = broker.subscribe(1, SessionRole::Viewer);
        let mut judge = broker.subscribe(1, judge());

        broker.publish(1, vote_progress());

        assert!(director.rx.try_recv().is_ok());
        assert!(viewer.rx.try_recv().is_ok());
        assert!(judge.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn events_do_not_cross_meets() {
        let broker = Broker::default();
        let mut other_meet = broker.subscribe(2, SessionRole::Viewer);

        broker.publish(1, state_update());
        assert!(other_meet.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn session_with_full_buffer_is_closed() {
        let broker = Broker::new(2);
        let viewer = broker.subscribe(1, SessionRole::Viewer);
        assert_eq!(broker.session_count(1), 1);

        // Nobody drains the receiver: two fit, the third closes it.
        broker.publish(1, state_update());
        broker.publish(1, state_update());
        broker.publish(1, state_update());

        assert_eq!(broker.session_count(1), 0);
        drop(viewer);
    }

    #[tokio::test]
    async fn unsubscribe_is_idempotent() {
        let broker = Broker::default();
        let session = broker.subscribe(1, SessionRole::Viewer);

        broker.unsubscribe(1, session.session_id);
        broker.unsubscribe(1, session.session_id);
        assert_eq!(broker.session_count(1), 0);
    }

    #[test]
    fn frames_carry_event_name_and_json() {
        let frame = sse_frame(&vote_progress()).unwrap();
        let text = std::str::from_utf8(&frame).unwrap();
        assert!(text.starts_with("event: vote.progress\n"));
        assert!(text.contains("\"attempt_id\":42"));
        assert!(text.ends_with("\n\n"));
    }
}
