//! SSE body stream for one session, with keep-alive comments and
//! deregistration on drop.

use actix_web::web::Bytes;
use futures::Stream;
use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Interval;
use uuid::Uuid;

use super::Broker;

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

pub struct SessionStream {
    broker: Arc<Broker>,
    meet_id: i64,
    session_id: Uuid,
    rx: mpsc::Receiver<Bytes>,
    keep_alive: Interval,
}

impl SessionStream {
    pub fn new(broker: Arc<Broker>, meet_id: i64, session_id: Uuid, rx: mpsc::Receiver<Bytes>) -> Self {
        Self {
            broker,
            meet_id,
            session_id,
            rx,
            keep_alive: tokio::time::interval(KEEP_ALIVE_INTERVAL),
        }
    }
}

impl Stream for SessionStream {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        match this.rx.poll_recv(cx) {
            Poll::Ready(Some(frame)) => return Poll::Ready(Some(Ok(frame))),
            // Sender dropped: the broker closed us (backpressure) or shut
            // down. Ending the stream tells the client to reconnect.
            Poll::Ready(None) => return Poll::Ready(None),
            Poll::Pending => {}
        }

        if this.keep_alive.poll_tick(cx).is_ready() {
            return Poll::Ready(Some(Ok(Bytes::from_static(b": keep-alive\n\n"))));
        }

        Poll::Pending
    }
}

impl Drop for SessionStream {
    fn drop(&mut self) {
        self.broker.unsubscribe(self.meet_id, self.session_id);
    }
}
