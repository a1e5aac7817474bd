//! Per-job progress stream.
//!
//! Each connection registers one listener on the event bus and receives
//! newline-delimited JSON records. The latest known record is replayed first
//! when the job already has one. The stream stays open across pause/resume
//! cycles; the listener is released when the client goes away.
//!
//! A client that reads slower than records arrive loses intermediate
//! `progress` records, never terminal ones. Idle streams get an empty line
//! every [`HEARTBEAT_INTERVAL`] so a dead connection is noticed on write.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use std::time::Duration;

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures::task::AtomicWaker;
use futures::Stream;
use parking_lot::Mutex;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::debug;

use chaptergrab_core::{listener, JobKey, ListenerError, ProgressRecord, Subscription};

use super::downloads::IdentifierParams;
use super::{api_error, ApiError};
use crate::metrics::{PROGRESS_RECORDS_DROPPED, PROGRESS_STREAMS_ACTIVE, PROGRESS_STREAMS_TOTAL};
use crate::state::AppState;

/// Records buffered per connection before progress records are skipped.
const STREAM_BUFFER: usize = 64;

/// Keep-alive period for streams with nothing to send.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// GET /api/v1/downloads/progress?identifier=
pub async fn progress_stream(
    State(state): State<Arc<AppState>>,
    Query(params): Query<IdentifierParams>,
) -> Result<Response, ApiError> {
    let key = JobKey::parse(&params.identifier)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;

    let outbox = Arc::new(Outbox::new(STREAM_BUFFER));
    let sink = Arc::downgrade(&outbox);
    let (snapshot, subscription) = state.registry().subscribe(
        &key,
        listener(move |record| deliver(&sink, record)),
    );
    debug!(key = %key, replay = snapshot.is_some(), "Progress stream opened");

    let stream = ProgressStream::new(snapshot, outbox, subscription, HEARTBEAT_INTERVAL);
    let mut response = Body::from_stream(stream).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/x-ndjson"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    Ok(response)
}

fn deliver(sink: &Weak<Outbox>, record: &ProgressRecord) -> Result<(), ListenerError> {
    let outbox = sink.upgrade().ok_or(ListenerError::Disconnected)?;
    outbox.push(record.clone());
    Ok(())
}

/// Bounded per-connection queue between the bus and the response body.
struct Outbox {
    queue: Mutex<VecDeque<ProgressRecord>>,
    waker: AtomicWaker,
    capacity: usize,
}

impl Outbox {
    fn new(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            waker: AtomicWaker::new(),
            capacity,
        }
    }

    /// Queues a record. When full, the oldest queued `progress` record makes
    /// room; terminal records are always kept.
    fn push(&self, record: ProgressRecord) {
        {
            let mut queue = self.queue.lock();
            if queue.len() >= self.capacity {
                match queue.iter().position(|r| !r.is_terminal()) {
                    Some(oldest) => {
                        queue.remove(oldest);
                        PROGRESS_RECORDS_DROPPED.inc();
                    }
                    None if !record.is_terminal() => {
                        PROGRESS_RECORDS_DROPPED.inc();
                        return;
                    }
                    None => {}
                }
            }
            queue.push_back(record);
        }
        self.waker.wake();
    }

    fn pop(&self) -> Option<ProgressRecord> {
        self.queue.lock().pop_front()
    }

    fn len(&self) -> usize {
        self.queue.lock().len()
    }
}

/// Body stream for one connection. Dropping it (client disconnect) drops the
/// subscription.
struct ProgressStream {
    pending: Option<ProgressRecord>,
    outbox: Arc<Outbox>,
    heartbeat: Interval,
    subscription: Subscription,
}

impl ProgressStream {
    fn new(
        snapshot: Option<ProgressRecord>,
        outbox: Arc<Outbox>,
        subscription: Subscription,
        heartbeat: Duration,
    ) -> Self {
        PROGRESS_STREAMS_ACTIVE.inc();
        PROGRESS_STREAMS_TOTAL.inc();
        let mut heartbeat = interval_at(Instant::now() + heartbeat, heartbeat);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            pending: snapshot,
            outbox,
            heartbeat,
            subscription,
        }
    }
}

fn encode(record: &ProgressRecord) -> Result<Bytes, serde_json::Error> {
    let mut line = serde_json::to_vec(record)?;
    line.push(b'\n');
    Ok(Bytes::from(line))
}

impl Stream for ProgressStream {
    type Item = Result<Bytes, serde_json::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if let Some(record) = self.pending.take() {
            return Poll::Ready(Some(encode(&record)));
        }

        // registered before popping: a push in between wakes this task
        self.outbox.waker.register(cx.waker());
        if let Some(record) = self.outbox.pop() {
            self.heartbeat.reset();
            return Poll::Ready(Some(encode(&record)));
        }

        match self.heartbeat.poll_tick(cx) {
            Poll::Ready(_) => Poll::Ready(Some(Ok(Bytes::from_static(b"\n")))),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for ProgressStream {
    fn drop(&mut self) {
        PROGRESS_STREAMS_ACTIVE.dec();
        debug!(key = %self.subscription.key(), "Progress stream closed");
    }
}
