//! Stream Relay
//!
//! Re-emits an upstream [`DeltaStream`] as the downstream body of one
//! response. Deltas pass through unchanged and in order, so the downstream
//! body concatenates to exactly the upstream text.
//!
//! # Lifecycle
//!
//! ```text
//!   Open ──(end marker)──▶ Draining ──▶ Closed
//!     │
//!     └──(upstream error | caller drop | cancel)──▶ Aborted
//! ```
//!
//! Entering `Aborted` cancels the upstream request. A mid-stream upstream
//! error is yielded as an `Err` item, which makes the HTTP layer close the
//! connection without a clean end of body; the consumer therefore sees an
//! incomplete stream rather than a false completion.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use futures::Stream;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::backend::DeltaStream;
use crate::error::{RelayError, RelayResult};

/// Hook receiving the accumulated content once the stream closes cleanly
pub type CompletionHook = Box<dyn FnOnce(String) + Send + 'static>;

/// Relay lifecycle state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamState {
    /// Deltas flowing
    Open,
    /// Upstream signalled completion; flushing
    Draining,
    /// Terminal, success
    Closed,
    /// Terminal, caller went away or upstream failed
    Aborted,
}

impl StreamState {
    /// Whether no further items will be produced
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Aborted)
    }
}

/// Bookkeeping for one relayed completion
#[derive(Clone, Debug)]
pub struct StreamSession {
    request_id: String,
    correlation_id: String,
    content: String,
    state: StreamState,
    delta_count: u32,
}

impl StreamSession {
    fn new(correlation_id: String) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            correlation_id,
            content: String::new(),
            state: StreamState::Open,
            delta_count: 0,
        }
    }

    /// Relay-local request id (for logs)
    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Thread or artifact id the stream belongs to
    #[must_use]
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// Everything relayed so far
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Number of deltas relayed
    #[must_use]
    pub fn delta_count(&self) -> u32 {
        self.delta_count
    }
}

/// Downstream stream of relayed deltas
pub struct StreamRelay {
    session: StreamSession,
    upstream: Option<DeltaStream>,
    on_closed: Option<CompletionHook>,
    started: Instant,
}

impl StreamRelay {
    /// Start relaying an upstream stream for a correlation id
    pub fn new(upstream: DeltaStream, correlation_id: impl Into<String>) -> Self {
        let session = StreamSession::new(correlation_id.into());
        debug!(
            request_id = %session.request_id,
            correlation_id = %session.correlation_id,
            "Stream relay opened"
        );
        Self {
            session,
            upstream: Some(upstream),
            on_closed: None,
            started: Instant::now(),
        }
    }

    /// Run `hook` with the full content when the stream reaches `Closed`
    ///
    /// The hook is dropped uncalled if the stream aborts.
    #[must_use]
    pub fn on_closed(mut self, hook: impl FnOnce(String) + Send + 'static) -> Self {
        self.on_closed = Some(Box::new(hook));
        self
    }

    /// Session bookkeeping
    #[must_use]
    pub fn session(&self) -> &StreamSession {
        &self.session
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> StreamState {
        self.session.state
    }

    /// Correlation id to expose to the caller
    #[must_use]
    pub fn correlation_id(&self) -> &str {
        &self.session.correlation_id
    }

    /// Abandon the stream on behalf of the caller
    pub fn cancel(&mut self) {
        if !self.session.state.is_terminal() {
            self.abort(&RelayError::StreamAborted);
        }
    }

    fn close(&mut self) {
        self.session.state = StreamState::Draining;
        // Nothing is buffered between polls, so draining completes at once
        self.upstream = None;
        self.session.state = StreamState::Closed;

        info!(
            request_id = %self.session.request_id,
            correlation_id = %self.session.correlation_id,
            deltas = self.session.delta_count,
            bytes = self.session.content.len(),
            elapsed_ms = duration_ms(self.started.elapsed()),
            "Stream relay closed"
        );

        if let Some(hook) = self.on_closed.take() {
            hook(self.session.content.clone());
        }
    }

    fn abort(&mut self, reason: &RelayError) {
        self.session.state = StreamState::Aborted;
        self.on_closed = None;
        if let Some(mut upstream) = self.upstream.take() {
            upstream.cancel();
        }

        if reason.is_abort() {
            info!(
                request_id = %self.session.request_id,
                correlation_id = %self.session.correlation_id,
                bytes = self.session.content.len(),
                "Stream relay aborted by caller"
            );
        } else {
            warn!(
                request_id = %self.session.request_id,
                correlation_id = %self.session.correlation_id,
                bytes = self.session.content.len(),
                error = %reason,
                "Stream relay aborted by upstream failure"
            );
        }
    }
}

impl Stream for StreamRelay {
    type Item = RelayResult<String>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.session.state != StreamState::Open {
            return Poll::Ready(None);
        }

        let Some(upstream) = this.upstream.as_mut() else {
            this.close();
            return Poll::Ready(None);
        };

        match Pin::new(upstream).poll_next(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(Ok(delta))) => {
                trace!(request_id = %this.session.request_id, len = delta.len(), "relaying delta");
                this.session.content.push_str(&delta);
                this.session.delta_count += 1;
                Poll::Ready(Some(Ok(delta)))
            }
            Poll::Ready(Some(Err(err))) => {
                this.abort(&err);
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(None) => {
                this.close();
                Poll::Ready(None)
            }
        }
    }
}

impl Drop for StreamRelay {
    fn drop(&mut self) {
        if !self.session.state.is_terminal() {
            // Caller disconnected mid-stream
            self.abort(&RelayError::StreamAborted);
        }
    }
}

/// Whole milliseconds, saturating at `u64::MAX`
pub(crate) fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
