//! Delta Streams
//!
//! [`DeltaStream`] is the contract between a backend and the relay: a lazy,
//! finite, non-restartable sequence of text deltas. It wraps the channel fed
//! by the backend's reader task and owns that task, so dropping the stream
//! abandons the upstream request instead of leaving it running.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use super::traits::StreamingToken;
use crate::error::{RelayError, RelayResult};

/// Ordered upstream deltas
pub struct DeltaStream {
    receiver: mpsc::Receiver<StreamingToken>,
    reader: Option<AbortHandle>,
    finished: bool,
}

impl DeltaStream {
    /// Wrap a token channel and the task feeding it
    #[must_use]
    pub fn new(receiver: mpsc::Receiver<StreamingToken>, reader: Option<AbortHandle>) -> Self {
        Self {
            receiver,
            reader,
            finished: false,
        }
    }

    /// A stream that replays a fixed token script
    ///
    /// Useful wherever a backend is not needed (tests, canned responses).
    #[must_use]
    pub fn scripted(tokens: Vec<StreamingToken>) -> Self {
        let (tx, rx) = mpsc::channel(tokens.len().max(1));
        for token in tokens {
            // capacity covers the whole script
            let _ = tx.try_send(token);
        }
        Self::new(rx, None)
    }

    /// A stream of deltas followed by the end marker
    #[must_use]
    pub fn from_deltas<I, S>(deltas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut tokens: Vec<StreamingToken> = deltas
            .into_iter()
            .map(|d| StreamingToken::Token(d.into()))
            .collect();
        tokens.push(StreamingToken::Complete);
        Self::scripted(tokens)
    }

    /// Whether the end marker or an error has been observed
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Abandon the upstream request now
    pub fn cancel(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        self.receiver.close();
        self.finished = true;
    }
}

impl Stream for DeltaStream {
    type Item = RelayResult<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }

        match self.receiver.poll_recv(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(StreamingToken::Token(text))) => Poll::Ready(Some(Ok(text))),
            Poll::Ready(Some(StreamingToken::Complete)) => {
                self.finished = true;
                Poll::Ready(None)
            }
            Poll::Ready(Some(StreamingToken::Error(err))) => {
                self.finished = true;
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(None) => {
                // Reader went away without an end marker
                self.finished = true;
                Poll::Ready(Some(Err(RelayError::upstream(
                    "stream disconnected before completion",
                ))))
            }
        }
    }
}

impl Drop for DeltaStream {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}
