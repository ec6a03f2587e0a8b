//! Stream Consumer
//!
//! Reads a relay body to the end, decoding incrementally and publishing the
//! whole accumulated text through the [`PublishScheduler`]. Once the body ends
//! the final text is published one more time regardless of what the scheduler
//! already holds, then returned for the caller to commit.

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use relay_core::RelayResult;

use crate::client::ByteStream;
use crate::decoder::Utf8StreamDecoder;
use crate::scheduler::PublishScheduler;

/// How a consumed stream ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// Body ended cleanly; holds the full text
    Completed(String),
    /// Caller cancelled; holds whatever arrived first (not to be committed)
    Cancelled(String),
}

impl ConsumeOutcome {
    /// Text regardless of outcome
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Completed(text) | Self::Cancelled(text) => text,
        }
    }

    /// Whether the stream ran to completion
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// Read `stream` until it ends, fails or `cancel` fires
///
/// A transport error mid-body is returned as-is; partial text is discarded.
/// Cancelling drops the stream, which releases the connection.
pub async fn consume(
    mut stream: ByteStream,
    scheduler: &PublishScheduler,
    cancel: &CancellationToken,
) -> RelayResult<ConsumeOutcome> {
    let mut decoder = Utf8StreamDecoder::new();
    let mut buffer = String::new();
    let mut chunks = 0usize;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!(chunks, bytes = buffer.len(), "Stream cancelled");
                return Ok(ConsumeOutcome::Cancelled(buffer));
            }
            next = stream.next() => match next {
                Some(Ok(chunk)) => {
                    chunks += 1;
                    let text = decoder.decode(&chunk);
                    if !text.is_empty() {
                        buffer.push_str(&text);
                        scheduler.publish(buffer.clone());
                    }
                }
                Some(Err(err)) => {
                    debug!(chunks, error = %err, "Stream failed");
                    return Err(err);
                }
                None => break,
            }
        }
    }

    buffer.push_str(&decoder.finish());
    scheduler.publish(buffer.clone());
    debug!(chunks, bytes = buffer.len(), "Stream complete");
    Ok(ConsumeOutcome::Completed(buffer))
}
