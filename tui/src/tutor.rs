//! Tutor Session
//!
//! Owns the client-side conversation: validates and appends user turns,
//! streams the reply through the relay, commits the finished reply as one
//! assistant turn and keeps durable state in step.
//!
//! Sending is split in three so the UI can run the stream on its own task:
//!
//! ```text
//! begin_send ──► stream_reply (any task) ──► finish_send
//! ```

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use relay_core::{Conversation, RelayError, RelayResult, ResponseId, ThreadId, Turn};

use crate::client::RelayClient;
use crate::consumer::{consume, ConsumeOutcome};
use crate::scheduler::PublishScheduler;
use crate::store::StateStore;

/// A user turn that has been appended and is waiting for its reply
#[derive(Clone, Debug)]
pub struct PendingTurn {
    /// The user's turn as appended
    pub prompt: Turn,
    /// Thread the turn belongs to
    pub thread_id: ThreadId,
    /// Id of the requested reply
    pub response_id: ResponseId,
    /// Fires when the reply should be abandoned
    pub cancel: CancellationToken,
}

/// Stream the reply to `pending` into `scheduler`
pub async fn stream_reply(
    client: &RelayClient,
    pending: &PendingTurn,
    scheduler: &PublishScheduler,
) -> RelayResult<ConsumeOutcome> {
    // Dropping the request future releases its connection
    let body = tokio::select! {
        biased;
        () = pending.cancel.cancelled() => {
            debug!(response_id = %pending.response_id, "Reply cancelled before the relay answered");
            return Ok(ConsumeOutcome::Cancelled(String::new()));
        }
        body = client.chat(&pending.prompt, &pending.thread_id, &pending.response_id) => body?,
    };
    if let Some(id) = body.correlation_id.as_deref() {
        if id != pending.thread_id.as_str() {
            warn!(expected = %pending.thread_id, received = id, "Relay answered on another thread");
        }
    }
    consume(body.stream, scheduler, &pending.cancel).await
}

/// Client-side tutor conversation
#[derive(Debug)]
pub struct TutorSession {
    conversation: Conversation,
    store: StateStore,
    client: RelayClient,
    in_flight: Option<(ResponseId, CancellationToken)>,
}

impl TutorSession {
    /// Resume the saved conversation, or start a fresh one
    pub async fn load(store: StateStore, client: RelayClient) -> Self {
        let conversation = match store.load().await {
            Some(state) => {
                info!(turns = state.messages.len(), thread_id = %state.thread_id, "Resumed conversation");
                Conversation::from_persisted(state)
            }
            None => Conversation::new(),
        };
        Self {
            conversation,
            store,
            client,
            in_flight: None,
        }
    }

    /// Current conversation
    #[must_use]
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Relay client
    #[must_use]
    pub fn client(&self) -> &RelayClient {
        &self.client
    }

    /// Whether a reply is streaming
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Whether `response_id` is the reply currently awaited
    #[must_use]
    pub fn is_awaiting(&self, response_id: &ResponseId) -> bool {
        self.in_flight.as_ref().is_some_and(|(id, _)| id == response_id)
    }

    /// Append the user's turn and prepare the reply request
    ///
    /// Refused while another reply is streaming. Input is trimmed; blank input
    /// is a validation error and nothing is appended.
    pub async fn begin_send(&mut self, input: &str) -> RelayResult<PendingTurn> {
        if self.in_flight.is_some() {
            return Err(RelayError::validation("a response is still streaming"));
        }

        let prompt = self.conversation.add_user_turn(input)?.clone();
        self.persist().await;

        let cancel = CancellationToken::new();
        let response_id = ResponseId::new();
        self.in_flight = Some((response_id.clone(), cancel.clone()));
        debug!(turn_id = %prompt.id(), response_id = %response_id, "User turn appended");

        Ok(PendingTurn {
            prompt,
            thread_id: self.conversation.thread_id().clone(),
            response_id,
            cancel,
        })
    }

    /// Record how the reply ended
    ///
    /// A completed reply becomes exactly one assistant turn. Cancelled or
    /// failed replies leave the conversation as it was after `begin_send`.
    /// Outcomes for anything but the awaited reply are ignored.
    pub async fn finish_send(
        &mut self,
        response_id: &ResponseId,
        outcome: RelayResult<ConsumeOutcome>,
    ) -> RelayResult<Option<Turn>> {
        if !self.is_awaiting(response_id) {
            debug!(response_id = %response_id, "Ignoring stale reply");
            return Ok(None);
        }
        self.in_flight = None;
        match outcome? {
            ConsumeOutcome::Completed(text) => {
                let turn = self.conversation.commit_assistant_turn(text).clone();
                self.persist().await;
                Ok(Some(turn))
            }
            ConsumeOutcome::Cancelled(_) => Ok(None),
        }
    }

    /// Send `input` and wait for the whole reply
    pub async fn send(
        &mut self,
        input: &str,
        scheduler: &PublishScheduler,
    ) -> RelayResult<Option<Turn>> {
        let pending = self.begin_send(input).await?;
        let outcome = stream_reply(&self.client, &pending, scheduler).await;
        self.finish_send(&pending.response_id, outcome).await
    }

    /// Abandon the streaming reply, if any
    pub fn cancel(&mut self) {
        if let Some((response_id, token)) = self.in_flight.take() {
            debug!(response_id = %response_id, "Cancelling reply");
            token.cancel();
        }
    }

    /// Cancel, start over on a new thread and drop saved state
    pub async fn new_conversation(&mut self) {
        self.cancel();
        self.conversation.reset();
        if let Err(e) = self.store.clear().await {
            warn!(error = %e, "Could not clear saved conversation");
        }
        info!(thread_id = %self.conversation.thread_id(), "New conversation");
    }

    async fn persist(&self) {
        if let Err(e) = self.store.save(&self.conversation.to_persisted()).await {
            warn!(error = %e, "Could not save conversation");
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use relay_core::Role;

    use super::*;

    async fn session(dir: &TempDir) -> TutorSession {
        // Nothing in these tests reaches the network
        TutorSession::load(StateStore::new(dir.path()), RelayClient::new("http://127.0.0.1:9")).await
    }

    #[tokio::test]
    async fn test_blank_input_appends_nothing() {
        let dir = TempDir::new().unwrap();
        let mut session = session(&dir).await;

        let err = session.begin_send("   \n").await.unwrap_err();
        assert!(matches!(err, RelayError::Validation(_)));
        assert!(session.conversation().is_empty());
        assert!(!session.is_streaming());
    }

    #[tokio::test]
    async fn test_second_send_refused_while_streaming() {
        let dir = TempDir::new().unwrap();
        let mut session = session(&dir).await;

        let pending = session.begin_send("  first  ").await.unwrap();
        assert_eq!(pending.prompt.content(), "first");
        assert!(session.begin_send("second").await.is_err());
        assert_eq!(session.conversation().len(), 1);
    }

    #[tokio::test]
    async fn test_completion_commits_one_assistant_turn() {
        let dir = TempDir::new().unwrap();
        let mut session = session(&dir).await;

        let pending = session.begin_send("What is 2+2?").await.unwrap();
        let turn = session
            .finish_send(&pending.response_id, Ok(ConsumeOutcome::Completed("4".into())))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(turn.role(), Role::Assistant);
        assert_eq!(session.conversation().len(), 2);
        assert!(!session.is_streaming());

        let reloaded = session_after_restart(&dir).await;
        assert_eq!(reloaded.conversation(), session.conversation());
    }

    #[tokio::test]
    async fn test_failure_leaves_conversation_intact() {
        let dir = TempDir::new().unwrap();
        let mut session = session(&dir).await;

        let pending = session.begin_send("hello").await.unwrap();
        let result = session
            .finish_send(&pending.response_id, Err(RelayError::upstream("incomplete response")))
            .await;

        assert!(result.is_err());
        assert_eq!(session.conversation().len(), 1);
        assert!(session.begin_send("again").await.is_ok());
    }

    #[tokio::test]
    async fn test_new_conversation_clears_storage() {
        let dir = TempDir::new().unwrap();
        let mut session = session(&dir).await;
        let pending = session.begin_send("hello").await.unwrap();
        let old_thread = session.conversation().thread_id().clone();

        session.new_conversation().await;

        assert!(pending.cancel.is_cancelled());
        assert!(session.conversation().is_empty());
        assert_ne!(session.conversation().thread_id(), &old_thread);

        let reloaded = session_after_restart(&dir).await;
        assert!(reloaded.conversation().is_empty());
        assert!(!reloaded.conversation().has_started());
        assert_ne!(reloaded.conversation().thread_id(), &old_thread);
    }

    #[tokio::test]
    async fn test_stale_reply_after_reset_is_ignored() {
        let dir = TempDir::new().unwrap();
        let mut session = session(&dir).await;
        let stale = session.begin_send("first").await.unwrap();
        session.new_conversation().await;
        let current = session.begin_send("second").await.unwrap();

        let ignored = session
            .finish_send(&stale.response_id, Ok(ConsumeOutcome::Cancelled(String::new())))
            .await
            .unwrap();

        assert!(ignored.is_none());
        assert!(session.is_awaiting(&current.response_id));
        assert_eq!(session.conversation().len(), 1);
    }

    async fn session_after_restart(dir: &TempDir) -> TutorSession {
        session(dir).await
    }
}
