//! Thread Store
//!
//! Per-thread message history kept by the relay. The upstream is stateless,
//! so each chat request resends the thread so far; an exchange is recorded
//! only after its response stream closed cleanly, which keeps failed or
//! cancelled turns out of the history.
//!
//! Both dimensions are bounded: each thread keeps at most `max_messages`
//! (pruned a whole exchange at a time), and once more than `max_threads`
//! threads exist the least recently updated one is forgotten.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::backend::UpstreamMessage;
use crate::messages::ThreadId;

/// Default cap on stored messages per thread
pub const DEFAULT_MAX_THREAD_MESSAGES: usize = 100;

/// Default cap on remembered threads
pub const DEFAULT_MAX_THREADS: usize = 1000;

#[derive(Debug, Default)]
struct ThreadEntry {
    messages: Vec<UpstreamMessage>,
    /// Store clock value at the last recorded exchange
    last_used: u64,
}

/// Shared, concurrent thread history
#[derive(Clone, Debug)]
pub struct ThreadStore {
    threads: Arc<DashMap<ThreadId, ThreadEntry>>,
    clock: Arc<AtomicU64>,
    /// Maximum messages kept per thread (0 = unlimited)
    max_messages: usize,
    /// Maximum threads kept (0 = unlimited)
    max_threads: usize,
}

impl Default for ThreadStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_THREAD_MESSAGES)
    }
}

impl ThreadStore {
    /// Create a store keeping at most `max_messages` per thread
    #[must_use]
    pub fn new(max_messages: usize) -> Self {
        Self {
            threads: Arc::new(DashMap::new()),
            clock: Arc::new(AtomicU64::new(0)),
            max_messages,
            max_threads: DEFAULT_MAX_THREADS,
        }
    }

    /// Keep at most `max_threads` threads (0 = unlimited)
    #[must_use]
    pub fn with_max_threads(mut self, max_threads: usize) -> Self {
        self.max_threads = max_threads;
        self
    }

    /// Snapshot of a thread's history, oldest first
    #[must_use]
    pub fn history(&self, thread_id: &ThreadId) -> Vec<UpstreamMessage> {
        self.threads
            .get(thread_id)
            .map(|entry| entry.messages.clone())
            .unwrap_or_default()
    }

    /// Append a completed user/assistant exchange
    pub fn record_exchange(
        &self,
        thread_id: &ThreadId,
        user: impl Into<String>,
        assistant: impl Into<String>,
    ) {
        {
            let mut entry = self.threads.entry(thread_id.clone()).or_default();
            entry.last_used = self.clock.fetch_add(1, Ordering::Relaxed);
            entry.messages.push(UpstreamMessage::user(user));
            entry.messages.push(UpstreamMessage::assistant(assistant));

            let len = entry.messages.len();
            if self.max_messages > 0 && len > self.max_messages {
                // Round up so history always starts on a user message
                let excess = len - self.max_messages;
                let to_remove = (excess + excess % 2).min(len);
                entry.messages.drain(..to_remove);
                debug!(thread_id = %thread_id, removed = to_remove, "Pruned thread history");
            }
        }
        // The entry guard must be released before scanning the map
        self.evict_idle(thread_id);
    }

    fn evict_idle(&self, keep: &ThreadId) {
        if self.max_threads == 0 {
            return;
        }
        while self.threads.len() > self.max_threads {
            let oldest = self
                .threads
                .iter()
                .filter(|entry| entry.key() != keep)
                .min_by_key(|entry| entry.value().last_used)
                .map(|entry| entry.key().clone());
            let Some(oldest) = oldest else {
                return;
            };
            if self.threads.remove(&oldest).is_some() {
                debug!(thread_id = %oldest, "Evicted least recently used thread");
            }
        }
    }

    /// Forget a thread
    pub fn remove(&self, thread_id: &ThreadId) -> bool {
        self.threads.remove(thread_id).is_some()
    }

    /// Number of messages stored for a thread
    #[must_use]
    pub fn message_count(&self, thread_id: &ThreadId) -> usize {
        self.threads.get(thread_id).map_or(0, |entry| entry.messages.len())
    }

    /// Number of known threads
    #[must_use]
    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::messages::Role;

    #[test]
    fn test_exchanges_accumulate_in_order() {
        let store = ThreadStore::default();
        let thread = ThreadId::from("t1");

        store.record_exchange(&thread, "q1", "a1");
        store.record_exchange(&thread, "q2", "a2");

        let history = store.history(&thread);
        let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["q1", "a1", "q2", "a2"]);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[1].role, Role::Assistant);
    }

    #[test]
    fn test_threads_are_isolated() {
        let store = ThreadStore::default();
        store.record_exchange(&ThreadId::from("a"), "qa", "aa");
        assert!(store.history(&ThreadId::from("b")).is_empty());
        assert_eq!(store.thread_count(), 1);
    }

    #[test]
    fn test_pruning_drops_oldest() {
        let store = ThreadStore::new(4);
        let thread = ThreadId::new();
        for i in 0..3 {
            store.record_exchange(&thread, format!("q{i}"), format!("a{i}"));
        }

        let history = store.history(&thread);
        assert_eq!(store.message_count(&thread), 4);
        assert_eq!(history[0].content, "q1");
        assert_eq!(history[3].content, "a2");
    }

    #[test]
    fn test_zero_limit_is_unlimited() {
        let store = ThreadStore::new(0);
        let thread = ThreadId::new();
        for _ in 0..60 {
            store.record_exchange(&thread, "q", "a");
        }
        assert_eq!(store.message_count(&thread), 120);
        assert!(store.remove(&thread));
        assert_eq!(store.message_count(&thread), 0);
    }

    #[test]
    fn test_odd_limit_prunes_whole_exchanges() {
        let store = ThreadStore::new(5);
        let thread = ThreadId::new();
        for i in 0..3 {
            store.record_exchange(&thread, format!("q{i}"), format!("a{i}"));
        }

        let history = store.history(&thread);
        let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["q1", "a1", "q2", "a2"]);
        assert_eq!(history[0].role, Role::User);
    }

    #[test]
    fn test_thread_count_is_bounded() {
        let store = ThreadStore::new(4).with_max_threads(8);
        for i in 0..10_000 {
            store.record_exchange(&ThreadId::from(format!("t{i}")), "q", "a");
        }
        assert_eq!(store.thread_count(), 8);
        assert_eq!(store.message_count(&ThreadId::from("t9999")), 2);
        assert_eq!(store.message_count(&ThreadId::from("t0")), 0);
    }

    #[test]
    fn test_least_recently_used_thread_is_evicted() {
        let store = ThreadStore::default().with_max_threads(2);
        let (a, b, c) = (ThreadId::from("a"), ThreadId::from("b"), ThreadId::from("c"));

        store.record_exchange(&a, "q", "a");
        store.record_exchange(&b, "q", "a");
        store.record_exchange(&a, "q2", "a2");
        store.record_exchange(&c, "q", "a");

        assert_eq!(store.thread_count(), 2);
        assert_eq!(store.message_count(&a), 4);
        assert_eq!(store.message_count(&b), 0);
        assert_eq!(store.message_count(&c), 2);
    }
}
