//! # Work Queue
//!
//! Per-kind queue of record names awaiting reconciliation.
//!
//! ## Guarantees
//!
//! - A key is queued at most once, however often it is added
//! - A key is handed to at most one worker at a time; adds that arrive while
//!   it is being processed are replayed when the worker calls [`WorkQueue::done`]
//! - Delayed adds keep the earliest deadline
//! - Rate-limited adds back off exponentially per key until [`WorkQueue::forget`]

use crate::controller::backoff::ExponentialBackoff;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::warn;

#[derive(Debug, Default)]
struct State {
    queue: VecDeque<String>,
    dirty: HashSet<String>,
    processing: HashSet<String>,
    waiting: HashMap<String, Instant>,
    backoffs: HashMap<String, ExponentialBackoff>,
    shutting_down: bool,
}

impl State {
    fn enqueue(&mut self, key: &str) -> bool {
        if self.shutting_down || self.dirty.contains(key) {
            return false;
        }
        self.dirty.insert(key.to_string());
        if self.processing.contains(key) {
            return false;
        }
        self.queue.push_back(key.to_string());
        true
    }

    /// Move every delayed key whose deadline passed into the queue
    fn promote_due(&mut self, now: Instant) {
        let due: Vec<String> = self
            .waiting
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(key, _)| key.clone())
            .collect();
        for key in due {
            self.waiting.remove(&key);
            self.enqueue(&key);
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.waiting.values().min().copied()
    }
}

/// Deduplicating delayed work queue
#[derive(Debug)]
pub struct WorkQueue {
    state: Mutex<State>,
    notify: Notify,
    backoff_base: Duration,
    backoff_max: Duration,
}

impl WorkQueue {
    pub fn new(backoff_base: Duration, backoff_max: Duration) -> Self {
        Self {
            state: Mutex::new(State::default()),
            notify: Notify::new(),
            backoff_base,
            backoff_max,
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!("Work queue lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Queue `key` for reconciliation as soon as possible
    pub fn add(&self, key: &str) {
        let added = {
            let mut state = self.lock();
            state.waiting.remove(key);
            state.enqueue(key)
        };
        if added {
            self.notify.notify_waiters();
        }
    }

    /// Queue `key` after `delay`, unless it is already due earlier
    pub fn add_after(&self, key: &str, delay: Duration) {
        if delay.is_zero() {
            self.add(key);
            return;
        }
        {
            let mut state = self.lock();
            if state.shutting_down || state.dirty.contains(key) {
                return;
            }
            let deadline = Instant::now() + delay;
            let entry = state.waiting.entry(key.to_string()).or_insert(deadline);
            if deadline < *entry {
                *entry = deadline;
            }
        }
        self.notify.notify_waiters();
    }

    /// Queue `key` after its next exponential backoff delay
    ///
    /// Returns the delay used.
    pub fn add_rate_limited(&self, key: &str) -> Duration {
        let delay = {
            let mut state = self.lock();
            let (base, max) = (self.backoff_base, self.backoff_max);
            state
                .backoffs
                .entry(key.to_string())
                .or_insert_with(|| ExponentialBackoff::new(base, max))
                .next_backoff()
        };
        self.add_after(key, delay);
        delay
    }

    /// Reset the backoff of `key`
    pub fn forget(&self, key: &str) {
        self.lock().backoffs.remove(key);
    }

    /// Consecutive rate-limited adds of `key` since it was last forgotten
    pub fn failures(&self, key: &str) -> u32 {
        self.lock()
            .backoffs
            .get(key)
            .map_or(0, ExponentialBackoff::failures)
    }

    /// Wait for the next key; `None` once the queue shuts down
    ///
    /// The caller must pass the key to [`WorkQueue::done`] when finished.
    pub async fn get(&self) -> Option<String> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let deadline = {
                let mut state = self.lock();
                if state.shutting_down {
                    return None;
                }
                state.promote_due(Instant::now());
                if let Some(key) = state.queue.pop_front() {
                    state.dirty.remove(&key);
                    state.processing.insert(key.clone());
                    return Some(key);
                }
                state.next_deadline()
            };

            match deadline {
                Some(deadline) => {
                    tokio::select! {
                        () = &mut notified => {}
                        () = tokio::time::sleep_until(deadline) => {}
                    }
                }
                None => notified.await,
            }
        }
    }

    /// Mark `key` as processed, replaying any add that arrived meanwhile
    pub fn done(&self, key: &str) {
        let requeued = {
            let mut state = self.lock();
            state.processing.remove(key);
            if state.dirty.contains(key) && !state.shutting_down {
                state.queue.push_back(key.to_string());
                true
            } else {
                false
            }
        };
        if requeued {
            self.notify.notify_waiters();
        }
    }

    /// Stop handing out keys and wake every waiting worker
    pub fn shutdown(&self) {
        self.lock().shutting_down = true;
        self.notify.notify_waiters();
    }

    /// Keys ready or delayed, excluding those being processed
    pub fn len(&self) -> usize {
        let state = self.lock();
        state.queue.len() + state.waiting.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue() -> WorkQueue {
        WorkQueue::new(Duration::from_secs(1), Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_add_deduplicates() {
        let q = queue();
        q.add("a");
        q.add("a");
        q.add("b");
        assert_eq!(q.len(), 2);

        assert_eq!(q.get().await.as_deref(), Some("a"));
        assert_eq!(q.get().await.as_deref(), Some("b"));
        assert!(q.is_empty());
    }

    #[tokio::test]
    async fn test_key_processed_by_one_worker_at_a_time() {
        let q = queue();
        q.add("a");
        let key = q.get().await.unwrap();

        // Added again while processing: held back until done
        q.add("a");
        assert!(q.is_empty());

        q.done(&key);
        assert_eq!(q.len(), 1);
        assert_eq!(q.get().await.as_deref(), Some("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_after_keeps_earliest_deadline() {
        let q = queue();
        q.add_after("a", Duration::from_secs(30));
        q.add_after("a", Duration::from_secs(5));
        q.add_after("a", Duration::from_secs(60));

        let start = Instant::now();
        assert_eq!(q.get().await.as_deref(), Some("a"));
        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_overrides_delay() {
        let q = queue();
        q.add_after("a", Duration::from_secs(30));
        q.add("a");

        let start = Instant::now();
        assert_eq!(q.get().await.as_deref(), Some("a"));
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(q.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_backoff_grows_and_resets() {
        let q = queue();
        assert_eq!(q.add_rate_limited("a"), Duration::from_secs(1));
        assert_eq!(q.get().await.as_deref(), Some("a"));
        q.done("a");

        assert_eq!(q.add_rate_limited("a"), Duration::from_secs(2));
        assert_eq!(q.failures("a"), 2);
        assert_eq!(q.get().await.as_deref(), Some("a"));
        q.done("a");

        q.forget("a");
        assert_eq!(q.failures("a"), 0);
        assert_eq!(q.add_rate_limited("a"), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_shutdown_wakes_waiters() {
        let q = std::sync::Arc::new(queue());
        let waiter = {
            let q = std::sync::Arc::clone(&q);
            tokio::spawn(async move { q.get().await })
        };
        tokio::task::yield_now().await;
        q.shutdown();
        assert_eq!(waiter.await.unwrap(), None);

        q.add("a");
        assert!(q.is_empty());
    }
}
