//! Call deduplication.
//!
//! [`SingleFlight`] runs at most one future per key at a time. Callers that
//! arrive while a call with their key is in flight wait for it and receive a
//! clone of its result instead of running their own. Once a call completes
//! its key is released, so a later call runs fresh.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

use crate::character::CharacterId;
use crate::section::Section;

/// Deduplication key of a section update.
#[must_use]
pub fn key_for(section: Section, character_id: CharacterId) -> String {
    format!("update-section-{section}-{character_id}")
}

struct Call<T> {
    id: u64,
    result: watch::Receiver<Option<T>>,
}

/// Coalesces concurrent calls that share a key.
pub struct SingleFlight<T> {
    calls: Mutex<HashMap<String, Call<T>>>,
    next_id: AtomicU64,
}

impl<T> Default for SingleFlight<T> {
    fn default() -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }
}

impl<T: Clone> SingleFlight<T> {
    /// Creates an empty deduplicator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` unless a call for `key` is already in flight, in which case
    /// the result of that call is returned.
    ///
    /// If the running call is dropped before it completes, one of its waiters
    /// takes over and runs its own `f`.
    pub async fn run<F, Fut>(&self, key: &str, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let leader = loop {
            let mut result = {
                let mut calls = self.lock();
                if let Some(call) = calls.get(key) {
                    call.result.clone()
                } else {
                    let (tx, rx) = watch::channel(None);
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    calls.insert(key.to_string(), Call { id, result: rx });
                    break Leader {
                        flight: self,
                        key,
                        id,
                        tx: Some(tx),
                    };
                }
            };

            let shared = result
                .wait_for(Option::is_some)
                .await
                .ok()
                .and_then(|value| value.clone());
            if let Some(value) = shared {
                return value;
            }
            // The running call was dropped; contend again.
        };

        let value = f().await;
        leader.finish(value.clone());
        value
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Call<T>>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self, key: &str, id: u64) {
        let mut calls = self.lock();
        if calls.get(key).is_some_and(|call| call.id == id) {
            calls.remove(key);
        }
    }
}

/// Registration of the caller that runs the call for a key.
///
/// Releases the key when dropped, so an abandoned call never blocks the key.
struct Leader<'a, T: Clone> {
    flight: &'a SingleFlight<T>,
    key: &'a str,
    id: u64,
    tx: Option<watch::Sender<Option<T>>>,
}

impl<T: Clone> Leader<'_, T> {
    fn finish(mut self, value: T) {
        self.flight.release(self.key, self.id);
        if let Some(tx) = self.tx.take() {
            tx.send_replace(Some(value));
        }
    }
}

impl<T: Clone> Drop for Leader<'_, T> {
    fn drop(&mut self) {
        if self.tx.is_some() {
            self.flight.release(self.key, self.id);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::task::JoinSet;

    #[test]
    fn test_key_for() {
        assert_eq!(
            key_for(Section::WalletJournal, CharacterId(42)),
            "update-section-wallet_journal-42"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_calls_share_one_execution() {
        let flight = Arc::new(SingleFlight::<Result<u32, String>>::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let mut tasks = JoinSet::new();

        for _ in 0..5 {
            let flight = Arc::clone(&flight);
            let calls = Arc::clone(&calls);
            tasks.spawn(async move {
                flight
                    .run("key", || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_secs(1)).await;
                        Err::<u32, _>("remote failed".to_string())
                    })
                    .await
            });
        }

        let results = tasks.join_all().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(results.len(), 5);
        assert!(results.iter().all(|r| r == &Err("remote failed".to_string())));
        assert_eq!(flight.lock().len(), 0);
    }

    #[tokio::test]
    async fn test_later_call_runs_fresh() {
        let flight = SingleFlight::new();
        let first = flight.run("key", || async { 1 }).await;
        let second = flight.run("key", || async { 2 }).await;
        assert_eq!((first, second), (1, 2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_distinct_keys_do_not_coalesce() {
        let flight = SingleFlight::new();
        let slow = || async {
            tokio::time::sleep(Duration::from_secs(1)).await;
        };
        let (a, b) = tokio::join!(
            flight.run("a", || async {
                slow().await;
                "a"
            }),
            flight.run("b", || async {
                slow().await;
                "b"
            }),
        );
        assert_eq!((a, b), ("a", "b"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_leader_hands_over() {
        let flight = Arc::new(SingleFlight::new());

        let leader = tokio::spawn({
            let flight = Arc::clone(&flight);
            async move {
                flight
                    .run("key", || async {
                        tokio::time::sleep(Duration::from_secs(60)).await;
                        1
                    })
                    .await
            }
        });
        tokio::task::yield_now().await;
        assert_eq!(flight.lock().len(), 1);

        let waiter = tokio::spawn({
            let flight = Arc::clone(&flight);
            async move { flight.run("key", || async { 2 }).await }
        });
        tokio::task::yield_now().await;

        leader.abort();
        assert!(leader.await.unwrap_err().is_cancelled());
        assert_eq!(waiter.await.unwrap(), 2);
        assert_eq!(flight.lock().len(), 0);
    }
}
