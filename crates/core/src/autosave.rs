//! Debounced auto-save.
//!
//! An [`AutoSaver`] owns one debounce timer per key. Every [`AutoSaver::edit`] replaces the
//! pending value for that key and restarts its timer; when the timer expires the latest value is
//! handed to a [`SaveSink`]. Keys are independent: editing one never disturbs another's timer.
//!
//! ## Guarantees
//! - Rapid edits to one key within the delay produce a single persist of the last value.
//! - A failed persist records [`SaveStatus::Error`] and keeps the pending value; there is no
//!   automatic retry. The next edit or [`AutoSaver::flush`] tries again.
//! - A persist that has been issued is never cancelled. Its result only updates the status if no
//!   newer edit has superseded it, so the last write for a key wins.
//! - Dropping the saver aborts every timer that has not fired yet.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::{AutoSaveError, BackendError};

/// Destination of debounced values.
#[async_trait]
pub trait SaveSink<K, V>: Send + Sync + 'static {
    async fn persist(&self, key: &K, value: V) -> Result<(), BackendError>;
}

/// Save state of one key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SaveStatus {
    Idle,
    Pending,
    Saved(DateTime<Utc>),
    Error(String),
}

/// Generation and result of the last persist that finished for a key.
type Settled = Option<(u64, Result<(), BackendError>)>;

struct Slot<V> {
    status: SaveStatus,
    pending: Option<V>,
    generation: u64,
    in_flight: Option<u64>,
    timer: Option<JoinHandle<()>>,
    settled: watch::Sender<Settled>,
}

impl<V> Slot<V> {
    fn new() -> Self {
        let (settled, _) = watch::channel(None);
        Self {
            status: SaveStatus::Idle,
            pending: None,
            generation: 0,
            in_flight: None,
            timer: None,
            settled,
        }
    }
}

enum Claim<V> {
    /// The caller persists this value.
    Persist(V, u64),
    /// The latest value is already being persisted; wait for it to settle.
    Await(watch::Receiver<Settled>, u64),
}

struct Registry<K, V> {
    slots: HashMap<K, Slot<V>>,
    next_generation: u64,
}

pub struct AutoSaver<K, V> {
    delay: Duration,
    sink: Arc<dyn SaveSink<K, V>>,
    registry: Arc<Mutex<Registry<K, V>>>,
}

impl<K, V> AutoSaver<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(delay: Duration, sink: Arc<dyn SaveSink<K, V>>) -> Self {
        Self {
            delay,
            sink,
            registry: Arc::new(Mutex::new(Registry {
                slots: HashMap::new(),
                next_generation: 0,
            })),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Records a new value for `key` and (re)starts its debounce timer.
    ///
    /// Must be called from within a tokio runtime.
    pub fn edit(&self, key: K, value: V) {
        let mut registry = self.registry.lock();
        registry.next_generation += 1;
        let generation = registry.next_generation;

        let slot = registry.slots.entry(key.clone()).or_insert_with(Slot::new);
        if let Some(timer) = slot.timer.take() {
            timer.abort();
        }
        slot.generation = generation;
        slot.pending = Some(value);
        slot.status = SaveStatus::Pending;
        slot.timer = Some(tokio::spawn(fire(
            self.delay,
            key,
            generation,
            Arc::clone(&self.sink),
            Arc::clone(&self.registry),
        )));
    }

    pub fn status(&self, key: &K) -> SaveStatus {
        self.registry
            .lock()
            .slots
            .get(key)
            .map(|slot| slot.status.clone())
            .unwrap_or(SaveStatus::Idle)
    }

    /// The value not yet confirmed as saved for `key`, if any.
    pub fn pending_value(&self, key: &K) -> Option<V> {
        self.registry
            .lock()
            .slots
            .get(key)
            .and_then(|slot| slot.pending.clone())
    }

    pub fn has_pending(&self) -> bool {
        self.registry
            .lock()
            .slots
            .values()
            .any(|slot| slot.pending.is_some())
    }

    /// Persists the pending value for `key` now, without waiting for its timer.
    ///
    /// If the latest value is already being persisted by its timer, waits for that persist and
    /// returns its result. Returns immediately if nothing is pending.
    pub async fn flush(&self, key: &K) -> Result<(), AutoSaveError> {
        let claimed = {
            let mut registry = self.registry.lock();
            registry.slots.get_mut(key).and_then(claim_or_await)
        };

        let result = match claimed {
            None => return Ok(()),
            Some(Claim::Persist(value, generation)) => {
                let result = self.sink.persist(key, value).await;
                record(&self.registry, key, generation, result.clone());
                result
            }
            Some(Claim::Await(mut settled, generation)) => {
                match settled
                    .wait_for(|s| matches!(s, Some((done, _)) if *done >= generation))
                    .await
                {
                    Ok(s) => match &*s {
                        Some((_, result)) => result.clone(),
                        None => Ok(()),
                    },
                    // Slot cancelled while the persist was running.
                    Err(_) => Ok(()),
                }
            }
        };

        result.map_err(|source| AutoSaveError {
            key: format!("{key:?}"),
            source,
        })
    }

    /// Flushes every key with a pending value, returning the first failure.
    pub async fn flush_all(&self) -> Result<(), AutoSaveError> {
        let keys: Vec<K> = self
            .registry
            .lock()
            .slots
            .iter()
            .filter(|(_, slot)| slot.pending.is_some())
            .map(|(key, _)| key.clone())
            .collect();

        let mut first_error = None;
        for key in keys {
            if let Err(e) = self.flush(&key).await {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Drops the timer and pending value for `key`; its status returns to idle.
    pub fn cancel(&self, key: &K) {
        if let Some(slot) = self.registry.lock().slots.remove(key) {
            if let Some(timer) = slot.timer {
                timer.abort();
            }
        }
    }

    /// Drops every timer and pending value.
    pub fn cancel_all(&self) {
        let drained: Vec<Slot<V>> = self.registry.lock().slots.drain().map(|(_, s)| s).collect();
        let aborted = drained
            .into_iter()
            .filter_map(|slot| slot.timer)
            .map(|timer| timer.abort())
            .count();
        if aborted > 0 {
            tracing::debug!(aborted, "cancelled pending auto-save timers");
        }
    }
}

impl<K, V> Drop for AutoSaver<K, V> {
    fn drop(&mut self) {
        for slot in self.registry.lock().slots.values_mut() {
            if let Some(timer) = slot.timer.take() {
                timer.abort();
            }
        }
    }
}

/// Like [`claim`], but hands back a receiver to wait on when the latest value is in flight.
fn claim_or_await<V: Clone>(slot: &mut Slot<V>) -> Option<Claim<V>> {
    if slot.in_flight == Some(slot.generation) {
        return Some(Claim::Await(slot.settled.subscribe(), slot.generation));
    }
    claim(slot).map(|(value, generation)| Claim::Persist(value, generation))
}

/// Takes the slot's latest value for persisting, unless it is already in flight.
fn claim<V: Clone>(slot: &mut Slot<V>) -> Option<(V, u64)> {
    if slot.in_flight == Some(slot.generation) {
        return None;
    }
    if let Some(timer) = slot.timer.take() {
        timer.abort();
    }
    let value = slot.pending.clone()?;
    slot.in_flight = Some(slot.generation);
    Some((value, slot.generation))
}

async fn fire<K, V>(
    delay: Duration,
    key: K,
    generation: u64,
    sink: Arc<dyn SaveSink<K, V>>,
    registry: Arc<Mutex<Registry<K, V>>>,
) where
    K: Eq + Hash + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    tokio::time::sleep(delay).await;

    let claimed = {
        let mut guard = registry.lock();
        match guard.slots.get_mut(&key) {
            Some(slot) if slot.generation == generation => {
                // Detach first so a concurrent edit cannot abort the persist below.
                slot.timer = None;
                claim(slot)
            }
            _ => None,
        }
    };

    if let Some((value, generation)) = claimed {
        let result = sink.persist(&key, value).await;
        record(&registry, &key, generation, result);
    }
}

fn record<K, V>(
    registry: &Mutex<Registry<K, V>>,
    key: &K,
    generation: u64,
    result: Result<(), BackendError>,
) where
    K: Eq + Hash + Debug,
{
    let mut guard = registry.lock();
    let Some(slot) = guard.slots.get_mut(key) else {
        return;
    };
    if slot.in_flight == Some(generation) {
        slot.in_flight = None;
    }
    slot.settled.send_replace(Some((generation, result.clone())));
    if slot.generation != generation {
        tracing::debug!(?key, "discarding result of superseded auto-save");
        return;
    }

    match result {
        Ok(()) => {
            slot.pending = None;
            slot.status = SaveStatus::Saved(Utc::now());
            tracing::debug!(?key, "auto-saved");
        }
        Err(e) => {
            tracing::warn!(?key, error = %e, "auto-save failed");
            slot.status = SaveStatus::Error(e.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        calls: Mutex<Vec<(String, String)>>,
        fail: Mutex<bool>,
    }

    impl RecordingSink {
        fn calls(&self) -> Vec<(String, String)> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl SaveSink<String, String> for RecordingSink {
        async fn persist(&self, key: &String, value: String) -> Result<(), BackendError> {
            self.calls.lock().push((key.clone(), value));
            if *self.fail.lock() {
                return Err(BackendError::Unavailable("offline".into()));
            }
            Ok(())
        }
    }

    fn saver(sink: &Arc<RecordingSink>) -> AutoSaver<String, String> {
        let sink: Arc<dyn SaveSink<String, String>> = sink.clone();
        AutoSaver::new(Duration::from_millis(2_000), sink)
    }

    fn key(name: &str) -> String {
        name.to_string()
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_edits_persist_once_with_last_value() {
        let sink = Arc::new(RecordingSink::default());
        let saver = saver(&sink);

        saver.edit(key("q1"), "a".into());
        tokio::time::sleep(Duration::from_millis(500)).await;
        saver.edit(key("q1"), "ab".into());
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        saver.edit(key("q1"), "abc".into());
        assert_eq!(saver.status(&key("q1")), SaveStatus::Pending);

        tokio::time::sleep(Duration::from_millis(2_500)).await;

        assert_eq!(sink.calls(), vec![(key("q1"), "abc".to_string())]);
        assert!(matches!(saver.status(&key("q1")), SaveStatus::Saved(_)));
        assert_eq!(saver.pending_value(&key("q1")), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_different_keys_have_independent_timers() {
        let sink = Arc::new(RecordingSink::default());
        let saver = saver(&sink);

        saver.edit(key("q1"), "first".into());
        tokio::time::sleep(Duration::from_millis(1_000)).await;
        saver.edit(key("q2"), "second".into());

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(sink.calls(), vec![(key("q1"), "first".to_string())]);

        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(
            sink.calls(),
            vec![
                (key("q1"), "first".to_string()),
                (key("q2"), "second".to_string())
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_keeps_pending_value_without_retry() {
        let sink = Arc::new(RecordingSink::default());
        *sink.fail.lock() = true;
        let saver = saver(&sink);

        saver.edit(key("q1"), "draft".into());
        tokio::time::sleep(Duration::from_millis(10_000)).await;

        assert_eq!(sink.calls().len(), 1);
        assert!(matches!(saver.status(&key("q1")), SaveStatus::Error(_)));
        assert_eq!(saver.pending_value(&key("q1")), Some("draft".to_string()));

        *sink.fail.lock() = false;
        saver.flush(&key("q1")).await.expect("flush should succeed");
        assert_eq!(sink.calls().len(), 2);
        assert!(matches!(saver.status(&key("q1")), SaveStatus::Saved(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_persists_immediately_and_stops_timer() {
        let sink = Arc::new(RecordingSink::default());
        let saver = saver(&sink);

        saver.edit(key("narrative"), "text".into());
        saver.flush(&key("narrative")).await.expect("flush should succeed");
        assert_eq!(sink.calls().len(), 1);

        tokio::time::sleep(Duration::from_millis(5_000)).await;
        assert_eq!(sink.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_reports_failure() {
        let sink = Arc::new(RecordingSink::default());
        *sink.fail.lock() = true;
        let saver = saver(&sink);

        saver.edit(key("q1"), "text".into());
        let err = saver.flush_all().await.unwrap_err();
        assert_eq!(err.key, "\"q1\"");
        assert_eq!(err.source, BackendError::Unavailable("offline".into()));
    }

    struct SlowSink {
        completed: Mutex<usize>,
    }

    #[async_trait]
    impl SaveSink<String, String> for SlowSink {
        async fn persist(&self, _key: &String, _value: String) -> Result<(), BackendError> {
            tokio::time::sleep(Duration::from_millis(1_000)).await;
            *self.completed.lock() += 1;
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_waits_for_persist_started_by_timer() {
        let sink = Arc::new(SlowSink {
            completed: Mutex::new(0),
        });
        let dyn_sink: Arc<dyn SaveSink<String, String>> = sink.clone();
        let saver = AutoSaver::new(Duration::from_millis(2_000), dyn_sink);

        saver.edit(key("narrative"), "text".into());
        tokio::time::sleep(Duration::from_millis(2_100)).await;
        assert_eq!(*sink.completed.lock(), 0);

        saver.flush(&key("narrative")).await.expect("flush should succeed");
        assert_eq!(*sink.completed.lock(), 1);
        assert!(matches!(saver.status(&key("narrative")), SaveStatus::Saved(_)));
        assert_eq!(saver.pending_value(&key("narrative")), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_discards_pending_save() {
        let sink = Arc::new(RecordingSink::default());
        let saver = saver(&sink);

        saver.edit(key("q1"), "stale".into());
        saver.edit(key("q2"), "also stale".into());
        saver.cancel(&key("q1"));
        assert_eq!(saver.status(&key("q1")), SaveStatus::Idle);
        saver.cancel_all();

        tokio::time::sleep(Duration::from_millis(5_000)).await;
        assert!(sink.calls().is_empty());
        assert!(!saver.has_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_aborts_timers() {
        let sink = Arc::new(RecordingSink::default());
        {
            let saver = saver(&sink);
            saver.edit(key("q1"), "unsaved".into());
        }
        tokio::time::sleep(Duration::from_millis(5_000)).await;
        assert!(sink.calls().is_empty());
    }
}
