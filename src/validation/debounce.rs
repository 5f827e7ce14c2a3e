//! Per-key debounce: only the latest trigger in a burst runs.
//!
//! Each trigger bumps a generation number and spawns a delayed task. When
//! the delay elapses the task runs only if its generation is still the
//! current one for its key. Re-triggering aborts a job that has not started;
//! a job that has started always runs to completion.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    Idle,
    Scheduled,
    Running,
}

#[derive(Default)]
struct Slot {
    generation: u64,
    pending: Option<JoinHandle<()>>,
    running: Vec<u64>,
}

pub struct Debouncer<K> {
    delay: Duration,
    slots: Arc<Mutex<HashMap<K, Slot>>>,
    generation: AtomicU64,
}

fn lock<K>(slots: &Mutex<HashMap<K, Slot>>) -> MutexGuard<'_, HashMap<K, Slot>> {
    slots.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<K> Debouncer<K>
where
    K: Eq + Hash + Clone + Send + 'static,
{
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            slots: Arc::new(Mutex::new(HashMap::new())),
            generation: AtomicU64::new(0),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule `job` for `key` after the delay, replacing any pending job.
    pub fn trigger<F, Fut>(&self, key: K, job: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let mut slots = lock(&self.slots);
        let slot = slots.entry(key.clone()).or_default();
        if let Some(previous) = slot.pending.take() {
            previous.abort();
        }
        slot.generation = generation;

        let shared = self.slots.clone();
        let deadline = Instant::now() + self.delay;
        slot.pending = Some(tokio::spawn(async move {
            sleep_until(deadline).await;
            {
                let mut slots = lock(&shared);
                match slots.get_mut(&key) {
                    Some(slot) if slot.generation == generation => {
                        slot.pending = None;
                        slot.running.push(generation);
                    }
                    _ => return,
                }
            }

            job().await;

            let mut slots = lock(&shared);
            if let Some(slot) = slots.get_mut(&key) {
                slot.running.retain(|g| *g != generation);
                if slot.pending.is_none() && slot.running.is_empty() {
                    slots.remove(&key);
                }
            }
        }));
    }

    /// Drop the pending job and the entry for `key`. A running job finishes.
    pub fn cancel(&self, key: &K) {
        if let Some(slot) = lock(&self.slots).remove(key) {
            if let Some(pending) = slot.pending {
                pending.abort();
            }
        }
    }

    pub fn state(&self, key: &K) -> DebounceState {
        match lock(&self.slots).get(key) {
            Some(slot) if slot.pending.is_some() => DebounceState::Scheduled,
            Some(slot) if !slot.running.is_empty() => DebounceState::Running,
            _ => DebounceState::Idle,
        }
    }
}

impl<K> Drop for Debouncer<K> {
    fn drop(&mut self) {
        for slot in lock(&self.slots).values_mut() {
            if let Some(pending) = slot.pending.take() {
                pending.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    type Log = Arc<Mutex<Vec<(u32, Instant)>>>;

    fn record(log: &Log, payload: u32) -> impl FnOnce() -> std::future::Ready<()> + Send + 'static {
        let log = log.clone();
        move || {
            log.lock().unwrap().push((payload, Instant::now()));
            std::future::ready(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn burst_runs_once_with_last_payload() {
        let debouncer = Debouncer::new(DEFAULT_DEBOUNCE);
        let log: Log = Arc::default();

        for i in 0..10 {
            if i > 0 {
                sleep(Duration::from_millis(5)).await;
            }
            debouncer.trigger("a.evi", record(&log, i));
        }
        let last = Instant::now();
        assert_eq!(debouncer.state(&"a.evi"), DebounceState::Scheduled);

        sleep(Duration::from_millis(249)).await;
        assert!(log.lock().unwrap().is_empty());

        sleep(Duration::from_millis(2)).await;
        tokio::task::yield_now().await;
        let log = log.lock().unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].0, 9);
        assert_eq!(log[0].1 - last, DEFAULT_DEBOUNCE);
        assert_eq!(debouncer.state(&"a.evi"), DebounceState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn delay_counts_from_trigger_not_first_poll() {
        let debouncer = Debouncer::new(DEFAULT_DEBOUNCE);
        let log: Log = Arc::default();
        let triggered = Instant::now();
        debouncer.trigger("a.evi", record(&log, 1));

        // The job task is first polled here, 100ms after the trigger.
        tokio::time::advance(Duration::from_millis(100)).await;
        sleep(Duration::from_millis(151)).await;

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].1 - triggered, DEFAULT_DEBOUNCE);
    }

    #[tokio::test(start_paused = true)]
    async fn keys_are_independent() {
        let debouncer = Debouncer::new(DEFAULT_DEBOUNCE);
        let log: Log = Arc::default();
        debouncer.trigger("a.evi", record(&log, 1));
        debouncer.trigger("b.evi", record(&log, 2));

        sleep(Duration::from_millis(300)).await;
        let mut payloads: Vec<u32> = log.lock().unwrap().iter().map(|(p, _)| *p).collect();
        payloads.sort();
        assert_eq!(payloads, vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_pending_job() {
        let debouncer = Debouncer::new(DEFAULT_DEBOUNCE);
        let log: Log = Arc::default();
        debouncer.trigger("a.evi", record(&log, 1));
        sleep(Duration::from_millis(100)).await;
        debouncer.cancel(&"a.evi");
        assert_eq!(debouncer.state(&"a.evi"), DebounceState::Idle);

        sleep(Duration::from_millis(500)).await;
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn running_job_is_not_cancelled_by_retrigger() {
        let debouncer = Debouncer::new(DEFAULT_DEBOUNCE);
        let log: Log = Arc::default();

        let slow_log = log.clone();
        debouncer.trigger("a.evi", move || async move {
            sleep(Duration::from_millis(1000)).await;
            slow_log.lock().unwrap().push((1, Instant::now()));
        });
        sleep(Duration::from_millis(300)).await;
        assert_eq!(debouncer.state(&"a.evi"), DebounceState::Running);

        debouncer.trigger("a.evi", record(&log, 2));
        assert_eq!(debouncer.state(&"a.evi"), DebounceState::Scheduled);

        sleep(Duration::from_millis(2000)).await;
        let mut payloads: Vec<u32> = log.lock().unwrap().iter().map(|(p, _)| *p).collect();
        payloads.sort();
        assert_eq!(payloads, vec![1, 2]);
        assert_eq!(debouncer.state(&"a.evi"), DebounceState::Idle);
    }
}
