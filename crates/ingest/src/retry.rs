//! Inbound retry queue: events whose store apply failed transiently are parked
//! here and re-offered to the processor on a schedule with capped attempts.
//!
//! State is process-local and lost on restart; that is an accepted limit of
//! the design, not an oversight. `RetryStore` is the substitution seam for a
//! durable queue.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use domain::CanonicalOrderEvent;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::processor::{ApplyOutcome, Processor};

pub const MAX_ATTEMPTS: u32 = 3;

/// Backoff schedule applied after each failed re-attempt.
pub const RETRY_DELAYS: [Duration; 3] = [
    Duration::from_secs(5),
    Duration::from_secs(15),
    Duration::from_secs(60),
];

/// How often the scheduler re-offers due entries to the processor.
pub const SCHEDULER_INTERVAL: Duration = Duration::from_secs(5);

/// A canonical event with retry bookkeeping.
#[derive(Debug, Clone)]
pub struct RetryableEvent {
    pub event: CanonicalOrderEvent,
    pub attempts: u32,
    pub next_retry_at: Instant,
    /// Set while a re-submission for this key is running so the scheduler
    /// never drains the same key twice concurrently.
    in_flight: bool,
}

pub trait RetryStore: Send + Sync {
    /// Insert with attempts=0, due immediately. Re-enqueueing an existing key
    /// resets its bookkeeping (the newer delivery supersedes the parked one).
    fn enqueue(&self, event: CanonicalOrderEvent);

    /// Entries due at `now` with attempts remaining. Returned entries are
    /// locked in-flight until the caller reports an outcome; they are not
    /// removed here.
    fn drain_ready(&self, now: Instant) -> Vec<CanonicalOrderEvent>;

    /// Remove the entry; also used to drop permanently failed events.
    fn mark_succeeded(&self, key: &str);

    /// Count a failed re-attempt: advance the backoff clock, or drop the
    /// entry once attempts reach the cap.
    fn mark_failed(&self, key: &str, now: Instant);

    fn len(&self) -> usize;
}

/// Mutex-guarded map keyed by `tenant_id:external_id`.
#[derive(Default)]
pub struct MemoryRetryStore {
    entries: Mutex<HashMap<String, RetryableEvent>>,
}

impl MemoryRetryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RetryStore for MemoryRetryStore {
    fn enqueue(&self, event: CanonicalOrderEvent) {
        let key = event.idempotency_key();
        let mut entries = self.entries.lock().expect("retry lock poisoned");
        tracing::info!(%key, "enqueued for retry");
        entries.insert(
            key,
            RetryableEvent {
                event,
                attempts: 0,
                next_retry_at: Instant::now(),
                in_flight: false,
            },
        );
    }

    fn drain_ready(&self, now: Instant) -> Vec<CanonicalOrderEvent> {
        let mut entries = self.entries.lock().expect("retry lock poisoned");
        let mut ready = Vec::new();
        for entry in entries.values_mut() {
            if !entry.in_flight && entry.attempts < MAX_ATTEMPTS && entry.next_retry_at <= now {
                entry.in_flight = true;
                ready.push(entry.event.clone());
            }
        }
        ready
    }

    fn mark_succeeded(&self, key: &str) {
        let mut entries = self.entries.lock().expect("retry lock poisoned");
        if entries.remove(key).is_some() {
            tracing::info!(key, "removed from retry queue");
        }
    }

    fn mark_failed(&self, key: &str, now: Instant) {
        let mut entries = self.entries.lock().expect("retry lock poisoned");
        let Some(entry) = entries.get_mut(key) else {
            return;
        };
        entry.attempts += 1;
        if entry.attempts < MAX_ATTEMPTS {
            let delay = RETRY_DELAYS[(entry.attempts - 1) as usize];
            entry.next_retry_at = now + delay;
            entry.in_flight = false;
            tracing::warn!(
                key,
                attempt = entry.attempts,
                max = MAX_ATTEMPTS,
                delay_secs = delay.as_secs(),
                "retry scheduled"
            );
        } else {
            entries.remove(key);
            tracing::error!(key, "max retries reached, dropping event");
        }
    }

    fn len(&self) -> usize {
        self.entries.lock().expect("retry lock poisoned").len()
    }
}

/// Periodically drain due entries and resubmit them to the processor.
/// Independent keys fan out as their own tasks; per-key ordering is preserved
/// by the in-flight lock inside the store.
pub fn spawn_retry_scheduler(
    processor: Arc<Processor>,
    store: Arc<dyn RetryStore>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SCHEDULER_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            for event in store.drain_ready(Instant::now()) {
                let processor = Arc::clone(&processor);
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    let key = event.idempotency_key();
                    tracing::info!(%key, "retrying event");
                    match processor.apply(&event).await {
                        ApplyOutcome::Applied { .. } | ApplyOutcome::Duplicate => {
                            store.mark_succeeded(&key);
                        }
                        ApplyOutcome::Transient { reason } => {
                            tracing::warn!(%key, %reason, "retry attempt failed");
                            store.mark_failed(&key, Instant::now());
                        }
                        ApplyOutcome::Permanent { reason } => {
                            // Retrying will never help; drop the entry.
                            tracing::error!(%key, %reason, "permanent failure on retry, dropping");
                            store.mark_succeeded(&key);
                        }
                    }
                });
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::OrderStore;
    use async_trait::async_trait;
    use chrono::Utc;
    use domain::{
        CanonicalOrderEvent, Customer, DeliveryAddress, Order, OrderEventType, OrderItem,
        OrderStatus, SourcePlatform,
    };
    use std::sync::atomic::{AtomicU32, Ordering};
    use uuid::Uuid;

    fn event(tenant: &str, external: &str) -> CanonicalOrderEvent {
        CanonicalOrderEvent {
            event_type: OrderEventType::Created,
            source_platform: SourcePlatform::Ifood,
            external_id: external.to_string(),
            tenant_id: tenant.to_string(),
            customer: Customer {
                name: "Cliente".to_string(),
                phone: String::new(),
                email: None,
            },
            delivery_address: DeliveryAddress {
                address: String::new(),
                latitude: None,
                longitude: None,
            },
            items: vec![],
            subtotal: 10.0,
            delivery_fee: 5.0,
            total: 15.0,
            payment_method: "ifood".to_string(),
            order_notes: None,
            raw_payload: serde_json::json!({}),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_schedule_is_honored() {
        let store = MemoryRetryStore::new();
        store.enqueue(event("T1", "E1"));

        // Due immediately on enqueue.
        let ready = store.drain_ready(Instant::now());
        assert_eq!(ready.len(), 1);
        store.mark_failed("T1:E1", Instant::now());

        // First backoff: 5s.
        assert!(store.drain_ready(Instant::now()).is_empty());
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(store.drain_ready(Instant::now()).len(), 1);
        store.mark_failed("T1:E1", Instant::now());

        // Second backoff: 15s.
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(store.drain_ready(Instant::now()).is_empty());
        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(store.drain_ready(Instant::now()).len(), 1);

        // Third failure exhausts the cap; entry is dropped.
        store.mark_failed("T1:E1", Instant::now());
        assert_eq!(store.len(), 0);
        tokio::time::advance(Duration::from_secs(120)).await;
        assert!(store.drain_ready(Instant::now()).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_entries_are_not_drained_twice() {
        let store = MemoryRetryStore::new();
        store.enqueue(event("T1", "E1"));

        assert_eq!(store.drain_ready(Instant::now()).len(), 1);
        // Same key still in flight: a second drain must skip it.
        assert!(store.drain_ready(Instant::now()).is_empty());

        store.mark_failed("T1:E1", Instant::now());
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(store.drain_ready(Instant::now()).len(), 1);
    }

    /// Store double that is permanently unreachable, counting apply attempts.
    #[derive(Default)]
    struct DownStore {
        calls: AtomicU32,
    }

    impl DownStore {
        fn unavailable(&self) -> StoreError {
            self.calls.fetch_add(1, Ordering::SeqCst);
            StoreError::Unavailable("connection refused".to_string())
        }
    }

    #[async_trait]
    impl OrderStore for DownStore {
        async fn find_order(&self, _: &str, _: &str) -> Result<Option<Order>, StoreError> {
            Err(self.unavailable())
        }

        async fn create_order(&self, _: &CanonicalOrderEvent) -> Result<Order, StoreError> {
            Err(self.unavailable())
        }

        async fn create_order_item(&self, _: Uuid, _: &OrderItem) -> Result<(), StoreError> {
            Err(self.unavailable())
        }

        async fn update_order_status(
            &self,
            _: &str,
            _: &str,
            _: OrderStatus,
        ) -> Result<Order, StoreError> {
            Err(self.unavailable())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn scheduler_retries_three_times_then_drops() {
        let store = Arc::new(DownStore::default());
        let retry: Arc<dyn RetryStore> = Arc::new(MemoryRetryStore::new());
        let processor = Arc::new(Processor::new(store.clone(), retry.clone()));

        retry.enqueue(event("T1", "E1"));
        let handle = spawn_retry_scheduler(processor, retry.clone());

        // Virtual time covers the full 5s + 15s schedule with margin.
        tokio::time::sleep(Duration::from_secs(120)).await;
        handle.abort();

        assert_eq!(store.calls.load(Ordering::SeqCst), 3);
        assert_eq!(retry.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn success_removes_entry() {
        let store = MemoryRetryStore::new();
        store.enqueue(event("T1", "E1"));
        store.enqueue(event("T2", "E1"));
        assert_eq!(store.len(), 2);

        store.mark_succeeded("T1:E1");
        assert_eq!(store.len(), 1);
        assert_eq!(store.drain_ready(Instant::now()).len(), 1);
    }
}
