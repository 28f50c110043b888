//! Webhook ingestion processor: validate, normalize, apply idempotently,
//! classify the outcome. All failures are contained here; the HTTP boundary
//! only needs to know whether to ack (2xx) or reject (4xx).

use std::sync::Arc;

use domain::{
    CanonicalOrderEvent, Order, OrderChanged, OrderEventType, OrderStatus, SourcePlatform,
};
use serde_json::Value;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::adapters::{self, Normalized};
use crate::dispatcher::{Dispatcher, OutboundEvent};
use crate::error::StoreError;
use crate::retry::RetryStore;
use crate::signature;
use crate::store::OrderStore;

/// Terminal classification of one inbound webhook delivery.
#[derive(Debug)]
pub enum Outcome {
    Applied { order_id: Uuid },
    /// Idempotency key already applied. Acked as success so the marketplace
    /// stops resending.
    Duplicate,
    /// Transient store failure; parked on the retry queue and acked. We prefer
    /// internal queuing over sender-side retry, which we cannot control.
    Queued,
    /// Soft-ignored (e.g. unknown marketplace event). Acked and logged.
    Ignored { reason: String },
    /// Permanent store failure. Acked so the sender stops, logged at error
    /// level, never retried.
    Failed { reason: String },
    /// Validation failure the sender should not resend.
    Rejected(RejectReason),
}

#[derive(Debug)]
pub enum RejectReason {
    InvalidSignature,
    MalformedPayload(String),
}

/// Store-apply classification, also the re-submission contract for the retry
/// scheduler.
#[derive(Debug)]
pub enum ApplyOutcome {
    Applied { order_id: Uuid },
    Duplicate,
    Transient { reason: String },
    Permanent { reason: String },
}

pub struct Processor {
    store: Arc<dyn OrderStore>,
    retry: Arc<dyn RetryStore>,
    dispatcher: Option<Arc<Dispatcher>>,
    changes: broadcast::Sender<OrderChanged>,
}

impl Processor {
    pub fn new(store: Arc<dyn OrderStore>, retry: Arc<dyn RetryStore>) -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            store,
            retry,
            dispatcher: None,
            changes,
        }
    }

    pub fn with_dispatcher(mut self, dispatcher: Arc<Dispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Subscribe to order-changed facts for downstream notification fan-out.
    pub fn subscribe_changes(&self) -> broadcast::Receiver<OrderChanged> {
        self.changes.subscribe()
    }

    /// Run one inbound delivery through the full pipeline.
    pub async fn process_webhook(
        &self,
        platform: SourcePlatform,
        tenant_id: &str,
        raw_body: &[u8],
        signature_header: Option<&str>,
        secret: Option<&str>,
    ) -> Outcome {
        if !signature::validate(raw_body, signature_header.unwrap_or(""), secret) {
            tracing::warn!(
                platform = platform.as_str(),
                tenant_id,
                "invalid webhook signature"
            );
            return Outcome::Rejected(RejectReason::InvalidSignature);
        }

        let raw: Value = match serde_json::from_slice(raw_body) {
            Ok(v) => v,
            Err(e) => {
                return Outcome::Rejected(RejectReason::MalformedPayload(format!(
                    "invalid JSON: {e}"
                )))
            }
        };

        let event = match adapters::normalize(platform, &raw, tenant_id) {
            Ok(Normalized::Event(event)) => event,
            Ok(Normalized::UnknownEvent(name)) => {
                return Outcome::Ignored {
                    reason: format!("unknown event: {name}"),
                }
            }
            Err(e) => {
                tracing::warn!(
                    platform = platform.as_str(),
                    tenant_id,
                    error = %e,
                    "rejecting malformed payload"
                );
                return Outcome::Rejected(RejectReason::MalformedPayload(e.to_string()));
            }
        };

        tracing::info!(
            platform = platform.as_str(),
            tenant_id,
            external_id = %event.external_id,
            event = event.event_type.as_str(),
            "processing webhook"
        );

        match self.apply(&event).await {
            ApplyOutcome::Applied { order_id } => Outcome::Applied { order_id },
            ApplyOutcome::Duplicate => {
                tracing::info!(
                    key = %event.idempotency_key(),
                    "duplicate delivery, acking without side effect"
                );
                Outcome::Duplicate
            }
            ApplyOutcome::Transient { reason } => {
                tracing::warn!(
                    key = %event.idempotency_key(),
                    %reason,
                    "transient store failure, queuing for retry"
                );
                self.retry.enqueue(event);
                Outcome::Queued
            }
            ApplyOutcome::Permanent { reason } => {
                tracing::error!(
                    key = %event.idempotency_key(),
                    %reason,
                    "permanent store failure, not retrying"
                );
                Outcome::Failed { reason }
            }
        }
    }

    /// Apply a canonical event against the order store. This is the step the
    /// retry scheduler re-runs; it must stay idempotent under repetition.
    pub async fn apply(&self, event: &CanonicalOrderEvent) -> ApplyOutcome {
        match event.event_type {
            OrderEventType::Created => self.apply_creation(event).await,
            other => {
                let status = status_for(other);
                self.apply_status_update(event, status).await
            }
        }
    }

    async fn apply_creation(&self, event: &CanonicalOrderEvent) -> ApplyOutcome {
        // Idempotency check first; the store's uniqueness constraint is still
        // the source of truth for concurrent duplicates.
        match self
            .store
            .find_order(&event.tenant_id, &event.external_id)
            .await
        {
            Ok(Some(_)) => return ApplyOutcome::Duplicate,
            Ok(None) => {}
            Err(e) => return classify(e),
        }

        let mut event = event.clone();
        let consistent_total = event.subtotal + event.delivery_fee;
        if (event.total - consistent_total).abs() > 0.005 {
            event.total = consistent_total;
        }

        let order = match self.store.create_order(&event).await {
            Ok(order) => order,
            // Lost a race with a concurrent delivery of the same external id.
            Err(StoreError::Duplicate) => return ApplyOutcome::Duplicate,
            Err(e) => return classify(e),
        };

        for item in &event.items {
            if let Err(e) = self.store.create_order_item(order.id, item).await {
                return classify(e);
            }
        }

        tracing::info!(
            order_id = %order.id,
            platform = event.source_platform.as_str(),
            "order created"
        );
        self.announce(&order);
        ApplyOutcome::Applied { order_id: order.id }
    }

    async fn apply_status_update(
        &self,
        event: &CanonicalOrderEvent,
        status: OrderStatus,
    ) -> ApplyOutcome {
        let order = match self
            .store
            .update_order_status(&event.tenant_id, &event.external_id, status)
            .await
        {
            Ok(order) => order,
            Err(e) => return classify(e),
        };

        tracing::info!(
            order_id = %order.id,
            status = status.as_str(),
            "order status updated"
        );
        self.announce(&order);
        ApplyOutcome::Applied { order_id: order.id }
    }

    /// Emit the order-changed fact and fire outbound notification for watched
    /// transitions. Both are fire-and-forget off the apply path.
    fn announce(&self, order: &Order) {
        let _ = self.changes.send(OrderChanged {
            tenant_id: order.tenant_id.clone(),
            order_id: order.id,
            external_id: order.external_id.clone(),
            status: order.status,
        });
        if let Some(dispatcher) = &self.dispatcher {
            if let Some(event) = OutboundEvent::from_status(order.status) {
                dispatcher.trigger(order, event);
            }
        }
    }
}

fn status_for(event_type: OrderEventType) -> OrderStatus {
    match event_type {
        OrderEventType::Created | OrderEventType::Updated => OrderStatus::Confirmed,
        OrderEventType::Accepted => OrderStatus::Accepted,
        OrderEventType::Ready => OrderStatus::Ready,
        OrderEventType::InTransit => OrderStatus::InTransit,
        OrderEventType::Delivered => OrderStatus::Delivered,
        OrderEventType::Cancelled => OrderStatus::Cancelled,
    }
}

fn classify(e: StoreError) -> ApplyOutcome {
    if e.is_transient() {
        ApplyOutcome::Transient {
            reason: e.to_string(),
        }
    } else {
        ApplyOutcome::Permanent {
            reason: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::{MemoryRetryStore, RetryStore as _};
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use domain::OrderItem;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Store double whose mutations fail transiently while the flag is up.
    struct FlakyStore {
        inner: MemoryStore,
        down: AtomicBool,
    }

    impl FlakyStore {
        fn new() -> Self {
            Self {
                inner: MemoryStore::new(),
                down: AtomicBool::new(false),
            }
        }

        fn set_down(&self, down: bool) {
            self.down.store(down, Ordering::SeqCst);
        }

        fn check(&self) -> Result<(), StoreError> {
            if self.down.load(Ordering::SeqCst) {
                Err(StoreError::Unavailable("connection refused".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl OrderStore for FlakyStore {
        async fn find_order(
            &self,
            tenant_id: &str,
            external_id: &str,
        ) -> Result<Option<Order>, StoreError> {
            self.check()?;
            self.inner.find_order(tenant_id, external_id).await
        }

        async fn create_order(&self, event: &CanonicalOrderEvent) -> Result<Order, StoreError> {
            self.check()?;
            self.inner.create_order(event).await
        }

        async fn create_order_item(
            &self,
            order_id: Uuid,
            item: &OrderItem,
        ) -> Result<(), StoreError> {
            self.check()?;
            self.inner.create_order_item(order_id, item).await
        }

        async fn update_order_status(
            &self,
            tenant_id: &str,
            external_id: &str,
            status: OrderStatus,
        ) -> Result<Order, StoreError> {
            self.check()?;
            self.inner.update_order_status(tenant_id, external_id, status).await
        }
    }

    fn ifood_body() -> Vec<u8> {
        json!({
            "id": "X1",
            "consumer": { "name": "Ana", "phone": "119" },
            "items": [{ "description": "Pizza", "quantity": 1, "price": 40 }],
            "total": 45
        })
        .to_string()
        .into_bytes()
    }

    fn processor_with(store: Arc<dyn OrderStore>) -> (Processor, Arc<MemoryRetryStore>) {
        let retry = Arc::new(MemoryRetryStore::new());
        (Processor::new(store, retry.clone()), retry)
    }

    #[tokio::test]
    async fn creates_order_then_detects_duplicate() {
        let store = Arc::new(MemoryStore::new());
        let (processor, _) = processor_with(store.clone());
        let body = ifood_body();

        let first = processor
            .process_webhook(SourcePlatform::Ifood, "T1", &body, None, None)
            .await;
        assert!(matches!(first, Outcome::Applied { .. }));
        assert_eq!(store.order_count(), 1);

        let second = processor
            .process_webhook(SourcePlatform::Ifood, "T1", &body, None, None)
            .await;
        assert!(matches!(second, Outcome::Duplicate));
        assert_eq!(store.order_count(), 1);
    }

    #[tokio::test]
    async fn same_external_id_is_scoped_per_tenant() {
        let store = Arc::new(MemoryStore::new());
        let (processor, _) = processor_with(store.clone());
        let body = ifood_body();

        let a = processor
            .process_webhook(SourcePlatform::Ifood, "T1", &body, None, None)
            .await;
        let b = processor
            .process_webhook(SourcePlatform::Ifood, "T2", &body, None, None)
            .await;
        assert!(matches!(a, Outcome::Applied { .. }));
        assert!(matches!(b, Outcome::Applied { .. }));
        assert_eq!(store.order_count(), 2);
    }

    #[tokio::test]
    async fn recomputes_inconsistent_total() {
        let store = Arc::new(MemoryStore::new());
        let (processor, _) = processor_with(store.clone());
        let body = json!({
            "id": "X9",
            "items": [{ "description": "Pizza", "quantity": 2, "price": 20 }],
            "total": 99.0
        })
        .to_string()
        .into_bytes();

        processor
            .process_webhook(SourcePlatform::Ifood, "T1", &body, None, None)
            .await;
        let order = store.find_order("T1", "X9").await.unwrap().unwrap();
        assert_eq!(order.subtotal, 40.0);
        assert_eq!(order.delivery_fee, 5.0);
        assert_eq!(order.total, 45.0);
    }

    #[tokio::test]
    async fn rejects_bad_signature_without_queuing() {
        let store = Arc::new(MemoryStore::new());
        let (processor, retry) = processor_with(store.clone());
        let body = ifood_body();

        let outcome = processor
            .process_webhook(
                SourcePlatform::Ifood,
                "T1",
                &body,
                Some("deadbeef"),
                Some("secret"),
            )
            .await;
        assert!(matches!(
            outcome,
            Outcome::Rejected(RejectReason::InvalidSignature)
        ));
        assert_eq!(store.order_count(), 0);
        assert_eq!(retry.len(), 0);
    }

    #[tokio::test]
    async fn accepts_valid_signature() {
        let store = Arc::new(MemoryStore::new());
        let (processor, _) = processor_with(store);
        let body = ifood_body();
        let sig = signature::sign(&body, "secret");

        let outcome = processor
            .process_webhook(SourcePlatform::Ifood, "T1", &body, Some(&sig), Some("secret"))
            .await;
        assert!(matches!(outcome, Outcome::Applied { .. }));
    }

    #[tokio::test]
    async fn malformed_payload_is_rejected_not_queued() {
        let store = Arc::new(MemoryStore::new());
        let (processor, retry) = processor_with(store);

        let outcome = processor
            .process_webhook(SourcePlatform::Ifood, "T1", b"{\"items\":[]}", None, None)
            .await;
        assert!(matches!(
            outcome,
            Outcome::Rejected(RejectReason::MalformedPayload(_))
        ));
        assert_eq!(retry.len(), 0);
    }

    #[tokio::test]
    async fn transient_failure_is_queued() {
        let store = Arc::new(FlakyStore::new());
        store.set_down(true);
        let (processor, retry) = processor_with(store.clone());

        let outcome = processor
            .process_webhook(SourcePlatform::Ifood, "T1", &ifood_body(), None, None)
            .await;
        assert!(matches!(outcome, Outcome::Queued));
        assert_eq!(retry.len(), 1);

        // Store comes back; re-applying the parked event succeeds.
        store.set_down(false);
        let parked = retry.drain_ready(tokio::time::Instant::now());
        assert_eq!(parked.len(), 1);
        let applied = processor.apply(&parked[0]).await;
        assert!(matches!(applied, ApplyOutcome::Applied { .. }));
    }

    #[tokio::test]
    async fn update_for_missing_order_is_permanent() {
        let store = Arc::new(MemoryStore::new());
        let (processor, retry) = processor_with(store);
        let body = json!({
            "event": "order.cancelled",
            "order": {
                "id": "Q9",
                "items": [],
                "delivery": { "address": "" },
                "total": 0
            }
        })
        .to_string()
        .into_bytes();

        let outcome = processor
            .process_webhook(SourcePlatform::QueroDelivery, "T1", &body, None, None)
            .await;
        assert!(matches!(outcome, Outcome::Failed { .. }));
        assert_eq!(retry.len(), 0);
    }

    #[tokio::test]
    async fn unknown_quero_event_is_ignored() {
        let store = Arc::new(MemoryStore::new());
        let (processor, retry) = processor_with(store.clone());
        let body = json!({
            "event": "order.teleported",
            "order": { "id": "Q1", "items": [] }
        })
        .to_string()
        .into_bytes();

        let outcome = processor
            .process_webhook(SourcePlatform::QueroDelivery, "T1", &body, None, None)
            .await;
        assert!(matches!(outcome, Outcome::Ignored { .. }));
        assert_eq!(store.order_count(), 0);
        assert_eq!(retry.len(), 0);
    }

    #[tokio::test]
    async fn lifecycle_update_changes_status_and_broadcasts() {
        let store = Arc::new(MemoryStore::new());
        let (processor, _) = processor_with(store.clone());
        let mut changes = processor.subscribe_changes();

        processor
            .process_webhook(SourcePlatform::Ifood, "T1", &ifood_body(), None, None)
            .await;
        let body = json!({
            "event": "order.ready",
            "order": { "id": "X1", "items": [] }
        })
        .to_string()
        .into_bytes();
        let outcome = processor
            .process_webhook(SourcePlatform::QueroDelivery, "T1", &body, None, None)
            .await;
        assert!(matches!(outcome, Outcome::Applied { .. }));

        let order = store.find_order("T1", "X1").await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Ready);

        let created = changes.recv().await.unwrap();
        assert_eq!(created.status, OrderStatus::Confirmed);
        let readied = changes.recv().await.unwrap();
        assert_eq!(readied.status, OrderStatus::Ready);
    }
}
