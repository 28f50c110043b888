//! Order-store collaborator seam. The real platform keeps orders in Postgres
//! behind its own service; this core only depends on the trait below. The
//! in-memory implementation backs tests and single-process deployments.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use domain::{CanonicalOrderEvent, Order, OrderItem, OrderStatus};
use uuid::Uuid;

use crate::error::StoreError;

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Look up an order by its idempotency key.
    async fn find_order(&self, tenant_id: &str, external_id: &str)
        -> Result<Option<Order>, StoreError>;

    /// Create an order from a canonical event. Must fail with
    /// `StoreError::Duplicate` when an order already exists for
    /// (tenant_id, external_id); near-simultaneous deliveries of the same
    /// external id race on this constraint, not on `find_order`.
    async fn create_order(&self, event: &CanonicalOrderEvent) -> Result<Order, StoreError>;

    async fn create_order_item(&self, order_id: Uuid, item: &OrderItem) -> Result<(), StoreError>;

    /// Update the status of an existing order. `StoreError::NotFound` when no
    /// order exists for the key (permanent), `StoreError::Unavailable` on
    /// connectivity trouble (transient).
    async fn update_order_status(
        &self,
        tenant_id: &str,
        external_id: &str,
        status: OrderStatus,
    ) -> Result<Order, StoreError>;
}

/// Process-local order store keyed by (tenant_id, external_id).
#[derive(Default)]
pub struct MemoryStore {
    orders: Mutex<HashMap<(String, String), Order>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn order_count(&self) -> usize {
        self.orders.lock().expect("orders lock poisoned").len()
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn find_order(
        &self,
        tenant_id: &str,
        external_id: &str,
    ) -> Result<Option<Order>, StoreError> {
        let orders = self.orders.lock().expect("orders lock poisoned");
        Ok(orders
            .get(&(tenant_id.to_string(), external_id.to_string()))
            .cloned())
    }

    async fn create_order(&self, event: &CanonicalOrderEvent) -> Result<Order, StoreError> {
        let key = (event.tenant_id.clone(), event.external_id.clone());
        let mut orders = self.orders.lock().expect("orders lock poisoned");
        if orders.contains_key(&key) {
            return Err(StoreError::Duplicate);
        }
        let order = Order {
            id: Uuid::new_v4(),
            tenant_id: event.tenant_id.clone(),
            external_id: event.external_id.clone(),
            source_platform: event.source_platform,
            customer_name: event.customer.name.clone(),
            customer_phone: event.customer.phone.clone(),
            customer_email: event.customer.email.clone().unwrap_or_default(),
            delivery_address: event.delivery_address.address.clone(),
            status: OrderStatus::Confirmed,
            subtotal: event.subtotal,
            delivery_fee: event.delivery_fee,
            total: event.total,
            payment_method: event.payment_method.clone(),
            order_notes: event.order_notes.clone(),
            items: Vec::new(),
            created_at: Utc::now(),
        };
        orders.insert(key, order.clone());
        Ok(order)
    }

    async fn create_order_item(&self, order_id: Uuid, item: &OrderItem) -> Result<(), StoreError> {
        let mut orders = self.orders.lock().expect("orders lock poisoned");
        let order = orders
            .values_mut()
            .find(|o| o.id == order_id)
            .ok_or(StoreError::NotFound)?;
        order.items.push(item.clone());
        Ok(())
    }

    async fn update_order_status(
        &self,
        tenant_id: &str,
        external_id: &str,
        status: OrderStatus,
    ) -> Result<Order, StoreError> {
        let mut orders = self.orders.lock().expect("orders lock poisoned");
        let order = orders
            .get_mut(&(tenant_id.to_string(), external_id.to_string()))
            .ok_or(StoreError::NotFound)?;
        order.status = status;
        Ok(order.clone())
    }
}
