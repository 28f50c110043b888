use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Marketplace (or direct channel) an order event originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourcePlatform {
    Ifood,
    Ubereats,
    QueroDelivery,
    Direct,
}

impl SourcePlatform {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourcePlatform::Ifood => "ifood",
            SourcePlatform::Ubereats => "ubereats",
            SourcePlatform::QueroDelivery => "quero_delivery",
            SourcePlatform::Direct => "direct",
        }
    }
}

/// Lifecycle event carried by a webhook, normalized across platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderEventType {
    #[serde(rename = "order.created")]
    Created,
    #[serde(rename = "order.updated")]
    Updated,
    #[serde(rename = "order.cancelled")]
    Cancelled,
    #[serde(rename = "order.accepted")]
    Accepted,
    #[serde(rename = "order.ready")]
    Ready,
    #[serde(rename = "order.in_transit")]
    InTransit,
    #[serde(rename = "order.delivered")]
    Delivered,
}

impl OrderEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderEventType::Created => "order.created",
            OrderEventType::Updated => "order.updated",
            OrderEventType::Cancelled => "order.cancelled",
            OrderEventType::Accepted => "order.accepted",
            OrderEventType::Ready => "order.ready",
            OrderEventType::InTransit => "order.in_transit",
            OrderEventType::Delivered => "order.delivered",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Accepted,
    Ready,
    InTransit,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Accepted => "accepted",
            OrderStatus::Ready => "ready",
            OrderStatus::InTransit => "in_transit",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryAddress {
    pub address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub name: String,
    pub quantity: i32,
    pub unit_price: f64,
    pub notes: Option<String>,
}

/// Platform-independent representation of one order lifecycle occurrence.
/// Every adapter produces this shape; the ingestion processor consumes it
/// without knowing which marketplace it came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalOrderEvent {
    pub event_type: OrderEventType,
    pub source_platform: SourcePlatform,
    /// The source platform's own order identifier. Together with `tenant_id`
    /// this forms the idempotency key for duplicate detection.
    pub external_id: String,
    pub tenant_id: String,
    pub customer: Customer,
    pub delivery_address: DeliveryAddress,
    pub items: Vec<OrderItem>,
    pub subtotal: f64,
    pub delivery_fee: f64,
    pub total: f64,
    pub payment_method: String,
    pub order_notes: Option<String>,
    /// Original unparsed payload, retained for audit/debug.
    pub raw_payload: Value,
    pub timestamp: DateTime<Utc>,
}

impl CanonicalOrderEvent {
    pub fn idempotency_key(&self) -> String {
        format!("{}:{}", self.tenant_id, self.external_id)
    }
}

/// Order summary as held by the order store. Returned from create/update so
/// callers can build outbound notification payloads without a second lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub tenant_id: String,
    pub external_id: String,
    pub source_platform: SourcePlatform,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: String,
    pub delivery_address: String,
    pub status: OrderStatus,
    pub subtotal: f64,
    pub delivery_fee: f64,
    pub total: f64,
    pub payment_method: String,
    pub order_notes: Option<String>,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
}

/// Structured fact emitted after every successful order mutation, consumed by
/// the notification fan-out (WebSocket broadcaster, push) outside this core.
#[derive(Debug, Clone, Serialize)]
pub struct OrderChanged {
    pub tenant_id: String,
    pub order_id: Uuid,
    pub external_id: String,
    pub status: OrderStatus,
}
