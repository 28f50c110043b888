//! Platform adapters: pure functions translating a marketplace's wire payload
//! into the canonical order event. Adapters are total over syntactically valid
//! payloads; only a missing order identifier or item list is an error.

use domain::{CanonicalOrderEvent, OrderEventType, SourcePlatform};
use serde_json::Value;

use crate::error::AdapterError;

pub mod ifood;
pub mod quero_delivery;
pub mod ubereats;

/// Fallback customer name when the platform omits one.
pub const DEFAULT_CUSTOMER_NAME: &str = "Cliente";

/// Flat delivery fee applied when the platform does not supply one.
pub const DEFAULT_DELIVERY_FEE: f64 = 5.0;

pub fn normalize(
    platform: SourcePlatform,
    raw: &Value,
    tenant_id: &str,
) -> Result<Normalized, AdapterError> {
    match platform {
        SourcePlatform::Ifood => ifood::normalize(raw, tenant_id).map(Normalized::Event),
        SourcePlatform::Ubereats => ubereats::normalize(raw, tenant_id).map(Normalized::Event),
        SourcePlatform::QueroDelivery => quero_delivery::normalize(raw, tenant_id),
        SourcePlatform::Direct => Err(AdapterError::Malformed(
            "direct orders do not arrive via webhook".to_string(),
        )),
    }
}

/// Adapter result. Quero Delivery distinguishes unknown event discriminants as
/// a soft failure that is acknowledged but never applied or retried.
#[derive(Debug)]
pub enum Normalized {
    Event(CanonicalOrderEvent),
    UnknownEvent(String),
}

/// Accept both JSON numbers and numeric strings; marketplaces are not
/// consistent about which they send for money fields.
pub(crate) fn money(v: Option<&Value>) -> Option<f64> {
    let v = v?;
    v.as_f64()
        .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
}

pub(crate) fn text<'a>(v: &'a Value, field: &str) -> Option<&'a str> {
    v.get(field).and_then(|x| x.as_str())
}

pub(crate) fn quantity(v: &Value) -> i32 {
    v.get("quantity")
        .and_then(|q| q.as_i64())
        .map(|q| q.max(1) as i32)
        .unwrap_or(1)
}

/// Parse an explicit `event` field where present; iFood and UberEats order
/// webhooks default to `order.created` when it is absent.
pub(crate) fn event_type_or_created(raw: &Value) -> OrderEventType {
    match raw.get("event").and_then(|e| e.as_str()) {
        Some("order.updated") => OrderEventType::Updated,
        Some("order.cancelled") => OrderEventType::Cancelled,
        _ => OrderEventType::Created,
    }
}
