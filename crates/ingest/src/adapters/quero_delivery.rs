//! Quero Delivery marketplace webhook adapter.
//!
//! Unlike iFood/UberEats, Quero sends the full order lifecycle over one
//! endpoint: `{ event, order: {...}, timestamp }` where `event` is the
//! discriminant. Unknown discriminants are a soft failure: acknowledged and
//! logged, never applied or retried. The allow-list below is versioned so a
//! future lifecycle event added by the marketplace shows up as an explicit
//! decision here, not as silent drift.

use chrono::{DateTime, Utc};
use domain::{CanonicalOrderEvent, Customer, DeliveryAddress, OrderEventType, OrderItem, SourcePlatform};
use serde_json::Value;

use super::{money, quantity, text, Normalized, DEFAULT_CUSTOMER_NAME};
use crate::error::AdapterError;

/// Lifecycle events this processor version understands.
const KNOWN_EVENTS: &[(&str, OrderEventType)] = &[
    ("order.created", OrderEventType::Created),
    ("order.accepted", OrderEventType::Accepted),
    ("order.ready", OrderEventType::Ready),
    ("order.in_transit", OrderEventType::InTransit),
    ("order.delivered", OrderEventType::Delivered),
    ("order.cancelled", OrderEventType::Cancelled),
];

pub fn normalize(raw: &Value, tenant_id: &str) -> Result<Normalized, AdapterError> {
    let event = text(raw, "event").ok_or(AdapterError::MissingField("event"))?;
    let Some(event_type) = KNOWN_EVENTS
        .iter()
        .find(|(name, _)| *name == event)
        .map(|(_, t)| *t)
    else {
        tracing::info!(event, "unknown Quero Delivery event, acknowledging without processing");
        return Ok(Normalized::UnknownEvent(event.to_string()));
    };

    let order = raw.get("order").ok_or(AdapterError::MissingField("order"))?;
    let external_id = text(order, "id")
        .ok_or(AdapterError::MissingField("order.id"))?
        .to_string();
    let raw_items = order
        .get("items")
        .and_then(|v| v.as_array())
        .ok_or(AdapterError::MissingField("order.items"))?;

    let customer_obj = order.get("customer");
    let customer = Customer {
        name: customer_obj
            .and_then(|c| text(c, "name"))
            .unwrap_or(DEFAULT_CUSTOMER_NAME)
            .to_string(),
        phone: customer_obj
            .and_then(|c| text(c, "phone"))
            .unwrap_or_default()
            .to_string(),
        email: customer_obj
            .and_then(|c| text(c, "email"))
            .filter(|e| !e.is_empty())
            .map(str::to_string),
    };

    let mut items = Vec::with_capacity(raw_items.len());
    let mut derived_subtotal = 0.0;
    for it in raw_items {
        let unit_price = money(it.get("unit_price")).unwrap_or(0.0);
        let qty = quantity(it);
        derived_subtotal += unit_price * qty as f64;
        items.push(OrderItem {
            name: text(it, "name").unwrap_or("Item").to_string(),
            quantity: qty,
            unit_price,
            notes: text(it, "special_instructions").map(str::to_string),
        });
    }

    let delivery = order.get("delivery");
    let delivery_address = DeliveryAddress {
        address: delivery
            .and_then(|d| text(d, "address"))
            .unwrap_or_default()
            .to_string(),
        latitude: delivery.and_then(|d| d.get("latitude")).and_then(|v| v.as_f64()),
        longitude: delivery.and_then(|d| d.get("longitude")).and_then(|v| v.as_f64()),
    };

    let subtotal = money(order.get("subtotal")).unwrap_or(derived_subtotal);
    let delivery_fee = money(order.get("delivery_fee")).unwrap_or(0.0);
    let total = money(order.get("total")).unwrap_or(subtotal + delivery_fee);

    let notes = text(order, "notes");
    let order_notes = match notes {
        Some(n) => format!("Quero Delivery Order - ID: {external_id} - {n}"),
        None => format!("Quero Delivery Order - ID: {external_id}"),
    };

    let timestamp = order
        .get("created_at")
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    Ok(Normalized::Event(CanonicalOrderEvent {
        event_type,
        source_platform: SourcePlatform::QueroDelivery,
        external_id,
        tenant_id: tenant_id.to_string(),
        customer,
        delivery_address,
        items,
        subtotal,
        delivery_fee,
        total,
        payment_method: text(order, "payment_method").unwrap_or("quero_delivery").to_string(),
        order_notes: Some(order_notes),
        raw_payload: raw.clone(),
        timestamp,
    }))
}
