//! UberEats order webhook adapter.
//!
//! Wire shape: `{ order_id, event?, customer: { name, phone, email },
//! delivery_address, items: [{ title, quantity, price }], order_total }`.
//! Same canonical target as iFood; only the field names differ.

use chrono::Utc;
use domain::{CanonicalOrderEvent, Customer, DeliveryAddress, OrderItem, SourcePlatform};
use serde_json::Value;

use super::{event_type_or_created, money, quantity, text, DEFAULT_CUSTOMER_NAME, DEFAULT_DELIVERY_FEE};
use crate::error::AdapterError;

pub fn normalize(raw: &Value, tenant_id: &str) -> Result<CanonicalOrderEvent, AdapterError> {
    let external_id = text(raw, "order_id")
        .ok_or(AdapterError::MissingField("order_id"))?
        .to_string();
    let raw_items = raw
        .get("items")
        .and_then(|v| v.as_array())
        .ok_or(AdapterError::MissingField("items"))?;

    let customer_obj = raw.get("customer");
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
    let mut subtotal = 0.0;
    for it in raw_items {
        let unit_price = money(it.get("price")).unwrap_or(0.0);
        let qty = quantity(it);
        subtotal += unit_price * qty as f64;
        items.push(OrderItem {
            name: text(it, "title").unwrap_or("Item").to_string(),
            quantity: qty,
            unit_price,
            notes: None,
        });
    }

    let delivery_fee = money(raw.get("delivery_fee")).unwrap_or(DEFAULT_DELIVERY_FEE);
    let total = money(raw.get("order_total")).unwrap_or(subtotal + delivery_fee);

    Ok(CanonicalOrderEvent {
        event_type: event_type_or_created(raw),
        source_platform: SourcePlatform::Ubereats,
        external_id: external_id.clone(),
        tenant_id: tenant_id.to_string(),
        customer,
        // UberEats sends the address as one free-text string.
        delivery_address: DeliveryAddress {
            address: text(raw, "delivery_address").unwrap_or_default().to_string(),
            latitude: None,
            longitude: None,
        },
        items,
        subtotal,
        delivery_fee,
        total,
        payment_method: "ubereats".to_string(),
        order_notes: Some(format!("UBEREATS Order - ID: {external_id}")),
        raw_payload: raw.clone(),
        timestamp: Utc::now(),
    })
}
