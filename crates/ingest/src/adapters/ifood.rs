//! iFood order webhook adapter.
//!
//! Wire shape: `{ id, event?, consumer: { name, phone, email }, deliveryAddress:
//! { address }, items: [{ description, quantity, price }], total }`. Items carry
//! `description` rather than `name`, and the payload has no subtotal of its
//! own, so we derive it from the line items.

use chrono::Utc;
use domain::{CanonicalOrderEvent, Customer, DeliveryAddress, OrderItem, SourcePlatform};
use serde_json::Value;

use super::{event_type_or_created, money, quantity, text, DEFAULT_CUSTOMER_NAME, DEFAULT_DELIVERY_FEE};
use crate::error::AdapterError;

pub fn normalize(raw: &Value, tenant_id: &str) -> Result<CanonicalOrderEvent, AdapterError> {
    let external_id = text(raw, "id")
        .ok_or(AdapterError::MissingField("id"))?
        .to_string();
    let raw_items = raw
        .get("items")
        .and_then(|v| v.as_array())
        .ok_or(AdapterError::MissingField("items"))?;

    let consumer = raw.get("consumer");
    let customer = Customer {
        name: consumer
            .and_then(|c| text(c, "name"))
            .unwrap_or(DEFAULT_CUSTOMER_NAME)
            .to_string(),
        phone: consumer
            .and_then(|c| text(c, "phone"))
            .unwrap_or_default()
            .to_string(),
        email: consumer
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
            name: text(it, "description").unwrap_or("Item").to_string(),
            quantity: qty,
            unit_price,
            notes: None,
        });
    }

    let delivery_fee = money(raw.get("deliveryFee")).unwrap_or(DEFAULT_DELIVERY_FEE);
    let total = money(raw.get("total")).unwrap_or(subtotal + delivery_fee);

    Ok(CanonicalOrderEvent {
        event_type: event_type_or_created(raw),
        source_platform: SourcePlatform::Ifood,
        external_id: external_id.clone(),
        tenant_id: tenant_id.to_string(),
        customer,
        delivery_address: DeliveryAddress {
            address: raw
                .get("deliveryAddress")
                .and_then(|a| text(a, "address"))
                .unwrap_or_default()
                .to_string(),
            latitude: None,
            longitude: None,
        },
        items,
        subtotal,
        delivery_fee,
        total,
        payment_method: "ifood".to_string(),
        order_notes: Some(format!("IFOOD Order - ID: {external_id}")),
        raw_payload: raw.clone(),
        timestamp: Utc::now(),
    })
}
