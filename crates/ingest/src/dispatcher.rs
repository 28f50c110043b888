//! Outbound webhook dispatcher: delivers order lifecycle notifications to a
//! tenant-configured endpoint (kitchen printer bridge, status webhook) with a
//! bounded in-process retry loop.
//!
//! Delivery is best-effort by contract. The trigger path spawns the delivery
//! as a detached task and never awaits it, so a dead endpoint cannot slow down
//! or fail the order mutation that caused the notification.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use domain::{Order, OrderStatus};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::signature;

pub const MAX_ATTEMPTS: u32 = 3;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const SIGNATURE_HEADER: &str = "x-webhook-signature";

/// Lifecycle transitions a tenant can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboundEvent {
    Ready,
    Cancelled,
    Completed,
}

impl OutboundEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboundEvent::Ready => "order.ready",
            OutboundEvent::Cancelled => "order.cancelled",
            OutboundEvent::Completed => "order.completed",
        }
    }

    /// Which store status transitions are watched for outbound notification.
    pub fn from_status(status: OrderStatus) -> Option<Self> {
        match status {
            OrderStatus::Ready => Some(OutboundEvent::Ready),
            OrderStatus::Cancelled => Some(OutboundEvent::Cancelled),
            OrderStatus::Delivered => Some(OutboundEvent::Completed),
            _ => None,
        }
    }
}

fn default_method() -> String {
    "POST".to_string()
}

fn default_events() -> Vec<String> {
    vec!["order.ready".to_string(), "order.cancelled".to_string()]
}

/// Per-tenant outbound webhook settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundWebhookConfig {
    #[serde(default)]
    pub enabled: bool,
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub secret: Option<String>,
    /// Event allow-list; only subscribed lifecycle transitions are delivered.
    #[serde(default = "default_events")]
    pub events: Vec<String>,
}

/// Where the dispatcher finds a tenant's outbound settings. The gateway backs
/// this with its TOML registry; a real deployment would back it with the
/// tenant table.
pub trait OutboundConfigSource: Send + Sync {
    fn outbound_for(&self, tenant_id: &str) -> Option<OutboundWebhookConfig>;
}

/// One attempt batch to deliver a lifecycle notification.
#[derive(Debug, Clone)]
pub struct OutboundWebhookJob {
    pub tenant_id: String,
    pub url: String,
    pub method: String,
    pub signing_secret: Option<String>,
    pub payload: Value,
    pub max_attempts: u32,
}

#[derive(Debug, Clone)]
pub struct DeliveryReport {
    pub success: bool,
    pub attempts: u32,
    pub last_error: Option<String>,
}

/// Cheap to clone: the reqwest client and the config source are both handles.
#[derive(Clone)]
pub struct Dispatcher {
    client: reqwest::Client,
    config: Arc<dyn OutboundConfigSource>,
}

impl Dispatcher {
    pub fn new(config: Arc<dyn OutboundConfigSource>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("failed to build HTTP client");
        Self { client, config }
    }

    /// Fire a notification for a watched transition if the tenant has webhook
    /// delivery enabled and is subscribed to the event. Spawns the delivery
    /// detached; the caller's order mutation never waits on it.
    pub fn trigger(&self, order: &Order, event: OutboundEvent) {
        let Some(cfg) = self.config.outbound_for(&order.tenant_id) else {
            return;
        };
        if !cfg.enabled || cfg.url.is_empty() {
            return;
        }
        if !cfg.events.iter().any(|e| e == event.as_str()) {
            return;
        }

        let job = OutboundWebhookJob {
            tenant_id: order.tenant_id.clone(),
            url: cfg.url,
            method: cfg.method,
            signing_secret: cfg.secret,
            payload: notification_payload(order, event),
            max_attempts: MAX_ATTEMPTS,
        };

        let dispatcher = self.clone();
        tokio::spawn(async move {
            let report = dispatcher.deliver(job).await;
            if !report.success {
                tracing::error!(
                    attempts = report.attempts,
                    last_error = report.last_error.as_deref().unwrap_or("unknown"),
                    "outbound webhook delivery failed"
                );
            }
        });
    }

    /// Deliver a job with in-process exponential backoff (1s, 2s, 4s).
    /// Exhaustion is not an error to the caller; the report says what happened.
    pub async fn deliver(&self, job: OutboundWebhookJob) -> DeliveryReport {
        let method = job
            .method
            .parse::<reqwest::Method>()
            .unwrap_or(reqwest::Method::POST);
        let body = job.payload.to_string();

        let mut last_error = None;
        for attempt in 1..=job.max_attempts {
            let mut request = self
                .client
                .request(method.clone(), &job.url)
                .header("content-type", "application/json")
                .body(body.clone());
            if let Some(secret) = &job.signing_secret {
                request = request.header(SIGNATURE_HEADER, signature::sign(body.as_bytes(), secret));
            }

            match request.send().await {
                Ok(resp) if resp.status().is_success() => {
                    tracing::info!(
                        tenant_id = %job.tenant_id,
                        url = %job.url,
                        attempt,
                        "outbound webhook delivered"
                    );
                    return DeliveryReport {
                        success: true,
                        attempts: attempt,
                        last_error: None,
                    };
                }
                Ok(resp) => {
                    last_error = Some(format!("HTTP {}", resp.status()));
                }
                Err(e) => {
                    last_error = Some(e.to_string());
                }
            }

            if attempt < job.max_attempts {
                let delay = Duration::from_secs(1 << (attempt - 1));
                tracing::warn!(
                    tenant_id = %job.tenant_id,
                    attempt,
                    max = job.max_attempts,
                    delay_secs = delay.as_secs(),
                    "outbound webhook attempt failed, backing off"
                );
                tokio::time::sleep(delay).await;
            }
        }

        DeliveryReport {
            success: false,
            attempts: job.max_attempts,
            last_error,
        }
    }
}

/// Payload shape the printer/status integrations expect.
fn notification_payload(order: &Order, event: OutboundEvent) -> Value {
    serde_json::json!({
        "event": event.as_str(),
        "timestamp": Utc::now().to_rfc3339(),
        "tenantId": order.tenant_id,
        "data": {
            "orderId": order.id,
            "customerName": order.customer_name,
            "customerPhone": order.customer_phone,
            "deliveryAddress": order.delivery_address,
            "total": order.total,
            "status": order.status.as_str(),
            "items": order.items,
        }
    })
}
