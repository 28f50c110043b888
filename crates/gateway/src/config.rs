//! Tenant registry. A full deployment keeps tenants and their webhook
//! credentials in the platform database; that layer is outside this service,
//! so the gateway reads a TOML registry instead:
//!
//! ```toml
//! strict_signatures = false
//!
//! [tenants.T1]
//! ifood_secret = "..."
//!
//! [tenants.T1.outbound]
//! enabled = true
//! url = "https://printer.example/hook"
//! events = ["order.ready", "order.cancelled"]
//! ```

use std::collections::HashMap;

use domain::SourcePlatform;
use ingest::dispatcher::{OutboundConfigSource, OutboundWebhookConfig};
use serde::Deserialize;

const CONFIG_ENV: &str = "GATEWAY_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "gateway.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayConfig {
    /// Reject webhooks for tenants without a provisioned secret instead of
    /// accepting them unsigned (the fail-open default).
    #[serde(default)]
    pub strict_signatures: bool,
    #[serde(default)]
    pub tenants: HashMap<String, TenantConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TenantConfig {
    pub ifood_secret: Option<String>,
    pub ubereats_secret: Option<String>,
    pub quero_secret: Option<String>,
    pub outbound: Option<OutboundWebhookConfig>,
}

impl GatewayConfig {
    /// Load from `GATEWAY_CONFIG` (default `gateway.toml`). A missing file is
    /// not fatal: the gateway starts with an empty registry and fail-open
    /// signatures, which suits local development.
    pub fn load() -> Self {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        match std::fs::read_to_string(&path) {
            Ok(text) => match toml::from_str(&text) {
                Ok(config) => {
                    tracing::info!(%path, "tenant registry loaded");
                    config
                }
                Err(e) => {
                    tracing::error!(%path, error = %e, "invalid tenant registry, starting empty");
                    Self::default()
                }
            },
            Err(_) => {
                tracing::warn!(%path, "no tenant registry file, starting with empty registry");
                Self::default()
            }
        }
    }

    pub fn secret_for(&self, tenant_id: &str, platform: SourcePlatform) -> Option<&str> {
        let tenant = self.tenants.get(tenant_id)?;
        match platform {
            SourcePlatform::Ifood => tenant.ifood_secret.as_deref(),
            SourcePlatform::Ubereats => tenant.ubereats_secret.as_deref(),
            SourcePlatform::QueroDelivery => tenant.quero_secret.as_deref(),
            SourcePlatform::Direct => None,
        }
    }
}

impl OutboundConfigSource for GatewayConfig {
    fn outbound_for(&self, tenant_id: &str) -> Option<OutboundWebhookConfig> {
        self.tenants.get(tenant_id)?.outbound.clone()
    }
}
