//! Inbound webhook endpoints, one per marketplace, path-scoped by tenant.
//! Handlers only translate processor outcomes into HTTP: 2xx for anything the
//! marketplace should stop resending, 4xx for validation failures.

use axum::body::Bytes;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use domain::SourcePlatform;
use ingest::processor::{Outcome, RejectReason};
use serde_json::{json, Value};

use crate::state::AppState;

pub fn router(_state: AppState) -> Router<AppState> {
    Router::new()
        .route("/webhooks/ifood/:tenant_id", post(handle_ifood_webhook))
        .route("/webhooks/ubereats/:tenant_id", post(handle_ubereats_webhook))
        .route(
            "/webhooks/quero-delivery/:tenant_id",
            post(handle_quero_webhook),
        )
}

async fn handle_ifood_webhook(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    handle_platform_webhook(
        state,
        SourcePlatform::Ifood,
        tenant_id,
        "x-ifood-signature",
        headers,
        body,
    )
    .await
}

async fn handle_ubereats_webhook(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    handle_platform_webhook(
        state,
        SourcePlatform::Ubereats,
        tenant_id,
        "x-ubereats-signature",
        headers,
        body,
    )
    .await
}

async fn handle_quero_webhook(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    handle_platform_webhook(
        state,
        SourcePlatform::QueroDelivery,
        tenant_id,
        "x-quero-signature",
        headers,
        body,
    )
    .await
}

async fn handle_platform_webhook(
    state: AppState,
    platform: SourcePlatform,
    tenant_id: String,
    signature_header: &str,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let secret = state.config.secret_for(&tenant_id, platform);
    if state.config.strict_signatures && secret.is_none() {
        tracing::warn!(
            platform = platform.as_str(),
            %tenant_id,
            "strict mode: no secret provisioned, rejecting"
        );
        return unauthorized();
    }
    let signature = headers.get(signature_header).and_then(|v| v.to_str().ok());

    let outcome = state
        .processor
        .process_webhook(platform, &tenant_id, &body, signature, secret)
        .await;

    match outcome {
        Outcome::Applied { order_id } => (
            StatusCode::OK,
            Json(json!({ "success": true, "orderId": order_id })),
        ),
        Outcome::Duplicate => (
            StatusCode::OK,
            Json(json!({ "success": true, "duplicate": true })),
        ),
        Outcome::Queued => (
            StatusCode::OK,
            Json(json!({ "success": true, "queued": true })),
        ),
        Outcome::Ignored { reason } | Outcome::Failed { reason } => (
            StatusCode::OK,
            Json(json!({ "success": false, "error": reason })),
        ),
        Outcome::Rejected(RejectReason::MalformedPayload(e)) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "error": e })),
        ),
        Outcome::Rejected(RejectReason::InvalidSignature) => unauthorized(),
    }
}

/// Never detail what part of the validation failed.
fn unauthorized() -> (StatusCode, Json<Value>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "success": false, "error": "invalid webhook signature" })),
    )
}
