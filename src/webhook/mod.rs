//! GitHub webhook relay: verify, format, and fan the event out to the
//! notification targets.

mod format;
mod payload;

pub use format::format_event;
pub use payload::WebhookPayload;

use crate::api::ApiState;
use crate::gateway::Gateway;
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::Sha256;
use tracing::{info, warn};
use wabot_channels::{FanOutItem, FanOutOutcome};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Default, Deserialize)]
pub struct WebhookQuery {
    pub jid: Option<String>,
}

/// `POST /github-webhook[?jid=<target>]`.
pub async fn github_webhook(
    State(state): State<ApiState>,
    Query(query): Query<WebhookQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let Some(event) = header(&headers, "x-github-event") else {
        warn!("webhook without X-GitHub-Event header");
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Missing X-GitHub-Event header"})),
        );
    };

    let secret = &state.gateway.config.api.webhook_secret;
    if !secret.is_empty()
        && !signature_valid(secret, header(&headers, "x-hub-signature-256"), &body)
    {
        warn!(event, "webhook signature mismatch");
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "Invalid webhook signature"})),
        );
    }

    let jid = query.jid.as_deref().map(str::trim).filter(|j| !j.is_empty());
    let (status, body) = relay(&state.gateway, event, &body, jid).await;
    (status, Json(body))
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Check `sha256=<hex>` against HMAC-SHA256 of the raw body. The comparison
/// is constant-time.
pub(crate) fn signature_valid(secret: &str, signature: Option<&str>, body: &[u8]) -> bool {
    let Some(hex_sig) = signature.and_then(|s| s.strip_prefix("sha256=")) else {
        return false;
    };
    let Ok(expected) = hex::decode(hex_sig) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Format one event and deliver it. `jid`, when present, replaces the
/// configured target list.
pub async fn relay(
    gateway: &Gateway,
    event: &str,
    body: &[u8],
    jid: Option<&str>,
) -> (StatusCode, Value) {
    let payload: WebhookPayload = match serde_json::from_slice(body) {
        Ok(p) => p,
        Err(e) => {
            warn!(event, "webhook payload is not valid JSON: {e}");
            return (
                StatusCode::BAD_REQUEST,
                json!({"error": "Failed to parse JSON payload"}),
            );
        }
    };
    let repository = payload.repository_name().to_string();
    info!(event, repository = %repository, "github webhook received");

    if !gateway.transport.is_connected() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            json!({"error": "WhatsApp client not connected"}),
        );
    }

    let targets: Vec<String> = match jid {
        Some(jid) => vec![jid.to_string()],
        None => gateway.config.notify.targets.clone(),
    };
    if targets.is_empty() {
        return (
            StatusCode::OK,
            json!({
                "status": "Webhook received but no notification targets configured",
                "event": event,
            }),
        );
    }

    let message = format_event(event, &payload);
    let items = targets
        .iter()
        .map(|raw| FanOutItem {
            raw: raw.clone(),
            target: gateway.resolver.resolve(raw),
            text: message.clone(),
        })
        .collect();

    let outcomes = gateway
        .delivery
        .fan_out(
            items,
            gateway.config.delivery.webhook_attempts,
            gateway.webhook_pacing(),
        )
        .await;

    let sent = outcomes.iter().filter(|o| o.is_success()).count();
    info!(event, sent, total = outcomes.len(), "github notification relayed");

    (
        StatusCode::OK,
        json!({
            "status": "Webhook processed",
            "event": event,
            "repository": repository,
            "targets_sent": sent,
            "total_targets": outcomes.len(),
            "custom_jid": jid.is_some(),
            "target_source": if jid.is_some() { "query_parameter" } else { "environment" },
            "results": outcomes.iter().map(result_json).collect::<Vec<_>>(),
        }),
    )
}

fn result_json(outcome: &FanOutOutcome) -> Value {
    let mut entry = json!({
        "target": outcome
            .target
            .as_ref()
            .map_or(outcome.raw.as_str(), |t| t.identifier.as_str()),
        "success": outcome.is_success(),
    });
    if let Some(target) = &outcome.target {
        entry["target_type"] = json!(target.kind.as_str());
    }
    if let Some(err) = outcome.error_text() {
        entry["error"] = json!(err);
    }
    entry
}
