//! HTTP API: health, group listing, direct and bulk sends, the GitHub
//! webhook relay and the market bulletin.
//!
//! Spawned as a background task by `Gateway::run()`. Every handler shares the
//! gateway's transport and delivery engine.

use crate::gateway::Gateway;
use crate::webhook;
use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};
use wabot_channels::{FanOutItem, FanOutOutcome};

type ApiError = (StatusCode, Json<Value>);

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub(crate) gateway: Arc<Gateway>,
}

#[derive(Debug, Deserialize)]
struct SendMessageRequest {
    #[serde(default)]
    secret: String,
    target: String,
    message: String,
}

#[derive(Debug, Deserialize)]
struct BulkSameRequest {
    #[serde(default)]
    secret: String,
    targets: Vec<String>,
    message: String,
}

#[derive(Debug, Deserialize)]
struct BulkDifferentRequest {
    #[serde(default)]
    secret: String,
    messages: Vec<TargetedMessage>,
}

#[derive(Debug, Deserialize)]
struct TargetedMessage {
    targets: String,
    message: String,
}

#[derive(Debug, Default, Deserialize)]
struct SecretQuery {
    secret: Option<String>,
}

/// Constant-time string comparison to prevent timing attacks on the secret.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

fn unauthorized() -> ApiError {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": "Unauthorized"})),
    )
}

/// Check a supplied secret. An unconfigured secret rejects everything.
fn check_secret(configured: &str, supplied: Option<&str>) -> Result<(), ApiError> {
    match supplied {
        Some(s) if !configured.is_empty() && constant_time_eq(s, configured) => Ok(()),
        _ => Err(unauthorized()),
    }
}

/// Auth for GET endpoints: `Authorization: Bearer <secret>` or `?secret=`.
fn check_auth(headers: &HeaderMap, query: &SecretQuery, configured: &str) -> Result<(), ApiError> {
    let bearer = headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    check_secret(configured, bearer.or(query.secret.as_deref()))
}

fn require_connected(gateway: &Gateway) -> Result<(), ApiError> {
    if gateway.transport.is_connected() {
        Ok(())
    } else {
        Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"error": "WhatsApp client not connected"})),
        ))
    }
}

fn bad_body(e: JsonRejection) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"error": format!("invalid request: {e}")})),
    )
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

/// `GET /`: service summary.
async fn index(State(state): State<ApiState>) -> Json<Value> {
    Json(json!({
        "name": state.gateway.config.bot.name,
        "version": env!("CARGO_PKG_VERSION"),
        "status": "WhatsApp Bot API is running",
        "connected": state.gateway.transport.is_connected(),
        "timestamp": now(),
        "endpoints": [
            "/health",
            "/send-message",
            "/send-bulk-same-message",
            "/send-bulk-different-messages",
            "/github-webhook (supports ?jid=<target> parameter)",
            "/groups",
            "/idx",
        ],
    }))
}

/// `GET /health`.
async fn health(State(state): State<ApiState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": now(),
        "transportConnected": state.gateway.transport.is_connected(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `GET /groups`: groups the account participates in.
async fn groups(
    headers: HeaderMap,
    Query(query): Query<SecretQuery>,
    State(state): State<ApiState>,
) -> Result<Json<Value>, ApiError> {
    let gw = &state.gateway;
    check_auth(&headers, &query, &gw.config.api.secret)?;
    require_connected(gw)?;

    let groups = gw.transport.joined_groups().await.map_err(|e| {
        error!("listing groups failed: {e}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": e.to_string()})),
        )
    })?;

    let list: Vec<Value> = groups
        .iter()
        .map(|g| {
            json!({
                "id": g.id,
                "name": g.name,
                "owner": g.owner,
                "createdAt": g.created_at.map(|t| t.to_rfc3339()),
            })
        })
        .collect();

    Ok(Json(json!({
        "status": "Success",
        "total": list.len(),
        "groups": list,
        "timestamp": now(),
    })))
}

/// `POST /send-message`: one message to one target.
async fn send_message(
    State(state): State<ApiState>,
    body: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(req) = body.map_err(bad_body)?;
    let gw = &state.gateway;
    check_secret(&gw.config.api.secret, Some(&req.secret))?;
    require_connected(gw)?;

    let target = gw.resolver.resolve(&req.target).map_err(|e| {
        warn!(target = %req.target, "rejecting send: {e}");
        (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": format!("Invalid target format (must be phone number or group JID): {e}"),
                "target": req.target,
            })),
        )
    })?;

    info!(recipient = %target, kind = %target.kind, "API send");
    match gw
        .delivery
        .deliver_with_retry(&target, &req.message, gw.config.delivery.api_attempts)
        .await
    {
        Ok(_) => Ok(Json(json!({
            "status": "Success",
            "target": target.identifier,
            "targetType": target.kind.as_str(),
        }))),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": e.last_error,
                "originalTarget": req.target,
                "targetType": target.kind.as_str(),
                "attempts": e.attempts,
            })),
        )),
    }
}

/// Per-target entry of a bulk response.
fn bulk_result(outcome: &FanOutOutcome) -> Value {
    let mut entry = json!({
        "original_target": outcome.raw,
        "success": outcome.is_success(),
    });
    if let Some(target) = &outcome.target {
        entry["target"] = json!(target.identifier);
        entry["target_type"] = json!(target.kind.as_str());
    }
    if let Some(err) = outcome.error_text() {
        entry["error"] = json!(err);
    }
    entry
}

/// `POST /send-bulk-same-message`: one text to many targets, paced.
async fn send_bulk_same(
    State(state): State<ApiState>,
    body: Result<Json<BulkSameRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(req) = body.map_err(bad_body)?;
    let gw = &state.gateway;
    check_secret(&gw.config.api.secret, Some(&req.secret))?;
    require_connected(gw)?;

    let items = req
        .targets
        .iter()
        .map(|raw| FanOutItem {
            raw: raw.clone(),
            target: gw.resolver.resolve(raw),
            text: req.message.clone(),
        })
        .collect();
    let outcomes = gw
        .delivery
        .fan_out(items, gw.config.delivery.bulk_attempts, gw.bulk_pacing())
        .await;
    info!(
        sent = outcomes.iter().filter(|o| o.is_success()).count(),
        total = outcomes.len(),
        "bulk send finished"
    );

    Ok(Json(json!({
        "status": "Bulk same message processing completed",
        "results": outcomes.iter().map(bulk_result).collect::<Vec<_>>(),
    })))
}

/// `POST /send-bulk-different-messages`: one text per target, paced.
async fn send_bulk_different(
    State(state): State<ApiState>,
    body: Result<Json<BulkDifferentRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(req) = body.map_err(bad_body)?;
    let gw = &state.gateway;
    check_secret(&gw.config.api.secret, Some(&req.secret))?;
    require_connected(gw)?;

    let items = req
        .messages
        .iter()
        .map(|m| FanOutItem {
            raw: m.targets.clone(),
            target: gw.resolver.resolve(&m.targets),
            text: m.message.clone(),
        })
        .collect();
    let outcomes = gw
        .delivery
        .fan_out(items, gw.config.delivery.bulk_attempts, gw.bulk_pacing())
        .await;

    let results: Vec<Value> = outcomes
        .iter()
        .zip(&req.messages)
        .map(|(outcome, m)| {
            let mut entry = bulk_result(outcome);
            entry["message"] = json!(m.message);
            entry
        })
        .collect();

    Ok(Json(json!({
        "status": "Bulk different messages processing completed",
        "results": results,
    })))
}

/// `GET /idx`: today's market bulletin, structured and formatted.
async fn idx(
    headers: HeaderMap,
    Query(query): Query<SecretQuery>,
    State(state): State<ApiState>,
) -> Result<Json<Value>, ApiError> {
    let gw = &state.gateway;
    check_auth(&headers, &query, &gw.config.api.secret)?;

    let snapshot = gw.market.snapshot().await.map_err(|e| {
        error!("market snapshot failed: {e}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": format!("Failed to fetch IDX data: {e}")})),
        )
    })?;

    Ok(Json(json!({
        "status": "Success",
        "text": snapshot.render(),
        "data": snapshot,
        "timestamp": now(),
    })))
}

pub(crate) fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/groups", get(groups))
        .route("/send-message", post(send_message))
        .route("/send-bulk-same-message", post(send_bulk_same))
        .route("/send-bulk-different-messages", post(send_bulk_different))
        .route("/github-webhook", post(webhook::github_webhook))
        .route("/idx", get(idx))
        .layer(CorsLayer::permissive())
        .layer(DefaultBodyLimit::max(1024 * 1024)) // 1 MB max request body
        .with_state(state)
}

/// Start the API server. Called from `Gateway::run()`.
pub async fn serve(gateway: Arc<Gateway>) {
    let addr = format!("{}:{}", gateway.config.api.host, gateway.config.api.port);
    let app = build_router(ApiState { gateway });

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("API server failed to bind to {addr}: {e}");
            return;
        }
    };

    info!("API server listening on {addr}");

    if let Err(e) = axum::serve(listener, app).await {
        error!("API server error: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        test_config, test_gateway, test_gateway_with, StubGenerator, StubMarket, StubTransport,
        TEST_SECRET,
    };
    use axum::body::Body;
    use axum::http::Request;
    use hmac::{Hmac, Mac};
    use http_body_util::BodyExt;
    use sha2::Sha256;
    use tower::ServiceExt;
    use wabot_core::message::GroupInfo;

    async fn test_router(transport: Arc<StubTransport>) -> (Router, tempfile::TempDir) {
        let (gateway, dir) = test_gateway(transport, StubGenerator::answering("")).await;
        (build_router(ApiState { gateway }), dir)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    /// Parse response body as JSON.
    async fn body_json(resp: axum::http::Response<Body>) -> Value {
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "ab"));
        assert!(check_secret("", Some("")).is_err());
        assert!(check_secret("s", None).is_err());
        assert!(check_secret("s", Some("s")).is_ok());
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _dir) = test_router(StubTransport::new()).await;
        let resp = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let json = body_json(resp).await;
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["transportConnected"], true);
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_index_lists_endpoints() {
        let (app, _dir) = test_router(StubTransport::new()).await;
        let resp = app
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let json = body_json(resp).await;
        assert_eq!(json["name"], "WhatsApp Bot");
        assert!(json["endpoints"]
            .as_array()
            .unwrap()
            .iter()
            .any(|e| e == "/send-message"));
    }

    #[tokio::test]
    async fn test_send_message_success() {
        let transport = StubTransport::new();
        let (app, _dir) = test_router(transport.clone()).await;

        let req = post_json(
            "/send-message",
            json!({"secret": TEST_SECRET, "target": "0812-3456-7890", "message": "hi"}),
        );
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let json = body_json(resp).await;
        assert_eq!(json["status"], "Success");
        assert_eq!(json["target"], "6281234567890");
        assert_eq!(json["targetType"], "individual");
        assert_eq!(transport.texts(), vec!["hi"]);
    }

    #[tokio::test]
    async fn test_send_message_payload_reaches_transport_unchanged() {
        let transport = StubTransport::new();
        let (app, _dir) = test_router(transport.clone()).await;

        let long_tail = "x".repeat(6000);
        let message = format!(
            "Deploy report\n---\n# 1 failing job\n**do not** merge, see [log](http://x)\n{long_tail}"
        );
        for body in [message.as_str(), "-----"] {
            let req = post_json(
                "/send-message",
                json!({"secret": TEST_SECRET, "target": "0812", "message": body}),
            );
            let resp = app.clone().oneshot(req).await.unwrap();
            assert_eq!(resp.status(), StatusCode::OK);
        }

        assert_eq!(transport.texts(), vec![message, "-----".to_string()]);
    }

    #[tokio::test]
    async fn test_send_message_wrong_secret() {
        let transport = StubTransport::new();
        let (app, _dir) = test_router(transport.clone()).await;

        let req = post_json(
            "/send-message",
            json!({"secret": "nope", "target": "0812", "message": "hi"}),
        );
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(resp).await["error"], "Unauthorized");
        assert!(transport.texts().is_empty());
    }

    #[tokio::test]
    async fn test_unconfigured_secret_rejects_everything() {
        let mut config = test_config();
        config.api.secret = String::new();
        let (gateway, _dir) = test_gateway_with(
            config,
            StubTransport::new(),
            StubGenerator::answering(""),
            StubMarket::sample(),
        )
        .await;
        let app = build_router(ApiState { gateway });

        let req = post_json(
            "/send-message",
            json!({"secret": "", "target": "0812", "message": "hi"}),
        );
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_send_message_invalid_json() {
        let (app, _dir) = test_router(StubTransport::new()).await;
        let req = Request::post("/send-message")
            .header("Content-Type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_send_message_disconnected() {
        let transport = StubTransport::new();
        transport.set_connected(false);
        let (app, _dir) = test_router(transport).await;

        let req = post_json(
            "/send-message",
            json!({"secret": TEST_SECRET, "target": "0812", "message": "hi"}),
        );
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_send_message_invalid_group() {
        let (app, _dir) = test_router(StubTransport::new()).await;
        let req = post_json(
            "/send-message",
            json!({"secret": TEST_SECRET, "target": "abc@g.us", "message": "hi"}),
        );
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["target"], "abc@g.us");
    }

    #[tokio::test]
    async fn test_send_message_exhausted_retries() {
        let transport = StubTransport::new();
        transport.fail_for("6281234567890");
        let (app, _dir) = test_router(transport).await;

        let req = post_json(
            "/send-message",
            json!({"secret": TEST_SECRET, "target": "081234567890", "message": "hi"}),
        );
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body_json(resp).await;
        assert_eq!(json["attempts"], 3);
        assert_eq!(json["originalTarget"], "081234567890");
        assert!(json["error"].as_str().unwrap().contains("stub send failure"));
    }

    #[tokio::test]
    async fn test_bulk_same_message_reports_each_target() {
        let transport = StubTransport::new();
        transport.fail_for("6282222222222");
        let (app, _dir) = test_router(transport.clone()).await;

        let req = post_json(
            "/send-bulk-same-message",
            json!({
                "secret": TEST_SECRET,
                "targets": ["081111111111", "082222222222", "x@g.us", "120363001234567890@g.us"],
                "message": "hello all",
            }),
        );
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let json = body_json(resp).await;
        let results = json["results"].as_array().unwrap();
        assert_eq!(results.len(), 4);
        assert_eq!(results[0]["success"], true);
        assert_eq!(results[0]["target"], "6281111111111");
        assert_eq!(results[1]["success"], false);
        assert_eq!(results[2]["original_target"], "x@g.us");
        assert!(results[2].get("target").is_none());
        assert_eq!(results[3]["target_type"], "group");
        assert_eq!(
            transport.recipients(),
            vec!["6281111111111", "120363001234567890@g.us"]
        );
    }

    #[tokio::test]
    async fn test_bulk_different_messages() {
        let transport = StubTransport::new();
        let (app, _dir) = test_router(transport.clone()).await;

        let req = post_json(
            "/send-bulk-different-messages",
            json!({
                "secret": TEST_SECRET,
                "messages": [
                    {"targets": "081111111111", "message": "one"},
                    {"targets": "082222222222", "message": "two"},
                ],
            }),
        );
        let resp = app.oneshot(req).await.unwrap();
        let json = body_json(resp).await;
        assert_eq!(json["status"], "Bulk different messages processing completed");
        assert_eq!(json["results"][1]["message"], "two");
        assert_eq!(transport.texts(), vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_groups_requires_auth() {
        let transport = StubTransport::new();
        transport.set_groups(vec![GroupInfo {
            id: "1203@g.us".into(),
            name: "Family".into(),
            owner: None,
            created_at: None,
        }]);
        let (app, _dir) = test_router(transport).await;

        let resp = app
            .clone()
            .oneshot(Request::get("/groups").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let req = Request::get("/groups")
            .header("Authorization", format!("Bearer {TEST_SECRET}"))
            .body(Body::empty())
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["total"], 1);
        assert_eq!(json["groups"][0]["name"], "Family");
        assert!(json["groups"][0]["createdAt"].is_null());

        let uri = format!("/groups?secret={TEST_SECRET}");
        let resp = app
            .oneshot(Request::get(uri.as_str()).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_idx_endpoint() {
        let (app, _dir) = test_router(StubTransport::new()).await;
        let uri = format!("/idx?secret={TEST_SECRET}");
        let resp = app
            .oneshot(Request::get(uri.as_str()).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let json = body_json(resp).await;
        assert_eq!(json["status"], "Success");
        assert_eq!(json["data"]["uma"][0], "BBCA");
        assert!(json["text"].as_str().unwrap().contains("IDX Market Data"));
    }

    #[tokio::test]
    async fn test_github_webhook_requires_event_header() {
        let (app, _dir) = test_router(StubTransport::new()).await;
        let req = post_json("/github-webhook", json!({}));
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_github_webhook_with_query_target() {
        let transport = StubTransport::new();
        let (app, _dir) = test_router(transport.clone()).await;

        let req = Request::post("/github-webhook?jid=081234567890")
            .header("Content-Type", "application/json")
            .header("X-GitHub-Event", "issues")
            .body(Body::from(
                r#"{"action":"opened","issue":{"number":3,"title":"Bug"},"sender":{"login":"rina"}}"#,
            ))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let json = body_json(resp).await;
        assert_eq!(json["target_source"], "query_parameter");
        assert_eq!(json["targets_sent"], 1);
        assert!(transport.texts()[0].starts_with("🆕 *Issue Opened*"));
    }

    #[tokio::test]
    async fn test_github_webhook_signature() {
        let transport = StubTransport::new();
        let mut config = test_config();
        config.api.webhook_secret = "hook-key".into();
        let (gateway, _dir) = test_gateway_with(
            config,
            transport.clone(),
            StubGenerator::answering(""),
            StubMarket::sample(),
        )
        .await;
        let app = build_router(ApiState { gateway });
        let body = r#"{"repository":{"full_name":"acme/api"}}"#;

        let unsigned = Request::post("/github-webhook?jid=0811")
            .header("X-GitHub-Event", "star")
            .body(Body::from(body))
            .unwrap();
        let resp = app.clone().oneshot(unsigned).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let mut mac = Hmac::<Sha256>::new_from_slice(b"hook-key").unwrap();
        mac.update(body.as_bytes());
        let signature = format!("sha256={}", hex::encode(mac.finalize().into_bytes()));
        let signed = Request::post("/github-webhook?jid=0811")
            .header("X-GitHub-Event", "star")
            .header("X-Hub-Signature-256", signature)
            .body(Body::from(body))
            .unwrap();
        let resp = app.oneshot(signed).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(transport.texts()[0].starts_with("📢 *GitHub Event: Star*"));
    }
}
