//! API route handlers.

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use castline_commands::Invocation;
use castline_core::types::Payload;
use castline_security::Sender;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ApiError;
use crate::server::AppState;

/// Health check endpoint.
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "castline",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Current session lifecycle state.
pub async fn session_status(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let session = &state.commands.services().session;
    Json(serde_json::json!({
        "session": session.state(),
        "ready": session.is_ready(),
        "uptime_secs": state.start_time.elapsed().as_secs(),
    }))
}

/// Registered recipients, in canonical order.
pub async fn list_recipients(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let recipients = state.commands.services().registry.list().await;
    Json(serde_json::json!({
        "count": recipients.len(),
        "recipients": recipients,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub message: String,
}

/// `POST /send {to, message}`.
///
/// Plain text goes straight to `to`. A message starting with the command
/// marker is routed as a command addressed to `to` on behalf of the API.
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    body: Result<Json<SendRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(req) = body.map_err(|e| {
        tracing::warn!("Rejected /send body: {e}");
        ApiError::bad_request("JSON inválido en el cuerpo de la solicitud")
    })?;
    if req.to.trim().is_empty() || req.message.trim().is_empty() {
        return Err(ApiError::bad_request(
            "Se requieren los campos \"to\" y \"message\"",
        ));
    }

    let services = state.commands.services();
    let to = services.numbering.canonicalize(&req.to)?;

    if services.syntax.is_command(&req.message) {
        let invocation = Invocation::addressed(Sender::ControlApi, to.clone());
        state.commands.route(&invocation, &req.message).await?;
    } else {
        services.session.send(&to, &Payload::text(req.message)).await?;
        tracing::info!("📤 Message sent to {to} via control API");
        if let Err(e) = services.registry.add(&to).await {
            tracing::warn!("Could not register {to}: {e}");
        }
    }

    Ok(Json(serde_json::json!({
        "success": true,
        "canonicalNumber": to,
    })))
}

/// WhatsApp webhook verification (GET). Meta sends `hub.mode`,
/// `hub.verify_token` and `hub.challenge`; echo the challenge on match.
pub async fn whatsapp_webhook_verify(
    Query(params): Query<HashMap<String, String>>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let mode = params.get("hub.mode").map(|s| s.as_str()).unwrap_or("");
    let token = params
        .get("hub.verify_token")
        .map(|s| s.as_str())
        .unwrap_or("");
    let challenge = params
        .get("hub.challenge")
        .cloned()
        .unwrap_or_default();

    let expected = &state.webhook_verify_token;
    if mode == "subscribe" && !expected.is_empty() && token == expected {
        tracing::info!("WhatsApp webhook verified");
        (StatusCode::OK, challenge).into_response()
    } else {
        tracing::warn!("WhatsApp webhook verification rejected");
        (StatusCode::FORBIDDEN, "Forbidden").into_response()
    }
}

/// Check Meta's `X-Hub-Signature-256` header: `sha256=` followed by the hex
/// HMAC-SHA256 of the raw body keyed with the app secret.
fn verify_hub_signature(secret: &str, body: &[u8], header: Option<&str>) -> bool {
    use hmac::{Hmac, Mac};

    if secret.is_empty() {
        return false;
    }
    let Some(digest) = header
        .and_then(|h| h.strip_prefix("sha256="))
        .and_then(decode_hex)
    else {
        return false;
    };
    let Ok(mut mac) = Hmac::<sha2::Sha256>::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&digest).is_ok()
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(s.get(i..i + 2)?, 16).ok())
        .collect()
}

/// WhatsApp webhook handler (POST): receives incoming messages from Meta.
///
/// The body is only trusted once its signature checks out, since the sender
/// number it carries decides operator authorization. Meta expects a quick 200,
/// so each message is handled in the background.
pub async fn whatsapp_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = headers
        .get("X-Hub-Signature-256")
        .and_then(|v| v.to_str().ok());
    if !verify_hub_signature(&state.app_secret, &body, signature) {
        tracing::warn!("[whatsapp] Rejected inbound webhook with missing or invalid signature");
        return (StatusCode::FORBIDDEN, "Forbidden").into_response();
    }

    let payload: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!("[whatsapp] Unparseable webhook body: {e}");
            return ApiError::bad_request("JSON inválido en el cuerpo de la solicitud").into_response();
        }
    };

    let messages = castline_channels::whatsapp::parse_webhook(&payload);
    for message in messages {
        tracing::info!("[whatsapp] Message from {}: {}", message.sender_raw_id, message.text);
        let commands = state.commands.clone();
        tokio::spawn(async move {
            crate::inbound::handle_inbound(&commands, message).await;
        });
    }
    Json(serde_json::json!({"status": "ok"})).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::build_router;
    use crate::testing::{APP_SECRET, CUSTOMER, Fixture, OPERATOR, body_json, hub_signature};
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn post_send(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/send")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let json = health_check().await.0;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["service"], "castline");
    }

    #[tokio::test]
    async fn test_send_text_canonicalizes_and_registers() {
        let fx = Fixture::builder("routes-send").build().await;
        let resp = build_router(fx.state.clone())
            .oneshot(post_send(r#"{"to": "011 2233-4455", "message": "hola"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["canonicalNumber"], CUSTOMER);
        assert_eq!(fx.sent(), vec![(CUSTOMER.to_string(), Payload::text("hola"))]);
        assert!(fx.services().registry.get(CUSTOMER).await.is_some());
    }

    #[tokio::test]
    async fn test_send_invalid_number() {
        let fx = Fixture::builder("routes-invalid").build().await;
        let resp = build_router(fx.state.clone())
            .oneshot(post_send(r#"{"to": "123", "message": "hola"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["error"], "Número inválido: 123");
        assert!(fx.sent().is_empty());
    }

    #[tokio::test]
    async fn test_send_malformed_json() {
        let fx = Fixture::builder("routes-malformed").build().await;
        let resp = build_router(fx.state.clone())
            .oneshot(post_send(r#"{"to": "5491122334455", "message": "#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(resp).await["error"],
            "JSON inválido en el cuerpo de la solicitud"
        );
    }

    #[tokio::test]
    async fn test_send_missing_fields() {
        let fx = Fixture::builder("routes-missing").build().await;
        let resp = build_router(fx.state.clone())
            .oneshot(post_send(r#"{"to": "5491122334455"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(fx.sent().is_empty());
    }

    #[tokio::test]
    async fn test_send_command_is_addressed_to_recipient() {
        let fx = Fixture::builder("routes-command").build().await;
        let resp = build_router(fx.state.clone())
            .oneshot(post_send(r#"{"to": "5491122334455", "message": "!help"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let sent = fx.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, CUSTOMER);
        assert!(sent[0].1.preview().starts_with("📋 *Comandos disponibles:*"));
    }

    #[tokio::test]
    async fn test_send_unknown_command() {
        let fx = Fixture::builder("routes-unknown").build().await;
        let resp = build_router(fx.state.clone())
            .oneshot(post_send(r#"{"to": "5491122334455", "message": "!foo"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["error"], "Comando no reconocido: !foo");
    }

    #[tokio::test]
    async fn test_send_broadcast_via_api() {
        let fx = Fixture::builder("routes-broadcast").build().await;
        fx.services().registry.add(CUSTOMER).await.unwrap();
        let resp = build_router(fx.state.clone())
            .oneshot(post_send(r#"{"to": "5492664031203", "message": "!enviar:Corte"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(fx.texts_to(CUSTOMER), vec!["🔔 Notificación PuntoNet:\nCorte"]);
        // Broadcast copy plus the summary.
        assert_eq!(fx.texts_to(OPERATOR).len(), 2);
    }

    #[tokio::test]
    async fn test_send_when_session_down() {
        let fx = Fixture::builder("routes-down").disconnected().build().await;
        let resp = build_router(fx.state.clone())
            .oneshot(post_send(r#"{"to": "5491122334455", "message": "hola"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_session_status() {
        let fx = Fixture::builder("routes-session").build().await;
        let json = session_status(State(Arc::new(fx.state.clone()))).await.0;
        assert_eq!(json["session"]["state"], "ready");
        assert_eq!(json["ready"], true);
    }

    #[tokio::test]
    async fn test_list_recipients() {
        let fx = Fixture::builder("routes-recipients").build().await;
        fx.services().registry.add(CUSTOMER).await.unwrap();
        let json = list_recipients(State(Arc::new(fx.state.clone()))).await.0;
        assert_eq!(json["count"], 1);
        assert_eq!(json["recipients"][0], CUSTOMER);
    }

    #[tokio::test]
    async fn test_webhook_verification() {
        let fx = Fixture::builder("routes-verify").build().await;
        let app = build_router(fx.state.clone());

        let ok = Request::get(
            "/webhook/whatsapp?hub.mode=subscribe&hub.verify_token=verify-me&hub.challenge=1234",
        )
        .body(Body::empty())
        .unwrap();
        let resp = app.clone().oneshot(ok).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"1234");

        let bad = Request::get(
            "/webhook/whatsapp?hub.mode=subscribe&hub.verify_token=nope&hub.challenge=1234",
        )
        .body(Body::empty())
        .unwrap();
        assert_eq!(app.oneshot(bad).await.unwrap().status(), StatusCode::FORBIDDEN);
    }

    fn inbound(from: &str, text: &str) -> String {
        serde_json::json!({
            "entry": [{"changes": [{"value": {"messages": [
                {"from": from, "id": "wamid.1", "type": "text", "text": {"body": text}}
            ]}}]}]
        })
        .to_string()
    }

    fn post_webhook(body: String, signature: Option<String>) -> Request<Body> {
        let mut req = Request::builder()
            .method("POST")
            .uri("/webhook/whatsapp")
            .header("content-type", "application/json");
        if let Some(sig) = signature {
            req = req.header("X-Hub-Signature-256", sig);
        }
        req.body(Body::from(body)).unwrap()
    }

    /// Let spawned inbound handlers run to completion.
    async fn settle() {
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }

    #[test]
    fn test_hub_signature_check() {
        let body = br#"{"entry":[]}"#;
        let good = hub_signature(APP_SECRET, body);
        assert!(verify_hub_signature(APP_SECRET, body, Some(&good)));
        assert!(!verify_hub_signature(APP_SECRET, b"{}", Some(&good)));
        assert!(!verify_hub_signature("other", body, Some(&good)));
        assert!(!verify_hub_signature(APP_SECRET, body, None));
        assert!(!verify_hub_signature(APP_SECRET, body, Some("sha256=zz")));
        assert!(!verify_hub_signature(APP_SECRET, body, Some(good.trim_start_matches("sha256="))));
        assert!(!verify_hub_signature("", body, Some(&hub_signature("", body))));
    }

    #[tokio::test]
    async fn test_webhook_inbound_acknowledges() {
        let fx = Fixture::builder("routes-webhook").build().await;
        let body = inbound(OPERATOR, "!help");
        let signature = hub_signature(APP_SECRET, body.as_bytes());
        let resp = build_router(fx.state.clone())
            .oneshot(post_webhook(body, Some(signature)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["status"], "ok");
        for _ in 0..100 {
            if !fx.texts_to(OPERATOR).is_empty() {
                break;
            }
            settle().await;
        }
        assert_eq!(fx.texts_to(OPERATOR).len(), 1);
    }

    #[tokio::test]
    async fn test_webhook_unsigned_broadcast_is_refused() {
        let fx = Fixture::builder("routes-webhook-unsigned").api_key("secret").build().await;
        fx.services().registry.add(CUSTOMER).await.unwrap();
        let resp = build_router(fx.state.clone())
            .oneshot(post_webhook(inbound(OPERATOR, "!enviar:FORGED"), None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        settle().await;
        assert!(fx.sent().is_empty());
    }

    #[tokio::test]
    async fn test_webhook_wrong_signature_is_refused() {
        let fx = Fixture::builder("routes-webhook-forged").build().await;
        fx.services().registry.add(CUSTOMER).await.unwrap();
        let body = inbound(OPERATOR, "!enviar:FORGED");
        let signature = hub_signature("not-the-app-secret", body.as_bytes());
        let resp = build_router(fx.state.clone())
            .oneshot(post_webhook(body, Some(signature)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        settle().await;
        assert!(fx.sent().is_empty());
    }

    #[tokio::test]
    async fn test_webhook_signed_with_tampered_body_is_refused() {
        let fx = Fixture::builder("routes-webhook-tampered").build().await;
        let signature = hub_signature(APP_SECRET, inbound(CUSTOMER, "hola").as_bytes());
        let resp = build_router(fx.state.clone())
            .oneshot(post_webhook(inbound(OPERATOR, "!enviar:FORGED"), Some(signature)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        settle().await;
        assert!(fx.sent().is_empty());
    }

    #[tokio::test]
    async fn test_webhook_signed_malformed_body() {
        let fx = Fixture::builder("routes-webhook-malformed").build().await;
        let body = "{not json".to_string();
        let signature = hub_signature(APP_SECRET, body.as_bytes());
        let resp = build_router(fx.state.clone())
            .oneshot(post_webhook(body, Some(signature)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
