//! HTTP server implementation using Axum.

use axum::response::IntoResponse;
use axum::{
    Router,
    extract::State,
    routing::{get, post},
};
use castline_commands::CommandRouter;
use castline_core::Shutdown;
use castline_core::error::Result;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared state for the gateway server.
#[derive(Clone)]
pub struct AppState {
    /// Command router; also the way to reach the session, registry and numbering plan.
    pub commands: Arc<CommandRouter>,
    /// Expected `X-Api-Key`; `None` leaves the control surface open.
    pub api_key: Option<String>,
    /// Token Meta presents during the webhook verification handshake.
    pub webhook_verify_token: String,
    /// Meta app secret for `X-Hub-Signature-256`; empty refuses every inbound POST.
    pub app_secret: String,
    pub start_time: std::time::Instant,
}

/// API key middleware: validates the `X-Api-Key` header or a bearer token.
async fn require_api_key(
    State(state): State<Arc<AppState>>,
    req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let Some(expected) = &state.api_key else {
        return next.run(req).await;
    };

    let headers = req.headers();
    let from_header = headers
        .get("X-Api-Key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let from_bearer = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or("");

    if from_header == expected || from_bearer == expected {
        return next.run(req).await;
    }

    tracing::warn!("🚫 Rejected {} {}: missing or invalid API key", req.method(), req.uri().path());
    crate::error::ApiError {
        status: axum::http::StatusCode::UNAUTHORIZED,
        message: "Acceso denegado".into(),
    }
    .into_response()
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    let shared = Arc::new(state);

    // Protected routes: require the API key when one is configured
    let protected = Router::new()
        .route("/send", post(super::routes::send_message))
        .route("/api/v1/session", get(super::routes::session_status))
        .route("/api/v1/recipients", get(super::routes::list_recipients))
        .route_layer(axum::middleware::from_fn_with_state(
            shared.clone(),
            require_api_key,
        ));

    // Public routes: no auth
    let public = Router::new()
        .route("/health", get(super::routes::health_check))
        // WhatsApp webhook: must be public for Meta verification
        .route(
            "/webhook/whatsapp",
            get(super::routes::whatsapp_webhook_verify).post(super::routes::whatsapp_webhook),
        );

    protected
        .merge(public)
        .layer(
            CorsLayer::new()
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers(Any)
                .allow_origin(Any)
                .max_age(std::time::Duration::from_secs(3600)),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}

/// Serve until `shutdown` is triggered, then stop accepting connections.
pub async fn serve(state: AppState, addr: &str, shutdown: Shutdown) -> Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("🌐 Gateway server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.wait().await })
        .await?;
    tracing::info!("🚪 HTTP server stopped");
    Ok(())
}
