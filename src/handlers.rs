use crate::config::Config;
use crate::email_template::render_intervention_email;
use crate::errors::AppError;
use crate::mailer::Mailer;
use crate::models::{InterventionPayload, SendInterventionResponse};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

/// Maximum accepted size of an intervention request body.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Relay configuration, including the SMTP settings read at startup.
    pub config: Config,
    /// Outbound mail transport.
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub fn new(config: Config, mailer: Arc<dyn Mailer>) -> Self {
        Self { config, mailer }
    }
}

/// Health check endpoint.
///
/// Reports liveness only; SMTP completeness is not checked here.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "ews-relay",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// POST /api/send-intervention
///
/// Validates the request, renders the intervention email and sends it to the
/// configured recipient.
///
/// # Returns
///
/// * `200` with `{messageId, to}` once the SMTP server accepts the message.
/// * `400` when the body is not JSON or a required field is blank.
/// * `500` when SMTP settings are incomplete or the send fails.
pub async fn send_intervention(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<InterventionPayload>, JsonRejection>,
) -> Result<Json<SendInterventionResponse>, AppError> {
    let Json(payload) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let request = payload.into_request().map_err(|missing| {
        AppError::BadRequest(format!("Missing required fields: {}", missing.join(", ")))
    })?;

    tracing::info!(
        "POST /api/send-intervention - customer: {}, intervention: {}",
        request.customer_id,
        request.selected_intervention
    );

    // Checked per request so a misconfigured relay still answers /health.
    let smtp = state.config.smtp.credentials()?;

    let email = render_intervention_email(&request);
    let message_id = state
        .mailer
        .send(&smtp, &email)
        .await
        .map_err(|e| AppError::EmailDelivery(e.to_string()))?;

    tracing::info!(
        "✓ Intervention email sent for {}: {}",
        request.customer_id,
        message_id
    );

    Ok(Json(SendInterventionResponse {
        message_id,
        to: smtp.recipient,
    }))
}

/// Intervention routes with the body size limit applied.
pub fn intervention_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/send-intervention", post(send_intervention))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
}

/// Per-IP rate limit applied to the send route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    /// Seconds needed to replenish one request.
    pub per_second: u64,
    /// Requests allowed in a burst before limiting starts.
    pub burst_size: u32,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            per_second: 5,
            burst_size: 10,
        }
    }
}

/// Relay router with tracing and permissive CORS, without rate limiting.
pub fn app(state: Arc<AppState>) -> Router {
    assemble(state, intervention_routes())
}

/// Relay router as served in production: `app` plus a per-IP rate limit
/// on `POST /api/send-intervention`. `/health` is never rate limited.
///
/// # Arguments
/// * `state` - Shared relay state
/// * `limit` - Rate limit for the send route
///
/// # Returns
/// * `Ok(Router)` - Router ready for `axum::serve`
/// * `Err` - If the rate limit cannot be built (zero period or burst)
pub fn rate_limited_app(state: Arc<AppState>, limit: RateLimit) -> anyhow::Result<Router> {
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(limit.per_second)
            .burst_size(limit.burst_size)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Invalid rate limiter configuration"))?,
    );

    let protected_routes = intervention_routes().layer(ServiceBuilder::new().layer(
        GovernorLayer {
            config: governor_conf,
        },
    ));

    Ok(assemble(state, protected_routes))
}

fn assemble(state: Arc<AppState>, send_routes: Router<Arc<AppState>>) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(send_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
