use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ews_dashboard::config::Config;
use ews_dashboard::handlers::{self, AppState, RateLimit};
use ews_dashboard::mailer::SmtpMailer;

/// Entry point for the intervention email relay.
///
/// Loads configuration, builds the SMTP mailer and serves:
/// - `GET /health` (not rate limited)
/// - `POST /api/send-intervention` (body limit + per-IP rate limit)
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ews_dashboard=debug,ews_relay=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let app_state = Arc::new(AppState::new(config.clone(), Arc::new(SmtpMailer::new())));
    tracing::info!("✓ SMTP mailer initialized");

    // Per IP: burst of 10, one request replenished every 5 seconds
    let app = handlers::rate_limited_app(app_state, RateLimit::default())?;

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Intervention relay listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
