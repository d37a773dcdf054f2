/// Integration tests for the intervention email relay
/// Drives the router in-process with a recording mailer in place of SMTP
use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use ews_dashboard::config::{Config, SmtpCredentials, SmtpSettings};
use ews_dashboard::email_template::InterventionEmail;
use ews_dashboard::handlers::{app, rate_limited_app, AppState, RateLimit, MAX_BODY_BYTES};
use ews_dashboard::mailer::{MailError, Mailer};
use serde_json::json;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

/// Records every send and answers with a fixed outcome.
struct RecordingMailer {
    sent: Mutex<Vec<(SmtpCredentials, InterventionEmail)>>,
    outcome: Result<String, MailError>,
}

impl RecordingMailer {
    fn accepting() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            outcome: Ok("<test-id@bank.example>".to_string()),
        })
    }

    fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            outcome: Err(MailError(message.to_string())),
        })
    }

    fn sent(&self) -> Vec<(SmtpCredentials, InterventionEmail)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(
        &self,
        smtp: &SmtpCredentials,
        email: &InterventionEmail,
    ) -> Result<String, MailError> {
        self.sent
            .lock()
            .unwrap()
            .push((smtp.clone(), email.clone()));
        self.outcome.clone()
    }
}

/// Helper function to create test config
fn create_test_config() -> Config {
    Config {
        port: 5050,
        smtp: SmtpSettings {
            host: Some("smtp.example.com".to_string()),
            port: 587,
            secure: false,
            user: Some("relay".to_string()),
            pass: Some("secret".to_string()),
            from: Some("Early Warning <alerts@bank.example>".to_string()),
            recipient: Some("risk-desk@bank.example".to_string()),
        },
    }
}

fn valid_payload() -> serde_json::Value {
    json!({
        "customerId": "CUST_00017",
        "customerName": "Meera Reddy",
        "topSignal": "Salary_Delay_Days",
        "selectedIntervention": "Payment Holiday",
        "officerNotes": "Spoke to the customer on Monday."
    })
}

fn post_json(body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/send-intervention")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let state = Arc::new(AppState::new(create_test_config(), RecordingMailer::accepting()));
    let response = app(state)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "ews-relay");
}

#[tokio::test]
async fn test_valid_request_sends_one_email() {
    let mailer = RecordingMailer::accepting();
    let state = Arc::new(AppState::new(create_test_config(), mailer.clone()));

    let response = app(state)
        .oneshot(post_json(valid_payload().to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["messageId"], "<test-id@bank.example>");
    assert_eq!(body["to"], "risk-desk@bank.example");

    let sent = mailer.sent();
    assert_eq!(sent.len(), 1);
    let (smtp, email) = &sent[0];
    assert_eq!(smtp.recipient, "risk-desk@bank.example");
    assert!(email.subject.contains("Payment Holiday"));
    assert!(email.subject.contains("CUST_00017"));
    assert!(email.text.contains("Frequent Salary Credit Delays"));
    assert!(email.text.contains("Spoke to the customer on Monday."));
}

#[tokio::test]
async fn test_missing_field_is_rejected_without_sending() {
    let mailer = RecordingMailer::accepting();
    let state = Arc::new(AppState::new(create_test_config(), mailer.clone()));

    let mut payload = valid_payload();
    payload
        .as_object_mut()
        .unwrap()
        .remove("selectedIntervention");

    let response = app(state)
        .oneshot(post_json(payload.to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response).await.contains("selectedIntervention"));
    assert!(mailer.sent().is_empty());
}

#[tokio::test]
async fn test_blank_fields_are_all_reported() {
    let mailer = RecordingMailer::accepting();
    let state = Arc::new(AppState::new(create_test_config(), mailer.clone()));

    let payload = json!({
        "customerId": "CUST_00017",
        "customerName": "   ",
        "topSignal": ""
    });

    let response = app(state)
        .oneshot(post_json(payload.to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_text(response).await,
        "Missing required fields: customerName, topSignal, selectedIntervention"
    );
    assert!(mailer.sent().is_empty());
}

#[tokio::test]
async fn test_missing_notes_are_accepted() {
    let mailer = RecordingMailer::accepting();
    let state = Arc::new(AppState::new(create_test_config(), mailer.clone()));

    let mut payload = valid_payload();
    payload.as_object_mut().unwrap().remove("officerNotes");

    let response = app(state)
        .oneshot(post_json(payload.to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let sent = mailer.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].1.text.contains("Officer Notes: None provided"));
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let mailer = RecordingMailer::accepting();
    let state = Arc::new(AppState::new(create_test_config(), mailer.clone()));

    let response = app(state)
        .oneshot(post_json("{\"customerId\": ".to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(mailer.sent().is_empty());
}

#[tokio::test]
async fn test_incomplete_smtp_config_is_server_error() {
    let mailer = RecordingMailer::accepting();
    let mut config = create_test_config();
    config.smtp.pass = None;
    config.smtp.recipient = None;
    let state = Arc::new(AppState::new(config, mailer.clone()));

    let response = app(state)
        .oneshot(post_json(valid_payload().to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_text(response)
        .await
        .starts_with("SMTP configuration is incomplete"));
    assert!(mailer.sent().is_empty());
}

#[tokio::test]
async fn test_validation_runs_before_config_check() {
    let mailer = RecordingMailer::accepting();
    let state = Arc::new(AppState::new(
        Config {
            port: 5050,
            smtp: SmtpSettings::default(),
        },
        mailer.clone(),
    ));

    let response = app(state)
        .oneshot(post_json(json!({"customerId": "CUST_00017"}).to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_provider_failure_is_reported() {
    let mailer = RecordingMailer::failing("535 5.7.8 Authentication credentials invalid");
    let state = Arc::new(AppState::new(create_test_config(), mailer.clone()));

    let response = app(state)
        .oneshot(post_json(valid_payload().to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_text(response).await,
        "535 5.7.8 Authentication credentials invalid"
    );
    assert_eq!(mailer.sent().len(), 1);
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let mailer = RecordingMailer::accepting();
    let state = Arc::new(AppState::new(create_test_config(), mailer.clone()));

    let mut payload = valid_payload();
    payload["officerNotes"] = json!("x".repeat(MAX_BODY_BYTES + 1));
    let body = payload.to_string();

    let request = Request::builder()
        .method("POST")
        .uri("/api/send-intervention")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_LENGTH, body.len())
        .body(Body::from(body))
        .unwrap();

    let response = app(state).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(mailer.sent().is_empty());
}

#[tokio::test]
async fn test_cors_headers_are_applied() {
    let state = Arc::new(AppState::new(create_test_config(), RecordingMailer::accepting()));
    let request = Request::builder()
        .uri("/health")
        .header(header::ORIGIN, "http://dashboard.bank.example")
        .body(Body::empty())
        .unwrap();

    let response = app(state).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
}

#[tokio::test]
async fn test_send_route_is_rate_limited_per_ip() {
    let mailer = RecordingMailer::accepting();
    let state = Arc::new(AppState::new(create_test_config(), mailer.clone()));
    let router = rate_limited_app(
        state,
        RateLimit {
            per_second: 60,
            burst_size: 1,
        },
    )
    .unwrap();

    let from_client = |uri: &str, body: Body| {
        Request::builder()
            .method(if uri == "/health" { "GET" } else { "POST" })
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-forwarded-for", "203.0.113.7")
            .body(body)
            .unwrap()
    };

    let first = router
        .clone()
        .oneshot(from_client(
            "/api/send-intervention",
            Body::from(valid_payload().to_string()),
        ))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = router
        .clone()
        .oneshot(from_client(
            "/api/send-intervention",
            Body::from(valid_payload().to_string()),
        ))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(mailer.sent().len(), 1);

    // Health checks bypass the limiter
    let health = router
        .oneshot(from_client("/health", Body::empty()))
        .await
        .unwrap();
    assert_eq!(health.status(), StatusCode::OK);
}

#[test]
fn test_zero_burst_rate_limit_is_rejected() {
    let state = Arc::new(AppState::new(create_test_config(), RecordingMailer::accepting()));
    let result = rate_limited_app(
        state,
        RateLimit {
            per_second: 5,
            burst_size: 0,
        },
    );
    assert!(result.is_err());
}
