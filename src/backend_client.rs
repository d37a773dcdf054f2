use crate::config::BackendConfig;
use crate::errors::ClientError;
use crate::models::*;
use reqwest::{Method, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;

/// Races `future` against a timer.
///
/// Whichever settles first wins; the loser is dropped, which cancels an
/// in-flight request or releases the timer.
pub async fn with_deadline<T, F>(deadline: Duration, future: F) -> Result<T, ClientError>
where
    F: Future<Output = Result<T, ClientError>>,
{
    match tokio::time::timeout(deadline, future).await {
        Ok(result) => result,
        Err(_) => Err(ClientError::Timeout { after: deadline }),
    }
}

/// Error body shapes the prediction backend emits.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Option<Value>,
    error: Option<Value>,
}

impl ErrorBody {
    fn message(self) -> Option<String> {
        self.detail
            .or(self.error)
            .filter(|v| !v.is_null())
            .map(|v| match v {
                Value::String(s) => s,
                other => other.to_string(),
            })
    }
}

/// Client for the prediction backend.
#[derive(Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl BackendClient {
    /// Creates a new `BackendClient`.
    ///
    /// The deadline is enforced by [`with_deadline`] rather than by reqwest so
    /// that a timeout is reported as such and not as a transport failure.
    pub fn new(config: &BackendConfig) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder().build().map_err(|e| {
            ClientError::Transport(format!("Failed to create backend client: {}", e))
        })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: config.request_timeout,
        })
    }

    /// Backend base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// GET `path` and decode the JSON body.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.call::<(), T>(Method::GET, path, None).await
    }

    /// POST `body` as JSON to `path` and decode the JSON response.
    pub async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        self.call(Method::POST, path, Some(body)).await
    }

    async fn call<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ClientError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("{} {}", method, url);

        let mut request = self.client.request(method.clone(), &url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let result = with_deadline(self.timeout, async {
            let response = request.send().await.map_err(ClientError::from)?;
            Self::decode(response).await
        })
        .await;

        if let Err(ref e) = result {
            tracing::error!("Backend request {} {} failed: {}", method, path, e);
        }
        result
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorBody>(&text)
                .ok()
                .and_then(ErrorBody::message)
                .unwrap_or_else(|| format!("Request failed with status {}", status.as_u16()));
            return Err(ClientError::Api {
                status: status.as_u16(),
                detail,
            });
        }

        let bytes = response.bytes().await.map_err(ClientError::from)?;
        serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode(e.to_string()))
    }

    /// GET /: model and data readiness.
    pub async fn health(&self) -> Result<HealthResponse, ClientError> {
        self.get("/").await
    }

    /// GET /customers: customer identifiers, optionally capped at `limit`.
    pub async fn list_customers(&self, limit: Option<u32>) -> Result<Vec<String>, ClientError> {
        self.get(&with_limit("/customers", limit)).await
    }

    /// GET /customer/{id}: behavioural banking record.
    pub async fn customer(&self, customer_id: &str) -> Result<CustomerData, ClientError> {
        self.get(&format!("/customer/{}", encode_segment(customer_id)))
            .await
    }

    /// POST /predict: risk probability, category and top drivers.
    pub async fn predict(&self, customer_id: &str) -> Result<PredictionResponse, ClientError> {
        let request = PredictionRequest {
            customer_id: customer_id.to_string(),
        };
        self.post("/predict", &request).await
    }

    /// GET /portfolio/summary: customer counts per risk category.
    ///
    /// # Returns
    /// * `Ok(PortfolioSummary)` - LOW/MEDIUM/HIGH counts summing to the total
    /// * `Err(ClientError)` - If the request fails or times out
    pub async fn portfolio_summary(&self) -> Result<PortfolioSummary, ClientError> {
        self.get("/portfolio/summary").await
    }

    /// GET /portfolio/trend: twelve weekly points of average score and probability.
    pub async fn portfolio_trend(&self) -> Result<Vec<RiskTrendPoint>, ClientError> {
        self.get("/portfolio/trend").await
    }

    /// GET /portfolio/feature-importance: model-wide importance, normalised to sum to 1.
    pub async fn feature_importance(&self) -> Result<Vec<FeatureImportancePoint>, ClientError> {
        self.get("/portfolio/feature-importance").await
    }

    /// GET /portfolio/heatmap: score-bucket counts per cohort.
    pub async fn heatmap(&self) -> Result<Vec<HeatmapRow>, ClientError> {
        self.get("/portfolio/heatmap").await
    }

    /// GET /customers/risk-list: identifiers with current probability and category.
    pub async fn risk_list(&self, limit: Option<u32>) -> Result<Vec<CustomerRiskItem>, ClientError> {
        self.get(&with_limit("/customers/risk-list", limit)).await
    }

    /// GET /customer/{id}/drilldown: sub-scores and signed contributions.
    pub async fn drilldown(&self, customer_id: &str) -> Result<CustomerDrilldown, ClientError> {
        let path = format!("/customer/{}/drilldown", encode_segment(customer_id));
        self.get(&path).await
    }

    /// POST /predict-and-send-intervention: prediction plus the backend's own
    /// threshold-driven email step.
    ///
    /// # Arguments
    /// * `customer_id` - Customer to score
    ///
    /// # Returns
    /// * `Ok(InterventionDispatch)` - Prediction and the email outcome; a failed
    ///   email is reported in `intervention.email_error`, not as an `Err`
    /// * `Err(ClientError)` - If the backend rejects the request or is unreachable
    pub async fn predict_and_send_intervention(
        &self,
        customer_id: &str,
    ) -> Result<InterventionDispatch, ClientError> {
        let request = PredictionRequest {
            customer_id: customer_id.to_string(),
        };
        self.post("/predict-and-send-intervention", &request).await
    }
}

fn with_limit(path: &str, limit: Option<u32>) -> String {
    match limit {
        Some(limit) => format!("{}?limit={}", path, limit),
        None => path.to_string(),
    }
}

/// Percent-encodes a single path segment.
fn encode_segment(segment: &str) -> String {
    url::form_urlencoded::byte_serialize(segment.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}
