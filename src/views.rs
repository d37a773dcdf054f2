//! Page-level data orchestration for the dashboard screens.
//!
//! Each screen owns a [`PageHandle`] holding its [`ViewState`]. Loads run on
//! the Tokio runtime and commit their result only while the page is mounted
//! and only if no newer load has started since. Derived series (ranked
//! contributions, filtered alert lists, threshold buckets) are plain functions
//! over already-fetched data.

use crate::backend_client::BackendClient;
use crate::errors::ClientError;
use crate::models::*;
use crate::synthetic::DemoPortfolio;
use moka::future::Cache;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;

// ============ View State ============

/// What a screen currently shows.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewState<T> {
    Loading,
    Ready(T),
    /// Terminal until the user reloads.
    Failed(String),
}

impl<T> ViewState<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, ViewState::Loading)
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            ViewState::Ready(data) => Some(data),
            ViewState::Loading | ViewState::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ViewState::Failed(message) => Some(message),
            ViewState::Loading | ViewState::Ready(_) => None,
        }
    }
}

/// State owned by one mounted screen.
pub struct PageHandle<T> {
    state: Arc<Mutex<ViewState<T>>>,
    mounted: Arc<AtomicBool>,
    generation: Arc<AtomicU64>,
    task: Option<JoinHandle<()>>,
}

fn lock<T>(state: &Mutex<ViewState<T>>) -> MutexGuard<'_, ViewState<T>> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<T: Send + 'static> PageHandle<T> {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ViewState::Loading)),
            mounted: Arc::new(AtomicBool::new(true)),
            generation: Arc::new(AtomicU64::new(0)),
            task: None,
        }
    }

    /// Starts `fetch` and flips the view to `Loading`.
    ///
    /// A later call supersedes this one: whichever load started last is the
    /// only one allowed to commit.
    pub fn load<F>(&mut self, fetch: F)
    where
        F: Future<Output = Result<T, ClientError>> + Send + 'static,
    {
        if !self.is_mounted() {
            tracing::debug!("Ignoring load on an unmounted page");
            return;
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *lock(&self.state) = ViewState::Loading;

        let state = Arc::clone(&self.state);
        let mounted = Arc::clone(&self.mounted);
        let latest = Arc::clone(&self.generation);

        self.task = Some(tokio::spawn(async move {
            let outcome = fetch.await;

            let mut guard = lock(&state);
            if !mounted.load(Ordering::SeqCst) {
                tracing::debug!("Dropping result that arrived after unmount");
                return;
            }
            if latest.load(Ordering::SeqCst) != generation {
                tracing::debug!("Dropping result of superseded load {}", generation);
                return;
            }
            *guard = match outcome {
                Ok(data) => ViewState::Ready(data),
                Err(e) => ViewState::Failed(e.to_string()),
            };
        }));
    }

    /// Waits for the most recent load to finish (committed or dropped).
    pub async fn settled(&mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!("Page load task failed: {}", e);
            }
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    /// Stops any in-flight load from committing. Also runs on drop.
    pub fn unmount(&mut self) {
        let _guard = lock(&self.state);
        self.mounted.store(false, Ordering::SeqCst);
    }

    pub fn is_loading(&self) -> bool {
        lock(&self.state).is_loading()
    }

    pub fn error(&self) -> Option<String> {
        lock(&self.state).error().map(str::to_string)
    }
}

impl<T: Clone + Send + 'static> PageHandle<T> {
    pub fn snapshot(&self) -> ViewState<T> {
        lock(&self.state).clone()
    }
}

impl<T: Send + 'static> Default for PageHandle<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for PageHandle<T> {
    fn drop(&mut self) {
        let _guard = lock(&self.state);
        self.mounted.store(false, Ordering::SeqCst);
    }
}

// ============ Data Source ============

/// Where screens get their data: the live backend or the demo book.
#[derive(Clone)]
pub enum DataSource {
    Backend(BackendClient),
    Demo(DemoPortfolio),
}

impl DataSource {
    pub fn is_demo(&self) -> bool {
        matches!(self, DataSource::Demo(_))
    }

    pub async fn health(&self) -> Result<HealthResponse, ClientError> {
        match self {
            DataSource::Backend(client) => client.health().await,
            DataSource::Demo(portfolio) => Ok(portfolio.health()),
        }
    }

    /// Customer identifiers, optionally capped at `limit`.
    pub async fn list_customers(&self, limit: Option<u32>) -> Result<Vec<String>, ClientError> {
        match self {
            DataSource::Backend(client) => client.list_customers(limit).await,
            DataSource::Demo(portfolio) => Ok(portfolio.customer_ids(limit)),
        }
    }

    pub async fn portfolio_summary(&self) -> Result<PortfolioSummary, ClientError> {
        match self {
            DataSource::Backend(client) => client.portfolio_summary().await,
            DataSource::Demo(portfolio) => Ok(portfolio.summary()),
        }
    }

    pub async fn portfolio_trend(&self) -> Result<Vec<RiskTrendPoint>, ClientError> {
        match self {
            DataSource::Backend(client) => client.portfolio_trend().await,
            DataSource::Demo(portfolio) => Ok(portfolio.trend()),
        }
    }

    pub async fn feature_importance(&self) -> Result<Vec<FeatureImportancePoint>, ClientError> {
        match self {
            DataSource::Backend(client) => client.feature_importance().await,
            DataSource::Demo(portfolio) => Ok(portfolio.feature_importance()),
        }
    }

    pub async fn heatmap(&self) -> Result<Vec<HeatmapRow>, ClientError> {
        match self {
            DataSource::Backend(client) => client.heatmap().await,
            DataSource::Demo(portfolio) => Ok(portfolio.heatmap()),
        }
    }

    pub async fn drilldown(&self, customer_id: &str) -> Result<CustomerDrilldown, ClientError> {
        match self {
            DataSource::Backend(client) => client.drilldown(customer_id).await,
            DataSource::Demo(portfolio) => portfolio.drilldown(customer_id),
        }
    }

    pub async fn predict(&self, customer_id: &str) -> Result<PredictionResponse, ClientError> {
        match self {
            DataSource::Backend(client) => client.predict(customer_id).await,
            DataSource::Demo(portfolio) => portfolio.prediction(customer_id),
        }
    }

    /// Behavioural banking record; the demo book has none.
    pub async fn profile(&self, customer_id: &str) -> Result<Option<CustomerData>, ClientError> {
        match self {
            DataSource::Backend(client) => client.customer(customer_id).await.map(Some),
            DataSource::Demo(_) => Ok(None),
        }
    }

    pub async fn predict_and_send_intervention(
        &self,
        customer_id: &str,
    ) -> Result<InterventionDispatch, ClientError> {
        match self {
            DataSource::Backend(client) => client.predict_and_send_intervention(customer_id).await,
            DataSource::Demo(portfolio) => portfolio.intervention_dispatch(customer_id),
        }
    }

    /// Customers for the alert queue, riskiest first.
    pub async fn alert_items(&self, limit: Option<u32>) -> Result<Vec<AlertItem>, ClientError> {
        let mut items: Vec<AlertItem> = match self {
            DataSource::Backend(client) => client
                .risk_list(limit)
                .await?
                .into_iter()
                .map(|item| AlertItem {
                    customer_id: item.customer_id,
                    name: None,
                    risk_probability: item.risk_probability,
                    risk_category: item.risk_category,
                    status: InterventionStatus::NotContacted,
                })
                .collect(),
            DataSource::Demo(portfolio) => portfolio
                .risk_list(limit)
                .into_iter()
                .map(|item| {
                    let customer = portfolio.find(&item.customer_id).ok();
                    AlertItem {
                        name: customer.map(|c| c.name.clone()),
                        status: customer
                            .map(|c| c.intervention_status())
                            .unwrap_or(InterventionStatus::NotContacted),
                        customer_id: item.customer_id,
                        risk_probability: item.risk_probability,
                        risk_category: item.risk_category,
                    }
                })
                .collect(),
        };

        items.sort_by(|a, b| {
            b.risk_probability
                .total_cmp(&a.risk_probability)
                .then_with(|| a.customer_id.cmp(&b.customer_id))
        });
        Ok(items)
    }
}

// ============ Page Loaders ============

/// Everything the portfolio overview renders.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardData {
    pub summary: PortfolioSummary,
    pub trend: Vec<RiskTrendPoint>,
    pub feature_importance: Vec<FeatureImportancePoint>,
    pub heatmap: Vec<HeatmapRow>,
}

/// Fetches the four overview series in parallel.
pub async fn load_dashboard(source: &DataSource) -> Result<DashboardData, ClientError> {
    let (summary, trend, feature_importance, heatmap) = tokio::try_join!(
        source.portfolio_summary(),
        source.portfolio_trend(),
        source.feature_importance(),
        source.heatmap(),
    )?;

    Ok(DashboardData {
        summary,
        trend,
        feature_importance,
        heatmap,
    })
}

/// A row of the alert queue.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertItem {
    pub customer_id: String,
    pub name: Option<String>,
    pub risk_probability: f64,
    pub risk_category: RiskCategory,
    pub status: InterventionStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlertQueue {
    pub items: Vec<AlertItem>,
    pub counts: CategoryCounts,
}

pub async fn load_alert_queue(
    source: &DataSource,
    limit: Option<u32>,
) -> Result<AlertQueue, ClientError> {
    let items = source.alert_items(limit).await?;
    let counts = CategoryCounts::from_probabilities(items.iter().map(|i| i.risk_probability));
    Ok(AlertQueue { items, counts })
}

/// Drilldown screen data for one customer.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerDetail {
    pub drilldown: CustomerDrilldown,
    pub prediction: PredictionResponse,
    pub profile: Option<CustomerData>,
}

impl CustomerDetail {
    pub fn ranked_contributions(&self) -> Vec<FeatureContribution> {
        ranked_contributions(&self.drilldown.contributing_features)
    }

    pub fn top_signal(&self) -> Option<FeatureContribution> {
        top_signal(&self.drilldown.contributing_features)
    }
}

/// Fetches drilldown, prediction and profile in parallel.
pub async fn load_customer_detail(
    source: &DataSource,
    customer_id: &str,
) -> Result<CustomerDetail, ClientError> {
    let (drilldown, prediction, profile) = tokio::try_join!(
        source.drilldown(customer_id),
        source.predict(customer_id),
        source.profile(customer_id),
    )?;

    Ok(CustomerDetail {
        drilldown,
        prediction,
        profile,
    })
}

/// Backend readiness for the status banner.
pub async fn load_health(source: &DataSource) -> Result<HealthResponse, ClientError> {
    let health = source.health().await?;
    if !health.is_operational() {
        tracing::warn!("Backend reports status '{}'", health.status);
    }
    Ok(health)
}

pub async fn trigger_intervention(
    source: &DataSource,
    customer_id: &str,
) -> Result<InterventionDispatch, ClientError> {
    let dispatch = source.predict_and_send_intervention(customer_id).await?;
    tracing::info!(
        "Intervention check for {}: threshold exceeded: {}, email sent: {}",
        customer_id,
        dispatch.intervention.threshold_exceeded,
        dispatch.intervention.email_sent
    );
    Ok(dispatch)
}

/// Mounts the portfolio overview and starts its load.
pub fn mount_dashboard(source: &DataSource) -> PageHandle<DashboardData> {
    let mut page = PageHandle::new();
    let source = source.clone();
    page.load(async move { load_dashboard(&source).await });
    page
}

/// Mounts the alert queue and starts its load.
pub fn mount_alert_queue(source: &DataSource, limit: Option<u32>) -> PageHandle<AlertQueue> {
    let mut page = PageHandle::new();
    let source = source.clone();
    page.load(async move { load_alert_queue(&source, limit).await });
    page
}

/// Mounts the backend status banner and starts its load.
pub fn mount_health(source: &DataSource) -> PageHandle<HealthResponse> {
    let mut page = PageHandle::new();
    let source = source.clone();
    page.load(async move { load_health(&source).await });
    page
}

/// Customer drilldown screen.
///
/// Details already loaded by this page are served from a short-lived cache
/// that lives and dies with the page. Failures are not cached.
pub struct CustomerPage {
    source: DataSource,
    cache: Cache<String, CustomerDetail>,
    current: Option<String>,
    view: PageHandle<CustomerDetail>,
}

impl CustomerPage {
    pub fn new(source: DataSource) -> Self {
        let cache = Cache::builder()
            .time_to_live(Duration::from_secs(300))
            .max_capacity(500)
            .build();

        Self {
            source,
            cache,
            current: None,
            view: PageHandle::new(),
        }
    }

    /// Shows `customer_id`, loading it unless this page already has it.
    pub fn open(&mut self, customer_id: &str) {
        let customer_id = customer_id.trim().to_string();
        self.current = Some(customer_id.clone());

        let source = self.source.clone();
        let cache = self.cache.clone();
        self.view.load(async move {
            if let Some(hit) = cache.get(&customer_id).await {
                tracing::debug!("Customer detail cache hit for {}", customer_id);
                return Ok(hit);
            }
            let detail = load_customer_detail(&source, &customer_id).await?;
            cache.insert(customer_id, detail.clone()).await;
            Ok(detail)
        });
    }

    /// Refetches the current customer, bypassing the cache.
    pub async fn reload(&mut self) {
        if let Some(customer_id) = self.current.clone() {
            self.cache.invalidate(&customer_id).await;
            self.open(&customer_id);
        }
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn view(&self) -> &PageHandle<CustomerDetail> {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut PageHandle<CustomerDetail> {
        &mut self.view
    }
}

// ============ Derived Views ============

/// Contributions ordered by absolute impact, largest first; ties by name.
pub fn ranked_contributions(features: &BTreeMap<String, f64>) -> Vec<FeatureContribution> {
    let mut ranked: Vec<FeatureContribution> = features
        .iter()
        .map(|(feature, contribution)| FeatureContribution {
            feature: feature.clone(),
            contribution: *contribution,
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.contribution
            .abs()
            .total_cmp(&a.contribution.abs())
            .then_with(|| a.feature.cmp(&b.feature))
    });
    ranked
}

/// The feature pushing risk up the most; falls back to the largest absolute
/// contributor when nothing pushes up.
pub fn top_signal(features: &BTreeMap<String, f64>) -> Option<FeatureContribution> {
    let ranked = ranked_contributions(features);
    ranked
        .iter()
        .find(|c| c.contribution > 0.0)
        .or_else(|| ranked.first())
        .cloned()
}

/// Alert list filter; `None` means "any".
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AlertFilter {
    pub category: Option<RiskCategory>,
    pub status: Option<InterventionStatus>,
}

impl AlertFilter {
    pub fn matches(&self, item: &AlertItem) -> bool {
        self.category.map_or(true, |c| c == item.risk_category)
            && self.status.map_or(true, |s| s == item.status)
    }
}

pub fn filter_alerts<'a>(items: &'a [AlertItem], filter: &AlertFilter) -> Vec<&'a AlertItem> {
    items.iter().filter(|item| filter.matches(item)).collect()
}

/// Customer counts per risk bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryCounts {
    pub low: u64,
    pub medium: u64,
    pub high: u64,
}

impl CategoryCounts {
    /// Buckets raw probabilities with the shared thresholds.
    pub fn from_probabilities(probabilities: impl IntoIterator<Item = f64>) -> Self {
        let mut counts = Self::default();
        for probability in probabilities {
            match RiskCategory::from_probability(probability) {
                RiskCategory::Low => counts.low += 1,
                RiskCategory::Medium => counts.medium += 1,
                RiskCategory::High => counts.high += 1,
            }
        }
        counts
    }

    pub fn get(&self, category: RiskCategory) -> u64 {
        match category {
            RiskCategory::Low => self.low,
            RiskCategory::Medium => self.medium,
            RiskCategory::High => self.high,
        }
    }

    pub fn total(&self) -> u64 {
        self.low + self.medium + self.high
    }
}

pub fn bucket_counts(items: &[CustomerRiskItem]) -> CategoryCounts {
    CategoryCounts::from_probabilities(items.iter().map(|item| item.risk_probability))
}

/// Business-friendly label for a backend feature name.
pub fn humanize_feature(feature: &str) -> String {
    let label = match feature {
        "Salary_Delay_Days" => "Frequent Salary Credit Delays",
        "Past_EMI_Delays_6M" => "Multiple EMI Delays (Last 6 Months)",
        "Credit_Utilization_%" => "High Credit Card Utilization",
        "Savings_Drop_%" => "Sudden Savings Decline",
        "Discretionary_Drop_%" | "Discretionary_Spend_Drop_%" => "Reduced Spending Pattern",
        "Utility_Payment_Shift_Days" | "Utility_Bill_Payment_Shift" => "Irregular Bill Payments",
        "ATM_Withdrawal_Increase_%" => "Increased Cash Withdrawals",
        "Historical_Stability_Index" => "Account Instability",
        other => return other.replace('_', " ").trim().to_string(),
    };
    label.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contributions(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn alert(id: &str, probability: f64, status: InterventionStatus) -> AlertItem {
        AlertItem {
            customer_id: id.to_string(),
            name: None,
            risk_probability: probability,
            risk_category: RiskCategory::from_probability(probability),
            status,
        }
    }

    #[test]
    fn test_ranked_by_absolute_impact() {
        let features = contributions(&[("a", 0.1), ("b", -0.5), ("c", 0.3), ("d", -0.3)]);
        let ranked: Vec<String> = ranked_contributions(&features)
            .into_iter()
            .map(|c| c.feature)
            .collect();
        assert_eq!(ranked, vec!["b", "c", "d", "a"]);
    }

    #[test]
    fn test_top_signal_prefers_positive() {
        let features = contributions(&[("a", 0.1), ("b", -0.5)]);
        assert_eq!(top_signal(&features).unwrap().feature, "a");

        let features = contributions(&[("a", -0.1), ("b", -0.5)]);
        assert_eq!(top_signal(&features).unwrap().feature, "b");

        assert!(top_signal(&BTreeMap::new()).is_none());
    }

    #[test]
    fn test_filter_alerts() {
        let items = vec![
            alert("C1", 0.9, InterventionStatus::Pending),
            alert("C2", 0.8, InterventionStatus::Completed),
            alert("C3", 0.5, InterventionStatus::Pending),
            alert("C4", 0.1, InterventionStatus::NotContacted),
        ];

        let all = filter_alerts(&items, &AlertFilter::default());
        assert_eq!(all.len(), 4);

        let high_pending = filter_alerts(
            &items,
            &AlertFilter {
                category: Some(RiskCategory::High),
                status: Some(InterventionStatus::Pending),
            },
        );
        assert_eq!(high_pending.len(), 1);
        assert_eq!(high_pending[0].customer_id, "C1");

        let pending = filter_alerts(
            &items,
            &AlertFilter {
                category: None,
                status: Some(InterventionStatus::Pending),
            },
        );
        assert_eq!(pending.len(), 2);
    }

    #[test]
    fn test_bucket_counts_use_thresholds() {
        let items: Vec<CustomerRiskItem> = [0.0, 0.39, 0.4, 0.69, 0.7, 1.0]
            .iter()
            .enumerate()
            .map(|(i, p)| CustomerRiskItem {
                customer_id: format!("C{}", i),
                risk_probability: *p,
                risk_category: RiskCategory::Low,
            })
            .collect();
        let counts = bucket_counts(&items);
        assert_eq!(
            counts,
            CategoryCounts {
                low: 2,
                medium: 2,
                high: 2
            }
        );
        assert_eq!(counts.total(), 6);
        assert_eq!(counts.get(RiskCategory::High), 2);
    }

    #[test]
    fn test_humanize_feature() {
        assert_eq!(
            humanize_feature("Salary_Delay_Days"),
            "Frequent Salary Credit Delays"
        );
        assert_eq!(humanize_feature("Current_Savings"), "Current Savings");
    }

    #[tokio::test]
    async fn test_page_commits_result() {
        let mut page: PageHandle<u32> = PageHandle::new();
        assert!(page.is_loading());
        page.load(async { Ok(5) });
        page.settled().await;
        assert_eq!(page.snapshot(), ViewState::Ready(5));
    }

    #[tokio::test]
    async fn test_page_keeps_error_message() {
        let mut page: PageHandle<u32> = PageHandle::new();
        page.load(async { Err(ClientError::not_found("not found")) });
        page.settled().await;
        assert_eq!(page.error().as_deref(), Some("not found"));
        assert!(!page.is_loading());
    }

    #[tokio::test]
    async fn test_result_after_unmount_is_dropped() {
        let (tx, rx) = tokio::sync::oneshot::channel::<u32>();
        let mut page: PageHandle<u32> = PageHandle::new();
        page.load(async move { rx.await.map_err(|e| ClientError::Transport(e.to_string())) });

        page.unmount();
        tx.send(9).unwrap();
        page.settled().await;

        assert_eq!(page.snapshot(), ViewState::Loading);
    }

    #[tokio::test]
    async fn test_superseded_load_is_dropped() {
        let (slow_tx, slow_rx) = tokio::sync::oneshot::channel::<u32>();
        let mut page: PageHandle<u32> = PageHandle::new();
        page.load(async move { slow_rx.await.map_err(|e| ClientError::Transport(e.to_string())) });
        let slow_task = page.task.take().unwrap();

        page.load(async { Ok(2) });
        page.settled().await;
        assert_eq!(page.snapshot(), ViewState::Ready(2));

        slow_tx.send(1).unwrap();
        slow_task.await.unwrap();
        assert_eq!(page.snapshot(), ViewState::Ready(2));
    }
}
