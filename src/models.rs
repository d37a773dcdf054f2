use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Probability at which a customer moves from LOW to MEDIUM risk.
pub const MEDIUM_RISK_THRESHOLD: f64 = 0.40;
/// Probability at which a customer moves from MEDIUM to HIGH risk.
pub const HIGH_RISK_THRESHOLD: f64 = 0.70;

// ============ Enumerations ============

/// Coarse risk bucket derived from a delinquency probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskCategory {
    Low,
    Medium,
    High,
}

impl RiskCategory {
    /// Buckets a probability: LOW below 0.40, MEDIUM below 0.70, HIGH otherwise.
    ///
    /// Out-of-range inputs fall into the nearest bucket and NaN lands in HIGH.
    pub fn from_probability(probability: f64) -> Self {
        if probability < MEDIUM_RISK_THRESHOLD {
            RiskCategory::Low
        } else if probability < HIGH_RISK_THRESHOLD {
            RiskCategory::Medium
        } else {
            RiskCategory::High
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskCategory::Low => "LOW",
            RiskCategory::Medium => "MEDIUM",
            RiskCategory::High => "HIGH",
        }
    }

    /// All categories in ascending order of risk.
    pub fn all() -> [RiskCategory; 3] {
        [RiskCategory::Low, RiskCategory::Medium, RiskCategory::High]
    }
}

impl fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for RiskCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOW" => Ok(RiskCategory::Low),
            "MEDIUM" => Ok(RiskCategory::Medium),
            "HIGH" => Ok(RiskCategory::High),
            other => Err(format!("unknown risk category '{}'", other)),
        }
    }
}

/// Where a customer sits in the intervention workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionStatus {
    NotContacted,
    Pending,
    InProgress,
    Completed,
    Declined,
}

impl InterventionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterventionStatus::NotContacted => "not_contacted",
            InterventionStatus::Pending => "pending",
            InterventionStatus::InProgress => "in_progress",
            InterventionStatus::Completed => "completed",
            InterventionStatus::Declined => "declined",
        }
    }

    /// Whether the case still needs an officer's attention.
    pub fn is_open(&self) -> bool {
        match self {
            InterventionStatus::NotContacted
            | InterventionStatus::Pending
            | InterventionStatus::InProgress => true,
            InterventionStatus::Completed | InterventionStatus::Declined => false,
        }
    }
}

impl fmt::Display for InterventionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for InterventionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "not_contacted" => Ok(InterventionStatus::NotContacted),
            "pending" => Ok(InterventionStatus::Pending),
            "in_progress" => Ok(InterventionStatus::InProgress),
            "completed" => Ok(InterventionStatus::Completed),
            "declined" => Ok(InterventionStatus::Declined),
            other => Err(format!("unknown intervention status '{}'", other)),
        }
    }
}

/// Remedial action that can be offered to an at-risk customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionKind {
    PaymentHoliday,
    RestructuringOffer,
    FinancialCounselling,
    ReminderCall,
    FeeWaiver,
}

impl InterventionKind {
    pub fn all() -> [InterventionKind; 5] {
        [
            InterventionKind::PaymentHoliday,
            InterventionKind::RestructuringOffer,
            InterventionKind::FinancialCounselling,
            InterventionKind::ReminderCall,
            InterventionKind::FeeWaiver,
        ]
    }

    /// Label shown to officers in the intervention history.
    pub fn label(&self) -> &'static str {
        match self {
            InterventionKind::PaymentHoliday => "Payment Holiday",
            InterventionKind::RestructuringOffer => "Loan Restructuring Offer",
            InterventionKind::FinancialCounselling => "Financial Counselling Session",
            InterventionKind::ReminderCall => "Proactive Reminder Call",
            InterventionKind::FeeWaiver => "Late Fee Waiver",
        }
    }
}

impl fmt::Display for InterventionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

/// Customer book the account belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerSegment {
    Retail,
    Premium,
    SmallBusiness,
}

// ============ Backend Models ============

/// Body of `POST /predict` and `POST /predict-and-send-intervention`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub customer_id: String,
}

/// Risk prediction for a single customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub customer_id: String,
    /// Probability of delinquency within the next 2-4 weeks (0-1).
    pub risk_probability: f64,
    pub risk_category: RiskCategory,
    /// Top contributing features with normalized impact scores.
    pub top_risk_drivers: BTreeMap<String, f64>,
    pub model_version: String,
    pub prediction_timestamp: DateTime<Utc>,
}

/// Lightweight projection used by list views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRiskItem {
    pub customer_id: String,
    pub risk_probability: f64,
    pub risk_category: RiskCategory,
}

/// Per-customer expanded view combining sub-scores and feature contributions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerDrilldown {
    pub customer_id: String,
    pub behavioural_score: f64,
    pub liquidity_score: f64,
    pub delinquency_probability: f64,
    /// Feature name -> signed contribution.
    pub contributing_features: BTreeMap<String, f64>,
}

/// Response of the backend's `GET /` health check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model_loaded: bool,
    pub customer_data_loaded: bool,
    pub model_version: String,
    pub total_customers: u64,
}

impl HealthResponse {
    pub fn is_operational(&self) -> bool {
        self.status == "operational"
    }
}

/// Behavioural banking record returned by `GET /customer/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerData {
    pub customer_id: String,
    pub avg_salary_day_6m: f64,
    pub current_salary_day: f64,
    pub salary_delay_days: f64,
    pub savings_6m_avg: f64,
    pub current_savings: f64,
    pub savings_drop_pct: f64,
    pub discretionary_spend_6m_avg: f64,
    pub current_discretionary_spend: f64,
    pub discretionary_drop_pct: f64,
    pub utility_payment_shift_days: f64,
    pub atm_withdrawal_increase_pct: f64,
    pub credit_utilization_pct: f64,
    pub past_emi_delays_6m: f64,
    pub historical_stability_index: f64,
    pub historical_category: i64,
}

/// Portfolio risk counts for the overview charts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub low_risk_count: u64,
    pub medium_risk_count: u64,
    pub high_risk_count: u64,
    pub total_customers: u64,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskTrendPoint {
    /// Week label, `W1`..`W12`.
    pub week: String,
    /// Average risk on a 0-100 scale.
    pub avg_risk_score: f64,
    pub delinquency_probability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportancePoint {
    pub feature_name: String,
    pub importance_score: f64,
}

/// One cohort row of the portfolio heatmap (customer counts per score range).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeatmapRow {
    pub cohort: String,
    pub bucket0_20: u64,
    pub bucket20_40: u64,
    pub bucket40_60: u64,
    pub bucket60_80: u64,
    pub bucket80_100: u64,
}

impl HeatmapRow {
    pub fn total(&self) -> u64 {
        self.bucket0_20 + self.bucket20_40 + self.bucket40_60 + self.bucket60_80 + self.bucket80_100
    }
}

/// Outcome of the backend's automatic intervention step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterventionResult {
    pub threshold_exceeded: bool,
    pub email_sent: bool,
    pub email_subject: Option<String>,
    pub email_error: Option<String>,
}

/// Response of `POST /predict-and-send-intervention`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterventionDispatch {
    pub prediction: PredictionResponse,
    pub intervention: InterventionResult,
}

// ============ Demo / View Models ============

/// A single `{date, value}` sample of a trend series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Past intervention recorded against a customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterventionRecord {
    pub date: NaiveDate,
    pub kind: InterventionKind,
    pub status: InterventionStatus,
    pub officer: String,
}

/// A named input variable paired with its signed contribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureContribution {
    pub feature: String,
    pub contribution: f64,
}

// ============ Relay Models ============

/// Body of `POST /api/send-intervention` as received.
///
/// Every field is optional here so absent fields can be reported together
/// instead of failing on the first one.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterventionPayload {
    pub customer_id: Option<String>,
    pub customer_name: Option<String>,
    pub top_signal: Option<String>,
    pub selected_intervention: Option<String>,
    pub officer_notes: Option<String>,
}

/// A validated intervention request.
#[derive(Debug, Clone, PartialEq)]
pub struct InterventionRequest {
    pub customer_id: String,
    pub customer_name: String,
    pub top_signal: String,
    pub selected_intervention: String,
    pub officer_notes: Option<String>,
}

impl InterventionPayload {
    /// Names of required fields that are absent or blank, in wire spelling.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let blank = |v: &Option<String>| v.as_deref().map_or(true, |s| s.trim().is_empty());
        let mut missing = Vec::new();
        if blank(&self.customer_id) {
            missing.push("customerId");
        }
        if blank(&self.customer_name) {
            missing.push("customerName");
        }
        if blank(&self.top_signal) {
            missing.push("topSignal");
        }
        if blank(&self.selected_intervention) {
            missing.push("selectedIntervention");
        }
        missing
    }

    /// Converts into a request, or returns the missing field names.
    pub fn into_request(self) -> Result<InterventionRequest, Vec<&'static str>> {
        let missing = self.missing_fields();
        if !missing.is_empty() {
            return Err(missing);
        }

        let take = |v: Option<String>| v.unwrap_or_default().trim().to_string();
        Ok(InterventionRequest {
            customer_id: take(self.customer_id),
            customer_name: take(self.customer_name),
            top_signal: take(self.top_signal),
            selected_intervention: take(self.selected_intervention),
            officer_notes: self
                .officer_notes
                .map(|notes| notes.trim().to_string())
                .filter(|notes| !notes.is_empty()),
        })
    }
}

/// Success body of `POST /api/send-intervention`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendInterventionResponse {
    pub message_id: String,
    pub to: String,
}
