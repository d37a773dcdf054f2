//! Synthetic customer portfolio for running the dashboard without a backend.
//!
//! [`generate_portfolio`] is the single entry point: it takes a seed, a size and
//! the reference date, and returns an immutable [`DemoPortfolio`] the caller
//! owns. The projections on `DemoPortfolio` follow the backend's own
//! aggregation rules so demo screens look like live ones.

use crate::errors::ClientError;
use crate::models::*;
use chrono::{Duration, NaiveDate, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_distr::{Beta, Distribution};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Number of customers in the demo book.
pub const DEMO_PORTFOLIO_SIZE: usize = 120;
/// Length of each generated trend series, in days.
pub const TREND_DAYS: u32 = 30;
pub const MIN_RISK_SCORE: u8 = 5;
pub const MAX_RISK_SCORE: u8 = 98;
pub const DEMO_MODEL_VERSION: &str = "demo-1.0";

/// Probability at or above which the backend's automatic intervention fires.
const INTERVENTION_THRESHOLD: f64 = 0.4;

/// Behavioural features the attributions are spread over (backend names).
pub const ATTRIBUTION_FEATURES: [&str; 8] = [
    "Salary_Delay_Days",
    "Savings_Drop_%",
    "Discretionary_Drop_%",
    "Utility_Payment_Shift_Days",
    "ATM_Withdrawal_Increase_%",
    "Credit_Utilization_%",
    "Past_EMI_Delays_6M",
    "Historical_Stability_Index",
];

const FIRST_NAMES: [&str; 16] = [
    "Aarav", "Priya", "Rohan", "Ananya", "Vikram", "Meera", "Arjun", "Kavya", "Daniel", "Sofia",
    "Liam", "Amara", "Noah", "Chloe", "Ethan", "Zara",
];

const LAST_NAMES: [&str; 12] = [
    "Sharma", "Patel", "Iyer", "Reddy", "Khan", "Fernandes", "Mehta", "Okafor", "Nguyen",
    "Walker", "Silva", "Kapoor",
];

const REGIONS: [&str; 5] = ["North", "South", "East", "West", "Central"];

const OFFICERS: [&str; 4] = ["R. Menon", "S. Das", "J. Carter", "L. Gomez"];

/// A demo customer record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyntheticCustomer {
    pub id: String,
    pub name: String,
    pub email: String,
    pub segment: CustomerSegment,
    pub region: String,
    pub account_age_months: u32,
    pub monthly_income: f64,
    pub outstanding_balance: f64,
    /// Risk on a 0-100 scale, always within [5, 98].
    pub risk_score: u8,
    pub risk_category: RiskCategory,
    pub behavioural_score: f64,
    pub liquidity_score: f64,
    pub risk_trend: Vec<TrendPoint>,
    pub savings_trend: Vec<TrendPoint>,
    pub spend_trend: Vec<TrendPoint>,
    /// Oldest first.
    pub interventions: Vec<InterventionRecord>,
    /// Signed SHAP-like attributions; absolute values sum to 1.
    pub feature_attributions: BTreeMap<String, f64>,
}

impl SyntheticCustomer {
    pub fn risk_probability(&self) -> f64 {
        f64::from(self.risk_score) / 100.0
    }

    /// Status of the most recent intervention.
    pub fn intervention_status(&self) -> InterventionStatus {
        self.interventions
            .last()
            .map(|record| record.status)
            .unwrap_or(InterventionStatus::NotContacted)
    }

    pub fn risk_item(&self) -> CustomerRiskItem {
        CustomerRiskItem {
            customer_id: self.id.clone(),
            risk_probability: round_to(self.risk_probability(), 3),
            risk_category: self.risk_category,
        }
    }
}

/// Random-walk trend series.
///
/// Emits `days + 1` points dated `today - days` through `today`. Each step adds
/// `trend + uniform(-volatility/2, +volatility/2)` to the running value, which
/// is floored at zero.
pub fn random_walk<R: Rng + ?Sized>(
    rng: &mut R,
    today: NaiveDate,
    days: u32,
    base: f64,
    volatility: f64,
    trend: f64,
) -> Vec<TrendPoint> {
    let half = volatility.abs() / 2.0;
    let mut value = base.max(0.0);
    let mut points = Vec::with_capacity(days as usize + 1);

    for offset in (0..=i64::from(days)).rev() {
        let noise = if half > 0.0 {
            rng.gen_range(-half..=half)
        } else {
            0.0
        };
        value = (value + trend + noise).max(0.0);
        points.push(TrendPoint {
            date: today - Duration::days(offset),
            value: round_to(value, 2),
        });
    }

    points
}

/// Generates `count` customers from `seed`, dated relative to `today`.
///
/// The same inputs always produce the same portfolio.
pub fn generate_portfolio(seed: u64, count: usize, today: NaiveDate) -> DemoPortfolio {
    let mut rng = StdRng::seed_from_u64(seed);
    let customers: Vec<SyntheticCustomer> = (0..count)
        .map(|index| generate_customer(&mut rng, index, today))
        .collect();

    tracing::debug!(
        "Generated {} synthetic customers (seed {})",
        customers.len(),
        seed
    );

    DemoPortfolio {
        customers: customers.into(),
        today,
    }
}

fn generate_customer<R: Rng + ?Sized>(
    rng: &mut R,
    index: usize,
    today: NaiveDate,
) -> SyntheticCustomer {
    let first = FIRST_NAMES.choose(rng).copied().unwrap_or("Alex");
    let last = LAST_NAMES.choose(rng).copied().unwrap_or("Morgan");
    let segment = match rng.gen_range(0..100) {
        0..=59 => CustomerSegment::Retail,
        60..=84 => CustomerSegment::Premium,
        _ => CustomerSegment::SmallBusiness,
    };
    let income_base = match segment {
        CustomerSegment::Retail => 45_000.0,
        CustomerSegment::Premium => 140_000.0,
        CustomerSegment::SmallBusiness => 95_000.0,
    };
    let monthly_income = round_to(income_base * rng.gen_range(0.7..1.4), 2);

    let risk_score = draw_risk_score(rng);
    let probability = f64::from(risk_score) / 100.0;
    let risk_category = RiskCategory::from_probability(probability);

    // Positive for risky customers: risk climbs while money drains.
    let drift = (f64::from(risk_score) - 50.0) / 50.0;
    let days = f64::from(TREND_DAYS);

    let risk_trend = random_walk(
        rng,
        today,
        TREND_DAYS,
        f64::from(risk_score) - drift * 0.8 * days,
        4.0,
        drift * 0.8,
    );

    let savings_base = monthly_income * rng.gen_range(0.5..3.0);
    let savings_trend = random_walk(
        rng,
        today,
        TREND_DAYS,
        savings_base,
        savings_base * 0.04,
        -drift * savings_base * 0.01,
    );

    let daily_spend = monthly_income * 0.3 / days;
    let spend_trend = random_walk(
        rng,
        today,
        TREND_DAYS,
        daily_spend,
        daily_spend * 0.2,
        -drift * daily_spend * 0.005,
    );

    SyntheticCustomer {
        id: format!("CUST_{:05}", index + 1),
        name: format!("{} {}", first, last),
        email: format!(
            "{}.{}{}@example.com",
            first.to_lowercase(),
            last.to_lowercase(),
            index + 1
        ),
        segment,
        region: REGIONS.choose(rng).copied().unwrap_or("Central").to_string(),
        account_age_months: rng.gen_range(6..=240),
        monthly_income,
        outstanding_balance: round_to(monthly_income * rng.gen_range(0.5..8.0), 2),
        risk_score,
        risk_category,
        behavioural_score: round_to((probability + rng.gen_range(-0.15..0.15)).clamp(0.0, 1.0), 3),
        liquidity_score: round_to(
            (probability * 0.8 + rng.gen_range(-0.1..0.2)).clamp(0.0, 1.0),
            3,
        ),
        risk_trend,
        savings_trend,
        spend_trend,
        interventions: generate_interventions(rng, risk_category, today),
        feature_attributions: generate_attributions(rng, probability),
    }
}

/// Draws a score in [5, 98] skewed towards the low-risk end of the book.
fn draw_risk_score<R: Rng + ?Sized>(rng: &mut R) -> u8 {
    let unit: f64 = Beta::new(2.0, 2.6)
        .map(|beta| beta.sample(rng))
        .unwrap_or_else(|_| rng.gen());
    let span = f64::from(MAX_RISK_SCORE - MIN_RISK_SCORE);
    let score = (f64::from(MIN_RISK_SCORE) + unit * span).round();
    (score as u8).clamp(MIN_RISK_SCORE, MAX_RISK_SCORE)
}

fn generate_interventions<R: Rng + ?Sized>(
    rng: &mut R,
    category: RiskCategory,
    today: NaiveDate,
) -> Vec<InterventionRecord> {
    let count = match category {
        RiskCategory::Low => usize::from(rng.gen_bool(0.15)),
        RiskCategory::Medium => rng.gen_range(0..=2),
        RiskCategory::High => rng.gen_range(1..=3),
    };

    let mut offsets: Vec<i64> = (0..count).map(|_| rng.gen_range(1..=90)).collect();
    offsets.sort_unstable_by(|a, b| b.cmp(a));

    let kinds = InterventionKind::all();
    offsets
        .iter()
        .enumerate()
        .map(|(position, offset)| {
            let latest = position + 1 == count;
            let status = if latest {
                *[
                    InterventionStatus::Pending,
                    InterventionStatus::InProgress,
                    InterventionStatus::Completed,
                    InterventionStatus::Declined,
                ]
                .choose(rng)
                .unwrap_or(&InterventionStatus::Pending)
            } else if rng.gen_bool(0.7) {
                InterventionStatus::Completed
            } else {
                InterventionStatus::Declined
            };
            InterventionRecord {
                date: today - Duration::days(*offset),
                kind: *kinds.choose(rng).unwrap_or(&InterventionKind::ReminderCall),
                status,
                officer: OFFICERS.choose(rng).copied().unwrap_or("R. Menon").to_string(),
            }
        })
        .collect()
}

/// Signed attributions whose absolute values sum to 1. The riskier the
/// customer, the more features push the prediction up.
fn generate_attributions<R: Rng + ?Sized>(rng: &mut R, probability: f64) -> BTreeMap<String, f64> {
    let positive_share = 0.2 + 0.7 * probability;
    let raw: Vec<(&str, f64)> = ATTRIBUTION_FEATURES
        .iter()
        .map(|feature| {
            let weight = rng.gen_range(0.05..1.0);
            let sign = if rng.gen_bool(positive_share) { 1.0 } else { -1.0 };
            (*feature, sign * weight)
        })
        .collect();

    let total: f64 = raw.iter().map(|(_, w)| w.abs()).sum();
    raw.into_iter()
        .map(|(feature, weight)| (feature.to_string(), round_to(weight / total, 3)))
        .collect()
}

/// An immutable, cheaply clonable demo book.
#[derive(Debug, Clone)]
pub struct DemoPortfolio {
    customers: Arc<[SyntheticCustomer]>,
    today: NaiveDate,
}

impl DemoPortfolio {
    /// A new random portfolio of [`DEMO_PORTFOLIO_SIZE`] customers dated today.
    pub fn fresh() -> Self {
        let seed: u64 = rand::random();
        generate_portfolio(seed, DEMO_PORTFOLIO_SIZE, Utc::now().date_naive())
    }

    pub fn customers(&self) -> &[SyntheticCustomer] {
        &self.customers
    }

    pub fn len(&self) -> usize {
        self.customers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.customers.is_empty()
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn find(&self, customer_id: &str) -> Result<&SyntheticCustomer, ClientError> {
        self.customers
            .iter()
            .find(|customer| customer.id == customer_id)
            .ok_or_else(|| {
                let err = ClientError::not_found(format!("Customer {} not found", customer_id));
                tracing::error!("Demo lookup failed: {}", err);
                err
            })
    }

    pub fn customer_ids(&self, limit: Option<u32>) -> Vec<String> {
        self.customers
            .iter()
            .take(limit_or_all(limit))
            .map(|customer| customer.id.clone())
            .collect()
    }

    pub fn risk_list(&self, limit: Option<u32>) -> Vec<CustomerRiskItem> {
        self.customers
            .iter()
            .take(limit_or_all(limit))
            .map(SyntheticCustomer::risk_item)
            .collect()
    }

    pub fn summary(&self) -> PortfolioSummary {
        let count = |category: RiskCategory| {
            self.customers
                .iter()
                .filter(|customer| customer.risk_category == category)
                .count() as u64
        };
        PortfolioSummary {
            low_risk_count: count(RiskCategory::Low),
            medium_risk_count: count(RiskCategory::Medium),
            high_risk_count: count(RiskCategory::High),
            total_customers: self.customers.len() as u64,
            generated_at: Utc::now(),
        }
    }

    /// Average probability per chunk, the book split into 12 contiguous weeks.
    pub fn trend(&self) -> Vec<RiskTrendPoint> {
        let probabilities: Vec<f64> = self
            .customers
            .iter()
            .map(SyntheticCustomer::risk_probability)
            .collect();

        split_even(&probabilities, 12)
            .into_iter()
            .enumerate()
            .filter(|(_, chunk)| !chunk.is_empty())
            .map(|(index, chunk)| {
                let avg = chunk.iter().sum::<f64>() / chunk.len() as f64;
                RiskTrendPoint {
                    week: format!("W{}", index + 1),
                    avg_risk_score: round_to(avg * 100.0, 2),
                    delinquency_probability: round_to(avg, 3),
                }
            })
            .collect()
    }

    /// Mean absolute attribution per feature, normalised to sum to 1.
    pub fn feature_importance(&self) -> Vec<FeatureImportancePoint> {
        let sums: Vec<f64> = ATTRIBUTION_FEATURES
            .iter()
            .map(|feature| {
                self.customers
                    .iter()
                    .filter_map(|customer| customer.feature_attributions.get(*feature))
                    .map(|value| value.abs())
                    .sum()
            })
            .collect();
        let total: f64 = sums.iter().sum();
        let total = if total > 0.0 { total } else { 1.0 };

        ATTRIBUTION_FEATURES
            .iter()
            .zip(sums)
            .map(|(feature, sum)| FeatureImportancePoint {
                feature_name: feature.to_string(),
                importance_score: round_to(sum / total, 4),
            })
            .collect()
    }

    /// Five contiguous cohorts, each bucketed by score at 20/40/60/80.
    pub fn heatmap(&self) -> Vec<HeatmapRow> {
        if self.customers.is_empty() {
            return Vec::new();
        }

        let scores: Vec<f64> = self
            .customers
            .iter()
            .map(|customer| f64::from(customer.risk_score))
            .collect();

        split_even(&scores, 5)
            .into_iter()
            .enumerate()
            .map(|(index, chunk)| {
                let mut row = HeatmapRow {
                    cohort: format!("Cohort {}", index + 1),
                    ..HeatmapRow::default()
                };
                for score in chunk {
                    match *score {
                        s if s < 20.0 => row.bucket0_20 += 1,
                        s if s < 40.0 => row.bucket20_40 += 1,
                        s if s < 60.0 => row.bucket40_60 += 1,
                        s if s < 80.0 => row.bucket60_80 += 1,
                        _ => row.bucket80_100 += 1,
                    }
                }
                row
            })
            .collect()
    }

    pub fn drilldown(&self, customer_id: &str) -> Result<CustomerDrilldown, ClientError> {
        let customer = self.find(customer_id)?;
        Ok(CustomerDrilldown {
            customer_id: customer.id.clone(),
            behavioural_score: customer.behavioural_score,
            liquidity_score: customer.liquidity_score,
            delinquency_probability: round_to(customer.risk_probability(), 3),
            contributing_features: customer.feature_attributions.clone(),
        })
    }

    /// Prediction with the top five drivers by absolute weight, renormalised.
    pub fn prediction(&self, customer_id: &str) -> Result<PredictionResponse, ClientError> {
        let customer = self.find(customer_id)?;

        let mut ranked: Vec<(&String, f64)> = customer
            .feature_attributions
            .iter()
            .map(|(feature, value)| (feature, value.abs()))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(5);

        let total: f64 = ranked.iter().map(|(_, v)| v).sum();
        let top_risk_drivers = ranked
            .into_iter()
            .map(|(feature, value)| {
                let share = if total > 0.0 { value / total } else { 0.0 };
                (feature.clone(), round_to(share, 3))
            })
            .collect();

        Ok(PredictionResponse {
            customer_id: customer.id.clone(),
            risk_probability: round_to(customer.risk_probability(), 3),
            risk_category: customer.risk_category,
            top_risk_drivers,
            model_version: DEMO_MODEL_VERSION.to_string(),
            prediction_timestamp: Utc::now(),
        })
    }

    /// Mirrors the backend's predict-and-send step without sending anything.
    pub fn intervention_dispatch(
        &self,
        customer_id: &str,
    ) -> Result<InterventionDispatch, ClientError> {
        let prediction = self.prediction(customer_id)?;
        let threshold_exceeded = prediction.risk_probability >= INTERVENTION_THRESHOLD;
        let email_subject = threshold_exceeded.then(|| {
            format!(
                "[{}] Delinquency Risk Assessment - Customer {}",
                prediction.risk_category, prediction.customer_id
            )
        });

        Ok(InterventionDispatch {
            prediction,
            intervention: InterventionResult {
                threshold_exceeded,
                email_sent: false,
                email_error: threshold_exceeded
                    .then(|| "Email delivery is disabled in demo mode".to_string()),
                email_subject,
            },
        })
    }

    pub fn health(&self) -> HealthResponse {
        HealthResponse {
            status: "operational".to_string(),
            model_loaded: true,
            customer_data_loaded: true,
            model_version: DEMO_MODEL_VERSION.to_string(),
            total_customers: self.customers.len() as u64,
        }
    }
}

fn limit_or_all(limit: Option<u32>) -> usize {
    limit.map(|l| l as usize).unwrap_or(usize::MAX)
}

/// Splits `items` into `parts` contiguous chunks whose sizes differ by at most
/// one, larger chunks first.
pub(crate) fn split_even<T>(items: &[T], parts: usize) -> Vec<&[T]> {
    if parts == 0 {
        return Vec::new();
    }
    let base = items.len() / parts;
    let extra = items.len() % parts;

    let mut chunks = Vec::with_capacity(parts);
    let mut start = 0;
    for index in 0..parts {
        let size = base + usize::from(index < extra);
        chunks.push(&items[start..start + size]);
        start += size;
    }
    chunks
}

pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
