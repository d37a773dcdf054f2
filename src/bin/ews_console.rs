//! Terminal front end for the early warning dashboard.
//!
//! Drives the same page models the dashboard uses and prints what each screen
//! would show.
//!
//! ```text
//! ews-console [--demo] [--seed N] <command>
//!
//!   health                                   backend status banner
//!   summary                                  portfolio overview
//!   customers [--limit N]                    customer identifiers
//!   alerts [--category C] [--status S] [--limit N]
//!   customer <id>                            customer drilldown
//!   intervene <id>                           predict and trigger backend intervention
//! ```

use chrono::Utc;
use clap::{Parser, Subcommand};
use ews_dashboard::backend_client::BackendClient;
use ews_dashboard::config::BackendConfig;
use ews_dashboard::models::{InterventionStatus, RiskCategory};
use ews_dashboard::synthetic::{generate_portfolio, DemoPortfolio, DEMO_PORTFOLIO_SIZE};
use ews_dashboard::views::{
    self, filter_alerts, humanize_feature, AlertFilter, CustomerPage, DataSource, PageHandle,
    ViewState,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Early warning dashboard console
#[derive(Parser, Debug)]
#[command(name = "ews-console")]
#[command(version, about, long_about = None)]
struct Args {
    /// Use a synthetic demo portfolio instead of the prediction backend
    #[arg(long, global = true)]
    demo: bool,

    /// Seed for the demo portfolio (random when omitted)
    #[arg(long, global = true, value_name = "N")]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Backend status banner
    Health,
    /// Portfolio overview
    Summary,
    /// Customer identifiers
    Customers {
        /// Maximum number of identifiers to list
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Alert queue, riskiest first
    Alerts {
        /// Only show LOW, MEDIUM or HIGH
        #[arg(long)]
        category: Option<RiskCategory>,
        /// Only show one intervention status (e.g. pending, not_contacted)
        #[arg(long)]
        status: Option<InterventionStatus>,
        /// Maximum number of customers to load
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Customer drilldown
    Customer { id: String },
    /// Predict and trigger the backend intervention step
    Intervene { id: String },
}

fn data_source(args: &Args) -> anyhow::Result<DataSource> {
    if args.demo {
        let portfolio = match args.seed {
            Some(seed) => generate_portfolio(seed, DEMO_PORTFOLIO_SIZE, Utc::now().date_naive()),
            None => DemoPortfolio::fresh(),
        };
        tracing::info!("Demo mode: {} synthetic customers", portfolio.len());
        return Ok(DataSource::Demo(portfolio));
    }

    let config = BackendConfig::from_env()?;
    tracing::info!("Using prediction backend at {}", config.base_url);
    let client = BackendClient::new(&config)?;
    Ok(DataSource::Backend(client))
}

/// Waits for `page` and returns its data, or the error message it settled on.
async fn settle<T: Clone + Send + 'static>(page: &mut PageHandle<T>) -> anyhow::Result<T> {
    page.settled().await;
    match page.snapshot() {
        ViewState::Ready(data) => Ok(data),
        ViewState::Failed(message) => Err(anyhow::anyhow!(message)),
        ViewState::Loading => Err(anyhow::anyhow!("page did not finish loading")),
    }
}

async fn show_health(source: &DataSource) -> anyhow::Result<()> {
    let health = settle(&mut views::mount_health(source)).await?;
    let banner = if health.is_operational() {
        "operational"
    } else {
        "degraded"
    };
    println!("Backend: {} ({})", banner, health.status);
    println!("  model loaded:         {}", health.model_loaded);
    println!("  customer data loaded: {}", health.customer_data_loaded);
    println!("  model version:        {}", health.model_version);
    println!("  total customers:      {}", health.total_customers);
    Ok(())
}

async fn show_summary(source: &DataSource) -> anyhow::Result<()> {
    let data = settle(&mut views::mount_dashboard(source)).await?;

    let summary = &data.summary;
    println!("Portfolio ({} customers)", summary.total_customers);
    println!("  HIGH:   {}", summary.high_risk_count);
    println!("  MEDIUM: {}", summary.medium_risk_count);
    println!("  LOW:    {}", summary.low_risk_count);

    println!("\nRisk trend");
    for point in &data.trend {
        println!(
            "  {:>4}  avg {:>5.1}  p(delinquency) {:.3}",
            point.week, point.avg_risk_score, point.delinquency_probability
        );
    }

    println!("\nFeature importance");
    for point in &data.feature_importance {
        println!(
            "  {:<45} {:.3}",
            humanize_feature(&point.feature_name),
            point.importance_score
        );
    }

    println!("\nHeatmap (0-20 / 20-40 / 40-60 / 60-80 / 80-100)");
    for row in &data.heatmap {
        println!(
            "  {:<12} {:>4} {:>4} {:>4} {:>4} {:>4}",
            row.cohort,
            row.bucket0_20,
            row.bucket20_40,
            row.bucket40_60,
            row.bucket60_80,
            row.bucket80_100
        );
    }
    Ok(())
}

async fn list_customers(source: &DataSource, limit: Option<u32>) -> anyhow::Result<()> {
    let ids = source.list_customers(limit).await?;
    println!("{} customers", ids.len());
    for id in ids {
        println!("  {}", id);
    }
    Ok(())
}

async fn show_alerts(
    source: &DataSource,
    filter: AlertFilter,
    limit: Option<u32>,
) -> anyhow::Result<()> {
    let queue = settle(&mut views::mount_alert_queue(source, limit)).await?;
    let visible = filter_alerts(&queue.items, &filter);

    let breakdown: Vec<String> = RiskCategory::all()
        .iter()
        .rev()
        .map(|category| format!("{} {}", category, queue.counts.get(*category)))
        .collect();
    println!(
        "Alerts: {} shown of {} ({})",
        visible.len(),
        queue.counts.total(),
        breakdown.join(", ")
    );
    for item in visible {
        println!(
            "  {:<12} {:<22} {:>5.1}%  {:<6} {}",
            item.customer_id,
            item.name.as_deref().unwrap_or("-"),
            item.risk_probability * 100.0,
            item.risk_category,
            item.status
        );
    }
    Ok(())
}

async fn show_customer(source: &DataSource, customer_id: &str) -> anyhow::Result<()> {
    let mut page = CustomerPage::new(source.clone());
    page.open(customer_id);
    let detail = settle(page.view_mut()).await?;

    let prediction = &detail.prediction;
    println!(
        "{}: {} risk ({:.1}%), model {}",
        prediction.customer_id,
        prediction.risk_category,
        prediction.risk_probability * 100.0,
        prediction.model_version
    );
    println!(
        "  behavioural score {:.2}, liquidity score {:.2}",
        detail.drilldown.behavioural_score, detail.drilldown.liquidity_score
    );

    if let Some(top) = detail.top_signal() {
        println!("  top signal: {}", humanize_feature(&top.feature));
    }
    println!("\nContributing features");
    for contribution in detail.ranked_contributions() {
        println!(
            "  {:<45} {:+.3}",
            humanize_feature(&contribution.feature),
            contribution.contribution
        );
    }

    if let Some(profile) = &detail.profile {
        println!("\nProfile");
        println!("  salary delay days:      {:.0}", profile.salary_delay_days);
        println!("  savings drop:           {:.1}%", profile.savings_drop_pct);
        println!("  credit utilization:     {:.1}%", profile.credit_utilization_pct);
        println!("  EMI delays (6 months):  {:.0}", profile.past_emi_delays_6m);
    }

    if let DataSource::Demo(portfolio) = source {
        let customer = portfolio.find(customer_id)?;
        println!("\nInterventions ({})", customer.intervention_status());
        for record in &customer.interventions {
            println!(
                "  {}  {:<24} {:<14} {}",
                record.date, record.kind, record.status, record.officer
            );
        }
    }
    Ok(())
}

async fn intervene(source: &DataSource, customer_id: &str) -> anyhow::Result<()> {
    let dispatch = views::trigger_intervention(source, customer_id).await?;
    let result = &dispatch.intervention;

    println!(
        "{}: {} ({:.1}%)",
        dispatch.prediction.customer_id,
        dispatch.prediction.risk_category,
        dispatch.prediction.risk_probability * 100.0
    );
    if !result.threshold_exceeded {
        println!("  below intervention threshold, nothing sent");
    } else if source.is_demo() {
        println!("  demo mode: intervention email not sent");
    } else if result.email_sent {
        println!(
            "  intervention email sent: {}",
            result.email_subject.as_deref().unwrap_or("(no subject)")
        );
    } else {
        println!(
            "  intervention email not sent: {}",
            result.email_error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ews_dashboard=warn,ews_console=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let source = data_source(&args)?;

    match args.command {
        Command::Health => show_health(&source).await,
        Command::Summary => show_summary(&source).await,
        Command::Customers { limit } => list_customers(&source, limit).await,
        Command::Alerts {
            category,
            status,
            limit,
        } => show_alerts(&source, AlertFilter { category, status }, limit).await,
        Command::Customer { id } => show_customer(&source, &id).await,
        Command::Intervene { id } => intervene(&source, &id).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn test_parse_alert_filters() {
        let args = Args::try_parse_from([
            "ews-console",
            "--demo",
            "alerts",
            "--category",
            "HIGH",
            "--status",
            "pending",
            "--limit",
            "20",
        ])
        .unwrap();

        assert!(args.demo);
        assert_eq!(
            args.command,
            Command::Alerts {
                category: Some(RiskCategory::High),
                status: Some(InterventionStatus::Pending),
                limit: Some(20),
            }
        );
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args =
            Args::try_parse_from(["ews-console", "customer", "CUST_00007", "--demo", "--seed", "9"])
                .unwrap();
        assert!(args.demo);
        assert_eq!(args.seed, Some(9));
        assert_eq!(
            args.command,
            Command::Customer {
                id: "CUST_00007".to_string()
            }
        );
    }

    #[test]
    fn test_help_is_not_a_failure() {
        let err = Args::try_parse_from(["ews-console", "--help"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        assert_eq!(err.exit_code(), 0);
    }

    #[test]
    fn test_misspelled_flag_is_rejected() {
        let err = Args::try_parse_from(["ews-console", "alerts", "--categroy", "HIGH"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownArgument);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = Args::try_parse_from(["ews-console", "alerts", "--category", "SEVERE"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);

        assert!(Args::try_parse_from(["ews-console", "--seed", "health"]).is_err());
        assert!(Args::try_parse_from(["ews-console"]).is_err());
    }
}
