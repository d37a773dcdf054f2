/// Property-based tests using proptest
/// Tests invariants of risk bucketing and the synthetic portfolio for all inputs
use chrono::NaiveDate;
use ews_dashboard::models::{RiskCategory, HIGH_RISK_THRESHOLD, MEDIUM_RISK_THRESHOLD};
use ews_dashboard::synthetic::{
    generate_portfolio, random_walk, DEMO_PORTFOLIO_SIZE, MAX_RISK_SCORE, MIN_RISK_SCORE,
};
use ews_dashboard::views::CategoryCounts;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn reference_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
}

// Property: every probability lands in exactly the bucket its thresholds name
proptest! {
    #[test]
    fn bucketing_follows_thresholds(p in 0.0f64..=1.0) {
        let category = RiskCategory::from_probability(p);
        let expected = if p < MEDIUM_RISK_THRESHOLD {
            RiskCategory::Low
        } else if p < HIGH_RISK_THRESHOLD {
            RiskCategory::Medium
        } else {
            RiskCategory::High
        };
        prop_assert_eq!(category, expected);
    }

    #[test]
    fn bucket_counts_cover_every_item(ps in prop::collection::vec(0.0f64..=1.0, 0..200)) {
        let counts = CategoryCounts::from_probabilities(ps.iter().copied());
        prop_assert_eq!(counts.total(), ps.len() as u64);
    }
}

// Property: random walks are non-negative, dated and of the requested length
proptest! {
    #[test]
    fn random_walk_shape(
        seed in any::<u64>(),
        days in 0u32..90,
        base in 0.0f64..100.0,
        volatility in 0.0f64..20.0,
        trend in -5.0f64..5.0
    ) {
        let mut rng = StdRng::seed_from_u64(seed);
        let today = reference_date();
        let points = random_walk(&mut rng, today, days, base, volatility, trend);

        prop_assert_eq!(points.len(), days as usize + 1);
        prop_assert!(points.iter().all(|p| p.value >= 0.0));
        prop_assert_eq!(points.last().map(|p| p.date), Some(today));
        prop_assert!(points.windows(2).all(|w| w[0].date < w[1].date));
    }
}

// Property: generated portfolios respect score range and category consistency
proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn generated_portfolio_is_consistent(seed in any::<u64>()) {
        let portfolio = generate_portfolio(seed, DEMO_PORTFOLIO_SIZE, reference_date());
        prop_assert_eq!(portfolio.len(), DEMO_PORTFOLIO_SIZE);

        for customer in portfolio.customers() {
            prop_assert!(customer.risk_score >= MIN_RISK_SCORE);
            prop_assert!(customer.risk_score <= MAX_RISK_SCORE);
            prop_assert_eq!(
                customer.risk_category,
                RiskCategory::from_probability(customer.risk_probability())
            );
        }

        let summary = portfolio.summary();
        prop_assert_eq!(
            summary.low_risk_count + summary.medium_risk_count + summary.high_risk_count,
            summary.total_customers
        );
    }

    #[test]
    fn same_seed_same_portfolio(seed in any::<u64>()) {
        let a = generate_portfolio(seed, 20, reference_date());
        let b = generate_portfolio(seed, 20, reference_date());
        prop_assert_eq!(a.customers(), b.customers());
    }
}
