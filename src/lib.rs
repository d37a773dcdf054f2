//! Pre-Delinquency Early Warning Dashboard Library
//!
//! Client-side core of the early warning dashboard: a typed client for the
//! risk-prediction backend, a seeded demo-data generator, page view models,
//! and the intervention email relay served by the `ews-relay` binary.
//!
//! # Modules
//!
//! - `api`: Relay-facing HTTP components.
//! - `core`: Domain models, derivations and shared errors.
//! - `integrations`: Backend and SMTP clients.
//! - `backend_client`: Prediction backend HTTP client with per-request deadlines.
//! - `config`: Configuration management.
//! - `email_template`: Intervention email rendering.
//! - `errors`: Error handling types.
//! - `handlers`: Relay HTTP handlers and router.
//! - `mailer`: SMTP delivery.
//! - `models`: Backend wire types, view types and risk buckets.
//! - `synthetic`: Seeded demo portfolio generator.
//! - `views`: Page view models, data sources and load lifecycle.

pub mod api;
pub mod core;
pub mod integrations;

// Re-export primary modules for shared use in tests and other binaries
pub mod backend_client;
pub mod config;
pub mod email_template;
pub mod errors;
pub mod handlers;
pub mod mailer;
pub mod models;
pub mod synthetic;
pub mod views;
