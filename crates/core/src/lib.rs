//! modeldeck_core - Core library for the model deployment dashboard
//!
//! This crate provides:
//! - The registry/serving API client (`ModelApi`, `RegistryClient`)
//! - View models for models, deployments, signatures, metrics and reports
//! - Metrics comparison and historical snapshot naming
//! - Form, JSON input and download helpers shared by the CLI and the TUI

pub mod client;
pub mod config;
pub mod download;
pub mod error;
pub mod form;
pub mod generation;
pub mod json_input;
pub mod metrics;
pub mod models;
pub mod report;
pub mod signature;

pub use client::{load_dashboard, parse_date, DateRange, ModelApi, NewMetrics, RegistryClient};
pub use config::Config;
pub use error::{Error, Result};
pub use metrics::{MetricValue, MetricsSnapshot, SnapshotName, Trend};
pub use models::{DashboardStats, DeployedModel, DeployedModels, ModelVersion};
