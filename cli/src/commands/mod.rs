pub mod config;
pub mod dataset;
pub mod deploy;
pub mod deployed;
pub mod metrics;
pub mod models;
pub mod report;
pub mod signature;
pub mod status;
pub mod undeploy;
