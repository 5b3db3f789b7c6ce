use anyhow::{bail, Result};
use clap::Subcommand;
use futures_util::future::join_all;

use modeldeck_core::metrics::{compare_snapshots, display_name, sort_snapshot_names};
use modeldeck_core::{MetricsSnapshot, ModelApi, ModelVersion, NewMetrics, SnapshotName};

/// How many historical snapshots `history` lists before summarising the rest.
const HISTORY_PREVIEW: usize = 5;

#[derive(Subcommand)]
pub enum MetricsCommand {
    /// Show the current metrics
    Show { model: String, version: String },

    /// List historical metric snapshots, newest first
    History {
        model: String,
        version: String,

        /// List every snapshot instead of the latest few
        #[arg(long)]
        all: bool,
    },

    /// Show one historical snapshot
    Snapshot {
        model: String,
        version: String,

        /// Snapshot file name (e.g., "metrics_at_1700000000.json")
        file: String,
    },

    /// Compare current metrics against a historical snapshot
    Compare {
        model: String,
        version: String,

        /// Snapshot to compare against (default: the newest)
        file: Option<String>,
    },

    /// Submit new test instances and their expected results
    Submit {
        model: String,
        version: String,

        /// JSON array of input instances
        #[arg(long)]
        instances: String,

        /// JSON array of expected results
        #[arg(long)]
        results: String,

        /// Epoch seconds recorded with the snapshot (default: now)
        #[arg(long)]
        timestamp: Option<f64>,
    },
}

pub async fn execute(api: &dyn ModelApi, command: MetricsCommand) -> Result<()> {
    match command {
        MetricsCommand::Show { model, version } => {
            let version = ModelVersion::new(version);
            let metrics = api
                .current_metrics(&model, &version)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to fetch metrics: {}", e))?;
            println!("Current metrics of {} version {}\n", model, version);
            print_snapshot(&metrics);
        }
        MetricsCommand::History {
            model,
            version,
            all,
        } => {
            let names = history(api, &model, &ModelVersion::new(version)).await;
            if names.is_empty() {
                println!("No historical metrics available.");
                return Ok(());
            }

            let shown = if all { names.len() } else { HISTORY_PREVIEW.min(names.len()) };
            println!("{:<24} {}", "RECORDED", "FILE");
            println!("{}", "-".repeat(60));
            for name in &names[..shown] {
                println!("{:<24} {}", name.label(), name.filename);
            }
            if names.len() > shown {
                println!("+{} more available", names.len() - shown);
            }
        }
        MetricsCommand::Snapshot {
            model,
            version,
            file,
        } => {
            let metrics = api
                .snapshot(&model, &ModelVersion::new(version), &file)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to fetch historical metrics: {}", e))?;
            match SnapshotName::parse(&file) {
                Some(name) => println!("Metrics recorded at {}\n", name.label()),
                None => println!("{}\n", file),
            }
            print_snapshot(&metrics);
        }
        MetricsCommand::Compare {
            model,
            version,
            file,
        } => {
            compare(api, &model, &ModelVersion::new(version), file).await?;
        }
        MetricsCommand::Submit {
            model,
            version,
            instances,
            results,
            timestamp,
        } => {
            let body = NewMetrics::new(
                parse_json("instances", &instances)?,
                parse_json("results", &results)?,
                timestamp,
            )?;
            let updated = api
                .submit_metrics(&model, &ModelVersion::new(version), &body)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to update metrics: {}", e))?;

            println!("Metrics updated successfully!\n");
            print_snapshot(&updated);
        }
    }

    Ok(())
}

fn parse_json(field: &str, text: &str) -> Result<serde_json::Value> {
    if text.trim().is_empty() {
        bail!("Please fill in all required fields");
    }
    serde_json::from_str(text).map_err(|e| anyhow::anyhow!("{}: Invalid JSON: {}", field, e))
}

/// Historical snapshot names, newest first. A failed listing counts as none.
async fn history(api: &dyn ModelApi, model: &str, version: &ModelVersion) -> Vec<SnapshotName> {
    match api.snapshot_names(model, version).await {
        Ok(files) => sort_snapshot_names(&files),
        Err(e) => {
            tracing::warn!("No historical metrics found or error fetching: {}", e);
            Vec::new()
        }
    }
}

async fn compare(
    api: &dyn ModelApi,
    model: &str,
    version: &ModelVersion,
    file: Option<String>,
) -> Result<()> {
    let current = api
        .current_metrics(model, version)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to fetch metrics: {}", e))?;

    let (target, historical) = match file {
        Some(file) => {
            let historical = api
                .snapshot(model, version, &file)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to fetch historical metrics: {}", e))?;
            (file, historical)
        }
        None => {
            let names = history(api, model, version).await;
            let loaded = join_all(
                names
                    .iter()
                    .map(|name| api.snapshot(model, version, &name.filename)),
            )
            .await;
            let newest = names.iter().zip(loaded).find_map(|(name, result)| match result {
                Ok(metrics) => Some((name.filename.clone(), metrics)),
                Err(e) => {
                    tracing::warn!("Failed to fetch metrics for {}: {}", name.filename, e);
                    None
                }
            });
            match newest {
                Some(found) => found,
                None => bail!("No historical metrics available to compare against"),
            }
        }
    };

    let label = SnapshotName::parse(&target)
        .map(|n| n.label())
        .unwrap_or_else(|| target.clone());
    println!("{} version {}: current vs {}\n", model, version, label);

    println!(
        "{:<28} {:>12} {:>12} {:>12} {:>10}  {}",
        "METRIC", "CURRENT", "HISTORICAL", "DIFF", "CHANGE %", "TREND"
    );
    println!("{}", "-".repeat(92));
    for row in compare_snapshots(&current, &historical) {
        println!(
            "{:<28} {:>12} {:>12} {:>12} {:>10}  {} {}",
            display_name(&row.name),
            row.current.to_string(),
            row.historical_text(),
            row.diff_text(),
            row.percentage_text(),
            row.trend.arrow(),
            row.trend.as_str()
        );
    }

    Ok(())
}

fn print_snapshot(metrics: &MetricsSnapshot) {
    if metrics.is_empty() {
        println!("No metrics recorded.");
        return;
    }

    println!("{:<32} {}", "METRIC", "VALUE");
    println!("{}", "-".repeat(50));
    for (name, value) in metrics.iter() {
        println!("{:<32} {}", display_name(name), value);
    }
}
