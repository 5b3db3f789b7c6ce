mod commands;
mod logging;
#[cfg(test)]
mod mock;
mod tui;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use modeldeck_core::download::DownloadSink;
use modeldeck_core::{Config, RegistryClient};

#[derive(Parser)]
#[command(name = "modeldeck")]
#[command(author, version, about = "Deploy, test and monitor registered ML models", long_about = None)]
struct Cli {
    /// Backend API base URL (overrides MODELDECK_API_URL and the config file)
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the interactive dashboard
    Ui {
        /// Page to open first (e.g., "/metrics")
        #[arg(long, default_value = "/")]
        page: String,
    },

    /// Show registry and deployment totals
    Status,

    /// List registered models
    #[command(alias = "ls")]
    Models,

    /// List the versions of a model
    Versions {
        /// Model name
        model: String,
    },

    /// Deploy a model version
    Deploy {
        model: String,
        version: String,

        /// Number of output classes, forwarded to the backend
        #[arg(long)]
        num_classes: Option<u32>,
    },

    /// Stop a deployed model
    Undeploy {
        /// Deployment key (e.g., "fraud-detector-3")
        key: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// List deployed models
    Deployed,

    /// Show a model version's input/output signature
    Signature { model: String, version: String },

    /// Send a test request to a deployed model
    Test {
        model: String,
        version: String,

        /// Read the request body from a JSON file
        #[arg(long, conflicts_with_all = ["data", "field"])]
        input: Option<PathBuf>,

        /// Request body as inline JSON
        #[arg(long, conflicts_with = "field")]
        data: Option<String>,

        /// Signature field value, as name=value (repeatable)
        #[arg(short, long = "field", value_name = "NAME=VALUE")]
        field: Vec<String>,

        /// Save the result to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Inspect and update model metrics
    Metrics {
        #[command(subcommand)]
        command: commands::metrics::MetricsCommand,
    },

    /// Download the dataset collected for a model version
    Dataset {
        model: String,
        version: String,

        /// Only rows on or after this date (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        start: Option<String>,

        /// Only rows on or before this date (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        end: Option<String>,

        /// Output file (default: <download dir>/<model>-<version>-dataset.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// View and download model reports
    Report {
        #[command(subcommand)]
        command: commands::report::ReportCommand,
    },

    /// View or set configuration
    Config {
        /// Config key (e.g., "api.base_url", "downloads.directory")
        key: Option<String>,

        /// Value to set (if omitted, shows current value)
        value: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load().context("Failed to load configuration")?;

    let mut api = config.api.clone();
    api.base_url = config.resolve_base_url(cli.api_url.as_deref());
    let sink = DownloadSink::new(config.downloads_dir());

    let command = match cli.command {
        None => Commands::Ui {
            page: "/".to_string(),
        },
        Some(command) => command,
    };

    if let Commands::Ui { page } = &command {
        let route = tui::Route::from_path(page).with_context(|| {
            format!(
                "Unknown page '{}'. Expected one of: /, /models, /deployed, /testing, /metrics, /download, /degradation",
                page
            )
        })?;
        logging::init_file()?;
        tracing::info!("Starting dashboard against {}", api.base_url);
        let client = RegistryClient::with_config(&api)?;
        return tui::run(Arc::new(client), sink, route).await;
    }

    logging::init_stderr();

    if let Commands::Config { key, value } = &command {
        return commands::config::execute(key.as_deref(), value.as_deref()).await;
    }

    let client = RegistryClient::with_config(&api)?.with_progress(true);

    match command {
        Commands::Status => {
            commands::status::execute(&client).await?;
        }
        Commands::Models => {
            commands::models::execute(&client).await?;
        }
        Commands::Versions { model } => {
            commands::models::versions(&client, &model).await?;
        }
        Commands::Deploy {
            model,
            version,
            num_classes,
        } => {
            commands::deploy::execute(&client, &model, &version.as_str().into(), num_classes).await?;
        }
        Commands::Undeploy { key, yes } => {
            commands::undeploy::execute(&client, &key, yes).await?;
        }
        Commands::Deployed => {
            commands::deployed::execute(&client).await?;
        }
        Commands::Signature { model, version } => {
            commands::signature::execute(&client, &model, &version.as_str().into()).await?;
        }
        Commands::Test {
            model,
            version,
            input,
            data,
            field,
            output,
        } => {
            let body = commands::test::RequestBody::from_args(input, data, field);
            commands::test::execute(
                &client,
                &sink,
                &model,
                &version.as_str().into(),
                body,
                output.as_deref(),
            )
            .await?;
        }
        Commands::Metrics { command } => {
            commands::metrics::execute(&client, command).await?;
        }
        Commands::Dataset {
            model,
            version,
            start,
            end,
            output,
        } => {
            commands::dataset::execute(
                &client,
                &sink,
                &model,
                &version.as_str().into(),
                start.as_deref(),
                end.as_deref(),
                output.as_deref(),
            )
            .await?;
        }
        Commands::Report { command } => {
            commands::report::execute(&client, &sink, command).await?;
        }
        Commands::Ui { .. } | Commands::Config { .. } => unreachable!(),
    }

    Ok(())
}
