use anyhow::Result;
use clap::Subcommand;
use std::path::PathBuf;

use modeldeck_core::download::{degradation_report_filename, initial_report_filename, DownloadSink};
use modeldeck_core::models::model_key;
use modeldeck_core::report::ReportFile;
use modeldeck_core::{ModelApi, ModelVersion};

#[derive(Subcommand)]
pub enum ReportCommand {
    /// Print the initial report of a deployed model
    Show {
        model: String,
        version: String,

        /// Also write embedded PNG images to the download directory
        #[arg(long)]
        export_images: bool,
    },

    /// Download the initial report as a ZIP archive
    Download {
        model: String,
        version: String,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Download the degradation (drift) report as a ZIP archive
    Degradation {
        model: String,
        version: String,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

pub async fn execute(api: &dyn ModelApi, sink: &DownloadSink, command: ReportCommand) -> Result<()> {
    match command {
        ReportCommand::Show {
            model,
            version,
            export_images,
        } => {
            let version = ModelVersion::new(version);
            let bundle = api.initial_report(&model, &version).await?;
            let files = bundle.decode();

            if files.is_empty() {
                println!("No report files available.");
                return Ok(());
            }

            for file in &files {
                if let ReportFile::Unsupported { filename, kind } = file {
                    tracing::debug!("Skipping {} ({})", filename, kind);
                    continue;
                }

                println!("== {} ==", file.filename());
                for line in file.render() {
                    println!("{}", line);
                }

                if let (true, ReportFile::Png { filename, bytes }) = (export_images, file) {
                    let name = format!("{}-{}", model_key(&model, &version), filename);
                    let path = sink.save(&name, bytes)?;
                    println!("Saved image to {}", path.display());
                }
                println!();
            }
        }
        ReportCommand::Download {
            model,
            version,
            output,
        } => {
            let version = ModelVersion::new(version);
            let bytes = api
                .download_initial_report(&model, &version)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to download report: {}", e))?;
            let path = sink.save_as(
                output.as_deref(),
                &initial_report_filename(&model, &version),
                &bytes,
            )?;
            println!("Report saved to {}", path.display());
        }
        ReportCommand::Degradation {
            model,
            version,
            output,
        } => {
            let version = ModelVersion::new(version);
            let bytes = match api.download_degradation_report(&model, &version).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::error!("Error downloading degradation report: {}", e);
                    anyhow::bail!("Failed to download degradation report. Please try again.");
                }
            };
            let path = sink.save_as(
                output.as_deref(),
                &degradation_report_filename(&model_key(&model, &version)),
                &bytes,
            )?;
            println!("Degradation report downloaded successfully!");
            println!("Saved to {}", path.display());
        }
    }

    Ok(())
}
