use anyhow::Result;
use std::path::Path;

use modeldeck_core::download::{dataset_filename, DownloadSink};
use modeldeck_core::{DateRange, ModelApi, ModelVersion};

pub async fn execute(
    api: &dyn ModelApi,
    sink: &DownloadSink,
    model: &str,
    version: &ModelVersion,
    start: Option<&str>,
    end: Option<&str>,
    output: Option<&Path>,
) -> Result<()> {
    let range = DateRange::parse(start, end)?;

    println!("Downloading dataset for {} version {}...", model, version);
    let bytes = api
        .download_dataset(model, version, &range)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to download dataset: {}", e))?;

    let path = sink.save_as(output, &dataset_filename(model, version), &bytes)?;
    println!("Dataset saved to {} ({} bytes)", path.display(), bytes.len());

    Ok(())
}
