use anyhow::Result;
use modeldeck_core::ModelApi;

pub async fn execute(api: &dyn ModelApi) -> Result<()> {
    let deployed = api.deployed_models().await?;

    if deployed.is_empty() {
        println!("No models deployed.");
        println!("\nRun `modeldeck deploy <model> <version>` to deploy a model.");
        return Ok(());
    }

    println!(
        "{:<32} {:<28} {:<10} {:<8} {}",
        "KEY", "MODEL", "VERSION", "PORT", "STATUS"
    );
    println!("{}", "-".repeat(90));

    for (key, entry) in &deployed {
        println!(
            "{:<32} {:<28} {:<10} {:<8} {}",
            key,
            entry.model_name,
            entry.version.as_str(),
            entry.port,
            entry.status()
        );
    }

    Ok(())
}
