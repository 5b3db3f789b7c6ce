use anyhow::Result;
use modeldeck_core::ModelApi;

pub async fn execute(api: &dyn ModelApi) -> Result<()> {
    let (models, deployed) = tokio::try_join!(api.list_models(), api.deployed_models())?;

    if models.is_empty() {
        println!("No models found in registry");
        return Ok(());
    }

    println!("{:<40} {}", "NAME", "DEPLOYED");
    println!("{}", "-".repeat(60));

    for model in models {
        let running: Vec<String> = deployed
            .values()
            .filter(|d| d.model_name == model)
            .map(|d| format!("v{}", d.version))
            .collect();
        println!(
            "{:<40} {}",
            model,
            if running.is_empty() { "-".to_string() } else { running.join(", ") }
        );
    }

    Ok(())
}

pub async fn versions(api: &dyn ModelApi, model: &str) -> Result<()> {
    let versions = api.list_versions(model).await?;

    if versions.is_empty() {
        println!("No versions found for '{}'.", model);
        return Ok(());
    }

    println!("Versions of {}:", model);
    for version in versions {
        println!("  {}", version);
    }
    println!("\nRun `modeldeck deploy {} <version>` to deploy one.", model);

    Ok(())
}
