use anyhow::Result;
use modeldeck_core::models::model_key;
use modeldeck_core::{ModelApi, ModelVersion};

pub async fn execute(
    api: &dyn ModelApi,
    model: &str,
    version: &ModelVersion,
    num_classes: Option<u32>,
) -> Result<()> {
    println!("Deploying {} version {}...", model, version);
    let confirmation = api.deploy(model, version, num_classes).await?;
    if !confirmation.message.is_empty() {
        println!("{}", confirmation.message);
    }

    let key = model_key(model, version);
    match api.deployed_models().await?.get(&key) {
        Some(entry) => println!(
            "{} is {} on port {}",
            entry.label(),
            entry.status().to_lowercase(),
            entry.port
        ),
        None => println!("{} is not listed as deployed yet.", key),
    }

    Ok(())
}
