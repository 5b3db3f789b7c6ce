use anyhow::Result;
use dialoguer::Confirm;
use modeldeck_core::ModelApi;

pub async fn execute(api: &dyn ModelApi, key: &str, yes: bool) -> Result<()> {
    let deployed = api.deployed_models().await?;

    let Some(entry) = deployed.get(key) else {
        println!("'{}' is not deployed.", key);
        let similar: Vec<_> = deployed.keys().filter(|k| k.contains(key)).collect();
        if !similar.is_empty() {
            println!("Deployed models with a similar key:");
            for k in similar {
                println!("  - {}", k);
            }
        }
        println!("\nRun `modeldeck deployed` to see deployed models.");
        return Ok(());
    };

    if !yes {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Undeploy {} (port {})? The model will stop serving requests",
                entry.label(),
                entry.port
            ))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let confirmation = api.undeploy(key).await?;
    if !confirmation.message.is_empty() {
        println!("{}", confirmation.message);
    }

    let remaining = api.deployed_models().await?;
    println!(
        "'{}' undeployed. {} model(s) still deployed.",
        key,
        remaining.len()
    );

    Ok(())
}
