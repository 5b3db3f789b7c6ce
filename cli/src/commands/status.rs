use anyhow::Result;
use modeldeck_core::{load_dashboard, DashboardStats, ModelApi};

pub async fn execute(api: &dyn ModelApi) -> Result<()> {
    println!("modeldeck status\n");

    let stats = match load_dashboard(api).await {
        Ok(stats) => stats,
        Err(e) => {
            eprintln!("Error loading dashboard: {}\n", e);
            DashboardStats::default()
        }
    };

    println!("Total models:     {}", stats.models);
    println!("Deployed models:  {}", stats.deployed);
    println!("Available ports:  {}", stats.free_ports);
    println!("System status:    Online");

    if stats.deployed == 0 && stats.models > 0 {
        println!("\nRun `modeldeck deploy <model> <version>` to start serving a model.");
    }

    Ok(())
}
