use anyhow::Result;
use modeldeck_core::config::API_URL_ENV;
use modeldeck_core::Config;

pub async fn execute(key: Option<&str>, value: Option<&str>) -> Result<()> {
    let mut config = Config::load()?;

    match (key, value) {
        // Show all config
        (None, None) => {
            println!("Configuration file: {:?}\n", Config::config_path()?);
            println!("[api]");
            println!("  base_url = \"{}\"", config.api.base_url);
            println!(
                "  timeout_secs = {}{}",
                config.api.timeout_secs,
                if config.api.timeout_secs == 0 { " (client default)" } else { "" }
            );
            println!();
            println!("[downloads]");
            println!(
                "  directory = {:?}",
                config
                    .downloads
                    .directory
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| format!("(default: {})", config.downloads_dir().display()))
            );

            if let Ok(url) = std::env::var(API_URL_ENV) {
                println!();
                println!("{} is set: {}", API_URL_ENV, url);
            }
        }

        // Get a specific key
        (Some(key), None) => {
            println!("{}", config.get(key)?);
        }

        // Set a specific key
        (Some(key), Some(value)) => {
            config.set(key, value)?;
            config.save()?;
            println!("Set {} = {}", key, value);
        }

        _ => unreachable!(),
    }

    Ok(())
}
