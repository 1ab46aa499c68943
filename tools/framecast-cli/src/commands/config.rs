//! Show or write the resolved configuration.

use framecast_common::config::{config_file_path, AppConfig};

pub fn run(config: &AppConfig, init: bool) -> anyhow::Result<()> {
    if init {
        config.save()?;
        println!("Wrote {}", config_file_path().display());
    }
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}
