//! `ask-ollama --dump-config`: print the effective configuration.

use askollama_config::AppConfig;

pub fn dump(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let toml_str = config.to_toml()?;
    println!("{toml_str}");
    Ok(())
}
