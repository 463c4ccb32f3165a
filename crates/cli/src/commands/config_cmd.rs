//! `weave config` — Configuration management commands.

use weave_config::AppConfig;

pub async fn default() -> Result<(), Box<dyn std::error::Error>> {
    print!("{}", AppConfig::default_toml());
    Ok(())
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
    Ok(())
}

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   Config parsed successfully");

            if let Err(e) = weave_tokenizer::from_encoder(&config.encoder) {
                println!("   Warning: encoder '{}' is unavailable: {e}", config.encoder);
            }

            println!();
            println!("   Max tokens:  {}", config.max_tokens);
            println!("   Encoder:     {}", config.encoder);
            println!(
                "   Key match:   case_insensitive={} whole_word={}",
                config.key_matching.case_insensitive, config.key_matching.whole_word
            );
        }
        Err(e) => {
            println!("   Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}
