//! `wayfarer config` — Configuration management commands.

use wayfarer_config::ConciergeConfig;

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    match ConciergeConfig::load() {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            config.validate()?;

            let mut warnings = Vec::new();
            if config.provider.api_key.is_none() {
                warnings.push("No API key set (set OPENAI_API_KEY env var); answers will degrade to trip data");
            }
            if config.gateway.host == "0.0.0.0" {
                warnings.push("Gateway bound to 0.0.0.0 — all interfaces are exposed");
            }
            if !config.cache.similarity_promotion && config.cache.similarity_threshold < 1.0 {
                warnings.push("similarity_threshold is set but similarity_promotion is off");
            }

            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            println!();
            println!("   Model:      {}", config.provider.model);
            println!("   Gateway:    {}:{}", config.gateway.host, config.gateway.port);
            println!("   Budget:     {} chars", config.context.char_budget);
            println!("   Cache TTL:  {}s", config.cache.ttl_seconds);
            println!("   Tiers:      {}", config.rate_limit.tiers.len());
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = ConciergeConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
