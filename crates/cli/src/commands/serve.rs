//! `wayfarer serve` — Start the concierge HTTP gateway.

use std::sync::Arc;
use wayfarer_config::ConciergeConfig;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = ConciergeConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    config.validate()?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("🧭 Wayfarer Concierge Gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Model:     {}", config.provider.model);
    println!("   Demo trip: {}", wayfarer_stores::demo::DEMO_TRIP);

    let gateway = Arc::new(super::build_gateway(config.clone()).await);
    wayfarer_gateway::serve(&config, gateway).await?;

    Ok(())
}
