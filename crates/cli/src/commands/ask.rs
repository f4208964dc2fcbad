//! `wayfarer ask` — One query through the full pipeline, printed to stdout.

use wayfarer_config::ConciergeConfig;
use wayfarer_core::query::ConciergeRequest;
use wayfarer_stores::demo;

pub async fn run(
    text: &str,
    user: &str,
    confirm: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = ConciergeConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    config.validate()?;

    let gateway = super::build_gateway(config).await;
    let response = gateway
        .invoke(ConciergeRequest {
            trip_id: demo::DEMO_TRIP.into(),
            user_id: user.into(),
            text: text.into(),
            history: Vec::new(),
            confirm,
        })
        .await?;

    println!("{}", response.answer);
    if !response.sources_used.is_empty() {
        println!();
        println!("   Sources:  {}", response.sources_used.join(", "));
    }
    if response.degraded {
        println!("   Note:     answered from trip data only (assistant unavailable)");
    }
    if let Some(descriptor) = response.action_descriptor {
        println!();
        println!("   To confirm, re-run with: --confirm {}", descriptor.decision_id);
    }

    Ok(())
}
