pub mod ask;
pub mod config_cmd;
pub mod serve;

use async_trait::async_trait;
use std::sync::Arc;

use wayfarer_config::ConciergeConfig;
use wayfarer_core::error::ProviderError;
use wayfarer_core::provider::{ModelProvider, Prompt};
use wayfarer_gateway::ConciergeGateway;
use wayfarer_guardrails::AuditLog;
use wayfarer_provider::HttpProvider;
use wayfarer_stores::{demo, InMemoryTripStore};

/// Provider stand-in when no API key is configured. Every call fails with
/// a non-transient error, so the pipeline degrades to trip data instead
/// of retrying.
struct OfflineProvider;

#[async_trait]
impl ModelProvider for OfflineProvider {
    fn name(&self) -> &str {
        "offline"
    }

    async fn complete(
        &self,
        _prompt: &Prompt,
        _max_tokens: u32,
    ) -> Result<String, ProviderError> {
        Err(ProviderError::NotConfigured("no API key set".into()))
    }
}

/// Build a gateway over the seeded demo trip.
pub async fn build_gateway(config: ConciergeConfig) -> ConciergeGateway {
    let store = Arc::new(InMemoryTripStore::new());
    demo::seed(&store).await;

    let provider: Arc<dyn ModelProvider> = match HttpProvider::new(&config.provider) {
        Ok(p) => Arc::new(p),
        Err(e) => {
            tracing::warn!(error = %e, "Running without a model provider; answers come from trip data only");
            Arc::new(OfflineProvider)
        }
    };

    ConciergeGateway::new(
        config,
        store.stores(),
        store.clone(),
        store.clone(),
        provider,
        Arc::new(AuditLog::with_sinks(vec![Box::new(
            wayfarer_guardrails::TracingSink,
        )])),
    )
}
