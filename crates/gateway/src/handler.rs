//! The per-request pipeline.
//!
//! `ConciergeGateway` owns the shared pieces (rate-limit counters, cache,
//! audit log) and runs each query through the fixed stage order. The only
//! shared mutable state is inside the limiter and the cache, both keyed by
//! tenant; no lock is ever held across a network call.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use wayfarer_cache::{Lookup, ResponseCache};
use wayfarer_config::ConciergeConfig;
use wayfarer_context::ContextAggregator;
use wayfarer_core::audit::{AuditRecord, AuditSink, CacheOutcome, ProviderOutcome};
use wayfarer_core::context::ContextBundle;
use wayfarer_core::error::{Error, Result};
use wayfarer_core::guardrail::{GuardrailDecision, ReasonCode, Verdict};
use wayfarer_core::provider::ModelProvider;
use wayfarer_core::query::{ActionDescriptor, ConciergeRequest, ConciergeResponse, Query};
use wayfarer_core::store::{ContextStores, MembershipStore, VersionStore};
use wayfarer_guardrails::{input, output, redact, AuditLog, ToolCall, ToolRegistry};
use wayfarer_provider::{build_prompt, RetryingProvider};
use wayfarer_ratelimit::{RateDecision, RateLimiter};

pub struct ConciergeGateway {
    config: ConciergeConfig,
    membership: Arc<dyn MembershipStore>,
    aggregator: ContextAggregator,
    cache: ResponseCache,
    limiter: RateLimiter,
    provider: Arc<dyn ModelProvider>,
    tools: ToolRegistry,
    audit: Arc<AuditLog>,
    /// Per-user tier assignments; anyone absent gets the default tier.
    user_tiers: HashMap<String, String>,
}

impl ConciergeGateway {
    pub fn new(
        config: ConciergeConfig,
        stores: ContextStores,
        membership: Arc<dyn MembershipStore>,
        versions: Arc<dyn VersionStore>,
        provider: Arc<dyn ModelProvider>,
        audit: Arc<AuditLog>,
    ) -> Self {
        let aggregator =
            ContextAggregator::new(stores, versions, config.context.clone());
        let cache = ResponseCache::new(config.cache.clone());
        let limiter = RateLimiter::new(config.rate_limit.clone());
        let provider: Arc<dyn ModelProvider> =
            Arc::new(RetryingProvider::new(provider, config.provider.max_retries));
        Self {
            config,
            membership,
            aggregator,
            cache,
            limiter,
            provider,
            tools: ToolRegistry::standard(),
            audit,
            user_tiers: HashMap::new(),
        }
    }

    pub fn with_user_tiers(mut self, tiers: HashMap<String, String>) -> Self {
        self.user_tiers = tiers;
        self
    }

    pub fn audit_log(&self) -> &AuditLog {
        &self.audit
    }

    fn tier_for(&self, user_id: &str) -> &str {
        self.user_tiers
            .get(user_id)
            .map(String::as_str)
            .unwrap_or(&self.config.rate_limit.default_tier)
    }

    /// Validate a proposed tool call against the allowlist, its schema, and
    /// this session's identity. Exposed for frontends that execute tools.
    pub fn vet_tool_call(&self, call: &ToolCall, user_id: &str, trip_id: &str) -> GuardrailDecision {
        self.tools.validate_call(call, user_id, trip_id)
    }

    /// Run one query through the whole pipeline.
    pub async fn invoke(&self, request: ConciergeRequest) -> Result<ConciergeResponse> {
        let started = Instant::now();

        if request.user_id.trim().is_empty() {
            return Err(Error::Unauthenticated);
        }

        let query = Query::new(&request.user_id, &request.trip_id, &request.text)
            .with_history(request.history.clone());
        let mut decisions: Vec<GuardrailDecision> = Vec::new();

        // Membership is checked before any context read; failures are
        // security events.
        if !self
            .membership
            .is_active_member(&query.user_id, &query.trip_id)
            .await?
        {
            warn!(
                user_id = %query.user_id,
                trip_id = %query.trip_id,
                "SECURITY: query from non-member rejected"
            );
            self.write_audit(&query, decisions, CacheOutcome::Skipped, ProviderOutcome::Skipped, false, started);
            return Err(Error::NotAMember {
                user_id: query.user_id.clone(),
                trip_id: query.trip_id.clone(),
            });
        }

        // Stage 1: rate limit. The increment is atomic with the check and
        // is never rolled back, even if the caller disconnects later.
        let tier = self.tier_for(&query.user_id);
        if let RateDecision::Limited { reset_at } =
            self.limiter
                .check_and_increment(&query.user_id, &query.trip_id, tier)
        {
            self.write_audit(&query, decisions, CacheOutcome::Skipped, ProviderOutcome::Skipped, false, started);
            return Err(Error::RateLimited { reset_at });
        }

        // Stage 2: input validation
        let decision = input::validate(&request, &self.config.guardrails);
        decisions.push(decision.clone());
        if !decision.is_allow() {
            let decision_id = decision.decision_id.clone();
            self.write_audit(&query, decisions, CacheOutcome::Skipped, ProviderOutcome::Skipped, false, started);
            return Err(Error::GuardrailBlocked { decision_id });
        }

        // A confirmation must reference a require_confirmation decision
        // issued to the same user and trip; it confirms only the action
        // category that decision gated. Anything else is a guardrail block.
        let confirmed_category = match &request.confirm {
            Some(decision_id) => {
                let gated = self
                    .audit
                    .find_decision(decision_id)
                    .filter(|record| {
                        record.user_id == query.user_id && record.trip_id == query.trip_id
                    })
                    .and_then(|record| {
                        record
                            .decisions
                            .iter()
                            .find(|d| {
                                d.decision_id == *decision_id
                                    && d.verdict == Verdict::RequireConfirmation
                            })
                            .and_then(|d| d.category)
                    });
                match gated {
                    Some(category) => Some(category),
                    None => {
                        let block = GuardrailDecision::new(
                            Verdict::Block,
                            ReasonCode::MalformedRequest,
                            0.4,
                        );
                        let decision_id = block.decision_id.clone();
                        decisions.push(block);
                        self.write_audit(&query, decisions, CacheOutcome::Skipped, ProviderOutcome::Skipped, false, started);
                        return Err(Error::GuardrailBlocked { decision_id });
                    }
                }
            }
            None => None,
        };
        let confirmed = confirmed_category.is_some();

        // Stage 3: cache lookup. The fingerprint probe reads record
        // versions only; no context adapter is touched for a cache hit.
        // Confirmed action resubmissions never touch the cache.
        let normalized = query.normalized_text();
        let fingerprint = match self.aggregator.fingerprint(&query.trip_id).await {
            Ok(fp) => Some(fp),
            Err(e) => {
                warn!(trip_id = %query.trip_id, error = %e, "Fingerprint probe failed, cache bypassed");
                None
            }
        };
        let mut cache_outcome = CacheOutcome::Skipped;
        if !confirmed {
            cache_outcome = match &fingerprint {
                Some(fp) => match self.cache.lookup(&query.trip_id, &normalized, fp) {
                    Ok(Lookup::Hit(entry)) => {
                        info!(trip_id = %query.trip_id, "Cache hit");
                        self.write_audit(&query, decisions, CacheOutcome::Hit, ProviderOutcome::Skipped, false, started);
                        return Ok(ConciergeResponse {
                            answer: entry.answer,
                            sources_used: entry.sources_used,
                            requires_confirmation: false,
                            action_descriptor: None,
                            degraded: false,
                        });
                    }
                    Ok(Lookup::Stale) => CacheOutcome::Stale,
                    Ok(Lookup::Miss) => CacheOutcome::Miss,
                    Err(e) => {
                        // A cache store error never blocks the request
                        warn!(error = %e, "Cache lookup failed, treating as miss");
                        CacheOutcome::Error
                    }
                },
                None => CacheOutcome::Error,
            };
        }

        // Stage 4: context aggregation
        let mut degraded = false;
        let mut bundle = match self
            .aggregator
            .aggregate(&query.user_id, &query.trip_id, &query.text)
            .await
        {
            Ok(bundle) => bundle,
            Err(Error::ContextUnavailable { responsive, total }) => {
                warn!(responsive, total, "Context below safety floor, degrading");
                degraded = true;
                ContextBundle::empty(&query.trip_id, self.config.context.char_budget)
            }
            Err(e) => return Err(e),
        };

        // Stage 5: context validation. Fragments are redacted before the
        // bundle reaches the prompt or any log.
        let mut redacted: Vec<String> = Vec::new();
        for fragment in &mut bundle.fragments {
            for label in redact::redact_fragment(fragment) {
                if !redacted.contains(&label) {
                    redacted.push(label);
                }
            }
        }
        if !redacted.is_empty() {
            decisions.push(GuardrailDecision::allow().with_redactions(redacted));
        }

        // Stage 6: provider call, or synthesis when already degraded
        let mut provider_outcome = ProviderOutcome::Skipped;
        let answer = if degraded {
            crate::degrade::synthesize(&bundle, &query)
        } else {
            let prompt = build_prompt(&bundle, &query, &self.config.provider);
            match self
                .provider
                .complete(&prompt, self.config.provider.max_tokens)
                .await
            {
                Ok(text) => {
                    provider_outcome = ProviderOutcome::Success;
                    text
                }
                Err(e) => {
                    warn!(error = %e, "Provider failed after retries, degrading");
                    provider_outcome = ProviderOutcome::Fallback;
                    degraded = true;
                    crate::degrade::synthesize(&bundle, &query)
                }
            }
        };

        // Stage 7: output risk gating
        let (decision, category, answer) =
            output::gate(&query.text, &answer, &self.config.guardrails);
        decisions.push(decision.clone());

        let mut requires_confirmation = false;
        let mut action_descriptor = None;
        let answer = match decision.verdict {
            Verdict::Allow => answer,
            Verdict::Block => {
                let decision_id = decision.decision_id.clone();
                self.write_audit(&query, decisions, cache_outcome, provider_outcome, degraded, started);
                return Err(Error::GuardrailBlocked { decision_id });
            }
            Verdict::RequireConfirmation => {
                let category = category.unwrap_or(wayfarer_core::guardrail::ActionCategory::ExportData);
                // A confirmation only covers the category it was issued
                // for; gating a different action demands a fresh one.
                if confirmed_category == Some(category) {
                    // Explicitly confirmed: acknowledge, never execute here
                    format!(
                        "Confirmed. I've queued the request to {}; you'll see it in the trip activity shortly.",
                        category.describe()
                    )
                } else {
                    requires_confirmation = true;
                    let description = format!("This would {}.", category.describe());
                    action_descriptor = Some(ActionDescriptor {
                        decision_id: decision.decision_id.clone(),
                        category,
                        description: description.clone(),
                    });
                    format!(
                        "{description} I won't do that without your explicit confirmation — resubmit with the confirmation reference to proceed."
                    )
                }
            }
        };

        // Stage 8: cache write — only a gated-allow, provider-backed,
        // non-degraded answer is cacheable.
        if decision.is_allow()
            && provider_outcome == ProviderOutcome::Success
            && !degraded
            && !confirmed
        {
            if let Some(fp) = &fingerprint {
                if let Err(e) = self.cache.store(
                    &query.trip_id,
                    &normalized,
                    fp,
                    answer.clone(),
                    bundle.sources_used(),
                ) {
                    warn!(error = %e, "Cache write failed");
                }
            }
        }

        // Stage 9: audit write
        self.write_audit(&query, decisions, cache_outcome, provider_outcome, degraded, started);

        Ok(ConciergeResponse {
            answer,
            sources_used: bundle.sources_used(),
            requires_confirmation,
            action_descriptor,
            degraded,
        })
    }

    fn write_audit(
        &self,
        query: &Query,
        decisions: Vec<GuardrailDecision>,
        cache: CacheOutcome,
        provider: ProviderOutcome,
        degraded: bool,
        started: Instant,
    ) {
        let record = AuditRecord {
            query_id: query.query_id.to_string(),
            trip_id: query.trip_id.clone(),
            user_id: query.user_id.clone(),
            decisions,
            cache,
            provider,
            degraded,
            elapsed_ms: started.elapsed().as_millis() as u64,
            timestamp: chrono::Utc::now(),
        };
        self.audit.write(&record);
    }
}
