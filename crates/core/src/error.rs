//! Error types for the Wayfarer domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.
//!
//! Only `Unauthenticated`, `NotAMember`, `RateLimited`, and
//! `GuardrailBlocked` ever reach the caller with a user-facing message.
//! Everything else is absorbed by the degradation path.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// The top-level error type for all Wayfarer gateway operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Surfaced to the caller ---
    #[error("No valid session")]
    Unauthenticated,

    #[error("User '{user_id}' is not an active member of trip '{trip_id}'")]
    NotAMember { user_id: String, trip_id: String },

    #[error("Rate limit exceeded, retry after {reset_at}")]
    RateLimited { reset_at: DateTime<Utc> },

    /// Terminal for the request. The user sees a generic refusal; the full
    /// reason lives only in the audit log.
    #[error("Request blocked by guardrail policy")]
    GuardrailBlocked { decision_id: String },

    // --- Absorbed by the degradation controller ---
    #[error("Context unavailable: {responsive} of {total} adapters responded")]
    ContextUnavailable { responsive: usize, total: usize },

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Configuration ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error may be shown to the end user.
    ///
    /// Everything else must be converted into a degraded-but-coherent
    /// answer before it leaves the gateway.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Error::Unauthenticated
                | Error::NotAMember { .. }
                | Error::RateLimited { .. }
                | Error::GuardrailBlocked { .. }
        )
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl ProviderError {
    /// Transient errors are worth retrying; the rest fail fast.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Timeout(_) | ProviderError::Network(_) => true,
            ProviderError::ApiError { status_code, .. } => *status_code >= 500,
            ProviderError::RateLimited { .. } => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store read timed out: {0}")]
    Timeout(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),
}

#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("Cache store unavailable: {0}")]
    Unavailable(String),
}
