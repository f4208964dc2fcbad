//! # Wayfarer Core
//!
//! Domain types, traits, and error definitions for the Wayfarer AI concierge
//! gateway. This crate has **zero framework dependencies** — it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every subsystem is defined as a trait here. Implementations live in their
//! respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod audit;
pub mod context;
pub mod error;
pub mod guardrail;
pub mod provider;
pub mod query;
pub mod records;
pub mod store;

// Re-export key types at crate root for ergonomics
pub use audit::{AuditRecord, AuditSink, CacheOutcome, ProviderOutcome};
pub use context::{ContextBundle, ContextFragment, ContextSource, TrustLevel};
pub use error::{CacheError, Error, ProviderError, Result, StoreError};
pub use guardrail::{ActionCategory, GuardrailDecision, ReasonCode, Verdict};
pub use provider::{ModelProvider, Prompt, PromptSection};
pub use query::{ActionDescriptor, ConciergeRequest, ConciergeResponse, Query, Turn, TurnRole};
pub use store::{
    CalendarStore, ChatStore, ContextStores, MembershipStore, PaymentsStore, PlacesStore,
    PollsStore, PreferencesStore, ReceiptsStore, RecordVersion, TasksStore, VersionStore,
};
