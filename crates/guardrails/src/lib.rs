//! Guardrail policy engine — one engine, three invocation points:
//!
//! - [`input`]: request validation, runs before anything else touches data
//! - [`tools`]: tool allowlist, exact schemas, and session identity pinning
//! - [`output`]: risk gating of the model's proposed action
//!
//! Plus the supporting pieces: [`redact`] strips secrets and payment
//! identifiers from fragments and logs, [`fetch`] is the SSRF-safe external
//! link fetcher, and [`audit`] is the append-only decision trail.

pub mod audit;
pub mod fetch;
pub mod input;
pub mod output;
pub mod redact;
pub mod tools;

pub use audit::{AuditLog, TracingSink};
pub use fetch::{FetchError, LinkFetcher, LinkPreview};
pub use tools::{ToolCall, ToolRegistry};
