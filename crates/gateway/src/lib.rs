//! The Wayfarer gateway — one stateless handler per request.
//!
//! [`handler::ConciergeGateway`] runs the fixed pipeline for every query:
//!
//! membership → rate limit → input validation → cache lookup → context
//! aggregation → context validation/redaction → provider call → output
//! risk gating → cache write → audit write.
//!
//! No stage may be skipped, and a cache write never happens before output
//! gating has approved the answer. [`degrade`] synthesizes answers when
//! the provider or the context layer is unavailable; degradation is
//! per-request, never a sticky global flag. [`http`] is the Axum surface.

pub mod degrade;
pub mod handler;
pub mod http;

pub use handler::ConciergeGateway;
pub use http::{build_router, serve};
