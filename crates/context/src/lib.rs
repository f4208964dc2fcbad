//! Context aggregation — the core retrieval component.
//!
//! Resolves one user query into a bounded, prioritized [`ContextBundle`]:
//!
//! 1. All adapters are read in parallel under a per-adapter timeout
//! 2. Returned records are re-checked for tenant scope (defense in depth)
//! 3. Records are rendered into trust-tagged fragments
//! 4. Fragments are ranked by source priority, then recency
//! 5. The bundle is filled greedily to a hard character budget
//!
//! If more than half of the adapters fail to respond, aggregation returns
//! `ContextUnavailable` rather than silently partial context.

pub mod aggregator;
pub mod fingerprint;
pub mod render;

pub use aggregator::ContextAggregator;
pub use fingerprint::fingerprint_of;
