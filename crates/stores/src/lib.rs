//! In-memory context store adapters.
//!
//! Models the external managed backend at its interface boundary: every
//! record is versioned so cache fingerprint invalidation is observable, and
//! every read is tenant-scoped. Useful for tests, the CLI demo, and any
//! deployment where the real stores are proxied in-process.

pub mod demo;
pub mod memory;

pub use memory::InMemoryTripStore;
