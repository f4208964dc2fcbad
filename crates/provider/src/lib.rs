//! Model provider adapter.
//!
//! - [`prompt`]: assembles a [`wayfarer_core::provider::Prompt`] from a
//!   context bundle and query, capping history and truncating
//!   lowest-priority fragments under the character ceiling
//! - [`http`]: the OpenAI-compatible chat-completions client
//! - [`retry`]: bounded retry with exponential backoff over any
//!   [`wayfarer_core::provider::ModelProvider`]

pub mod http;
pub mod prompt;
pub mod retry;

pub use http::HttpProvider;
pub use prompt::build_prompt;
pub use retry::RetryingProvider;
