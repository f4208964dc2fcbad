//! ModelProvider trait — the abstraction over the external language model.
//!
//! The gateway sends a fully assembled [`Prompt`] and gets text back.
//! Implementations: HTTP-backed provider, test doubles.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::TrustLevel;
use crate::error::ProviderError;

/// One section of an assembled prompt, still carrying its trust tag.
///
/// Sections are only flattened into provider wire format at the last
/// possible moment, inside the provider implementation, so the trust
/// boundary survives the whole pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptSection {
    pub trust: TrustLevel,
    pub heading: String,
    pub body: String,
}

/// A fully assembled prompt: policy preamble, data sections, and the
/// conversation window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prompt {
    /// Sections ordered policy-first, then trip data, then external data.
    pub sections: Vec<PromptSection>,
    /// Recent conversation turns, oldest first, already capped.
    pub history: Vec<crate::query::Turn>,
    /// The current user question.
    pub user_text: String,
}

impl Prompt {
    /// Total serialized character count, the quantity the provider
    /// adapter's ceiling applies to.
    pub fn char_len(&self) -> usize {
        let sections: usize = self
            .sections
            .iter()
            .map(|s| s.heading.chars().count() + s.body.chars().count())
            .sum();
        let history: usize = self.history.iter().map(|t| t.text.chars().count()).sum();
        sections + history + self.user_text.chars().count()
    }
}

/// The external language-model call.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// A human-readable name for this provider.
    fn name(&self) -> &str;

    /// Send a prompt and get the completion text.
    async fn complete(
        &self,
        prompt: &Prompt,
        max_tokens: u32,
    ) -> std::result::Result<String, ProviderError>;
}
