//! Bounded retry with exponential backoff.
//!
//! Wraps any [`ModelProvider`]. Transient errors (timeout, network, 5xx,
//! provider-side rate limiting) are retried up to `max_retries` times with
//! 1s/2s/4s backoff; everything else fails fast. The final failure is
//! surfaced as-is for the degradation controller to absorb.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use wayfarer_core::error::ProviderError;
use wayfarer_core::provider::{ModelProvider, Prompt};

pub struct RetryingProvider {
    inner: Arc<dyn ModelProvider>,
    max_retries: u32,
}

impl RetryingProvider {
    pub fn new(inner: Arc<dyn ModelProvider>, max_retries: u32) -> Self {
        Self { inner, max_retries }
    }
}

#[async_trait]
impl ModelProvider for RetryingProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(
        &self,
        prompt: &Prompt,
        max_tokens: u32,
    ) -> std::result::Result<String, ProviderError> {
        let mut attempt = 0u32;
        loop {
            match self.inner.complete(prompt, max_tokens).await {
                Ok(answer) => return Ok(answer),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let backoff = Duration::from_secs(1 << attempt);
                    warn!(
                        provider = %self.inner.name(),
                        attempt = attempt + 1,
                        backoff_secs = backoff.as_secs(),
                        error = %e,
                        "Transient provider error, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use wayfarer_core::query::Turn;

    struct ScriptedProvider {
        calls: Mutex<usize>,
        script: Vec<std::result::Result<String, ProviderError>>,
    }

    impl ScriptedProvider {
        fn new(script: Vec<std::result::Result<String, ProviderError>>) -> Self {
            Self { calls: Mutex::new(0), script }
        }

        fn call_count(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl ModelProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            _prompt: &Prompt,
            _max_tokens: u32,
        ) -> std::result::Result<String, ProviderError> {
            let mut calls = self.calls.lock().unwrap();
            let result = self.script[(*calls).min(self.script.len() - 1)].clone();
            *calls += 1;
            result
        }
    }

    fn prompt() -> Prompt {
        Prompt {
            sections: vec![],
            history: vec![Turn::user("hi")],
            user_text: "q".into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_retried_then_succeed() {
        let inner = Arc::new(ScriptedProvider::new(vec![
            Err(ProviderError::Timeout("t".into())),
            Err(ProviderError::Network("n".into())),
            Ok("answer".into()),
        ]));
        let provider = RetryingProvider::new(inner.clone(), 2);

        let answer = provider.complete(&prompt(), 100).await.unwrap();
        assert_eq!(answer, "answer");
        assert_eq!(inner.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_retries() {
        let inner = Arc::new(ScriptedProvider::new(vec![Err(ProviderError::Timeout(
            "t".into(),
        ))]));
        let provider = RetryingProvider::new(inner.clone(), 2);

        let err = provider.complete(&prompt(), 100).await.unwrap_err();
        assert!(matches!(err, ProviderError::Timeout(_)));
        // 1 initial + 2 retries
        assert_eq!(inner.call_count(), 3);
    }

    #[tokio::test]
    async fn non_transient_error_fails_fast() {
        let inner = Arc::new(ScriptedProvider::new(vec![Err(
            ProviderError::AuthenticationFailed("bad key".into()),
        )]));
        let provider = RetryingProvider::new(inner.clone(), 2);

        let err = provider.complete(&prompt(), 100).await.unwrap_err();
        assert!(matches!(err, ProviderError::AuthenticationFailed(_)));
        assert_eq!(inner.call_count(), 1);
    }

    #[tokio::test]
    async fn success_needs_no_retry() {
        let inner = Arc::new(ScriptedProvider::new(vec![Ok("fine".into())]));
        let provider = RetryingProvider::new(inner.clone(), 2);
        assert_eq!(provider.complete(&prompt(), 100).await.unwrap(), "fine");
        assert_eq!(inner.call_count(), 1);
    }
}
