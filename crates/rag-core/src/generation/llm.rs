//! LLM callback trait and closure adapter

use async_trait::async_trait;
use std::future::Future;

/// Caller-supplied text generation
///
/// Invoked once per answer with the fully rendered prompt. Errors are wrapped
/// into [`Error::LlmCallback`](crate::Error::LlmCallback) together with the
/// retrieval context.
#[async_trait]
pub trait LlmCallback: Send + Sync {
    async fn generate(&self, prompt: &str) -> anyhow::Result<String>;
}

/// [`LlmCallback`] wrapping an async closure; see [`callback_fn`]
pub struct FnCallback<F> {
    f: F,
}

/// Adapt `|prompt: String| async move { ... }` into an [`LlmCallback`]
///
/// ```
/// use rag_core::generation::callback_fn;
///
/// let echo = callback_fn(|prompt: String| async move {
///     Ok::<_, anyhow::Error>(prompt.len().to_string())
/// });
/// # let _ = echo;
/// ```
pub fn callback_fn<F, Fut>(f: F) -> FnCallback<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<String>> + Send,
{
    FnCallback { f }
}

#[async_trait]
impl<F, Fut> LlmCallback for FnCallback<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<String>> + Send,
{
    async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        (self.f)(prompt.to_string()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_closure_adapter() {
        let upper = callback_fn(|prompt: String| async move {
            Ok::<_, anyhow::Error>(prompt.to_uppercase())
        });
        assert_eq!(upper.generate("paris").await.unwrap(), "PARIS");

        let failing = callback_fn(|_prompt: String| async move {
            Err::<String, _>(anyhow::anyhow!("quota exceeded"))
        });
        let err = failing.generate("x").await.unwrap_err();
        assert_eq!(err.to_string(), "quota exceeded");
    }
}
