//! Retrieval-augmented answering

use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::llm::LlmCallback;
use super::prompt::PromptBuilder;
use crate::error::{Error, Result, RetrievalContext};
use crate::retrieval::SearchService;
use crate::types::{RagOptions, RagResponse, SearchOptions};

/// Answers questions from retrieved fragments and an LLM callback
#[derive(Clone)]
pub struct RagService {
    search: SearchService,
}

impl RagService {
    pub fn new(search: SearchService) -> Self {
        Self { search }
    }

    pub fn search(&self) -> &SearchService {
        &self.search
    }

    /// Answer `question` with the given options
    pub async fn answer(
        &self,
        question: &str,
        llm: &dyn LlmCallback,
        options: &RagOptions,
    ) -> Result<RagResponse> {
        self.answer_with(question, llm, options, &CancellationToken::new())
            .await
    }

    /// Answer `question`, stopping early on cancellation
    ///
    /// The callback is invoked exactly once unless search fails or the token
    /// fires first. Callback errors and timeouts become
    /// [`Error::LlmCallback`] carrying the prompt and the retrieved results.
    pub async fn answer_with(
        &self,
        question: &str,
        llm: &dyn LlmCallback,
        options: &RagOptions,
        cancel: &CancellationToken,
    ) -> Result<RagResponse> {
        let results = self
            .search
            .query_with(question, &SearchOptions::top_k(options.top_k), cancel)
            .await?;

        let prompt =
            PromptBuilder::build_rag_prompt(options.prompt_template.as_deref(), &results, question);

        tracing::info!(
            "Answering with {} retrieved fragments (prompt {} bytes)",
            results.len(),
            prompt.len()
        );

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            outcome = generate(llm, &prompt, options.timeout) => outcome,
        };

        match outcome {
            Ok(raw) => Ok(RagResponse {
                answer: raw.trim().to_string(),
                sources: results.into_iter().map(|r| r.fragment).collect(),
                raw_llm_result: raw,
            }),
            Err(message) => {
                tracing::warn!("LLM callback failed: {}", message);
                Err(Error::LlmCallback {
                    message,
                    context: Box::new(RetrievalContext {
                        question: question.to_string(),
                        prompt,
                        results,
                    }),
                })
            }
        }
    }
}

/// Single callback invocation, bounded by `timeout` when set
async fn generate(
    llm: &dyn LlmCallback,
    prompt: &str,
    timeout: Option<Duration>,
) -> std::result::Result<String, String> {
    let call = llm.generate(prompt);
    let result = match timeout {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .map_err(|_| format!("timed out after {:?}", limit))?,
        None => call.await,
    };
    result.map_err(|e| format!("{:#}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::embedding::{EmbeddingProvider, HashingEmbedder};
    use crate::generation::callback_fn;
    use crate::index::{SnapshotIndex, VectorIndex};
    use crate::types::Fragment;

    async fn service_with(texts: &[&str]) -> RagService {
        let embedder = Arc::new(HashingEmbedder::new(64).unwrap());
        let index = Arc::new(SnapshotIndex::default());
        for (i, text) in texts.iter().enumerate() {
            let fragment = Fragment::new("facts", i, text.to_string());
            let embedding = embedder.embed_text(text).await.unwrap();
            index
                .upsert(&fragment.id, embedding, fragment.to_index_metadata())
                .unwrap();
        }
        RagService::new(SearchService::new(embedder, index))
    }

    #[tokio::test]
    async fn test_answer_uses_context() {
        let rag = service_with(&["Paris is the capital of France.", "Rust is a language."]).await;
        let llm = callback_fn(|prompt: String| async move {
            assert!(prompt.contains("Paris is the capital of France."));
            Ok::<_, anyhow::Error>("  Paris.\n".to_string())
        });

        let response = rag
            .answer("What is the capital of France?", &llm, &RagOptions::default().with_top_k(1))
            .await
            .unwrap();

        assert_eq!(response.answer, "Paris.");
        assert_eq!(response.raw_llm_result, "  Paris.\n");
        assert_eq!(response.sources.len(), 1);
        assert_eq!(response.sources[0].id, "facts#0");
    }

    #[tokio::test]
    async fn test_custom_template() {
        let rag = service_with(&["Paris is the capital of France."]).await;
        let llm = callback_fn(|prompt: String| async move { Ok::<_, anyhow::Error>(prompt) });

        let options = RagOptions::default().with_template("Q={question}");
        let response = rag.answer("capital?", &llm, &options).await.unwrap();
        assert_eq!(response.answer, "Q=capital?");
    }

    #[tokio::test]
    async fn test_failure_keeps_retrieval_context() {
        let rag = service_with(&["Paris is the capital of France."]).await;
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let llm = callback_fn(move |_prompt: String| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<String, _>(anyhow::anyhow!("model overloaded"))
            }
        });

        let err = rag
            .answer("capital of France?", &llm, &RagOptions::default())
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let context = err.retrieval_context().expect("context preserved");
        assert_eq!(context.question, "capital of France?");
        assert_eq!(context.results.len(), 1);
        assert!(context.prompt.contains("Paris"));
        assert!(err.to_string().contains("model overloaded"));
    }

    #[tokio::test]
    async fn test_timeout_is_callback_failure() {
        let rag = service_with(&["Paris is the capital of France."]).await;
        let llm = callback_fn(|_prompt: String| async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, anyhow::Error>("late".to_string())
        });

        let options = RagOptions::default().with_timeout(Duration::from_millis(20));
        let err = rag.answer("capital?", &llm, &options).await.unwrap_err();
        assert!(matches!(err, Error::LlmCallback { .. }));
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_cancel_during_generation() {
        let rag = service_with(&["Paris is the capital of France."]).await;
        let llm = callback_fn(|_prompt: String| async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, anyhow::Error>("late".to_string())
        });

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = rag
            .answer_with("capital?", &llm, &RagOptions::default(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[tokio::test]
    async fn test_empty_index_still_calls_llm() {
        let rag = service_with(&[]).await;
        let llm = callback_fn(|_prompt: String| async move {
            Ok::<_, anyhow::Error>("no idea".to_string())
        });

        let response = rag.answer("anything?", &llm, &RagOptions::default()).await.unwrap();
        assert!(response.sources.is_empty());
        assert_eq!(response.answer, "no idea");
    }
}
