//! Prompt templates for RAG generation

use crate::types::SearchResult;

/// Built-in template; `{context}` and `{question}` are substituted
pub const DEFAULT_TEMPLATE: &str = r#"You are a knowledgeable assistant that answers questions using only the provided context.

INSTRUCTIONS:
1. Answer the question using information from the context below
2. Cite the fragments you rely on by their number, e.g. [1]
3. If the information is not in the context, say "I cannot find this information in the provided documents"

CONTEXT:
{context}

QUESTION: {question}

ANSWER:"#;

/// Prompt builder for RAG queries
pub struct PromptBuilder;

impl PromptBuilder {
    /// Number each retrieved fragment and label it with its source
    pub fn build_context(results: &[SearchResult]) -> String {
        let mut context = String::new();

        for (i, result) in results.iter().enumerate() {
            context.push_str(&format!(
                "[{}] {}\n{}\n\n",
                i + 1,
                result.fragment.citation_label(),
                result.fragment.text.trim()
            ));
        }

        context.trim_end().to_string()
    }

    /// Substitute placeholders in a single pass
    ///
    /// Placeholder-like text inside the context or question is left as is.
    pub fn render(template: &str, context: &str, question: &str) -> String {
        template
            .split("{context}")
            .map(|piece| piece.replace("{question}", question))
            .collect::<Vec<_>>()
            .join(context)
    }

    /// Render the template, falling back to [`DEFAULT_TEMPLATE`]
    pub fn build_rag_prompt(template: Option<&str>, results: &[SearchResult], question: &str) -> String {
        let context = Self::build_context(results);
        Self::render(template.unwrap_or(DEFAULT_TEMPLATE), &context, question)
    }
}
