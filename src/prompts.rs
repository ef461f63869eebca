//! Prompt templates for retrieval-augmented answers.

/// Standing instructions sent as the system message
pub const SYSTEM_PROMPT: &str = "If the context does not provide enough information, answer based on your knowledge. \
If the context is not relevant, don't mention it, just answer question. \
Give short and concise answers. \
Always answer in the language of the question.";

/// Wrap `query` with the retrieved `context`
pub fn augmented_prompt(context: &str, query: &str) -> String {
    format!(
        "Answer the following question using the context provided below.\n\nContext:\n{context}\n\nQuestion: {query}\n\n"
    )
}
