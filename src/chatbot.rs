//! Retrieval-augmented answering for one session.

use std::sync::Arc;

use crate::llm::{ChatMessage, CompletionModel, ModelResult};
use crate::prompts::{augmented_prompt, SYSTEM_PROMPT};
use crate::vector::{session_filter, VectorIndex};

pub struct ChatBot {
    index: Arc<dyn VectorIndex>,
    model: Arc<dyn CompletionModel>,
    search_k: usize,
}

impl ChatBot {
    pub fn new(index: Arc<dyn VectorIndex>, model: Arc<dyn CompletionModel>, search_k: usize) -> Self {
        ChatBot {
            index,
            model,
            search_k,
        }
    }

    /// The question wrapped with the session's closest chunks, or the bare
    /// question when nothing is retrieved. Retrieval failures fall back to the
    /// bare question.
    pub async fn augment_prompt(&self, session_id: &str, query: &str) -> String {
        let filter = session_filter(session_id);
        let hits = match self
            .index
            .similarity_search(query, self.search_k, Some(&filter))
            .await
        {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!(session_id, error = %e, "retrieval failed, answering without context");
                Vec::new()
            }
        };

        if hits.is_empty() {
            return query.to_string();
        }

        let context = hits
            .iter()
            .map(|h| h.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        augmented_prompt(&context, query)
    }

    /// Answer `query` within `session_id`, continuing `history`
    pub async fn chat(
        &self,
        session_id: &str,
        query: &str,
        history: &[ChatMessage],
    ) -> ModelResult<String> {
        let prompt = self.augment_prompt(session_id, query).await;
        let mut messages = history.to_vec();
        messages.push(ChatMessage::user(prompt));
        self.model.run(SYSTEM_PROMPT, &messages).await
    }
}
