// Retrieval chain
// Embeds a question, fetches the nearest chunks and asks the chat model to answer from them

#[cfg(test)]
mod tests;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::Result;
use crate::assistant::QuestionAnswerer;
use crate::database::{SearchResult, VectorStore};
use crate::embeddings::Embedder;

/// Reply the model is told to give when the context does not contain the answer
pub const NO_ANSWER_REPLY: &str =
    "I don't have enough information to answer that question based on the provided documents.";

/// A hosted language model that turns a prompt into a reply
pub trait ChatModel: Send + Sync {
    fn complete(&self, prompt: &str) -> Result<String>;

    fn model_name(&self) -> &str;
}

/// Answer text together with the chunks it was generated from
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<SearchResult>,
}

/// Fill the prompt template with retrieved context and the user's question
#[inline]
pub fn build_prompt(context: &str, question: &str) -> String {
    // Arguments are inserted verbatim; braces inside retrieved text are never re-expanded
    format!(
        "You are an AI assistant designed to provide accurate and concise answers based on the provided context.
If the answer cannot be found in the context, clearly state \"{no_answer}\" Do not make up information.

Context:
{context}

Question:
{question}

Answer:
",
        no_answer = NO_ANSWER_REPLY,
    )
}

/// Concatenate chunk texts into one context block, separated by blank lines
#[inline]
pub fn stuff_context(results: &[SearchResult]) -> String {
    results
        .iter()
        .map(|r| r.metadata.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub struct RetrievalChain {
    embedder: Arc<dyn Embedder>,
    chat: Arc<dyn ChatModel>,
    store: VectorStore,
    top_k: usize,
}

impl RetrievalChain {
    #[inline]
    pub fn new(
        embedder: Arc<dyn Embedder>,
        chat: Arc<dyn ChatModel>,
        store: VectorStore,
        top_k: usize,
    ) -> Self {
        Self {
            embedder,
            chat,
            store,
            top_k,
        }
    }

    #[inline]
    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    /// Run one question through embed, search, prompt and completion
    #[inline]
    pub async fn ask(&self, question: &str) -> Result<Answer> {
        debug!("Embedding question with {}", self.embedder.model_name());
        let query_vector = self.embedder.embed_query(question)?;

        let sources = self.store.search(&query_vector, self.top_k).await?;
        info!("Retrieved {} chunks for question", sources.len());

        let prompt = build_prompt(&stuff_context(&sources), question);
        debug!(
            "Sending prompt of {} characters to {}",
            prompt.chars().count(),
            self.chat.model_name()
        );
        let text = self.chat.complete(&prompt)?;

        Ok(Answer { text, sources })
    }
}

#[async_trait]
impl QuestionAnswerer for RetrievalChain {
    async fn answer(&self, question: &str) -> Result<Answer> {
        self.ask(question).await
    }
}
