use super::*;
use crate::RagError;
use crate::database::{ChunkRecord, IndexManifest};
use crate::embeddings::{Chunk, ChunkingConfig};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;

/// Maps text onto one axis per topic keyword
struct KeywordEmbedder;

impl KeywordEmbedder {
    fn vector(text: &str) -> Vec<f32> {
        let text = text.to_lowercase();
        ["xss", "csrf", "sql"]
            .iter()
            .map(|k| if text.contains(k) { 1.0 } else { 0.01 })
            .collect()
    }
}

impl Embedder for KeywordEmbedder {
    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }

    fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        Ok(Self::vector(text))
    }

    fn model_name(&self) -> &str {
        "keyword"
    }
}

#[derive(Default)]
struct RecordingChat {
    prompts: Mutex<Vec<String>>,
    fail: bool,
}

impl ChatModel for RecordingChat {
    fn complete(&self, prompt: &str) -> Result<String> {
        if self.fail {
            return Err(RagError::Chat("HTTP 401: Incorrect API key provided".to_string()));
        }
        self.prompts
            .lock()
            .expect("prompt lock should not be poisoned")
            .push(prompt.to_string());
        Ok("stubbed answer".to_string())
    }

    fn model_name(&self) -> &str {
        "recording"
    }
}

async fn build_store(dir: &Path) -> VectorStore {
    let texts = [
        ("XSS lets attackers run scripts in a victim's browser.", "xss.txt"),
        ("CSRF makes a browser send forged requests.", "csrf.txt"),
        ("SQL injection smuggles commands into queries.", "sqli.txt"),
    ];
    let records: Vec<ChunkRecord> = texts
        .iter()
        .map(|(content, file)| {
            let chunk = Chunk {
                content: (*content).to_string(),
                source: PathBuf::from(file),
                page: None,
                start_index: 0,
                chunk_index: 0,
            };
            ChunkRecord::from_chunk(&chunk, KeywordEmbedder::vector(content), "t")
        })
        .collect();
    let manifest = IndexManifest {
        embedding_model: "keyword".to_string(),
        dimension: 3,
        chunk_count: records.len(),
        document_count: records.len(),
        chunking: ChunkingConfig::default(),
        created_at: Utc::now(),
    };
    VectorStore::create(dir, records, manifest)
        .await
        .expect("should create vector store")
}

#[test]
fn prompt_contains_context_question_and_fallback() {
    let prompt = build_prompt("chunk one\n\nchunk two", "What is XSS?");

    assert!(prompt.starts_with("You are an AI assistant"));
    assert!(prompt.contains("Context:\nchunk one\n\nchunk two\n"));
    assert!(prompt.contains("Question:\nWhat is XSS?\n"));
    assert!(prompt.trim_end().ends_with("Answer:"));
    assert!(prompt.contains(NO_ANSWER_REPLY));
    assert!(!prompt.contains("{context}"));
}

#[tokio::test]
async fn ask_retrieves_relevant_chunk_and_calls_chat() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = build_store(temp_dir.path()).await;
    let chat = Arc::new(RecordingChat::default());
    let chain = RetrievalChain::new(Arc::new(KeywordEmbedder), chat.clone(), store, 1);

    let answer = chain.ask("How does CSRF work?").await.expect("should answer");

    assert_eq!(answer.text, "stubbed answer");
    assert_eq!(answer.sources.len(), 1);
    assert_eq!(answer.sources[0].metadata.file_name, "csrf.txt");

    let prompts = chat.prompts.lock().expect("prompt lock should not be poisoned");
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("CSRF makes a browser send forged requests."));
    assert!(!prompts[0].contains("SQL injection"));
}

#[tokio::test]
async fn context_joins_top_k_chunks_with_blank_lines() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = build_store(temp_dir.path()).await;
    let chain = RetrievalChain::new(
        Arc::new(KeywordEmbedder),
        Arc::new(RecordingChat::default()),
        store,
        3,
    );

    let answer = chain.ask("xss").await.expect("should answer");
    assert_eq!(answer.sources.len(), 3);

    let context = stuff_context(&answer.sources);
    assert_eq!(context.matches("\n\n").count(), 2);
    assert!(context.starts_with("XSS lets attackers"));
}

#[tokio::test]
async fn chat_errors_propagate() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = build_store(temp_dir.path()).await;
    let chat = Arc::new(RecordingChat {
        fail: true,
        ..RecordingChat::default()
    });
    let chain = RetrievalChain::new(Arc::new(KeywordEmbedder), chat, store, 2);

    let err = chain
        .answer("What is SQL injection?")
        .await
        .expect_err("chat failure should surface");
    assert!(matches!(err, RagError::Chat(_)));
}

#[test]
fn braces_in_context_are_inserted_verbatim() {
    let context = "Use the template var {question} literally. Also {no_answer} and {context}.";
    let prompt = build_prompt(context, "What is HSTS?");

    assert!(prompt.contains(&format!("Context:\n{}\n", context)));
    assert_eq!(prompt.matches("What is HSTS?").count(), 1);
    assert_eq!(prompt.matches(NO_ANSWER_REPLY).count(), 1);
}
