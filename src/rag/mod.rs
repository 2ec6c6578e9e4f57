//! Question answering over PDFs.
//!
//! [`RagApplication`] ties the pieces together: [`loader::load_pdf`] reads a
//! PDF page by page, [`splitter::RecursiveCharacterTextSplitter`] cuts pages
//! into overlapping chunks, an [`embedding::Embedder`] turns chunks into
//! vectors, and [`store::VectorStore`] keeps them on disk. A question is
//! embedded, the closest chunks are "stuffed" into one prompt, and an
//! [`Agent`] writes the answer.

use std::{collections::HashSet, path::PathBuf, sync::Arc};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    agent::{Agent, AgentError},
    chain::{ChainError, PromptTemplate, variables},
    config::{ConfigError, Settings},
    llm_provider::{LLMProvider, LLMProviderError, OPENAI_CHAT_MODEL, OPENAI_EMBEDDING_MODEL},
    rig_agent::RigAgent,
};

pub mod embedding;
pub mod loader;
pub mod splitter;
pub mod store;

pub use embedding::{Embedder, RigEmbedder};
pub use loader::load_pdf;
pub use splitter::RecursiveCharacterTextSplitter;
pub use store::{ScoredDocument, StoredChunk, VectorStore};

pub const DEFAULT_TOP_K: usize = 3;

const STUFF_TEMPLATE: &str = "\
Use the following pieces of context to answer the question at the end. If you don't know the answer, just say that you don't know, don't try to make up an answer.

{context}

Question: {question}
Helpful Answer:";

#[derive(Debug, Error)]
pub enum RagError {
    #[error("PDF file not found: {}", .0.display())]
    FileNotFound(PathBuf),
    #[error("File must be a PDF: {}", .0.display())]
    NotPdf(PathBuf),
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("Chunk overlap {chunk_overlap} must be smaller than chunk size {chunk_size}")]
    InvalidSplitter {
        chunk_size: usize,
        chunk_overlap: usize,
    },
    #[error("Embedding error: {0}")]
    Embedding(#[from] rig::embeddings::EmbeddingError),
    #[error("Vector store error: {0}")]
    Store(#[from] store::StoreError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("LLM provider error: {0}")]
    Provider(#[from] LLMProviderError),
    #[error(transparent)]
    Agent(#[from] AgentError),
    #[error(transparent)]
    Template(#[from] ChainError),
    #[error("No documents loaded. Please add a PDF first.")]
    NoDocuments,
    #[error("No text could be extracted from {}", .0.display())]
    NoText(PathBuf),
    #[error("PDF reader task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub source: String,
    /// Zero-based page index.
    pub page: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    pub metadata: Metadata,
}

impl Document {
    pub fn new(content: impl Into<String>, source: impl Into<String>, page: usize) -> Self {
        Self {
            content: content.into(),
            metadata: Metadata {
                source: source.into(),
                page,
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<Document>,
}

pub struct RagApplication {
    dir: PathBuf,
    store: Option<VectorStore>,
    embedder: Box<dyn Embedder>,
    answerer: Arc<dyn Agent>,
    splitter: RecursiveCharacterTextSplitter,
    prompt: PromptTemplate,
    top_k: usize,
}

impl RagApplication {
    /// gpt-4o answers over text-embedding-3-small vectors stored in `settings.vector_dir`.
    pub async fn new(settings: &Settings) -> Result<Self, RagError> {
        let provider =
            LLMProvider::openai(OPENAI_CHAT_MODEL).with_api_key(settings.openai_api_key()?);
        let embedder = RigEmbedder::new(provider.openai_embedding_model(OPENAI_EMBEDDING_MODEL)?);
        let answerer = RigAgent::openai_builder()
            .provider(provider)?
            .agent_name("RAG")
            .description("Answers questions from retrieved PDF chunks")
            .build()?;
        Self::with_parts(settings.vector_dir.clone(), embedder, Arc::new(answerer)).await
    }

    /// Create the store directory if needed and open the index already in it.
    pub async fn with_parts(
        dir: impl Into<PathBuf>,
        embedder: impl Embedder + 'static,
        answerer: Arc<dyn Agent>,
    ) -> Result<Self, RagError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        let store = if VectorStore::exists(&dir) {
            Some(VectorStore::open(&dir).await?)
        } else {
            tracing::info!(
                dir = %dir.display(),
                "no vector index yet, one is created when documents are added"
            );
            None
        };

        Ok(Self {
            dir,
            store,
            embedder: Box::new(embedder),
            answerer,
            splitter: RecursiveCharacterTextSplitter::default(),
            prompt: PromptTemplate::from_template(STUFF_TEMPLATE)?,
            top_k: DEFAULT_TOP_K,
        })
    }

    pub fn with_splitter(mut self, splitter: RecursiveCharacterTextSplitter) -> Self {
        self.splitter = splitter;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn has_vectorstore(&self) -> bool {
        self.store.is_some()
    }

    /// Read and chunk a PDF. Nothing is stored yet. A PDF without any text is an error.
    pub async fn load_pdf(
        &self,
        path: impl AsRef<std::path::Path>,
    ) -> Result<Vec<Document>, RagError> {
        let path = path.as_ref();
        let pages = load_pdf(path).await?;
        let chunks = self.splitter.split_documents(&pages);
        tracing::info!(pages = pages.len(), chunks = chunks.len(), "split pdf");
        if chunks.is_empty() {
            return Err(RagError::NoText(path.to_path_buf()));
        }
        Ok(chunks)
    }

    /// Embed and store the chunks not stored yet, then persist the index.
    /// Returns how many chunks were new; the store is only created once there is one.
    pub async fn add_documents(&mut self, documents: Vec<Document>) -> Result<usize, RagError> {
        let mut seen = HashSet::new();
        let documents: Vec<Document> = documents
            .into_iter()
            .filter(|doc| {
                let stored = self.store.as_ref().is_some_and(|store| store.contains(doc));
                !stored && seen.insert(store::chunk_id(doc))
            })
            .collect();
        if documents.is_empty() {
            tracing::info!("no new chunks to add");
            return Ok(0);
        }

        let texts = documents.iter().map(|doc| doc.content.clone()).collect();
        let embeddings = self.embedder.embed(texts).await?;

        let dir = self.dir.clone();
        let store = self.store.get_or_insert_with(|| VectorStore::new(dir));
        let added = store.add(documents, embeddings)?;
        store.persist().await?;
        Ok(added)
    }

    pub async fn ask_question(&self, question: &str) -> Result<Answer, RagError> {
        let store = self
            .store
            .as_ref()
            .filter(|store| !store.is_empty())
            .ok_or(RagError::NoDocuments)?;

        let query = self
            .embedder
            .embed(vec![question.to_owned()])
            .await?
            .into_iter()
            .next()
            .unwrap_or_default();
        let sources: Vec<Document> = store
            .similarity_search(&query, self.top_k)
            .into_iter()
            .map(|hit| hit.document)
            .collect();

        let context = sources
            .iter()
            .map(|doc| doc.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let prompt = self.prompt.format(&variables([
            ("context", context.as_str()),
            ("question", question),
        ]))?;
        let answer = self.answerer.run(prompt).await?;

        Ok(Answer { answer, sources })
    }

    pub fn vectorstore_info(&self) -> String {
        match &self.store {
            None => "No vectorstore initialized".to_owned(),
            Some(store) => format!("Vector store contains {} document chunks", store.count()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use futures::future::BoxFuture;

    use super::*;
    use crate::conversation::Message;

    const TOPICS: [&str; 3] = ["rust", "python", "haskell"];

    /// One dimension per topic keyword, plus a small constant so no vector is zero.
    struct KeywordEmbedder;

    impl Embedder for KeywordEmbedder {
        fn embed(&self, texts: Vec<String>) -> BoxFuture<'_, Result<Vec<Vec<f64>>, RagError>> {
            Box::pin(async move {
                Ok(texts
                    .iter()
                    .map(|text| {
                        let text = text.to_lowercase();
                        TOPICS
                            .iter()
                            .map(|topic| if text.contains(topic) { 1.0 } else { 0.0 })
                            .chain([0.1])
                            .collect()
                    })
                    .collect())
            })
        }
    }

    /// A [KeywordEmbedder] that remembers every text it was asked to embed.
    #[derive(Clone, Default)]
    struct CountingEmbedder(Arc<Mutex<Vec<String>>>);

    impl Embedder for CountingEmbedder {
        fn embed(&self, texts: Vec<String>) -> BoxFuture<'_, Result<Vec<Vec<f64>>, RagError>> {
            self.0.lock().unwrap().extend(texts.iter().cloned());
            Box::pin(async move { KeywordEmbedder.embed(texts).await })
        }
    }

    #[derive(Default)]
    struct RecordingAgent {
        prompts: Mutex<Vec<String>>,
    }

    impl Agent for RecordingAgent {
        fn run(&self, task: String) -> BoxFuture<'_, Result<String, AgentError>> {
            self.prompts.lock().unwrap().push(task);
            Box::pin(async { Ok("Ownership.".to_owned()) })
        }

        fn chat(&self, _history: Vec<Message>) -> BoxFuture<'_, Result<String, AgentError>> {
            Box::pin(async { Err(AgentError::EmptyHistory) })
        }

        fn id(&self) -> String {
            "recorder".to_owned()
        }

        fn name(&self) -> String {
            "recorder".to_owned()
        }

        fn description(&self) -> String {
            String::new()
        }
    }

    fn corpus() -> Vec<Document> {
        vec![
            Document::new("Rust uses ownership.", "langs.pdf", 0),
            Document::new("Python uses reference counting.", "langs.pdf", 1),
            Document::new("Haskell is lazy.", "langs.pdf", 2),
            Document::new("Rust has no garbage collector.", "langs.pdf", 3),
        ]
    }

    #[tokio::test]
    async fn asking_before_loading_fails() {
        let dir = tempfile::tempdir().unwrap();
        let app = RagApplication::with_parts(
            dir.path(),
            KeywordEmbedder,
            Arc::new(RecordingAgent::default()),
        )
        .await
        .unwrap();

        assert!(!app.has_vectorstore());
        assert_eq!(app.vectorstore_info(), "No vectorstore initialized");
        assert!(matches!(
            app.ask_question("anything?").await,
            Err(RagError::NoDocuments)
        ));
    }

    #[tokio::test]
    async fn answers_from_the_closest_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let agent = Arc::new(RecordingAgent::default());
        let mut app = RagApplication::with_parts(
            dir.path(),
            KeywordEmbedder,
            Arc::clone(&agent) as Arc<dyn Agent>,
        )
        .await
        .unwrap()
        .with_top_k(2);

        assert_eq!(app.add_documents(corpus()).await.unwrap(), 4);
        assert_eq!(app.vectorstore_info(), "Vector store contains 4 document chunks");

        let answer = app.ask_question("How does Rust manage memory?").await.unwrap();

        assert_eq!(answer.answer, "Ownership.");
        let pages: Vec<_> = answer.sources.iter().map(|doc| doc.metadata.page).collect();
        assert_eq!(pages.len(), 2);
        assert!(pages.contains(&0) && pages.contains(&3));

        let prompts = agent.prompts.lock().unwrap();
        assert!(prompts[0].starts_with("Use the following pieces of context"));
        assert!(
            prompts[0].contains("Rust uses ownership.\n\nRust has no garbage collector.")
                || prompts[0].contains("Rust has no garbage collector.\n\nRust uses ownership.")
        );
        assert!(prompts[0].ends_with("Question: How does Rust manage memory?\nHelpful Answer:"));
    }

    #[tokio::test]
    async fn stored_and_repeated_chunks_are_not_embedded_again() {
        let dir = tempfile::tempdir().unwrap();
        let embedded = CountingEmbedder::default();
        let mut app = RagApplication::with_parts(
            dir.path(),
            embedded.clone(),
            Arc::new(RecordingAgent::default()),
        )
        .await
        .unwrap();

        let mut batch = corpus();
        batch.push(corpus().remove(0));
        assert_eq!(app.add_documents(batch).await.unwrap(), 4);
        assert_eq!(embedded.0.lock().unwrap().len(), 4);

        assert_eq!(app.add_documents(corpus()).await.unwrap(), 0);
        assert_eq!(embedded.0.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn nothing_to_add_creates_no_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = RagApplication::with_parts(
            dir.path(),
            KeywordEmbedder,
            Arc::new(RecordingAgent::default()),
        )
        .await
        .unwrap();

        assert_eq!(app.add_documents(Vec::new()).await.unwrap(), 0);
        assert!(!app.has_vectorstore());
        assert!(!VectorStore::exists(dir.path()));
    }

    #[tokio::test]
    async fn pdf_without_text_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank.pdf");
        loader::tests::write_pdf(&path, &[None, None]);
        let app = RagApplication::with_parts(
            dir.path().join("index"),
            KeywordEmbedder,
            Arc::new(RecordingAgent::default()),
        )
        .await
        .unwrap();

        let err = app.load_pdf(&path).await.unwrap_err();

        assert!(matches!(err, RagError::NoText(found) if found == path));
        assert!(!app.has_vectorstore());
    }

    #[tokio::test]
    async fn index_survives_a_restart() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut app = RagApplication::with_parts(
                dir.path(),
                KeywordEmbedder,
                Arc::new(RecordingAgent::default()),
            )
            .await
            .unwrap();
            app.add_documents(corpus()).await.unwrap();
        }

        let mut app = RagApplication::with_parts(
            dir.path(),
            KeywordEmbedder,
            Arc::new(RecordingAgent::default()),
        )
        .await
        .unwrap();
        assert!(app.has_vectorstore());
        assert_eq!(app.vectorstore_info(), "Vector store contains 4 document chunks");

        assert_eq!(app.add_documents(corpus()).await.unwrap(), 0);
        assert!(app.ask_question("Is Haskell lazy?").await.is_ok());
    }
}
