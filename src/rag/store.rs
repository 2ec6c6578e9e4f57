use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use twox_hash::XxHash64;

use super::Document;
use crate::persistence::{self, PersistenceError};

pub const INDEX_FILE: &str = "index.json.zst";
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("FilePersistence error: {0}")]
    Persistence(#[from] PersistenceError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Got {embeddings} embeddings for {documents} documents")]
    LengthMismatch { documents: usize, embeddings: usize },
    #[error("Embedding has {found} dimensions, the store holds {expected}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("Unsupported index version {0}")]
    UnsupportedVersion(u32),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredChunk {
    pub id: String,
    pub document: Document,
    pub embedding: Vec<f64>,
}

#[derive(Serialize, Deserialize)]
struct IndexFile {
    version: u32,
    chunks: Vec<StoredChunk>,
}

/// A document found by [`VectorStore::similarity_search`], with its cosine similarity to the query.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoredDocument {
    pub document: Document,
    pub score: f64,
}

/// Embedded chunks kept in memory and persisted as zstd-compressed JSON in one directory.
#[derive(Debug)]
pub struct VectorStore {
    dir: PathBuf,
    chunks: Vec<StoredChunk>,
    ids: HashSet<String>,
}

impl VectorStore {
    /// An empty store that will persist into `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            chunks: Vec::new(),
            ids: HashSet::new(),
        }
    }

    pub fn index_path(dir: &Path) -> PathBuf {
        dir.join(INDEX_FILE)
    }

    pub fn exists(dir: &Path) -> bool {
        Self::index_path(dir).is_file()
    }

    /// Load the index persisted in `dir`.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        let compressed = persistence::load_from_file(&Self::index_path(&dir)).await?;
        let index: IndexFile = serde_json::from_slice(&persistence::decompress(&compressed)?)?;
        if index.version != FORMAT_VERSION {
            return Err(StoreError::UnsupportedVersion(index.version));
        }

        let ids = index.chunks.iter().map(|chunk| chunk.id.clone()).collect();
        tracing::info!(dir = %dir.display(), chunks = index.chunks.len(), "opened vector store");
        Ok(Self {
            dir,
            chunks: index.chunks,
            ids,
        })
    }

    /// Open the index in `dir` when there is one, otherwise start empty.
    pub async fn open_or_new(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        if Self::exists(&dir) {
            Self::open(dir).await
        } else {
            Ok(Self::new(dir))
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn count(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Add documents with their embeddings. Chunks already stored are skipped.
    /// Returns how many were new.
    /// Whether a chunk with the same source, page and content is already stored.
    pub fn contains(&self, document: &Document) -> bool {
        self.ids.contains(&chunk_id(document))
    }

    pub fn add(
        &mut self,
        documents: Vec<Document>,
        embeddings: Vec<Vec<f64>>,
    ) -> Result<usize, StoreError> {
        if documents.len() != embeddings.len() {
            return Err(StoreError::LengthMismatch {
                documents: documents.len(),
                embeddings: embeddings.len(),
            });
        }
        let mut expected = self.chunks.first().map(|chunk| chunk.embedding.len());
        for embedding in &embeddings {
            match expected {
                Some(expected) if expected != embedding.len() => {
                    return Err(StoreError::DimensionMismatch {
                        expected,
                        found: embedding.len(),
                    });
                }
                Some(_) => {}
                None => expected = Some(embedding.len()),
            }
        }

        let before = self.chunks.len();
        for (document, embedding) in documents.into_iter().zip(embeddings) {
            let id = chunk_id(&document);
            if self.ids.insert(id.clone()) {
                self.chunks.push(StoredChunk {
                    id,
                    document,
                    embedding,
                });
            }
        }
        let added = self.chunks.len() - before;
        tracing::debug!(added, total = self.chunks.len(), "added chunks");
        Ok(added)
    }

    /// The `k` stored documents most similar to `query`, best first.
    pub fn similarity_search(&self, query: &[f64], k: usize) -> Vec<ScoredDocument> {
        let mut scored: Vec<_> = self
            .chunks
            .iter()
            .map(|chunk| (chunk, cosine_similarity(query, &chunk.embedding)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored
            .into_iter()
            .take(k)
            .map(|(chunk, score)| ScoredDocument {
                document: chunk.document.clone(),
                score,
            })
            .collect()
    }

    pub async fn persist(&self) -> Result<(), StoreError> {
        let index = IndexFile {
            version: FORMAT_VERSION,
            chunks: self.chunks.clone(),
        };
        let compressed = persistence::compress(&serde_json::to_vec(&index)?)?;
        persistence::save_to_file(&compressed, &Self::index_path(&self.dir)).await?;
        tracing::debug!(
            dir = %self.dir.display(),
            chunks = self.chunks.len(),
            "persisted vector store"
        );
        Ok(())
    }
}

pub(crate) fn chunk_id(document: &Document) -> String {
    let key = format!(
        "{}\u{0}{}\u{0}{}",
        document.metadata.source, document.metadata.page, document.content
    );
    format!("{:016x}", XxHash64::oneshot(0, key.as_bytes()))
}

/// Cosine similarity; zero-length vectors score 0.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
