use futures::future::BoxFuture;
use rig::embeddings::EmbeddingModel;

use super::RagError;

/// Largest number of texts sent in one embedding request.
pub const MAX_BATCH: usize = 256;

pub trait Embedder: Send + Sync {
    /// One vector per input text, in input order.
    fn embed(&self, texts: Vec<String>) -> BoxFuture<'_, Result<Vec<Vec<f64>>, RagError>>;
}

/// An [Embedder] over a rig embedding model.
pub struct RigEmbedder<E: EmbeddingModel> {
    model: E,
}

impl<E: EmbeddingModel> RigEmbedder<E> {
    pub fn new(model: E) -> Self {
        Self { model }
    }
}

impl<E: EmbeddingModel> Embedder for RigEmbedder<E> {
    fn embed(&self, texts: Vec<String>) -> BoxFuture<'_, Result<Vec<Vec<f64>>, RagError>> {
        Box::pin(async move {
            let mut vectors = Vec::with_capacity(texts.len());
            for batch in texts.chunks(MAX_BATCH) {
                tracing::debug!(size = batch.len(), "embedding batch");
                let embeddings = self.model.embed_texts(batch.to_vec()).await?;
                vectors.extend(embeddings.into_iter().map(|embedding| embedding.vec));
            }
            Ok(vectors)
        })
    }
}
