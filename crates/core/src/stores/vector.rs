use crate::embeddings::Embedder;
use crate::traits::VectorIndex;
use crate::{ProviderError, RetrievedSegment, Segment};
use tracing::info;

struct StoredSegment {
    segment: Segment,
    vector: Vec<f32>,
}

/// Brute-force cosine index scoped to a single upload batch.
pub struct InMemoryVectorIndex {
    dimensions: usize,
    entries: Vec<StoredSegment>,
}

impl InMemoryVectorIndex {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            entries: Vec::new(),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a < f32::EPSILON || mag_b < f32::EPSILON {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}

impl VectorIndex for InMemoryVectorIndex {
    fn insert(
        &mut self,
        segments: Vec<Segment>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<(), ProviderError> {
        if segments.len() != embeddings.len() {
            return Err(ProviderError::Request(format!(
                "embedding count {} doesn't match segment count {}",
                embeddings.len(),
                segments.len()
            )));
        }

        if let Some(bad) = embeddings.iter().find(|vector| vector.len() != self.dimensions) {
            return Err(ProviderError::Request(format!(
                "embedding dimension {} != {}",
                bad.len(),
                self.dimensions
            )));
        }

        self.entries.extend(
            segments
                .into_iter()
                .zip(embeddings)
                .map(|(segment, vector)| StoredSegment { segment, vector }),
        );
        Ok(())
    }

    fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievedSegment>, ProviderError> {
        if query_vector.len() != self.dimensions {
            return Err(ProviderError::Request(format!(
                "query vector dim {} is not {}",
                query_vector.len(),
                self.dimensions
            )));
        }

        let mut hits: Vec<RetrievedSegment> = self
            .entries
            .iter()
            .map(|entry| RetrievedSegment {
                segment: entry.segment.clone(),
                score: cosine_similarity(query_vector, &entry.vector),
            })
            .collect();

        // stable: equal scores keep insertion order
        hits.sort_by(|left, right| right.score.total_cmp(&left.score));
        hits.truncate(top_k);
        Ok(hits)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Embeds every segment and loads them into a fresh index.
pub async fn build_index(
    segments: Vec<Segment>,
    embedder: &dyn Embedder,
) -> Result<InMemoryVectorIndex, ProviderError> {
    let texts: Vec<String> = segments.iter().map(|segment| segment.text.clone()).collect();
    let embeddings = embedder.embed_documents(&texts).await?;

    let mut index = InMemoryVectorIndex::new(embedder.dimensions());
    index.insert(segments, embeddings)?;

    info!(
        segments = index.len(),
        dimensions = index.dimensions(),
        model = embedder.model_name(),
        "built vector index"
    );
    Ok(index)
}
