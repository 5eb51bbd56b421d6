use crate::{ChatMessage, ProviderError, RetrievedSegment, Segment, Transcript, Turn};
use async_trait::async_trait;

#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model_name(&self) -> &str;

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ProviderError>;
}

pub trait VectorIndex: Send + Sync {
    fn insert(
        &mut self,
        segments: Vec<Segment>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<(), ProviderError>;

    fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievedSegment>, ProviderError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Keyed transcript storage. Unknown ids resolve to a new empty transcript.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn transcript(&self, session_id: &str) -> Transcript;

    async fn append(&self, session_id: &str, turn: Turn);

    /// Known session ids, sorted.
    async fn sessions(&self) -> Vec<String>;
}
