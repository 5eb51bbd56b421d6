pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod extractor;
mod http;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod orchestrator;
pub mod rewriter;
pub mod stores;
pub mod synthesizer;
pub mod traits;

pub use chunking::{split_documents, split_text, ChunkingConfig, Span};
pub use config::{
    ChatModelConfig, EmbeddingConfig, EngineConfig, RetryPolicy, DEFAULT_SESSION_ID,
    DEFAULT_TOP_K,
};
pub use embeddings::{
    CharacterNgramEmbedder, Embedder, HuggingFaceEmbedder, DEFAULT_EMBEDDING_DIMENSIONS,
};
pub use error::{ChatError, IngestError, ProviderError};
pub use extractor::{extract_page_texts, LopdfExtractor, PageText, PdfExtractor};
pub use ingest::{discover_pdf_files, ingest_uploads, read_uploads};
pub use llm::OpenAiCompatibleChatModel;
pub use models::{
    Answer, ChatMessage, Document, IndexReport, RetrievedSegment, Role, Segment, SessionPhase,
    Transcript, Turn, Upload,
};
pub use orchestrator::ConversationEngine;
pub use rewriter::rewrite_question;
pub use stores::{build_index, InMemorySessionStore, InMemoryVectorIndex};
pub use synthesizer::synthesize_answer;
pub use traits::{ChatModel, SessionStore, VectorIndex};
