use crate::chunking::split_documents;
use crate::config::EngineConfig;
use crate::embeddings::Embedder;
use crate::extractor::{LopdfExtractor, PdfExtractor};
use crate::ingest::ingest_uploads;
use crate::rewriter::rewrite_question;
use crate::stores::{build_index, InMemoryVectorIndex};
use crate::synthesizer::synthesize_answer;
use crate::traits::{ChatModel, SessionStore, VectorIndex};
use crate::{Answer, ChatError, IndexReport, SessionPhase, Transcript, Turn, Upload};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};

#[derive(Default)]
struct SessionSlot {
    phase: SessionPhase,
    index: Option<Arc<InMemoryVectorIndex>>,
}

type Slots = Mutex<HashMap<String, SessionSlot>>;

fn lock_slots(slots: &Slots) -> MutexGuard<'_, HashMap<String, SessionSlot>> {
    slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Drives the per-session `Idle -> Indexed -> Answering -> Indexed` cycle.
pub struct ConversationEngine<E, M, S>
where
    E: Embedder,
    M: ChatModel,
    S: SessionStore,
{
    embedder: E,
    model: M,
    sessions: S,
    extractor: Arc<dyn PdfExtractor>,
    config: EngineConfig,
    slots: Slots,
}

impl<E, M, S> ConversationEngine<E, M, S>
where
    E: Embedder,
    M: ChatModel,
    S: SessionStore,
{
    pub fn new(embedder: E, model: M, sessions: S, config: EngineConfig) -> Self {
        Self {
            embedder,
            model,
            sessions,
            extractor: Arc::new(LopdfExtractor),
            config,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn PdfExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn phase(&self, session_id: &str) -> SessionPhase {
        lock_slots(&self.slots)
            .get(session_id)
            .map(|slot| slot.phase)
            .unwrap_or_default()
    }

    pub async fn transcript(&self, session_id: &str) -> Transcript {
        self.sessions.transcript(session_id).await
    }

    pub async fn sessions(&self) -> Vec<String> {
        self.sessions.sessions().await
    }

    /// Replaces the session's index with one built from `uploads` alone.
    /// On failure the previous index (if any) stays in place.
    pub async fn index_uploads(
        &self,
        session_id: &str,
        uploads: Vec<Upload>,
    ) -> Result<IndexReport, ChatError> {
        self.ensure_not_answering(session_id)?;
        self.config.chunking.validate()?;

        let extractor = Arc::clone(&self.extractor);
        let documents =
            tokio::task::spawn_blocking(move || ingest_uploads(&uploads, extractor.as_ref()))
                .await
                .map_err(|error| ChatError::Task(error.to_string()))??;

        let segments = split_documents(&documents, self.config.chunking)?;
        let segment_count = segments.len();
        let index = build_index(segments, &self.embedder).await?;
        let dimensions = index.dimensions();

        {
            let mut slots = lock_slots(&self.slots);
            let slot = slots.entry(session_id.to_string()).or_default();
            if slot.phase == SessionPhase::Answering {
                return Err(ChatError::SessionBusy {
                    session: session_id.to_string(),
                });
            }
            slot.index = Some(Arc::new(index));
            slot.phase = SessionPhase::Indexed;
        }

        info!(
            session = session_id,
            documents = documents.len(),
            segments = segment_count,
            "session indexed"
        );

        Ok(IndexReport {
            documents: documents.len(),
            segments: segment_count,
            dimensions,
        })
    }

    /// Rewrite, retrieve, synthesize, then record the turn.
    pub async fn ask(&self, session_id: &str, question: &str) -> Result<Answer, ChatError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(ChatError::EmptyQuestion);
        }

        let (index, _answering) = self.begin_answering(session_id)?;

        let transcript = self.sessions.transcript(session_id).await;
        let standalone = rewrite_question(&self.model, &transcript, question).await?;

        let query_vector = self.embedder.embed_query(&standalone).await?;
        let context = index.search(&query_vector, self.config.top_k)?;

        let answer = synthesize_answer(&self.model, &transcript, &standalone, &context).await?;
        self.sessions
            .append(session_id, Turn::new(question, answer.clone()))
            .await;

        info!(
            session = session_id,
            turns = transcript.len() + 1,
            context = context.len(),
            "answered question"
        );

        Ok(Answer {
            answer,
            standalone_question: standalone,
            context,
        })
    }

    fn ensure_not_answering(&self, session_id: &str) -> Result<(), ChatError> {
        if self.phase(session_id) == SessionPhase::Answering {
            return Err(ChatError::SessionBusy {
                session: session_id.to_string(),
            });
        }
        Ok(())
    }

    fn begin_answering(
        &self,
        session_id: &str,
    ) -> Result<(Arc<InMemoryVectorIndex>, AnsweringGuard<'_>), ChatError> {
        let mut slots = lock_slots(&self.slots);
        let slot = slots.get_mut(session_id);

        match slot {
            Some(slot) if slot.phase == SessionPhase::Answering => Err(ChatError::SessionBusy {
                session: session_id.to_string(),
            }),
            Some(SessionSlot {
                phase,
                index: Some(index),
            }) => {
                *phase = SessionPhase::Answering;
                Ok((
                    Arc::clone(index),
                    AnsweringGuard {
                        slots: &self.slots,
                        session_id: session_id.to_string(),
                    },
                ))
            }
            _ => {
                warn!(session = session_id, "question asked before any upload");
                Err(ChatError::NoIndex {
                    session: session_id.to_string(),
                })
            }
        }
    }
}

/// Returns the session to `Indexed` however the answer attempt ends,
/// including when the `ask` future is dropped.
struct AnsweringGuard<'a> {
    slots: &'a Slots,
    session_id: String,
}

impl Drop for AnsweringGuard<'_> {
    fn drop(&mut self) {
        let mut slots = lock_slots(self.slots);
        if let Some(slot) = slots.get_mut(&self.session_id) {
            if slot.phase == SessionPhase::Answering {
                slot.phase = SessionPhase::Indexed;
            }
        }
    }
}
