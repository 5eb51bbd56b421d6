use crate::traits::SessionStore;
use crate::{Transcript, Turn};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// Process-local transcripts. Nothing is evicted or persisted.
#[derive(Default)]
pub struct InMemorySessionStore {
    transcripts: RwLock<HashMap<String, Transcript>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn transcript(&self, session_id: &str) -> Transcript {
        if let Ok(transcripts) = self.transcripts.read() {
            if let Some(transcript) = transcripts.get(session_id) {
                return transcript.clone();
            }
        }

        let mut transcripts = self
            .transcripts
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        transcripts.entry(session_id.to_string()).or_default().clone()
    }

    async fn append(&self, session_id: &str, turn: Turn) {
        let mut transcripts = self
            .transcripts
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        transcripts
            .entry(session_id.to_string())
            .or_default()
            .push(turn);
    }

    async fn sessions(&self) -> Vec<String> {
        let transcripts = self
            .transcripts
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut ids: Vec<String> = transcripts.keys().cloned().collect();
        ids.sort_unstable();
        ids
    }
}
