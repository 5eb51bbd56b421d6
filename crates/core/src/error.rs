use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("upload is not a pdf: {0}")]
    NotPdf(String),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("invalid response from {backend} ({status}): {details}")]
    BackendResponse {
        backend: String,
        status: u16,
        details: String,
    },

    #[error("{backend} failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        backend: String,
        attempts: u32,
        last: String,
    },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("provider request failed: {0}")]
    Request(String),
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("no api key configured for the chat model")]
    MissingApiKey,

    #[error("question is empty")]
    EmptyQuestion,

    #[error("session {session} has no indexed documents; upload a pdf first")]
    NoIndex { session: String },

    #[error("session {session} is already answering a question")]
    SessionBusy { session: String },

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("background task failed: {0}")]
    Task(String),
}
