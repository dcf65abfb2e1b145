use crate::request::GenerationRequest;
use crate::types::GenerationChunk;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Authentication error: {0}")]
    Auth(String),
}

pub type Result<T> = std::result::Result<T, GenerationError>;

pub type GenerationStream = Pin<Box<dyn Stream<Item = Result<GenerationChunk>> + Send>>;

#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Stream a reply for the prompt context in `request`.
    ///
    /// Dropping the returned stream aborts the underlying request.
    async fn generate_stream(&self, request: &GenerationRequest) -> Result<GenerationStream>;

    /// Model used when the request's snapshot names none
    fn default_model(&self) -> &str;
}
