use async_trait::async_trait;
use thiserror::Error;

use super::llm::LlmError;
use super::{ExtractionOutcome, FileManifest};

/// Errors an extractor hits internally. They never leave the extractor;
/// `analyze` folds them into `ExtractionOutcome::Failed`.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("LLM request failed: {0}")]
    Llm(#[from] LlmError),

    #[error("invalid extractor response: {0}")]
    InvalidResponse(String),
}

/// Detects the features of a prototype from its file manifest.
#[async_trait]
pub trait FeatureExtractor: Send + Sync {
    /// Extractor name for logging.
    fn name(&self) -> &str;

    /// Analyze the manifest. Failure is reported as a value, never a panic
    /// or an error.
    async fn analyze(&self, manifest: &FileManifest, description: &str) -> ExtractionOutcome;
}
