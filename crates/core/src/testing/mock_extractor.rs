//! Mock feature extractor for testing.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::extraction::{ExtractionOutcome, Feature, FeatureAnalysis, FeatureExtractor, FileManifest};

/// A recorded `analyze` call.
#[derive(Debug, Clone)]
pub struct RecordedAnalysis {
    pub files: Vec<String>,
    pub description: String,
}

/// Feature extractor returning a configurable outcome.
///
/// Defaults to `Unavailable`.
#[derive(Debug, Clone)]
pub struct MockFeatureExtractor {
    outcome: Arc<RwLock<ExtractionOutcome>>,
    calls: Arc<RwLock<Vec<RecordedAnalysis>>>,
}

impl MockFeatureExtractor {
    pub fn new() -> Self {
        Self::with_outcome(ExtractionOutcome::Unavailable)
    }

    pub fn with_outcome(outcome: ExtractionOutcome) -> Self {
        Self {
            outcome: Arc::new(RwLock::new(outcome)),
            calls: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Extractor that reports `features` with a typescript/react stack.
    pub fn with_features(features: Vec<Feature>) -> Self {
        Self::with_outcome(ExtractionOutcome::Extracted(FeatureAnalysis {
            features,
            tech_stack: vec!["typescript".to_string(), "react".to_string()],
            overall_complexity: Some(6),
        }))
    }

    /// Extractor whose every call fails with `reason`.
    pub fn failing(reason: &str) -> Self {
        Self::with_outcome(ExtractionOutcome::Failed {
            reason: reason.to_string(),
        })
    }

    pub async fn set_outcome(&self, outcome: ExtractionOutcome) {
        *self.outcome.write().await = outcome;
    }

    pub async fn calls(&self) -> Vec<RecordedAnalysis> {
        self.calls.read().await.clone()
    }
}

impl Default for MockFeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeatureExtractor for MockFeatureExtractor {
    fn name(&self) -> &str {
        "mock"
    }

    async fn analyze(&self, manifest: &FileManifest, description: &str) -> ExtractionOutcome {
        self.calls.write().await.push(RecordedAnalysis {
            files: manifest.paths().map(str::to_string).collect(),
            description: description.to_string(),
        });
        self.outcome.read().await.clone()
    }
}
