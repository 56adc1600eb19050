//! Nine-phase generation pipeline: manifest in, ordered tickets out.

mod context;
mod enricher;
mod pipeline;
mod synthesizer;

pub use context::{stage_contexts, ContextSnapshot, FeatureSummary};
pub use enricher::{
    preserves_structure, EnrichmentError, LlmTicketEnricher, PassthroughEnricher, TicketEnricher,
};
pub use pipeline::{GenerationOutcome, GenerationPhase, GenerationPipeline, GenerationRequest};
pub use synthesizer::{priority_for_complexity, TicketSynthesizer};

use std::sync::Arc;

use thiserror::Error;

use crate::config::{ExtractorMode, GenerationConfig};
use crate::extraction::{
    create_llm_client, FeatureExtractor, HeuristicFeatureExtractor, LlmClient, LlmError,
    LlmFeatureExtractor,
};
use crate::graph::GraphError;
use crate::project::ProjectStore;
use crate::sync::SyncNotifier;
use crate::ticket::TicketError;

/// Errors that abort a generation run.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GenerationError {
    #[error("file manifest is empty")]
    NoFiles,

    #[error("project not found: {0}")]
    ProjectNotFound(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("cyclic dependency detected: {}", .cycles.iter().map(|c| c.join(" -> ")).collect::<Vec<_>>().join("; "))]
    CyclicDependency { cycles: Vec<Vec<String>> },

    #[error("store error: {0}")]
    Store(String),
}

impl GenerationError {
    /// Short machine-readable code for API responses and logs.
    pub fn code(&self) -> &'static str {
        match self {
            GenerationError::NoFiles => "no_files",
            GenerationError::ProjectNotFound(_) => "project_not_found",
            GenerationError::Validation(_) => "validation",
            GenerationError::CyclicDependency { .. } => "cyclic_dependency",
            GenerationError::Store(_) => "store",
        }
    }
}

impl From<TicketError> for GenerationError {
    fn from(err: TicketError) -> Self {
        match err {
            TicketError::ProjectNotFound(id) => GenerationError::ProjectNotFound(id),
            TicketError::Validation(msg) => GenerationError::Validation(msg),
            other => GenerationError::Store(other.to_string()),
        }
    }
}

impl From<GraphError> for GenerationError {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::Validation(msg) => GenerationError::Validation(msg),
            GraphError::CyclicDependency { cycles } => GenerationError::CyclicDependency { cycles },
        }
    }
}

/// Factory function to build the pipeline from config.
pub fn create_pipeline(
    config: &GenerationConfig,
    projects: Arc<dyn ProjectStore>,
    notifier: Arc<dyn SyncNotifier>,
) -> Result<GenerationPipeline, LlmError> {
    let needs_llm = config.extractor == ExtractorMode::Llm || config.enrich;
    let client: Option<Arc<dyn LlmClient>> = if needs_llm {
        let llm = config.llm.as_ref().ok_or_else(|| {
            LlmError::NotConfigured("[generation.llm] section is required".to_string())
        })?;
        Some(create_llm_client(llm)?)
    } else {
        None
    };

    let mut pipeline = GenerationPipeline::new(projects).with_notifier(notifier);

    let extractor: Option<Arc<dyn FeatureExtractor>> = match (config.extractor, &client) {
        (ExtractorMode::None, _) => None,
        (ExtractorMode::Heuristic, _) => Some(Arc::new(HeuristicFeatureExtractor::new())),
        (ExtractorMode::Llm, Some(client)) => {
            Some(Arc::new(LlmFeatureExtractor::new(Arc::clone(client))))
        }
        (ExtractorMode::Llm, None) => None,
    };
    if let Some(extractor) = extractor {
        pipeline = pipeline.with_extractor(extractor);
    }

    if let (true, Some(client), Some(llm)) = (config.enrich, client, config.llm.as_ref()) {
        pipeline = pipeline
            .with_enricher(Arc::new(LlmTicketEnricher::new(client).with_max_tokens(llm.max_tokens)));
    }

    Ok(pipeline)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LlmConfig, LlmProvider};
    use crate::sync::NoopNotifier;
    use crate::ticket::SqliteTicketStore;

    fn store() -> Arc<dyn ProjectStore> {
        Arc::new(SqliteTicketStore::in_memory().unwrap())
    }

    #[test]
    fn test_create_pipeline_heuristic_default() {
        let pipeline =
            create_pipeline(&GenerationConfig::default(), store(), Arc::new(NoopNotifier));
        assert!(pipeline.is_ok());
    }

    #[test]
    fn test_create_pipeline_llm_requires_section() {
        let config = GenerationConfig {
            extractor: ExtractorMode::Llm,
            enrich: false,
            llm: None,
        };
        let result = create_pipeline(&config, store(), Arc::new(NoopNotifier));
        assert!(matches!(result, Err(LlmError::NotConfigured(_))));
    }

    #[test]
    fn test_create_pipeline_with_ollama_enrichment() {
        let config = GenerationConfig {
            extractor: ExtractorMode::Heuristic,
            enrich: true,
            llm: Some(LlmConfig {
                provider: LlmProvider::Ollama,
                model: "llama3".to_string(),
                api_key: None,
                api_base: None,
                timeout_secs: 5,
                max_tokens: 1024,
            }),
        };
        assert!(create_pipeline(&config, store(), Arc::new(NoopNotifier)).is_ok());
    }

    #[test]
    fn test_graph_errors_convert() {
        let err: GenerationError = GraphError::CyclicDependency {
            cycles: vec![vec!["a".into(), "b".into(), "a".into()]],
        }
        .into();
        assert_eq!(err.code(), "cyclic_dependency");
        assert_eq!(err.to_string(), "cyclic dependency detected: a -> b -> a");
    }

    #[test]
    fn test_store_errors_convert() {
        let err: GenerationError = TicketError::ProjectNotFound("p1".into()).into();
        assert_eq!(err, GenerationError::ProjectNotFound("p1".into()));

        let err: GenerationError = TicketError::Database("locked".into()).into();
        assert_eq!(err.code(), "store");
    }
}
