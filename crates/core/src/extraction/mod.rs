//! Feature extraction: the external capability that turns a file manifest
//! into a feature list.

mod heuristic;
pub mod llm;
mod llm_extractor;
mod traits;
mod types;

pub use heuristic::{detect_tech_stack, HeuristicFeatureExtractor};
pub use llm::{create_llm_client, AnthropicClient, LlmClient, LlmError, OllamaClient};
pub use llm_extractor::{LlmExtractorConfig, LlmFeatureExtractor};
pub use traits::{ExtractionError, FeatureExtractor};
pub use types::{ExtractionOutcome, Feature, FeatureAnalysis, FileManifest};
