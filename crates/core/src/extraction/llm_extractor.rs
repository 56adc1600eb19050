//! LLM-backed feature extraction.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::llm::{complete_json, record_usage, CompletionRequest, LlmClient};
use super::{
    ExtractionError, ExtractionOutcome, FeatureAnalysis, FeatureExtractor, FileManifest,
};

/// Configuration for the LLM extractor.
#[derive(Debug, Clone)]
pub struct LlmExtractorConfig {
    /// Manifest entries beyond this are summarized rather than listed.
    pub max_files_in_prompt: usize,
    pub max_tokens: u32,
}

impl Default for LlmExtractorConfig {
    fn default() -> Self {
        Self {
            max_files_in_prompt: 400,
            max_tokens: 4096,
        }
    }
}

/// Asks a language model to describe the prototype's features.
pub struct LlmFeatureExtractor {
    client: Arc<dyn LlmClient>,
    config: LlmExtractorConfig,
}

impl LlmFeatureExtractor {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            client,
            config: LlmExtractorConfig::default(),
        }
    }

    pub fn with_config(client: Arc<dyn LlmClient>, config: LlmExtractorConfig) -> Self {
        Self { client, config }
    }

    fn build_system_prompt(&self) -> String {
        r#"You analyze prototype applications and list the features a development team must build.

Respond with a single JSON object and nothing else:
{
  "features": [
    {
      "id": "short-kebab-id",
      "name": "Feature name",
      "description": "What the feature does",
      "complexity": 1-10,
      "files": ["paths from the manifest this feature touches"],
      "isUserFacing": true|false,
      "estimatedHours": number
    }
  ],
  "techStack": ["languages and frameworks"],
  "overallComplexity": 1-10
}

Only reference files that appear in the manifest. Do not include project setup as a feature."#
            .to_string()
    }

    fn build_user_prompt(&self, manifest: &FileManifest, description: &str) -> String {
        let mut prompt = String::new();
        if !description.trim().is_empty() {
            prompt.push_str(&format!("PROJECT DESCRIPTION:\n{}\n\n", description.trim()));
        }

        prompt.push_str(&format!("FILE MANIFEST ({} files):\n", manifest.len()));
        for path in manifest.paths().take(self.config.max_files_in_prompt) {
            prompt.push_str(&format!("- {}\n", path));
        }
        if manifest.len() > self.config.max_files_in_prompt {
            prompt.push_str(&format!(
                "... and {} more files\n",
                manifest.len() - self.config.max_files_in_prompt
            ));
        }

        prompt
    }

    async fn try_analyze(
        &self,
        manifest: &FileManifest,
        description: &str,
    ) -> Result<FeatureAnalysis, ExtractionError> {
        let request = CompletionRequest::new(self.build_user_prompt(manifest, description))
            .with_system(self.build_system_prompt())
            .with_max_tokens(self.config.max_tokens);

        let (analysis, usage): (FeatureAnalysis, _) =
            complete_json(self.client.as_ref(), request).await?;

        record_usage(self.client.provider(), &usage);
        debug!(
            provider = self.client.provider(),
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            "Feature extraction completed"
        );

        let mut analysis = analysis.normalized();

        // Drop file references the model invented.
        for feature in &mut analysis.features {
            feature.files.retain(|f| manifest.files.contains(f));
        }

        if analysis.features.is_empty() {
            return Err(ExtractionError::InvalidResponse(
                "no features in response".to_string(),
            ));
        }

        Ok(analysis)
    }
}

#[async_trait]
impl FeatureExtractor for LlmFeatureExtractor {
    fn name(&self) -> &str {
        "llm"
    }

    async fn analyze(&self, manifest: &FileManifest, description: &str) -> ExtractionOutcome {
        match self.try_analyze(manifest, description).await {
            Ok(analysis) => ExtractionOutcome::Extracted(analysis),
            Err(e) => {
                warn!(error = %e, model = self.client.model(), "LLM feature extraction failed");
                ExtractionOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::llm::{CompletionResponse, LlmError, LlmUsage};

    struct MockLlmClient {
        response: Result<String, u16>,
    }

    #[async_trait]
    impl LlmClient for MockLlmClient {
        fn provider(&self) -> &str {
            "mock"
        }

        fn model(&self) -> &str {
            "mock-model"
        }

        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            match &self.response {
                Ok(text) => Ok(CompletionResponse {
                    text: text.clone(),
                    usage: LlmUsage::default(),
                    model: "mock-model".to_string(),
                }),
                Err(status) => Err(LlmError::Api {
                    status: *status,
                    message: "overloaded".to_string(),
                }),
            }
        }
    }

    fn extractor(response: Result<&str, u16>) -> LlmFeatureExtractor {
        LlmFeatureExtractor::new(Arc::new(MockLlmClient {
            response: response.map(str::to_string),
        }))
    }

    fn manifest() -> FileManifest {
        FileManifest::new(["src/login.tsx", "src/api.ts"])
    }

    #[tokio::test]
    async fn test_extracts_features() {
        let response = r#"{
            "features": [
                {"id": "login", "name": "Login", "description": "Sign in", "complexity": 6,
                 "files": ["src/login.tsx", "src/ghost.ts"], "isUserFacing": true, "estimatedHours": 5}
            ],
            "techStack": ["react"],
            "overallComplexity": 6
        }"#;

        let outcome = extractor(Ok(response)).analyze(&manifest(), "An app").await;
        let ExtractionOutcome::Extracted(analysis) = outcome else {
            panic!("expected extracted outcome");
        };
        assert_eq!(analysis.features.len(), 1);
        assert_eq!(analysis.features[0].files, vec!["src/login.tsx"]);
        assert_eq!(analysis.tech_stack, vec!["react"]);
    }

    #[tokio::test]
    async fn test_api_error_becomes_failed() {
        let outcome = extractor(Err(529)).analyze(&manifest(), "").await;
        assert!(matches!(outcome, ExtractionOutcome::Failed { .. }));
    }

    #[tokio::test]
    async fn test_garbage_becomes_failed() {
        let outcome = extractor(Ok("I cannot help with that")).analyze(&manifest(), "").await;
        assert!(matches!(outcome, ExtractionOutcome::Failed { .. }));
    }

    #[tokio::test]
    async fn test_empty_feature_list_becomes_failed() {
        let outcome = extractor(Ok(r#"{"features": []}"#))
            .analyze(&manifest(), "")
            .await;
        match outcome {
            ExtractionOutcome::Failed { reason } => assert!(reason.contains("no features")),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_prompt_truncates_long_manifest() {
        let extractor = LlmFeatureExtractor::with_config(
            Arc::new(MockLlmClient {
                response: Ok(String::new()),
            }),
            LlmExtractorConfig {
                max_files_in_prompt: 2,
                max_tokens: 100,
            },
        );
        let manifest = FileManifest::new(["a.ts", "b.ts", "c.ts", "d.ts"]);
        let prompt = extractor.build_user_prompt(&manifest, "Shop");

        assert!(prompt.contains("PROJECT DESCRIPTION:\nShop"));
        assert!(prompt.contains("- b.ts"));
        assert!(!prompt.contains("- c.ts"));
        assert!(prompt.contains("... and 2 more files"));
    }
}
