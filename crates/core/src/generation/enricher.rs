//! Finalization: optional enrichment of ticket descriptions and acceptance
//! criteria.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::extraction::llm::{complete_json, record_usage, CompletionRequest, LlmClient};
use crate::extraction::LlmError;
use crate::ticket::{AcceptanceCriterion, Ticket};

#[derive(Debug, Error)]
pub enum EnrichmentError {
    #[error("LLM request failed: {0}")]
    Llm(#[from] LlmError),

    #[error("invalid enrichment response: {0}")]
    InvalidResponse(String),
}

/// Rewrites ticket text. Implementations must keep ids, order, types and
/// files intact; the pipeline discards any result that does not.
#[async_trait]
pub trait TicketEnricher: Send + Sync {
    fn name(&self) -> &str;

    async fn enrich(
        &self,
        tickets: &[Ticket],
        project_description: &str,
    ) -> Result<Vec<Ticket>, EnrichmentError>;
}

/// Returns tickets unchanged.
#[derive(Debug, Default)]
pub struct PassthroughEnricher;

#[async_trait]
impl TicketEnricher for PassthroughEnricher {
    fn name(&self) -> &str {
        "passthrough"
    }

    async fn enrich(
        &self,
        tickets: &[Ticket],
        _project_description: &str,
    ) -> Result<Vec<Ticket>, EnrichmentError> {
        Ok(tickets.to_vec())
    }
}

/// True if `enriched` is a text-only rewrite of `original`.
pub fn preserves_structure(original: &[Ticket], enriched: &[Ticket]) -> bool {
    original.len() == enriched.len()
        && original.iter().zip(enriched).all(|(a, b)| {
            a.id == b.id
                && a.ticket_type == b.ticket_type
                && a.order_index == b.order_index
                && a.affected_files == b.affected_files
        })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnrichmentResponse {
    tickets: Vec<EnrichedTicket>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnrichedTicket {
    id: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    acceptance_criteria: Vec<String>,
}

/// Asks an LLM for fuller descriptions and extra acceptance criteria.
pub struct LlmTicketEnricher {
    client: Arc<dyn LlmClient>,
    max_tokens: u32,
}

impl LlmTicketEnricher {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            client,
            max_tokens: 4096,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    fn build_prompt(&self, tickets: &[Ticket], project_description: &str) -> String {
        let mut prompt = format!("PROJECT: {}\n\nTICKETS:\n", project_description.trim());
        for ticket in tickets {
            prompt.push_str(&format!(
                "- id: {}\n  type: {}\n  title: {}\n  description: {}\n",
                ticket.id, ticket.ticket_type, ticket.title, ticket.description
            ));
        }
        prompt
    }

    fn merge(tickets: &[Ticket], response: EnrichmentResponse) -> Vec<Ticket> {
        let mut updates: HashMap<String, EnrichedTicket> = response
            .tickets
            .into_iter()
            .map(|t| (t.id.clone(), t))
            .collect();

        tickets
            .iter()
            .map(|ticket| {
                let mut ticket = ticket.clone();
                if let Some(update) = updates.remove(&ticket.id) {
                    if let Some(description) = update.description.filter(|d| !d.trim().is_empty())
                    {
                        ticket.description = description;
                    }
                    for text in update.acceptance_criteria {
                        if !text.trim().is_empty()
                            && !ticket.acceptance_criteria.iter().any(|c| c.text == text)
                        {
                            ticket.acceptance_criteria.push(AcceptanceCriterion::new(text));
                        }
                    }
                }
                ticket
            })
            .collect()
    }
}

#[async_trait]
impl TicketEnricher for LlmTicketEnricher {
    fn name(&self) -> &str {
        "llm"
    }

    async fn enrich(
        &self,
        tickets: &[Ticket],
        project_description: &str,
    ) -> Result<Vec<Ticket>, EnrichmentError> {
        let request = CompletionRequest::new(self.build_prompt(tickets, project_description))
            .with_system(
                r#"You refine development tickets. For each ticket, write a clearer description and up to three concrete, testable acceptance criteria.
Respond with JSON only: {"tickets": [{"id": "...", "description": "...", "acceptanceCriteria": ["..."]}]}
Use the ids exactly as given."#,
            )
            .with_max_tokens(self.max_tokens);

        let (response, usage): (EnrichmentResponse, _) =
            complete_json(self.client.as_ref(), request).await?;
        record_usage(self.client.provider(), &usage);

        if response.tickets.is_empty() {
            return Err(EnrichmentError::InvalidResponse(
                "no tickets in response".to_string(),
            ));
        }

        debug!(updated = response.tickets.len(), "Enrichment response received");
        Ok(Self::merge(tickets, response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::llm::{CompletionResponse, LlmUsage};
    use crate::ticket::{Priority, TicketType};

    struct CannedClient(String);

    #[async_trait]
    impl LlmClient for CannedClient {
        fn provider(&self) -> &str {
            "canned"
        }

        fn model(&self) -> &str {
            "canned"
        }

        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            Ok(CompletionResponse {
                text: self.0.clone(),
                usage: LlmUsage::default(),
                model: "canned".to_string(),
            })
        }
    }

    fn tickets() -> Vec<Ticket> {
        let mut a = Ticket::candidate("p", "Setup", "old", TicketType::Setup, Priority::Critical);
        a.id = "t0".to_string();
        let mut b = Ticket::candidate("p", "Login", "old", TicketType::Feature, Priority::High);
        b.id = "t1".to_string();
        b.acceptance_criteria.push(AcceptanceCriterion::new("Works"));
        vec![a, b]
    }

    #[tokio::test]
    async fn test_passthrough_returns_input() {
        let input = tickets();
        let output = PassthroughEnricher.enrich(&input, "").await.unwrap();
        assert_eq!(output, input);
    }

    #[tokio::test]
    async fn test_llm_enricher_merges_by_id() {
        let reply = r#"{"tickets": [
            {"id": "t1", "description": "Users sign in with email", "acceptanceCriteria": ["Works", "Bad password shows an error"]},
            {"id": "ghost", "description": "ignored"}
        ]}"#;
        let enricher = LlmTicketEnricher::new(Arc::new(CannedClient(reply.to_string())));
        let input = tickets();
        let output = enricher.enrich(&input, "Shop").await.unwrap();

        assert!(preserves_structure(&input, &output));
        assert_eq!(output[0].description, "old");
        assert_eq!(output[1].description, "Users sign in with email");
        let texts: Vec<_> = output[1]
            .acceptance_criteria
            .iter()
            .map(|c| c.text.as_str())
            .collect();
        assert_eq!(texts, vec!["Works", "Bad password shows an error"]);
    }

    #[tokio::test]
    async fn test_llm_enricher_rejects_bad_reply() {
        let enricher = LlmTicketEnricher::new(Arc::new(CannedClient("nope".to_string())));
        assert!(enricher.enrich(&tickets(), "").await.is_err());
    }

    #[test]
    fn test_preserves_structure_detects_reordering() {
        let input = tickets();
        let mut swapped = input.clone();
        swapped.reverse();
        assert!(!preserves_structure(&input, &swapped));
        assert!(!preserves_structure(&input, &input[..1]));
    }
}
