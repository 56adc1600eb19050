//! Misbehaving enrichers for exercising the finalization fallback.

use async_trait::async_trait;

use crate::generation::{EnrichmentError, TicketEnricher};
use crate::ticket::Ticket;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailureMode {
    Error,
    DropLastTicket,
}

/// Enricher that either errors or returns a structurally different list.
#[derive(Debug, Clone)]
pub struct FailingEnricher {
    mode: FailureMode,
}

impl FailingEnricher {
    /// Every call returns an error.
    pub fn new() -> Self {
        Self {
            mode: FailureMode::Error,
        }
    }

    /// Every call "succeeds" but loses the last ticket.
    pub fn dropping_tickets() -> Self {
        Self {
            mode: FailureMode::DropLastTicket,
        }
    }
}

impl Default for FailingEnricher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TicketEnricher for FailingEnricher {
    fn name(&self) -> &str {
        "failing"
    }

    async fn enrich(
        &self,
        tickets: &[Ticket],
        _project_description: &str,
    ) -> Result<Vec<Ticket>, EnrichmentError> {
        match self.mode {
            FailureMode::Error => Err(EnrichmentError::InvalidResponse(
                "enrichment unavailable".to_string(),
            )),
            FailureMode::DropLastTicket => {
                let mut enriched = tickets.to_vec();
                enriched.pop();
                for ticket in &mut enriched {
                    ticket.description = format!("{} (rewritten)", ticket.description);
                }
                Ok(enriched)
            }
        }
    }
}
