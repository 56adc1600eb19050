//! Turns a feature list into unordered candidate tickets.

use std::collections::HashSet;

use super::GenerationError;
use crate::extraction::Feature;
use crate::ticket::{AcceptanceCriterion, AffectedFile, ChangeKind, Priority, Ticket, TicketType};

const SETUP_TITLE: &str = "Project setup and environment configuration";

const SETUP_CRITERIA: &[&str] = &[
    "Repository builds from a clean checkout",
    "All dependencies install without errors",
    "Development server starts locally",
    "Required environment variables are documented",
];

const SETUP_ESTIMATED_HOURS: f64 = 2.0;

/// Priority for a feature of the given complexity.
pub fn priority_for_complexity(complexity: u8) -> Priority {
    match complexity {
        8.. => Priority::High,
        5..=7 => Priority::Medium,
        _ => Priority::Low,
    }
}

/// Builds candidate tickets. The output is unordered: `order_index` is
/// left unset until the dependency graph has been sorted.
#[derive(Debug, Clone, Default)]
pub struct TicketSynthesizer;

impl TicketSynthesizer {
    pub fn new() -> Self {
        Self
    }

    /// The single setup ticket every generated project starts with.
    pub fn setup_ticket(&self, project_id: &str, project_description: &str) -> Ticket {
        let description = if project_description.trim().is_empty() {
            "Prepare the development environment so feature work can start.".to_string()
        } else {
            format!(
                "Prepare the development environment for: {}",
                project_description.trim()
            )
        };

        let mut ticket = Ticket::candidate(
            project_id,
            SETUP_TITLE,
            description,
            TicketType::Setup,
            Priority::Critical,
        );
        ticket.estimated_hours = SETUP_ESTIMATED_HOURS;
        ticket.acceptance_criteria = SETUP_CRITERIA
            .iter()
            .map(|c| AcceptanceCriterion::new(*c))
            .collect();
        ticket
    }

    fn feature_ticket(&self, project_id: &str, feature: &Feature) -> Ticket {
        let description = if feature.description.trim().is_empty() {
            format!("Implement {}", feature.name)
        } else {
            feature.description.clone()
        };

        let mut ticket = Ticket::candidate(
            project_id,
            feature.name.clone(),
            description,
            TicketType::Feature,
            priority_for_complexity(feature.complexity),
        );
        ticket.category = Some(if feature.is_user_facing {
            "Frontend".to_string()
        } else {
            "Backend".to_string()
        });
        ticket.feature_id = Some(feature.id.clone());
        ticket.estimated_hours = feature.estimated_hours;
        ticket.affected_files = feature
            .files
            .iter()
            .map(|path| AffectedFile::new(path, "feature implementation", ChangeKind::Modify))
            .collect();
        ticket.acceptance_criteria =
            vec![AcceptanceCriterion::new(format!("{} works as described", feature.name))];
        ticket
    }

    /// Synthesize the setup ticket followed by one ticket per feature.
    ///
    /// Never returns an empty list. Features with empty names, duplicate ids
    /// or complexity outside 1..=10 are rejected.
    pub fn synthesize(
        &self,
        project_id: &str,
        project_description: &str,
        features: &[Feature],
    ) -> Result<Vec<Ticket>, GenerationError> {
        let mut seen = HashSet::new();
        for feature in features {
            if feature.name.trim().is_empty() {
                return Err(GenerationError::Validation(format!(
                    "feature {} has no name",
                    feature.id
                )));
            }
            if !(1..=10).contains(&feature.complexity) {
                return Err(GenerationError::Validation(format!(
                    "feature {} has complexity {} outside 1..=10",
                    feature.id, feature.complexity
                )));
            }
            if !seen.insert(feature.id.as_str()) {
                return Err(GenerationError::Validation(format!(
                    "duplicate feature id: {}",
                    feature.id
                )));
            }
        }

        let mut tickets = Vec::with_capacity(features.len() + 1);
        tickets.push(self.setup_ticket(project_id, project_description));
        tickets.extend(features.iter().map(|f| self.feature_ticket(project_id, f)));
        Ok(tickets)
    }
}
