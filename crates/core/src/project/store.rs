//! Project storage trait.

use crate::generation::ContextSnapshot;
use crate::ticket::{DependencyEdge, Ticket, TicketError};

use super::{AnalysisSummary, Project, ProjectStatus};

/// Everything a successful generation run writes, committed as one unit.
#[derive(Debug, Clone)]
pub struct GenerationCommit {
    pub project_id: String,
    /// Tickets with `order_index` assigned.
    pub tickets: Vec<Ticket>,
    pub edges: Vec<DependencyEdge>,
    pub contexts: Vec<ContextSnapshot>,
    pub summary: AnalysisSummary,
}

/// Result of a project status write.
#[derive(Debug, Clone)]
pub struct ProjectTransition {
    pub previous: ProjectStatus,
    pub project: Project,
}

/// Trait for project storage backends.
pub trait ProjectStore: Send + Sync {
    /// Create a new project in `analyzing` status.
    fn create_project(&self, name: &str, description: &str) -> Result<Project, TicketError>;

    /// Get a project by ID.
    fn get_project(&self, id: &str) -> Result<Option<Project>, TicketError>;

    /// Move a project into `analyzing` and clear any previous error.
    fn begin_analysis(&self, id: &str) -> Result<ProjectTransition, TicketError>;

    /// Replace the project's tickets, edges and contexts with the commit's
    /// and move the project to `review`. Either everything is written or
    /// nothing is.
    fn commit_generation(&self, commit: &GenerationCommit) -> Result<Project, TicketError>;

    /// Record a failed generation run. The project stays in `analyzing`.
    fn mark_analysis_failed(&self, id: &str, detail: &str) -> Result<Project, TicketError>;

    /// Set a project's status.
    fn update_project_status(
        &self,
        id: &str,
        status: ProjectStatus,
    ) -> Result<ProjectTransition, TicketError>;
}
