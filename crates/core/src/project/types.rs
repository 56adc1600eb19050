use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a project.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Analyzing,
    Review,
    Approved,
    InProgress,
    Completed,
    Archived,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Analyzing => "analyzing",
            ProjectStatus::Review => "review",
            ProjectStatus::Approved => "approved",
            ProjectStatus::InProgress => "in_progress",
            ProjectStatus::Completed => "completed",
            ProjectStatus::Archived => "archived",
        }
    }

    /// Whether a manual status change from `self` to `next` is allowed.
    ///
    /// A generation run owns `analyzing` on both ends: only it may enter the
    /// status or leave it (for `review`).
    pub fn can_transition_to(&self, next: ProjectStatus) -> bool {
        *self != ProjectStatus::Analyzing && next != ProjectStatus::Analyzing
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "analyzing" => Ok(ProjectStatus::Analyzing),
            "review" => Ok(ProjectStatus::Review),
            "approved" => Ok(ProjectStatus::Approved),
            "in_progress" => Ok(ProjectStatus::InProgress),
            "completed" => Ok(ProjectStatus::Completed),
            "archived" => Ok(ProjectStatus::Archived),
            _ => Err(format!("Invalid project status: {}", s)),
        }
    }
}

/// Summary of the last successful generation run, stored on the project.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AnalysisSummary {
    pub ticket_count: usize,
    pub feature_count: usize,
    /// Ticket ids of the longest dependency chain, in execution order.
    pub critical_path: Vec<String>,
    pub tech_stack: Vec<String>,
    #[serde(default)]
    pub overall_complexity: Option<u8>,
    /// True when feature extraction was unavailable and only the setup
    /// ticket was generated.
    pub fallback: bool,
}

/// A project whose prototype is analyzed into tickets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub description: String,
    pub status: ProjectStatus,
    pub total_tickets: u32,
    pub completed_tickets: u32,
    pub analyzed_at: Option<DateTime<Utc>>,
    pub analysis_result: Option<AnalysisSummary>,
    /// Error detail from the last failed generation run.
    pub analysis_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
