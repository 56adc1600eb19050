//! Core ticket data types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Implements `as_str`, `Display` and `FromStr` for a unit-only enum whose
/// serde representation is snake_case.
macro_rules! string_enum {
    ($ty:ident, $what:literal, { $($variant:ident => $s:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", $what, s)),
                }
            }
        }
    };
}

// ============================================================================
// Enumerations
// ============================================================================

/// Kind of development work a ticket represents.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TicketType {
    Setup,
    Feature,
    Enhancement,
    Bug,
    Refactor,
    Test,
    Documentation,
}

string_enum!(TicketType, "ticket type", {
    Setup => "setup",
    Feature => "feature",
    Enhancement => "enhancement",
    Bug => "bug",
    Refactor => "refactor",
    Test => "test",
    Documentation => "documentation",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

string_enum!(Priority, "priority", {
    Low => "low",
    Medium => "medium",
    High => "high",
    Critical => "critical",
});

/// Workflow status of a ticket.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Pending,
    Ready,
    Assigned,
    InProgress,
    Review,
    Blocked,
    Completed,
    Cancelled,
}

string_enum!(TicketStatus, "ticket status", {
    Pending => "pending",
    Ready => "ready",
    Assigned => "assigned",
    InProgress => "in_progress",
    Review => "review",
    Blocked => "blocked",
    Completed => "completed",
    Cancelled => "cancelled",
});

impl TicketStatus {
    /// Returns true if no further transitions are allowed.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TicketStatus::Completed | TicketStatus::Cancelled)
    }

    /// Returns true if moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(&self, next: TicketStatus) -> bool {
        if *self == next || self.is_terminal() {
            return false;
        }
        !matches!(
            (self, next),
            (
                TicketStatus::Pending,
                TicketStatus::Review | TicketStatus::Completed
            )
        )
    }
}

/// How a ticket touches a file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Create,
    Modify,
    Delete,
}

string_enum!(ChangeKind, "change kind", {
    Create => "create",
    Modify => "modify",
    Delete => "delete",
});

/// Kind of dependency edge between two tickets.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    Blocks,
    Related,
    FileConflict,
}

string_enum!(DependencyKind, "dependency kind", {
    Blocks => "blocks",
    Related => "related",
    FileConflict => "file_conflict",
});

// ============================================================================
// Ticket
// ============================================================================

/// A file a ticket is expected to touch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AffectedFile {
    pub path: String,
    pub reason: String,
    pub change_kind: ChangeKind,
}

impl AffectedFile {
    pub fn new(path: impl Into<String>, reason: impl Into<String>, change_kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
            change_kind,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AcceptanceCriterion {
    pub text: String,
    #[serde(default)]
    pub completed: bool,
}

impl AcceptanceCriterion {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            completed: false,
        }
    }
}

/// A unit of development work.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ticket {
    pub id: String,
    pub project_id: String,
    pub title: String,
    pub description: String,
    pub ticket_type: TicketType,
    pub priority: Priority,
    pub status: TicketStatus,
    /// "Frontend" or "Backend" for feature-derived tickets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Feature this ticket was synthesized from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_id: Option<String>,
    pub estimated_hours: f64,
    #[serde(default)]
    pub actual_hours: Option<f64>,
    /// Rank in dependency order; unset until the graph is sorted.
    #[serde(default)]
    pub order_index: Option<u32>,
    #[serde(default)]
    pub affected_files: Vec<AffectedFile>,
    #[serde(default)]
    pub acceptance_criteria: Vec<AcceptanceCriterion>,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub branch_name: Option<String>,
    #[serde(default)]
    pub pr_url: Option<String>,
    #[serde(default)]
    pub commit_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ticket {
    /// Create a fresh pending candidate ticket with a newly minted id.
    pub fn candidate(
        project_id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        ticket_type: TicketType,
        priority: Priority,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            project_id: project_id.into(),
            title: title.into(),
            description: description.into(),
            ticket_type,
            priority,
            status: TicketStatus::Pending,
            category: None,
            feature_id: None,
            estimated_hours: 0.0,
            actual_hours: None,
            order_index: None,
            affected_files: Vec::new(),
            acceptance_criteria: Vec::new(),
            assignee: None,
            branch_name: None,
            pr_url: None,
            commit_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_setup(&self) -> bool {
        self.ticket_type == TicketType::Setup
    }

    /// Paths of all affected files.
    pub fn file_paths(&self) -> impl Iterator<Item = &str> {
        self.affected_files.iter().map(|f| f.path.as_str())
    }
}

/// Directed "must-precede" relationship: `ticket_id` depends on
/// `depends_on_ticket_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct DependencyEdge {
    pub ticket_id: String,
    pub depends_on_ticket_id: String,
    pub kind: DependencyKind,
}

impl DependencyEdge {
    pub fn new(
        ticket_id: impl Into<String>,
        depends_on_ticket_id: impl Into<String>,
        kind: DependencyKind,
    ) -> Self {
        Self {
            ticket_id: ticket_id.into(),
            depends_on_ticket_id: depends_on_ticket_id.into(),
            kind,
        }
    }
}

/// Partial update applied through the service layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TicketPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_count: Option<u32>,
}

impl TicketPatch {
    /// Names of the fields this patch sets, in declaration order.
    pub fn changed_fields(&self) -> Vec<String> {
        let mut fields = Vec::new();
        let mut push = |set: bool, name: &str| {
            if set {
                fields.push(name.to_string());
            }
        };
        push(self.title.is_some(), "title");
        push(self.description.is_some(), "description");
        push(self.priority.is_some(), "priority");
        push(self.estimated_hours.is_some(), "estimated_hours");
        push(self.actual_hours.is_some(), "actual_hours");
        push(self.branch_name.is_some(), "branch_name");
        push(self.pr_url.is_some(), "pr_url");
        push(self.commit_count.is_some(), "commit_count");
        fields
    }

    pub fn is_empty(&self) -> bool {
        self.changed_fields().is_empty()
    }

    /// Apply the patch to a ticket in place.
    pub fn apply(&self, ticket: &mut Ticket) {
        if let Some(ref title) = self.title {
            ticket.title = title.clone();
        }
        if let Some(ref description) = self.description {
            ticket.description = description.clone();
        }
        if let Some(priority) = self.priority {
            ticket.priority = priority;
        }
        if let Some(hours) = self.estimated_hours {
            ticket.estimated_hours = hours;
        }
        if let Some(hours) = self.actual_hours {
            ticket.actual_hours = Some(hours);
        }
        if let Some(ref branch) = self.branch_name {
            ticket.branch_name = Some(branch.clone());
        }
        if let Some(ref url) = self.pr_url {
            ticket.pr_url = Some(url.clone());
        }
        if let Some(count) = self.commit_count {
            ticket.commit_count = count;
        }
    }
}
