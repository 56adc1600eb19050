//! `ProjectStore` for the SQLite store.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::{
    AnalysisSummary, GenerationCommit, Project, ProjectStatus, ProjectStore, ProjectTransition,
};
use crate::ticket::{parse_column, parse_timestamp, SqliteTicketStore, TicketError};

const PROJECT_COLUMNS: &str = "id, name, description, status, total_tickets, completed_tickets, analyzed_at, analysis_result, analysis_error, created_at, updated_at";

fn row_to_project(row: &rusqlite::Row) -> rusqlite::Result<Project> {
    let analyzed_at: Option<String> = row.get(6)?;
    let analysis_result: Option<String> = row.get(7)?;

    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        status: parse_column(row, 3)?,
        total_tickets: row.get(4)?,
        completed_tickets: row.get(5)?,
        analyzed_at: analyzed_at.as_deref().map(parse_timestamp),
        analysis_result: analysis_result
            .and_then(|json| serde_json::from_str::<AnalysisSummary>(&json).ok()),
        analysis_error: row.get(8)?,
        created_at: parse_timestamp(&row.get::<_, String>(9)?),
        updated_at: parse_timestamp(&row.get::<_, String>(10)?),
    })
}

fn fetch_project(conn: &Connection, id: &str) -> Result<Project, TicketError> {
    conn.query_row(
        &format!("SELECT {} FROM projects WHERE id = ?", PROJECT_COLUMNS),
        params![id],
        row_to_project,
    )
    .optional()?
    .ok_or_else(|| TicketError::ProjectNotFound(id.to_string()))
}

impl ProjectStore for SqliteTicketStore {
    fn create_project(&self, name: &str, description: &str) -> Result<Project, TicketError> {
        if name.trim().is_empty() {
            return Err(TicketError::Validation(
                "project name must not be empty".to_string(),
            ));
        }

        let conn = self.lock();
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO projects (id, name, description, status, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
            params![
                id,
                name,
                description,
                ProjectStatus::Analyzing.as_str(),
                now.to_rfc3339(),
                now.to_rfc3339(),
            ],
        )?;

        Ok(Project {
            id,
            name: name.to_string(),
            description: description.to_string(),
            status: ProjectStatus::Analyzing,
            total_tickets: 0,
            completed_tickets: 0,
            analyzed_at: None,
            analysis_result: None,
            analysis_error: None,
            created_at: now,
            updated_at: now,
        })
    }

    fn get_project(&self, id: &str) -> Result<Option<Project>, TicketError> {
        let conn = self.lock();
        match fetch_project(&conn, id) {
            Ok(project) => Ok(Some(project)),
            Err(TicketError::ProjectNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn begin_analysis(&self, id: &str) -> Result<ProjectTransition, TicketError> {
        let conn = self.lock();
        let current = fetch_project(&conn, id)?;
        let now = Utc::now();

        conn.execute(
            "UPDATE projects SET status = ?, analysis_error = NULL, updated_at = ? WHERE id = ?",
            params![ProjectStatus::Analyzing.as_str(), now.to_rfc3339(), id],
        )?;

        let previous = current.status;
        Ok(ProjectTransition {
            previous,
            project: Project {
                status: ProjectStatus::Analyzing,
                analysis_error: None,
                updated_at: now,
                ..current
            },
        })
    }

    fn commit_generation(&self, commit: &GenerationCommit) -> Result<Project, TicketError> {
        if let Some(stray) = commit
            .tickets
            .iter()
            .find(|t| t.project_id != commit.project_id)
        {
            return Err(TicketError::Validation(format!(
                "ticket {} belongs to project {}",
                stray.id, stray.project_id
            )));
        }

        let summary = serde_json::to_string(&commit.summary)
            .map_err(|e| TicketError::Database(e.to_string()))?;

        let mut conn = self.lock();
        let tx = conn.transaction()?;

        fetch_project(&tx, &commit.project_id)?;

        tx.execute(
            "DELETE FROM ticket_dependencies WHERE project_id = ?",
            params![commit.project_id],
        )?;
        tx.execute(
            "DELETE FROM tickets WHERE project_id = ?",
            params![commit.project_id],
        )?;
        tx.execute(
            "DELETE FROM project_contexts WHERE project_id = ?",
            params![commit.project_id],
        )?;

        for ticket in &commit.tickets {
            SqliteTicketStore::insert_ticket(&tx, ticket)?;
        }

        for edge in &commit.edges {
            tx.execute(
                "INSERT INTO ticket_dependencies (project_id, ticket_id, depends_on_ticket_id, kind) VALUES (?, ?, ?, ?)",
                params![
                    commit.project_id,
                    edge.ticket_id,
                    edge.depends_on_ticket_id,
                    edge.kind.as_str(),
                ],
            )?;
        }

        let now = Utc::now();
        for context in &commit.contexts {
            let payload = serde_json::to_string(context)
                .map_err(|e| TicketError::Database(e.to_string()))?;
            tx.execute(
                "INSERT INTO project_contexts (project_id, context_type, payload, created_at) VALUES (?, ?, ?, ?)",
                params![
                    commit.project_id,
                    context.context_type(),
                    payload,
                    now.to_rfc3339(),
                ],
            )?;
        }

        tx.execute(
            "UPDATE projects SET status = ?, total_tickets = ?, completed_tickets = 0, analyzed_at = ?, analysis_result = ?, analysis_error = NULL, updated_at = ? WHERE id = ?",
            params![
                ProjectStatus::Review.as_str(),
                commit.tickets.len() as u32,
                now.to_rfc3339(),
                summary,
                now.to_rfc3339(),
                commit.project_id,
            ],
        )?;

        let project = fetch_project(&tx, &commit.project_id)?;
        tx.commit()?;

        Ok(project)
    }

    fn mark_analysis_failed(&self, id: &str, detail: &str) -> Result<Project, TicketError> {
        let conn = self.lock();
        let now = Utc::now();

        let updated = conn.execute(
            "UPDATE projects SET status = ?, analysis_error = ?, updated_at = ? WHERE id = ?",
            params![
                ProjectStatus::Analyzing.as_str(),
                detail,
                now.to_rfc3339(),
                id
            ],
        )?;
        if updated == 0 {
            return Err(TicketError::ProjectNotFound(id.to_string()));
        }

        fetch_project(&conn, id)
    }

    fn update_project_status(
        &self,
        id: &str,
        status: ProjectStatus,
    ) -> Result<ProjectTransition, TicketError> {
        let conn = self.lock();
        let current = fetch_project(&conn, id)?;
        if !current.status.can_transition_to(status) {
            return Err(TicketError::InvalidProjectState {
                project_id: id.to_string(),
                current_state: current.status.to_string(),
                operation: format!("move to {}", status),
            });
        }
        let now = Utc::now();

        conn.execute(
            "UPDATE projects SET status = ?, updated_at = ? WHERE id = ?",
            params![status.as_str(), now.to_rfc3339(), id],
        )?;

        let previous = current.status;
        Ok(ProjectTransition {
            previous,
            project: Project {
                status,
                updated_at: now,
                ..current
            },
        })
    }
}
