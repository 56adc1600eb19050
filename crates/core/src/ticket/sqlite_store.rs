//! SQLite-backed ticket and project store implementation.

use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};

use super::{
    DependencyEdge, StatusTransition, Ticket, TicketError, TicketFilter, TicketPatch,
    TicketStatus, TicketStore,
};
use crate::generation::ContextSnapshot;

pub(crate) const TICKET_COLUMNS: &str = "id, project_id, title, description, ticket_type, priority, status, category, feature_id, estimated_hours, actual_hours, order_index, affected_files, acceptance_criteria, assignee, branch_name, pr_url, commit_count, created_at, updated_at";

/// SQLite-backed store for projects, tickets, dependency edges and context
/// snapshots.
pub struct SqliteTicketStore {
    conn: Mutex<Connection>,
}

impl SqliteTicketStore {
    /// Create a new SQLite store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, TicketError> {
        let conn = Connection::open(path)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite store (useful for testing).
    pub fn in_memory() -> Result<Self, TicketError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }

    fn initialize_schema(conn: &Connection) -> Result<(), TicketError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS projects (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL,
                status TEXT NOT NULL,
                total_tickets INTEGER NOT NULL DEFAULT 0,
                completed_tickets INTEGER NOT NULL DEFAULT 0,
                analyzed_at TEXT,
                analysis_result TEXT,
                analysis_error TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS tickets (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                ticket_type TEXT NOT NULL,
                priority TEXT NOT NULL,
                status TEXT NOT NULL,
                category TEXT,
                feature_id TEXT,
                estimated_hours REAL NOT NULL DEFAULT 0,
                actual_hours REAL,
                order_index INTEGER,
                affected_files TEXT NOT NULL,
                acceptance_criteria TEXT NOT NULL,
                assignee TEXT,
                branch_name TEXT,
                pr_url TEXT,
                commit_count INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_tickets_project ON tickets(project_id, order_index);
            CREATE UNIQUE INDEX IF NOT EXISTS idx_tickets_project_order
                ON tickets(project_id, order_index) WHERE order_index IS NOT NULL;

            CREATE TABLE IF NOT EXISTS ticket_dependencies (
                project_id TEXT NOT NULL,
                ticket_id TEXT NOT NULL,
                depends_on_ticket_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                PRIMARY KEY (ticket_id, depends_on_ticket_id),
                CHECK (ticket_id <> depends_on_ticket_id)
            );

            CREATE INDEX IF NOT EXISTS idx_dependencies_project ON ticket_dependencies(project_id);

            CREATE TABLE IF NOT EXISTS project_contexts (
                project_id TEXT NOT NULL,
                context_type TEXT NOT NULL,
                payload TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (project_id, context_type)
            );
            "#,
        )?;

        Ok(())
    }

    fn build_where_clause(filter: &TicketFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref project_id) = filter.project_id {
            conditions.push("project_id = ?");
            params.push(Box::new(project_id.clone()));
        }

        if let Some(status) = filter.status {
            conditions.push("status = ?");
            params.push(Box::new(status.as_str()));
        }

        if let Some(ticket_type) = filter.ticket_type {
            conditions.push("ticket_type = ?");
            params.push(Box::new(ticket_type.as_str()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    pub(crate) fn row_to_ticket(row: &rusqlite::Row) -> rusqlite::Result<Ticket> {
        let affected_files_json: String = row.get(12)?;
        let criteria_json: String = row.get(13)?;

        Ok(Ticket {
            id: row.get(0)?,
            project_id: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            ticket_type: parse_column(row, 4)?,
            priority: parse_column(row, 5)?,
            status: parse_column(row, 6)?,
            category: row.get(7)?,
            feature_id: row.get(8)?,
            estimated_hours: row.get(9)?,
            actual_hours: row.get(10)?,
            order_index: row.get(11)?,
            affected_files: serde_json::from_str(&affected_files_json).unwrap_or_default(),
            acceptance_criteria: serde_json::from_str(&criteria_json).unwrap_or_default(),
            assignee: row.get(14)?,
            branch_name: row.get(15)?,
            pr_url: row.get(16)?,
            commit_count: row.get(17)?,
            created_at: parse_timestamp(&row.get::<_, String>(18)?),
            updated_at: parse_timestamp(&row.get::<_, String>(19)?),
        })
    }

    fn row_to_edge(row: &rusqlite::Row) -> rusqlite::Result<DependencyEdge> {
        Ok(DependencyEdge {
            ticket_id: row.get(0)?,
            depends_on_ticket_id: row.get(1)?,
            kind: parse_column(row, 2)?,
        })
    }

    pub(crate) fn fetch_ticket(conn: &Connection, id: &str) -> Result<Ticket, TicketError> {
        conn.query_row(
            &format!("SELECT {} FROM tickets WHERE id = ?", TICKET_COLUMNS),
            params![id],
            Self::row_to_ticket,
        )
        .optional()?
        .ok_or_else(|| TicketError::NotFound(id.to_string()))
    }

    pub(crate) fn insert_ticket(conn: &Connection, ticket: &Ticket) -> Result<(), TicketError> {
        let affected_files = serde_json::to_string(&ticket.affected_files)
            .map_err(|e| TicketError::Database(e.to_string()))?;
        let acceptance_criteria = serde_json::to_string(&ticket.acceptance_criteria)
            .map_err(|e| TicketError::Database(e.to_string()))?;

        conn.execute(
            &format!(
                "INSERT INTO tickets ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                TICKET_COLUMNS
            ),
            params![
                ticket.id,
                ticket.project_id,
                ticket.title,
                ticket.description,
                ticket.ticket_type.as_str(),
                ticket.priority.as_str(),
                ticket.status.as_str(),
                ticket.category,
                ticket.feature_id,
                ticket.estimated_hours,
                ticket.actual_hours,
                ticket.order_index,
                affected_files,
                acceptance_criteria,
                ticket.assignee,
                ticket.branch_name,
                ticket.pr_url,
                ticket.commit_count,
                ticket.created_at.to_rfc3339(),
                ticket.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}

/// Parse a TEXT column holding one of the string enums.
pub(crate) fn parse_column<T>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = String>,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

pub(crate) fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

impl TicketStore for SqliteTicketStore {
    fn get(&self, id: &str) -> Result<Option<Ticket>, TicketError> {
        let conn = self.lock();
        match Self::fetch_ticket(&conn, id) {
            Ok(ticket) => Ok(Some(ticket)),
            Err(TicketError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn list(&self, filter: &TicketFilter) -> Result<Vec<Ticket>, TicketError> {
        let conn = self.lock();

        let (where_clause, params) = Self::build_where_clause(filter);

        let sql = format!(
            "SELECT {} FROM tickets {} ORDER BY order_index IS NULL, order_index ASC, created_at ASC LIMIT ? OFFSET ?",
            TICKET_COLUMNS, where_clause
        );

        let mut stmt = conn.prepare(&sql)?;

        let mut all_params: Vec<Box<dyn rusqlite::ToSql>> = params;
        all_params.push(Box::new(filter.limit));
        all_params.push(Box::new(filter.offset));

        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt.query_map(param_refs.as_slice(), Self::row_to_ticket)?;

        let mut tickets = Vec::new();
        for row_result in rows {
            tickets.push(row_result?);
        }

        Ok(tickets)
    }

    fn count(&self, filter: &TicketFilter) -> Result<i64, TicketError> {
        let conn = self.lock();

        let (where_clause, params) = Self::build_where_clause(filter);

        let sql = format!("SELECT COUNT(*) FROM tickets {}", where_clause);

        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let count: i64 = conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))?;

        Ok(count)
    }

    fn dependencies(&self, ticket_id: &str) -> Result<Vec<DependencyEdge>, TicketError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT ticket_id, depends_on_ticket_id, kind FROM ticket_dependencies WHERE ticket_id = ? ORDER BY rowid",
        )?;
        let edges = stmt
            .query_map(params![ticket_id], Self::row_to_edge)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(edges)
    }

    fn edges_for_project(&self, project_id: &str) -> Result<Vec<DependencyEdge>, TicketError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT ticket_id, depends_on_ticket_id, kind FROM ticket_dependencies WHERE project_id = ? ORDER BY rowid",
        )?;
        let edges = stmt
            .query_map(params![project_id], Self::row_to_edge)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(edges)
    }

    fn contexts_for_project(
        &self,
        project_id: &str,
    ) -> Result<Vec<ContextSnapshot>, TicketError> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare("SELECT payload FROM project_contexts WHERE project_id = ? ORDER BY rowid")?;
        let payloads = stmt
            .query_map(params![project_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        payloads
            .iter()
            .map(|json| {
                serde_json::from_str(json).map_err(|e| TicketError::Database(e.to_string()))
            })
            .collect()
    }

    fn update_status(
        &self,
        id: &str,
        status: TicketStatus,
    ) -> Result<StatusTransition, TicketError> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;

        let current = Self::fetch_ticket(&tx, id)?;

        if !current.status.can_transition_to(status) {
            return Err(TicketError::InvalidState {
                ticket_id: id.to_string(),
                current_state: current.status.to_string(),
                operation: format!("move to {}", status),
            });
        }

        let now = Utc::now();
        tx.execute(
            "UPDATE tickets SET status = ?, updated_at = ? WHERE id = ?",
            params![status.as_str(), now.to_rfc3339(), id],
        )?;

        if status == TicketStatus::Completed {
            tx.execute(
                "UPDATE projects SET completed_tickets = completed_tickets + 1, updated_at = ? WHERE id = ?",
                params![now.to_rfc3339(), current.project_id],
            )?;
        }

        tx.commit()?;

        let previous = current.status;
        Ok(StatusTransition {
            previous,
            ticket: Ticket {
                status,
                updated_at: now,
                ..current
            },
        })
    }

    fn assign(&self, id: &str, assignee: &str) -> Result<StatusTransition, TicketError> {
        let conn = self.lock();

        let current = Self::fetch_ticket(&conn, id)?;

        if current.status.is_terminal() {
            return Err(TicketError::InvalidState {
                ticket_id: id.to_string(),
                current_state: current.status.to_string(),
                operation: "assign".to_string(),
            });
        }

        let status = match current.status {
            TicketStatus::Pending | TicketStatus::Ready => TicketStatus::Assigned,
            other => other,
        };

        let now = Utc::now();
        conn.execute(
            "UPDATE tickets SET assignee = ?, status = ?, updated_at = ? WHERE id = ?",
            params![assignee, status.as_str(), now.to_rfc3339(), id],
        )?;

        let previous = current.status;
        Ok(StatusTransition {
            previous,
            ticket: Ticket {
                assignee: Some(assignee.to_string()),
                status,
                updated_at: now,
                ..current
            },
        })
    }

    fn apply_patch(&self, id: &str, patch: &TicketPatch) -> Result<Ticket, TicketError> {
        if patch.is_empty() {
            return Err(TicketError::Validation("patch sets no fields".to_string()));
        }

        let conn = self.lock();

        let mut ticket = Self::fetch_ticket(&conn, id)?;
        patch.apply(&mut ticket);
        ticket.updated_at = Utc::now();

        conn.execute(
            "UPDATE tickets SET title = ?, description = ?, priority = ?, estimated_hours = ?, actual_hours = ?, branch_name = ?, pr_url = ?, commit_count = ?, updated_at = ? WHERE id = ?",
            params![
                ticket.title,
                ticket.description,
                ticket.priority.as_str(),
                ticket.estimated_hours,
                ticket.actual_hours,
                ticket.branch_name,
                ticket.pr_url,
                ticket.commit_count,
                ticket.updated_at.to_rfc3339(),
                id,
            ],
        )?;

        Ok(ticket)
    }
}
