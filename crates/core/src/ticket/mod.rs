//! Development tickets and their dependency edges.

mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::SqliteTicketStore;
pub(crate) use sqlite_store::{parse_column, parse_timestamp};
pub use store::{StatusTransition, TicketError, TicketFilter, TicketStore};
pub use types::{
    AcceptanceCriterion, AffectedFile, ChangeKind, DependencyEdge, DependencyKind, Priority,
    Ticket, TicketPatch, TicketStatus, TicketType,
};
