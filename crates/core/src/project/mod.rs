//! Projects: the aggregate tickets are generated for.

mod sqlite;
mod store;
mod types;

pub use store::{GenerationCommit, ProjectStore, ProjectTransition};
pub use types::{AnalysisSummary, Project, ProjectStatus};
