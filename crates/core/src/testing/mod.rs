//! Testing utilities and mock collaborators.
//!
//! These stand in for the feature extractor, the enricher and the
//! notification transport so the pipeline and service layer can be exercised
//! without an LLM or live sockets.
//!
//! # Example
//!
//! ```rust,ignore
//! use ticketwright_core::testing::{fixtures, MockFeatureExtractor, RecordingNotifier};
//!
//! let extractor = MockFeatureExtractor::with_features(vec![
//!     fixtures::feature("f1", "Login form", 6, &["src/auth/login.tsx"]),
//! ]);
//! let notifier = RecordingNotifier::new();
//! ```

mod mock_enricher;
mod mock_extractor;
mod recording_notifier;

pub use mock_enricher::FailingEnricher;
pub use mock_extractor::MockFeatureExtractor;
pub use recording_notifier::RecordingNotifier;

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::extraction::{Feature, FeatureAnalysis, FileManifest};
    use crate::ticket::{AffectedFile, ChangeKind, Priority, Ticket, TicketType};

    /// A feature with the given files and a derived description.
    pub fn feature(id: &str, name: &str, complexity: u8, files: &[&str]) -> Feature {
        Feature::new(id, name, complexity)
            .with_description(format!("{} for the prototype", name))
            .with_files(files.iter().copied())
    }

    /// A feature analysis with the given features and a typical web stack.
    pub fn analysis(features: Vec<Feature>) -> FeatureAnalysis {
        FeatureAnalysis {
            features,
            tech_stack: vec!["typescript".to_string(), "react".to_string()],
            overall_complexity: Some(6),
        }
    }

    pub fn manifest(paths: &[&str]) -> FileManifest {
        FileManifest::new(paths.iter().copied())
    }

    /// A small React prototype.
    pub fn web_manifest() -> FileManifest {
        manifest(&[
            "package.json",
            "tsconfig.json",
            "src/auth/login.tsx",
            "src/auth/session.ts",
            "src/dashboard/Dashboard.tsx",
            "src/dashboard/widgets.ts",
            "src/api/client.ts",
        ])
    }

    /// A pending candidate ticket touching `files`.
    pub fn ticket(project_id: &str, title: &str, ticket_type: TicketType, files: &[&str]) -> Ticket {
        let mut ticket = Ticket::candidate(
            project_id,
            title,
            format!("{} description", title),
            ticket_type,
            Priority::Medium,
        );
        ticket.affected_files = files
            .iter()
            .map(|f| AffectedFile::new(*f, "fixture", ChangeKind::Modify))
            .collect();
        ticket
    }
}
