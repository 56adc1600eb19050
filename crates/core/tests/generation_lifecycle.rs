//! Generation lifecycle integration tests.
//!
//! These tests drive a project from creation through generation, ticket
//! work and regeneration against an on-disk store:
//! analyzing -> review -> approved -> in_progress

use std::sync::Arc;

use tempfile::TempDir;

use ticketwright_core::{
    testing::{fixtures, FailingEnricher, MockFeatureExtractor, RecordingNotifier},
    ExtractionOutcome, GenerationPipeline, GenerationRequest, HeuristicFeatureExtractor,
    ProjectStatus, ProjectStore, SqliteTicketStore, TicketFilter, TicketService, TicketStatus,
    TicketStore, TicketType,
};

struct TestHarness {
    store: Arc<SqliteTicketStore>,
    notifier: RecordingNotifier,
    extractor: MockFeatureExtractor,
    temp_dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = Arc::new(
            SqliteTicketStore::new(&temp_dir.path().join("test.db"))
                .expect("Failed to create ticket store"),
        );
        let extractor = MockFeatureExtractor::with_features(vec![
            fixtures::feature("f1", "Login", 8, &["src/auth/login.tsx", "src/auth/session.ts"]),
            fixtures::feature("f2", "Dashboard", 5, &["src/dashboard/Dashboard.tsx"]),
            fixtures::feature("f3", "API client", 2, &["src/api/client.ts"]),
        ]);

        Self {
            store,
            notifier: RecordingNotifier::new(),
            extractor,
            temp_dir,
        }
    }

    fn pipeline(&self) -> GenerationPipeline {
        GenerationPipeline::new(self.store.clone())
            .with_extractor(Arc::new(self.extractor.clone()))
            .with_notifier(Arc::new(self.notifier.clone()))
    }

    fn service(&self) -> TicketService {
        TicketService::new(
            self.store.clone(),
            self.store.clone(),
            Arc::new(self.notifier.clone()),
        )
    }

    fn project(&self) -> String {
        self.store
            .create_project("Portal", "Customer portal prototype")
            .expect("Failed to create project")
            .id
    }
}

#[tokio::test]
async fn test_full_project_lifecycle() {
    let h = TestHarness::new();
    let project_id = h.project();

    let outcome = h
        .pipeline()
        .run(GenerationRequest::new(&project_id, fixtures::web_manifest()))
        .await;
    assert!(outcome.is_success(), "{:?}", outcome.error);
    assert_eq!(outcome.tickets.len(), 4);
    assert_eq!(
        h.notifier.event_types().await.last(),
        Some(&"project_status_changed")
    );

    let service = h.service();
    let project = service
        .update_project_status(&project_id, ProjectStatus::Approved)
        .await
        .unwrap();
    assert_eq!(project.status, ProjectStatus::Approved);

    let setup = &outcome.tickets[0];
    service.assign(&setup.id, "dana", "lead").await.unwrap();
    service
        .update_status(&setup.id, TicketStatus::InProgress, "dana")
        .await
        .unwrap();
    service
        .update_status(&setup.id, TicketStatus::Completed, "dana")
        .await
        .unwrap();

    let project = h.store.get_project(&project_id).unwrap().unwrap();
    assert_eq!(project.total_tickets, 4);
    assert_eq!(project.completed_tickets, 1);

    let in_progress = h
        .store
        .count(&TicketFilter::for_project(&project_id).with_status(TicketStatus::Completed))
        .unwrap();
    assert_eq!(in_progress, 1);
}

#[tokio::test]
async fn test_generation_survives_reopen() {
    let h = TestHarness::new();
    let project_id = h.project();

    let outcome = h
        .pipeline()
        .run(GenerationRequest::new(&project_id, fixtures::web_manifest()))
        .await;
    assert!(outcome.is_success());

    let reopened = SqliteTicketStore::new(&h.temp_dir.path().join("test.db")).unwrap();

    let tickets = reopened.list(&TicketFilter::for_project(&project_id)).unwrap();
    let ids: Vec<_> = tickets.iter().map(|t| t.id.as_str()).collect();
    let expected: Vec<_> = outcome.tickets.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, expected);

    let edges = reopened.edges_for_project(&project_id).unwrap();
    assert!(edges.len() >= 3, "every feature ticket depends on setup");

    let contexts = reopened.contexts_for_project(&project_id).unwrap();
    let kinds: Vec<_> = contexts.iter().map(|c| c.context_type()).collect();
    assert!(kinds.contains(&"tech_stack"));
    assert!(kinds.contains(&"dependency_analysis"));

    let project = reopened.get_project(&project_id).unwrap().unwrap();
    let summary = project.analysis_result.unwrap();
    assert_eq!(summary.ticket_count, 4);
    assert_eq!(summary.feature_count, 3);
    assert_eq!(summary.critical_path, outcome.critical_path);
}

#[tokio::test]
async fn test_regeneration_replaces_previous_run() {
    let h = TestHarness::new();
    let project_id = h.project();
    let pipeline = h.pipeline();

    let first = pipeline
        .run(GenerationRequest::new(&project_id, fixtures::web_manifest()))
        .await;
    assert_eq!(first.tickets.len(), 4);

    h.extractor.set_outcome(ExtractionOutcome::Unavailable).await;
    let second = pipeline
        .run(GenerationRequest::new(&project_id, fixtures::web_manifest()))
        .await;
    assert!(second.fallback);

    let tickets = h.store.list(&TicketFilter::for_project(&project_id)).unwrap();
    assert_eq!(tickets.len(), 1);
    assert_eq!(tickets[0].ticket_type, TicketType::Setup);
    assert!(first.tickets.iter().all(|t| t.id != tickets[0].id));
    assert!(h.store.edges_for_project(&project_id).unwrap().is_empty());
}

#[tokio::test]
async fn test_failing_enricher_keeps_synthesized_tickets() {
    let h = TestHarness::new();
    let project_id = h.project();

    let outcome = h
        .pipeline()
        .with_enricher(Arc::new(FailingEnricher::new()))
        .run(GenerationRequest::new(&project_id, fixtures::web_manifest()))
        .await;

    assert!(outcome.is_success());
    assert_eq!(outcome.tickets.len(), 4);
}

#[tokio::test]
async fn test_enricher_that_drops_tickets_is_ignored() {
    let h = TestHarness::new();
    let project_id = h.project();

    let outcome = h
        .pipeline()
        .with_enricher(Arc::new(FailingEnricher::dropping_tickets()))
        .run(GenerationRequest::new(&project_id, fixtures::web_manifest()))
        .await;

    assert!(outcome.is_success());
    assert_eq!(outcome.tickets.len(), 4);
}

#[tokio::test]
async fn test_heuristic_extractor_end_to_end() {
    let h = TestHarness::new();
    let project_id = h.project();

    let outcome = GenerationPipeline::new(h.store.clone())
        .with_extractor(Arc::new(HeuristicFeatureExtractor::new()))
        .run(GenerationRequest::new(&project_id, fixtures::web_manifest()))
        .await;

    assert!(outcome.is_success(), "{:?}", outcome.error);
    assert!(!outcome.fallback);
    assert!(outcome.tickets[0].is_setup());
    assert!(outcome
        .tickets
        .iter()
        .any(|t| t.ticket_type == TicketType::Feature));

    let project = h.store.get_project(&project_id).unwrap().unwrap();
    let summary = project.analysis_result.unwrap();
    assert!(summary.tech_stack.iter().any(|s| s == "typescript"));
}

#[tokio::test]
async fn test_failed_run_leaves_project_analyzing() {
    let h = TestHarness::new();
    let project_id = h.project();

    let outcome = h
        .pipeline()
        .run(GenerationRequest::new(&project_id, fixtures::manifest(&[])))
        .await;

    assert!(!outcome.is_success());
    let project = h.store.get_project(&project_id).unwrap().unwrap();
    assert_eq!(project.status, ProjectStatus::Analyzing);
    assert!(project.analysis_error.is_some());
    assert_eq!(
        h.store.count(&TicketFilter::for_project(&project_id)).unwrap(),
        0
    );
}
