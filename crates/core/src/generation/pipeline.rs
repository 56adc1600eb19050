//! The generation pipeline state machine.
//!
//! A run moves the project `analyzing -> review` on success. Any error leaves
//! it in `analyzing` with the error recorded on the project; nothing from a
//! failed run is persisted because every write happens in the final phase.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use super::{
    preserves_structure, stage_contexts, ContextSnapshot, GenerationError, PassthroughEnricher,
    TicketEnricher, TicketSynthesizer,
};
use crate::extraction::{ExtractionOutcome, FeatureAnalysis, FeatureExtractor, FileManifest};
use crate::graph::{analyze_dependencies, DependencyAnalysis, GraphError};
use crate::metrics;
use crate::project::{AnalysisSummary, GenerationCommit, ProjectStatus, ProjectStore};
use crate::sync::SyncNotifier;
use crate::ticket::Ticket;

/// Input for one generation run.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub project_id: String,
    pub manifest: FileManifest,
    /// Overrides the project's stored description for this run.
    pub description: Option<String>,
}

impl GenerationRequest {
    pub fn new(project_id: impl Into<String>, manifest: FileManifest) -> Self {
        Self {
            project_id: project_id.into(),
            manifest,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Result of a run. Never an `Err`: failures are carried in `error`.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub project_id: String,
    pub status: ProjectStatus,
    /// Persisted tickets in execution order. Empty on failure.
    pub tickets: Vec<Ticket>,
    pub critical_path: Vec<String>,
    /// True when feature extraction produced nothing and only the setup
    /// ticket was generated.
    pub fallback: bool,
    pub error: Option<GenerationError>,
}

impl GenerationOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    fn failed(project_id: &str, error: GenerationError) -> Self {
        Self {
            project_id: project_id.to_string(),
            status: ProjectStatus::Analyzing,
            tickets: Vec::new(),
            critical_path: Vec::new(),
            fallback: false,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationPhase {
    IngestManifest,
    DetectFeatures,
    SynthesizeTickets,
    BuildGraph,
    ResolveConflicts,
    StageContext,
    OrderTickets,
    Finalize,
    Persist,
}

impl GenerationPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationPhase::IngestManifest => "ingest_manifest",
            GenerationPhase::DetectFeatures => "detect_features",
            GenerationPhase::SynthesizeTickets => "synthesize_tickets",
            GenerationPhase::BuildGraph => "build_graph",
            GenerationPhase::ResolveConflicts => "resolve_conflicts",
            GenerationPhase::StageContext => "stage_context",
            GenerationPhase::OrderTickets => "order_tickets",
            GenerationPhase::Finalize => "finalize",
            GenerationPhase::Persist => "persist",
        }
    }

    /// 1-based position in the run.
    pub fn number(&self) -> u8 {
        *self as u8 + 1
    }
}

/// Drives the graph engine end to end for one project at a time.
///
/// Callers must not run two generations for the same project concurrently.
pub struct GenerationPipeline {
    projects: Arc<dyn ProjectStore>,
    extractor: Option<Arc<dyn FeatureExtractor>>,
    enricher: Arc<dyn TicketEnricher>,
    notifier: Option<Arc<dyn SyncNotifier>>,
    synthesizer: TicketSynthesizer,
    analyze: fn(&[Ticket]) -> Result<DependencyAnalysis, GraphError>,
}

impl GenerationPipeline {
    pub fn new(projects: Arc<dyn ProjectStore>) -> Self {
        Self {
            projects,
            extractor: None,
            enricher: Arc::new(PassthroughEnricher),
            notifier: None,
            synthesizer: TicketSynthesizer::new(),
            analyze: analyze_dependencies,
        }
    }

    /// Replace the graph phase, e.g. to feed the conflict check a cyclic graph.
    #[cfg(test)]
    pub(crate) fn with_graph_analyzer(
        mut self,
        analyze: fn(&[Ticket]) -> Result<DependencyAnalysis, GraphError>,
    ) -> Self {
        self.analyze = analyze;
        self
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn FeatureExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn with_enricher(mut self, enricher: Arc<dyn TicketEnricher>) -> Self {
        self.enricher = enricher;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn SyncNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Run all nine phases for `request.project_id`.
    pub async fn run(&self, request: GenerationRequest) -> GenerationOutcome {
        let started = Instant::now();
        let project_id = request.project_id.clone();

        match self.execute(&request).await {
            Ok(outcome) => {
                let result = if outcome.fallback { "fallback" } else { "success" };
                record_run(result, started);
                metrics::TICKETS_GENERATED.inc_by(outcome.tickets.len() as u64);
                info!(
                    project_id = %project_id,
                    tickets = outcome.tickets.len(),
                    fallback = outcome.fallback,
                    critical_path_len = outcome.critical_path.len(),
                    "Generation completed"
                );
                outcome
            }
            Err(error) => {
                record_run("failed", started);
                if matches!(error, GenerationError::CyclicDependency { .. }) {
                    metrics::CYCLES_DETECTED.inc();
                }
                warn!(project_id = %project_id, code = error.code(), "Generation failed: {}", error);

                if !matches!(error, GenerationError::ProjectNotFound(_)) {
                    if let Err(e) = self
                        .projects
                        .mark_analysis_failed(&project_id, &error.to_string())
                    {
                        warn!(project_id = %project_id, "Failed to record generation error: {}", e);
                    }
                }
                GenerationOutcome::failed(&project_id, error)
            }
        }
    }

    async fn execute(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationOutcome, GenerationError> {
        let project = self
            .projects
            .get_project(&request.project_id)?
            .ok_or_else(|| GenerationError::ProjectNotFound(request.project_id.clone()))?;
        let project_id = project.id.as_str();

        let transition = self.projects.begin_analysis(project_id)?;
        if transition.previous != ProjectStatus::Analyzing {
            self.notify_project(project_id, transition.previous, ProjectStatus::Analyzing)
                .await;
        }
        let description = request
            .description
            .as_deref()
            .unwrap_or(project.description.as_str());

        enter(GenerationPhase::IngestManifest, project_id);
        if request.manifest.is_empty() {
            return Err(GenerationError::NoFiles);
        }

        enter(GenerationPhase::DetectFeatures, project_id);
        let analysis = self.detect_features(project_id, &request.manifest, description).await;
        let fallback = analysis.is_none();
        let features = analysis
            .as_ref()
            .map(|a| a.features.as_slice())
            .unwrap_or_default();

        enter(GenerationPhase::SynthesizeTickets, project_id);
        let mut tickets = self
            .synthesizer
            .synthesize(project_id, description, features)?;

        enter(GenerationPhase::BuildGraph, project_id);
        let dependencies = (self.analyze)(&tickets)?;

        enter(GenerationPhase::ResolveConflicts, project_id);
        if dependencies.has_circular_dependencies {
            return Err(GenerationError::CyclicDependency {
                cycles: dependencies.cycles,
            });
        }

        enter(GenerationPhase::StageContext, project_id);
        let contexts = stage_contexts(&request.manifest, analysis.as_ref(), &dependencies);

        enter(GenerationPhase::OrderTickets, project_id);
        assign_order(&mut tickets, &dependencies.sorted_tickets)?;

        enter(GenerationPhase::Finalize, project_id);
        let tickets = self.finalize(tickets, description).await;

        enter(GenerationPhase::Persist, project_id);
        let summary = AnalysisSummary {
            ticket_count: tickets.len(),
            feature_count: features.len(),
            critical_path: dependencies.critical_path.clone(),
            tech_stack: tech_stack_of(&contexts),
            overall_complexity: analysis.as_ref().and_then(|a| a.overall_complexity),
            fallback,
        };
        let commit = GenerationCommit {
            project_id: project_id.to_string(),
            tickets,
            edges: dependencies.graph.edges(),
            contexts,
            summary,
        };
        let saved = self.projects.commit_generation(&commit)?;
        self.notify_project(project_id, ProjectStatus::Analyzing, saved.status)
            .await;

        Ok(GenerationOutcome {
            project_id: saved.id,
            status: saved.status,
            tickets: commit.tickets,
            critical_path: dependencies.critical_path,
            fallback,
            error: None,
        })
    }

    async fn detect_features(
        &self,
        project_id: &str,
        manifest: &FileManifest,
        description: &str,
    ) -> Option<FeatureAnalysis> {
        let outcome = match &self.extractor {
            Some(extractor) => extractor.analyze(manifest, description).await,
            None => ExtractionOutcome::Unavailable,
        };
        match outcome {
            ExtractionOutcome::Extracted(analysis) => {
                debug!(
                    project_id = %project_id,
                    features = analysis.features.len(),
                    "Features extracted"
                );
                Some(analysis)
            }
            ExtractionOutcome::Unavailable => {
                info!(project_id = %project_id, "No feature extractor available, generating setup ticket only");
                None
            }
            ExtractionOutcome::Failed { reason } => {
                warn!(project_id = %project_id, reason = %reason, "Feature extraction failed, generating setup ticket only");
                None
            }
        }
    }

    async fn finalize(&self, tickets: Vec<Ticket>, description: &str) -> Vec<Ticket> {
        let enricher = self.enricher.name();
        match self.enricher.enrich(&tickets, description).await {
            Ok(enriched) if preserves_structure(&tickets, &enriched) => enriched,
            Ok(_) => {
                warn!(enricher, "Enricher changed ticket structure, keeping original tickets");
                tickets
            }
            Err(e) => {
                warn!(enricher, error = %e, "Ticket enrichment failed, keeping original tickets");
                tickets
            }
        }
    }

    async fn notify_project(&self, project_id: &str, old: ProjectStatus, new: ProjectStatus) {
        if let Some(notifier) = &self.notifier {
            notifier
                .broadcast_project_status_change(project_id, old, new)
                .await;
        }
    }
}

fn enter(phase: GenerationPhase, project_id: &str) {
    debug!(
        project_id = %project_id,
        phase = phase.as_str(),
        step = phase.number(),
        "Entering generation phase"
    );
}

fn record_run(result: &str, started: Instant) {
    metrics::GENERATION_RUNS.with_label_values(&[result]).inc();
    metrics::GENERATION_DURATION
        .with_label_values(&[result])
        .observe(started.elapsed().as_secs_f64());
}

/// Set each ticket's `order_index` to its rank in `sorted` and reorder the
/// list to match.
fn assign_order(tickets: &mut [Ticket], sorted: &[String]) -> Result<(), GenerationError> {
    let rank: HashMap<&str, usize> = sorted
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();

    for ticket in tickets.iter_mut() {
        let index = rank.get(ticket.id.as_str()).ok_or_else(|| {
            GenerationError::Validation(format!("ticket {} missing from sorted order", ticket.id))
        })?;
        ticket.order_index = Some(*index as u32);
    }
    tickets.sort_by_key(|t| t.order_index);
    Ok(())
}

fn tech_stack_of(contexts: &[ContextSnapshot]) -> Vec<String> {
    contexts
        .iter()
        .find_map(|c| match c {
            ContextSnapshot::TechStack { technologies, .. } => Some(technologies.clone()),
            _ => None,
        })
        .unwrap_or_default()
}
