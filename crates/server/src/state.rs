use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use ticketwright_core::{
    Authenticator, Config, GenerationPipeline, ProjectStore, SanitizedConfig, SyncHandle,
    TicketService, TicketStore,
};

/// Shared application state
pub struct AppState {
    config: Config,
    authenticator: Arc<dyn Authenticator>,
    ticket_store: Arc<dyn TicketStore>,
    project_store: Arc<dyn ProjectStore>,
    pipeline: Arc<GenerationPipeline>,
    service: TicketService,
    sync: SyncHandle,
    /// Projects with a generation run in progress.
    generating: Mutex<HashSet<String>>,
}

impl AppState {
    pub fn new(
        config: Config,
        authenticator: Arc<dyn Authenticator>,
        ticket_store: Arc<dyn TicketStore>,
        project_store: Arc<dyn ProjectStore>,
        pipeline: Arc<GenerationPipeline>,
        sync: SyncHandle,
    ) -> Self {
        let service = TicketService::new(
            Arc::clone(&ticket_store),
            Arc::clone(&project_store),
            Arc::new(sync.clone()),
        );
        Self {
            config,
            authenticator,
            ticket_store,
            project_store,
            pipeline,
            service,
            sync,
            generating: Mutex::new(HashSet::new()),
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn authenticator(&self) -> &dyn Authenticator {
        self.authenticator.as_ref()
    }

    pub fn ticket_store(&self) -> &dyn TicketStore {
        self.ticket_store.as_ref()
    }

    pub fn project_store(&self) -> &dyn ProjectStore {
        self.project_store.as_ref()
    }

    pub fn pipeline(&self) -> &GenerationPipeline {
        self.pipeline.as_ref()
    }

    pub fn service(&self) -> &TicketService {
        &self.service
    }

    pub fn sync(&self) -> &SyncHandle {
        &self.sync
    }

    /// Claim the generation slot for a project. Returns `None` when a run is
    /// already in progress for it.
    pub fn try_begin_generation(&self, project_id: &str) -> Option<GenerationGuard<'_>> {
        let mut generating = self.generating.lock().unwrap();
        if !generating.insert(project_id.to_string()) {
            return None;
        }
        Some(GenerationGuard {
            state: self,
            project_id: project_id.to_string(),
        })
    }

    pub fn generations_in_flight(&self) -> usize {
        self.generating.lock().unwrap().len()
    }
}

/// Releases the project's generation slot when dropped.
pub struct GenerationGuard<'a> {
    state: &'a AppState,
    project_id: String,
}

impl Drop for GenerationGuard<'_> {
    fn drop(&mut self) {
        self.state
            .generating
            .lock()
            .unwrap()
            .remove(&self.project_id);
    }
}
