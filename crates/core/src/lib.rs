pub mod auth;
pub mod config;
pub mod extraction;
pub mod generation;
pub mod graph;
pub mod metrics;
pub mod project;
pub mod service;
pub mod sync;
pub mod testing;
pub mod ticket;

pub use auth::{
    create_authenticator, AuthError, AuthRequest, Authenticator, Identity, NoneAuthenticator,
    SignedTokenAuthenticator,
};
pub use config::{
    load_config, load_config_from_str, validate_config, AuthMethod, Config, ConfigError,
    ExtractorMode, SanitizedConfig,
};
pub use extraction::{
    create_llm_client, ExtractionOutcome, Feature, FeatureAnalysis, FeatureExtractor,
    FileManifest, HeuristicFeatureExtractor, LlmFeatureExtractor,
};
pub use generation::{
    create_pipeline, ContextSnapshot, GenerationError, GenerationOutcome, GenerationPipeline, GenerationRequest,
    LlmTicketEnricher, PassthroughEnricher, TicketEnricher, TicketSynthesizer,
};
pub use graph::{analyze_dependencies, DependencyAnalysis, DependencyGraph, GraphError};
pub use project::{Project, ProjectStatus, ProjectStore};
pub use service::{ServiceError, TicketService};
pub use sync::{
    create_sync_system, ConnectionStats, SqliteConnectionSnapshotStore, SyncActor, SyncHandle,
    SyncNotifier,
};
pub use ticket::{
    SqliteTicketStore, Ticket, TicketError, TicketFilter, TicketPatch, TicketStatus, TicketStore,
    TicketType,
};
