use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub auth: AuthConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub method: AuthMethod,
    /// HMAC secret for signed tokens (required when method = "signed_token").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    None,
    SignedToken,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("ticketwright.db")
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

/// Real-time sync coordinator configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SyncConfig {
    /// Interval between heartbeat ticks.
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_ms: u64,
    /// A connection silent for longer than this is evicted at the next tick.
    #[serde(default = "default_heartbeat_timeout")]
    pub heartbeat_timeout_ms: u64,
    /// How often connection metadata is snapshotted (0 = never).
    #[serde(default = "default_snapshot_interval")]
    pub snapshot_interval_ms: u64,
    /// Capacity of the coordinator command channel.
    #[serde(default = "default_command_buffer")]
    pub command_buffer: usize,
}

impl SyncConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.heartbeat_timeout_ms)
    }

    pub fn snapshot_interval(&self) -> Option<Duration> {
        (self.snapshot_interval_ms > 0).then(|| Duration::from_millis(self.snapshot_interval_ms))
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: default_heartbeat_interval(),
            heartbeat_timeout_ms: default_heartbeat_timeout(),
            snapshot_interval_ms: default_snapshot_interval(),
            command_buffer: default_command_buffer(),
        }
    }
}

fn default_heartbeat_interval() -> u64 {
    30_000
}

fn default_heartbeat_timeout() -> u64 {
    60_000
}

fn default_snapshot_interval() -> u64 {
    60_000
}

fn default_command_buffer() -> usize {
    1024
}

/// Which feature extractor the generation pipeline uses.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExtractorMode {
    /// No extractor; every run takes the setup-only fallback path.
    None,
    /// Directory-grouping heuristics, works offline.
    #[default]
    Heuristic,
    /// LLM-backed extraction.
    Llm,
}

/// LLM provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    Anthropic,
    Ollama,
}

/// LLM client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Custom API base URL (for proxies or self-hosted).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_llm_timeout() -> u32 {
    30
}

fn default_max_tokens() -> u32 {
    4096
}

/// Ticket generation configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default)]
    pub extractor: ExtractorMode,
    /// Run LLM enrichment of ticket descriptions during finalization.
    #[serde(default)]
    pub enrich: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm: Option<LlmConfig>,
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub auth: SanitizedAuthConfig,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub sync: SyncConfig,
    pub generation: SanitizedGenerationConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedAuthConfig {
    pub method: AuthMethod,
    pub secret_configured: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedGenerationConfig {
    pub extractor: ExtractorMode,
    pub enrich: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm: Option<SanitizedLlmConfig>,
}

/// Sanitized LLM config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedLlmConfig {
    pub provider: LlmProvider,
    pub model: String,
    pub api_key_configured: bool,
    pub api_base: Option<String>,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            auth: SanitizedAuthConfig {
                method: config.auth.method,
                secret_configured: config.auth.secret.as_deref().is_some_and(|s| !s.is_empty()),
            },
            server: config.server.clone(),
            database: config.database.clone(),
            sync: config.sync.clone(),
            generation: SanitizedGenerationConfig {
                extractor: config.generation.extractor,
                enrich: config.generation.enrich,
                llm: config.generation.llm.as_ref().map(|llm| SanitizedLlmConfig {
                    provider: llm.provider,
                    model: llm.model.clone(),
                    api_key_configured: llm.api_key.as_deref().is_some_and(|k| !k.is_empty()),
                    api_base: llm.api_base.clone(),
                }),
            },
        }
    }
}
