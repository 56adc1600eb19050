use super::{types::Config, AuthMethod, ConfigError, ExtractorMode};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Signed-token auth has a secret
/// - Heartbeat timeout is longer than the heartbeat interval
/// - An LLM section exists when something needs it
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.auth.method == AuthMethod::SignedToken
        && config.auth.secret.as_deref().is_none_or(str::is_empty)
    {
        return Err(ConfigError::ValidationError(
            "auth.secret must be set when using signed_token auth".to_string(),
        ));
    }

    if config.sync.heartbeat_interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "sync.heartbeat_interval_ms cannot be 0".to_string(),
        ));
    }

    if config.sync.heartbeat_timeout_ms <= config.sync.heartbeat_interval_ms {
        return Err(ConfigError::ValidationError(
            "sync.heartbeat_timeout_ms must be greater than sync.heartbeat_interval_ms"
                .to_string(),
        ));
    }

    let needs_llm =
        config.generation.extractor == ExtractorMode::Llm || config.generation.enrich;
    if needs_llm && config.generation.llm.is_none() {
        return Err(ConfigError::ValidationError(
            "generation.llm is required when extractor = \"llm\" or enrich = true".to_string(),
        ));
    }

    Ok(())
}
