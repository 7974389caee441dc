use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Renderer command is set
/// - Connectivity host is set and the poll interval is not 0
/// - Stream batch size and freshness window are not 0
/// - Backward-jump threshold is a fraction in (0, 1]
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.renderer.command.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "renderer.command cannot be empty".to_string(),
        ));
    }

    if config.connectivity.host.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "connectivity.host cannot be empty".to_string(),
        ));
    }

    if config.connectivity.poll_interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "connectivity.poll_interval_ms cannot be 0".to_string(),
        ));
    }

    if config.stream.batch_size == 0 {
        return Err(ConfigError::ValidationError(
            "stream.batch_size cannot be 0".to_string(),
        ));
    }

    if config.crawl.freshness_hours == 0 {
        return Err(ConfigError::ValidationError(
            "crawl.freshness_hours cannot be 0".to_string(),
        ));
    }

    let threshold = config.direct.backward_jump_threshold;
    if !(threshold > 0.0 && threshold <= 1.0) {
        return Err(ConfigError::ValidationError(format!(
            "direct.backward_jump_threshold must be in (0, 1], got {}",
            threshold
        )));
    }

    Ok(())
}
