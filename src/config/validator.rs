use crate::config::{ProtocolConfig, SupervisorConfig};
use crate::error::{Error, Result};
use regex::Regex;
use std::time::Duration;

fn require_non_zero(name: &str, value: Duration) -> Result<()> {
    if value.is_zero() {
        return Err(Error::ConfigInvalid(format!("{} must be greater than zero", name)));
    }
    Ok(())
}

/// Validates the occupancy protocol settings
pub fn validate_protocol_config(config: &ProtocolConfig) -> Result<()> {
    if config.host.trim().is_empty() {
        return Err(Error::ConfigInvalid("protocol host is empty".to_string()));
    }
    if config.port == 0 {
        return Err(Error::ConfigInvalid("protocol port must not be 0".to_string()));
    }
    if config.password.is_empty() {
        return Err(Error::ConfigInvalid("protocol password is empty".to_string()));
    }
    if config.connect_retries == 0 {
        return Err(Error::ConfigInvalid(
            "protocol connectRetries must be at least 1".to_string(),
        ));
    }
    require_non_zero("protocol connectTimeout", config.connect_timeout)?;
    require_non_zero("protocol commandTimeout", config.command_timeout)?;
    if config.query_command.trim().is_empty() {
        return Err(Error::ConfigInvalid("protocol queryCommand is empty".to_string()));
    }

    let pattern = Regex::new(&config.occupancy_pattern).map_err(|e| {
        Error::ConfigInvalid(format!("protocol occupancyPattern does not compile: {}", e))
    })?;
    if pattern.captures_len() < 2 {
        return Err(Error::ConfigInvalid(
            "protocol occupancyPattern needs a capture group for the count".to_string(),
        ));
    }

    Ok(())
}

/// Full configuration validation
pub fn validate_config(config: &SupervisorConfig) -> Result<()> {
    if config.service_name.trim().is_empty() {
        return Err(Error::ConfigInvalid("serviceName is empty".to_string()));
    }
    require_non_zero("pollInterval", config.poll_interval)?;
    require_non_zero("shutdownDelay", config.shutdown_delay)?;
    require_non_zero("backendTimeout", config.backend_timeout)?;

    validate_protocol_config(&config.protocol)?;

    if let Some(http) = &config.http {
        if http.workers == Some(0) {
            return Err(Error::ConfigInvalid("http workers must be at least 1".to_string()));
        }
    }

    Ok(())
}
