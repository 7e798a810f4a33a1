//! `load_config` module: loads the static YAML config and injects secrets from the environment.
//!
//! # Responsibilities
//! - Parse the user-supplied YAML file into [`BridgeConfig`]
//! - Inject the SASL password from `DIRPUB_SASL_PASSWORD` (it is never read from the file)
//! - Reject configurations the bridge cannot run with, before anything is polled or sent
//!
//! # Errors
//! All errors use `anyhow::Error` and are surfaced at the CLI boundary.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{error, info};

use crate::config::BridgeConfig;

pub const SASL_PASSWORD_ENV: &str = "DIRPUB_SASL_PASSWORD";

const VALID_ACKS: [&str; 4] = ["0", "1", "all", "-1"];

/// Loads a static YAML config file (no secrets) and injects required env vars for secrets.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<BridgeConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let mut config: BridgeConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    inject_secrets(&mut config)?;
    validate(&config)?;

    config.trace_loaded();
    Ok(config)
}

fn inject_secrets(config: &mut BridgeConfig) -> Result<()> {
    let Some(security) = config.kafka.security.as_mut() else {
        return Ok(());
    };
    if security.sasl_username.is_none() {
        return Ok(());
    }

    let password = std::env::var(SASL_PASSWORD_ENV).with_context(|| {
        error!(var = SASL_PASSWORD_ENV, "SASL password environment variable not set");
        format!("{SASL_PASSWORD_ENV} environment variable not set (required by sasl_username)")
    })?;
    info!(password_len = password.len(), "SASL password found in env");
    security.sasl_password = Some(password);
    Ok(())
}

fn validate(config: &BridgeConfig) -> Result<()> {
    if config.source.message_location.as_os_str().is_empty() {
        anyhow::bail!("source.message_location must not be empty");
    }
    if config.kafka.topic.trim().is_empty() {
        anyhow::bail!("kafka.topic must not be blank");
    }
    if config.kafka.bootstrap_servers.trim().is_empty() {
        anyhow::bail!("kafka.bootstrap_servers must not be blank");
    }
    if !VALID_ACKS.contains(&config.kafka.acks.as_str()) {
        error!(acks = %config.kafka.acks, "Unsupported kafka.acks in config");
        anyhow::bail!(
            "Unsupported kafka.acks: {} (expected one of 0, 1, all, -1)",
            config.kafka.acks
        );
    }
    if let Some(security) = &config.kafka.security {
        if security.sasl_mechanism.is_some() && security.sasl_username.is_none() {
            anyhow::bail!("kafka.security.sasl_mechanism requires sasl_username");
        }
    }
    Ok(())
}
