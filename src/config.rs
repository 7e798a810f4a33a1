// dirpub/src/config.rs

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

use crate::bridge::BridgeOptions;

/// Everything needed to run the bridge: where files come from and where
/// messages go.
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    pub source: SourceSettings,
    pub kafka: KafkaSettings,
}

impl BridgeConfig {
    pub fn options(&self) -> BridgeOptions {
        BridgeOptions {
            directory: self.source.message_location.clone(),
            topic: self.kafka.topic.clone(),
            run_once: self.source.run_once,
            delay: Duration::from_millis(self.source.delay_ms),
            delete_on_success: self.source.delete_files,
        }
    }

    pub fn trace_loaded(&self) {
        info!(
            message_location = %self.source.message_location.display(),
            delay_ms = self.source.delay_ms,
            run_once = self.source.run_once,
            delete_files = self.source.delete_files,
            topic = %self.kafka.topic,
            bootstrap_servers = %self.kafka.bootstrap_servers,
            secure = self.kafka.security.is_some(),
            "Loaded BridgeConfig"
        );
        debug!(?self, "BridgeConfig loaded (full debug)");
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceSettings {
    /// Directory polled for drop files.
    pub message_location: PathBuf,
    /// Wait between polls.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    #[serde(default)]
    pub run_once: bool,
    /// Remove a file once its message is acknowledged.
    #[serde(default = "default_true")]
    pub delete_files: bool,
}

/// Producer settings. Field names follow the librdkafka properties they map to.
#[derive(Debug, Clone, Deserialize)]
pub struct KafkaSettings {
    pub topic: String,
    /// Comma-separated `host:port` list.
    pub bootstrap_servers: String,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    /// How many replicas must receive a message: `0`, `1`, `all` (or `-1`).
    #[serde(default = "default_acks")]
    pub acks: String,
    #[serde(default)]
    pub retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: u32,
    #[serde(default = "default_batch_size_bytes")]
    pub batch_size_bytes: u32,
    #[serde(default)]
    pub linger_ms: u64,
    #[serde(default = "default_message_timeout_ms")]
    pub message_timeout_ms: u64,
    #[serde(default = "default_flush_timeout_ms")]
    pub flush_timeout_ms: u64,
    #[serde(default)]
    pub security: Option<SecuritySettings>,
}

impl KafkaSettings {
    pub fn message_timeout(&self) -> Duration {
        Duration::from_millis(self.message_timeout_ms)
    }

    pub fn flush_timeout(&self) -> Duration {
        Duration::from_millis(self.flush_timeout_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityProtocol {
    Plaintext,
    Ssl,
    SaslPlaintext,
    SaslSsl,
}

impl SecurityProtocol {
    pub fn as_str(self) -> &'static str {
        match self {
            SecurityProtocol::Plaintext => "plaintext",
            SecurityProtocol::Ssl => "ssl",
            SecurityProtocol::SaslPlaintext => "sasl_plaintext",
            SecurityProtocol::SaslSsl => "sasl_ssl",
        }
    }
}

#[derive(Clone, Deserialize)]
pub struct SecuritySettings {
    pub protocol: SecurityProtocol,
    #[serde(default)]
    pub sasl_mechanism: Option<String>,
    #[serde(default)]
    pub sasl_username: Option<String>,
    /// Never read from the file; injected from the environment.
    #[serde(skip)]
    pub sasl_password: Option<String>,
    /// CA bundle used to verify the brokers.
    #[serde(default)]
    pub ssl_ca_location: Option<PathBuf>,
}

impl std::fmt::Debug for SecuritySettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecuritySettings")
            .field("protocol", &self.protocol)
            .field("sasl_mechanism", &self.sasl_mechanism)
            .field("sasl_username", &self.sasl_username)
            .field("sasl_password", &self.sasl_password.as_ref().map(|_| "<redacted>"))
            .field("ssl_ca_location", &self.ssl_ca_location)
            .finish()
    }
}

fn default_delay_ms() -> u64 {
    5000
}

fn default_true() -> bool {
    true
}

fn default_client_id() -> String {
    "dirpub.producer".to_string()
}

fn default_acks() -> String {
    "all".to_string()
}

fn default_retry_backoff_ms() -> u64 {
    100
}

fn default_max_in_flight() -> u32 {
    1
}

fn default_batch_size_bytes() -> u32 {
    16384
}

fn default_message_timeout_ms() -> u64 {
    30000
}

fn default_flush_timeout_ms() -> u64 {
    10000
}
