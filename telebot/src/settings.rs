//! Typed settings layer: webhook port, TLS cert/key paths, worker count,
//! state-file path, rule/chat config path, upstream base URL and the bot
//! token. Read once at startup from a single YAML file into one typed
//! struct rather than scattered environment lookups.

use serde::Deserialize;

use crate::error::BotError;

fn default_worker_count() -> usize {
    1
}

fn default_upstream_base_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_state_file() -> String {
    "state.yaml".to_string()
}

fn default_config_path() -> String {
    "config.yaml".to_string()
}

fn default_queue_poll_ms() -> u64 {
    50
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Telegram bot API token, as used in `https://api.telegram.org/bot<TOKEN>/...`.
    pub bot_token: String,

    /// TCP port the webhook TLS listener binds on, `0.0.0.0`.
    pub webhook_port: u16,
    /// PEM-encoded X.509 certificate chain presented to webhook clients.
    pub tls_cert_path: String,
    /// PEM-encoded PKCS8 RSA private key matching `tls_cert_path`.
    pub tls_key_path: String,

    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    #[serde(default = "default_config_path")]
    pub config_path: String,

    #[serde(default = "default_state_file")]
    pub state_file: String,

    #[serde(default = "default_upstream_base_url")]
    pub upstream_base_url: String,

    #[serde(default = "default_queue_poll_ms")]
    pub queue_poll_ms: u64,
}

impl Settings {
    pub fn load(path: &str) -> Result<Self, BotError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| BotError::Settings(format!("could not read '{path}': {e}")))?;
        serde_yaml::from_str(&raw).map_err(|e| BotError::Settings(format!("malformed settings file '{path}': {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_document_fills_in_defaults() {
        let yaml = r#"
bot_token: "123:abc"
webhook_port: 8443
tls_cert_path: cert.pem
tls_key_path: key.pem
"#;
        let settings: Settings = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(settings.worker_count, 1);
        assert_eq!(settings.upstream_base_url, "https://api.telegram.org");
        assert_eq!(settings.state_file, "state.yaml");
    }

    #[test]
    fn explicit_values_override_defaults() {
        let yaml = r#"
bot_token: "123:abc"
webhook_port: 8443
tls_cert_path: cert.pem
tls_key_path: key.pem
worker_count: 4
upstream_base_url: "http://127.0.0.1:8081"
"#;
        let settings: Settings = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(settings.worker_count, 4);
        assert_eq!(settings.upstream_base_url, "http://127.0.0.1:8081");
    }
}
