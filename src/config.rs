//! Platform configuration as handed over by the host.
//!
//! Keys mirror the host's YAML/JSON platform block:
//! `username`, `password`, `url_api`, `scan_interval`, `unavailable_after`, `message_log`.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::client::{AirzoneClient, AirzoneClientBuilder};
use crate::logger::MessageLogMode;
use crate::protocol::DEFAULT_URL_API;
use crate::{Error, Result};

pub const DEFAULT_SCAN_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_UNAVAILABLE_AFTER: u32 = 3;

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MessageLogConfig {
    pub path: String,
    #[serde(default = "default_log_mode")]
    pub mode: MessageLogMode,
}

#[derive(Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PlatformConfig {
    pub username: String,
    pub password: String,
    #[serde(default = "default_url_api")]
    pub url_api: String,
    /// Poll cadence in seconds.
    #[serde(default = "default_scan_interval")]
    pub scan_interval: u64,
    /// Consecutive failed polls before an entity reports itself unavailable.
    #[serde(default = "default_unavailable_after")]
    pub unavailable_after: u32,
    #[serde(default)]
    pub message_log: Option<MessageLogConfig>,
}

fn default_url_api() -> String {
    DEFAULT_URL_API.to_string()
}

fn default_scan_interval() -> u64 {
    DEFAULT_SCAN_INTERVAL_SECS
}

fn default_unavailable_after() -> u32 {
    DEFAULT_UNAVAILABLE_AFTER
}

fn default_log_mode() -> MessageLogMode {
    MessageLogMode::Full
}

impl fmt::Debug for PlatformConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformConfig")
            .field("username", &self.username)
            .field("password", &"***")
            .field("url_api", &self.url_api)
            .field("scan_interval", &self.scan_interval)
            .field("unavailable_after", &self.unavailable_after)
            .field("message_log", &self.message_log)
            .finish()
    }
}

impl PlatformConfig {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            url_api: default_url_api(),
            scan_interval: DEFAULT_SCAN_INTERVAL_SECS,
            unavailable_after: DEFAULT_UNAVAILABLE_AFTER,
            message_log: None,
        }
    }

    pub fn from_value(value: Value) -> Result<Self> {
        let config: Self = serde_json::from_value(value)
            .map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(s).map_err(|e| Error::Config(e.to_string()))?;
        Self::from_value(value)
    }

    pub fn validate(&self) -> Result<()> {
        if self.username.trim().is_empty() {
            return Err(Error::Config("missing username".to_string()));
        }
        if self.password.is_empty() {
            return Err(Error::Config("missing password".to_string()));
        }
        if !(self.url_api.starts_with("http://") || self.url_api.starts_with("https://")) {
            return Err(Error::Config(format!(
                "url_api must be an http(s) URL, got {:?}",
                self.url_api
            )));
        }
        if self.scan_interval == 0 {
            return Err(Error::Config("scan_interval must be positive".to_string()));
        }
        if self.unavailable_after == 0 {
            return Err(Error::Config("unavailable_after must be positive".to_string()));
        }
        Ok(())
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval)
    }

    pub fn client_builder(&self) -> AirzoneClientBuilder {
        let builder = AirzoneClient::builder(&self.username, &self.password).url_api(&self.url_api);
        match &self.message_log {
            Some(log) => builder.message_log(log.mode, &log.path),
            None => builder,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_applied() {
        let config = PlatformConfig::from_value(json!({
            "username": "me@example.com",
            "password": "hunter2"
        }))
        .unwrap();
        assert_eq!(config.url_api, "https://www.airzonecloud.com");
        assert_eq!(config.scan_interval(), Duration::from_secs(10));
        assert_eq!(config.unavailable_after, 3);
        assert!(config.message_log.is_none());
        assert_eq!(config, PlatformConfig::new("me@example.com", "hunter2"));
    }

    #[test]
    fn overrides_applied() {
        let config = PlatformConfig::from_json_str(
            r#"{"username": "u", "password": "p", "url_api": "http://localhost:8080",
                "scan_interval": 30, "unavailable_after": 5,
                "message_log": {"path": "/tmp/airzone.ndjson", "mode": "diffed"}}"#,
        )
        .unwrap();
        assert_eq!(config.url_api, "http://localhost:8080");
        assert_eq!(config.scan_interval, 30);
        assert_eq!(config.unavailable_after, 5);
        assert_eq!(config.message_log.unwrap().mode, MessageLogMode::Diffed);
    }

    #[test]
    fn missing_credentials_rejected() {
        let err = PlatformConfig::from_value(json!({"username": "u"})).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        let err =
            PlatformConfig::from_value(json!({"username": " ", "password": "p"})).unwrap_err();
        assert!(err.to_string().contains("username"));
    }

    #[test]
    fn invalid_values_rejected() {
        let err = PlatformConfig::from_value(json!({
            "username": "u", "password": "p", "scan_interval": 0
        }))
        .unwrap_err();
        assert!(err.to_string().contains("scan_interval"));

        let err = PlatformConfig::from_value(json!({
            "username": "u", "password": "p", "url_api": "ftp://example.com"
        }))
        .unwrap_err();
        assert!(err.to_string().contains("url_api"));

        assert!(PlatformConfig::from_value(json!({
            "username": "u", "password": "p", "scan_intervall": 5
        }))
        .is_err());
    }

    #[test]
    fn debug_hides_password() {
        let printed = format!("{:?}", PlatformConfig::new("u", "hunter2"));
        assert!(!printed.contains("hunter2"));
    }
}
