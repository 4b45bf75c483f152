//! Ambient configuration. Defaults are a fixed base URL and a fixed
//! reconnect delay; [`Config::from_env`] pulls overrides straight from
//! `std::env::var`, with no config-file layer.

use std::time::Duration;

use crate::hub::{HubConfig, ReconnectPolicy};

#[derive(Debug, Clone)]
pub struct Config {
    pub connection_url: String,
    pub hub_name: String,
    pub reconnect_policy: ReconnectPolicy,
    pub keepalive_interval: Duration,
    pub delay_between_invokes: Duration,
    pub auth_secret: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            connection_url: "https://socket.example.com/signalr".to_string(),
            hub_name: "coreHub".to_string(),
            reconnect_policy: ReconnectPolicy::default(),
            keepalive_interval: Duration::from_secs(5),
            delay_between_invokes: Duration::from_millis(100),
            auth_secret: None,
        }
    }
}

impl Config {
    /// Builds a `Config` from environment variables, falling back to
    /// [`Config::default`] for anything unset:
    /// `BOOKHUB_CONNECTION_URL`, `BOOKHUB_HUB_NAME`, `BOOKHUB_API_SECRET`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            connection_url: std::env::var("BOOKHUB_CONNECTION_URL").unwrap_or(defaults.connection_url),
            hub_name: std::env::var("BOOKHUB_HUB_NAME").unwrap_or(defaults.hub_name),
            auth_secret: std::env::var("BOOKHUB_API_SECRET").ok(),
            ..defaults
        }
    }

    pub fn into_hub_config(self) -> HubConfig {
        let mut hub_config = HubConfig::new(self.connection_url, self.hub_name)
            .with_reconnect_policy(self.reconnect_policy)
            .with_delay_between_invokes(self.delay_between_invokes)
            .with_keepalive_interval(self.keepalive_interval);
        if let Some(secret) = self.auth_secret {
            hub_config = hub_config.with_auth_secret(secret);
        }
        hub_config
    }
}
