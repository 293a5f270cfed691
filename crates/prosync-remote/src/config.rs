//! Backend connection settings, loaded from the environment.

use std::env;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value '{value}' for {var}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Project base URL, e.g. `https://abc.supabase.co`.
    pub url: String,
    /// Public (anon) API key sent with every request.
    pub anon_key: String,
    /// Interval between realtime heartbeats.
    pub heartbeat: Duration,
    /// How long a realtime join may wait for its reply.
    pub join_timeout: Duration,
    pub request_timeout: Duration,
}

impl RemoteConfig {
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            heartbeat: Duration::from_secs(30),
            join_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Load from `PROSYNC_*` variables. `.env` loading is left to the
    /// binary.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let url = lookup("PROSYNC_URL").ok_or(ConfigError::Missing("PROSYNC_URL"))?;
        let anon_key = lookup("PROSYNC_ANON_KEY").ok_or(ConfigError::Missing("PROSYNC_ANON_KEY"))?;

        let mut config = Self::new(url, anon_key);
        config.heartbeat = secs_var(&lookup, "PROSYNC_HEARTBEAT_SECS", 30)?;
        config.join_timeout = secs_var(&lookup, "PROSYNC_JOIN_TIMEOUT_SECS", 10)?;
        config.request_timeout = secs_var(&lookup, "PROSYNC_REQUEST_TIMEOUT_SECS", 30)?;
        Ok(config)
    }

    pub fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.url, table)
    }

    pub fn storage_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.url, bucket, path.trim_start_matches('/'))
    }

    pub fn storage_bucket_url(&self, bucket: &str) -> String {
        format!("{}/storage/v1/object/{}", self.url, bucket)
    }

    pub fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.url, path)
    }

    /// Websocket endpoint of the realtime service.
    pub fn realtime_url(&self) -> String {
        let ws_base = if let Some(rest) = self.url.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = self.url.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            self.url.clone()
        };
        format!(
            "{}/realtime/v1/websocket?apikey={}&vsn=1.0.0",
            ws_base, self.anon_key
        )
    }
}

fn secs_var(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: u64,
) -> Result<Duration, ConfigError> {
    match lookup(var) {
        Some(value) => value
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .ok_or(ConfigError::Invalid { var, value }),
        None => Ok(Duration::from_secs(default)),
    }
}
