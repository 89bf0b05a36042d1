//! Configuration management for listacquire using the prefer crate.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::GrabMode;
use crate::site::SiteProfile;
use crate::user_agent::{resolve_user_agent, DEFAULT_USER_AGENT};

/// Default acquisition deadline in milliseconds (three minutes).
pub const DEFAULT_TIMEOUT_MS: u64 = 180_000;

/// Default pause between row visibility checks while paginating.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

/// Default CDP command timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Browser launch settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowserSettings {
    /// Run without a visible window.
    pub headless: bool,
    /// User agent presented to the site.
    pub user_agent: String,
    /// Drop images, media, stylesheets, fonts and telemetry requests.
    pub block_resources: bool,
    /// Remote Chrome DevTools URL (e.g., "ws://localhost:9222").
    /// If set, connects to an existing browser instead of launching one.
    pub remote_url: Option<String>,
    /// Additional Chrome arguments.
    pub chrome_args: Vec<String>,
    /// Timeout for individual CDP commands.
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            block_resources: true,
            remote_url: None,
            chrome_args: Vec::new(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

/// Application settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Upper bound on one acquisition run.
    #[serde(with = "duration_millis")]
    pub timeout: Duration,
    /// Pause between visibility checks while waiting for the next row.
    #[serde(with = "duration_millis")]
    pub poll_interval: Duration,
    /// Whole list or just the first batch.
    pub grab_mode: GrabMode,
    pub browser: BrowserSettings,
    pub site: SiteProfile,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            grab_mode: GrabMode::default(),
            browser: BrowserSettings::default(),
            site: SiteProfile::default(),
        }
    }
}

/// Configuration file structure. Every field is optional and overlays
/// [`Settings`] defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Acquisition deadline in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Visibility poll interval in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grab_mode: Option<GrabMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headless: Option<bool>,
    /// User agent string, or "impersonate" for a random real browser.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_resources: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chrome_args: Vec<String>,
    /// CDP command timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<u64>,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer crate for discovery.
    /// Falls back to defaults (plus environment overrides) when no file is found.
    pub async fn load() -> Self {
        match prefer::load("listacquire").await {
            Ok(pref_config) => {
                if let Some(path) = pref_config.source_path() {
                    match Self::load_from_path(path).await {
                        Ok(config) => return config,
                        Err(e) => tracing::warn!("Ignoring config file {}: {}", path.display(), e),
                    }
                }
                Self::default().with_env_overrides()
            }
            Err(_) => Self::default().with_env_overrides(),
        }
    }

    /// Load configuration from a specific file path.
    /// Supports TOML and JSON based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents)
                .map_err(|e| format!("Failed to parse TOML config: {}", e))?,
            _ => serde_json::from_str(&contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e))?,
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config.with_env_overrides())
    }

    /// Apply `LISTACQUIRE_*` environment variables on top of file values.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| env::var(key).ok())
    }

    fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(ms) = lookup("LISTACQUIRE_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.timeout_ms = Some(ms);
        }

        if let Some(v) = lookup("LISTACQUIRE_HEADLESS") {
            self.headless = Some(v == "1" || v.eq_ignore_ascii_case("true"));
        }

        if let Some(url) = lookup("LISTACQUIRE_REMOTE_URL") {
            if !url.is_empty() {
                self.remote_url = Some(url);
            }
        }

        if let Some(ua) = lookup("LISTACQUIRE_USER_AGENT") {
            if !ua.is_empty() {
                self.user_agent = Some(ua);
            }
        }

        self
    }

    /// Apply configuration to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings) {
        if let Some(ms) = self.timeout_ms {
            settings.timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.poll_interval_ms {
            settings.poll_interval = Duration::from_millis(ms);
        }
        if let Some(mode) = self.grab_mode {
            settings.grab_mode = mode;
        }
        if let Some(headless) = self.headless {
            settings.browser.headless = headless;
        }
        if self.user_agent.is_some() {
            settings.browser.user_agent = resolve_user_agent(self.user_agent.as_deref());
        }
        if let Some(block) = self.block_resources {
            settings.browser.block_resources = block;
        }
        if let Some(ref url) = self.remote_url {
            settings.browser.remote_url = Some(url.clone());
        }
        if !self.chrome_args.is_empty() {
            settings.browser.chrome_args = self.chrome_args.clone();
        }
        if let Some(secs) = self.request_timeout {
            settings.browser.request_timeout = Duration::from_secs(secs);
        }
    }
}

/// Discover the config file and merge it over the defaults.
pub async fn load_settings() -> (Settings, Config) {
    let config = Config::load().await;
    let mut settings = Settings::default();
    config.apply_to_settings(&mut settings);
    (settings, config)
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}
