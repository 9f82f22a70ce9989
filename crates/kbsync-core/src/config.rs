//! Configuration types for kbsync.
//!
//! - [`SyncConfig`]: user-level configuration stored in `~/.kbsync/config.yaml`
//! - [`OfflineConfig`]: timing of the self-contained offline repository
//!
//! Missing files fall back to defaults. Command-line flags and `KBSYNC_*`
//! environment variables are applied on top by the CLI.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{
    CONFIG_FILENAME, DEFAULT_OFFLINE_APPLY_DELAY_MS, DEFAULT_OFFLINE_LATENCY_MS,
    DEFAULT_OFFLINE_SYNC_DELAY_MS, DEFAULT_PAGE_SIZE, DEFAULT_POLL_INTERVAL_MS,
    DEFAULT_SEARCH_DEBOUNCE_MS, KBSYNC_HOME_DIR, STORE_FILENAME, TOKEN_FILENAME,
};
use crate::errors::SyncError;
use crate::session::SessionSettings;

// ============================================================================
// SyncConfig
// ============================================================================

/// User-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfig {
    /// Base URL of the repository API. Required in online mode.
    #[serde(default)]
    pub backend_url: Option<String>,

    /// Base URL of the authentication service. Required for `login`.
    #[serde(default)]
    pub auth_url: Option<String>,

    /// Public API key sent to the authentication service.
    #[serde(default)]
    pub auth_anon_key: Option<String>,

    /// Talk to the backend (`true`) or serve everything from the local store.
    #[serde(default = "default_online")]
    pub online: bool,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_search_debounce_ms")]
    pub search_debounce_ms: u64,

    #[serde(default = "default_page_size")]
    pub page_size: usize,

    #[serde(default)]
    pub offline: OfflineConfig,

    /// Location of the offline membership store.
    #[serde(default)]
    pub store_path: Option<PathBuf>,

    /// Location of the persisted bearer token.
    #[serde(default)]
    pub token_path: Option<PathBuf>,
}

fn default_online() -> bool {
    true
}
fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}
fn default_search_debounce_ms() -> u64 {
    DEFAULT_SEARCH_DEBOUNCE_MS
}
fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            backend_url: None,
            auth_url: None,
            auth_anon_key: None,
            online: true,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            search_debounce_ms: DEFAULT_SEARCH_DEBOUNCE_MS,
            page_size: DEFAULT_PAGE_SIZE,
            offline: OfflineConfig::default(),
            store_path: None,
            token_path: None,
        }
    }
}

impl SyncConfig {
    /// Load the configuration from `~/.kbsync/config.yaml`.
    ///
    /// Falls back to defaults when the home directory cannot be determined or
    /// the file does not exist.
    pub fn load_default() -> Result<Self, SyncError> {
        match Self::default_path() {
            Some(path) => Self::from_path(&path),
            None => {
                tracing::debug!("Could not determine home directory, using default config");
                Ok(Self::default())
            }
        }
    }

    /// Load the configuration from a specific path.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidConfig`] if the file exists but cannot be read
    /// or parsed, and [`SyncError::InvalidConfiguration`] if validation fails.
    pub fn from_path(path: &Path) -> Result<Self, SyncError> {
        if !path.exists() {
            tracing::debug!("Config not found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| {
            SyncError::InvalidConfig(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let config: Self = serde_yaml::from_str(&content).map_err(|e| {
            SyncError::InvalidConfig(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        for warning in config.validate()? {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok(config)
    }

    /// The kbsync home directory (`~/.kbsync`).
    pub fn default_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(KBSYNC_HOME_DIR))
    }

    /// The default config file path (`~/.kbsync/config.yaml`).
    pub fn default_path() -> Option<PathBuf> {
        Self::default_dir().map(|d| d.join(CONFIG_FILENAME))
    }

    /// Store path, defaulting to `~/.kbsync/kb_resources.json`.
    pub fn effective_store_path(&self) -> PathBuf {
        self.store_path
            .clone()
            .or_else(|| Self::default_dir().map(|d| d.join(STORE_FILENAME)))
            .unwrap_or_else(|| PathBuf::from(STORE_FILENAME))
    }

    /// Token path, defaulting to `~/.kbsync/token`.
    pub fn effective_token_path(&self) -> PathBuf {
        self.token_path
            .clone()
            .or_else(|| Self::default_dir().map(|d| d.join(TOKEN_FILENAME)))
            .unwrap_or_else(|| PathBuf::from(TOKEN_FILENAME))
    }

    /// Timing settings for an explorer session.
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            search_debounce: Duration::from_millis(self.search_debounce_ms),
        }
    }

    /// Validates the configuration, returning warnings for questionable values.
    ///
    /// # Errors
    ///
    /// Returns an error if the poll interval or the page size is 0.
    pub fn validate(&self) -> Result<Vec<String>, SyncError> {
        let mut warnings = Vec::new();

        if self.poll_interval_ms == 0 {
            return Err(SyncError::InvalidConfiguration {
                message: "pollIntervalMs cannot be 0".to_string(),
                hint: "Set pollIntervalMs to at least 100 (default: 3000)".to_string(),
            });
        }

        if self.page_size == 0 {
            return Err(SyncError::InvalidConfiguration {
                message: "pageSize cannot be 0".to_string(),
                hint: "Set pageSize to at least 1 (default: 10)".to_string(),
            });
        }

        if self.poll_interval_ms < 250 {
            warnings.push(format!(
                "pollIntervalMs={} is very short; the backend may rate-limit membership polling",
                self.poll_interval_ms
            ));
        }

        if self.page_size > 1000 {
            warnings.push(format!(
                "pageSize={} is very large; listings may be slow to load",
                self.page_size
            ));
        }

        if self.online && self.backend_url.is_none() {
            warnings.push(
                "online mode is enabled but backendUrl is not set; use --offline or set backendUrl"
                    .to_string(),
            );
        }

        warnings.extend(self.offline.validate());

        Ok(warnings)
    }
}

// ============================================================================
// OfflineConfig
// ============================================================================

/// Timing of the offline repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineConfig {
    /// Simulated latency of every call.
    #[serde(default = "default_latency_ms")]
    pub latency_ms: u64,

    /// Delay before an add/remove shows up in membership.
    #[serde(default = "default_apply_delay_ms")]
    pub apply_delay_ms: u64,

    /// Duration of a sync trigger.
    #[serde(default = "default_sync_delay_ms")]
    pub sync_delay_ms: u64,
}

fn default_latency_ms() -> u64 {
    DEFAULT_OFFLINE_LATENCY_MS
}
fn default_apply_delay_ms() -> u64 {
    DEFAULT_OFFLINE_APPLY_DELAY_MS
}
fn default_sync_delay_ms() -> u64 {
    DEFAULT_OFFLINE_SYNC_DELAY_MS
}

impl Default for OfflineConfig {
    fn default() -> Self {
        Self {
            latency_ms: DEFAULT_OFFLINE_LATENCY_MS,
            apply_delay_ms: DEFAULT_OFFLINE_APPLY_DELAY_MS,
            sync_delay_ms: DEFAULT_OFFLINE_SYNC_DELAY_MS,
        }
    }
}

impl OfflineConfig {
    /// Returns warnings for delays that make the offline mode unusable.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        for (key, value) in [
            ("offline.latencyMs", self.latency_ms),
            ("offline.applyDelayMs", self.apply_delay_ms),
            ("offline.syncDelayMs", self.sync_delay_ms),
        ] {
            if value > 60_000 {
                warnings.push(format!("{}={} exceeds one minute", key, value));
            }
        }
        warnings
    }

    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }

    pub fn apply_delay(&self) -> Duration {
        Duration::from_millis(self.apply_delay_ms)
    }

    pub fn sync_delay(&self) -> Duration {
        Duration::from_millis(self.sync_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = SyncConfig::from_path(&dir.path().join("nope.yaml")).unwrap();
        assert_eq!(config, SyncConfig::default());
        assert_eq!(config.poll_interval_ms, 3000);
        assert_eq!(config.search_debounce_ms, 500);
        assert_eq!(config.page_size, 10);
        assert!(config.online);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            "online: false\npollIntervalMs: 1000\noffline:\n  latencyMs: 0\n",
        )
        .unwrap();

        let config = SyncConfig::from_path(&path).unwrap();
        assert!(!config.online);
        assert_eq!(config.poll_interval_ms, 1000);
        assert_eq!(config.page_size, 10);
        assert_eq!(config.offline.latency_ms, 0);
        assert_eq!(config.offline.apply_delay_ms, 2000);
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let config = SyncConfig {
            poll_interval_ms: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SyncError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let config = SyncConfig {
            page_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_online_without_backend_warns() {
        let warnings = SyncConfig::default().validate().unwrap();
        assert!(warnings.iter().any(|w| w.contains("backendUrl")));

        let offline = SyncConfig {
            online: false,
            ..Default::default()
        };
        assert!(offline.validate().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_yaml_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "pageSize: [not a number").unwrap();
        assert!(matches!(
            SyncConfig::from_path(&path),
            Err(SyncError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_session_settings() {
        let settings = SyncConfig::default().session_settings();
        assert_eq!(settings.poll_interval, Duration::from_millis(3000));
        assert_eq!(settings.search_debounce, Duration::from_millis(500));
    }

    #[test]
    fn test_explicit_store_path_wins() {
        let config = SyncConfig {
            store_path: Some(PathBuf::from("/tmp/kb.json")),
            ..Default::default()
        };
        assert_eq!(config.effective_store_path(), PathBuf::from("/tmp/kb.json"));
    }
}
