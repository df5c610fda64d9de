use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::worker::decode::NotificationDefaults;

pub const DEFAULT_API_BASE: &str = "http://localhost:8000";
pub const DEFAULT_ORIGIN: &str = "http://localhost:8080";
pub const DEFAULT_CACHE_NAME: &str = "sensor-monitor-v1";
pub const DEFAULT_SCRIPT_URL: &str = "/sw.js";
pub const DEFAULT_APPLICATION_SERVER_KEY: &str =
    "BEbDsREdM4x6IuftaABaRV_mQ3mhLJ7c3LVSH9gaJUXo8qTDz-YSQ2zwZ0gG8jU5mx-bMewYF_MupIb1S7C4fck";
const DEFAULT_MANIFEST: [&str; 4] = [
    "/",
    "/static/js/bundle.js",
    "/static/css/main.css",
    "/manifest.json",
];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("cache name must not be empty")]
    EmptyCacheName,
    #[error("manifest entries must not be empty")]
    EmptyManifestEntry,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_base: Url,
    pub worker: WorkerConfig,
    pub controller: ControllerConfig,
    pub vapid_private_key: Option<String>,
    pub vapid_public_key: Option<String>,
    pub vapid_subject: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Origin the manifest paths are resolved against.
    pub origin: Url,
    /// Name of the current cache bucket. Bump it to supersede cached assets.
    pub cache_name: String,
    pub manifest: Vec<String>,
    pub app_root: String,
    pub notifications: NotificationDefaults,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            origin: default_url(DEFAULT_ORIGIN),
            cache_name: DEFAULT_CACHE_NAME.to_string(),
            manifest: DEFAULT_MANIFEST.map(str::to_string).to_vec(),
            app_root: "/".to_string(),
            notifications: NotificationDefaults::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    pub script_url: String,
    /// Server public key in base64url text form.
    pub application_server_key: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            script_url: DEFAULT_SCRIPT_URL.to_string(),
            application_server_key: DEFAULT_APPLICATION_SERVER_KEY.to_string(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base: default_url(DEFAULT_API_BASE),
            worker: WorkerConfig::default(),
            controller: ControllerConfig::default(),
            vapid_private_key: None,
            vapid_public_key: None,
            vapid_subject: None,
        }
    }
}

fn default_url(raw: &str) -> Url {
    Url::parse(raw).unwrap_or_else(|err| panic!("invalid built-in url '{raw}': {err}"))
}

/// On-disk TOML layout. Every key is optional and falls back to the built-in
/// default.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    api_base: Option<Url>,
    worker: WorkerSection,
    controller: ControllerSection,
    vapid: VapidSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct WorkerSection {
    origin: Option<Url>,
    cache_name: Option<String>,
    manifest: Option<Vec<String>>,
    app_root: Option<String>,
    notifications: NotificationSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct NotificationSection {
    title: Option<String>,
    body: Option<String>,
    icon: Option<String>,
    badge: Option<String>,
    vibrate_ms: Option<Vec<u64>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ControllerSection {
    script_url: Option<String>,
    application_server_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct VapidSection {
    private_key: Option<String>,
    public_key: Option<String>,
    subject: Option<String>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl AppConfig {
    pub fn from_file(file: ConfigFile) -> Result<Self, ConfigError> {
        let defaults = AppConfig::default();
        let notifications = {
            let section = file.worker.notifications;
            let fallback = defaults.worker.notifications;
            NotificationDefaults {
                title: section.title.unwrap_or(fallback.title),
                body: section.body.unwrap_or(fallback.body),
                icon: section.icon.unwrap_or(fallback.icon),
                badge: section.badge.unwrap_or(fallback.badge),
                vibration_pattern: section
                    .vibrate_ms
                    .map(|pattern| pattern.into_iter().map(Duration::from_millis).collect())
                    .unwrap_or(fallback.vibration_pattern),
            }
        };
        let config = AppConfig {
            api_base: file.api_base.unwrap_or(defaults.api_base),
            worker: WorkerConfig {
                origin: file.worker.origin.unwrap_or(defaults.worker.origin),
                cache_name: file.worker.cache_name.unwrap_or(defaults.worker.cache_name),
                manifest: file.worker.manifest.unwrap_or(defaults.worker.manifest),
                app_root: file.worker.app_root.unwrap_or(defaults.worker.app_root),
                notifications,
            },
            controller: ControllerConfig {
                script_url: file
                    .controller
                    .script_url
                    .unwrap_or(defaults.controller.script_url),
                application_server_key: file
                    .controller
                    .application_server_key
                    .unwrap_or(defaults.controller.application_server_key),
            },
            vapid_private_key: file.vapid.private_key,
            vapid_public_key: file.vapid.public_key,
            vapid_subject: file.vapid.subject,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker.cache_name.trim().is_empty() {
            return Err(ConfigError::EmptyCacheName);
        }
        if self
            .worker
            .manifest
            .iter()
            .any(|entry| entry.trim().is_empty())
        {
            return Err(ConfigError::EmptyManifestEntry);
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;

    #[test]
    fn from_file__should_apply_defaults_for_empty_file() {
        // Given
        let file: ConfigFile = toml::from_str("").expect("parse");

        // When
        let config = AppConfig::from_file(file).expect("config");

        // Then
        assert_eq!(config.api_base.as_str(), "http://localhost:8000/");
        assert_eq!(config.worker.cache_name, "sensor-monitor-v1");
        assert_eq!(config.worker.manifest.len(), 4);
        assert_eq!(config.worker.notifications.title, "Sensor Monitor");
        assert_eq!(config.controller.script_url, "/sw.js");
        assert!(config.vapid_private_key.is_none());
    }

    #[test]
    fn from_file__should_override_selected_keys() {
        // Given
        let file: ConfigFile = toml::from_str(
            r#"
api_base = "https://api.example.com"

[worker]
cache_name = "sensor-monitor-v2"
manifest = ["/", "/app.js"]

[worker.notifications]
title = "Noise Watch"
vibrate_ms = [200]

[vapid]
subject = "mailto:ops@example.com"
"#,
        )
        .expect("parse");

        // When
        let config = AppConfig::from_file(file).expect("config");

        // Then
        assert_eq!(config.api_base.as_str(), "https://api.example.com/");
        assert_eq!(config.worker.cache_name, "sensor-monitor-v2");
        assert_eq!(config.worker.manifest, vec!["/", "/app.js"]);
        assert_eq!(config.worker.notifications.title, "Noise Watch");
        assert_eq!(config.worker.notifications.body, "Sensor alert!");
        assert_eq!(
            config.worker.notifications.vibration_pattern,
            vec![Duration::from_millis(200)]
        );
        assert_eq!(config.vapid_subject.as_deref(), Some("mailto:ops@example.com"));
    }

    #[test]
    fn from_file__should_reject_empty_cache_name() {
        let file: ConfigFile = toml::from_str("[worker]\ncache_name = \" \"").expect("parse");

        assert!(matches!(
            AppConfig::from_file(file),
            Err(ConfigError::EmptyCacheName)
        ));
    }

    #[test]
    fn config_file__should_reject_unknown_keys() {
        assert!(toml::from_str::<ConfigFile>("[worker]\ncache = \"x\"").is_err());
    }
}
