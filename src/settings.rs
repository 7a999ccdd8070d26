//! User settings persisted as JSON in the app data directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::annotation::MutationPolicy;
use crate::remote::{IdentifyOptions, RemoteSyncConfig};

/// Overrides `server_url` when set.
pub const SERVER_URL_ENV: &str = "SPEAKER_LABELER_URL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server_url: String,
    /// Safety deadline for transcription, identification, load and upload jobs.
    pub job_timeout_secs: u64,
    /// Per-request HTTP timeout. Unset means requests may run as long as the job deadline.
    pub request_timeout_secs: Option<u64>,
    pub status_dismiss_secs: u64,
    pub mutation_policy: MutationPolicy,
    pub identify: IdentifyOptions,
    pub export_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8000".to_string(),
            job_timeout_secs: 300,
            request_timeout_secs: None,
            status_dismiss_secs: 5,
            mutation_policy: MutationPolicy::default(),
            identify: IdentifyOptions::default(),
            export_dir: None,
        }
    }
}

impl Settings {
    /// Read settings from `path`. A missing or unreadable file yields defaults.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match std::fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|json| serde_json::from_str(&json).map_err(|e| e.to_string()))
        {
            Ok(settings) => {
                info!("[settings] loaded {}", path.display());
                settings
            }
            Err(e) => {
                warn!("[settings] ignoring {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Like [`Settings::load`], but writes the defaults out on first run so
    /// there is a file to edit.
    pub fn load_or_init(path: &Path) -> Self {
        if path.exists() {
            return Self::load(path);
        }
        let settings = Self::default();
        match settings.save(path) {
            Ok(()) => info!("[settings] wrote defaults to {}", path.display()),
            Err(e) => warn!("[settings] could not write {}: {}", path.display(), e),
        }
        settings
    }

    pub fn save(&self, path: &Path) -> Result<(), String> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| e.to_string())?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| e.to_string())?;
        std::fs::write(path, json).map_err(|e| e.to_string())?;
        Ok(())
    }

    /// Apply environment overrides on top of file settings.
    pub fn with_env(mut self) -> Self {
        if let Ok(url) = std::env::var(SERVER_URL_ENV) {
            if !url.trim().is_empty() {
                self.server_url = url;
            }
        }
        self
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs.max(1))
    }

    pub fn status_dismiss_after(&self) -> Duration {
        Duration::from_secs(self.status_dismiss_secs)
    }

    pub fn remote_config(&self) -> RemoteSyncConfig {
        let mut config = RemoteSyncConfig::new(&self.server_url);
        config.request_timeout = self.request_timeout_secs.map(Duration::from_secs);
        config
    }

    pub fn export_dir(&self) -> PathBuf {
        self.export_dir
            .clone()
            .unwrap_or_else(crate::paths::default_export_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("settings.json"));
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.job_timeout(), Duration::from_secs(300));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{ "server_url": "http://labeler:9000/", "mutation_policy": "rollback",
                 "identify": { "denoise": true } }"#,
        )
        .unwrap();

        let settings = Settings::load(&path);
        assert_eq!(settings.mutation_policy, MutationPolicy::Rollback);
        assert!(settings.identify.denoise);
        assert_eq!(settings.identify.denoise_proportion, 0.1);
        assert_eq!(settings.status_dismiss_secs, 5);
        assert_eq!(settings.remote_config().base_url, "http://labeler:9000");
    }

    #[test]
    fn invalid_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not json").unwrap();
        assert_eq!(Settings::load(&path), Settings::default());
    }

    #[test]
    fn first_run_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app").join("settings.json");
        assert_eq!(Settings::load_or_init(&path), Settings::default());
        assert!(path.exists());

        std::fs::write(&path, r#"{ "job_timeout_secs": 120 }"#).unwrap();
        assert_eq!(Settings::load_or_init(&path).job_timeout_secs, 120);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = Settings {
            job_timeout_secs: 60,
            request_timeout_secs: Some(30),
            ..Settings::default()
        };
        settings.save(&path).unwrap();
        assert_eq!(Settings::load(&path), settings);
    }
}
