//! Local settings cache
//!
//! A small JSON document of namespaced entries. The dashboard keeps the last
//! settings fetched from the backend under [`SETTINGS_KEY`] and reads them back
//! when the backend is unreachable.

use crate::error::Result;
use mpol_common::api::SystemSettings;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Namespace key of the cached system settings
pub const SETTINGS_KEY: &str = "music-police.settings";

#[derive(Debug, Clone)]
pub struct SettingsCache {
    path: PathBuf,
}

impl SettingsCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cached settings, if present and readable
    ///
    /// A corrupt cache is treated as empty.
    pub async fn load(&self) -> Option<SystemSettings> {
        let entries = self.read_entries().await;
        let value = entries.get(SETTINGS_KEY)?.clone();
        match serde_json::from_value(value) {
            Ok(settings) => Some(settings),
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Ignoring unreadable cached settings"
                );
                None
            }
        }
    }

    /// Write `settings` under the settings key, keeping other entries
    pub async fn store(&self, settings: &SystemSettings) -> Result<()> {
        let mut entries = self.read_entries().await;
        entries.insert(SETTINGS_KEY.to_string(), serde_json::to_value(settings)?);

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let body = serde_json::to_vec_pretty(&Value::Object(entries))?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), "Settings cached");
        Ok(())
    }

    async fn read_entries(&self) -> Map<String, Value> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Map::new(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Cannot read settings cache");
                return Map::new();
            }
        };
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(map)) => map,
            Ok(_) | Err(_) => {
                warn!(
                    path = %self.path.display(),
                    "Settings cache is not a JSON object; starting fresh"
                );
                Map::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_cache_is_empty() {
        let dir = TempDir::new().unwrap();
        let cache = SettingsCache::new(dir.path().join("cache.json"));
        assert!(cache.load().await.is_none());
    }

    #[tokio::test]
    async fn test_store_then_load_under_namespace() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("cache.json");
        let cache = SettingsCache::new(&path);

        let settings = SystemSettings {
            auto_delete_days: 30,
            ..SystemSettings::default()
        };
        cache.store(&settings).await.unwrap();

        let raw: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw[SETTINGS_KEY]["auto_delete_days"], 30);
        assert_eq!(cache.load().await.unwrap().auto_delete_days, 30);
    }

    #[tokio::test]
    async fn test_store_keeps_other_entries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, r#"{"music-police.theme":"dark"}"#).unwrap();

        let cache = SettingsCache::new(&path);
        cache.store(&SystemSettings::default()).await.unwrap();

        let raw: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["music-police.theme"], "dark");
        assert!(raw.get(SETTINGS_KEY).is_some());
    }

    #[tokio::test]
    async fn test_corrupt_cache_is_ignored() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(SettingsCache::new(&path).load().await.is_none());
    }
}
