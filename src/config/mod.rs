mod hash;
mod merge;
pub mod types;
mod watcher;

use std::path::{Path, PathBuf};

pub use hash::relevant_config_hash;
pub use types::*;
pub use watcher::ConfigWatcher;

use merge::merge_json;

use crate::file_utils;

/// Normalizes a raw merged JSON value before it is deserialized into
/// `Config`, so that out-of-range enum-like strings degrade to a safe
/// default instead of failing deserialization outright.
fn normalize_merged_value(value: &mut serde_json::Value) {
    if let Some(mode) = value.pointer_mut("/performance/mode") {
        let recognized = mode
            .as_str()
            .map(|s| matches!(s, "quality" | "balanced" | "fast"))
            .unwrap_or(false);
        if !recognized {
            *mode = serde_json::Value::String("balanced".to_string());
        }
    }
    if let Some(mode) = value.pointer_mut("/audio/compatibility/compatibilityMode") {
        let recognized = mode
            .as_str()
            .map(|s| matches!(s, "auto" | "stereo"))
            .unwrap_or(false);
        if !recognized {
            *mode = serde_json::Value::String("auto".to_string());
        }
    }
}

impl Config {
    /// Clamps queue sizes, rejects impossible values, and guarantees a
    /// non-empty directories list. Returns the warnings it logged, mostly
    /// so tests can assert on them without scraping the log output.
    pub fn normalize(&mut self) -> Vec<String> {
        let mut warnings = Vec::new();

        macro_rules! clamp_min1 {
            ($field:expr, $name:literal) => {
                if $field == 0 {
                    warnings.push(format!("{} must be >= 1, resetting to 1", $name));
                    $field = 1;
                }
            };
        }
        clamp_min1!(self.video.preprocessed_queue_size, "video.preprocessedQueueSize");
        clamp_min1!(self.video.playback_queue_size, "video.playbackQueueSize");
        clamp_min1!(self.video.playback_history_size, "video.playbackHistorySize");
        clamp_min1!(self.video.persisted_history_size, "video.persistedHistorySize");

        if self.directories.is_empty() {
            warnings.push("directories was empty, falling back to a single default directory".to_string());
            self.directories.push("./videos".to_string());
        }

        for (i, seasonal) in self.seasonal_directories.iter_mut().enumerate() {
            if !(0.0..=1.0).contains(&seasonal.likelihood) {
                warnings.push(format!(
                    "seasonalDirectories[{i}].likelihood out of [0,1], clamping"
                ));
                seasonal.likelihood = seasonal.likelihood.clamp(0.0, 1.0);
            }
        }

        for warning in &warnings {
            tracing::warn!("{warning}");
        }
        warnings
    }
}

pub struct ConfigStore;

impl ConfigStore {
    /// Loads `Config::default()`, deep-merges an optional override file onto
    /// it, normalizes, and stamps the relevant-subset hash onto
    /// `system.last_config_hash`. A missing or corrupt override file is
    /// never fatal: it is treated as "no overrides".
    pub fn load(override_path: &Path) -> Config {
        let mut merged = serde_json::to_value(Config::default())
            .expect("Config::default() must always serialize");

        if let Some(override_value) = file_utils::read_json_file_opt::<serde_json::Value>(override_path) {
            merge_json(&mut merged, &override_value);
        }
        normalize_merged_value(&mut merged);

        let mut config: Config = match serde_json::from_value(merged) {
            Ok(config) => config,
            Err(err) => {
                tracing::error!(error = %err, "config override file malformed, falling back to defaults");
                Config::default()
            }
        };

        config.normalize();
        config.system.last_config_hash = Some(relevant_config_hash(&config));
        config
    }

    pub fn save(path: &Path, config: &Config) -> anyhow::Result<()> {
        file_utils::write_json_file(path, config)
    }

    pub fn default_override_path(cache_dir: &Path) -> PathBuf {
        cache_dir.join("config.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_with_missing_override_file_returns_normalized_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = ConfigStore::load(&path);
        assert_eq!(config.directories, Config::default().directories);
        assert!(config.system.last_config_hash.is_some());
    }

    #[test]
    fn override_file_merges_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        file_utils::write_json_file(
            &path,
            &serde_json::json!({"directories": ["/media/movies"]}),
        )
        .unwrap();

        let config = ConfigStore::load(&path);
        assert_eq!(config.directories, vec!["/media/movies".to_string()]);
        // Untouched sections still carry defaults.
        assert_eq!(config.video, VideoSection::default());
    }

    #[test]
    fn empty_override_equals_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        file_utils::write_json_file(&path, &serde_json::json!({})).unwrap();

        let config = ConfigStore::load(&path);
        let mut expected = Config::default();
        expected.normalize();
        assert_eq!(config.directories, expected.directories);
        assert_eq!(config.video, expected.video);
        assert_eq!(config.audio, expected.audio);
    }

    #[test]
    fn unrecognized_performance_mode_coerces_to_balanced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        file_utils::write_json_file(
            &path,
            &serde_json::json!({"performance": {"mode": "turbo"}}),
        )
        .unwrap();

        let config = ConfigStore::load(&path);
        assert_eq!(config.performance.mode, PerformanceMode::Balanced);
    }

    #[test]
    fn empty_directories_override_falls_back_to_default_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        file_utils::write_json_file(&path, &serde_json::json!({"directories": []})).unwrap();

        let config = ConfigStore::load(&path);
        assert_eq!(config.directories.len(), 1);
    }

    #[test]
    fn zero_queue_sizes_clamp_to_one() {
        let mut config = Config::default();
        config.video.preprocessed_queue_size = 0;
        let warnings = config.normalize();
        assert_eq!(config.video.preprocessed_queue_size, 1);
        assert!(!warnings.is_empty());
    }

    #[test]
    fn hash_stable_under_save_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = ConfigStore::load(&path);
        ConfigStore::save(&path, &config).unwrap();
        let reloaded: Config = file_utils::read_json_file(&path).unwrap();
        assert_eq!(
            relevant_config_hash(&config),
            relevant_config_hash(&reloaded)
        );
    }
}
