use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use super::types::Config;

/// Stable fingerprint over the subset of config that invalidates downstream
/// caches: directories, seasonal directories, and the index update interval.
/// `serde_json::Value` objects serialize with sorted keys (no `preserve_order`
/// feature), so the hash is stable under object-key reordering.
pub fn relevant_config_hash(config: &Config) -> String {
    let relevant = serde_json::json!({
        "directories": config.directories,
        "seasonalDirectories": config.seasonal_directories,
        "updateIntervalMs": config.video.update_interval_ms,
    });
    let canonical = serde_json::to_string(&relevant).unwrap_or_default();
    let mut hasher = DefaultHasher::new();
    canonical.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_across_repeated_calls() {
        let config = Config::default();
        assert_eq!(relevant_config_hash(&config), relevant_config_hash(&config));
    }

    #[test]
    fn changes_when_directories_change() {
        let mut config = Config::default();
        let before = relevant_config_hash(&config);
        config.directories.push("./more".to_string());
        let after = relevant_config_hash(&config);
        assert_ne!(before, after);
    }

    #[test]
    fn unaffected_by_irrelevant_fields() {
        let mut config = Config::default();
        let before = relevant_config_hash(&config);
        config.network.server.port = 9999;
        config.timeouts.probe_timeout_ms = 1;
        let after = relevant_config_hash(&config);
        assert_eq!(before, after);
    }
}
