use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use tokio::sync::watch;

use super::{Config, ConfigStore};

/// Polls the override file's mtime on an interval and reloads+re-hashes the
/// config when it changes. No inotify dependency: a poll-based reload is
/// simple and cheap enough for this access pattern.
pub struct ConfigWatcher;

impl ConfigWatcher {
    /// Spawns the polling task. `sender` carries the latest `Config`;
    /// subscribers see a new value only when the *relevant* hash changed.
    pub fn spawn(
        override_path: PathBuf,
        poll_interval: Duration,
        sender: watch::Sender<Config>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut last_mtime = file_mtime(&override_path);
            let mut interval = tokio::time::interval(poll_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let mtime = file_mtime(&override_path);
                if mtime == last_mtime {
                    continue;
                }
                last_mtime = mtime;

                let previous_hash = sender.borrow().system.last_config_hash.clone();
                let reloaded = ConfigStore::load(&override_path);
                if reloaded.system.last_config_hash != previous_hash {
                    tracing::info!("config file changed, relevant hash updated, reloading");
                    let _ = sender.send(reloaded);
                } else {
                    tracing::debug!("config file changed but relevant hash unchanged, ignoring");
                }
            }
        })
    }
}

fn file_mtime(path: &std::path::Path) -> Option<SystemTime> {
    std::fs::metadata(path).ok()?.modified().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_utils;
    use std::time::Duration;

    #[tokio::test]
    async fn reload_fires_only_when_relevant_hash_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        file_utils::write_json_file(&path, &serde_json::json!({})).unwrap();

        let initial = ConfigStore::load(&path);
        let (tx, mut rx) = watch::channel(initial);
        let handle = ConfigWatcher::spawn(path.clone(), Duration::from_millis(20), tx);

        // Irrelevant change: touch network.port, same directories/interval -> hash unchanged.
        file_utils::write_json_file(&path, &serde_json::json!({"network": {"server": {"port": 9001}}})).unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(!rx.has_changed().unwrap());

        // Relevant change: directories differ -> hash changes, should fire.
        file_utils::write_json_file(&path, &serde_json::json!({"directories": ["/new"]})).unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(rx.has_changed().unwrap());

        handle.abort();
    }
}
