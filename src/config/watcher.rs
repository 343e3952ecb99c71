//! Hot reload of the control-plane config file.
//!
//! The parent directory is watched rather than the file itself so that
//! editors which save by rename are still picked up.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::HubConfig;

const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Watches the control-plane config file and emits validated reloads.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<HubConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and a receiver for configuration updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<HubConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            update_tx,
        };
        (watcher, update_rx)
    }

    /// Start watching. The returned handle must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let file_name = self.path.file_name().map(|n| n.to_os_string());
        let path = self.path.clone();
        let tx = self.update_tx;
        let last_seen = Mutex::new(std::fs::read(&path).ok());

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let event = match res {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::error!(error = ?e, "Config watch error");
                        return;
                    }
                };
                if !(event.kind.is_modify() || event.kind.is_create()) {
                    return;
                }
                if !event.paths.iter().any(|p| p.file_name() == file_name.as_deref()) {
                    return;
                }

                let Ok(raw) = std::fs::read(&path) else {
                    return;
                };
                if let Ok(mut last) = last_seen.lock() {
                    if last.as_deref() == Some(raw.as_slice()) {
                        return;
                    }
                    *last = Some(raw);
                }

                match load_config(&path) {
                    Ok(config) => {
                        tracing::info!(path = %path.display(), "Config file changed, reloading");
                        let _ = tx.send(config);
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Config reload rejected, keeping current configuration");
                    }
                }
            },
            Config::default().with_poll_interval(POLL_INTERVAL),
        )?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        tracing::info!(path = %self.path.display(), "Config watcher started");
        Ok(watcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reload_emits_new_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nodehub.toml");
        std::fs::write(&path, "[admin]\napi_key = \"first\"\n").unwrap();

        let (watcher, mut rx) = ConfigWatcher::new(&path);
        let _handle = watcher.run().unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        std::fs::write(&path, "[admin]\napi_key = \"second\"\n").unwrap();

        let config = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("no reload within timeout")
            .unwrap();
        assert_eq!(config.admin.api_key, "second");
    }
}
