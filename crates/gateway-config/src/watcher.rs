//! Configuration file watching.
//!
//! The parent directory is watched (editors often replace files rather than
//! write them in place) and events are filtered down to the configuration
//! file. Bursts of events are coalesced before the file is reloaded.

use crate::error::{ConfigError, ConfigResult};
use crate::loader::ConfigLoader;
use crate::model::GatewayConfig;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Default quiet period before a changed file is reloaded.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);

/// Watches a configuration file and yields freshly loaded configurations.
pub struct ConfigWatcher {
    loader: ConfigLoader,
    path: PathBuf,
    debounce: Duration,
    events: mpsc::UnboundedReceiver<Event>,
    _watcher: RecommendedWatcher,
}

impl std::fmt::Debug for ConfigWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigWatcher")
            .field("path", &self.path)
            .field("debounce", &self.debounce)
            .finish_non_exhaustive()
    }
}

impl ConfigWatcher {
    /// Start watching the file configured on `loader`.
    pub fn new(loader: ConfigLoader) -> ConfigResult<Self> {
        let path = loader
            .path()
            .ok_or_else(|| ConfigError::validation("config watcher requires a file path"))?
            .to_path_buf();
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (tx, events) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                let _ = tx.send(event);
            }
            Err(e) => warn!(error = %e, "Configuration watch error"),
        })?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        debug!(path = %path.display(), "Watching configuration file");

        Ok(Self {
            loader,
            path,
            debounce: DEFAULT_DEBOUNCE,
            events,
            _watcher: watcher,
        })
    }

    /// Set the quiet period.
    #[must_use]
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Wait for the next change and reload.
    ///
    /// Returns `None` once the watcher has shut down. A reload that fails
    /// to parse or validate is returned as `Some(Err(_))` so the caller can
    /// keep the previous configuration.
    pub async fn next_config(&mut self) -> Option<ConfigResult<GatewayConfig>> {
        loop {
            let event = self.events.recv().await?;
            if !self.is_relevant(&event) {
                continue;
            }

            // Coalesce the burst of events a single save produces.
            loop {
                match tokio::time::timeout(self.debounce, self.events.recv()).await {
                    Ok(Some(_)) => continue,
                    Ok(None) | Err(_) => break,
                }
            }

            debug!(path = %self.path.display(), "Configuration file changed");
            return Some(self.loader.load().await);
        }
    }

    fn is_relevant(&self, event: &Event) -> bool {
        matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
            && event.paths.iter().any(|p| same_file_name(p, &self.path))
    }
}

fn same_file_name(a: &Path, b: &Path) -> bool {
    a.file_name().is_some() && a.file_name() == b.file_name()
}

#[cfg(test)]
mod tests {
    use super::*;

    const INITIAL: &str = r"
routes:
  - path: /orders
    upstream: { host: orders, port: 8080 }
";

    const UPDATED: &str = r"
routes:
  - path: /orders
    upstream: { host: orders, port: 8080 }
  - path: /invoices
    upstream: { host: billing, port: 8080 }
";

    #[test]
    fn test_requires_path() {
        let result = ConfigWatcher::new(ConfigLoader::new());
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[tokio::test]
    async fn test_reload_on_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.yaml");
        std::fs::write(&path, INITIAL).unwrap();

        let loader = ConfigLoader::new()
            .with_path(&path)
            .with_env_overrides(false);
        let mut watcher = ConfigWatcher::new(loader)
            .unwrap()
            .with_debounce(Duration::from_millis(50));

        tokio::time::sleep(Duration::from_millis(100)).await;
        std::fs::write(&path, UPDATED).unwrap();

        let reloaded = tokio::time::timeout(Duration::from_secs(10), watcher.next_config())
            .await
            .expect("reload within timeout")
            .expect("watcher alive")
            .expect("valid config");
        assert_eq!(reloaded.routes.len(), 2);
    }

    #[test]
    fn test_same_file_name() {
        assert!(same_file_name(Path::new("/a/b/gateway.yaml"), Path::new("gateway.yaml")));
        assert!(!same_file_name(Path::new("/a/b/other.yaml"), Path::new("gateway.yaml")));
    }
}
