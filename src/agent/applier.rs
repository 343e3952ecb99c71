use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use async_trait::async_trait;

use crate::model::DesiredConfig;

pub const DESIRED_FILE: &str = "desired.json";

/// Puts a desired config into effect on this host.
#[async_trait]
pub trait Applier: Send + Sync {
    async fn apply(&self, config: &DesiredConfig) -> anyhow::Result<()>;
}

/// Writes the config to `desired.json` for an external supervisor to pick up.
#[derive(Debug, Clone)]
pub struct FileApplier {
    dir: PathBuf,
}

impl FileApplier {
    pub fn new(dir: &Path) -> Self {
        Self { dir: dir.to_path_buf() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(DESIRED_FILE)
    }
}

#[async_trait]
impl Applier for FileApplier {
    async fn apply(&self, config: &DesiredConfig) -> anyhow::Result<()> {
        if config.rev == 0 {
            bail!("desired config has no revision");
        }
        let bytes = serde_json::to_vec_pretty(config)?;
        let path = self.path();
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("failed to replace {}", path.display()))?;
        tracing::info!(rev = config.rev, path = %path.display(), "Desired config written");
        Ok(())
    }
}
