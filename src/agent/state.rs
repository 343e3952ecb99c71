//! Agent-local state persisted across restarts.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use super::queue::write_atomic;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentState {
    /// Revision of the last successfully applied config.
    pub applied_version: u64,
    /// Revision whose failure was already reported.
    pub last_failed_version: Option<u64>,
}

/// `AgentState` bound to its file.
#[derive(Debug)]
pub struct StateFile {
    path: PathBuf,
    pub state: AgentState,
}

impl StateFile {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let state = if path.exists() {
            let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_slice(&raw).with_context(|| format!("corrupt state file {}", path.display()))?
        } else {
            AgentState::default()
        };
        Ok(Self {
            path: path.to_path_buf(),
            state,
        })
    }

    pub fn save(&self) -> anyhow::Result<()> {
        write_atomic(&self.path, &serde_json::to_vec_pretty(&self.state)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let mut file = StateFile::open(&path).unwrap();
        assert_eq!(file.state, AgentState::default());
        file.state.applied_version = 4;
        file.save().unwrap();

        assert_eq!(StateFile::open(&path).unwrap().state.applied_version, 4);
    }
}
