//! Durable outbox of apply-result events.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::api::ApplyEvent;

/// Oldest events are dropped past this many.
pub const MAX_QUEUED_EVENTS: usize = 100;

/// Events waiting for delivery, mirrored to a JSON file.
#[derive(Debug)]
pub struct EventQueue {
    path: PathBuf,
    pending: Vec<ApplyEvent>,
}

impl EventQueue {
    /// Load the queue file, or start empty when it does not exist.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let pending = if path.exists() {
            let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_slice(&raw).with_context(|| format!("corrupt event queue {}", path.display()))?
        } else {
            Vec::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            pending,
        })
    }

    pub fn pending(&self) -> &[ApplyEvent] {
        &self.pending
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn push(&mut self, event: ApplyEvent) -> anyhow::Result<()> {
        self.pending.push(event);
        if self.pending.len() > MAX_QUEUED_EVENTS {
            let overflow = self.pending.len() - MAX_QUEUED_EVENTS;
            self.pending.drain(..overflow);
            tracing::warn!(dropped = overflow, "Event queue full, dropped oldest events");
        }
        self.persist()
    }

    /// Remove the first `count` events after the control plane confirmed them.
    pub fn acknowledge(&mut self, count: usize) -> anyhow::Result<()> {
        let count = count.min(self.pending.len());
        self.pending.drain(..count);
        self.persist()
    }

    fn persist(&self) -> anyhow::Result<()> {
        write_atomic(&self.path, &serde_json::to_vec_pretty(&self.pending)?)
    }
}

/// Write through a sibling temp file so readers never see a torn file.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes).with_context(|| format!("failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("failed to replace {}", path.display()))?;
    Ok(())
}
