//! Derived convergence state of a node.

use serde::Serialize;

use crate::model::{Node, ReleaseStatus};

/// Convergence state, derived from the version pair and the last status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
    /// Nothing was ever released to the node.
    Idle,
    /// Last apply failed; the node stays a retry target.
    Failed,
    Pending,
    Converged,
}

impl NodeState {
    /// Rules are checked in order: idle, failed, pending, converged.
    pub fn derive(desired_version: u64, applied_version: u64, status: ReleaseStatus) -> Self {
        if desired_version == 0 {
            NodeState::Idle
        } else if status == ReleaseStatus::Failed {
            NodeState::Failed
        } else if desired_version > applied_version || status == ReleaseStatus::Pending {
            NodeState::Pending
        } else {
            NodeState::Converged
        }
    }

    pub fn of(node: &Node) -> Self {
        Self::derive(node.desired_version, node.applied_version, node.last_release_status)
    }
}
