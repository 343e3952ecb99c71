//! Desired/applied version reconciliation.
//!
//! # Data Flow
//! ```text
//! agent ──reconcile(current_version)──▶ protocol.rs ──overwrite applied_version
//!       ◀──desired_config, needs_update──
//! agent ──events[apply_result]────────▶ events.rs ──max-merge applied_version
//! agent ──heartbeat(report?)──────────▶ telemetry.rs ──last_seen_at, metrics
//! ```
//!
//! # Design Decisions
//! - `desired_version` is only moved by releases, never by agents
//! - Reconcile trusts the agent's reported version as-is, events only raise it
//! - State (`NodeState`) is derived on read, never stored

pub mod events;
pub mod protocol;
pub mod state;
pub mod telemetry;

pub use protocol::AgentProtocol;
pub use state::NodeState;
