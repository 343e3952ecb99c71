//! Node agent.
//!
//! # Data Flow
//! ```text
//! heartbeat loop:  HeartbeatReport → POST /agent/heartbeat
//! reconcile loop:  GET /agent/reconcile?current_version=applied
//!     → needs_update → Applier::apply(desired_config)
//!     → state.rs (applied_version = rev) + queue.rs (apply_result event)
//!     → POST /agent/events → queue cleared on 2xx
//! ```
//!
//! Delivery is at-least-once; the control plane tolerates duplicates.

pub mod applier;
pub mod client;
pub mod queue;
pub mod runner;
pub mod state;

pub use applier::{Applier, FileApplier};
pub use client::ControlPlaneClient;
pub use runner::{Agent, TickOutcome};
