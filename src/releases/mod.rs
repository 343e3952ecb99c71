//! Releases: pushing template snapshots to nodes.
//!
//! # Data Flow
//! ```text
//! NewRelease {node_ids, template_ids, params}
//!     → TemplateRegistry::resolve (snapshot of each template)
//!     → per node: desired_version = version, desired_config = snapshot
//!     → Release audit record + idx:releases
//!     → prune to RELEASE_RETENTION newest
//! ```

pub mod service;

pub use service::{summarize, ReleaseService, RELEASE_RETENTION};
