//! Template subsystem.
//!
//! # Data Flow
//! ```text
//! template id
//!     → builtin.rs (static table) or store (custom document)
//!     → registry.rs (merge override, one level deep for defaults)
//!     → defaults.rs (fill empty fields for the profile)
//!     → resolved Template
//! ```
//!
//! # Design Decisions
//! - Builtins are code, never mutated; operator edits live in an override
//! - Deleting a builtin resets it by dropping the override
//! - Generated secrets are written back once so every read agrees

pub mod builtin;
pub mod defaults;
pub mod registry;

pub use defaults::apply_defaults;
pub use registry::{TemplateRegistry, TemplateSource};
