//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing macros with structured fields (logging.rs installs the subscriber)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout, pretty or JSON lines
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through every log line via the request span
//! - `RUST_LOG` wins over the configured level

pub mod logging;
pub mod metrics;
