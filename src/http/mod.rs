//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request id scoped to the task)
//!     → agent.rs | sub.rs | admin::*
//!     → response.rs (JSON envelope or plaintext feed)
//! ```

pub mod agent;
pub mod request;
pub mod response;
pub mod server;
pub mod sub;

pub use request::X_REQUEST_ID;
pub use response::{ApiResponse, ApiResult};
pub use server::{build_router, AppState, HttpServer};
