//! Insight API crate - axum HTTP server, workspace registry, SSE streaming.
//!
//! Exposes one workspace per identity: connection setup, chat turns,
//! report tabs, activity history, view state, and a per-workspace event
//! stream.

pub mod error;
pub mod handlers;
pub mod identity;
pub mod registry;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use registry::{WorkspaceHandle, WorkspaceKey, WorkspaceRegistry};
pub use routes::{create_router, start_server};
pub use state::AppState;
