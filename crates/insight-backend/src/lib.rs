//! Collaborator adapters for the workspace ports.
//!
//! - [`HttpUserStore`]: per-user connection configs in the external CRUD
//!   service
//! - [`InMemoryConfigStore`]: process-local fallback store
//! - [`TcpProbe`]: reachability check for a connection string
//! - [`FixtureAnalyzer`] / [`FixtureReportGenerator`]: built-in stand-in
//!   engine
//! - [`Deadline`]: timeout decorator for the engine collaborators

pub mod deadline;
pub mod fixtures;
pub mod memory_store;
pub mod probe;
pub mod user_store;

pub use deadline::Deadline;
pub use fixtures::{FixtureAnalyzer, FixtureReportGenerator};
pub use memory_store::InMemoryConfigStore;
pub use probe::TcpProbe;
pub use user_store::HttpUserStore;
