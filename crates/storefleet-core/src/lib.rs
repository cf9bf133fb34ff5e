pub mod backend;
pub mod config;
pub mod error;
pub mod installer;
pub mod io;
pub mod isolation;
pub mod orchestrator;
pub mod paths;
pub mod readiness;
pub mod registry;
pub mod types;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use error::{Result, StoreError};
pub use orchestrator::Orchestrator;
pub use types::{StoreRecord, StoreStatus};
