//! e2e-builder Common Library
//!
//! The host-framework model shared by the builder and the hosts it runs
//! under: target references, builder outputs and the scheduler traits.

pub mod error;
pub mod host;
pub mod types;

pub use error::{HostError, HostResult};
pub use host::{HostContext, ScheduledTarget};
pub use types::*;

/// e2e-builder version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default workspace file name looked up by the CLI
pub const DEFAULT_WORKSPACE_FILE: &str = "e2e-workspace.json";
