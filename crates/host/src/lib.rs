//! e2e-builder local host
//!
//! Implements the host scheduler on top of a workspace file: targets are
//! looked up by `project:target[:configuration]`, their options come from the
//! file, and scheduling a target starts its command as a child process that
//! counts as started once an HTTP readiness probe succeeds.

pub mod local;
pub mod process;
pub mod workspace;

pub use local::LocalHost;
pub use process::ProcessTarget;
pub use workspace::{ProjectConfig, ReadinessConfig, TargetConfig, WorkspaceConfig};
