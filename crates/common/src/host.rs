//! Scheduler interface a host framework exposes to builders

use async_trait::async_trait;
use std::path::Path;

use crate::error::HostResult;
use crate::types::{BuilderOutput, TargetOptions, TargetRef};

/// A target started through [`HostContext::schedule_target`].
///
/// The caller that scheduled it owns it and is responsible for calling
/// [`ScheduledTarget::stop`] once it is done with it.
#[async_trait]
pub trait ScheduledTarget: Send {
    /// Wait for the first result the target reports.
    async fn result(&mut self) -> BuilderOutput;

    /// Stop the target. Calling this more than once is a no-op.
    async fn stop(&mut self) -> HostResult<()>;
}

/// Build orchestration host: resolves, inspects and schedules targets
#[async_trait]
pub trait HostContext: Send + Sync {
    /// Root directory of the workspace the host manages
    fn workspace_root(&self) -> &Path;

    /// Turn a `project:target[:configuration]` string into a target reference
    fn resolve_target(&self, target: &str) -> HostResult<TargetRef> {
        target.parse()
    }

    /// Options declared for a target, with its configurations applied
    async fn get_target_options(&self, target: &TargetRef) -> HostResult<TargetOptions>;

    /// Start a target with `overrides` layered over its declared options
    async fn schedule_target(
        &self,
        target: &TargetRef,
        overrides: TargetOptions,
    ) -> HostResult<Box<dyn ScheduledTarget>>;
}
