//! [`HostContext`] backed by a workspace file on disk

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

use e2e_builder_common::{
    merge_options, HostContext, HostError, HostResult, ScheduledTarget, TargetOptions, TargetRef,
};

use crate::process::ProcessTarget;
use crate::workspace::WorkspaceConfig;

/// Host that resolves targets from a workspace file and runs them as
/// local processes
pub struct LocalHost {
    root: PathBuf,
    workspace: WorkspaceConfig,
}

impl LocalHost {
    pub fn new(root: impl Into<PathBuf>, workspace: WorkspaceConfig) -> Self {
        Self {
            root: root.into(),
            workspace,
        }
    }

    /// Load a workspace file. Its directory becomes the workspace root.
    pub fn load(path: &Path) -> HostResult<Self> {
        let workspace = WorkspaceConfig::load(path)?;
        let root = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let root = root.canonicalize()?;
        debug!("Loaded workspace {} (root {})", path.display(), root.display());
        Ok(Self::new(root, workspace))
    }

    pub fn workspace(&self) -> &WorkspaceConfig {
        &self.workspace
    }
}

#[async_trait]
impl HostContext for LocalHost {
    fn workspace_root(&self) -> &Path {
        &self.root
    }

    fn resolve_target(&self, target: &str) -> HostResult<TargetRef> {
        let target: TargetRef = target.parse()?;
        self.workspace.target(&target)?;
        Ok(target)
    }

    async fn get_target_options(&self, target: &TargetRef) -> HostResult<TargetOptions> {
        self.workspace.resolve_options(target)
    }

    async fn schedule_target(
        &self,
        target: &TargetRef,
        overrides: TargetOptions,
    ) -> HostResult<Box<dyn ScheduledTarget>> {
        let (project, config) = self.workspace.target(target)?;
        if !config.is_schedulable() {
            return Err(HostError::NotSchedulable(target.to_string()));
        }

        let mut options = self.workspace.resolve_options(target)?;
        merge_options(&mut options, &overrides);

        let process = ProcessTarget::spawn(
            target.to_string(),
            &self.root.join(&project.root),
            &config.command,
            options,
            config.readiness.clone(),
        )?;
        Ok(Box::new(process))
    }
}
