//! Workspace file: projects, their targets and target options

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use e2e_builder_common::{merge_options, HostError, HostResult, TargetOptions, TargetRef};

/// Workspace file format version understood by this host
pub const WORKSPACE_VERSION: u32 = 1;

/// Parsed workspace file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub projects: BTreeMap<String, ProjectConfig>,
}

fn default_version() -> u32 {
    WORKSPACE_VERSION
}

/// A project in the workspace
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    /// Project directory, relative to the workspace root
    #[serde(default)]
    pub root: PathBuf,

    #[serde(default)]
    pub targets: BTreeMap<String, TargetConfig>,
}

/// A target of a project
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetConfig {
    /// Program and arguments started when the target is scheduled.
    /// Targets without one can be inspected but not scheduled.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,

    /// Default options
    #[serde(default)]
    pub options: TargetOptions,

    /// Named option sets layered over `options`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub configurations: BTreeMap<String, TargetOptions>,

    /// How to tell a scheduled target is ready
    #[serde(default)]
    pub readiness: ReadinessConfig,
}

impl TargetConfig {
    pub fn is_schedulable(&self) -> bool {
        !self.command.is_empty()
    }
}

/// HTTP readiness probe for a scheduled target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadinessConfig {
    /// Path probed on the target's host and port
    #[serde(default = "default_ready_path")]
    pub path: String,

    /// Give up after this many seconds
    #[serde(default = "default_ready_timeout")]
    pub timeout_secs: u64,
}

fn default_ready_path() -> String {
    "/".to_string()
}

fn default_ready_timeout() -> u64 {
    120
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            path: default_ready_path(),
            timeout_secs: default_ready_timeout(),
        }
    }
}

impl WorkspaceConfig {
    /// Load a workspace file. `.toml` files are read as TOML, anything else
    /// as JSON.
    pub fn load(path: &Path) -> HostResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let is_toml = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("toml"))
            .unwrap_or(false);

        if is_toml {
            Self::from_toml(&content)
        } else {
            Self::from_json(&content)
        }
    }

    pub fn from_json(content: &str) -> HostResult<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()
    }

    pub fn from_toml(content: &str) -> HostResult<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| HostError::InvalidConfig(e.to_string()))?;
        config.validate()
    }

    fn validate(self) -> HostResult<Self> {
        if self.version != WORKSPACE_VERSION {
            return Err(HostError::InvalidConfig(format!(
                "unsupported workspace version {} (expected {})",
                self.version, WORKSPACE_VERSION
            )));
        }
        for (name, project) in &self.projects {
            for (target_name, target) in &project.targets {
                if target.command.first().map(|p| p.is_empty()).unwrap_or(false) {
                    return Err(HostError::InvalidConfig(format!(
                        "target {}:{} has an empty program name",
                        name, target_name
                    )));
                }
            }
        }
        Ok(self)
    }

    pub fn project(&self, name: &str) -> HostResult<&ProjectConfig> {
        self.projects
            .get(name)
            .ok_or_else(|| HostError::ProjectNotFound(name.to_string()))
    }

    /// Look up a target, checking that every configuration it names exists
    pub fn target(&self, target: &TargetRef) -> HostResult<(&ProjectConfig, &TargetConfig)> {
        let project = self.project(&target.project)?;
        let config = project
            .targets
            .get(&target.target)
            .ok_or_else(|| HostError::TargetNotFound {
                project: target.project.clone(),
                target: target.target.clone(),
            })?;

        for name in target.configurations() {
            if !config.configurations.contains_key(name) {
                return Err(HostError::ConfigurationNotFound {
                    target: format!("{}:{}", target.project, target.target),
                    configuration: name.to_string(),
                });
            }
        }

        Ok((project, config))
    }

    /// Target options with its configurations applied in order
    pub fn resolve_options(&self, target: &TargetRef) -> HostResult<TargetOptions> {
        let (_, config) = self.target(target)?;
        let mut options = config.options.clone();
        for name in target.configurations() {
            if let Some(overlay) = config.configurations.get(name) {
                merge_options(&mut options, overlay);
            }
        }
        Ok(options)
    }

    /// Every `(project, target name, target)` in the workspace
    pub fn targets(&self) -> impl Iterator<Item = (&str, &str, &TargetConfig)> {
        self.projects.iter().flat_map(|(project, config)| {
            config
                .targets
                .iter()
                .map(move |(name, target)| (project.as_str(), name.as_str(), target))
        })
    }
}
