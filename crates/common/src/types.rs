//! Core types shared between hosts and builders

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::HostError;

/// Options declared for a target, or overrides applied when scheduling one.
///
/// Hosts hand these around as untyped JSON objects; builders pick out the
/// fields they understand and ignore the rest.
pub type TargetOptions = Map<String, Value>;

/// Reference to a host-managed build target: `project:target[:configuration]`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetRef {
    pub project: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<String>,
}

impl TargetRef {
    pub fn new(project: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            target: target.into(),
            configuration: None,
        }
    }

    pub fn with_configuration(mut self, configuration: impl Into<String>) -> Self {
        self.configuration = Some(configuration.into());
        self
    }

    /// Configuration names in application order. `"a,b"` applies `a` then `b`.
    pub fn configurations(&self) -> impl Iterator<Item = &str> {
        self.configuration
            .as_deref()
            .unwrap_or("")
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }
}

impl FromStr for TargetRef {
    type Err = HostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Anything past the third segment is dropped, same as the host CLI does.
        let mut parts = s.splitn(3, ':');
        let project = parts.next().unwrap_or_default();
        let target = match parts.next() {
            Some(t) => t,
            None => return Err(HostError::InvalidTarget(s.to_string())),
        };
        if project.is_empty() || target.is_empty() {
            return Err(HostError::InvalidTarget(s.to_string()));
        }

        Ok(Self {
            project: project.to_string(),
            target: target.to_string(),
            configuration: parts.next().map(|c| c.split(':').next().unwrap_or(c).to_string()),
        })
    }
}

impl fmt::Display for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.project, self.target)?;
        if let Some(configuration) = &self.configuration {
            write!(f, ":{}", configuration)?;
        }
        Ok(())
    }
}

/// Result reported by a builder or a scheduled target
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuilderOutput {
    #[serde(default)]
    pub success: bool,

    /// Address a server target is reachable at
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Port a server target is listening on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Cause of a failure, when one is known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Anything else the producer reported
    #[serde(flatten)]
    pub info: Map<String, Value>,
}

impl BuilderOutput {
    pub fn success() -> Self {
        Self {
            success: true,
            ..Default::default()
        }
    }

    pub fn failure() -> Self {
        Self::default()
    }

    /// A failed output carrying the cause
    pub fn failed_with(error: impl fmt::Display) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
            ..Default::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }
}

/// Shallow merge: every key of `overlay` replaces the same key in `base`.
pub fn merge_options(base: &mut TargetOptions, overlay: &TargetOptions) {
    for (key, value) in overlay {
        base.insert(key.clone(), value.clone());
    }
}

/// Read `key` as a flag. Options may carry it as a boolean, a string or a
/// number depending on who wrote the workspace file, so any non-empty,
/// non-zero value counts as set.
pub fn option_flag(options: &TargetOptions, key: &str) -> bool {
    options.get(key).map(is_truthy).unwrap_or(false)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
