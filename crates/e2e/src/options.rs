//! Builder options and the overrides handed to the test runner

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{BuilderError, BuilderResult};

/// Options for one end-to-end test run, as declared on the host target
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOptions {
    /// Start the runner's interactive element explorer
    #[serde(default)]
    pub element_explorer: bool,

    /// Address the tests run against. Conflicts with `dev_server_target`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Spec file patterns, replacing the ones in the runner config
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub specs: Vec<String>,

    /// Suite from the runner config to run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suite: Option<String>,

    /// Dev server target to start before the tests, e.g. `app:serve`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dev_server_target: Option<String>,

    /// Host override for the dev server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Port override for the dev server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Runner config file, relative to the workspace root
    pub protractor_config: PathBuf,
}

/// Where the base URL of a run comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlSource {
    /// Given directly in the options
    Explicit(String),
    /// Derived from a dev server started from this target string
    DevServer(String),
    /// Left to the runner config
    Unset,
}

impl RunOptions {
    /// Classify the options by base URL source.
    ///
    /// Empty strings count as unset.
    pub fn url_source(&self) -> BuilderResult<UrlSource> {
        let base_url = self.base_url.as_deref().filter(|u| !u.is_empty());
        let target = self.dev_server_target.as_deref().filter(|t| !t.is_empty());

        match (base_url, target) {
            (Some(_), Some(_)) => Err(BuilderError::ConflictingBaseUrl),
            (Some(url), None) => Ok(UrlSource::Explicit(url.to_string())),
            (None, Some(target)) => Ok(UrlSource::DevServer(target.to_string())),
            (None, None) => Ok(UrlSource::Unset),
        }
    }

    /// Runner config path resolved against the workspace root
    pub fn config_path(&self, root: &Path) -> PathBuf {
        root.join(&self.protractor_config)
    }

    /// Overrides passed to the runner alongside its config file
    pub fn runner_overrides(&self, base_url: Option<String>) -> RunnerOverrides {
        RunnerOverrides {
            element_explorer: self.element_explorer,
            base_url,
            specs: if self.specs.is_empty() {
                None
            } else {
                Some(self.specs.clone())
            },
            suite: self.suite.clone(),
        }
    }
}

/// Settings that take precedence over the runner's own config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunnerOverrides {
    pub element_explorer: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Absent when no specs were given so the runner config's list applies
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specs: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub suite: Option<String>,
}
