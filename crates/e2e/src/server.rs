//! Dev server options and the overrides used when scheduling it

use e2e_builder_common::{option_flag, TargetOptions};
use serde_json::Value;

use crate::options::RunOptions;

/// Host used when neither the run options nor the dev server declare one
pub const DEFAULT_HOST: &str = "localhost";

/// The parts of a dev server target's declared options the builder reads.
///
/// Values of an unexpected JSON type are treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerOptions {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub public_host: Option<String>,
    pub ssl: bool,
}

impl ServerOptions {
    pub fn from_target_options(options: &TargetOptions) -> Self {
        Self {
            host: options.get("host").and_then(Value::as_str).map(String::from),
            port: options
                .get("port")
                .and_then(Value::as_u64)
                .and_then(|p| u16::try_from(p).ok()),
            public_host: options
                .get("publicHost")
                .and_then(Value::as_str)
                .map(String::from),
            ssl: option_flag(options, "ssl"),
        }
    }

    pub fn scheme(&self) -> &'static str {
        if self.ssl {
            "https"
        } else {
            "http"
        }
    }
}

/// Overrides for scheduling the dev server, plus the host the builder
/// derives its base URL from. The port comes from the server's result.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerOverrides {
    pub overrides: TargetOptions,
    pub host: String,
}

impl ServerOverrides {
    /// Host precedence: run option, then the server's declared value, then
    /// the default. A port is only overridden when the run options give one. Only run options and the default
    /// host become overrides; declared values are already the server's own.
    pub fn resolve(options: &RunOptions, server: &ServerOptions) -> Self {
        let mut overrides = TargetOptions::new();
        // A one-shot test run must not leave a file watcher behind
        overrides.insert("watch".to_string(), Value::Bool(false));

        let host = match (&options.host, &server.host) {
            (Some(host), _) => {
                overrides.insert("host".to_string(), Value::from(host.as_str()));
                host.clone()
            }
            (None, Some(declared)) => declared.clone(),
            (None, None) => {
                overrides.insert("host".to_string(), Value::from(DEFAULT_HOST));
                DEFAULT_HOST.to_string()
            }
        };

        if let Some(port) = options.port {
            overrides.insert("port".to_string(), Value::from(port));
        }

        Self { overrides, host }
    }
}
