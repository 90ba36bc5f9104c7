//! Out-of-process runner launch
//!
//! The runner module ends its host process when it finishes, so it never
//! runs inside ours. [`ForkLauncher`] starts a `node` child that loads the
//! module, calls the requested export and reports back over stdout. Report
//! lines are tagged with [`REPORT_MARKER`]; everything else the runner prints
//! is passed through.

use async_trait::async_trait;
use e2e_builder_common::BuilderOutput;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{LaunchError, LaunchResult};

/// Prefix of report lines written by the bootstrap script
pub const REPORT_MARKER: &str = "@@e2e-builder:";

/// Environment variable carrying the JSON launch request to the bootstrap
pub const LAUNCH_ENV: &str = "E2E_BUILDER_LAUNCH";

/// How long to keep draining runner output after the process exits.
/// Grandchildren (browsers, drivers) can hold the pipe open.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

const BOOTSTRAP: &str = r#"'use strict';
const MARKER = '@@e2e-builder:';
const request = JSON.parse(process.env.E2E_BUILDER_LAUNCH);

function report(message) {
  process.stdout.write(MARKER + JSON.stringify(message) + '\n');
}

function fail(error) {
  report({ success: false, error: String((error && (error.stack || error.message)) || error) });
  process.exitCode = 1;
}

let runner;
try {
  const entry = require.resolve(request.entryPoint, { paths: [request.workingDirectory] });
  runner = require(entry);
} catch (error) {
  fail(error);
}

if (runner !== undefined) {
  const fn = runner[request.functionName];
  if (typeof fn !== 'function') {
    fail(`${request.entryPoint} does not export a function named ${request.functionName}`);
  } else {
    Promise.resolve()
      .then(() => fn(...request.args))
      .then((value) => {
        if (value && typeof value === 'object' && typeof value.success === 'boolean') {
          report(value);
        }
      }, fail);
  }
}
"#;

/// Module and export the runner is started through
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerModule {
    pub entry_point: String,
    pub function: String,
}

impl Default for RunnerModule {
    fn default() -> Self {
        Self {
            entry_point: "protractor/built/launcher".to_string(),
            function: "init".to_string(),
        }
    }
}

/// One call into the runner module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchRequest {
    pub working_directory: PathBuf,
    pub entry_point: String,
    pub function_name: String,
    pub args: Vec<Value>,
}

impl LaunchRequest {
    pub fn new(working_directory: impl Into<PathBuf>, module: &RunnerModule, args: Vec<Value>) -> Self {
        Self {
            working_directory: working_directory.into(),
            entry_point: module.entry_point.clone(),
            function_name: module.function.clone(),
            args,
        }
    }
}

/// Runs the test runner in isolation and reports its outcome
#[async_trait]
pub trait RunnerLauncher: Send + Sync {
    async fn launch(&self, request: LaunchRequest) -> LaunchResult<BuilderOutput>;
}

/// Launches the runner module in a `node` child process
#[derive(Debug, Clone)]
pub struct ForkLauncher {
    node_binary: PathBuf,
}

impl Default for ForkLauncher {
    fn default() -> Self {
        Self::new("node")
    }
}

impl ForkLauncher {
    pub fn new(node_binary: impl Into<PathBuf>) -> Self {
        Self {
            node_binary: node_binary.into(),
        }
    }

    pub fn node_binary(&self) -> &std::path::Path {
        &self.node_binary
    }
}

#[async_trait]
impl RunnerLauncher for ForkLauncher {
    async fn launch(&self, request: LaunchRequest) -> LaunchResult<BuilderOutput> {
        // Stays alive until the child has exited
        let staging = tempfile::tempdir()?;
        let script_path = staging.path().join("bootstrap.js");
        tokio::fs::write(&script_path, BOOTSTRAP).await?;

        info!(
            "Launching {}#{} in {}",
            request.entry_point,
            request.function_name,
            request.working_directory.display()
        );

        let payload = serde_json::to_string(&request)?;
        let mut child = Command::new(&self.node_binary)
            .arg(&script_path)
            .current_dir(&request.working_directory)
            .env(LAUNCH_ENV, payload)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| LaunchError::Spawn {
                program: self.node_binary.display().to_string(),
                source,
            })?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let reader = child
            .stdout
            .take()
            .map(|stdout| tokio::spawn(forward_output(stdout, tx)));

        let status = child.wait().await?;
        debug!("Runner process exited with {}", status);

        if let Some(mut reader) = reader {
            if tokio::time::timeout(DRAIN_TIMEOUT, &mut reader).await.is_err() {
                warn!("Runner output still open after exit, no longer reading it");
                reader.abort();
            }
        }

        let mut last_report = None;
        while let Ok(report) = rx.try_recv() {
            last_report = Some(report);
        }

        Ok(settle(last_report, status.code()))
    }
}

/// Copy runner output to our stdout, sending decoded report lines to `tx`.
///
/// Reads until the pipe closes. Output that is not valid UTF-8 is passed
/// through lossily so the runner never writes into a closed pipe.
async fn forward_output<R>(output: R, tx: mpsc::UnboundedSender<BuilderOutput>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(output);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!("Error reading runner output: {}", e);
                break;
            }
        }

        let decoded = String::from_utf8_lossy(&buf);
        let line = decoded.trim_end_matches(['\r', '\n']);

        let Some(pos) = line.find(REPORT_MARKER) else {
            println!("{}", line);
            continue;
        };

        if pos > 0 {
            println!("{}", &line[..pos]);
        }
        match serde_json::from_str::<BuilderOutput>(&line[pos + REPORT_MARKER.len()..]) {
            Ok(report) => {
                let _ = tx.send(report);
            }
            Err(e) => warn!("Ignoring malformed runner report: {}", e),
        }
    }
}

/// Combine the runner's last report with its exit code. A run only
/// succeeds if both agree.
fn settle(report: Option<BuilderOutput>, exit_code: Option<i32>) -> BuilderOutput {
    let exited_ok = exit_code == Some(0);
    let exit_description = match exit_code {
        Some(code) => format!("Runner exited with code {}", code),
        None => "Runner was terminated by a signal".to_string(),
    };

    match report {
        Some(mut output) => {
            output.success = output.success && exited_ok;
            if !exited_ok && output.error.is_none() {
                output.error = Some(exit_description);
            }
            output
        }
        None if exited_ok => BuilderOutput::success(),
        None => BuilderOutput::failed_with(exit_description),
    }
}
