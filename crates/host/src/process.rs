//! Process-backed targets - spawning, readiness probing and stopping

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use e2e_builder_common::{option_flag, BuilderOutput, HostError, HostResult, ScheduledTarget, TargetOptions};

use crate::workspace::ReadinessConfig;

const PROBE_INTERVAL: Duration = Duration::from_millis(100);
const PROBE_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);
const STOP_GRACE_PERIOD: Duration = Duration::from_millis(500);

/// A target running as a child process.
///
/// The child is killed if the handle is dropped without being stopped.
pub struct ProcessTarget {
    name: String,
    child: Option<Child>,
    host: String,
    port: u16,
    ssl: bool,
    readiness: ReadinessConfig,
    first_result: Option<BuilderOutput>,
}

impl ProcessTarget {
    /// Start `command` in `cwd` with `options` passed as `--key=value`
    /// arguments. A free port is picked when the options carry none.
    pub fn spawn(
        name: impl Into<String>,
        cwd: &Path,
        command: &[String],
        mut options: TargetOptions,
        readiness: ReadinessConfig,
    ) -> HostResult<Self> {
        let name = name.into();
        let (program, args) = command
            .split_first()
            .ok_or_else(|| HostError::NotSchedulable(name.clone()))?;

        let port = match options.get("port").and_then(Value::as_u64) {
            Some(port) => u16::try_from(port)
                .map_err(|_| HostError::InvalidConfig(format!("port {} out of range", port)))?,
            None => {
                let port = find_free_port()?;
                options.insert("port".to_string(), Value::from(port));
                port
            }
        };
        let host = options
            .get("host")
            .and_then(Value::as_str)
            .unwrap_or("localhost")
            .to_string();
        let ssl = option_flag(&options, "ssl");

        info!("Starting target {} on port {}", name, port);

        let mut cmd = Command::new(program);
        cmd.args(args)
            .args(options_to_args(&options))
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| HostError::Spawn {
            target: name.clone(),
            reason: format!("{}: {}", program, e),
        })?;

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(name.clone(), stdout));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(name.clone(), stderr));
        }

        Ok(Self {
            name,
            child: Some(child),
            host,
            port,
            ssl,
            readiness,
            first_result: None,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Address the target serves on, as configured
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.scheme(), authority(&self.host, self.port))
    }

    fn scheme(&self) -> &'static str {
        if self.ssl {
            "https"
        } else {
            "http"
        }
    }

    /// URL probed for readiness. Wildcard binds are probed on loopback.
    fn probe_url(&self) -> String {
        let host = match self.host.as_str() {
            "0.0.0.0" => "127.0.0.1",
            "::" | "[::]" => "::1",
            other => other,
        };
        let path = if self.readiness.path.starts_with('/') {
            self.readiness.path.clone()
        } else {
            format!("/{}", self.readiness.path)
        };
        format!("{}://{}{}", self.scheme(), authority(host, self.port), path)
    }

    /// Poll the readiness URL until it answers 2xx, the process exits or
    /// the timeout elapses.
    async fn wait_for_ready(&mut self) -> BuilderOutput {
        let client = match reqwest::Client::builder()
            .timeout(PROBE_REQUEST_TIMEOUT)
            .danger_accept_invalid_certs(self.ssl)
            .build()
        {
            Ok(client) => client,
            Err(e) => return BuilderOutput::failed_with(e),
        };

        let probe_url = self.probe_url();
        let timeout = Duration::from_secs(self.readiness.timeout_secs);
        let start = Instant::now();
        let mut attempts = 0;

        while start.elapsed() < timeout {
            attempts += 1;

            if let Some(child) = self.child.as_mut() {
                match child.try_wait() {
                    Ok(Some(status)) => {
                        return BuilderOutput::failed_with(format!(
                            "target {} exited with {} before becoming ready",
                            self.name, status
                        ));
                    }
                    Ok(None) => {}
                    Err(e) => return BuilderOutput::failed_with(e),
                }
            } else {
                return BuilderOutput::failed_with(format!("target {} was stopped", self.name));
            }

            match client.get(&probe_url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    info!("Target {} is ready at {}", self.name, self.base_url());
                    return BuilderOutput::success()
                        .with_base_url(self.base_url())
                        .with_port(self.port);
                }
                Ok(resp) => {
                    debug!("Readiness probe returned {}", resp.status());
                }
                Err(e) => {
                    if attempts == 1 {
                        info!("Waiting for target {} to start...", self.name);
                    }
                    // Connection refused is expected while the server starts
                    if !e.is_connect() {
                        warn!("Readiness probe error: {}", e);
                    }
                }
            }

            sleep(PROBE_INTERVAL).await;
        }

        BuilderOutput::failed_with(format!(
            "target {} not ready after {} probes ({}s)",
            self.name, attempts, self.readiness.timeout_secs
        ))
    }
}

#[async_trait]
impl ScheduledTarget for ProcessTarget {
    async fn result(&mut self) -> BuilderOutput {
        if let Some(result) = &self.first_result {
            return result.clone();
        }
        let result = self.wait_for_ready().await;
        self.first_result = Some(result.clone());
        result
    }

    async fn stop(&mut self) -> HostResult<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        if child.try_wait()?.is_some() {
            return Ok(());
        }

        info!("Stopping target {} (pid: {:?})", self.name, child.id());

        // Try graceful shutdown first
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if let Some(pid) = child.id() {
                if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok()
                    && tokio::time::timeout(STOP_GRACE_PERIOD, child.wait()).await.is_ok()
                {
                    return Ok(());
                }
            }
        }

        // Force kill if still running
        child.kill().await?;
        Ok(())
    }
}

/// Relay a target's output into the log until the pipe closes. Returns
/// the number of lines relayed.
async fn forward_lines<R>(name: String, output: R) -> usize
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(output);
    let mut buf = Vec::new();
    let mut relayed = 0;
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!("Error reading output of {}: {}", name, e);
                break;
            }
        }

        let line = String::from_utf8_lossy(&buf);
        debug!(target: "e2e_builder_host::target", "[{}] {}", name, line.trim_end_matches(['\r', '\n']));
        relayed += 1;
    }
    relayed
}

/// Render options as `--key=value` arguments. Arrays repeat the flag,
/// nulls are dropped and objects are passed as JSON.
pub fn options_to_args(options: &TargetOptions) -> Vec<String> {
    let mut args = Vec::new();
    for (key, value) in options {
        match value {
            Value::Null => {}
            Value::Array(items) => {
                for item in items.iter().filter(|i| !i.is_null()) {
                    args.push(format!("--{}={}", key, arg_value(item)));
                }
            }
            other => args.push(format!("--{}={}", key, arg_value(other))),
        }
    }
    args
}

fn arg_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn authority(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

/// Find a free port to use
pub fn find_free_port() -> HostResult<u16> {
    use std::net::TcpListener;

    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}
