//! `run` - execute an e2e target from the workspace

use anyhow::Context;
use clap::Args;
use serde_json::Value;
use std::path::PathBuf;
use tracing::{debug, info};

use e2e_builder::{E2eBuilder, ForkLauncher, RunOptions, RunnerModule};
use e2e_builder_common::{HostContext, TargetOptions};
use e2e_builder_host::LocalHost;

use crate::output::{self, OutputFormat};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Target holding the run options, e.g. `app:e2e` or `app:e2e:ci`
    pub target: String,

    /// Run against this address instead of starting a dev server
    #[arg(long)]
    pub base_url: Option<String>,

    /// Dev server target to start before the tests
    #[arg(long)]
    pub dev_server_target: Option<String>,

    /// Host override for the dev server
    #[arg(long)]
    pub host: Option<String>,

    /// Port override for the dev server
    #[arg(long)]
    pub port: Option<u16>,

    /// Spec patterns replacing the runner config's list (repeatable)
    #[arg(long = "specs", num_args = 1..)]
    pub specs: Vec<String>,

    /// Suite from the runner config to run
    #[arg(long)]
    pub suite: Option<String>,

    /// Start the runner's element explorer
    #[arg(long)]
    pub element_explorer: bool,

    /// Runner config file, relative to the workspace root
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Node.js binary used to launch the runner
    #[arg(long, env = "E2E_BUILDER_NODE", default_value = "node")]
    pub node: PathBuf,

    /// Module the runner is started from
    #[arg(long)]
    pub runner_module: Option<String>,

    /// Function of the runner module to call
    #[arg(long)]
    pub runner_function: Option<String>,
}

impl RunArgs {
    /// Layer command-line flags over the target's declared options
    fn apply_to(&self, options: &mut TargetOptions) {
        let mut set = |key: &str, value: Value| {
            options.insert(key.to_string(), value);
        };

        if let Some(base_url) = &self.base_url {
            set("baseUrl", Value::from(base_url.as_str()));
        }
        if let Some(target) = &self.dev_server_target {
            set("devServerTarget", Value::from(target.as_str()));
        }
        if let Some(host) = &self.host {
            set("host", Value::from(host.as_str()));
        }
        if let Some(port) = self.port {
            set("port", Value::from(port));
        }
        if !self.specs.is_empty() {
            set("specs", Value::from(self.specs.clone()));
        }
        if let Some(suite) = &self.suite {
            set("suite", Value::from(suite.as_str()));
        }
        if self.element_explorer {
            set("elementExplorer", Value::Bool(true));
        }
        if let Some(config) = &self.config {
            set("protractorConfig", Value::from(config.to_string_lossy().into_owned()));
        }
    }

    fn runner_module(&self) -> RunnerModule {
        let default = RunnerModule::default();
        RunnerModule {
            entry_point: self.runner_module.clone().unwrap_or(default.entry_point),
            function: self.runner_function.clone().unwrap_or(default.function),
        }
    }
}

/// Run the target. Returns whether the tests passed.
pub async fn execute(args: RunArgs, host: &LocalHost, format: OutputFormat) -> anyhow::Result<bool> {
    let target = host.resolve_target(&args.target)?;
    let mut declared = host.get_target_options(&target).await?;
    args.apply_to(&mut declared);
    debug!("Run options for {}: {:?}", target, declared);

    let options: RunOptions = serde_json::from_value(Value::Object(declared))
        .with_context(|| format!("Target {} does not hold valid e2e options", target))?;

    let builder = E2eBuilder::with_launcher(ForkLauncher::new(&args.node)).with_module(args.runner_module());

    info!("Running {}", target);
    let result = builder.execute(&options, host).await?;

    output::print_item(&result, format);
    Ok(result.success)
}
