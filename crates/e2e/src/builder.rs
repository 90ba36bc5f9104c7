//! The e2e builder: optional dev server, base URL, runner launch, cleanup

use futures::FutureExt;
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use tracing::{debug, error, info, warn};

use e2e_builder_common::{BuilderOutput, HostContext, ScheduledTarget, TargetRef};

use crate::base_url::{derive_base_url, ensure_trailing_slash};
use crate::error::{BuilderError, BuilderResult};
use crate::launcher::{ForkLauncher, LaunchRequest, RunnerLauncher, RunnerModule};
use crate::options::{RunOptions, UrlSource};
use crate::server::{ServerOptions, ServerOverrides};

/// Runs end-to-end tests through a [`RunnerLauncher`], starting a dev
/// server through the host first when the options ask for one.
pub struct E2eBuilder<L = ForkLauncher> {
    launcher: L,
    module: RunnerModule,
}

impl E2eBuilder<ForkLauncher> {
    /// Builder launching the default runner module with `node`
    pub fn new() -> Self {
        Self::with_launcher(ForkLauncher::default())
    }
}

impl Default for E2eBuilder<ForkLauncher> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: RunnerLauncher> E2eBuilder<L> {
    pub fn with_launcher(launcher: L) -> Self {
        Self {
            launcher,
            module: RunnerModule::default(),
        }
    }

    /// Use a different runner module or export
    pub fn with_module(mut self, module: RunnerModule) -> Self {
        self.module = module;
        self
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    pub fn module(&self) -> &RunnerModule {
        &self.module
    }

    /// Run the tests described by `options`.
    ///
    /// Only configuration problems come back as `Err`, and they are detected
    /// before anything is scheduled. Dev server and runner failures are
    /// reported as an unsuccessful output. A dev server started here is
    /// always stopped before this returns.
    pub async fn execute<C>(&self, options: &RunOptions, context: &C) -> BuilderResult<BuilderOutput>
    where
        C: HostContext + ?Sized,
    {
        let root = context.workspace_root();

        match options.url_source()? {
            UrlSource::Explicit(base_url) => Ok(self.run_tests(root, options, Some(base_url)).await),
            UrlSource::Unset => Ok(self.run_tests(root, options, None).await),
            UrlSource::DevServer(target) => {
                let target = context
                    .resolve_target(&target)
                    .map_err(|e| BuilderError::InvalidTarget(e.to_string()))?;
                Ok(self.run_with_dev_server(options, context, &target).await)
            }
        }
    }

    async fn run_with_dev_server<C>(
        &self,
        options: &RunOptions,
        context: &C,
        target: &TargetRef,
    ) -> BuilderOutput
    where
        C: HostContext + ?Sized,
    {
        let declared = match context.get_target_options(target).await {
            Ok(declared) => declared,
            Err(e) => {
                error!("Cannot read options of dev server target {}: {}", target, e);
                return BuilderOutput::failed_with(e);
            }
        };
        let server_options = ServerOptions::from_target_options(&declared);
        let resolved = ServerOverrides::resolve(options, &server_options);

        info!("Starting dev server {}", target);
        debug!("Dev server overrides: {:?}", resolved.overrides);

        let mut server = match context.schedule_target(target, resolved.overrides.clone()).await {
            Ok(server) => server,
            Err(e) => {
                error!("Failed to schedule dev server {}: {}", target, e);
                return BuilderOutput::failed_with(e);
            }
        };

        let run = self.run_against_server(
            server.as_mut(),
            options,
            context.workspace_root(),
            &server_options,
            &resolved.host,
        );
        let output = match AssertUnwindSafe(run).catch_unwind().await {
            Ok(output) => output,
            Err(panic) => {
                error!("Test run against {} panicked", target);
                BuilderOutput::failed_with(panic_message(panic.as_ref()))
            }
        };

        info!("Stopping dev server {}", target);
        if let Err(e) = server.stop().await {
            warn!("Failed to stop dev server {}: {}", target, e);
        }

        output
    }

    async fn run_against_server(
        &self,
        server: &mut dyn ScheduledTarget,
        options: &RunOptions,
        root: &Path,
        server_options: &ServerOptions,
        host: &str,
    ) -> BuilderOutput {
        let result = server.result().await;
        if !result.success {
            error!(
                "Dev server failed to start{}",
                result.error.as_deref().map(|e| format!(": {}", e)).unwrap_or_default()
            );
            return BuilderOutput {
                success: false,
                error: result.error,
                ..Default::default()
            };
        }

        // Nothing to derive from leaves whatever the options carried
        let base_url = derive_base_url(server_options, &result, host).or_else(|| options.base_url.clone());
        if let Some(base_url) = &base_url {
            info!("Dev server is ready at {}", base_url);
        }

        self.run_tests(root, options, base_url).await
    }

    async fn run_tests(&self, root: &Path, options: &RunOptions, base_url: Option<String>) -> BuilderOutput {
        let base_url = base_url.filter(|u| !u.is_empty()).map(ensure_trailing_slash);
        let overrides = match serde_json::to_value(options.runner_overrides(base_url)) {
            Ok(overrides) => overrides,
            Err(e) => return BuilderOutput::failed_with(e),
        };

        let config_path = options.config_path(root);
        debug!("Runner config: {}", config_path.display());

        let request = LaunchRequest::new(
            root,
            &self.module,
            vec![Value::String(config_path.to_string_lossy().into_owned()), overrides],
        );

        match AssertUnwindSafe(self.launcher.launch(request)).catch_unwind().await {
            Ok(Ok(output)) => {
                if output.success {
                    info!("End-to-end tests passed");
                } else {
                    warn!("End-to-end tests failed");
                }
                output
            }
            Ok(Err(e)) => {
                error!("Test runner failed: {}", e);
                BuilderOutput::failed_with(e)
            }
            Err(panic) => {
                error!("Test runner launch panicked");
                BuilderOutput::failed_with(panic_message(panic.as_ref()))
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with a non-string payload".to_string()
    }
}
