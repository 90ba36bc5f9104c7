//! Behaviour of `E2eBuilder::execute` against a stub host and launcher

use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use e2e_builder::{
    BuilderError, E2eBuilder, LaunchError, LaunchRequest, LaunchResult, RunOptions, RunnerLauncher,
};
use e2e_builder_common::{
    BuilderOutput, HostContext, HostError, HostResult, ScheduledTarget, TargetOptions, TargetRef,
};

type Events = Arc<Mutex<Vec<String>>>;

struct StubServer {
    result: BuilderOutput,
    events: Events,
}

#[async_trait]
impl ScheduledTarget for StubServer {
    async fn result(&mut self) -> BuilderOutput {
        self.result.clone()
    }

    async fn stop(&mut self) -> HostResult<()> {
        self.events.lock().unwrap().push("stop".to_string());
        Ok(())
    }
}

struct StubHost {
    root: PathBuf,
    declared: TargetOptions,
    result: BuilderOutput,
    fail_options: bool,
    fail_schedule: bool,
    scheduled: Mutex<Vec<(TargetRef, TargetOptions)>>,
    events: Events,
}

impl StubHost {
    fn new(declared: Value, result: BuilderOutput, events: &Events) -> Self {
        Self {
            root: PathBuf::from("/workspace"),
            declared: declared.as_object().cloned().unwrap_or_default(),
            result,
            fail_options: false,
            fail_schedule: false,
            scheduled: Mutex::new(Vec::new()),
            events: events.clone(),
        }
    }

    fn scheduled(&self) -> Vec<(TargetRef, TargetOptions)> {
        self.scheduled.lock().unwrap().clone()
    }
}

#[async_trait]
impl HostContext for StubHost {
    fn workspace_root(&self) -> &Path {
        &self.root
    }

    async fn get_target_options(&self, target: &TargetRef) -> HostResult<TargetOptions> {
        if self.fail_options {
            return Err(HostError::TargetNotFound {
                project: target.project.clone(),
                target: target.target.clone(),
            });
        }
        Ok(self.declared.clone())
    }

    async fn schedule_target(
        &self,
        target: &TargetRef,
        overrides: TargetOptions,
    ) -> HostResult<Box<dyn ScheduledTarget>> {
        if self.fail_schedule {
            return Err(HostError::NotSchedulable(target.to_string()));
        }
        self.scheduled.lock().unwrap().push((target.clone(), overrides));
        self.events.lock().unwrap().push("schedule".to_string());
        Ok(Box::new(StubServer {
            result: self.result.clone(),
            events: self.events.clone(),
        }))
    }
}

#[derive(Clone, Copy)]
enum Outcome {
    Pass,
    Fail,
    Error,
    Panic,
}

struct StubLauncher {
    outcome: Outcome,
    requests: Mutex<Vec<LaunchRequest>>,
    events: Events,
}

impl StubLauncher {
    fn new(outcome: Outcome, events: &Events) -> Self {
        Self {
            outcome,
            requests: Mutex::new(Vec::new()),
            events: events.clone(),
        }
    }

    fn requests(&self) -> Vec<LaunchRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn runner_overrides(&self) -> Value {
        self.requests()[0].args[1].clone()
    }
}

#[async_trait]
impl RunnerLauncher for StubLauncher {
    async fn launch(&self, request: LaunchRequest) -> LaunchResult<BuilderOutput> {
        self.requests.lock().unwrap().push(request);
        self.events.lock().unwrap().push("launch".to_string());
        match self.outcome {
            Outcome::Pass => Ok(BuilderOutput::success()),
            Outcome::Fail => Ok(BuilderOutput::failed_with("1 spec failed")),
            Outcome::Error => Err(LaunchError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "runner went away",
            ))),
            Outcome::Panic => panic!("runner blew up"),
        }
    }
}

fn events() -> Events {
    Arc::new(Mutex::new(Vec::new()))
}

fn recorded(events: &Events) -> Vec<String> {
    events.lock().unwrap().clone()
}

fn options() -> RunOptions {
    RunOptions {
        protractor_config: PathBuf::from("e2e/protractor.conf.js"),
        ..Default::default()
    }
}

fn dev_server_options() -> RunOptions {
    RunOptions {
        dev_server_target: Some("app:serve".to_string()),
        ..options()
    }
}

#[tokio::test]
async fn test_conflicting_base_url_fails_before_scheduling() {
    let events = events();
    let host = StubHost::new(json!({}), BuilderOutput::success().with_port(4200), &events);
    let builder = E2eBuilder::with_launcher(StubLauncher::new(Outcome::Pass, &events));
    let opts = RunOptions {
        base_url: Some("http://localhost:4200".to_string()),
        ..dev_server_options()
    };

    let result = builder.execute(&opts, &host).await;

    assert!(matches!(result, Err(BuilderError::ConflictingBaseUrl)));
    assert!(recorded(&events).is_empty());
}

#[tokio::test]
async fn test_invalid_target_is_a_configuration_error() {
    let events = events();
    let host = StubHost::new(json!({}), BuilderOutput::success(), &events);
    let builder = E2eBuilder::with_launcher(StubLauncher::new(Outcome::Pass, &events));
    let opts = RunOptions {
        dev_server_target: Some("app".to_string()),
        ..options()
    };

    let result = builder.execute(&opts, &host).await;

    assert!(matches!(result, Err(BuilderError::InvalidTarget(_))));
    assert!(recorded(&events).is_empty());
}

#[tokio::test]
async fn test_failed_dev_server_skips_runner_and_stops_once() {
    let events = events();
    let host = StubHost::new(json!({}), BuilderOutput::failed_with("port in use"), &events);
    let builder = E2eBuilder::with_launcher(StubLauncher::new(Outcome::Pass, &events));

    let output = builder.execute(&dev_server_options(), &host).await.unwrap();

    assert!(!output.success);
    assert_eq!(output.error.as_deref(), Some("port in use"));
    assert!(builder.launcher().requests().is_empty());
    assert_eq!(recorded(&events), vec!["schedule", "stop"]);
}

#[tokio::test]
async fn test_dev_server_on_declared_host_and_port() {
    let events = events();
    let host = StubHost::new(
        json!({ "host": "0.0.0.0", "port": 4300, "ssl": false }),
        BuilderOutput::success().with_port(4300),
        &events,
    );
    let builder = E2eBuilder::with_launcher(StubLauncher::new(Outcome::Pass, &events));

    let output = builder.execute(&dev_server_options(), &host).await.unwrap();

    assert!(output.success);

    let scheduled = host.scheduled();
    assert_eq!(scheduled.len(), 1);
    assert_eq!(scheduled[0].0, TargetRef::new("app", "serve"));
    assert_eq!(Value::Object(scheduled[0].1.clone()), json!({ "watch": false }));

    let overrides = builder.launcher().runner_overrides();
    assert_eq!(overrides["baseUrl"], json!("http://0.0.0.0:4300/"));
    assert_eq!(recorded(&events), vec!["schedule", "launch", "stop"]);
}

#[tokio::test]
async fn test_explicit_host_and_port_become_overrides() {
    let events = events();
    let host = StubHost::new(
        json!({ "host": "0.0.0.0", "port": 4300 }),
        BuilderOutput::success().with_port(5000),
        &events,
    );
    let builder = E2eBuilder::with_launcher(StubLauncher::new(Outcome::Pass, &events));
    let opts = RunOptions {
        host: Some("127.0.0.1".to_string()),
        port: Some(5000),
        ..dev_server_options()
    };

    builder.execute(&opts, &host).await.unwrap();

    assert_eq!(
        Value::Object(host.scheduled()[0].1.clone()),
        json!({ "watch": false, "host": "127.0.0.1", "port": 5000 })
    );
    assert_eq!(
        builder.launcher().runner_overrides()["baseUrl"],
        json!("http://127.0.0.1:5000/")
    );
}

#[tokio::test]
async fn test_default_host_when_none_declared() {
    let events = events();
    let host = StubHost::new(json!({}), BuilderOutput::success().with_port(4200), &events);
    let builder = E2eBuilder::with_launcher(StubLauncher::new(Outcome::Pass, &events));

    builder.execute(&dev_server_options(), &host).await.unwrap();

    assert_eq!(
        Value::Object(host.scheduled()[0].1.clone()),
        json!({ "watch": false, "host": "localhost" })
    );
    assert_eq!(
        builder.launcher().runner_overrides()["baseUrl"],
        json!("http://localhost:4200/")
    );
}

#[tokio::test]
async fn test_public_host_wins() {
    let events = events();
    let host = StubHost::new(
        json!({ "publicHost": "example.com", "ssl": true }),
        BuilderOutput::success()
            .with_base_url("https://localhost:4200")
            .with_port(4200),
        &events,
    );
    let builder = E2eBuilder::with_launcher(StubLauncher::new(Outcome::Pass, &events));

    builder.execute(&dev_server_options(), &host).await.unwrap();

    assert_eq!(
        builder.launcher().runner_overrides()["baseUrl"],
        json!("https://example.com/")
    );
}

#[tokio::test]
async fn test_reported_base_url_used_when_no_public_host() {
    let events = events();
    let host = StubHost::new(
        json!({}),
        BuilderOutput::success()
            .with_base_url("http://localhost:4200/app/")
            .with_port(4200),
        &events,
    );
    let builder = E2eBuilder::with_launcher(StubLauncher::new(Outcome::Pass, &events));

    builder.execute(&dev_server_options(), &host).await.unwrap();

    assert_eq!(
        builder.launcher().runner_overrides()["baseUrl"],
        json!("http://localhost:4200/app/")
    );
}

#[tokio::test]
async fn test_no_derivable_base_url_leaves_it_unset() {
    let events = events();
    let host = StubHost::new(json!({}), BuilderOutput::success(), &events);
    let builder = E2eBuilder::with_launcher(StubLauncher::new(Outcome::Pass, &events));

    let output = builder.execute(&dev_server_options(), &host).await.unwrap();

    assert!(output.success);
    assert!(builder.launcher().runner_overrides().get("baseUrl").is_none());
}

#[tokio::test]
async fn test_launcher_error_reports_failure_and_stops_server() {
    let events = events();
    let host = StubHost::new(json!({}), BuilderOutput::success().with_port(4200), &events);
    let builder = E2eBuilder::with_launcher(StubLauncher::new(Outcome::Error, &events));

    let output = builder.execute(&dev_server_options(), &host).await.unwrap();

    assert!(!output.success);
    assert!(output.error.unwrap().contains("runner went away"));
    assert_eq!(recorded(&events), vec!["schedule", "launch", "stop"]);
}

#[tokio::test]
async fn test_launcher_panic_reports_failure_and_stops_server() {
    let events = events();
    let host = StubHost::new(json!({}), BuilderOutput::success().with_port(4200), &events);
    let builder = E2eBuilder::with_launcher(StubLauncher::new(Outcome::Panic, &events));

    let output = builder.execute(&dev_server_options(), &host).await.unwrap();

    assert!(!output.success);
    assert_eq!(output.error.as_deref(), Some("runner blew up"));
    assert_eq!(recorded(&events), vec!["schedule", "launch", "stop"]);
}

#[tokio::test]
async fn test_failed_tests_are_passed_through() {
    let events = events();
    let host = StubHost::new(json!({}), BuilderOutput::success().with_port(4200), &events);
    let builder = E2eBuilder::with_launcher(StubLauncher::new(Outcome::Fail, &events));

    let output = builder.execute(&dev_server_options(), &host).await.unwrap();

    assert!(!output.success);
    assert_eq!(output.error.as_deref(), Some("1 spec failed"));
    assert_eq!(recorded(&events), vec!["schedule", "launch", "stop"]);
}

#[tokio::test]
async fn test_host_errors_are_unsuccessful_outputs() {
    let events = events();
    let mut host = StubHost::new(json!({}), BuilderOutput::success(), &events);
    host.fail_options = true;
    let builder = E2eBuilder::with_launcher(StubLauncher::new(Outcome::Pass, &events));

    let output = builder.execute(&dev_server_options(), &host).await.unwrap();
    assert!(!output.success);
    assert!(recorded(&events).is_empty());

    host.fail_options = false;
    host.fail_schedule = true;
    let output = builder.execute(&dev_server_options(), &host).await.unwrap();
    assert!(!output.success);
    assert!(output.error.unwrap().contains("cannot be scheduled"));
    assert!(recorded(&events).is_empty());
}

#[tokio::test]
async fn test_explicit_base_url_gets_trailing_slash() {
    let events = events();
    let host = StubHost::new(json!({}), BuilderOutput::success(), &events);
    let builder = E2eBuilder::with_launcher(StubLauncher::new(Outcome::Pass, &events));
    let opts = RunOptions {
        base_url: Some("http://staging.example.com".to_string()),
        specs: vec!["b.e2e-spec.ts".to_string(), "a.e2e-spec.ts".to_string()],
        suite: Some("smoke".to_string()),
        element_explorer: true,
        ..options()
    };

    let output = builder.execute(&opts, &host).await.unwrap();

    assert!(output.success);
    assert!(host.scheduled().is_empty());

    let request = &builder.launcher().requests()[0];
    assert_eq!(request.working_directory, PathBuf::from("/workspace"));
    assert_eq!(request.entry_point, "protractor/built/launcher");
    assert_eq!(request.function_name, "init");
    assert_eq!(request.args[0], json!("/workspace/e2e/protractor.conf.js"));
    assert_eq!(
        request.args[1],
        json!({
            "elementExplorer": true,
            "baseUrl": "http://staging.example.com/",
            "specs": ["b.e2e-spec.ts", "a.e2e-spec.ts"],
            "suite": "smoke"
        })
    );
}

#[tokio::test]
async fn test_no_base_url_and_no_specs() {
    let events = events();
    let host = StubHost::new(json!({}), BuilderOutput::success(), &events);
    let builder = E2eBuilder::with_launcher(StubLauncher::new(Outcome::Pass, &events));

    builder.execute(&options(), &host).await.unwrap();

    assert_eq!(
        builder.launcher().runner_overrides(),
        json!({ "elementExplorer": false })
    );
    assert_eq!(recorded(&events), vec!["launch"]);
}
