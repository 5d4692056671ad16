//! End-to-end pipeline scenarios against a scripted command runner.

use std::cell::RefCell;
use std::path::PathBuf;

use deckhand::config::DeckhandConfig;
use deckhand::exec::{CommandOutput, CommandRunner, CommandSpec};
use deckhand::pipeline::{self, StepStatus};
use deckhand::ErrorCode;

const MANIFEST: &str = "\
apiVersion: apps/v1
kind: Deployment
metadata:
  name: library-api
spec:
  replicas: 2
  selector:
    matchLabels:
      app: library-api
---
apiVersion: v1
kind: Service
metadata:
  name: library-api-svc
";

/// Succeeds at everything except the scripted failures; records every
/// rendered command line it is asked to run.
struct ScriptedRunner {
    missing_tools: Vec<&'static str>,
    failures: Vec<(&'static str, i32)>,
    invocations: RefCell<Vec<String>>,
}

impl ScriptedRunner {
    fn new() -> Self {
        Self {
            missing_tools: Vec::new(),
            failures: Vec::new(),
            invocations: RefCell::new(Vec::new()),
        }
    }

    fn missing(mut self, tool: &'static str) -> Self {
        self.missing_tools.push(tool);
        self
    }

    fn failing(mut self, command_fragment: &'static str, exit_code: i32) -> Self {
        self.failures.push((command_fragment, exit_code));
        self
    }

    fn respond(&self, rendered: String) -> CommandOutput {
        self.invocations.borrow_mut().push(rendered.clone());
        for (fragment, exit_code) in &self.failures {
            if rendered.contains(fragment) {
                return CommandOutput {
                    stdout: String::new(),
                    stderr: format!("{}: scripted failure", fragment),
                    success: false,
                    exit_code: *exit_code,
                };
            }
        }
        CommandOutput {
            stdout: "scripted output".to_string(),
            stderr: String::new(),
            success: true,
            exit_code: 0,
        }
    }

    fn ran(&self, fragment: &str) -> bool {
        self.invocations
            .borrow()
            .iter()
            .any(|cmd| cmd.contains(fragment))
    }

    fn invocation_count(&self) -> usize {
        self.invocations.borrow().len()
    }
}

impl CommandRunner for ScriptedRunner {
    fn capture(&self, spec: &CommandSpec) -> CommandOutput {
        self.respond(spec.rendered())
    }

    fn passthrough(&self, spec: &CommandSpec) -> CommandOutput {
        self.respond(spec.rendered())
    }

    fn piped(&self, producer: &CommandSpec, consumer: &CommandSpec) -> CommandOutput {
        self.respond(format!("{} | {}", producer.rendered(), consumer.rendered()))
    }

    fn resolve_tool(&self, name: &str) -> Option<PathBuf> {
        if self.missing_tools.contains(&name) {
            None
        } else {
            Some(PathBuf::from(format!("/usr/bin/{}", name)))
        }
    }
}

fn config_with_manifest(dir: &tempfile::TempDir) -> DeckhandConfig {
    let manifest_path = dir.path().join("deployment.yaml");
    std::fs::write(&manifest_path, MANIFEST).unwrap();

    let mut cfg = DeckhandConfig::default();
    cfg.target.manifest_path = manifest_path.display().to_string();
    cfg
}

#[test]
fn scenario_all_green_reports_pod_and_service_status() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config_with_manifest(&dir);
    let runner = ScriptedRunner::new();

    let result = pipeline::run(&cfg, &runner).unwrap();

    assert_eq!(result.status, pipeline::RunStatus::Success);
    assert_eq!(result.failing_exit_code(), None);
    assert_eq!(result.steps.len(), 10);
    assert!(result.steps.iter().all(|s| s.status == StepStatus::Succeeded));
    assert_eq!(
        result.image.as_deref(),
        Some("123456789012.dkr.ecr.ap-northeast-2.amazonaws.com/library-api:latest")
    );

    // The trailing queries surface their tool output
    let pods = result.steps.iter().find(|s| s.id == "pod-status").unwrap();
    assert_eq!(pods.detail.as_deref(), Some("scripted output"));
    let service = result.steps.iter().find(|s| s.id == "service-status").unwrap();
    assert_eq!(service.detail.as_deref(), Some("scripted output"));

    // Existing repository: the create call must never be issued
    assert!(runner.ran("describe-repositories"));
    assert!(!runner.ran("create-repository"));
}

#[test]
fn scenario_missing_docker_stops_before_any_external_call() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config_with_manifest(&dir);
    let runner = ScriptedRunner::new().missing("docker");

    let err = pipeline::run(&cfg, &runner).unwrap_err();

    assert_eq!(err.code, ErrorCode::ToolNotFound);
    assert_eq!(err.message, "Required tool 'docker' not found on PATH");
    assert_eq!(runner.invocation_count(), 0);
}

#[test]
fn scenario_build_failure_halts_before_tag_and_push() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config_with_manifest(&dir);
    let runner = ScriptedRunner::new().failing("docker build", 7);

    let result = pipeline::run(&cfg, &runner).unwrap();

    assert_eq!(result.status, pipeline::RunStatus::Failed);
    assert_eq!(result.failing_exit_code(), Some(7));

    assert!(!runner.ran("docker tag"));
    assert!(!runner.ran("docker push"));
    assert!(!runner.ran("kubectl"));

    let build = result.steps.iter().find(|s| s.id == "build-image").unwrap();
    assert_eq!(build.status, StepStatus::Failed);
    assert_eq!(build.exit_code, Some(7));

    // Everything after the failure is skipped, including the queries
    for step in result.steps.iter().skip_while(|s| s.id != "push-image") {
        assert_eq!(step.status, StepStatus::Skipped, "step {}", step.id);
    }
}

#[test]
fn registry_login_happens_after_preflight_and_lookup() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config_with_manifest(&dir);
    let runner = ScriptedRunner::new();

    pipeline::run(&cfg, &runner).unwrap();

    let invocations = runner.invocations.borrow();
    let describe_pos = invocations
        .iter()
        .position(|c| c.contains("describe-repositories"))
        .unwrap();
    let login_pos = invocations
        .iter()
        .position(|c| c.contains("docker login"))
        .unwrap();
    assert!(describe_pos < login_pos);
}

#[test]
fn missing_repository_is_created_and_the_run_continues() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config_with_manifest(&dir);
    let runner = ScriptedRunner::new().failing("describe-repositories", 254);

    let result = pipeline::run(&cfg, &runner).unwrap();

    assert_eq!(result.status, pipeline::RunStatus::Success);
    assert!(runner.ran("create-repository"));

    let ensure = result
        .steps
        .iter()
        .find(|s| s.id == "ensure-repository")
        .unwrap();
    assert!(ensure.detail.as_deref().unwrap().contains("(created)"));
}

#[test]
fn query_failures_never_fail_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config_with_manifest(&dir);
    let runner = ScriptedRunner::new()
        .failing("get pods", 1)
        .failing("get service", 1);

    let result = pipeline::run(&cfg, &runner).unwrap();

    assert_eq!(result.status, pipeline::RunStatus::Success);
    assert_eq!(result.failing_exit_code(), None);

    let pods = result.steps.iter().find(|s| s.id == "pod-status").unwrap();
    assert_eq!(pods.status, StepStatus::Succeeded);
    assert!(pods.warnings[0].contains("query failed"));
    assert_eq!(result.summary.warnings, 2);
}

#[test]
fn rollout_failure_propagates_kubectls_exit_status() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config_with_manifest(&dir);
    let runner = ScriptedRunner::new().failing("rollout status", 1);

    let result = pipeline::run(&cfg, &runner).unwrap();

    assert_eq!(result.status, pipeline::RunStatus::Failed);
    assert_eq!(result.failing_exit_code(), Some(1));
    // The rollout targets the Deployment named in the manifest
    assert!(runner.ran("deployment/library-api"));
    // Applied before the rollout failed; nothing after it ran
    assert!(runner.ran("kubectl apply"));
    assert!(!runner.ran("get pods"));
}

#[test]
fn missing_manifest_is_a_fatal_validation_error() {
    let mut cfg = DeckhandConfig::default();
    cfg.target.manifest_path = "/nonexistent/deckhand/deployment.yaml".to_string();
    let runner = ScriptedRunner::new();

    let err = pipeline::run(&cfg, &runner).unwrap_err();
    assert_eq!(err.code, ErrorCode::ManifestInvalid);

    // The image work had already happened; the cluster was never touched
    assert!(runner.ran("docker build"));
    assert!(!runner.ran("kubectl apply"));
}
