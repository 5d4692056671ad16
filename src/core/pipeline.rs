// The deploy pipeline: a fixed ordered sequence of external-tool steps.
//
// Execution is strictly sequential and fail-fast. The first required step
// that exits non-zero halts the run; the remaining steps are recorded as
// skipped and the failing tool's exit status becomes the process exit
// status. The two trailing status queries are informational and can never
// fail the run. Nothing is retried and nothing is rolled back; a partial
// run leaves the registry and cluster exactly where the last completed
// step left them.

use serde::Serialize;

use crate::cluster;
use crate::config::{DeckhandConfig, TargetConfig};
use crate::error::{Error, ErrorCode, Result};
use crate::exec::CommandRunner;
use crate::image;
use crate::manifest::{self, ManifestInfo};
use crate::registry;
use crate::toolchain;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Preflight,
    EnsureRepository,
    RegistryLogin,
    BuildImage,
    PushImage,
    UpdateKubeconfig,
    ApplyManifest,
    RolloutWait,
    PodStatus,
    ServiceStatus,
}

impl StepKind {
    pub const SEQUENCE: [StepKind; 10] = [
        StepKind::Preflight,
        StepKind::EnsureRepository,
        StepKind::RegistryLogin,
        StepKind::BuildImage,
        StepKind::PushImage,
        StepKind::UpdateKubeconfig,
        StepKind::ApplyManifest,
        StepKind::RolloutWait,
        StepKind::PodStatus,
        StepKind::ServiceStatus,
    ];

    pub fn id(self) -> &'static str {
        match self {
            StepKind::Preflight => "preflight",
            StepKind::EnsureRepository => "ensure-repository",
            StepKind::RegistryLogin => "registry-login",
            StepKind::BuildImage => "build-image",
            StepKind::PushImage => "push-image",
            StepKind::UpdateKubeconfig => "update-kubeconfig",
            StepKind::ApplyManifest => "apply-manifest",
            StepKind::RolloutWait => "rollout-wait",
            StepKind::PodStatus => "pod-status",
            StepKind::ServiceStatus => "service-status",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StepKind::Preflight => "Checking required tools",
            StepKind::EnsureRepository => "Ensuring ECR repository exists",
            StepKind::RegistryLogin => "Authenticating Docker with ECR",
            StepKind::BuildImage => "Building image",
            StepKind::PushImage => "Tagging and pushing image",
            StepKind::UpdateKubeconfig => "Updating kubeconfig",
            StepKind::ApplyManifest => "Applying manifest",
            StepKind::RolloutWait => "Waiting for rollout",
            StepKind::PodStatus => "Pod status",
            StepKind::ServiceStatus => "Service status",
        }
    }

    /// Steps whose failure never fails the run.
    pub fn informational(self) -> bool {
        matches!(self, StepKind::PodStatus | StepKind::ServiceStatus)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Succeeded,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    pub id: &'static str,
    pub label: &'static str,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepResult {
    fn succeeded(kind: StepKind) -> Self {
        Self {
            id: kind.id(),
            label: kind.label(),
            status: StepStatus::Succeeded,
            exit_code: None,
            detail: None,
            warnings: Vec::new(),
            error: None,
        }
    }

    fn skipped(kind: StepKind) -> Self {
        Self {
            status: StepStatus::Skipped,
            ..Self::succeeded(kind)
        }
    }

    fn failed(kind: StepKind, err: &Error) -> Self {
        Self {
            status: StepStatus::Failed,
            exit_code: Some(err.exit_status().unwrap_or(-1)),
            error: Some(err.message.clone()),
            ..Self::succeeded(kind)
        }
    }

    fn with_detail(mut self, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        if !detail.is_empty() {
            self.detail = Some(detail);
        }
        self
    }

    fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub total_steps: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub warnings: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineRunResult {
    pub steps: Vec<StepResult>,
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub summary: RunSummary,
}

impl PipelineRunResult {
    /// Exit status of the first failed step, normalized to be non-zero.
    pub fn failing_exit_code(&self) -> Option<i32> {
        self.steps
            .iter()
            .find(|s| s.status == StepStatus::Failed)
            .map(|s| match s.exit_code {
                Some(code) if code > 0 => code,
                _ => 1,
            })
    }
}

pub fn run(config: &DeckhandConfig, runner: &dyn CommandRunner) -> Result<PipelineRunResult> {
    config.target.validate()?;
    let target = &config.target;

    log_status!("deploy", "{}", StepKind::Preflight.label());
    let tools = toolchain::preflight(runner)?;
    let tool_detail = tools
        .iter()
        .map(|t| format!("{}={}", t.tool, t.path.as_deref().unwrap_or("?")))
        .collect::<Vec<_>>()
        .join(" ");

    let mut results = vec![StepResult::succeeded(StepKind::Preflight).with_detail(tool_detail)];
    let mut image: Option<String> = None;
    let mut manifest_info: Option<ManifestInfo> = None;
    let mut halted = false;

    for kind in StepKind::SEQUENCE.into_iter().skip(1) {
        if halted {
            results.push(StepResult::skipped(kind));
            continue;
        }

        log_status!("deploy", "{}", kind.label());

        if kind.informational() {
            results.push(match kind {
                StepKind::PodStatus => pod_step(target, manifest_info.as_ref(), runner),
                _ => service_step(target, manifest_info.as_ref(), runner),
            });
            continue;
        }

        let attempted: Result<StepResult> = match kind {
            StepKind::EnsureRepository => {
                registry::ensure_repository(target, runner).map(|status| {
                    StepResult::succeeded(kind).with_detail(format!(
                        "{} ({})",
                        status.repository_uri,
                        if status.created { "created" } else { "exists" }
                    ))
                })
            }
            StepKind::RegistryLogin => registry::login(target, runner)
                .map(|_| StepResult::succeeded(kind).with_detail(target.registry_host())),
            StepKind::BuildImage => image::build(target, runner)
                .map(|_| StepResult::succeeded(kind).with_detail(target.local_image())),
            StepKind::PushImage => image::tag_and_push(target, runner).map(|remote| {
                image = Some(remote.clone());
                StepResult::succeeded(kind).with_detail(remote)
            }),
            StepKind::UpdateKubeconfig => cluster::update_kubeconfig(target, runner).map(|out| {
                StepResult::succeeded(kind).with_detail(out.stdout.trim_end())
            }),
            StepKind::ApplyManifest => {
                let path = target.manifest_path_expanded();
                manifest_info = Some(manifest::inspect(&path)?);
                cluster::apply_manifest(&path, runner)
                    .map(|_| StepResult::succeeded(kind).with_detail(path.clone()))
            }
            StepKind::RolloutWait => {
                let deployment = resolve_deployment(target, manifest_info.as_ref())?;
                cluster::rollout_wait(&deployment, config.rollout.timeout_secs, runner).map(|_| {
                    StepResult::succeeded(kind)
                        .with_detail(format!("deployment/{}", deployment))
                })
            }
            StepKind::Preflight | StepKind::PodStatus | StepKind::ServiceStatus => continue,
        };

        match attempted {
            Ok(step) => results.push(step),
            Err(err) if err.code == ErrorCode::CommandFailed => {
                log_status!("deploy", "Step '{}' failed, halting", kind.id());
                results.push(StepResult::failed(kind, &err));
                halted = true;
            }
            Err(err) => return Err(err),
        }
    }

    let succeeded = count(&results, StepStatus::Succeeded);
    let failed = count(&results, StepStatus::Failed);
    let skipped = count(&results, StepStatus::Skipped);
    let warnings = results.iter().map(|r| r.warnings.len()).sum();

    Ok(PipelineRunResult {
        status: if failed > 0 {
            RunStatus::Failed
        } else {
            RunStatus::Success
        },
        image,
        summary: RunSummary {
            total_steps: results.len(),
            succeeded,
            failed,
            skipped,
            warnings,
        },
        steps: results,
    })
}

fn count(results: &[StepResult], status: StepStatus) -> usize {
    results.iter().filter(|r| r.status == status).count()
}

fn resolve_deployment(target: &TargetConfig, info: Option<&ManifestInfo>) -> Result<String> {
    target
        .deployment
        .clone()
        .or_else(|| info.and_then(|m| m.deployment.clone()))
        .ok_or_else(|| {
            Error::manifest_invalid(
                target.manifest_path_expanded(),
                "no Deployment document found in the manifest",
            )
        })
}

fn pod_step(
    target: &TargetConfig,
    info: Option<&ManifestInfo>,
    runner: &dyn CommandRunner,
) -> StepResult {
    let selector = target
        .pod_selector
        .clone()
        .or_else(|| info.and_then(|m| m.pod_selector.clone()));

    match selector {
        Some(selector) => {
            informational_result(StepKind::PodStatus, cluster::pod_status(&selector, runner))
        }
        None => StepResult::succeeded(StepKind::PodStatus)
            .with_warning("no pod selector configured or found in the manifest"),
    }
}

fn service_step(
    target: &TargetConfig,
    info: Option<&ManifestInfo>,
    runner: &dyn CommandRunner,
) -> StepResult {
    let service = target
        .service
        .clone()
        .or_else(|| info.and_then(|m| m.service.clone()));

    match service {
        Some(service) => informational_result(
            StepKind::ServiceStatus,
            cluster::service_status(&service, runner),
        ),
        None => StepResult::succeeded(StepKind::ServiceStatus)
            .with_warning("no Service document found in the manifest"),
    }
}

fn informational_result(kind: StepKind, output: crate::exec::CommandOutput) -> StepResult {
    if output.success {
        StepResult::succeeded(kind).with_detail(output.stdout.trim_end())
    } else {
        StepResult::succeeded(kind).with_warning(format!(
            "query failed (exit {}): {}",
            output.exit_code,
            output.error_detail().trim()
        ))
    }
}

// ---------------------------------------------------------------------------
// Dry-run plan
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct PlanStep {
    pub id: &'static str,
    pub label: &'static str,
    pub commands: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelinePlan {
    pub steps: Vec<PlanStep>,
}

/// Render every command the pipeline would run, without executing anything.
/// Names the plan cannot resolve (e.g. no manifest on disk yet) render as
/// placeholders.
pub fn plan(config: &DeckhandConfig) -> Result<PipelinePlan> {
    config.target.validate()?;
    let target = &config.target;

    let manifest_path = target.manifest_path_expanded();
    let info = manifest::inspect(&manifest_path).unwrap_or_default();
    let deployment = target
        .deployment
        .clone()
        .or(info.deployment)
        .unwrap_or_else(|| "<deployment>".to_string());
    let selector = target
        .pod_selector
        .clone()
        .or(info.pod_selector)
        .unwrap_or_else(|| "<selector>".to_string());
    let service = target
        .service
        .clone()
        .or(info.service)
        .unwrap_or_else(|| "<service>".to_string());

    let (login_producer, login_consumer) = registry::login_specs(target);

    let step = |kind: StepKind, commands: Vec<String>| PlanStep {
        id: kind.id(),
        label: kind.label(),
        commands,
        note: None,
    };

    let steps = vec![
        step(
            StepKind::Preflight,
            toolchain::REQUIRED_TOOLS
                .iter()
                .map(|t| format!("resolve {} on PATH", t))
                .collect(),
        ),
        PlanStep {
            note: Some("create-repository runs only when the lookup fails"),
            ..step(
                StepKind::EnsureRepository,
                vec![
                    registry::describe_spec(target).rendered(),
                    registry::create_spec(target).rendered(),
                ],
            )
        },
        step(
            StepKind::RegistryLogin,
            vec![format!(
                "{} | {}",
                login_producer.rendered(),
                login_consumer.rendered()
            )],
        ),
        step(
            StepKind::BuildImage,
            vec![image::build_spec(target).rendered()],
        ),
        step(
            StepKind::PushImage,
            vec![
                image::tag_spec(target).rendered(),
                image::push_spec(target).rendered(),
            ],
        ),
        step(
            StepKind::UpdateKubeconfig,
            vec![cluster::kubeconfig_spec(target).rendered()],
        ),
        step(
            StepKind::ApplyManifest,
            vec![cluster::apply_spec(&manifest_path).rendered()],
        ),
        step(
            StepKind::RolloutWait,
            vec![cluster::rollout_spec(&deployment, config.rollout.timeout_secs).rendered()],
        ),
        step(StepKind::PodStatus, vec![cluster::pods_spec(&selector).rendered()]),
        step(
            StepKind::ServiceStatus,
            vec![cluster::service_spec(&service).rendered()],
        ),
    ];

    Ok(PipelinePlan { steps })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_ends_with_the_informational_queries() {
        let informational: Vec<bool> = StepKind::SEQUENCE
            .into_iter()
            .map(StepKind::informational)
            .collect();
        assert_eq!(
            informational,
            [false, false, false, false, false, false, false, false, true, true]
        );
    }

    #[test]
    fn plan_renders_every_step_without_a_manifest() {
        let config = DeckhandConfig::default();
        let plan = plan(&config).unwrap();
        assert_eq!(plan.steps.len(), StepKind::SEQUENCE.len());
        assert!(plan.steps[3].commands[0].starts_with("docker build"));
        // Unresolvable names fall back to placeholders instead of failing
        assert!(plan.steps[7].commands[0].contains("deployment/<deployment>"));
    }

    #[test]
    fn failing_exit_code_normalizes_spawn_errors() {
        let mut result = PipelineRunResult {
            steps: vec![StepResult {
                id: "build-image",
                label: "Building image",
                status: StepStatus::Failed,
                exit_code: Some(-1),
                detail: None,
                warnings: Vec::new(),
                error: Some("spawn failed".to_string()),
            }],
            status: RunStatus::Failed,
            image: None,
            summary: RunSummary {
                total_steps: 1,
                succeeded: 0,
                failed: 1,
                skipped: 0,
                warnings: 0,
            },
        };
        assert_eq!(result.failing_exit_code(), Some(1));

        result.steps[0].exit_code = Some(7);
        assert_eq!(result.failing_exit_code(), Some(7));
    }
}
