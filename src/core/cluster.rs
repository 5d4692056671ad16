// EKS credential fetch, manifest apply, rollout wait, and the read-only
// workload queries.

use crate::config::TargetConfig;
use crate::error::{Error, Result};
use crate::exec::{CommandOutput, CommandRunner, CommandSpec};

pub fn kubeconfig_spec(target: &TargetConfig) -> CommandSpec {
    CommandSpec::new("aws")
        .args(["eks", "update-kubeconfig", "--region"])
        .arg(&target.region)
        .arg("--name")
        .arg(&target.cluster)
}

pub fn apply_spec(manifest_path: &str) -> CommandSpec {
    CommandSpec::new("kubectl").args(["apply", "-f"]).arg(manifest_path)
}

pub fn rollout_spec(deployment: &str, timeout_secs: u64) -> CommandSpec {
    CommandSpec::new("kubectl")
        .args(["rollout", "status"])
        .arg(format!("deployment/{}", deployment))
        .arg(format!("--timeout={}s", timeout_secs))
}

pub fn pods_spec(selector: &str) -> CommandSpec {
    CommandSpec::new("kubectl").args(["get", "pods", "-l"]).arg(selector)
}

pub fn service_spec(name: &str) -> CommandSpec {
    CommandSpec::new("kubectl")
        .args(["get", "service"])
        .arg(name)
        .args(["-o", "wide"])
}

/// Point the local kubeconfig at the target cluster.
pub fn update_kubeconfig(
    target: &TargetConfig,
    runner: &dyn CommandRunner,
) -> Result<CommandOutput> {
    let spec = kubeconfig_spec(target);
    let output = runner.capture(&spec);
    if !output.success {
        return Err(Error::command_failed(spec.rendered(), &output));
    }
    Ok(output)
}

/// Submit the manifest. kubectl's own output is the diagnostic surface.
pub fn apply_manifest(manifest_path: &str, runner: &dyn CommandRunner) -> Result<()> {
    let spec = apply_spec(manifest_path);
    let output = runner.passthrough(&spec);
    if !output.success {
        return Err(Error::command_failed(spec.rendered(), &output));
    }
    Ok(())
}

/// Block until the rollout settles or kubectl's timeout expires.
pub fn rollout_wait(
    deployment: &str,
    timeout_secs: u64,
    runner: &dyn CommandRunner,
) -> Result<()> {
    let spec = rollout_spec(deployment, timeout_secs);
    let output = runner.passthrough(&spec);
    if !output.success {
        return Err(Error::command_failed(spec.rendered(), &output));
    }
    Ok(())
}

/// Read-only pod listing; callers decide what a failure means.
pub fn pod_status(selector: &str, runner: &dyn CommandRunner) -> CommandOutput {
    runner.capture(&pods_spec(selector))
}

/// Read-only service description; callers decide what a failure means.
pub fn service_status(name: &str, runner: &dyn CommandRunner) -> CommandOutput {
    runner.capture(&service_spec(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kubeconfig_names_the_cluster_and_region() {
        let target = TargetConfig::default();
        assert_eq!(
            kubeconfig_spec(&target).rendered(),
            "aws eks update-kubeconfig --region ap-northeast-2 --name library-cluster"
        );
    }

    #[test]
    fn rollout_carries_the_configured_timeout() {
        assert_eq!(
            rollout_spec("library-api", 300).rendered(),
            "kubectl rollout status deployment/library-api --timeout=300s"
        );
    }

    #[test]
    fn pod_query_uses_the_label_selector() {
        assert_eq!(
            pods_spec("app=library-api").rendered(),
            "kubectl get pods -l app=library-api"
        );
    }
}
