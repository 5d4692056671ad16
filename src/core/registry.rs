// ECR repository lifecycle and Docker authentication.

use crate::config::TargetConfig;
use crate::error::{Error, Result};
use crate::exec::{CommandRunner, CommandSpec};

pub struct RepositoryStatus {
    pub repository_uri: String,
    pub created: bool,
}

pub fn describe_spec(target: &TargetConfig) -> CommandSpec {
    CommandSpec::new("aws")
        .args(["ecr", "describe-repositories", "--repository-names"])
        .arg(&target.repository)
        .arg("--region")
        .arg(&target.region)
        .args(["--output", "json"])
}

pub fn create_spec(target: &TargetConfig) -> CommandSpec {
    CommandSpec::new("aws")
        .args(["ecr", "create-repository", "--repository-name"])
        .arg(&target.repository)
        .arg("--region")
        .arg(&target.region)
        .args(["--output", "json"])
}

/// `aws ecr get-login-password | docker login --password-stdin` as two specs
/// for the runner's in-process pipe. The token never touches a shell or disk.
pub fn login_specs(target: &TargetConfig) -> (CommandSpec, CommandSpec) {
    let producer = CommandSpec::new("aws")
        .args(["ecr", "get-login-password", "--region"])
        .arg(&target.region);
    let consumer = CommandSpec::new("docker")
        .args(["login", "--username", "AWS", "--password-stdin"])
        .arg(target.registry_host());
    (producer, consumer)
}

/// Check for the repository and create it when the lookup fails. The lookup
/// failure is read as "does not exist"; only a failed create is fatal.
pub fn ensure_repository(
    target: &TargetConfig,
    runner: &dyn CommandRunner,
) -> Result<RepositoryStatus> {
    let describe = describe_spec(target);
    let output = runner.capture(&describe);
    if output.success {
        return Ok(RepositoryStatus {
            repository_uri: repository_uri_from_describe(&output.stdout)
                .unwrap_or_else(|| fallback_uri(target)),
            created: false,
        });
    }

    log_status!(
        "registry",
        "Repository '{}' not found, creating",
        target.repository
    );

    let create = create_spec(target);
    let output = runner.capture(&create);
    if !output.success {
        return Err(Error::command_failed(create.rendered(), &output));
    }

    Ok(RepositoryStatus {
        repository_uri: repository_uri_from_create(&output.stdout)
            .unwrap_or_else(|| fallback_uri(target)),
        created: true,
    })
}

/// Obtain a short-lived registry token and feed it to `docker login`.
pub fn login(target: &TargetConfig, runner: &dyn CommandRunner) -> Result<()> {
    let (producer, consumer) = login_specs(target);
    let output = runner.piped(&producer, &consumer);
    if !output.success {
        return Err(Error::command_failed(
            format!("{} | {}", producer.rendered(), consumer.rendered()),
            &output,
        ));
    }
    Ok(())
}

fn repository_uri_from_describe(stdout: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(stdout).ok()?;
    value
        .get("repositories")?
        .get(0)?
        .get("repositoryUri")?
        .as_str()
        .map(str::to_string)
}

fn repository_uri_from_create(stdout: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(stdout).ok()?;
    value
        .get("repository")?
        .get("repositoryUri")?
        .as_str()
        .map(str::to_string)
}

fn fallback_uri(target: &TargetConfig) -> String {
    format!("{}/{}", target.registry_host(), target.repository)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_uri_is_read_from_aws_json() {
        let stdout = r#"{"repositories": [{"repositoryName": "library-api",
            "repositoryUri": "123456789012.dkr.ecr.ap-northeast-2.amazonaws.com/library-api"}]}"#;
        assert_eq!(
            repository_uri_from_describe(stdout).as_deref(),
            Some("123456789012.dkr.ecr.ap-northeast-2.amazonaws.com/library-api")
        );
    }

    #[test]
    fn unparseable_output_falls_back_to_none() {
        assert!(repository_uri_from_describe("not json").is_none());
        assert!(repository_uri_from_create("{}").is_none());
    }

    #[test]
    fn login_pipe_targets_the_registry_host() {
        let target = TargetConfig::default();
        let (producer, consumer) = login_specs(&target);
        assert_eq!(
            producer.rendered(),
            "aws ecr get-login-password --region ap-northeast-2"
        );
        assert_eq!(
            consumer.rendered(),
            "docker login --username AWS --password-stdin \
             123456789012.dkr.ecr.ap-northeast-2.amazonaws.com"
        );
    }
}
