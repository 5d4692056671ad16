// Docker image build, tag, and push.

use crate::config::TargetConfig;
use crate::error::{Error, Result};
use crate::exec::{CommandRunner, CommandSpec};

pub fn build_spec(target: &TargetConfig) -> CommandSpec {
    CommandSpec::new("docker")
        .args(["build", "-t"])
        .arg(target.local_image())
        .arg(".")
}

pub fn tag_spec(target: &TargetConfig) -> CommandSpec {
    CommandSpec::new("docker")
        .arg("tag")
        .arg(target.local_image())
        .arg(target.remote_image())
}

pub fn push_spec(target: &TargetConfig) -> CommandSpec {
    CommandSpec::new("docker").arg("push").arg(target.remote_image())
}

/// Build from the working directory's context. Build output streams straight
/// to the terminal.
pub fn build(target: &TargetConfig, runner: &dyn CommandRunner) -> Result<()> {
    let spec = build_spec(target);
    let output = runner.passthrough(&spec);
    if !output.success {
        return Err(Error::command_failed(spec.rendered(), &output));
    }
    Ok(())
}

/// Apply the fully qualified remote tag, then push. Returns the pushed
/// image reference.
pub fn tag_and_push(target: &TargetConfig, runner: &dyn CommandRunner) -> Result<String> {
    let tag = tag_spec(target);
    let output = runner.capture(&tag);
    if !output.success {
        return Err(Error::command_failed(tag.rendered(), &output));
    }

    let push = push_spec(target);
    let output = runner.passthrough(&push);
    if !output.success {
        return Err(Error::command_failed(push.rendered(), &output));
    }

    Ok(target.remote_image())
}
