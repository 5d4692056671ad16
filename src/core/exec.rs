// Typed subprocess execution - every external tool call goes through here.

use std::path::PathBuf;
use std::process::{Command, Stdio};

use crate::shell;
use crate::toolchain;

/// A single external command as program + argv, never `sh -c`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Shell-pasteable rendering for plans and diagnostics.
    pub fn rendered(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        parts.extend(self.args.iter().cloned());
        shell::quote_args(&parts)
    }
}

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub exit_code: i32,
}

impl CommandOutput {
    pub(crate) fn from_spawn_error(err: std::io::Error) -> Self {
        Self {
            stdout: String::new(),
            stderr: format!("Command error: {}", err),
            success: false,
            exit_code: -1,
        }
    }

    /// The most useful diagnostic text: stderr when present, stdout otherwise.
    pub fn error_detail(&self) -> &str {
        if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        }
    }
}

/// Execution seam for the pipeline. Production code uses [`SystemRunner`];
/// tests inject scripted fakes.
pub trait CommandRunner {
    /// Run and capture stdout/stderr.
    fn capture(&self, spec: &CommandSpec) -> CommandOutput;

    /// Run with stdout/stderr inherited by the terminal. Used for
    /// long-running tools whose progress output belongs to the operator.
    fn passthrough(&self, spec: &CommandSpec) -> CommandOutput;

    /// Run `producer | consumer` connected by an in-process pipe.
    fn piped(&self, producer: &CommandSpec, consumer: &CommandSpec) -> CommandOutput;

    /// Resolve an executable on PATH.
    fn resolve_tool(&self, name: &str) -> Option<PathBuf>;
}

pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn capture(&self, spec: &CommandSpec) -> CommandOutput {
        match Command::new(&spec.program).args(&spec.args).output() {
            Ok(out) => CommandOutput {
                stdout: String::from_utf8_lossy(&out.stdout).to_string(),
                stderr: String::from_utf8_lossy(&out.stderr).to_string(),
                success: out.status.success(),
                exit_code: out.status.code().unwrap_or(-1),
            },
            Err(e) => CommandOutput::from_spawn_error(e),
        }
    }

    fn passthrough(&self, spec: &CommandSpec) -> CommandOutput {
        let status = Command::new(&spec.program)
            .args(&spec.args)
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status();

        match status {
            Ok(s) => CommandOutput {
                stdout: String::new(),
                stderr: String::new(),
                success: s.success(),
                exit_code: s.code().unwrap_or(-1),
            },
            Err(e) => CommandOutput::from_spawn_error(e),
        }
    }

    fn piped(&self, producer: &CommandSpec, consumer: &CommandSpec) -> CommandOutput {
        let mut producer_child = match Command::new(&producer.program)
            .args(&producer.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => return CommandOutput::from_spawn_error(e),
        };

        let Some(producer_stdout) = producer_child.stdout.take() else {
            return CommandOutput {
                stdout: String::new(),
                stderr: "Producer stdout unavailable".to_string(),
                success: false,
                exit_code: -1,
            };
        };

        let consumer_result = Command::new(&consumer.program)
            .args(&consumer.args)
            .stdin(Stdio::from(producer_stdout))
            .output();

        // The producer must be reaped regardless of the consumer outcome.
        let producer_result = producer_child.wait_with_output();

        match producer_result {
            Ok(out) if !out.status.success() => CommandOutput {
                stdout: String::new(),
                stderr: String::from_utf8_lossy(&out.stderr).to_string(),
                success: false,
                exit_code: out.status.code().unwrap_or(-1),
            },
            Ok(_) => match consumer_result {
                Ok(out) => CommandOutput {
                    stdout: String::from_utf8_lossy(&out.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&out.stderr).to_string(),
                    success: out.status.success(),
                    exit_code: out.status.code().unwrap_or(-1),
                },
                Err(e) => CommandOutput::from_spawn_error(e),
            },
            Err(e) => CommandOutput::from_spawn_error(e),
        }
    }

    fn resolve_tool(&self, name: &str) -> Option<PathBuf> {
        toolchain::resolve(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rendered_quotes_only_where_needed() {
        let spec = CommandSpec::new("kubectl")
            .args(["get", "pods", "-l"])
            .arg("app in (api)");
        assert_eq!(spec.rendered(), "kubectl get pods -l 'app in (api)'");
    }

    #[test]
    fn capture_reports_missing_program_as_spawn_failure() {
        let spec = CommandSpec::new("deckhand-no-such-tool-xyz");
        let output = SystemRunner.capture(&spec);
        assert!(!output.success);
        assert_eq!(output.exit_code, -1);
        assert!(output.error_detail().contains("Command error"));
    }

    #[cfg(unix)]
    #[test]
    fn piped_connects_producer_to_consumer() {
        let producer = CommandSpec::new("echo").arg("token-value");
        let consumer = CommandSpec::new("cat");
        let output = SystemRunner.piped(&producer, &consumer);
        assert!(output.success);
        assert_eq!(output.stdout.trim(), "token-value");
    }

    #[cfg(unix)]
    #[test]
    fn piped_surfaces_producer_failure() {
        let producer = CommandSpec::new("false");
        let consumer = CommandSpec::new("cat");
        let output = SystemRunner.piped(&producer, &consumer);
        assert!(!output.success);
    }
}
