use clap::Args;
use serde::Serialize;

use deckhand::cluster;
use deckhand::config;
use deckhand::exec::{CommandRunner, SystemRunner};
use deckhand::manifest;
use deckhand::Error;

use super::CmdResult;

#[derive(Args)]
pub struct StatusArgs {}

#[derive(Serialize)]
pub struct StatusOutput {
    pub command: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pods: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Run only the read-only queries against whatever the kubeconfig currently
/// points at. Query failures become warnings, never a non-zero exit.
pub fn run(_args: StatusArgs, _global: &crate::commands::GlobalArgs) -> CmdResult<StatusOutput> {
    let runner = SystemRunner;

    if runner.resolve_tool("kubectl").is_none() {
        return Err(Error::tool_not_found("kubectl"));
    }

    let cfg = config::load();
    let info = manifest::inspect(&cfg.target.manifest_path_expanded()).unwrap_or_default();

    let selector = cfg.target.pod_selector.clone().or(info.pod_selector);
    let service_name = cfg.target.service.clone().or(info.service);

    let mut warnings = Vec::new();

    let pods = match selector {
        Some(selector) => {
            let output = cluster::pod_status(&selector, &runner);
            if output.success {
                Some(output.stdout.trim_end().to_string())
            } else {
                warnings.push(format!(
                    "pod query failed (exit {}): {}",
                    output.exit_code,
                    output.error_detail().trim()
                ));
                None
            }
        }
        None => {
            warnings.push("no pod selector configured or found in the manifest".to_string());
            None
        }
    };

    let service = match service_name {
        Some(name) => {
            let output = cluster::service_status(&name, &runner);
            if output.success {
                Some(output.stdout.trim_end().to_string())
            } else {
                warnings.push(format!(
                    "service query failed (exit {}): {}",
                    output.exit_code,
                    output.error_detail().trim()
                ));
                None
            }
        }
        None => {
            warnings.push("no Service document found in the manifest".to_string());
            None
        }
    };

    Ok((
        StatusOutput {
            command: "status",
            pods,
            service,
            warnings,
        },
        0,
    ))
}
