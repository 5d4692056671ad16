use clap::Args;
use serde::Serialize;

use deckhand::config;
use deckhand::exec::SystemRunner;
use deckhand::manifest;
use deckhand::toolchain::{self, ToolStatus};

use super::CmdResult;

#[derive(Args)]
pub struct DoctorArgs {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DoctorSeverity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Serialize)]
pub struct DoctorIssue {
    pub severity: DoctorSeverity,
    pub code: &'static str,
    pub message: String,
}

#[derive(Serialize)]
pub struct DoctorOutput {
    pub command: &'static str,
    pub tools: Vec<ToolStatus>,
    pub issues: Vec<DoctorIssue>,
    pub errors: usize,
    pub warnings: usize,
}

pub fn run(_args: DoctorArgs, _global: &crate::commands::GlobalArgs) -> CmdResult<DoctorOutput> {
    let runner = SystemRunner;
    let mut issues = Vec::new();

    let tools = toolchain::check(&runner);
    for tool in tools.iter().filter(|t| t.path.is_none()) {
        issues.push(DoctorIssue {
            severity: DoctorSeverity::Error,
            code: "TOOL_NOT_FOUND",
            message: format!("{} CLI not found on PATH", tool.tool),
        });
    }

    let cfg = match config::load_strict() {
        Ok(cfg) => cfg,
        Err(err) => {
            issues.push(DoctorIssue {
                severity: DoctorSeverity::Error,
                code: "CONFIG_INVALID",
                message: err.message,
            });
            config::DeckhandConfig::default()
        }
    };

    if let Err(err) = cfg.target.validate() {
        issues.push(DoctorIssue {
            severity: DoctorSeverity::Error,
            code: "CONFIG_INVALID_VALUE",
            message: err.message,
        });
    }

    if cfg.target.account_id == "123456789012" {
        issues.push(DoctorIssue {
            severity: DoctorSeverity::Warning,
            code: "ACCOUNT_PLACEHOLDER",
            message: "target.account_id is still the documentation placeholder; \
                      set it with 'deckhand config set /target/account_id <id>'"
                .to_string(),
        });
    }

    let manifest_path = cfg.target.manifest_path_expanded();
    if !std::path::Path::new(&manifest_path).exists() {
        issues.push(DoctorIssue {
            severity: DoctorSeverity::Error,
            code: "MANIFEST_MISSING",
            message: format!("Manifest not found at {}", manifest_path),
        });
    } else {
        match manifest::inspect(&manifest_path) {
            Err(err) => issues.push(DoctorIssue {
                severity: DoctorSeverity::Error,
                code: "MANIFEST_INVALID",
                message: err.message,
            }),
            Ok(info) => {
                if info.deployment.is_none() && cfg.target.deployment.is_none() {
                    issues.push(DoctorIssue {
                        severity: DoctorSeverity::Warning,
                        code: "NO_DEPLOYMENT_DOC",
                        message: "Manifest has no Deployment document and no override \
                                  is configured; the rollout wait cannot resolve a name"
                            .to_string(),
                    });
                }
                if info.service.is_none() && cfg.target.service.is_none() {
                    issues.push(DoctorIssue {
                        severity: DoctorSeverity::Info,
                        code: "NO_SERVICE_DOC",
                        message: "Manifest has no Service document; the service status \
                                  query will be skipped"
                            .to_string(),
                    });
                }
            }
        }
    }

    let errors = issues
        .iter()
        .filter(|i| i.severity == DoctorSeverity::Error)
        .count();
    let warnings = issues
        .iter()
        .filter(|i| i.severity == DoctorSeverity::Warning)
        .count();

    let exit_code = if errors > 0 { 1 } else { 0 };

    Ok((
        DoctorOutput {
            command: "doctor",
            tools,
            issues,
            errors,
            warnings,
        },
        exit_code,
    ))
}
