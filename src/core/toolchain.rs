// Preflight resolution of the external tools the pipeline shells out to.

use serde::Serialize;
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::exec::CommandRunner;

/// Every tool the pipeline invokes. Order matches the preflight report.
pub const REQUIRED_TOOLS: [&str; 3] = ["aws", "docker", "kubectl"];

#[derive(Debug, Clone, Serialize)]
pub struct ToolStatus {
    pub tool: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Resolve an executable by scanning the PATH environment variable.
pub fn resolve(name: &str) -> Option<PathBuf> {
    let path_var = env::var_os("PATH")?;
    resolve_in(env::split_paths(&path_var), name)
}

pub fn resolve_in<I>(dirs: I, name: &str) -> Option<PathBuf>
where
    I: IntoIterator<Item = PathBuf>,
{
    for dir in dirs {
        let candidate = dir.join(name);
        if is_executable(&candidate) {
            return Some(candidate);
        }

        #[cfg(windows)]
        {
            let candidate = dir.join(format!("{}.exe", name));
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Report presence of every required tool.
pub fn check(runner: &dyn CommandRunner) -> Vec<ToolStatus> {
    REQUIRED_TOOLS
        .iter()
        .map(|&tool| ToolStatus {
            tool,
            path: runner
                .resolve_tool(tool)
                .map(|p| p.display().to_string()),
        })
        .collect()
}

/// Fail with the first missing tool, otherwise return the resolved set.
pub fn preflight(runner: &dyn CommandRunner) -> Result<Vec<ToolStatus>> {
    let tools = check(runner);
    if let Some(missing) = tools.iter().find(|t| t.path.is_none()) {
        return Err(Error::tool_not_found(missing.tool));
    }
    Ok(tools)
}
