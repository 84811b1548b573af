//! Bearer token acquisition through the Azure CLI.
//!
//! The CLI is located once per run by a platform strategy, then invoked through
//! a shell wrapper:
//!
//! ```text
//! <shell...> "az account get-access-token --resource=<url> --query accessToken --output tsv"
//! ```
//!
//! Stdout is trimmed and used as-is. A failing CLI that prints nothing yields an
//! empty token; the API rejects it later with an authorization error.
use anyhow::{anyhow, Context, Result};
use std::env;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Command;
use std::time::Instant;

/// File name looked up on PATH (and by `Get-Command`).
pub(crate) const AZ_EXECUTABLE: &str = "az";

/// Finds an executable by name.
pub(crate) trait ExecutableLocator {
    fn locate(&self, name: &str) -> Option<PathBuf>;
}

/// Scans each PATH entry in order for a file with exactly the given name.
///
/// No extension probing and no permission check: the first entry that exists wins.
#[derive(Debug, Clone)]
pub(crate) struct PathScanLocator {
    path_var: Option<OsString>,
}

impl PathScanLocator {
    pub(crate) fn from_env() -> Self {
        Self {
            path_var: env::var_os("PATH"),
        }
    }
}

impl ExecutableLocator for PathScanLocator {
    fn locate(&self, name: &str) -> Option<PathBuf> {
        let path_var = self.path_var.as_ref()?;
        env::split_paths(path_var)
            .map(|dir| dir.join(name))
            .find(|candidate| candidate.exists())
    }
}

/// Asks PowerShell where the executable lives (`Get-Command <name>`).
///
/// Empty output or a launch failure both mean "not found".
#[derive(Debug, Clone)]
pub(crate) struct ShellQueryLocator {
    shell: Vec<String>,
}

impl ShellQueryLocator {
    pub(crate) fn new(shell: Vec<String>) -> Self {
        Self { shell }
    }
}

impl ExecutableLocator for ShellQueryLocator {
    fn locate(&self, name: &str) -> Option<PathBuf> {
        let (program, rest) = self.shell.split_first()?;
        let query = format!("Get-Command {name} | Select-Object -ExpandProperty Source");
        let output = match Command::new(program).args(rest).arg(&query).output() {
            Ok(output) => output,
            Err(err) => {
                tracing::warn!(error = %err, program = %program, "executable lookup failed to launch");
                return None;
            }
        };
        let stdout = String::from_utf8_lossy(&output.stdout);
        let located = stdout.trim();
        if located.is_empty() {
            return None;
        }
        Some(PathBuf::from(located))
    }
}

/// Pick the lookup strategy for the platform this binary was built for.
pub(crate) fn default_locator(shell: &[String]) -> Box<dyn ExecutableLocator> {
    if cfg!(windows) {
        Box::new(ShellQueryLocator::new(shell.to_vec()))
    } else {
        Box::new(PathScanLocator::from_env())
    }
}

/// Split a shell wrapper such as `pwsh -Command` into argv.
pub(crate) fn parse_shell(raw: &str) -> Result<Vec<String>> {
    let argv = shell_words::split(raw).with_context(|| format!("parse shell command: {raw}"))?;
    if argv.is_empty() {
        return Err(anyhow!("shell command is empty"));
    }
    Ok(argv)
}

/// Produces the bearer token for a resource URL.
pub(crate) trait TokenSource {
    fn access_token(&self, resource: &str) -> Result<String>;
}

/// Token supplied up front (e.g. `--token`).
#[derive(Debug, Clone)]
pub(crate) struct StaticToken(pub(crate) String);

impl TokenSource for StaticToken {
    fn access_token(&self, _resource: &str) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Token obtained from `az account get-access-token`.
pub(crate) struct AzCliTokenSource {
    locator: Box<dyn ExecutableLocator>,
    shell: Vec<String>,
}

impl AzCliTokenSource {
    pub(crate) fn new(locator: Box<dyn ExecutableLocator>, shell: Vec<String>) -> Self {
        Self { locator, shell }
    }
}

impl TokenSource for AzCliTokenSource {
    fn access_token(&self, resource: &str) -> Result<String> {
        let az = self
            .locator
            .locate(AZ_EXECUTABLE)
            .ok_or_else(|| anyhow!("Azure CLI executable not found"))?;
        tracing::debug!(path = %az.display(), "executable located");

        let file_name = az
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| AZ_EXECUTABLE.to_string());
        let command_line = token_command_line(&file_name, resource);

        let (program, rest) = self
            .shell
            .split_first()
            .ok_or_else(|| anyhow!("shell command is empty"))?;
        let mut command = Command::new(program);
        command.args(rest).arg(&command_line);
        if let Some(parent) = az.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            command.current_dir(parent);
        }

        let start = Instant::now();
        let output = command
            .output()
            .with_context(|| format!("spawn token command: {program}"))?;
        let elapsed_ms = start.elapsed().as_millis();

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!(
                status = %output.status,
                stderr = stderr.lines().next().unwrap_or_default(),
                "token command failed"
            );
        }

        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        tracing::info!(elapsed_ms, token_bytes = token.len(), "token acquired");
        Ok(token)
    }
}

fn token_command_line(executable: &str, resource: &str) -> String {
    format!("{executable} account get-access-token --resource={resource} --query accessToken --output tsv")
}

#[cfg(test)]
#[path = "token_tests.rs"]
mod tests;
