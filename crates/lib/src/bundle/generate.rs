//! Client generation step.
//!
//! Runs the configured command in the staging artifact after pruning, with a
//! cleared environment so the result does not depend on the caller's shell
//! profile or caches.

use std::collections::BTreeMap;
use std::path::Path;

use tokio::process::Command;
use tracing::{debug, info};

use super::types::{BundleError, Step, io_err};
use crate::consts::{SOURCE_DATE_EPOCH, TARGET_PLATFORM_ENV};
use crate::platform::Platform;

/// Variables passed through from the caller. Everything else is cleared.
#[cfg(unix)]
const PASSTHROUGH_ENV: &[&str] = &["PATH"];

#[cfg(windows)]
const PASSTHROUGH_ENV: &[&str] = &["PATH", "PATHEXT", "SystemRoot", "COMSPEC"];

/// Run `cmd` through the shell in `artifact_root`.
///
/// The child sees:
/// - `PATH` from the caller (generators are found via `npx`)
/// - `HOME`, `TMPDIR`/`TMP`/`TEMP` and `npm_config_cache` under `scratch`,
///   which lives outside the artifact
/// - `LANG=C`, `LC_ALL=C` and `SOURCE_DATE_EPOCH`
/// - `LAYERPACK_TARGET_PLATFORM` set to the target identifier
/// - every entry of `env`
///
/// Returns trimmed stdout. A non-zero exit becomes
/// [`BundleError::ClientGeneration`] carrying stderr and stdout.
pub(crate) async fn run_generate(
  cmd: &str,
  artifact_root: &Path,
  scratch: &Path,
  target: &Platform,
  env: &BTreeMap<String, String>,
  shell: Option<&str>,
) -> Result<String, BundleError> {
  info!(cmd = %cmd, target = %target, "generating client");

  let home = scratch.join("home");
  let tmp_dir = scratch.join("tmp");
  let npm_cache = scratch.join("npm-cache");
  for dir in [&home, &tmp_dir, &npm_cache] {
    tokio::fs::create_dir_all(dir).await.map_err(io_err(Step::Generate))?;
  }

  let (shell_cmd, shell_args) = get_shell(shell);

  let mut command = Command::new(&shell_cmd);
  command.args(&shell_args).arg(cmd).current_dir(artifact_root).env_clear();

  for key in PASSTHROUGH_ENV {
    if let Some(value) = std::env::var_os(key) {
      command.env(key, value);
    }
  }

  command
    .env("HOME", &home)
    .env("USERPROFILE", &home)
    .env("TMPDIR", &tmp_dir)
    .env("TMP", &tmp_dir)
    .env("TEMP", &tmp_dir)
    .env("npm_config_cache", &npm_cache)
    .env("npm_config_update_notifier", "false")
    .env("LANG", "C")
    .env("LC_ALL", "C")
    .env("SOURCE_DATE_EPOCH", SOURCE_DATE_EPOCH)
    .env(TARGET_PLATFORM_ENV, target.identifier());

  for (key, value) in env {
    command.env(key, value);
  }

  debug!(shell = %shell_cmd, working_dir = %artifact_root.display(), "spawning process");

  let output = command.output().await.map_err(io_err(Step::Generate))?;

  let stderr = String::from_utf8_lossy(&output.stderr);
  let stdout = String::from_utf8_lossy(&output.stdout);

  if !output.status.success() {
    if !stderr.is_empty() {
      debug!(stderr = %stderr, "command stderr");
    }
    if !stdout.is_empty() {
      debug!(stdout = %stdout, "command stdout");
    }

    let diagnostic = [stderr.trim(), stdout.trim()]
      .into_iter()
      .filter(|s| !s.is_empty())
      .collect::<Vec<_>>()
      .join("\n");

    return Err(BundleError::ClientGeneration {
      cmd: cmd.to_string(),
      code: output.status.code(),
      output: diagnostic,
    });
  }

  let stdout = stdout.trim().to_string();
  if !stdout.is_empty() {
    debug!(stdout = %stdout, "command output");
  }

  Ok(stdout)
}

/// Shell command and arguments for the current platform.
///
/// Defaults to `/bin/sh` (Unix) or PowerShell (Windows) rather than `$SHELL`,
/// since interactive shells may source profile files that change the
/// environment.
fn get_shell(override_shell: Option<&str>) -> (String, Vec<String>) {
  if let Some(shell) = override_shell {
    let args = if shell.contains("powershell") || shell.contains("pwsh") {
      vec!["-NoProfile".to_string(), "-Command".to_string()]
    } else if shell.contains("cmd") {
      vec!["/C".to_string()]
    } else {
      vec!["-c".to_string()]
    };
    return (shell.to_string(), args);
  }

  #[cfg(unix)]
  {
    ("/bin/sh".to_string(), vec!["-c".to_string()])
  }

  #[cfg(windows)]
  {
    (
      "powershell.exe".to_string(),
      vec![
        "-NoProfile".to_string(),
        "-ExecutionPolicy".to_string(),
        "Bypass".to_string(),
        "-Command".to_string(),
      ],
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::platform::{Arch, Os};
  use tempfile::TempDir;

  #[cfg(unix)]
  fn echo_env(var: &str) -> String {
    format!("echo ${}", var)
  }

  #[cfg(windows)]
  fn echo_env(var: &str) -> String {
    format!("Write-Output $env:{}", var)
  }

  fn linux() -> Platform {
    Platform::new(Os::Linux, Arch::X86_64)
  }

  async fn run(cmd: &str, env: &BTreeMap<String, String>) -> (TempDir, Result<String, BundleError>) {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("artifact");
    std::fs::create_dir(&root).unwrap();
    let result = run_generate(cmd, &root, &temp.path().join("scratch"), &linux(), env, None).await;
    (temp, result)
  }

  #[tokio::test]
  async fn exports_target_platform() {
    let (_temp, result) = run(&echo_env(TARGET_PLATFORM_ENV), &BTreeMap::new()).await;
    assert_eq!(result.unwrap(), "linux-x64");
  }

  #[tokio::test]
  async fn exports_source_date_epoch() {
    let (_temp, result) = run(&echo_env("SOURCE_DATE_EPOCH"), &BTreeMap::new()).await;
    assert_eq!(result.unwrap(), "315532800");
  }

  #[tokio::test]
  async fn configured_env_is_merged() {
    let env = BTreeMap::from([("PRISMA_HIDE_UPDATE_MESSAGE".to_string(), "1".to_string())]);
    let (_temp, result) = run(&echo_env("PRISMA_HIDE_UPDATE_MESSAGE"), &env).await;
    assert_eq!(result.unwrap(), "1");
  }

  #[tokio::test]
  #[cfg(unix)]
  async fn home_points_outside_artifact() {
    let (temp, result) = run(&echo_env("HOME"), &BTreeMap::new()).await;
    let home = result.unwrap();
    assert_eq!(Path::new(&home), temp.path().join("scratch/home"));
  }

  #[tokio::test]
  #[cfg(unix)]
  async fn runs_in_artifact_root() {
    let (temp, result) = run("touch generated.marker", &BTreeMap::new()).await;
    result.unwrap();
    assert!(temp.path().join("artifact/generated.marker").exists());
  }

  #[tokio::test]
  #[cfg(unix)]
  async fn only_path_is_inherited() {
    let (_temp, result) = run("env | cut -d= -f1 | sort | tr '\\n' ' '", &BTreeMap::new()).await;
    let names: Vec<String> = result.unwrap().split_whitespace().map(String::from).collect();
    assert!(names.contains(&"PATH".to_string()));
    assert!(!names.contains(&"USER".to_string()));
    assert!(!names.contains(&"CARGO_PKG_NAME".to_string()));
  }

  #[tokio::test]
  #[cfg(unix)]
  async fn failure_carries_diagnostic_output() {
    let (_temp, result) = run("echo 'schema.prisma: error' >&2; exit 3", &BTreeMap::new()).await;
    match result {
      Err(BundleError::ClientGeneration { code, output, .. }) => {
        assert_eq!(code, Some(3));
        assert!(output.contains("schema.prisma: error"));
      }
      other => panic!("expected ClientGeneration, got {other:?}"),
    }
  }

  #[test]
  fn get_shell_with_override() {
    let (shell, args) = get_shell(Some("/usr/bin/bash"));
    assert_eq!(shell, "/usr/bin/bash");
    assert_eq!(args, vec!["-c"]);

    let (_, args) = get_shell(Some("cmd.exe"));
    assert_eq!(args, vec!["/C"]);

    let (_, args) = get_shell(Some("pwsh"));
    assert_eq!(args, vec!["-NoProfile", "-Command"]);
  }

  #[test]
  #[cfg(unix)]
  fn get_shell_default() {
    let (shell, args) = get_shell(None);
    assert_eq!(shell, "/bin/sh");
    assert_eq!(args, vec!["-c"]);
  }
}
