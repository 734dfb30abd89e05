//! Podman container engine
//!
//! Realizes container descriptions through the podman CLI:
//! - Staging directories on the host (bind paths, temp dirs for snapshots)
//! - Starting one detached container per realization, with all mounts
//! - Replaying directory copies and execs in description order
//! - Removing the container when the realization ends, whatever the outcome
//!
//! The docker CLI accepts the same arguments, see `PodmanEngine::with_binary`.

use async_trait::async_trait;
use biomego_core::domain::container::resolve_path;
use biomego_core::{Container, ContainerOp, Directory, ExecRequest, Snapshot};
use std::path::{Path, PathBuf};
use std::process::Output;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::Engine;
use crate::error::{EngineError, Result};
use crate::fs;

/// Engine backed by the podman CLI
#[derive(Debug, Clone)]
pub struct PodmanEngine {
    binary: String,
}

impl Default for PodmanEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PodmanEngine {
    /// Creates an engine that runs `podman` from `PATH`
    pub fn new() -> Self {
        Self::with_binary("podman")
    }

    /// Creates an engine using a different CLI binary (e.g. `docker`)
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Checks that the engine binary is installed and answers
    pub async fn check_available(&self) -> Result<()> {
        let output = self.command(&["--version".to_string()]).await?;

        if !output.status.success() {
            return Err(EngineError::Unavailable(format!(
                "{} is not working correctly",
                self.binary
            )));
        }

        let version = String::from_utf8_lossy(&output.stdout);
        info!("{} is available: {}", self.binary, version.trim());

        Ok(())
    }

    async fn command(&self, args: &[String]) -> Result<Output> {
        Command::new(&self.binary)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    EngineError::Unavailable(format!(
                        "Failed to execute '{}'. Is it installed?",
                        self.binary
                    ))
                } else {
                    EngineError::Io(e)
                }
            })
    }

    /// Runs the whole description in a fresh container
    async fn realize(&self, container: &Container, export: Option<&str>) -> Result<Realized> {
        let mut staging = Staging::default();
        let plan = build_plan(container, |directory| staging.stage(directory))?;

        let name = format!("biomego-{}", Uuid::new_v4());
        // Armed before `run` so a half-created container is removed too
        let mut guard = ContainerGuard::new(&self.binary, &name);

        let result = self.run_plan(&name, container, &plan, export).await;

        let removal = self.command(&rm_args(&self.binary, &name)).await;
        log_removal(&name, removal);
        guard.disarm();

        result
    }

    async fn run_plan(
        &self,
        name: &str,
        container: &Container,
        plan: &Plan,
        export: Option<&str>,
    ) -> Result<Realized> {
        info!(
            "Creating container {} for image {}",
            name,
            container.image()
        );

        let output = self
            .command(&run_args(name, container.image(), &plan.mounts))
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !stderr.trim().is_empty() {
            debug!("{} run stderr: {}", self.binary, stderr.trim());
        }

        if !output.status.success() {
            error!(
                "Failed to start container for image {}: exit_code={}, stderr='{}'",
                container.image(),
                output.status.code().unwrap_or(-1),
                stderr.trim()
            );
            return Err(EngineError::ContainerStart {
                image: container.image().to_string(),
                message: stderr.trim().to_string(),
            });
        }

        debug!("Container {} started with ID: {}", name, stdout.trim());

        let mut last_stdout = String::new();
        for step in &plan.steps {
            match step {
                Step::Copy { host, target } => self.copy_in(name, host, target).await?,
                Step::Exec {
                    workdir,
                    env,
                    request,
                } => {
                    last_stdout = self.exec(name, workdir.as_deref(), env, request).await?;
                }
            }
        }

        let exported = match export {
            Some(path) => {
                let source = resolve_path(plan.workdir.as_deref().unwrap_or("/"), path);
                Some(self.copy_out(name, &source).await?)
            }
            None => None,
        };

        Ok(Realized {
            stdout: last_stdout,
            exported,
        })
    }

    async fn exec(
        &self,
        container_name: &str,
        workdir: Option<&str>,
        env: &[(String, String)],
        request: &ExecRequest,
    ) -> Result<String> {
        debug!("Executing in container {}: {}", container_name, request);

        let output = self
            .command(&exec_args(container_name, workdir, env, request))
            .await?;

        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let exit_code = output.status.code().unwrap_or(-1);

        if !output.status.success() {
            debug!(
                "Command failed in container {}: cmd={} exit_code={} stderr='{}'",
                container_name,
                request,
                exit_code,
                stderr.trim()
            );
            return Err(EngineError::ExecFailed {
                command: request.to_string(),
                exit_code,
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr,
            });
        }

        let stdout = decode_stdout(request, output.stdout)?;

        debug!(
            "Command completed successfully: stdout_len={}, stderr_len={}",
            stdout.len(),
            stderr.len()
        );

        Ok(stdout)
    }

    async fn copy_in(&self, container_name: &str, host: &Path, target: &str) -> Result<()> {
        debug!(
            "Copying {} into container {} at {}",
            host.display(),
            container_name,
            target
        );

        let mkdir = ExecRequest::new("mkdir", ["-p", target]);
        let output = self
            .command(&exec_args(container_name, None, &[], &mkdir))
            .await?;
        check_copy(&output, target)?;

        let output = self
            .command(&[
                "cp".to_string(),
                format!("{}/.", host.display()),
                format!("{}:{}", container_name, target),
            ])
            .await?;
        check_copy(&output, target)
    }

    async fn copy_out(&self, container_name: &str, source: &str) -> Result<Snapshot> {
        debug!("Exporting {} from container {}", source, container_name);

        let destination = tempfile::Builder::new().prefix("biomego-export-").tempdir()?;
        let output = self
            .command(&[
                "cp".to_string(),
                format!("{}:{}/.", container_name, source),
                destination.path().display().to_string(),
            ])
            .await?;
        check_copy(&output, source)?;

        fs::read_tree(destination.path())
    }
}

#[async_trait]
impl Engine for PodmanEngine {
    async fn stdout(&self, container: &Container) -> Result<String> {
        Ok(self.realize(container, None).await?.stdout)
    }

    async fn directory(&self, container: &Container, path: &str) -> Result<Snapshot> {
        self.realize(container, Some(path))
            .await?
            .exported
            .ok_or_else(|| EngineError::Mount(format!("Nothing exported from {}", path)))
    }
}

struct Realized {
    stdout: String,
    exported: Option<Snapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Mount {
    Bind { host: PathBuf, target: String },
    Volume { name: String, target: String },
}

impl Mount {
    fn to_arg(&self) -> String {
        match self {
            Self::Bind { host, target } => format!("{}:{}", host.display(), target),
            Self::Volume { name, target } => format!("{}:{}", name, target),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Copy {
        host: PathBuf,
        target: String,
    },
    Exec {
        workdir: Option<String>,
        env: Vec<(String, String)>,
        request: ExecRequest,
    },
}

/// A description flattened into what podman needs
///
/// Mounts can only be set when the container is created, so they are hoisted
/// out of the op list. Everything else keeps its order.
#[derive(Debug, Default)]
struct Plan {
    mounts: Vec<Mount>,
    steps: Vec<Step>,
    workdir: Option<String>,
}

fn build_plan(
    container: &Container,
    mut stage: impl FnMut(&Directory) -> Result<PathBuf>,
) -> Result<Plan> {
    let mut plan = Plan::default();
    let mut env: Vec<(String, String)> = Vec::new();

    for op in container.ops() {
        let cwd = plan.workdir.clone().unwrap_or_else(|| "/".to_string());
        match op {
            ContainerOp::MountDirectory { path, source } => plan.mounts.push(Mount::Bind {
                host: stage(source)?,
                target: resolve_path(&cwd, path),
            }),
            ContainerOp::CopyDirectory { path, source } => plan.steps.push(Step::Copy {
                host: stage(source)?,
                target: resolve_path(&cwd, path),
            }),
            ContainerOp::MountCache { path, volume } => plan.mounts.push(Mount::Volume {
                name: volume.clone(),
                target: resolve_path(&cwd, path),
            }),
            ContainerOp::Workdir { path } => plan.workdir = Some(resolve_path(&cwd, path)),
            ContainerOp::Env { name, value } => {
                env.retain(|(existing, _)| existing != name);
                env.push((name.clone(), value.clone()));
            }
            ContainerOp::Exec(request) => plan.steps.push(Step::Exec {
                workdir: plan.workdir.clone(),
                env: env.clone(),
                request: request.clone(),
            }),
        }
    }

    Ok(plan)
}

fn run_args(name: &str, image: &str, mounts: &[Mount]) -> Vec<String> {
    let mut args = vec![
        "run".to_string(),
        "-d".to_string(),
        "--name".to_string(),
        name.to_string(),
        // Images like node or alpine/git ship their own entrypoint
        "--entrypoint".to_string(),
        "/bin/sh".to_string(),
    ];

    for mount in mounts {
        args.push("-v".to_string());
        args.push(mount.to_arg());
    }

    args.extend([image.to_string(), "-c".to_string(), "sleep infinity".to_string()]);
    args
}

fn exec_args(
    container_name: &str,
    workdir: Option<&str>,
    env: &[(String, String)],
    request: &ExecRequest,
) -> Vec<String> {
    let mut args = vec!["exec".to_string()];

    if let Some(dir) = workdir {
        args.push("-w".to_string());
        args.push(dir.to_string());
    }

    for (name, value) in env {
        args.push("-e".to_string());
        args.push(format!("{}={}", name, value));
    }

    args.push(container_name.to_string());
    args.push(request.command.clone());
    args.extend(request.args.iter().cloned());
    args
}

/// Stdout is handed back as-is, so bytes that are not UTF-8 are an error
/// rather than silently replaced
fn decode_stdout(request: &ExecRequest, bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|source| EngineError::InvalidOutput {
        command: request.to_string(),
        source,
    })
}

/// `rm -f` without a grace period
///
/// PID 1 is `sh -c "sleep infinity"`, which ignores SIGTERM, so podman would
/// otherwise wait out its stop timeout. docker's `rm -f` already kills.
fn rm_args(binary: &str, name: &str) -> Vec<String> {
    let mut args = vec!["rm".to_string(), "-f".to_string()];

    let is_docker = Path::new(binary)
        .file_name()
        .is_some_and(|file| file == "docker");
    if !is_docker {
        args.push("--time".to_string());
        args.push("0".to_string());
    }

    args.push(name.to_string());
    args
}

fn log_removal<E: std::fmt::Display>(name: &str, result: std::result::Result<Output, E>) {
    match result {
        Ok(output) if output.status.success() => {
            debug!("Container {} removed", name);
        }
        Ok(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("Failed to remove container {}: {}", name, stderr.trim());
        }
        Err(e) => {
            warn!("Failed to remove container {}: {}", name, e);
        }
    }
}

fn check_copy(output: &Output, path: &str) -> Result<()> {
    if output.status.success() {
        return Ok(());
    }
    Err(EngineError::Mount(format!(
        "{}: {}",
        path,
        String::from_utf8_lossy(&output.stderr).trim()
    )))
}

/// Host-side directories backing one realization
#[derive(Default)]
struct Staging {
    dirs: Vec<TempDir>,
}

impl Staging {
    fn stage(&mut self, directory: &Directory) -> Result<PathBuf> {
        match directory {
            Directory::Host { path } => std::fs::canonicalize(path)
                .map_err(|e| EngineError::Mount(format!("{}: {}", path.display(), e))),
            Directory::Snapshot(snapshot) => {
                let dir = tempfile::Builder::new().prefix("biomego-").tempdir()?;
                fs::write_tree(snapshot, dir.path())?;
                let path = dir.path().to_path_buf();
                self.dirs.push(dir);
                Ok(path)
            }
        }
    }
}

/// Removes the container if a realization never reached its own cleanup
///
/// That only happens when the future is dropped mid-flight. Removal is then
/// spawned on the runtime instead of blocking a worker.
struct ContainerGuard {
    binary: String,
    name: String,
    armed: bool,
}

impl ContainerGuard {
    fn new(binary: &str, name: &str) -> Self {
        Self {
            binary: binary.to_string(),
            name: name.to_string(),
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ContainerGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let args = rm_args(&self.binary, &self.name);
        let binary = std::mem::take(&mut self.binary);
        let name = std::mem::take(&mut self.name);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let result = Command::new(&binary).args(&args).output().await;
                    log_removal(&name, result);
                });
            }
            Err(_) => {
                let result = std::process::Command::new(&binary).args(&args).output();
                log_removal(&name, result);
            }
        }
    }
}
