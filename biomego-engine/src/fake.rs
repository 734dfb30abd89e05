//! In-memory engine for tests
//!
//! `FakeEngine` interprets container descriptions without running anything.
//! Mounted and copied directories become entries in a per-realization file
//! map; execs dispatch to command handlers. `echo` and `grep` are built in,
//! other commands are registered with `FakeEngine::on_command`.
//!
//! Unknown commands exit 127, like a shell would.

use async_trait::async_trait;
use biomego_core::domain::container::resolve_path;
use biomego_core::{Container, ContainerOp, Snapshot};
use regex::Regex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::Engine;
use crate::error::{EngineError, Result};

/// A command implementation: gets the process view, returns the exit code
pub type CommandHandler = Arc<dyn Fn(&mut FakeProcess<'_>) -> i32 + Send + Sync>;

/// What a fake command can see and touch
pub struct FakeProcess<'a> {
    /// Arguments after the command name
    pub args: &'a [String],
    /// Absolute working directory
    pub workdir: &'a str,
    /// Environment set by the description
    pub env: &'a BTreeMap<String, String>,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
    files: &'a mut BTreeMap<String, Vec<u8>>,
}

impl FakeProcess<'_> {
    /// Reads a file, relative paths resolve against the working directory
    pub fn read(&self, path: &str) -> Option<&[u8]> {
        self.files
            .get(&resolve_path(self.workdir, path))
            .map(Vec::as_slice)
    }

    pub fn write(&mut self, path: &str, contents: impl Into<Vec<u8>>) {
        let target = resolve_path(self.workdir, path);
        self.files.insert(target, contents.into());
    }

    pub fn remove(&mut self, path: &str) -> bool {
        self.files
            .remove(&resolve_path(self.workdir, path))
            .is_some()
    }

    /// Files under `dir` with paths relative to it, in path order
    pub fn files_under(&self, dir: &str) -> Vec<(String, Vec<u8>)> {
        let root = resolve_path(self.workdir, dir);
        files_under(&*self.files, &root)
            .map(|(path, contents)| (path.to_string(), contents.to_vec()))
            .collect()
    }
}

/// In-memory `Engine`
pub struct FakeEngine {
    handlers: Mutex<HashMap<String, CommandHandler>>,
    unavailable_images: Mutex<HashSet<String>>,
    resolved: Mutex<Vec<Container>>,
}

impl Default for FakeEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeEngine {
    /// Creates an engine with the `echo` and `grep` built-ins
    pub fn new() -> Self {
        let engine = Self {
            handlers: Mutex::new(HashMap::new()),
            unavailable_images: Mutex::new(HashSet::new()),
            resolved: Mutex::new(Vec::new()),
        };
        engine.on_command("echo", echo);
        engine.on_command("grep", grep);
        engine
    }

    /// Registers (or replaces) the handler for a command name
    pub fn on_command(
        &self,
        command: impl Into<String>,
        handler: impl Fn(&mut FakeProcess<'_>) -> i32 + Send + Sync + 'static,
    ) {
        lock(&self.handlers).insert(command.into(), Arc::new(handler));
    }

    /// Makes every realization from `image` fail as if the pull failed
    pub fn fail_image(&self, image: impl Into<String>) {
        lock(&self.unavailable_images).insert(image.into());
    }

    /// Descriptions realized so far, oldest first
    pub fn resolved(&self) -> Vec<Container> {
        lock(&self.resolved).clone()
    }

    async fn realize(&self, container: &Container) -> Result<Realized> {
        lock(&self.resolved).push(container.clone());

        if lock(&self.unavailable_images).contains(container.image()) {
            return Err(EngineError::ContainerStart {
                image: container.image().to_string(),
                message: format!("{}: image not known", container.image()),
            });
        }

        let mut state = Realized {
            files: BTreeMap::new(),
            workdir: "/".to_string(),
            env: BTreeMap::new(),
            stdout: String::new(),
        };

        for op in container.ops() {
            match op {
                ContainerOp::MountDirectory { path, source }
                | ContainerOp::CopyDirectory { path, source } => {
                    let target = resolve_path(&state.workdir, path);
                    let snapshot = self.snapshot(source).await?;
                    for (file, contents) in snapshot.files() {
                        state
                            .files
                            .insert(resolve_path(&target, file), contents.to_vec());
                    }
                }
                ContainerOp::MountCache { .. } => {}
                ContainerOp::Workdir { path } => {
                    state.workdir = resolve_path(&state.workdir, path);
                }
                ContainerOp::Env { name, value } => {
                    state.env.insert(name.clone(), value.clone());
                }
                ContainerOp::Exec(request) => {
                    let handler = lock(&self.handlers).get(&request.command).cloned();

                    let mut process = FakeProcess {
                        args: &request.args,
                        workdir: &state.workdir,
                        env: &state.env,
                        stdout: String::new(),
                        stderr: String::new(),
                        files: &mut state.files,
                    };

                    let exit_code = match handler {
                        Some(handler) => handler(&mut process),
                        None => {
                            process.stderr = format!("sh: {}: not found\n", request.command);
                            127
                        }
                    };

                    let FakeProcess { stdout, stderr, .. } = process;
                    if exit_code != 0 {
                        return Err(EngineError::ExecFailed {
                            command: request.to_string(),
                            exit_code,
                            stdout,
                            stderr,
                        });
                    }
                    state.stdout = stdout;
                }
            }
        }

        Ok(state)
    }
}

#[async_trait]
impl Engine for FakeEngine {
    async fn stdout(&self, container: &Container) -> Result<String> {
        Ok(self.realize(container).await?.stdout)
    }

    async fn directory(&self, container: &Container, path: &str) -> Result<Snapshot> {
        let state = self.realize(container).await?;
        let root = resolve_path(&state.workdir, path);

        Ok(files_under(&state.files, &root)
            .map(|(file, contents)| (file.to_string(), contents.to_vec()))
            .collect())
    }
}

struct Realized {
    files: BTreeMap<String, Vec<u8>>,
    workdir: String,
    env: BTreeMap<String, String>,
    stdout: String,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn files_under<'a>(
    files: &'a BTreeMap<String, Vec<u8>>,
    root: &'a str,
) -> impl Iterator<Item = (&'a str, &'a [u8])> {
    let prefix = if root == "/" {
        "/".to_string()
    } else {
        format!("{}/", root)
    };

    files.iter().filter_map(move |(path, contents)| {
        path.strip_prefix(prefix.as_str())
            .map(|relative| (relative, contents.as_slice()))
    })
}

fn echo(process: &mut FakeProcess<'_>) -> i32 {
    process.stdout = format!("{}\n", process.args.join(" "));
    0
}

/// `grep [-r|-R] [-i] PATTERN [PATH...]`
///
/// Exit codes follow grep: 0 on a match, 1 on none, 2 on error.
fn grep(process: &mut FakeProcess<'_>) -> i32 {
    let mut recursive = false;
    let mut ignore_case = false;
    let mut operands = Vec::new();

    for arg in process.args {
        match arg.strip_prefix('-') {
            Some(flags) if !flags.is_empty() && operands.is_empty() => {
                for flag in flags.chars() {
                    match flag {
                        'r' | 'R' => recursive = true,
                        'i' => ignore_case = true,
                        other => {
                            process.stderr = format!("grep: unrecognized option: {}\n", other);
                            return 2;
                        }
                    }
                }
            }
            _ => operands.push(arg.as_str()),
        }
    }

    let Some((pattern, paths)) = operands.split_first() else {
        process.stderr = "Usage: grep [OPTION]... PATTERNS [FILE]...\n".to_string();
        return 2;
    };

    let source = if ignore_case {
        format!("(?i){}", pattern)
    } else {
        pattern.to_string()
    };
    let regex = match Regex::new(&source) {
        Ok(regex) => regex,
        Err(e) => {
            process.stderr = format!("grep: {}\n", e);
            return 2;
        }
    };

    let paths: Vec<&str> = if paths.is_empty() {
        vec!["."]
    } else {
        paths.to_vec()
    };
    let mut output = String::new();
    let mut errors = String::new();

    for path in paths {
        let files: Vec<(String, Vec<u8>)> = if recursive {
            process
                .files_under(path)
                .into_iter()
                .map(|(file, contents)| (format!("{}/{}", path.trim_end_matches('/'), file), contents))
                .collect()
        } else {
            match process.read(path) {
                Some(contents) => vec![(path.to_string(), contents.to_vec())],
                None => {
                    errors.push_str(&format!("grep: {}: No such file or directory\n", path));
                    continue;
                }
            }
        };

        for (display, contents) in files {
            for line in String::from_utf8_lossy(&contents).lines() {
                if regex.is_match(line) {
                    output.push_str(&format!("{}:{}\n", display, line));
                }
            }
        }
    }

    process.stdout = output;
    process.stderr = errors;

    if !process.stderr.is_empty() {
        2
    } else if process.stdout.is_empty() {
        1
    } else {
        0
    }
}
