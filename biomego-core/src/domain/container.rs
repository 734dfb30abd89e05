//! Container descriptions
//!
//! A `Container` is an image reference plus an ordered list of operations.
//! Builder methods consume and return the description, so building one never
//! touches the engine. Realization happens only when an engine resolves it.

use serde::{Deserialize, Serialize};

use crate::domain::directory::Directory;

/// A command and its arguments, submitted verbatim to the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecRequest {
    pub command: String,
    pub args: Vec<String>,
}

impl ExecRequest {
    /// Creates a request for `command` with the given arguments
    pub fn new<I, S>(command: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: command.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Full argument vector, command first
    pub fn argv(&self) -> Vec<&str> {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect()
    }
}

impl std::fmt::Display for ExecRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.argv().join(" "))
    }
}

/// A single step in a container description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ContainerOp {
    /// Mount a directory at `path`; writes go to the mounted tree
    MountDirectory { path: String, source: Directory },
    /// Copy a directory's contents into the container filesystem at `path`
    CopyDirectory { path: String, source: Directory },
    /// Mount a named, engine-managed cache volume at `path`
    MountCache { path: String, volume: String },
    /// Set the working directory for subsequent execs
    Workdir { path: String },
    /// Set an environment variable for subsequent execs
    Env { name: String, value: String },
    /// Run a command
    Exec(ExecRequest),
}

/// Lazy description of a container
///
/// Cheap to clone and safe to share. The engine decides when (and whether)
/// the image is pulled and the commands actually run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    image: String,
    ops: Vec<ContainerOp>,
}

impl Container {
    /// Starts a description from an image reference (e.g. `alpine:latest`)
    pub fn from(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            ops: Vec::new(),
        }
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn ops(&self) -> &[ContainerOp] {
        &self.ops
    }

    /// All exec requests in submission order
    pub fn execs(&self) -> impl Iterator<Item = &ExecRequest> {
        self.ops.iter().filter_map(|op| match op {
            ContainerOp::Exec(req) => Some(req),
            _ => None,
        })
    }

    /// The exec whose stdout the engine reports, if any
    pub fn last_exec(&self) -> Option<&ExecRequest> {
        self.execs().last()
    }

    pub fn with_mounted_directory(self, path: impl Into<String>, source: Directory) -> Self {
        self.push(ContainerOp::MountDirectory {
            path: path.into(),
            source,
        })
    }

    pub fn with_directory(self, path: impl Into<String>, source: Directory) -> Self {
        self.push(ContainerOp::CopyDirectory {
            path: path.into(),
            source,
        })
    }

    pub fn with_mounted_cache(self, path: impl Into<String>, volume: impl Into<String>) -> Self {
        self.push(ContainerOp::MountCache {
            path: path.into(),
            volume: volume.into(),
        })
    }

    pub fn with_workdir(self, path: impl Into<String>) -> Self {
        self.push(ContainerOp::Workdir { path: path.into() })
    }

    pub fn with_env_variable(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(ContainerOp::Env {
            name: name.into(),
            value: value.into(),
        })
    }

    pub fn with_exec(self, request: ExecRequest) -> Self {
        self.push(ContainerOp::Exec(request))
    }

    fn push(mut self, op: ContainerOp) -> Self {
        self.ops.push(op);
        self
    }
}

/// Resolves `path` against the working directory `cwd`
///
/// Absolute paths win; `.` and `..` components are folded. The result is
/// always absolute and has no trailing slash (except for `/` itself).
pub fn resolve_path(cwd: &str, path: &str) -> String {
    let joined = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("{}/{}", cwd, path)
    };

    let mut parts: Vec<&str> = Vec::new();
    for part in joined.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }

    format!("/{}", parts.join("/"))
}
