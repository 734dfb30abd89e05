//! Biomego Engine
//!
//! The boundary between the module and whatever actually runs containers.
//!
//! A `Container` from `biomego-core` is only a description. An `Engine`
//! realizes it on demand:
//! - `stdout`: run every exec in order, return the last one's output
//! - `sync`: same, discarding the output
//! - `directory`: run, then export a path from the container filesystem
//! - `snapshot`: read a `Directory` into memory
//!
//! `PodmanEngine` drives the podman (or docker) CLI. `FakeEngine`, behind the
//! `test-support` feature, interprets descriptions in memory.
//!
//! # Example
//!
//! ```no_run
//! use biomego_core::{Container, ExecRequest};
//! use biomego_engine::{Engine, PodmanEngine};
//!
//! #[tokio::main]
//! async fn main() -> biomego_engine::Result<()> {
//!     let engine = PodmanEngine::new();
//!     let container = Container::from("alpine:latest")
//!         .with_exec(ExecRequest::new("echo", ["hello"]));
//!
//!     assert_eq!(engine.stdout(&container).await?, "hello\n");
//!     Ok(())
//! }
//! ```

pub mod error;
#[cfg(any(test, feature = "test-support"))]
pub mod fake;
pub mod fs;
pub mod podman;

pub use error::{EngineError, Result};
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeEngine, FakeProcess};
pub use podman::PodmanEngine;

use async_trait::async_trait;
use biomego_core::{Container, Directory, Snapshot};

/// A sandboxed execution engine
///
/// Implementations own every side effect: image pulls, mounts, processes.
/// Dropping a returned future cancels the work in flight.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Realizes `container` and returns the stdout of its last exec
    ///
    /// A description without execs yields an empty string. Any exec exiting
    /// non-zero fails the whole call with `EngineError::ExecFailed`. Output is
    /// returned byte for byte; stdout that is not UTF-8 fails with
    /// `EngineError::InvalidOutput` instead of being rewritten.
    async fn stdout(&self, container: &Container) -> Result<String>;

    /// Realizes `container`, discarding output
    async fn sync(&self, container: &Container) -> Result<()> {
        self.stdout(container).await.map(|_| ())
    }

    /// Realizes `container` and exports `path` (relative to its final working
    /// directory) as a snapshot
    async fn directory(&self, container: &Container, path: &str) -> Result<Snapshot>;

    /// Reads a directory reference into memory
    async fn snapshot(&self, directory: &Directory) -> Result<Snapshot> {
        match directory {
            Directory::Snapshot(snapshot) => Ok(snapshot.clone()),
            Directory::Host { path } => {
                let path = path.clone();
                tokio::task::spawn_blocking(move || fs::read_tree(&path))
                    .await
                    .map_err(|e| EngineError::Mount(format!("Snapshot task failed: {}", e)))?
            }
        }
    }
}
