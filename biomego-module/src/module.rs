//! Module operations
//!
//! Each operation is a straight composition of container steps. Failures are
//! whatever the engine reports, passed through untouched.

use biomego_core::{Changeset, Container, Directory, ExecRequest};
use biomego_engine::{Engine, Result};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::ModuleConfig;

/// Public image used by `echo_container` and `grep_directory`
///
/// Independent of `ModuleConfig::base_image_address`.
pub const TOOL_IMAGE: &str = "alpine:latest";

/// Files `fix` reports on when no filter is given
pub const DEFAULT_FIX_FILTER: [&str; 4] = ["**/*.js", "**/*.ts", "**/*.jsx", "**/*.tsx"];

const SOURCE_PATH: &str = "/src";
const MOUNT_PATH: &str = "/mnt";
const NPM_CACHE_PATH: &str = "/root/.npm";
const NPM_CACHE_VOLUME: &str = "node-modules";
const BIOME_PACKAGE: &str = "@biomejs/biome";

/// The Biome toolchain module
pub struct Biomego {
    config: ModuleConfig,
    engine: Arc<dyn Engine>,
}

impl Biomego {
    /// Creates the module
    ///
    /// # Arguments
    /// * `config` - Source tree and base image
    /// * `engine` - Engine that realizes the containers this module builds
    pub fn new(config: ModuleConfig, engine: Arc<dyn Engine>) -> Self {
        Self { config, engine }
    }

    pub fn config(&self) -> &ModuleConfig {
        &self.config
    }

    /// Returns a container that echoes whatever string argument is provided
    ///
    /// Nothing runs until the container is resolved by an engine, at which
    /// point its stdout is `string_arg` followed by a newline.
    pub fn echo_container(&self, string_arg: &str) -> Container {
        Container::from(TOOL_IMAGE).with_exec(ExecRequest::new("echo", [string_arg]))
    }

    /// Returns lines that match a pattern in the files of the provided directory
    ///
    /// Output lines look like `./path/to/file:matching line`. A pattern with no
    /// match is an error: grep exits 1 and the engine reports it.
    pub async fn grep_directory(&self, directory_arg: Directory, pattern: &str) -> Result<String> {
        debug!("Searching for '{}'", pattern);

        let container = Container::from(TOOL_IMAGE)
            .with_mounted_directory(MOUNT_PATH, directory_arg)
            .with_workdir(MOUNT_PATH)
            .with_exec(ExecRequest::new("grep", ["-R", pattern, "."]));

        self.engine.stdout(&container).await
    }

    /// Toolchain container: source copied in, dependencies installed
    pub fn base(&self) -> Container {
        Container::from(self.config.base_image_address.as_str())
            .with_mounted_cache(NPM_CACHE_PATH, NPM_CACHE_VOLUME)
            .with_directory(SOURCE_PATH, self.config.source.clone())
            .with_workdir(SOURCE_PATH)
            .with_env_variable("CI", "true")
            .with_exec(ExecRequest::new("npm", ["install"]))
    }

    /// Lints the source code
    ///
    /// # Arguments
    /// * `files` - Files to lint, everything when empty
    pub async fn lint(&self, files: &[String]) -> Result<()> {
        info!("Linting {}", describe(files));

        let container = self.base().with_exec(biome_check(false, files));
        self.engine.sync(&container).await
    }

    /// Fixes lint issues and returns the resulting changeset
    ///
    /// # Arguments
    /// * `files` - Files to apply fixes on, everything when empty
    /// * `fix_filter` - Globs selecting files to include in the changeset,
    ///   `DEFAULT_FIX_FILTER` when empty
    pub async fn fix(&self, files: &[String], fix_filter: &[String]) -> Result<Changeset> {
        info!("Fixing {}", describe(files));

        let filter: Vec<String> = if fix_filter.is_empty() {
            DEFAULT_FIX_FILTER.iter().map(|s| s.to_string()).collect()
        } else {
            fix_filter.to_vec()
        };

        let container = self.base().with_exec(biome_check(true, files));

        let fixed = self
            .engine
            .directory(&container, ".")
            .await?
            .without_directory("node_modules")
            .include(filter.as_slice())?;

        let original = self
            .engine
            .snapshot(&self.config.source)
            .await?
            .without_directory("node_modules")
            .include(filter.as_slice())?;

        let changes = fixed.changes(&original);
        debug!(
            "Fix produced {} added, {} modified, {} removed file(s)",
            changes.added.len(),
            changes.modified.len(),
            changes.removed.len()
        );

        Ok(changes)
    }
}

fn biome_check(write: bool, files: &[String]) -> ExecRequest {
    let mut args = vec![BIOME_PACKAGE.to_string(), "check".to_string()];
    if write {
        args.push("--write".to_string());
    }
    args.extend(files.iter().cloned());
    ExecRequest::new("npx", args)
}

fn describe(files: &[String]) -> String {
    if files.is_empty() {
        "all files".to_string()
    } else {
        format!("{} file(s)", files.len())
    }
}
