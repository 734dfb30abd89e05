//! Module configuration
//!
//! The two values the host binds when constructing the module: the source
//! tree to work on and the base image for the toolchain container.

use biomego_core::Directory;

/// Digest-pinned node image the toolchain runs in
pub const DEFAULT_BASE_IMAGE: &str = "node:25-alpine@sha256:f4769ca6eeb6ebbd15eb9c8233afed856e437b75f486f7fccaa81d7c8ad56007";

/// Module configuration
#[derive(Debug, Clone)]
pub struct ModuleConfig {
    /// Source directory of the project, defaults to the invocation root
    pub source: Directory,

    /// Base image for `base()`, `lint()` and `fix()`
    ///
    /// Assumed to provide node and npm.
    pub base_image_address: String,
}

impl ModuleConfig {
    pub fn new(source: Directory, base_image_address: impl Into<String>) -> Self {
        Self {
            source,
            base_image_address: base_image_address.into(),
        }
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.base_image_address.trim().is_empty() {
            anyhow::bail!("base_image_address cannot be empty");
        }

        if self.base_image_address.chars().any(char::is_whitespace) {
            anyhow::bail!(
                "base_image_address must not contain whitespace: '{}'",
                self.base_image_address
            );
        }

        if let Directory::Host { path } = &self.source {
            if path.as_os_str().is_empty() {
                anyhow::bail!("source path cannot be empty");
            }
        }

        Ok(())
    }
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self::new(Directory::host("."), DEFAULT_BASE_IMAGE)
    }
}
