//! Configuration module
//!
//! Values bound from flags or environment before any command runs.

use anyhow::Result;
use biomego::ModuleConfig;
use biomego_core::Directory;
use std::path::PathBuf;

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Source directory handed to the module
    pub source: PathBuf,
    /// Toolchain base image
    pub base_image: String,
    /// Container CLI binary
    pub engine: String,
}

impl Config {
    /// Builds the module configuration, validating it on the way
    pub fn module_config(&self) -> Result<ModuleConfig> {
        let config = ModuleConfig::new(Directory::host(&self.source), self.base_image.clone());
        config.validate()?;
        Ok(config)
    }
}
