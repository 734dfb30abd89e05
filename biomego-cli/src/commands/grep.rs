//! `grep-directory` handler

use anyhow::{Context, Result};
use biomego::Biomego;
use biomego_core::Directory;

use super::Output;

/// Greps a host directory and returns the raw match lines
pub async fn grep_directory(module: &Biomego, directory_arg: &str, pattern: &str) -> Result<Output> {
    let output = module
        .grep_directory(Directory::host(directory_arg), pattern)
        .await
        .with_context(|| format!("grep for '{}' in {} failed", pattern, directory_arg))?;

    Ok(Output::Text(output))
}
