//! `lint` and `fix` handlers

use anyhow::{Context, Result};
use biomego::Biomego;
use std::path::Path;
use tracing::info;

use super::Output;

pub async fn lint(module: &Biomego, files: &[String]) -> Result<Output> {
    module.lint(files).await.context("Lint failed")?;
    Ok(Output::Done("Lint passed.".to_string()))
}

/// Runs the fixer; when `apply_to` is set, writes the changeset there
pub async fn fix(
    module: &Biomego,
    files: &[String],
    fix_filter: &[String],
    apply_to: Option<&Path>,
) -> Result<Output> {
    let changeset = module.fix(files, fix_filter).await.context("Fix failed")?;

    let applied = match apply_to {
        Some(root) if !changeset.is_empty() => {
            info!("Applying changeset to {}", root.display());
            changeset
                .export(root)
                .with_context(|| format!("Failed to apply changes to {}", root.display()))?;
            true
        }
        _ => false,
    };

    Ok(Output::Changes { changeset, applied })
}
